use crate::error::{Error, Result};
use std::io::{Seek, SeekFrom, Write};

/// Deferred in-place edits to an output index file: absolute offset plus
/// replacement bytes. Collected while streaming, applied in one pass.
#[derive(Debug, Default)]
pub struct PatchList {
    patches: Vec<(u64, Vec<u8>)>,
}

impl PatchList {
    pub fn push_u32(&mut self, offset: u64, value: u32) {
        self.patches.push((offset, value.to_le_bytes().to_vec()));
    }

    pub fn push_u64(&mut self, offset: u64, value: u64) {
        self.patches.push((offset, value.to_le_bytes().to_vec()));
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Overwrite the recorded spans. Every patch must land inside the
    /// file as it already exists; a patch may never extend it.
    pub fn apply<W: Write + Seek>(&self, out: &mut W) -> Result<()> {
        let end = out.seek(SeekFrom::End(0))?;
        for (offset, bytes) in &self.patches {
            if offset + bytes.len() as u64 > end {
                return Err(Error::Format(format!(
                    "patch at {offset:#x}+{} reaches past end of file ({end:#x})",
                    bytes.len()
                )));
            }
            out.seek(SeekFrom::Start(*offset))?;
            out.write_all(bytes)?;
        }
        Ok(())
    }
}
