use crate::decode::frame::SIG_FRAME;
use crate::decode::sound::{SIG_SOUND, SoundChunk};
use crate::decode::skip;
use crate::error::{Error, Result};
use crate::node::ChunkNode;
use crate::progress::ProgressSink;
use crate::registry::{DecodeCtx, peek_signature, read_for};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Seek, SeekFrom};
use std::path::Path;

/// Offset index over one bulk file, built by a single forward scan.
///
/// Keyed by each chunk's END offset so that resolving a stored START
/// offset is a nearest-successor lookup: the first entry whose span ends
/// at or after the target is the chunk that contains it, tolerant of
/// small placement quirks in upstream data. Resolution consumes the
/// entry; whatever is left after linkage is orphan data.
#[derive(Debug, Default)]
pub struct DdbIndex {
    chunks: BTreeMap<u64, ChunkNode>,
}

impl DdbIndex {
    /// Scan a bulk file from offset 0 to end-of-file. Sound chunks are
    /// read metadata-only to bound memory; streaming frames keep their
    /// raw bytes; everything else is skipped over.
    pub fn scan(path: &Path, progress: &mut dyn ProgressSink) -> Result<DdbIndex> {
        let mut r = BufReader::new(File::open(path)?);
        let total = r.seek(SeekFrom::End(0))?;
        r.seek(SeekFrom::Start(0))?;
        progress.begin("scan", total);

        let ctx = DecodeCtx::bare();
        let mut index = DdbIndex::default();
        let mut pos = 0u64;
        loop {
            if progress.cancelled() {
                return Err(Error::Cancelled);
            }
            let sig = match peek_signature(&mut r, &ctx) {
                Ok(sig) => sig,
                Err(Error::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            };
            let node = match sig {
                SIG_SOUND => SoundChunk::read_meta(&mut r, &ctx)?.into_node(),
                SIG_FRAME => read_for(sig, &mut r, &ctx)?,
                _ => skip::read_skip(&mut r, &ctx)?,
            };
            let at = r.stream_position()?;
            if at <= pos {
                return Err(Error::Progress { last: pos, at });
            }
            progress.advance(at - pos);
            pos = at;
            index.chunks.insert(node.source_offset + node.size - 1, node);
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Resolve a stored start offset to the sound chunk whose span
    /// contains or immediately follows it, removing the entry. Offsets
    /// past every chunk, and entries that are not sound chunks, resolve
    /// to nothing.
    pub fn resolve_sound(&mut self, start: u64) -> Option<ChunkNode> {
        let key = *self.chunks.range(start..).next().map(|(k, _)| k)?;
        if self.chunks[&key].signature != SIG_SOUND {
            return None;
        }
        self.chunks.remove(&key)
    }

    /// Drain the index; whatever was never resolved is orphan data.
    pub fn into_orphans(self) -> Vec<ChunkNode> {
        self.chunks.into_values().collect()
    }
}
