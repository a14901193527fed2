use crate::error::{Error, Result};
use crate::field::ReadSeek;
use crate::node::ChunkNode;
use crate::registry::{DecodeCtx, expect_signature, read_header};
use std::io::{Read, Seek, SeekFrom};

pub const SIG_FRAME: [u8; 4] = *b"FRM2";

// Streaming-frame bodies are opaque; anything past this is a broken size
// field, not a real frame.
const MAX_FRAME_LEN: u64 = 1 << 28;

/// Streaming spectral frame. The internal layout is not interpreted; the
/// whole chunk (header included) is retained verbatim so the repack engine
/// can re-emit it byte for byte.
pub fn read_frame(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let hdr = read_header(r, ctx)?;
    expect_signature(&hdr, &SIG_FRAME)?;
    if hdr.size < ctx.header_len() || hdr.size > MAX_FRAME_LEN {
        return Err(Error::Malformed(format!(
            "FRM2 at {:#x} declares size {:#x}",
            hdr.start, hdr.size
        )));
    }

    let mut node = ChunkNode::new(hdr.signature);
    node.source_offset = hdr.start;
    node.size = hdr.size;

    r.seek(SeekFrom::Start(hdr.start))?;
    let mut raw = vec![0u8; hdr.size as usize];
    r.read_exact(&mut raw)?;
    node.payload = raw;
    Ok(node)
}
