use crate::error::Result;
use crate::field::ReadSeek;
use crate::node::{ChunkNode, sig_display};
use crate::registry::{DecodeCtx, read_header};
use std::io::{Seek, SeekFrom};

/// Fallback decoder: record signature and size, seek past the body without
/// interpreting it. A declared size that does not move the position forward
/// is caught by the caller's progress check, not here.
pub fn read_skip(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let hdr = read_header(r, ctx)?;
    let mut node = ChunkNode::new(hdr.signature);
    node.name = format!("<Skipped {}>", sig_display(&hdr.signature));
    node.source_offset = hdr.start;
    node.size = hdr.size;
    r.seek(SeekFrom::Start(hdr.start + hdr.size))?;
    Ok(node)
}
