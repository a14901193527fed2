use crate::error::{Error, Result};
use crate::field::{PropKind, ReadSeek};
use crate::node::ChunkNode;
use crate::registry::{DecodeCtx, read_header, read_next};
use std::io::{ErrorKind, Read, Seek, SeekFrom};

pub const SIG_ROOT: [u8; 4] = *b"DBSe";
pub const SIG_VOICE: [u8; 4] = *b"DBV ";
pub const SIG_STATIONARY: [u8; 4] = *b"STA ";
pub const SIG_ARTICULATION: [u8; 4] = *b"ART ";
pub const SIG_TIMBRE: [u8; 4] = *b"TMM ";
pub const SIG_DICT: [u8; 4] = *b"PHDC";

/// Digest block spliced in behind the phoneme dictionary of a finalized
/// index: 32 lowercase hex characters zero-padded to this length.
pub const HASH_SEGMENT_LEN: usize = 260;
pub const HASH_HEX_LEN: usize = 32;

/// Names longer than this are taken as corruption, not as real names.
const MAX_NAME_LEN: u32 = 4096;

/// Read an array prologue: the child count, filed as a property so the
/// offset survives for patch-back.
pub fn read_array_head(node: &mut ChunkNode, r: &mut dyn ReadSeek, label: &str) -> Result<u32> {
    node.read_field(r, label, 4, PropKind::U32)?;
    node.prop_u32(label)
}

/// Read `count` children through the registry. Each child must move the
/// stream strictly forward past the previous one.
pub fn read_array_body(
    node: &mut ChunkNode,
    r: &mut dyn ReadSeek,
    ctx: &DecodeCtx,
    count: u32,
) -> Result<()> {
    let mut last = r.stream_position()?;
    for _ in 0..count {
        let child = read_next(r, ctx)?;
        let at = r.stream_position()?;
        if at <= last {
            return Err(Error::Progress { last, at });
        }
        last = at;
        node.children.push(child);
    }
    Ok(())
}

/// Trailing name record: a u32 length followed by that many bytes.
pub fn read_string_name(r: &mut dyn ReadSeek) -> Result<String> {
    let mut len = [0u8; 4];
    r.read_exact(&mut len)?;
    let len = u32::from_le_bytes(len);
    if len > MAX_NAME_LEN {
        return Err(Error::Malformed(format!(
            "name length {len} at {:#x} exceeds limit",
            r.stream_position()? - 4
        )));
    }
    let mut bytes = vec![0u8; len as usize];
    r.read_exact(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn check_span(node: &ChunkNode, end: u64) -> Result<()> {
    if end != node.source_offset + node.size {
        return Err(Error::Malformed(format!(
            "{} \"{}\" at {:#x}: consumed up to {:#x}, declared end {:#x}",
            node.sig_str(),
            node.name,
            node.source_offset,
            end,
            node.source_offset + node.size
        )));
    }
    Ok(())
}

/// Generic directory chunk (DBV, STA, ART): count, children, name.
pub fn read_group(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let hdr = read_header(r, ctx)?;
    let mut node = ChunkNode::new(hdr.signature);
    node.source_offset = hdr.start;
    node.size = hdr.size;

    let count = read_array_head(&mut node, r, "Count")?;
    read_array_body(&mut node, r, ctx, count)?;
    node.name = read_string_name(r)?;

    check_span(&node, r.stream_position()?)?;
    Ok(node)
}

/// Timbre model directory: like a group, with a model index between the
/// count and the children.
pub fn read_timbre_model(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let hdr = read_header(r, ctx)?;
    let mut node = ChunkNode::new(hdr.signature);
    node.source_offset = hdr.start;
    node.size = hdr.size;

    let count = read_array_head(&mut node, r, "Count")?;
    node.read_field(r, "ModelIndex", 4, PropKind::U32)?;
    read_array_body(&mut node, r, ctx, count)?;
    node.name = read_string_name(r)?;

    check_span(&node, r.stream_position()?)?;
    Ok(node)
}

/// True when `buf` looks like a spliced-in digest block: hex up front,
/// zero padding behind.
fn is_hash_segment(buf: &[u8]) -> bool {
    buf.len() == HASH_SEGMENT_LEN
        && buf[..HASH_HEX_LEN]
            .iter()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
        && buf[HASH_HEX_LEN..].iter().all(|&b| b == 0)
}

/// Root of an index file. Children are read to end-of-stream, and the
/// node's size is taken from the bytes actually consumed: finalization
/// splices a digest block in after the phoneme dictionary without touching
/// the stored root size, so that field cannot be trusted.
pub fn read_root(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let hdr = read_header(r, ctx)?;
    let mut node = ChunkNode::new(hdr.signature);
    node.source_offset = hdr.start;

    let mut last = r.stream_position()?;
    loop {
        let mut probe = [0u8; 1];
        match r.read_exact(&mut probe) {
            Ok(()) => {
                r.seek(SeekFrom::Start(last))?;
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let child = read_next(r, ctx)?;
        let at = r.stream_position()?;
        if at <= last {
            return Err(Error::Progress { last, at });
        }
        last = at;
        let was_dict = child.signature == SIG_DICT;
        node.children.push(child);

        if was_dict {
            last = probe_hash_segment(&mut node, r, last)?;
        }
    }

    node.size = last - node.source_offset;
    Ok(node)
}

/// A finalized index carries a digest block right after the phoneme
/// dictionary. Read it if present, otherwise leave the stream untouched.
fn probe_hash_segment(node: &mut ChunkNode, r: &mut dyn ReadSeek, pos: u64) -> Result<u64> {
    let mut buf = vec![0u8; HASH_SEGMENT_LEN];
    match r.read_exact(&mut buf) {
        Ok(()) if is_hash_segment(&buf) => {
            node.properties.push((
                "Bulk file hash".into(),
                crate::field::Property {
                    kind: PropKind::RawHex,
                    data: buf,
                    offset: pos,
                },
            ));
            Ok(pos + HASH_SEGMENT_LEN as u64)
        }
        Ok(()) => {
            r.seek(SeekFrom::Start(pos))?;
            Ok(pos)
        }
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
            r.seek(SeekFrom::Start(pos))?;
            Ok(pos)
        }
        Err(e) => Err(e.into()),
    }
}
