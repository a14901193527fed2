use crate::error::{Error, Result};
use crate::field::{PropKind, ReadSeek};
use crate::node::{ChunkNode, SIG_ITEM};
use crate::registry::{DecodeCtx, read_header};
use std::io::Seek;

use super::container::{check_span, read_array_body, read_array_head, read_string_name};

pub const SIG_STATIONARY_UNIT: [u8; 4] = *b"STAu";
pub const SIG_STATIONARY_PART: [u8; 4] = *b"STAp";
pub const SIG_ARTICULATION_UNIT: [u8; 4] = *b"ARTu";
pub const SIG_ARTICULATION_PART: [u8; 4] = *b"ARTp";
pub const SIG_VQMORPH_PART: [u8; 4] = *b"VQMp";

pub const FRAMES_NAME: &str = "<Frames>";
pub const SECTIONS_NAME: &str = "<sections>";

/// Per-pitch prologue shared by every part kind: timing, flags, pitch and
/// dynamics statistics.
fn read_part_stats(node: &mut ChunkNode, r: &mut dyn ReadSeek) -> Result<()> {
    node.read_field(r, "TimeInfo", 8, PropKind::Hex64)?;
    node.read_field(r, "Flags", 2, PropKind::U16)?;
    node.read_field(r, "mPitch", 4, PropKind::F32)?;
    node.read_field(r, "Average pitch", 4, PropKind::F32)?;
    node.read_field(r, "PitchDeviation", 4, PropKind::F32)?;
    node.read_field(r, "Dynamic", 4, PropKind::F32)?;
    node.read_field(r, "Tempo", 4, PropKind::F32)?;
    Ok(())
}

/// Bulk-file reference block shared by every part: sound prologue mirror
/// plus the absolute sample offset the linker resolves.
fn read_snd_props(node: &mut ChunkNode, r: &mut dyn ReadSeek) -> Result<()> {
    node.read_field(r, "SND Sample rate", 4, PropKind::U32)?;
    node.read_field(r, "SND Channel count", 2, PropKind::U16)?;
    node.read_field(r, "SND Sample count", 4, PropKind::U32)?;
    node.read_field(r, "SND Sample offset", 8, PropKind::Hex64)?;
    Ok(())
}

fn read_track_indices(node: &mut ChunkNode, r: &mut dyn ReadSeek) -> Result<()> {
    node.read_field(r, "EpRTrackIndex", 4, PropKind::S32)?;
    node.read_field(r, "ResTrackIndex", 4, PropKind::S32)?;
    node.read_field(r, "OptionalIndex3", 4, PropKind::S32)?;
    node.read_field(r, "OptionalIndex4", 4, PropKind::S32)?;
    Ok(())
}

pub fn frame_slot_name(index: u32) -> String {
    format!("Frame {index:05}")
}

/// Frame-reference directory: its own count (which must agree with the
/// part's `Frame count`) followed by one 8-byte bulk-file offset per frame.
/// Each slot is a tracked property so repacking can patch it in place.
pub fn read_frame_directory(r: &mut dyn ReadSeek, expected: u32) -> Result<ChunkNode> {
    let mut dir = ChunkNode::new(SIG_ITEM);
    dir.name = FRAMES_NAME.into();
    dir.source_offset = r.stream_position()?;

    let count = read_array_head(&mut dir, r, "Count")?;
    if count != expected {
        return Err(Error::Malformed(format!(
            "frame directory at {:#x}: holds {count} references, part declares {expected}",
            dir.source_offset
        )));
    }
    for i in 0..count {
        dir.read_field(r, &frame_slot_name(i), 8, PropKind::Hex64)?;
    }
    dir.size = r.stream_position()? - dir.source_offset;
    Ok(dir)
}

/// One articulation section: frame positions of the entire span and of its
/// stationary core.
fn read_section(r: &mut dyn ReadSeek, index: u32) -> Result<ChunkNode> {
    let mut sec = ChunkNode::new(SIG_ITEM);
    sec.name = format!("<section {index}>");
    sec.source_offset = r.stream_position()?;
    sec.read_field(r, "Entire section Begin", 4, PropKind::U32)?;
    sec.read_field(r, "Entire section End", 4, PropKind::U32)?;
    sec.read_field(r, "Stationary section Begin", 4, PropKind::U32)?;
    sec.read_field(r, "Stationary section End", 4, PropKind::U32)?;
    sec.size = 16;
    Ok(sec)
}

fn begin(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let hdr = read_header(r, ctx)?;
    let mut node = ChunkNode::new(hdr.signature);
    node.source_offset = hdr.start;
    node.size = hdr.size;
    Ok(node)
}

fn finish(mut node: ChunkNode, r: &mut dyn ReadSeek) -> Result<ChunkNode> {
    node.name = read_string_name(r)?;
    check_span(&node, r.stream_position()?)?;
    Ok(node)
}

/// Stationary unit: one recorded voice color, children are its per-pitch
/// `STAp` parts.
pub fn read_stationary_unit(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let mut node = begin(r, ctx)?;
    let count = read_array_head(&mut node, r, "Count")?;
    node.read_field(r, "Index", 4, PropKind::U32)?;
    node.read_field(r, "PitchRangeHigh", 4, PropKind::F32)?;
    node.read_field(r, "PitchRangeLow", 4, PropKind::F32)?;
    read_array_body(&mut node, r, ctx, count)?;
    finish(node, r)
}

/// Stationary per-pitch part.
pub fn read_stationary_part(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let mut node = begin(r, ctx)?;
    let count = read_array_head(&mut node, r, "Count")?;
    read_part_stats(&mut node, r)?;
    node.read_field(r, "LoopInfo", 4, PropKind::U32)?;
    read_array_body(&mut node, r, ctx, count)?;
    node.read_field(r, "FrameDataSize", 4, PropKind::U32)?;

    node.read_field(r, "Frame count", 4, PropKind::U32)?;
    let frames = node.prop_u32("Frame count")?;
    let dir = read_frame_directory(r, frames)?;
    node.children.push(dir);

    read_snd_props(&mut node, r)?;
    read_track_indices(&mut node, r)?;
    finish(node, r)
}

/// Articulation unit: a transition between phonemes. Children are either
/// per-pitch `ARTp`/`VQMp` parts or, for triphonemes, nested `ARTu` units.
pub fn read_articulation_unit(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let mut node = begin(r, ctx)?;
    let count = read_array_head(&mut node, r, "Count")?;
    node.read_field(r, "Index", 4, PropKind::U32)?;
    node.read_field(r, "TargetIndex1", 4, PropKind::U32)?;
    node.read_field(r, "TargetIndex2", 4, PropKind::U32)?;
    node.read_field(r, "TargetIndex3", 4, PropKind::U32)?;
    node.read_field(r, "TargetIndex4", 4, PropKind::U32)?;
    read_array_body(&mut node, r, ctx, count)?;
    finish(node, r)
}

/// Articulation per-pitch part. Carries two bulk-file offsets: the section
/// boundary and, 8 bytes later, the playback start.
pub fn read_articulation_part(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let mut node = begin(r, ctx)?;
    let count = read_array_head(&mut node, r, "Count")?;
    read_part_stats(&mut node, r)?;
    read_array_body(&mut node, r, ctx, count)?;

    node.read_field(r, "Frame count", 4, PropKind::U32)?;
    let frames = node.prop_u32("Frame count")?;
    let dir = read_frame_directory(r, frames)?;
    node.children.push(dir);

    read_snd_props(&mut node, r)?;
    node.read_field(r, "SND Sample offset+800", 8, PropKind::Hex64)?;

    node.read_field(r, "Section count", 4, PropKind::U32)?;
    let sections = node.prop_u32("Section count")?;
    if sections > 0 {
        let mut dir = ChunkNode::new(SIG_ITEM);
        dir.name = SECTIONS_NAME.into();
        dir.source_offset = r.stream_position()?;
        for i in 0..sections {
            dir.children.push(read_section(r, i)?);
        }
        dir.size = 16 * sections as u64;
        node.children.push(dir);
    }
    finish(node, r)
}

/// Voice-quality-morph part: frame references packed as one raw blob
/// instead of a directory of tracked slots.
pub fn read_vqmorph_part(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let mut node = begin(r, ctx)?;
    let count = read_array_head(&mut node, r, "Count")?;
    read_part_stats(&mut node, r)?;
    read_array_body(&mut node, r, ctx, count)?;
    node.read_field(r, "FrameDataSize", 4, PropKind::U32)?;

    node.read_field(r, "Frame count", 4, PropKind::U32)?;
    let frames = node.prop_u32("Frame count")?;
    node.read_field(r, "FrameRefs", 8 * frames as usize, PropKind::RawHex)?;

    read_snd_props(&mut node, r)?;
    read_track_indices(&mut node, r)?;
    finish(node, r)
}
