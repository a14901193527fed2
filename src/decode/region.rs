use crate::error::Result;
use crate::field::{PropKind, ReadSeek};
use crate::node::ChunkNode;
use crate::registry::{DecodeCtx, read_header};

use super::{frame, skip};

pub const SIG_TRACK: [u8; 4] = *b"GTRK";
pub const SIG_REGION: [u8; 4] = *b"RGN ";

/// Generic track: fixed prologue, then a counted run of regions.
pub fn read_generic_track(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let hdr = read_header(r, ctx)?;
    let mut node = ChunkNode::new(hdr.signature);
    node.source_offset = hdr.start;
    node.size = hdr.size;

    node.read_field(r, "TrackType", 4, PropKind::U32)?;
    node.read_field(r, "Flags", 4, PropKind::U32)?;
    node.read_field(r, "SampleRate", 4, PropKind::U32)?;
    node.read_field(r, "Duration", 8, PropKind::F64)?;
    node.read_field(r, "FrameRate", 4, PropKind::U32)?;
    node.read_field(r, "Precision", 1, PropKind::U8)?;
    node.read_field(r, "Region count", 4, PropKind::U32)?;

    let regions = node.prop_u32("Region count")?;
    for i in 0..regions {
        let mut region = read_region(r, ctx)?;
        region.name = format!("Region {i}");
        node.children.push(region);
    }
    Ok(node)
}

/// A track region: two flag bytes gate its variable-length tail. Flags are
/// read once, then tested; every conditional field's length comes from
/// flags or counts read earlier in the same record, never from looking
/// ahead.
pub fn read_region(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let hdr = read_header(r, ctx)?;
    let mut node = ChunkNode::new(hdr.signature);
    node.source_offset = hdr.start;
    node.size = hdr.size;

    node.read_field(r, "TimeOffset", 8, PropKind::F64)?;
    node.read_field(r, "RegionType", 1, PropKind::U8)?;

    node.read_field(r, "Flags1", 1, PropKind::U8)?;
    let flags1 = node.prop_u8("Flags1")?;
    if flags1 & 0x01 != 0 {
        node.read_field(r, "ExtFlags", 4, PropKind::U32)?;
        node.read_field(r, "AttackTime", 4, PropKind::F32)?;
        node.read_field(r, "ReleaseTime", 4, PropKind::F32)?;
        node.read_field(r, "SustainLevel", 4, PropKind::F32)?;
        node.read_field(r, "DecayTime", 4, PropKind::F32)?;
        node.read_field(r, "PeakLevel", 4, PropKind::F32)?;
        node.read_field(r, "InitialLevel", 4, PropKind::F32)?;
        node.read_field(r, "FinalLevel", 4, PropKind::F32)?;
        node.read_field(r, "VibratoDepth", 4, PropKind::F32)?;
        node.read_field(r, "VibratoRate", 8, PropKind::F64)?;
        node.read_field(r, "VibratoDelay", 8, PropKind::F64)?;
        node.read_field(r, "PitchBendData", 80, PropKind::RawHex)?;
        node.read_field(r, "DynamicsData", 160, PropKind::RawHex)?;
        node.read_field(r, "ExpressionData", 28, PropKind::RawHex)?;
    }
    if flags1 & 0x02 != 0 {
        node.read_field(r, "VoiceType", 1, PropKind::U8)?;
    }
    if flags1 & 0x04 != 0 {
        node.read_field(r, "ScoringNoteIndex", 4, PropKind::U32)?;
    }
    if flags1 & 0x08 != 0 {
        node.read_field(r, "SegmentCount", 4, PropKind::U32)?;
        let n = node.prop_u32("SegmentCount")?;
        node.read_field(r, "SegmentData", n as usize * 16, PropKind::RawHex)?;
    }
    if flags1 & 0x10 != 0 {
        node.read_field(r, "PitchPointCount", 4, PropKind::U32)?;
        let n = node.prop_u32("PitchPointCount")?;
        node.read_field(r, "PitchContour", n as usize * 8, PropKind::RawHex)?;
    }
    if flags1 & 0x20 != 0 {
        node.read_field(r, "TimbreParams", 24, PropKind::RawHex)?;
        node.read_field(r, "StableBegin", 4, PropKind::U32)?;
        node.read_field(r, "StableEnd", 4, PropKind::U32)?;
    }
    if flags1 & 0x40 != 0 {
        node.read_field(r, "ExtraParams", 48, PropKind::RawHex)?;
    }

    node.read_field(r, "Flags2", 1, PropKind::U8)?;
    let flags2 = node.prop_u8("Flags2")?;
    // Envelope bodies are uninterpreted; each set bit means one chunk.
    for bit in [0x01u8, 0x02, 0x04, 0x08, 0x10, 0x20] {
        if flags2 & bit != 0 {
            node.children.push(skip::read_skip(r, ctx)?);
        }
    }
    if flags2 & 0x40 != 0 {
        node.read_field(r, "Stable region begin", 4, PropKind::U32)?;
        node.read_field(r, "Stable region end", 4, PropKind::U32)?;
    }

    node.read_field(r, "Frame count", 4, PropKind::U32)?;
    let frames = node.prop_u32("Frame count")?;
    for i in 0..frames {
        let mut f = frame::read_frame(r, ctx)?;
        f.name = format!("Frame {i:05}");
        node.children.push(f);
    }
    Ok(node)
}
