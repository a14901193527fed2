//! Dev-tree loose files: bare-header variants of the per-pitch segment
//! chunks in which the frame directory is materialized inline. A
//! stationary file holds one part; an articulation file holds a whole
//! unit with one part per pitch.

use crate::decode::container::{check_span, read_array_head, read_string_name};
use crate::decode::frame;
use crate::decode::sound::SoundChunk;
use crate::error::{Error, Result};
use crate::field::{PropKind, ReadSeek};
use crate::node::ChunkNode;
use crate::registry::{DecodeCtx, expect_signature, read_header};
use std::fs::File;
use std::io::{BufReader, Seek};
use std::path::Path;

/// One per-pitch segment read from a loose file: its in-use frame window,
/// every recorded frame, and the full sound payload.
#[derive(Debug)]
pub struct DevPart {
    pub node: ChunkNode,
    pub frame_count: u32,
    pub all_frame_count: u32,
    pub skip_frame_count: u32,
    pub frames: Vec<ChunkNode>,
    pub sound: SoundChunk,
}

impl DevPart {
    /// The frames that actually get streamed into a rebuilt bulk file:
    /// the in-use window inside the full recording.
    pub fn frames_to_write(&self) -> &[ChunkNode] {
        let from = self.skip_frame_count as usize;
        &self.frames[from..from + self.frame_count as usize]
    }
}

/// An articulation loose file: unit header plus one part per pitch.
#[derive(Debug)]
pub struct DevUnit {
    pub node: ChunkNode,
    pub parts: Vec<DevPart>,
}

fn read_frames_and_sound(
    node: &mut ChunkNode,
    r: &mut dyn ReadSeek,
    ctx: &DecodeCtx,
) -> Result<(u32, u32, Vec<ChunkNode>, SoundChunk)> {
    node.read_field(r, "All frame count", 4, PropKind::U32)?;
    node.read_field(r, "Skip frame count", 4, PropKind::U32)?;
    let all = node.prop_u32("All frame count")?;
    let skip = node.prop_u32("Skip frame count")?;
    let frame_count = node.prop_u32("Frame count")?;

    if skip as u64 + frame_count as u64 > all as u64 {
        return Err(Error::Malformed(format!(
            "{} \"{}\": frame window {skip}+{frame_count} exceeds recording of {all}",
            node.sig_str(),
            node.name
        )));
    }

    let mut frames = Vec::with_capacity(all as usize);
    for _ in 0..all {
        frames.push(frame::read_frame(r, ctx)?);
    }
    let sound = SoundChunk::read(r, ctx)?;
    Ok((all, skip, frames, sound))
}

/// Stationary loose file: a single bare-header `STAp` with inline frames.
pub fn read_stationary_part(r: &mut dyn ReadSeek) -> Result<DevPart> {
    let ctx = DecodeCtx::bare();
    let hdr = read_header(r, &ctx)?;
    expect_signature(&hdr, b"STAp")?;
    let mut node = ChunkNode::new(hdr.signature);
    node.source_offset = hdr.start;
    node.size = hdr.size;

    read_array_head(&mut node, r, "Count")?;
    node.read_field(r, "TimeInfo", 8, PropKind::Hex64)?;
    node.read_field(r, "Flags", 2, PropKind::U16)?;
    node.read_field(r, "mPitch", 4, PropKind::F32)?;
    node.read_field(r, "Average pitch", 4, PropKind::F32)?;
    node.read_field(r, "PitchDeviation", 4, PropKind::F32)?;
    node.read_field(r, "Dynamic", 4, PropKind::F32)?;
    node.read_field(r, "Tempo", 4, PropKind::F32)?;
    node.read_field(r, "LoopInfo", 4, PropKind::U32)?;
    node.read_field(r, "FrameDataSize", 4, PropKind::U32)?;
    node.read_field(r, "Frame count", 4, PropKind::U32)?;

    let (all, skip, frames, sound) = read_frames_and_sound(&mut node, r, &ctx)?;
    node.name = read_string_name(r)?;
    check_span(&node, r.stream_position()?)?;

    Ok(DevPart {
        frame_count: node.prop_u32("Frame count")?,
        all_frame_count: all,
        skip_frame_count: skip,
        frames,
        sound,
        node,
    })
}

fn read_articulation_part(r: &mut dyn ReadSeek) -> Result<DevPart> {
    let ctx = DecodeCtx::bare();
    let hdr = read_header(r, &ctx)?;
    expect_signature(&hdr, b"ARTp")?;
    let mut node = ChunkNode::new(hdr.signature);
    node.source_offset = hdr.start;
    node.size = hdr.size;

    read_array_head(&mut node, r, "Count")?;
    node.read_field(r, "TimeInfo", 8, PropKind::Hex64)?;
    node.read_field(r, "Flags", 2, PropKind::U16)?;
    node.read_field(r, "mPitch", 4, PropKind::F32)?;
    node.read_field(r, "Average pitch", 4, PropKind::F32)?;
    node.read_field(r, "PitchDeviation", 4, PropKind::F32)?;
    node.read_field(r, "Dynamic", 4, PropKind::F32)?;
    node.read_field(r, "Tempo", 4, PropKind::F32)?;
    node.read_field(r, "Frame count", 4, PropKind::U32)?;

    let (all, skip, frames, sound) = read_frames_and_sound(&mut node, r, &ctx)?;
    node.name = read_string_name(r)?;
    check_span(&node, r.stream_position()?)?;

    Ok(DevPart {
        frame_count: node.prop_u32("Frame count")?,
        all_frame_count: all,
        skip_frame_count: skip,
        frames,
        sound,
        node,
    })
}

/// Articulation loose file: a bare-header `ARTu` whose children are one
/// `ARTp` per pitch.
pub fn read_articulation_unit(r: &mut dyn ReadSeek) -> Result<DevUnit> {
    let ctx = DecodeCtx::bare();
    let hdr = read_header(r, &ctx)?;
    expect_signature(&hdr, b"ARTu")?;
    let mut node = ChunkNode::new(hdr.signature);
    node.source_offset = hdr.start;
    node.size = hdr.size;

    let count = read_array_head(&mut node, r, "Count")?;
    node.read_field(r, "Index", 4, PropKind::U32)?;
    node.read_field(r, "TargetIndex1", 4, PropKind::U32)?;
    node.read_field(r, "TargetIndex2", 4, PropKind::U32)?;
    node.read_field(r, "TargetIndex3", 4, PropKind::U32)?;
    node.read_field(r, "TargetIndex4", 4, PropKind::U32)?;

    let mut parts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        parts.push(read_articulation_part(r)?);
    }
    node.name = read_string_name(r)?;
    check_span(&node, r.stream_position()?)?;

    Ok(DevUnit { node, parts })
}

pub fn load_stationary_part(path: &Path) -> Result<DevPart> {
    read_stationary_part(&mut BufReader::new(File::open(path)?))
}

pub fn load_articulation_unit(path: &Path) -> Result<DevUnit> {
    read_articulation_unit(&mut BufReader::new(File::open(path)?))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Byte builders for synthetic loose files.

    pub fn put_u32(b: &mut Vec<u8>, v: u32) {
        b.extend_from_slice(&v.to_le_bytes());
    }

    pub fn frame_chunk(fill: u8, body_len: usize) -> Vec<u8> {
        let mut b = b"FRM2".to_vec();
        put_u32(&mut b, (body_len + 8) as u32);
        b.extend(std::iter::repeat(fill).take(body_len));
        b
    }

    pub fn snd_chunk(rate: u32, samples: &[i16]) -> Vec<u8> {
        let mut b = b"SND ".to_vec();
        put_u32(&mut b, 10 + 2 * samples.len() as u32);
        put_u32(&mut b, rate);
        b.extend_from_slice(&1u16.to_le_bytes());
        put_u32(&mut b, samples.len() as u32);
        for s in samples {
            b.extend_from_slice(&s.to_le_bytes());
        }
        b
    }

    fn part_body(
        frame_count: u32,
        all: u32,
        skip: u32,
        samples: &[i16],
        name: &str,
        loop_info: bool,
    ) -> Vec<u8> {
        let mut b = Vec::new();
        put_u32(&mut b, 0); // Count
        b.extend_from_slice(&0u64.to_le_bytes()); // TimeInfo
        b.extend_from_slice(&0u16.to_le_bytes()); // Flags
        for v in [0.0f32, 440.0, 0.0, 1.0, 120.0] {
            b.extend_from_slice(&v.to_le_bytes());
        }
        if loop_info {
            put_u32(&mut b, 0); // LoopInfo
            put_u32(&mut b, 0x40); // FrameDataSize
        }
        put_u32(&mut b, frame_count);
        put_u32(&mut b, all);
        put_u32(&mut b, skip);
        for i in 0..all {
            b.extend_from_slice(&frame_chunk(i as u8, 4));
        }
        b.extend_from_slice(&snd_chunk(44100, samples));
        put_u32(&mut b, name.len() as u32);
        b.extend_from_slice(name.as_bytes());
        b
    }

    fn bare(sig: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = sig.to_vec();
        put_u32(&mut out, (body.len() + 8) as u32);
        out.extend_from_slice(body);
        out
    }

    pub fn stationary_file(
        frame_count: u32,
        all: u32,
        skip: u32,
        samples: &[i16],
        name: &str,
    ) -> Vec<u8> {
        bare(b"STAp", &part_body(frame_count, all, skip, samples, name, true))
    }

    pub fn articulation_file(parts: &[(u32, u32, u32, Vec<i16>, String)], name: &str) -> Vec<u8> {
        let mut body = Vec::new();
        put_u32(&mut body, parts.len() as u32);
        for v in [0u32; 5] {
            put_u32(&mut body, v); // Index, TargetIndex1..4
        }
        for (frame_count, all, skip, samples, part_name) in parts {
            body.extend_from_slice(&bare(
                b"ARTp",
                &part_body(*frame_count, *all, *skip, samples, part_name, false),
            ));
        }
        put_u32(&mut body, name.len() as u32);
        body.extend_from_slice(name.as_bytes());
        bare(b"ARTu", &body)
    }
}
