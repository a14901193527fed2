//! Byte builders for synthetic index trees and dev-tree loose files.

pub fn put_u32(b: &mut Vec<u8>, v: u32) {
    b.extend_from_slice(&v.to_le_bytes());
}

pub fn put_u64(b: &mut Vec<u8>, v: u64) {
    b.extend_from_slice(&v.to_le_bytes());
}

pub fn put_name(b: &mut Vec<u8>, name: &str) {
    put_u32(b, name.len() as u32);
    b.extend_from_slice(name.as_bytes());
}

/// Index-file chunk: reserved qword, signature, size covering the whole
/// chunk, body.
pub fn indexed(sig: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; 8];
    out.extend_from_slice(sig);
    put_u32(&mut out, (body.len() + 16) as u32);
    out.extend_from_slice(body);
    out
}

/// Bulk/dev-file chunk: signature, size covering the whole chunk, body.
pub fn bare(sig: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = sig.to_vec();
    put_u32(&mut out, (body.len() + 8) as u32);
    out.extend_from_slice(body);
    out
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

fn part_stats(b: &mut Vec<u8>) {
    put_u64(b, 0); // TimeInfo
    b.extend_from_slice(&0u16.to_le_bytes()); // Flags
    for v in [0.0f32, 440.0, 0.0, 1.0, 120.0] {
        b.extend_from_slice(&v.to_le_bytes());
    }
}

fn snd_ref_props(b: &mut Vec<u8>) {
    put_u32(b, 44100); // SND Sample rate
    b.extend_from_slice(&1u16.to_le_bytes()); // SND Channel count
    put_u32(b, 0); // SND Sample count, patched on repack
    put_u64(b, 0); // SND Sample offset, patched on repack
}

/// Stationary per-pitch chunk as stored in an index tree: empty frame
/// reference slots, to be filled in by a repack.
pub fn tree_stationary_part(frame_count: u32, name: &str) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, 0); // Count
    part_stats(&mut body);
    put_u32(&mut body, 0); // LoopInfo
    put_u32(&mut body, 0x40); // FrameDataSize
    put_u32(&mut body, frame_count);
    put_u32(&mut body, frame_count); // directory count
    for _ in 0..frame_count {
        put_u64(&mut body, 0);
    }
    snd_ref_props(&mut body);
    for _ in 0..4 {
        body.extend_from_slice(&(-1i32).to_le_bytes());
    }
    put_name(&mut body, name);
    indexed(b"STAp", &body)
}

pub fn tree_articulation_part(frame_count: u32, name: &str) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, 0); // Count
    part_stats(&mut body);
    put_u32(&mut body, frame_count);
    put_u32(&mut body, frame_count); // directory count
    for _ in 0..frame_count {
        put_u64(&mut body, 0);
    }
    snd_ref_props(&mut body);
    put_u64(&mut body, 0); // SND Sample offset+800, patched on repack
    put_u32(&mut body, 0); // Section count
    put_name(&mut body, name);
    indexed(b"ARTp", &body)
}

pub fn tree_stationary_unit(parts: &[Vec<u8>], name: &str) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, parts.len() as u32);
    put_u32(&mut body, 0); // Index
    body.extend_from_slice(&880.0f32.to_le_bytes()); // PitchRangeHigh
    body.extend_from_slice(&110.0f32.to_le_bytes()); // PitchRangeLow
    for p in parts {
        body.extend_from_slice(p);
    }
    put_name(&mut body, name);
    indexed(b"STAu", &body)
}

pub fn tree_articulation_unit(parts: &[Vec<u8>], name: &str) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, parts.len() as u32);
    for _ in 0..5 {
        put_u32(&mut body, 0); // Index, TargetIndex1..4
    }
    for p in parts {
        body.extend_from_slice(p);
    }
    put_name(&mut body, name);
    indexed(b"ARTu", &body)
}

pub fn tree_group(sig: &[u8; 4], children: &[Vec<u8>], name: &str) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, children.len() as u32);
    for c in children {
        body.extend_from_slice(c);
    }
    put_name(&mut body, name);
    indexed(sig, &body)
}

pub fn phoneme_dictionary(names: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, names.len() as u32);
    for (i, name) in names.iter().enumerate() {
        let mut raw = [0u8; 18];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        body.extend_from_slice(&raw);
        put_u32(&mut body, i as u32); // Phoneme index
        put_u32(&mut body, 0); // Has EpR envelope
        put_u32(&mut body, 0); // Has resonance envelope
        body.push(0); // Unvoiced
    }
    indexed(b"PHDC", &body)
}

pub fn root_tree(children: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    for c in children {
        body.extend_from_slice(c);
    }
    indexed(b"DBSe", &body)
}

/// Dev-tree stationary loose file: part header, inline frames, full PCM.
pub fn dev_stationary_file(
    frame_count: u32,
    all: u32,
    skip: u32,
    samples: &[i16],
    name: &str,
) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, 0); // Count
    part_stats(&mut body);
    put_u32(&mut body, 0); // LoopInfo
    put_u32(&mut body, 0x40); // FrameDataSize
    put_u32(&mut body, frame_count);
    put_u32(&mut body, all);
    put_u32(&mut body, skip);
    for i in 0..all {
        body.extend_from_slice(&frame_chunk(i as u8, 4));
    }
    body.extend_from_slice(&snd_chunk(44100, samples));
    put_name(&mut body, name);
    bare(b"STAp", &body)
}

fn dev_articulation_part(
    frame_count: u32,
    all: u32,
    skip: u32,
    samples: &[i16],
    name: &str,
) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, 0); // Count
    part_stats(&mut body);
    put_u32(&mut body, frame_count);
    put_u32(&mut body, all);
    put_u32(&mut body, skip);
    for i in 0..all {
        body.extend_from_slice(&frame_chunk(0x40 + i as u8, 4));
    }
    body.extend_from_slice(&snd_chunk(44100, samples));
    put_name(&mut body, name);
    bare(b"ARTp", &body)
}

/// Dev-tree articulation loose file: unit wrapping one part per pitch.
pub fn dev_articulation_file(
    parts: &[(u32, u32, u32, Vec<i16>)],
    part_names: &[&str],
    name: &str,
) -> Vec<u8> {
    let mut body = Vec::new();
    put_u32(&mut body, parts.len() as u32);
    for _ in 0..5 {
        put_u32(&mut body, 0);
    }
    for ((frame_count, all, skip, samples), part_name) in parts.iter().zip(part_names) {
        body.extend_from_slice(&dev_articulation_part(
            *frame_count,
            *all,
            *skip,
            samples,
            part_name,
        ));
    }
    put_name(&mut body, name);
    bare(b"ARTu", &body)
}
