use crate::error::{Error, Result};
use crate::field::{PropKind, ReadSeek};
use crate::node::ChunkNode;
use crate::registry::{DecodeCtx, expect_signature, read_header};
use std::io::{Read, Seek, SeekFrom};

pub const SIG_SOUND: [u8; 4] = *b"SND ";

/// Bytes from the start of a sound chunk to its first sample: signature,
/// size, rate, channel count, sample count.
pub const SND_HEADER_LEN: u64 = 0x12;

/// Samples of slack kept on each side of a playback range when slicing.
pub const GUARD_SAMPLES: i64 = 0x400;

/// A PCM sound chunk. Unlike every other kind, the stored size field counts
/// only the bytes after itself, so the total span is `size + 8`.
#[derive(Clone, Debug)]
pub struct SoundChunk {
    pub source_offset: u64,
    /// Total on-disk span including signature and size field.
    pub size: u64,
    pub sample_rate: u32,
    pub channel_count: u16,
    pub sample_count: u32,
    /// 16-bit little-endian samples. Empty when only metadata was read.
    pub data: Vec<u8>,
    /// Absolute stream position of the first PCM byte.
    pub sample_offset: u64,
}

fn read_prologue(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<(u64, u64, u32, u16, u32)> {
    let hdr = read_header(r, ctx)?;
    expect_signature(&hdr, &SIG_SOUND)?;
    let total = hdr.size + 8;

    let mut buf4 = [0u8; 4];
    let mut buf2 = [0u8; 2];
    r.read_exact(&mut buf4)?;
    let sample_rate = u32::from_le_bytes(buf4);
    r.read_exact(&mut buf2)?;
    let channel_count = u16::from_le_bytes(buf2);
    r.read_exact(&mut buf4)?;
    let sample_count = u32::from_le_bytes(buf4);

    if total != SND_HEADER_LEN + 2 * sample_count as u64 {
        return Err(Error::Malformed(format!(
            "SND at {:#x}: span {:#x} does not match sample count {}",
            hdr.start, total, sample_count
        )));
    }
    Ok((hdr.start, total, sample_rate, channel_count, sample_count))
}

impl SoundChunk {
    /// Read a full sound chunk, samples included.
    pub fn read(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<SoundChunk> {
        let (start, total, sample_rate, channel_count, sample_count) = read_prologue(r, ctx)?;
        let mut data = vec![0u8; 2 * sample_count as usize];
        r.read_exact(&mut data)?;
        Ok(SoundChunk {
            source_offset: start,
            size: total,
            sample_rate,
            channel_count,
            sample_count,
            data,
            sample_offset: start + SND_HEADER_LEN,
        })
    }

    /// Read the prologue only and seek past the samples. Used by the bulk
    /// scanner, which must not hold every chunk's PCM in memory at once.
    pub fn read_meta(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<SoundChunk> {
        let (start, total, sample_rate, channel_count, sample_count) = read_prologue(r, ctx)?;
        r.seek(SeekFrom::Start(start + total))?;
        Ok(SoundChunk {
            source_offset: start,
            size: total,
            sample_rate,
            channel_count,
            sample_count,
            data: Vec::new(),
            sample_offset: start + SND_HEADER_LEN,
        })
    }

    /// Re-encode samples `[from, to)` as a fresh, self-contained chunk
    /// with its own header and size, clamping: a negative start clamps to
    /// zero, an end past the chunk clamps to the chunk, and an inverted
    /// range degrades to the full chunk rather than failing. The full
    /// range reproduces the original chunk byte for byte.
    pub fn truncated(&self, from: i64, to: i64) -> Result<Vec<u8>> {
        if self.data.is_empty() && self.sample_count > 0 {
            return Err(Error::Format(format!(
                "SND at {:#x}: samples were not materialized",
                self.source_offset
            )));
        }
        let mut from = from.max(0);
        let mut to = to.min(self.sample_count as i64);
        if from >= to {
            log::warn!(
                "SND at {:#x}: inverted sample range {from}..{to}, keeping full chunk",
                self.source_offset
            );
            from = 0;
            to = self.sample_count as i64;
        }
        let count = (to - from) as u32;
        let mut out = Vec::with_capacity(SND_HEADER_LEN as usize + 2 * count as usize);
        out.extend_from_slice(&SIG_SOUND);
        out.extend_from_slice(&(10 + 2 * count).to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&self.channel_count.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&self.data[2 * from as usize..2 * to as usize]);
        Ok(out)
    }

    /// Wrap the chunk as a tree node, keeping the PCM as payload.
    pub fn into_node(self) -> ChunkNode {
        let mut node = ChunkNode::new(SIG_SOUND);
        node.source_offset = self.source_offset;
        node.size = self.size;
        node.payload = self.data;
        let put = |v: Vec<u8>, kind| crate::field::Property {
            kind,
            data: v,
            offset: 0,
        };
        node.properties.push((
            "Sample rate".into(),
            put(self.sample_rate.to_le_bytes().to_vec(), PropKind::U32),
        ));
        node.properties.push((
            "Channel count".into(),
            put(self.channel_count.to_le_bytes().to_vec(), PropKind::U16),
        ));
        node.properties.push((
            "Sample count".into(),
            put(self.sample_count.to_le_bytes().to_vec(), PropKind::U32),
        ));
        node
    }
}

/// Registry decoder: full read, PCM retained as node payload.
pub fn read_sound_node(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    Ok(SoundChunk::read(r, ctx)?.into_node())
}
