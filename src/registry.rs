use crate::decode::{container, dict, frame, region, segment, skip, sound};
use crate::error::{Error, Result};
use crate::field::ReadSeek;
use crate::node::{ChunkNode, sig_display};
use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom};
use std::sync::OnceLock;

/// Chunk header framing. Index-file (DDI) chunks carry an 8-byte reserved
/// qword ahead of the signature; bulk-file and dev-file chunks do not. The
/// style travels with the decode context, never as an ambient global.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderStyle {
    Indexed,
    Bare,
}

#[derive(Clone, Copy, Debug)]
pub struct DecodeCtx {
    pub style: HeaderStyle,
}

impl DecodeCtx {
    pub fn indexed() -> Self {
        DecodeCtx {
            style: HeaderStyle::Indexed,
        }
    }

    pub fn bare() -> Self {
        DecodeCtx {
            style: HeaderStyle::Bare,
        }
    }

    pub fn header_len(&self) -> u64 {
        match self.style {
            HeaderStyle::Indexed => 16,
            HeaderStyle::Bare => 8,
        }
    }
}

/// The generic per-chunk prologue: `[reserved qword] | signature | size`.
/// The meaning of `size` is fixed per chunk kind; decoders interpret it.
#[derive(Clone, Copy, Debug)]
pub struct ChunkHeader {
    pub start: u64,
    pub signature: [u8; 4],
    pub size: u64,
}

pub fn read_header(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkHeader> {
    let start = r.stream_position()?;
    if ctx.style == HeaderStyle::Indexed {
        let mut reserved = [0u8; 8];
        r.read_exact(&mut reserved)?;
    }
    let mut signature = [0u8; 4];
    r.read_exact(&mut signature)?;
    let mut size = [0u8; 4];
    r.read_exact(&mut size)?;
    Ok(ChunkHeader {
        start,
        signature,
        size: u32::from_le_bytes(size) as u64,
    })
}

pub fn expect_signature(hdr: &ChunkHeader, want: &[u8; 4]) -> Result<()> {
    if &hdr.signature != want {
        return Err(Error::Malformed(format!(
            "expected {} chunk at {:#x}, found {}",
            sig_display(want),
            hdr.start,
            sig_display(&hdr.signature)
        )));
    }
    Ok(())
}

/// Read the upcoming chunk's signature without consuming it.
pub fn peek_signature(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<[u8; 4]> {
    let pos = r.stream_position()?;
    if ctx.style == HeaderStyle::Indexed {
        r.seek(SeekFrom::Start(pos + 8))?;
    }
    let mut sig = [0u8; 4];
    r.read_exact(&mut sig)?;
    r.seek(SeekFrom::Start(pos))?;
    Ok(sig)
}

pub type DecodeFn = fn(&mut dyn ReadSeek, &DecodeCtx) -> Result<ChunkNode>;

static REGISTRY: OnceLock<HashMap<[u8; 4], DecodeFn>> = OnceLock::new();

fn table() -> &'static HashMap<[u8; 4], DecodeFn> {
    REGISTRY.get_or_init(|| {
        let mut t: HashMap<[u8; 4], DecodeFn> = HashMap::new();
        t.insert(*b"DBSe", container::read_root);
        t.insert(*b"DBV ", container::read_group);
        t.insert(*b"STA ", container::read_group);
        t.insert(*b"ART ", container::read_group);
        t.insert(*b"TMM ", container::read_timbre_model);
        t.insert(*b"PHDC", dict::read_phoneme_dictionary);
        t.insert(*b"STAu", segment::read_stationary_unit);
        t.insert(*b"STAp", segment::read_stationary_part);
        t.insert(*b"ARTu", segment::read_articulation_unit);
        t.insert(*b"ARTp", segment::read_articulation_part);
        t.insert(*b"VQMp", segment::read_vqmorph_part);
        t.insert(*b"SND ", sound::read_sound_node);
        t.insert(*b"FRM2", frame::read_frame);
        t.insert(*b"GTRK", region::read_generic_track);
        t.insert(*b"RGN ", region::read_region);
        t
    })
}

/// Construct and read the chunk kind registered for `sig`. Signatures with
/// no registered decoder fall back to the skip decoder, which records the
/// signature and size and seeks past the body, so unknown chunk kinds
/// never abort a tree decode.
pub fn read_for(sig: [u8; 4], r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    match table().get(&sig) {
        Some(decode) => decode(r, ctx),
        None => skip::read_skip(r, ctx),
    }
}

/// Peek the next signature and dispatch. Shared entry point of the tree
/// decoder and the bulk-file scanner.
pub fn read_next(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let sig = peek_signature(r, ctx)?;
    read_for(sig, r, ctx)
}
