use crate::error::{Error, Result};
use std::io::{Read, Seek};

/// Stream bound shared by every decoder. Chunk bodies are read strictly
/// forward; `Seek` exists for skipping and for recording source offsets.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropKind {
    U8,
    U16,
    U32,
    S32,
    F32,
    F64,
    Hex64,
    RawHex,
}

/// One decoded field: interpretation tag, raw little-endian bytes, and the
/// absolute offset of the first data byte. The offset is kept so the repack
/// engine can overwrite the bytes in place without re-parsing.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub kind: PropKind,
    pub data: Vec<u8>,
    pub offset: u64,
}

/// Read exactly `len` bytes at the current position into a property.
/// Hitting end-of-stream is fatal for the current parse.
pub fn read_property(r: &mut dyn ReadSeek, len: usize, kind: PropKind) -> Result<Property> {
    let offset = r.stream_position()?;
    let mut data = vec![0u8; len];
    r.read_exact(&mut data)?;
    Ok(Property { kind, data, offset })
}

fn fixed<const N: usize>(data: &[u8]) -> Result<[u8; N]> {
    data.try_into().map_err(|_| Error::Width {
        expected: N,
        got: data.len(),
    })
}

impl Property {
    pub fn as_u8(&self) -> Result<u8> {
        Ok(u8::from_le_bytes(fixed::<1>(&self.data)?))
    }

    pub fn as_u16(&self) -> Result<u16> {
        Ok(u16::from_le_bytes(fixed::<2>(&self.data)?))
    }

    pub fn as_u32(&self) -> Result<u32> {
        Ok(u32::from_le_bytes(fixed::<4>(&self.data)?))
    }

    pub fn as_i32(&self) -> Result<i32> {
        Ok(i32::from_le_bytes(fixed::<4>(&self.data)?))
    }

    pub fn as_f32(&self) -> Result<f32> {
        Ok(f32::from_le_bytes(fixed::<4>(&self.data)?))
    }

    pub fn as_f64(&self) -> Result<f64> {
        Ok(f64::from_le_bytes(fixed::<8>(&self.data)?))
    }

    pub fn as_u64(&self) -> Result<u64> {
        Ok(u64::from_le_bytes(fixed::<8>(&self.data)?))
    }
}
