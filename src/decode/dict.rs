use crate::error::Result;
use crate::field::{PropKind, ReadSeek};
use crate::node::{ChunkNode, SIG_ITEM};
use crate::registry::{DecodeCtx, read_header};
use std::io::{Read, Seek};

use super::container::{check_span, read_array_head};

/// On-disk span of one phonetic-unit record: 18 name bytes plus the four
/// flag fields.
pub const PHONETIC_UNIT_LEN: u64 = 31;

pub const DICT_NAME: &str = "<Phoneme Dictionary>";
pub const PHONEMES_NAME: &str = "<Phonemes>";

/// One phonetic unit: an 18-byte zero-padded name followed by index and
/// envelope/voicing flags.
fn read_phonetic_unit(r: &mut dyn ReadSeek) -> Result<ChunkNode> {
    let start = r.stream_position()?;
    let mut raw = [0u8; 18];
    r.read_exact(&mut raw)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());

    let mut unit = ChunkNode::new(SIG_ITEM);
    unit.name = String::from_utf8_lossy(&raw[..end]).into_owned();
    unit.source_offset = start;
    unit.size = PHONETIC_UNIT_LEN;
    unit.read_field(r, "Phoneme index", 4, PropKind::U32)?;
    unit.read_field(r, "Has EpR envelope", 4, PropKind::U32)?;
    unit.read_field(r, "Has resonance envelope", 4, PropKind::U32)?;
    unit.read_field(r, "Unvoiced", 1, PropKind::U8)?;
    Ok(unit)
}

/// Phoneme dictionary: a count followed by that many fixed-width phonetic
/// units, grouped under a synthetic `<Phonemes>` directory so path lookups
/// stay uniform with the rest of the tree.
pub fn read_phoneme_dictionary(r: &mut dyn ReadSeek, ctx: &DecodeCtx) -> Result<ChunkNode> {
    let hdr = read_header(r, ctx)?;
    let mut node = ChunkNode::new(hdr.signature);
    node.name = DICT_NAME.into();
    node.source_offset = hdr.start;
    node.size = hdr.size;

    let count = read_array_head(&mut node, r, "Phoneme count")?;

    let mut phonemes = ChunkNode::new(SIG_ITEM);
    phonemes.name = PHONEMES_NAME.into();
    phonemes.source_offset = r.stream_position()?;
    for _ in 0..count {
        phonemes.children.push(read_phonetic_unit(r)?);
    }
    phonemes.size = r.stream_position()? - phonemes.source_offset;
    node.children.push(phonemes);

    check_span(&node, r.stream_position()?)?;
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn unit_bytes(name: &str, index: u32, unvoiced: u8) -> Vec<u8> {
        let mut b = vec![0u8; 18];
        b[..name.len()].copy_from_slice(name.as_bytes());
        b.extend_from_slice(&index.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&1u32.to_le_bytes());
        b.push(unvoiced);
        b
    }

    fn dict_bytes(units: &[Vec<u8>]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&(units.len() as u32).to_le_bytes());
        for u in units {
            body.extend_from_slice(u);
        }
        let mut out = vec![0u8; 8]; // reserved qword
        out.extend_from_slice(b"PHDC");
        out.extend_from_slice(&((body.len() + 16) as u32).to_le_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn reads_units_into_phonemes_directory() {
        let bytes = dict_bytes(&[unit_bytes("a", 0, 0), unit_bytes("Sil", 1, 1)]);
        let mut c = Cursor::new(bytes);
        let node = read_phoneme_dictionary(&mut c, &DecodeCtx::indexed()).unwrap();
        assert_eq!(node.name, DICT_NAME);
        assert_eq!(node.prop_u32("Phoneme count").unwrap(), 2);

        let phonemes = node.child_by_name(PHONEMES_NAME).unwrap();
        assert_eq!(phonemes.children.len(), 2);
        assert_eq!(phonemes.children[0].name, "a");
        assert_eq!(phonemes.children[1].name, "Sil");
        assert_eq!(phonemes.children[1].prop_u32("Phoneme index").unwrap(), 1);
        assert_eq!(
            phonemes.children[1].property("Unvoiced").unwrap().as_u8().unwrap(),
            1
        );
        assert_eq!(c.position(), node.size);
    }

    #[test]
    fn name_padding_is_trimmed_at_first_nul() {
        let mut c = Cursor::new(unit_bytes("aI", 7, 0));
        let unit = read_phonetic_unit(&mut c).unwrap();
        assert_eq!(unit.name, "aI");
        assert_eq!(unit.size, PHONETIC_UNIT_LEN);
    }
}
