use crate::decode::container::{SIG_DICT, SIG_ROOT};
use crate::error::{Error, Result};
use crate::node::ChunkNode;
use crate::registry::{DecodeCtx, peek_signature, read_next};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Conventional name of the voice database group in a decoded tree.
pub const VOICE_NAME: &str = "voice";

/// Load and decode an index file. The returned tree is the whole database
/// structure; bulk payloads stay in the paired bulk file until linked.
pub fn load_index(path: &Path) -> Result<ChunkNode> {
    let mut r = BufReader::new(File::open(path)?);
    let ctx = DecodeCtx::indexed();
    let sig = peek_signature(&mut r, &ctx)?;
    if sig != SIG_ROOT {
        return Err(Error::Format(format!(
            "{}: not an index file (leading signature {:?})",
            path.display(),
            crate::node::sig_display(&sig)
        )));
    }
    read_next(&mut r, &ctx)
}

/// Absolute end offset of the phoneme dictionary chunk. This is the splice
/// point where finalization inserts the bulk-file digest segment.
pub fn dictionary_end(root: &ChunkNode) -> Result<u64> {
    let dict = root
        .child_by_signature(&SIG_DICT)
        .ok_or_else(|| Error::Format("index tree has no phoneme dictionary".into()))?;
    Ok(dict.source_offset + dict.size)
}

/// The voice database node, the root of all stationary/articulation data.
pub fn voice_db(root: &ChunkNode) -> Result<&ChunkNode> {
    root.child_by_signature(b"DBV ")
        .ok_or_else(|| Error::Format("index tree has no voice database".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SIG_ITEM;

    #[test]
    fn dictionary_end_is_offset_plus_size() {
        let mut root = ChunkNode::new(SIG_ROOT);
        let mut dict = ChunkNode::new(SIG_DICT);
        dict.source_offset = 12;
        dict.size = 100;
        root.children.push(dict);
        assert_eq!(dictionary_end(&root).unwrap(), 112);

        let bare = ChunkNode::new(SIG_ITEM);
        assert!(dictionary_end(&bare).is_err());
    }
}
