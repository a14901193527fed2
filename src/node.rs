use crate::error::{Error, Result};
use crate::field::{PropKind, Property, ReadSeek, read_property};

/// Signature used for synthetic in-tree records (frame directories, section
/// tables, phonetic units) that have no signature of their own on disk.
pub const SIG_ITEM: [u8; 4] = *b"----";

/// A non-owning address of a node: the chain of child indices from the root.
pub type NodePath = Vec<usize>;

/// One structural unit of the database. The parent exclusively owns its
/// children; "referred" relations elsewhere use a [`NodePath`] instead of a
/// second owner.
#[derive(Clone, Debug, Default)]
pub struct ChunkNode {
    pub signature: [u8; 4],
    pub name: String,
    /// Byte position of the chunk in the stream it was read from.
    pub source_offset: u64,
    /// Total byte span of the chunk including its own header.
    pub size: u64,
    /// Ordered field table. Keys are unique within a node; insertion order
    /// is preserved for display and export.
    pub properties: Vec<(String, Property)>,
    pub children: Vec<ChunkNode>,
    /// Raw body bytes, kept only for payload-bearing kinds (PCM samples,
    /// streaming frames). Empty everywhere else.
    pub payload: Vec<u8>,
}

impl ChunkNode {
    pub fn new(signature: [u8; 4]) -> Self {
        ChunkNode {
            signature,
            name: sig_display(&signature),
            ..Default::default()
        }
    }

    pub fn sig_str(&self) -> String {
        sig_display(&self.signature)
    }

    pub fn insert(&mut self, name: &str, prop: Property) -> Result<()> {
        if self.properties.iter().any(|(k, _)| k == name) {
            return Err(Error::Format(format!(
                "duplicate property \"{name}\" in {} chunk",
                self.sig_str()
            )));
        }
        self.properties.push((name.to_string(), prop));
        Ok(())
    }

    /// Read a fixed-width field at the current position and file it under
    /// `name`, recording the source offset for later patch-back.
    pub fn read_field(
        &mut self,
        r: &mut dyn ReadSeek,
        name: &str,
        len: usize,
        kind: PropKind,
    ) -> Result<()> {
        let prop = read_property(r, len, kind)?;
        self.insert(name, prop)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, p)| p)
    }

    fn require(&self, name: &str) -> Result<&Property> {
        self.property(name).ok_or_else(|| {
            Error::Format(format!(
                "{} \"{}\": missing property \"{name}\"",
                self.sig_str(),
                self.name
            ))
        })
    }

    pub fn prop_u8(&self, name: &str) -> Result<u8> {
        self.require(name)?.as_u8()
    }

    pub fn prop_u32(&self, name: &str) -> Result<u32> {
        self.require(name)?.as_u32()
    }

    pub fn prop_u64(&self, name: &str) -> Result<u64> {
        self.require(name)?.as_u64()
    }

    pub fn prop_f32(&self, name: &str) -> Result<f32> {
        self.require(name)?.as_f32()
    }

    pub fn child_by_name(&self, name: &str) -> Option<&ChunkNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_by_signature(&self, sig: &[u8; 4]) -> Option<&ChunkNode> {
        self.children.iter().find(|c| &c.signature == sig)
    }

    /// Walk a chain of child names from this node.
    pub fn find_path(&self, names: &[&str]) -> Option<&ChunkNode> {
        let mut cur = self;
        for name in names {
            cur = cur.child_by_name(name)?;
        }
        Some(cur)
    }

    /// Like [`find_path`], but also yields the child-index chain so callers
    /// can keep a non-owning handle to the found node.
    pub fn find_path_indexed(&self, names: &[&str]) -> Option<(NodePath, &ChunkNode)> {
        let mut cur = self;
        let mut path = NodePath::new();
        for name in names {
            let idx = cur.children.iter().position(|c| &c.name == name)?;
            path.push(idx);
            cur = &cur.children[idx];
        }
        Some((path, cur))
    }

    /// Resolve a [`NodePath`] produced against this node.
    pub fn node_at(&self, path: &[usize]) -> Option<&ChunkNode> {
        let mut cur = self;
        for &idx in path {
            cur = cur.children.get(idx)?;
        }
        Some(cur)
    }
}

pub fn sig_display(sig: &[u8; 4]) -> String {
    sig.iter()
        .map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(v: u32) -> Property {
        Property {
            kind: PropKind::U32,
            data: v.to_le_bytes().to_vec(),
            offset: 0,
        }
    }

    #[test]
    fn property_order_is_preserved() {
        let mut n = ChunkNode::new(*b"TEST");
        n.insert("b", prop(1)).unwrap();
        n.insert("a", prop(2)).unwrap();
        let keys: Vec<_> = n.properties.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(n.prop_u32("a").unwrap(), 2);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut n = ChunkNode::new(*b"TEST");
        n.insert("a", prop(1)).unwrap();
        assert!(n.insert("a", prop(2)).is_err());
    }

    #[test]
    fn path_search_and_node_handles() {
        let mut root = ChunkNode::new(*b"ROOT");
        let mut voice = ChunkNode::new(SIG_ITEM);
        voice.name = "voice".into();
        let mut sta = ChunkNode::new(SIG_ITEM);
        sta.name = "stationary".into();
        voice.children.push(sta);
        root.children.push(voice);

        let (path, node) = root.find_path_indexed(&["voice", "stationary"]).unwrap();
        assert_eq!(node.name, "stationary");
        assert_eq!(path, vec![0, 0]);
        assert_eq!(root.node_at(&path).unwrap().name, "stationary");
        assert!(root.find_path(&["voice", "missing"]).is_none());
    }
}
