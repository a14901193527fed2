use crate::ddb::index::DdbIndex;
use crate::ddi::VOICE_NAME;
use crate::decode::container::SIG_ARTICULATION;
use crate::error::Result;
use crate::node::{ChunkNode, NodePath};

pub const STATIONARY_PATH: [&str; 3] = [VOICE_NAME, "stationary", "normal"];
pub const ARTICULATION_PATH: [&str; 2] = [VOICE_NAME, "articulation"];

/// One resolved DDI-to-DDB association: the pitch segment (addressed by
/// its child-index chain from the root, never a second owner) and the
/// bulk-file sound chunk its stored offset pointed at.
#[derive(Debug)]
pub struct Link {
    pub segment: NodePath,
    pub sound: ChunkNode,
}

/// Outcome of a linkage pass: resolved associations plus whatever the
/// bulk file held that nothing referenced.
#[derive(Debug, Default)]
pub struct Linkage {
    pub links: Vec<Link>,
    pub orphans: Vec<ChunkNode>,
}

fn try_link(
    segment: &ChunkNode,
    path: NodePath,
    index: &mut DdbIndex,
    out: &mut Vec<Link>,
) -> Result<()> {
    let Some(prop) = segment.property("SND Sample offset") else {
        return Ok(());
    };
    let offset = prop.as_u64()?;
    match index.resolve_sound(offset) {
        Some(sound) => out.push(Link {
            segment: path,
            sound,
        }),
        None => log::warn!(
            "{} \"{}\": sample offset {offset:#x} has no bulk-file chunk",
            segment.sig_str(),
            segment.name
        ),
    }
    Ok(())
}

/// Resolve every pitch segment's stored sample offset against a scanned
/// bulk-file index, draining it. Misses leave segments unlinked; entries
/// left over are returned as orphans.
pub fn link_tree(root: &ChunkNode, mut index: DdbIndex) -> Result<Linkage> {
    let mut links = Vec::new();

    if let Some((base, normal)) = root.find_path_indexed(&STATIONARY_PATH) {
        for (u, unit) in normal.children.iter().enumerate() {
            for (p, pitch) in unit.children.iter().enumerate() {
                let mut path = base.clone();
                path.extend([u, p]);
                try_link(pitch, path, &mut index, &mut links)?;
            }
        }
    } else {
        log::warn!("index tree has no stationary voice data");
    }

    if let Some((base, articulation)) = root.find_path_indexed(&ARTICULATION_PATH) {
        for (a, ph1) in articulation.children.iter().enumerate() {
            for (b, ph2) in ph1.children.iter().enumerate() {
                if ph2.signature == SIG_ARTICULATION {
                    // Triphoneme container: one more phoneme level.
                    for (c, ph3) in ph2.children.iter().enumerate() {
                        for (p, pitch) in ph3.children.iter().enumerate() {
                            let mut path = base.clone();
                            path.extend([a, b, c, p]);
                            try_link(pitch, path, &mut index, &mut links)?;
                        }
                    }
                } else {
                    for (p, pitch) in ph2.children.iter().enumerate() {
                        let mut path = base.clone();
                        path.extend([a, b, p]);
                        try_link(pitch, path, &mut index, &mut links)?;
                    }
                }
            }
        }
    } else {
        log::warn!("index tree has no articulation voice data");
    }

    Ok(Linkage {
        links,
        orphans: index.into_orphans(),
    })
}
