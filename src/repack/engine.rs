//! Rebuild a DDI/DDB pair from a dev tree: an index tree file plus loose
//! per-segment recordings. Runs as a strict sequence of phases; a
//! validation failure aborts before any output file is touched.

use crate::ddi::{self, VOICE_NAME};
use crate::decode::container::{HASH_SEGMENT_LEN, SIG_ARTICULATION};
use crate::decode::segment::FRAMES_NAME;
use crate::decode::sound::{GUARD_SAMPLES, SND_HEADER_LEN};
use crate::devdb::{self, DevPart};
use crate::error::{Error, Result};
use crate::node::ChunkNode;
use crate::progress::ProgressSink;
use crate::repack::naming;
use crate::repack::patch::PatchList;

use md4::{Digest, Md4};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Fixed 12-byte prefix of a finalized index file.
const SPLICE_HEADER: [u8; 12] = *b"\0\0\0\0\0\0\0\0DBSe";

#[derive(Clone, Copy, Debug)]
pub struct RepackOptions {
    /// Run the dev-tree consistency check before writing anything.
    pub validate: bool,
}

impl Default for RepackOptions {
    fn default() -> Self {
        RepackOptions { validate: true }
    }
}

#[derive(Debug)]
pub struct RepackOutcome {
    pub ddi_path: PathBuf,
    pub ddb_path: PathBuf,
    /// Lowercase hex digest of the rebuilt bulk file.
    pub digest: String,
}

/// Sample window around a segment's playback start. All arithmetic runs
/// in f64 and truncates, matching the stored values bit for bit across
/// repacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleWindow {
    pub playback_start: i64,
    pub from: i64,
    pub to: i64,
}

impl SampleWindow {
    /// Guard samples actually kept ahead of the playback start.
    pub fn padding_before(&self) -> i64 {
        self.playback_start - self.from
    }

    /// Samples available from the playback start to the window end.
    pub fn available(&self) -> i64 {
        self.to - self.playback_start
    }

    pub fn span(&self) -> i64 {
        self.to - self.from
    }
}

/// Compute the window for a recording of `sample_count` samples spread
/// over `all_frames` frames, skipping `skip_frames` and keeping
/// `frame_count`, with `0x400` guard samples on each side.
pub fn sample_window(
    sample_count: u32,
    all_frames: u32,
    skip_frames: u32,
    frame_count: u32,
) -> Result<SampleWindow> {
    if all_frames == 0 {
        return Err(Error::Malformed("recording declares zero frames".into()));
    }
    let spf = sample_count as f64 / all_frames as f64;
    let playback_start = (spf * skip_frames as f64) as i64;
    let from = (playback_start - GUARD_SAMPLES).max(0);
    let to = ((playback_start as f64 + spf * frame_count as f64 + GUARD_SAMPLES as f64) as i64)
        .min(sample_count as i64);
    Ok(SampleWindow {
        playback_start,
        from,
        to,
    })
}

struct LeafRef<'a> {
    segment: &'a ChunkNode,
    /// Loose-file path shared by the leaf (articulation units share one
    /// file across their pitch segments).
    file: PathBuf,
    /// Index of this segment's part within the loose file.
    part_index: usize,
    /// How many pitch segments the tree's unit holds; a shared
    /// articulation file must carry exactly this many parts.
    part_count: usize,
    label: String,
    stationary: bool,
}

fn collect_leaves<'a>(root: &'a ChunkNode, dev_root: &Path) -> Result<Vec<LeafRef<'a>>> {
    let mut leaves = Vec::new();

    if let Some(stationary) = root.find_path(&[VOICE_NAME, "stationary"]) {
        for color in &stationary.children {
            for phoneme in &color.children {
                for segment in &phoneme.children {
                    leaves.push(LeafRef {
                        segment,
                        file: naming::stationary_path(
                            dev_root,
                            &color.name,
                            &phoneme.name,
                            &segment.name,
                        ),
                        part_index: 0,
                        part_count: 1,
                        label: format!("{}/{}/{}", color.name, phoneme.name, segment.name),
                        stationary: true,
                    });
                }
            }
        }
    }

    if let Some(articulation) = root.find_path(&[VOICE_NAME, "articulation"]) {
        for ph1 in &articulation.children {
            for ph2 in &ph1.children {
                if ph2.signature == SIG_ARTICULATION {
                    for ph3 in &ph2.children {
                        let file =
                            naming::articulation_path(dev_root, &[&ph1.name, &ph2.name, &ph3.name]);
                        for (i, segment) in ph3.children.iter().enumerate() {
                            leaves.push(LeafRef {
                                segment,
                                file: file.clone(),
                                part_index: i,
                                part_count: ph3.children.len(),
                                label: format!(
                                    "{}-{}-{}/{}",
                                    ph1.name, ph2.name, ph3.name, segment.name
                                ),
                                stationary: false,
                            });
                        }
                    }
                    continue;
                }
                let file = naming::articulation_path(dev_root, &[&ph1.name, &ph2.name]);
                for (i, segment) in ph2.children.iter().enumerate() {
                    leaves.push(LeafRef {
                        segment,
                        file: file.clone(),
                        part_index: i,
                        part_count: ph2.children.len(),
                        label: format!("{}-{}/{}", ph1.name, ph2.name, segment.name),
                        stationary: false,
                    });
                }
            }
        }
    }

    Ok(leaves)
}

fn resolve_file(leaf: &LeafRef) -> Result<PathBuf> {
    let resolved = if leaf.stationary {
        leaf.file.exists().then(|| leaf.file.clone())
    } else {
        naming::with_part_fallback(leaf.file.clone())
    };
    resolved.ok_or_else(|| {
        Error::Consistency(format!(
            "{}: missing source file {}",
            leaf.label,
            leaf.file.display()
        ))
    })
}

enum LoadedLeaf {
    Part(DevPart),
    /// The file exists but cannot be read; skip the leaf with a warning.
    Skipped,
}

fn load_leaf(leaf: &LeafRef, path: &Path) -> Result<LoadedLeaf> {
    let loaded = if leaf.stationary {
        devdb::load_stationary_part(path)
    } else {
        devdb::load_articulation_unit(path).and_then(|mut unit| {
            if unit.parts.len() != leaf.part_count {
                return Err(Error::Consistency(format!(
                    "{}: file {} has {} parts, tree has {} pitch segments",
                    leaf.label,
                    path.display(),
                    unit.parts.len(),
                    leaf.part_count
                )));
            }
            Ok(unit.parts.swap_remove(leaf.part_index))
        })
    };
    match loaded {
        Ok(part) => Ok(LoadedLeaf::Part(part)),
        Err(Error::Io(e)) => {
            log::warn!("{}: cannot read {}: {e}", leaf.label, path.display());
            Ok(LoadedLeaf::Skipped)
        }
        Err(e) => Err(e),
    }
}

/// Pre-write validation: every leaf's loose file must exist, and its
/// declared frame count must match the tree's. Articulation units must
/// carry exactly as many parts as the tree has pitch segments.
fn validate(leaves: &[LeafRef], progress: &mut dyn ProgressSink) -> Result<()> {
    progress.begin("validate", leaves.len() as u64);
    for leaf in leaves {
        if progress.cancelled() {
            return Err(Error::Cancelled);
        }
        let path = resolve_file(leaf)?;
        let part = match load_leaf(leaf, &path)? {
            LoadedLeaf::Part(part) => part,
            LoadedLeaf::Skipped => {
                progress.advance(1);
                continue;
            }
        };
        let tree_frames = leaf.segment.prop_u32("Frame count")?;
        if part.frame_count != tree_frames {
            return Err(Error::Consistency(format!(
                "{}: frame count mismatch (tree {tree_frames}, file {})",
                leaf.label, part.frame_count
            )));
        }
        progress.advance(1);
    }
    Ok(())
}

struct DdbWriter {
    out: BufWriter<File>,
    position: u64,
}

impl DdbWriter {
    fn create(path: &Path) -> Result<DdbWriter> {
        Ok(DdbWriter {
            out: BufWriter::new(File::create(path)?),
            position: 0,
        })
    }

    /// Append a block, returning the offset it landed at.
    fn write_block(&mut self, bytes: &[u8]) -> Result<u64> {
        let at = self.position;
        self.out.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(at)
    }

    fn finish(mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Stream one leaf: frames first, then the windowed sound payload, with
/// every stored offset queued for patch-back.
fn stream_leaf(
    leaf: &LeafRef,
    part: &DevPart,
    ddb: &mut DdbWriter,
    patches: &mut PatchList,
) -> Result<()> {
    let frames_dir = leaf.segment.child_by_name(FRAMES_NAME).ok_or_else(|| {
        Error::Consistency(format!("{}: segment has no frame directory", leaf.label))
    })?;
    let slots: Vec<_> = frames_dir
        .properties
        .iter()
        .filter(|(key, _)| key != "Count")
        .collect();
    let frames = part.frames_to_write();
    if slots.len() != frames.len() {
        return Err(Error::Consistency(format!(
            "{}: tree has {} frame slots, file provides {}",
            leaf.label,
            slots.len(),
            frames.len()
        )));
    }

    for ((_, slot), frame) in slots.iter().zip(frames) {
        let at = ddb.write_block(&frame.payload)?;
        patches.push_u64(slot.offset, at);
    }

    let window = sample_window(
        part.sound.sample_count,
        part.all_frame_count,
        part.skip_frame_count,
        part.frame_count,
    )?;
    let padding = window.padding_before();
    if leaf.stationary {
        let spf = part.sound.sample_count as f64 / part.all_frame_count as f64;
        let wanted = spf * part.frame_count as f64 + GUARD_SAMPLES as f64;
        if padding < GUARD_SAMPLES || (window.available() as f64) < wanted {
            log::warn!(
                "{}: short window (padding {padding}, available {})",
                leaf.label,
                window.available()
            );
        }
    } else if padding < GUARD_SAMPLES {
        log::warn!("{}: short leading padding {padding}", leaf.label);
    }

    let block = ddb.write_block(&part.sound.truncated(window.from, window.to)?)?;

    let offset_prop = leaf
        .segment
        .property("SND Sample offset")
        .ok_or_else(|| Error::Consistency(format!("{}: segment has no sample offset", leaf.label)))?;
    let count_prop = leaf
        .segment
        .property("SND Sample count")
        .ok_or_else(|| Error::Consistency(format!("{}: segment has no sample count", leaf.label)))?;

    if leaf.stationary {
        patches.push_u64(
            offset_prop.offset,
            block + SND_HEADER_LEN + 2 * padding as u64,
        );
        patches.push_u32(count_prop.offset, window.available() as u32);
    } else {
        let playback_prop = leaf.segment.property("SND Sample offset+800").ok_or_else(|| {
            Error::Consistency(format!("{}: segment has no playback offset", leaf.label))
        })?;
        patches.push_u64(offset_prop.offset, block + SND_HEADER_LEN);
        patches.push_u64(
            playback_prop.offset,
            block + SND_HEADER_LEN + 2 * padding as u64,
        );
        patches.push_u32(count_prop.offset, window.span() as u32);
    }
    Ok(())
}

/// Warn about loose files under the dev root that no tree leaf references.
fn sweep_unreferenced(dev_root: &Path, referenced: &HashSet<PathBuf>) {
    for entry in WalkDir::new(dev_root.join("voice"))
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file() && !referenced.contains(entry.path()) {
            log::warn!("unreferenced dev file {}", entry.path().display());
        }
    }
}

fn compute_digest(path: &Path) -> Result<String> {
    let mut r = BufReader::new(File::open(path)?);
    let mut hasher = Md4::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Splice the digest segment into the index file right after the phoneme
/// dictionary, under the fixed 12-byte header. Byte-exact layout: header,
/// dictionary bytes, 260-byte digest block, remainder.
fn finalize_index(ddi_path: &Path, dict_end: u64, digest: &str) -> Result<()> {
    let phase1 = fs::read(ddi_path)?;
    if (dict_end as usize) > phase1.len() || dict_end < SPLICE_HEADER.len() as u64 {
        return Err(Error::Format(format!(
            "dictionary end {dict_end:#x} outside index file of {} bytes",
            phase1.len()
        )));
    }
    let mut segment = digest.as_bytes().to_vec();
    segment.resize(HASH_SEGMENT_LEN, 0);

    let mut out = Vec::with_capacity(phase1.len() + HASH_SEGMENT_LEN);
    out.extend_from_slice(&SPLICE_HEADER);
    out.extend_from_slice(&phase1[SPLICE_HEADER.len()..dict_end as usize]);
    out.extend_from_slice(&segment);
    out.extend_from_slice(&phase1[dict_end as usize..]);
    fs::write(ddi_path, out)?;
    Ok(())
}

/// Rebuild a DDI/DDB pair under `out_dir` from the index tree at
/// `tree_path` and the loose files under `dev_root`.
pub fn repack(
    tree_path: &Path,
    dev_root: &Path,
    out_dir: &Path,
    opts: &RepackOptions,
    progress: &mut dyn ProgressSink,
) -> Result<RepackOutcome> {
    let root = ddi::load_index(tree_path)?;
    let dict_end = ddi::dictionary_end(&root)?;
    let leaves = collect_leaves(&root, dev_root)?;

    if opts.validate {
        validate(&leaves, progress)?;
    }

    let stem = tree_path
        .file_stem()
        .ok_or_else(|| Error::Format(format!("{}: no file name", tree_path.display())))?;
    let ddi_path = out_dir.join(stem).with_extension("ddi");
    let ddb_path = out_dir.join(stem).with_extension("ddb");
    fs::copy(tree_path, &ddi_path)?;

    let mut ddb = DdbWriter::create(&ddb_path)?;
    let mut patches = PatchList::default();
    let mut referenced = HashSet::new();

    progress.begin("pack", leaves.len() as u64);
    for leaf in &leaves {
        if progress.cancelled() {
            return Err(Error::Cancelled);
        }
        let path = resolve_file(leaf)?;
        referenced.insert(path.clone());
        match load_leaf(leaf, &path)? {
            LoadedLeaf::Part(part) => stream_leaf(leaf, &part, &mut ddb, &mut patches)?,
            LoadedLeaf::Skipped => {}
        }
        progress.advance(1);
    }
    ddb.finish()?;
    sweep_unreferenced(dev_root, &referenced);

    {
        let mut ddi = OpenOptions::new().read(true).write(true).open(&ddi_path)?;
        patches.apply(&mut ddi)?;
        ddi.flush()?;
    }

    let digest = compute_digest(&ddb_path)?;
    finalize_index(&ddi_path, dict_end, &digest)?;

    Ok(RepackOutcome {
        ddi_path,
        ddb_path,
        digest,
    })
}
