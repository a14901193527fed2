//! Extraction task building: the flat, ephemeral model an exporter walks
//! to pull per-segment audio out of the bulk file. No files are written
//! here; export formatting lives with the consumer.

use crate::ddi::VOICE_NAME;
use crate::decode::container::SIG_ARTICULATION;
use crate::decode::segment::SECTIONS_NAME;
use crate::error::Result;
use crate::node::ChunkNode;
use crate::pitch::relative_pitch_to_midi;

/// Samples trimmed off a segment's declared count when computing the
/// exportable span.
pub const EXTRACT_TRIM_SAMPLES: u32 = 0x800;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    Stationary,
    Articulation,
}

/// Frame ranges of one articulation section: the entire span and its
/// stationary core.
#[derive(Clone, Copy, Debug)]
pub struct Section {
    pub begin: u32,
    pub end: u32,
    pub stationary_begin: u32,
    pub stationary_end: u32,
}

/// One contiguous sample window to export.
#[derive(Clone, Debug)]
pub struct ExtractTask {
    pub kind: TaskKind,
    pub ddb_offset: u64,
    pub extract_bytes: u32,
    pub midi_pitch: i32,
    pub voice_color: String,
    pub name: String,
    pub sections: Vec<Section>,
    pub phonemes: Vec<String>,
    pub total_frames: u32,
}

fn segment_window(segment: &ChunkNode) -> Result<(u64, u32, i32, u32)> {
    let offset = segment.prop_u64("SND Sample offset")?;
    let samples = segment.prop_u32("SND Sample count")?;
    let midi = relative_pitch_to_midi(segment.prop_f32("mPitch")?);
    let frames = segment.prop_u32("Frame count")?;
    if samples < EXTRACT_TRIM_SAMPLES {
        log::warn!(
            "{} \"{}\": sample count {samples} below trim margin",
            segment.sig_str(),
            segment.name
        );
    }
    let bytes = samples.saturating_sub(EXTRACT_TRIM_SAMPLES) * 2;
    Ok((offset, bytes, midi, frames))
}

fn read_sections(segment: &ChunkNode) -> Result<Vec<Section>> {
    let Some(dir) = segment.child_by_name(SECTIONS_NAME) else {
        return Ok(Vec::new());
    };
    let mut sections = Vec::with_capacity(dir.children.len());
    for sec in &dir.children {
        sections.push(Section {
            begin: sec.prop_u32("Entire section Begin")?,
            end: sec.prop_u32("Entire section End")?,
            stationary_begin: sec.prop_u32("Stationary section Begin")?,
            stationary_end: sec.prop_u32("Stationary section End")?,
        });
    }
    Ok(sections)
}

/// Build the extraction task list from a decoded index tree. Triphoneme
/// articulations are not yet covered and contribute no tasks.
pub fn build_tasks(root: &ChunkNode) -> Result<Vec<ExtractTask>> {
    let mut tasks = Vec::new();

    if let Some(stationary) = root.find_path(&[VOICE_NAME, "stationary"]) {
        for color in &stationary.children {
            for phoneme in &color.children {
                for segment in &phoneme.children {
                    let (ddb_offset, extract_bytes, midi_pitch, total_frames) =
                        segment_window(segment)?;
                    tasks.push(ExtractTask {
                        kind: TaskKind::Stationary,
                        ddb_offset,
                        extract_bytes,
                        midi_pitch,
                        voice_color: color.name.clone(),
                        name: phoneme.name.clone(),
                        sections: Vec::new(),
                        phonemes: vec![phoneme.name.clone()],
                        total_frames,
                    });
                }
            }
        }
    }

    if let Some(articulation) = root.find_path(&[VOICE_NAME, "articulation"]) {
        for ph1 in &articulation.children {
            for ph2 in &ph1.children {
                if ph2.signature == SIG_ARTICULATION {
                    continue;
                }
                for segment in &ph2.children {
                    let (ddb_offset, extract_bytes, midi_pitch, total_frames) =
                        segment_window(segment)?;
                    tasks.push(ExtractTask {
                        kind: TaskKind::Articulation,
                        ddb_offset,
                        extract_bytes,
                        midi_pitch,
                        voice_color: segment.name.clone(),
                        name: format!("{}[To]{}", ph1.name, ph2.name),
                        sections: read_sections(segment)?,
                        phonemes: vec![ph1.name.clone(), ph2.name.clone()],
                        total_frames,
                    });
                }
            }
        }
    }

    Ok(tasks)
}
