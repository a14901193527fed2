use crate::ddi::VOICE_NAME;
use crate::decode::container::SIG_ARTICULATION;
use crate::decode::segment::FRAMES_NAME;
use crate::error::Result;
use crate::node::ChunkNode;
use crate::pitch::relative_pitch_to_note_name;
use std::collections::BTreeMap;

/// Ordered map of every bulk-file offset the tree references, labeled by
/// where the reference lives. The ordering doubles as a layout picture of
/// the bulk file itself.
pub type DdbLayout = BTreeMap<u64, String>;

fn add_segment(layout: &mut DdbLayout, segment: &ChunkNode, context: &str) -> Result<()> {
    let note = relative_pitch_to_note_name(segment.prop_f32("mPitch")?);

    if let Some(frames) = segment.child_by_name(FRAMES_NAME) {
        for (key, prop) in &frames.properties {
            if key == "Count" {
                continue;
            }
            layout.insert(prop.as_u64()?, format!("{context} @ {note} {key}"));
        }
    }
    layout.insert(
        segment.prop_u64("SND Sample offset")?,
        format!("{context} @ {note} Sound"),
    );
    Ok(())
}

/// Build the reference layout of the bulk file from a decoded index tree.
/// Segments missing from the tree simply contribute nothing; a segment
/// with malformed properties is an error.
pub fn ddb_layout(root: &ChunkNode) -> Result<DdbLayout> {
    let mut layout = DdbLayout::new();

    if let Some(stationary) = root.find_path(&[VOICE_NAME, "stationary"]) {
        for color in &stationary.children {
            for phoneme in &color.children {
                for segment in &phoneme.children {
                    let context = format!(
                        "Stationary {} > {} ({})",
                        color.name, phoneme.name, segment.name
                    );
                    add_segment(&mut layout, segment, &context)?;
                }
            }
        }
    }

    if let Some(articulation) = root.find_path(&[VOICE_NAME, "articulation"]) {
        for ph1 in &articulation.children {
            for ph2 in &ph1.children {
                if ph2.signature == SIG_ARTICULATION {
                    for ph3 in &ph2.children {
                        for segment in &ph3.children {
                            let context = format!(
                                "Triphone Articulation {} > [{} ~ {} ~ {}]",
                                segment.name, ph1.name, ph2.name, ph3.name
                            );
                            add_segment(&mut layout, segment, &context)?;
                        }
                    }
                    continue;
                }
                for segment in &ph2.children {
                    let context = format!(
                        "Articulation {} > [{} ~ {}]",
                        segment.name, ph1.name, ph2.name
                    );
                    add_segment(&mut layout, segment, &context)?;
                }
            }
        }
    }

    Ok(layout)
}
