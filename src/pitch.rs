//! Pitch conversions shared by the layout export and the extraction task
//! builder. Segment headers store pitch as octaves relative to A4.

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub const MIDI_A4: i32 = 69;

pub fn relative_pitch_to_midi(relative: f32) -> i32 {
    MIDI_A4 + (12.0 * relative as f64).round() as i32
}

/// Scientific pitch notation, middle C (midi 60) = "C4".
pub fn midi_to_note_name(midi: i32) -> String {
    let octave = midi.div_euclid(12) - 1;
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    format!("{name}{octave}")
}

pub fn relative_pitch_to_note_name(relative: f32) -> String {
    midi_to_note_name(relative_pitch_to_midi(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_reference() {
        assert_eq!(relative_pitch_to_midi(0.0), 69);
        assert_eq!(midi_to_note_name(69), "A4");
        assert_eq!(midi_to_note_name(60), "C4");
    }

    #[test]
    fn octave_steps() {
        assert_eq!(relative_pitch_to_midi(1.0), 81);
        assert_eq!(relative_pitch_to_midi(-1.0), 57);
        assert_eq!(relative_pitch_to_note_name(-0.75), "C4");
    }
}
