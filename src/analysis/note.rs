//! Equal-temperament note naming (A4 = 440 Hz).
//!
//! Frequencies map to MIDI numbers through `69 + 12·log2(f / 440)`. The
//! nearest semitone names the note; the remainder in hundredths of a semitone
//! is the cents deviation, kept in (−50, 50] so that a frequency exactly
//! between two notes reads as the lower note +50.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub const A4_HZ: f64 = 440.0;
pub const A4_MIDI: i32 = 69;

/// Names for the full MIDI range, "C-1" through "G9"
static MIDI_NAMES: Lazy<Vec<String>> = Lazy::new(|| (0..128).map(format_name).collect());

fn format_name(midi: i32) -> String {
    let pitch_class = midi.rem_euclid(12) as usize;
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", NOTE_NAMES[pitch_class], octave)
}

/// Nearest note to a frequency and the deviation from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteInfo {
    pub midi: i32,
    /// Pitch class and octave, e.g. "E2", "C#4"
    pub name: String,
    /// Deviation from the named note in cents, in (−50, 50]
    pub cents: f32,
}

/// Fractional MIDI number of a frequency
pub fn frequency_to_midi(frequency_hz: f32) -> f64 {
    A4_MIDI as f64 + 12.0 * (frequency_hz as f64 / A4_HZ).log2()
}

pub fn midi_to_frequency(midi: i32) -> f32 {
    (A4_HZ * 2f64.powf((midi - A4_MIDI) as f64 / 12.0)) as f32
}

/// Note name including octave ("A2" and "A3" are different notes)
pub fn note_name(midi: i32) -> String {
    match usize::try_from(midi) {
        Ok(index) if index < MIDI_NAMES.len() => MIDI_NAMES[index].clone(),
        _ => format_name(midi),
    }
}

/// Map a frequency to its nearest note
///
/// Returns None for non-positive or non-finite input.
pub fn describe(frequency_hz: f32) -> Option<NoteInfo> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return None;
    }
    let (midi, cents) = split_midi(frequency_to_midi(frequency_hz));
    Some(NoteInfo {
        midi,
        name: note_name(midi),
        cents,
    })
}

/// Nearest semitone and cents remainder; ties round down
fn split_midi(exact: f64) -> (i32, f32) {
    let nearest = (exact - 0.5).ceil();
    let cents = ((exact - nearest) * 100.0) as f32;
    // Narrowing to f32 can land a hair below the tie exactly on -50
    if cents <= -50.0 {
        (nearest as i32 - 1, 50.0)
    } else {
        (nearest as i32, cents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_pitches() {
        let a4 = describe(440.0).unwrap();
        assert_eq!(a4.name, "A4");
        assert_eq!(a4.midi, 69);
        assert!(a4.cents.abs() < 1e-3);

        let low_e = describe(82.41).unwrap();
        assert_eq!(low_e.name, "E2");
        assert!(low_e.cents.abs() < 1.0);

        assert_eq!(describe(261.63).unwrap().name, "C4");
        assert_eq!(describe(277.18).unwrap().name, "C#4");
    }

    #[test]
    fn test_octave_is_part_of_the_name() {
        assert_eq!(describe(110.0).unwrap().name, "A2");
        assert_eq!(describe(220.0).unwrap().name, "A3");
    }

    #[test]
    fn test_cents_stay_in_half_open_range() {
        // Exactly halfway between A4 and A#4
        assert_eq!(split_midi(69.5), (69, 50.0));
        let (midi, cents) = split_midi(68.5);
        assert_eq!(midi, 68);
        assert_eq!(cents, 50.0);

        let sharp = describe(445.0).unwrap();
        assert_eq!(sharp.name, "A4");
        assert!(sharp.cents > 19.0 && sharp.cents < 20.0);

        let flat = describe(435.0).unwrap();
        assert_eq!(flat.name, "A4");
        assert!(flat.cents < -19.0 && flat.cents > -21.0);
    }

    fn assert_round_trip(frequency_hz: f32) {
        let info = describe(frequency_hz).unwrap();
        assert!(
            info.cents > -50.0 && info.cents <= 50.0,
            "{} Hz gave {} cents",
            frequency_hz,
            info.cents
        );
        // The named note is the nearest semitone, within f32 rounding
        let semitones = 12.0 * (frequency_hz as f64 / midi_to_frequency(info.midi) as f64).log2();
        assert!(
            semitones.abs() <= 0.5 + 1e-5,
            "{} Hz named {} is {} semitones away",
            frequency_hz,
            info.name,
            semitones
        );
        assert_eq!(info.name, note_name(info.midi));
    }

    #[test]
    fn test_round_trip_over_guitar_range() {
        // Dense logarithmic sweep of [50, 2000] Hz, ~1/4 cent apart
        let steps = 30_000;
        for i in 0..=steps {
            let frequency = 50.0 * 40f64.powf(i as f64 / steps as f64);
            assert_round_trip(frequency as f32);
        }
    }

    #[test]
    fn test_round_trip_around_semitone_boundaries() {
        for midi in 31..=96 {
            let boundary = (A4_HZ * 2f64.powf((midi as f64 - 0.5 - A4_MIDI as f64) / 12.0)) as f32;
            let bits = boundary.to_bits();
            for offset in 0..=200u32 {
                for candidate in [bits - offset, bits + offset] {
                    let frequency = f32::from_bits(candidate);
                    if (50.0..=2_000.0).contains(&frequency) {
                        assert_round_trip(frequency);
                    }
                }
            }
        }
    }

    #[test]
    fn test_narrowed_tie_stays_in_range() {
        // Just under a tie; narrowing the cents to f32 rounds to -50
        let (midi, cents) = split_midi(70.0 - 0.5 + 1e-12);
        assert_eq!((midi, cents), (69, 50.0));
    }

    #[test]
    fn test_invalid_frequencies() {
        assert!(describe(0.0).is_none());
        assert!(describe(-10.0).is_none());
        assert!(describe(f32::NAN).is_none());
    }

    #[test]
    fn test_midi_frequency_conversion() {
        assert!((midi_to_frequency(69) - 440.0).abs() < 1e-3);
        assert!((midi_to_frequency(40) - 82.407).abs() < 1e-2);
        assert!((frequency_to_midi(880.0) - 81.0).abs() < 1e-9);
        assert_eq!(note_name(40), "E2");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(-1), "B-2");
    }
}
