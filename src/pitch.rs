//! # Pitch
//!
//! A resolved pitch: a MIDI note number plus a cents deviation, produced by
//! lexing pitch literals like `C4`, `D#5`, `Eb-1` (see `lexer.rs`) and
//! consumed by `note`/`chord` evaluation and IR serialization.

use serde::{Deserialize, Serialize};

/// `{ midi, cents }`. `cents` is a deviation in the open interval `(-100,
/// 100)`; exactly ±100 should have been folded into `midi` by whoever built
/// the value, but the lexer itself only ever produces `cents: 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    pub midi: i32,
    pub cents: i32,
}

impl Pitch {
    pub fn new(midi: i32, cents: i32) -> Pitch {
        Pitch { midi, cents }
    }

    /// Parse a pitch literal's letter/accidental/octave into a MIDI number.
    /// `midi = (octave + 1) * 12 + class`, so `C4` is 60.
    pub fn from_letter(letter: char, accidental: Option<char>, octave: i32) -> Option<Pitch> {
        let class = pitch_class(letter)?;
        let class = match accidental {
            Some('#') => class + 1,
            Some('b') => class - 1,
            Some(_) | None => class,
        };
        let midi = (octave + 1) * 12 + class;
        Some(Pitch { midi, cents: 0 })
    }

    pub fn transpose(self, semitones: i32) -> Pitch {
        Pitch { midi: self.midi + semitones, cents: self.cents }
    }
}

fn pitch_class(letter: char) -> Option<i32> {
    match letter.to_ascii_uppercase() {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c4_is_midi_60() {
        assert_eq!(Pitch::from_letter('C', None, 4), Some(Pitch::new(60, 0)));
    }

    #[test]
    fn sharp_and_flat_accidentals() {
        assert_eq!(Pitch::from_letter('D', Some('#'), 5), Some(Pitch::new(75, 0)));
        assert_eq!(Pitch::from_letter('E', Some('b'), -1), Some(Pitch::new(15, 0)));
    }

    #[test]
    fn transpose_composition() {
        let c4 = Pitch::from_letter('C', None, 4).unwrap();
        let up7 = c4.transpose(7).transpose(5);
        assert_eq!(up7, c4.transpose(12));
    }
}
