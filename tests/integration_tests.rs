//! Black-box tests driving the public `tako::compile` entry point,
//! mirroring the six end-to-end scenarios in `spec.md` §8.

use tako::ir::IrEvent;
use tako::rational::Rat;
use tako::{compile, SourceProvider};

struct NoModules;
impl SourceProvider for NoModules {
    fn load(&self, _specifier: &str) -> Option<(String, String)> {
        None
    }
}

fn compile_ok(source: &str) -> tako::IrDocument {
    let outcome = compile(source, &NoModules);
    assert!(outcome.ir.is_some(), "expected successful compile, got diagnostics: {:?}", outcome.diagnostics);
    outcome.ir.unwrap()
}

/// Scenario 1: minimal score — tempo, meter, one sound, one empty track.
#[test]
fn minimal_score() {
    let source = r#"
        fn main() {
            return score {
                tempo { 1:1 -> 120bpm; }
                meter { 1:1 -> 4/4; }
                sound "p" kind instrument {}
                track "P" role Instrument sound "p" {}
            };
        }
    "#;
    let doc = compile_ok(source);

    assert_eq!(doc.tako.ir_version, 4);
    assert_eq!(doc.tempo_map.len(), 1);
    assert_eq!(doc.tempo_map[0].at, Rat::ZERO);
    assert_eq!(doc.tempo_map[0].bpm, 120.0);
    assert_eq!(doc.tempo_map[0].unit, Rat::new(1, 4));

    assert_eq!(doc.meter_map.len(), 1);
    assert_eq!(doc.meter_map[0].at, Rat::ZERO);
    assert_eq!(doc.meter_map[0].numerator, 4);
    assert_eq!(doc.meter_map[0].denominator, 4);

    assert_eq!(doc.sounds.len(), 1);
    assert_eq!(doc.sounds[0].id, "p");
    assert_eq!(doc.tracks.len(), 1);
    assert_eq!(doc.tracks[0].placements.len(), 0);
}

/// Scenario 2: two quarter notes placed at bar 1 beat 1.
#[test]
fn two_quarter_notes() {
    let source = r#"
        fn main() {
            return score {
                tempo { 1:1 -> 120bpm; }
                meter { 1:1 -> 4/4; }
                sound "p" kind instrument {}
                track "P" role Instrument sound "p" {
                    place 1:1 clip { note(C4, q); note(E4, q); };
                }
            };
        }
    "#;
    let doc = compile_ok(source);

    let events = &doc.tracks[0].placements[0].clip.events;
    assert_eq!(events.len(), 2);

    match &events[0] {
        IrEvent::Note { start, dur, pitch, .. } => {
            assert_eq!(*start, Rat::ZERO);
            assert_eq!(*dur, Rat::new(1, 4));
            assert_eq!(pitch.midi, 60);
            assert_eq!(pitch.cents, 0);
        }
        other => panic!("expected a note event, got {:?}", other),
    }
    match &events[1] {
        IrEvent::Note { start, dur, pitch, .. } => {
            assert_eq!(*start, Rat::new(1, 4));
            assert_eq!(*dur, Rat::new(1, 4));
            assert_eq!(pitch.midi, 64);
            assert_eq!(pitch.cents, 0);
        }
        other => panic!("expected a note event, got {:?}", other),
    }
}

/// Scenario 3: bar/beat resolution in 6/8 — bar 2 beat 1 resolves to 3/4.
#[test]
fn bar_beat_resolution_in_six_eight() {
    let source = r#"
        fn main() {
            return score {
                tempo { 1:1 -> 120bpm; }
                meter { 1:1 -> 6/8; }
                sound "p" kind instrument {}
                track "P" role Instrument sound "p" {
                    place 2:1 clip { note(C4, q); };
                }
            };
        }
    "#;
    let doc = compile_ok(source);

    let placement = &doc.tracks[0].placements[0];
    assert_eq!(placement.at, Rat::new(3, 4));
}

/// Scenario 4: repeat and concat combine lengths and preserve event order.
#[test]
fn repeat_and_concat() {
    let source = r#"
        import { repeat, concat } from "std:core";

        fn main() {
            return score {
                tempo { 1:1 -> 120bpm; }
                meter { 1:1 -> 4/4; }
                sound "p" kind instrument {}
                track "P" role Instrument sound "p" {
                    place 1:1 concat(repeat(clip { note(C4, q); }, 3), clip { note(G4, h); });
                }
            };
        }
    "#;
    let doc = compile_ok(source);

    let clip = &doc.tracks[0].placements[0].clip;
    assert_eq!(clip.length, Some(Rat::new(5, 4)));
    assert_eq!(clip.events.len(), 4);

    let expected_starts = [Rat::ZERO, Rat::new(1, 4), Rat::new(2, 4), Rat::new(3, 4)];
    let expected_midis = [60, 60, 60, 67];
    let expected_durs = [Rat::new(1, 4), Rat::new(1, 4), Rat::new(1, 4), Rat::new(1, 2)];

    for (i, ev) in clip.events.iter().enumerate() {
        match ev {
            IrEvent::Note { start, dur, pitch, .. } => {
                assert_eq!(*start, expected_starts[i], "event {i} start");
                assert_eq!(*dur, expected_durs[i], "event {i} dur");
                assert_eq!(pitch.midi, expected_midis[i], "event {i} pitch");
            }
            other => panic!("expected a note event at index {i}, got {:?}", other),
        }
    }
}

/// Scenario 5: a type error surfaces and suppresses IR emission.
#[test]
fn rest_with_a_position_is_a_type_error() {
    let source = r#"
        fn main() {
            return score {
                tempo { 1:1 -> 120bpm; }
                meter { 1:1 -> 4/4; }
                sound "p" kind instrument {}
                track "P" role Instrument sound "p" {
                    place 1:1 clip { rest(1:1); };
                }
            };
        }
    "#;
    let outcome = compile(source, &NoModules);
    assert!(outcome.ir.is_none());
    assert!(outcome.diagnostics.iter().any(|d| d.code == "expected-duration" && d.severity == tako::Severity::Error));
}

/// Scenario 6: a template literal with an embedded arithmetic expression.
#[test]
fn template_literal_with_embedded_expression() {
    let source = r#"
        fn main() {
            const title = "Price: \$${5 + 5}";
            return score {
                tempo { 1:1 -> 120bpm; }
                meter { 1:1 -> 4/4; }
                meta { title: title }
                sound "p" kind instrument {}
                track "P" role Instrument sound "p" {}
            };
        }
    "#;
    let doc = compile_ok(source);
    assert_eq!(doc.meta.title.as_deref(), Some("Price: $10"));
}

/// A score with zero tracks compiles to an IR with an empty tracks array.
#[test]
fn zero_tracks_is_well_formed() {
    let source = r#"
        fn main() {
            return score {
                tempo { 1:1 -> 120bpm; }
                meter { 1:1 -> 4/4; }
            };
        }
    "#;
    let doc = compile_ok(source);
    assert!(doc.tracks.is_empty());
}

/// Integer division in source code produces a rational, not a float.
#[test]
fn integer_division_produces_a_rational() {
    let source = r#"
        fn main() {
            const half = 3 / 2;
            return score {
                tempo { 1:1 -> 120bpm; }
                meter { 1:1 -> 4/4; }
                meta { title: "${half}" }
            };
        }
    "#;
    let doc = compile_ok(source);
    assert_eq!(doc.meta.title.as_deref(), Some("1.5"));
}

/// A track whose sound id is unknown is reported rather than panicking.
#[test]
fn unknown_sound_is_reported() {
    let source = r#"
        fn main() {
            return score {
                tempo { 1:1 -> 120bpm; }
                meter { 1:1 -> 4/4; }
                track "P" role Instrument sound "missing" {}
            };
        }
    "#;
    let outcome = compile(source, &NoModules);
    assert!(outcome.diagnostics.iter().any(|d| d.code == "unknown-sound"));
}
