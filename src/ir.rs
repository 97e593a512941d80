//! # IR Normalizer
//!
//! Converts an evaluated [`ScoreValue`] into the canonical, backend-agnostic
//! IR document described in `SPEC_FULL.md` §4.6 and §6.3: resolves every
//! symbolic [`PosAtom`] against the score's meter map, splices clip events
//! into their track placements, validates the invariants in spec.md §3.3,
//! sorts events, and serializes.
//!
//! Per the propagation policy in spec.md §7, this stage never halts:
//! [`normalize`] always returns a document, folding invariant violations
//! into warnings rather than an `Err`. This mirrors the teacher's
//! `to_musicxml` — a pure, infallible `&Score -> String` transform — except
//! this one also hands back the diagnostics it accumulated along the way.

use std::collections::HashSet;

use serde::Serialize;

use crate::diagnostics::Diagnostic;
use crate::eval::value::{ClipEvent, ObjectMap, RuntimeValue, ScoreValue};
use crate::pos::{PosAtom, PosRef};
use crate::rational::Rat;

/// The one IR schema version this crate emits; see spec.md §6.3.
pub const IR_VERSION: u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TakoVersion {
    #[serde(rename = "irVersion")]
    pub ir_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrDocument {
    pub tako: TakoVersion,
    pub meta: IrMeta,
    #[serde(rename = "tempoMap")]
    pub tempo_map: Vec<IrTempoEvent>,
    #[serde(rename = "meterMap")]
    pub meter_map: Vec<IrMeterEvent>,
    pub sounds: Vec<IrSoundDecl>,
    pub tracks: Vec<IrTrack>,
    pub markers: Vec<IrMarker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct IrMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrTempoEvent {
    pub at: Rat,
    pub bpm: f64,
    pub unit: Rat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrMeterEvent {
    pub at: Rat,
    pub numerator: i64,
    pub denominator: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrSoundDecl {
    pub id: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transposition: Option<i64>,
    #[serde(rename = "drumKeys", skip_serializing_if = "Option::is_none")]
    pub drum_keys: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocal: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrTrack {
    pub name: String,
    pub role: String,
    pub sound: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mix: Option<serde_json::Value>,
    pub placements: Vec<IrPlacement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrPlacement {
    pub at: Rat,
    pub clip: IrClipLike,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrClipLike {
    pub events: Vec<IrEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<Rat>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrPitch {
    pub midi: i32,
    pub cents: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrMarker {
    pub pos: Rat,
    pub kind: String,
    pub label: String,
}

/// One normalized clip event; the `type` tag matches the `ClipEvent`
/// `ObjectMap`'s own `"type"` field one-to-one with spec.md §6.3's `Event`
/// shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum IrEvent {
    #[serde(rename = "note")]
    Note {
        start: Rat,
        dur: Rat,
        pitch: IrPitch,
        #[serde(skip_serializing_if = "Option::is_none")]
        velocity: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        voice: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        techniques: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lyric: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ext: Option<serde_json::Value>,
    },
    #[serde(rename = "chord")]
    Chord {
        start: Rat,
        dur: Rat,
        pitches: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        velocity: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        voice: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        techniques: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        lyric: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ext: Option<serde_json::Value>,
    },
    #[serde(rename = "drumHit")]
    DrumHit {
        start: Rat,
        dur: Rat,
        key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        velocity: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ext: Option<serde_json::Value>,
    },
    #[serde(rename = "breath")]
    Breath {
        start: Rat,
        dur: Rat,
        #[serde(skip_serializing_if = "Option::is_none")]
        intensity: Option<serde_json::Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        ext: Option<serde_json::Value>,
    },
    #[serde(rename = "control")]
    Control {
        start: Rat,
        kind: String,
        data: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        ext: Option<serde_json::Value>,
    },
    #[serde(rename = "automation")]
    Automation {
        param: String,
        start: Rat,
        end: Rat,
        curve: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        ext: Option<serde_json::Value>,
    },
    #[serde(rename = "marker")]
    Marker { pos: Rat, kind: String, label: String },
}

impl IrEvent {
    /// `(position, priority)` — stable-sort key implementing "note/chord/
    /// drumHit/breath precede automation and marker at the same instant"
    /// (spec.md §4.6 step 4). `control` carries no pitched content but is
    /// not singled out by that rule either, so it sorts with the pitched
    /// events rather than with automation/marker.
    fn sort_key(&self) -> (Rat, u8) {
        match self {
            IrEvent::Note { start, .. }
            | IrEvent::Chord { start, .. }
            | IrEvent::DrumHit { start, .. }
            | IrEvent::Breath { start, .. }
            | IrEvent::Control { start, .. } => (*start, 0),
            IrEvent::Automation { start, .. } => (*start, 1),
            IrEvent::Marker { pos, .. } => (*pos, 1),
        }
    }

    fn start(&self) -> Rat {
        self.sort_key().0
    }

    fn duration(&self) -> Option<Rat> {
        match self {
            IrEvent::Note { dur, .. } | IrEvent::Chord { dur, .. } | IrEvent::DrumHit { dur, .. } | IrEvent::Breath { dur, .. } => Some(*dur),
            IrEvent::Control { .. } | IrEvent::Automation { .. } | IrEvent::Marker { .. } => None,
        }
    }
}

/// Converts an arbitrary evaluated [`RuntimeValue`] into the `serde_json`
/// shape the IR embeds for loosely-typed fields (`ext`, `tags`, `range`,
/// automation `curve`s, ...). Functions, clips, and scores should never
/// reach this boundary; if one does, it serializes as `null` rather than
/// panicking, matching the normalizer's "never halt" contract.
pub fn runtime_to_json(value: &RuntimeValue) -> serde_json::Value {
    use serde_json::json;
    match value {
        RuntimeValue::Int(n) => json!(n),
        RuntimeValue::Float(f) => json!(f),
        RuntimeValue::Bool(b) => json!(b),
        RuntimeValue::Str(s) => json!(s.to_string()),
        RuntimeValue::Null => serde_json::Value::Null,
        RuntimeValue::Rat(r) => json!(r),
        RuntimeValue::Pos(PosAtom::Resolved(r)) => json!(r),
        RuntimeValue::Pos(PosAtom::Ref(PosRef { bar, beat })) => json!(format!("{}:{}", bar, beat)),
        RuntimeValue::Pos(PosAtom::RefPlus(PosRef { bar, beat }, offset)) => {
            json!(format!("{}:{}+{}", bar, beat, offset))
        }
        RuntimeValue::Pitch(p) => json!(IrPitch { midi: p.midi, cents: p.cents }),
        RuntimeValue::Array(items) => serde_json::Value::Array(items.borrow().iter().map(runtime_to_json).collect()),
        RuntimeValue::Object(map) => object_to_json(&map.borrow()),
        RuntimeValue::Function(_) | RuntimeValue::Clip(_) | RuntimeValue::Score(_) | RuntimeValue::Rng(_) => {
            serde_json::Value::Null
        }
        RuntimeValue::Range(lo, hi) => json!([lo, hi]),
        RuntimeValue::Curve(c) => {
            let points: Vec<serde_json::Value> =
                c.points.iter().map(|(t, v)| json!({"t": t, "v": v})).collect();
            json!({"kind": "piecewiseLinear", "points": points})
        }
        RuntimeValue::Lyric(l) => json!(l.text),
        RuntimeValue::LyricToken(t) => json!(t.text),
        RuntimeValue::EnumVariant(v) => json!(v.tag),
    }
}

fn object_to_json(map: &ObjectMap) -> serde_json::Value {
    let mut out = serde_json::Map::new();
    for (key, value) in map.entries() {
        out.insert(key.to_string(), runtime_to_json(value));
    }
    serde_json::Value::Object(out)
}

fn opt_json(ev: &ObjectMap, key: &str) -> Option<serde_json::Value> {
    if ev.contains(key) {
        Some(runtime_to_json(&ev.get(key)))
    } else {
        None
    }
}

fn ext_fields(ev: &ObjectMap, known: &[&str]) -> Option<serde_json::Value> {
    let mut out = serde_json::Map::new();
    for (key, value) in ev.entries() {
        if !known.contains(&key) {
            out.insert(key.to_string(), runtime_to_json(value));
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(out))
    }
}

fn ev_rat(ev: &ObjectMap, key: &str) -> Rat {
    match ev.get(key) {
        RuntimeValue::Rat(r) => r,
        RuntimeValue::Int(n) => Rat::from_int(n),
        _ => Rat::ZERO,
    }
}

fn ev_string(ev: &ObjectMap, key: &str) -> String {
    match ev.get(key) {
        RuntimeValue::Str(s) => s.to_string(),
        other => crate::eval::stringify(&other),
    }
}

fn ev_pitch(ev: &ObjectMap, key: &str) -> IrPitch {
    match ev.get(key) {
        RuntimeValue::Pitch(p) => IrPitch { midi: p.midi, cents: p.cents },
        _ => IrPitch { midi: 60, cents: 0 },
    }
}

const NOTE_KNOWN: &[&str] = &["type", "start", "dur", "pitch", "velocity", "voice", "techniques", "lyric"];
const CHORD_KNOWN: &[&str] = &["type", "start", "dur", "pitches", "velocity", "voice", "techniques", "lyric"];
const HIT_KNOWN: &[&str] = &["type", "start", "dur", "key", "velocity"];
const BREATH_KNOWN: &[&str] = &["type", "start", "dur", "intensity"];

/// Shifts one clip-relative event (always a plain `Rat` start/pos/end, per
/// the clip-cursor design note in `SPEC_FULL.md` §4.6) by a placement's
/// resolved `at` and converts it to the IR's tagged-enum shape.
fn convert_event(ev: &ClipEvent, at: Rat) -> Option<IrEvent> {
    let ty = match ev.get("type") {
        RuntimeValue::Str(s) => s.to_string(),
        _ => return None,
    };
    Some(match ty.as_str() {
        "note" => IrEvent::Note {
            start: ev_rat(ev, "start") + at,
            dur: ev_rat(ev, "dur"),
            pitch: ev_pitch(ev, "pitch"),
            velocity: opt_json(ev, "velocity"),
            voice: opt_json(ev, "voice"),
            techniques: opt_json(ev, "techniques"),
            lyric: opt_json(ev, "lyric"),
            ext: ext_fields(ev, NOTE_KNOWN),
        },
        "chord" => IrEvent::Chord {
            start: ev_rat(ev, "start") + at,
            dur: ev_rat(ev, "dur"),
            pitches: runtime_to_json(&ev.get("pitches")),
            velocity: opt_json(ev, "velocity"),
            voice: opt_json(ev, "voice"),
            techniques: opt_json(ev, "techniques"),
            lyric: opt_json(ev, "lyric"),
            ext: ext_fields(ev, CHORD_KNOWN),
        },
        "drumHit" => IrEvent::DrumHit {
            start: ev_rat(ev, "start") + at,
            dur: ev_rat(ev, "dur"),
            key: ev_string(ev, "key"),
            velocity: opt_json(ev, "velocity"),
            ext: ext_fields(ev, HIT_KNOWN),
        },
        "breath" => IrEvent::Breath {
            start: ev_rat(ev, "start") + at,
            dur: ev_rat(ev, "dur"),
            intensity: opt_json(ev, "intensity"),
            ext: ext_fields(ev, BREATH_KNOWN),
        },
        "control" => IrEvent::Control {
            start: ev_rat(ev, "start") + at,
            kind: ev_string(ev, "kind"),
            data: runtime_to_json(&ev.get("data")),
            ext: ext_fields(ev, &["type", "start", "kind", "data"]),
        },
        "automation" => IrEvent::Automation {
            param: ev_string(ev, "param"),
            start: ev_rat(ev, "start") + at,
            end: ev_rat(ev, "end") + at,
            curve: runtime_to_json(&ev.get("curve")),
            ext: ext_fields(ev, &["type", "param", "start", "end", "curve"]),
        },
        "marker" => IrEvent::Marker {
            pos: ev_rat(ev, "pos") + at,
            kind: ev_string(ev, "kind"),
            label: ev_string(ev, "label"),
        },
        _ => return None,
    })
}

// ---------------------------------------------------------------------
// Position resolution
// ---------------------------------------------------------------------

/// One already-resolved meter change: the bar it starts on (needed to walk
/// bar-by-bar for later `PosRef` resolution), its absolute start, and the
/// time signature in force from that bar forward.
struct MeterBoundary {
    bar: u32,
    at: Rat,
    numerator: i64,
    denominator: i64,
}

fn governing_boundary(boundaries: &[MeterBoundary], bar: u32) -> &MeterBoundary {
    boundaries.iter().rev().find(|b| b.bar <= bar).unwrap_or(&boundaries[0])
}

/// Walks the meter map forward from bar 1 to `pos_ref.bar`, per spec.md
/// §4.6 step 1, then adds the beat offset within that bar.
fn resolve_pos_ref(pos_ref: PosRef, boundaries: &[MeterBoundary]) -> Rat {
    if boundaries.is_empty() {
        return Rat::new((pos_ref.beat as i64) - 1, 4);
    }
    let mut bar_start = boundaries[0].at;
    let mut bar = boundaries[0].bar;
    while bar < pos_ref.bar {
        let b = governing_boundary(boundaries, bar);
        bar_start = bar_start + Rat::new(b.numerator, b.denominator);
        bar += 1;
    }
    let target = governing_boundary(boundaries, pos_ref.bar);
    PosAtom::resolve_ref(pos_ref, bar_start, target.denominator as u32)
}

/// A meter (or tempo) entry's own position is usually a literal bar:beat —
/// extract the bar number driving the walk. A fully-resolved literal
/// position can't name a bar number at all; treat it as bar 1 (origin) and
/// flag `unresolved-position`, matching the "never halts, best-effort"
/// contract.
fn pos_ref_bar(pos: &PosAtom, diagnostics: &mut Vec<Diagnostic>) -> u32 {
    match pos {
        PosAtom::Ref(r) | PosAtom::RefPlus(r, _) => r.bar,
        PosAtom::Resolved(r) if r.is_zero() => 1,
        PosAtom::Resolved(_) => {
            diagnostics.push(Diagnostic::warning(
                "unresolved-position",
                "a meter change's position must be a bar:beat reference so later positions can be resolved against it",
            ));
            1
        }
    }
}

fn resolve_pos(pos: PosAtom, boundaries: &[MeterBoundary]) -> Rat {
    match pos {
        PosAtom::Resolved(r) => r,
        PosAtom::Ref(r) => resolve_pos_ref(r, boundaries),
        PosAtom::RefPlus(r, offset) => resolve_pos_ref(r, boundaries) + offset,
    }
}

fn resolve_meter_map(score: &ScoreValue, diagnostics: &mut Vec<Diagnostic>) -> (Vec<MeterBoundary>, Vec<IrMeterEvent>) {
    let mut boundaries: Vec<MeterBoundary> = Vec::new();
    let mut resolved = Vec::new();

    if score.meter_map.is_empty() {
        diagnostics.push(Diagnostic::warning("unresolved-position", "score has an empty meter map; positions default to a 4/4 grid"));
    }

    for (i, entry) in score.meter_map.iter().enumerate() {
        let bar = pos_ref_bar(&entry.at, diagnostics);
        let at = resolve_pos(entry.at, &boundaries);
        if i == 0 && !at.is_zero() {
            diagnostics.push(Diagnostic::warning(
                "unresolved-position",
                "a well-formed score's first meter event must be at bar 1, beat 1",
            ));
        }
        boundaries.push(MeterBoundary { bar, at, numerator: entry.numerator, denominator: entry.denominator });
        resolved.push(IrMeterEvent { at, numerator: entry.numerator, denominator: entry.denominator });
    }

    if boundaries.is_empty() {
        boundaries.push(MeterBoundary { bar: 1, at: Rat::ZERO, numerator: 4, denominator: 4 });
    }

    (boundaries, resolved)
}

// ---------------------------------------------------------------------
// Invariant validation + sorting
// ---------------------------------------------------------------------

/// Shifts and converts every event in a placement's clip, validates the
/// per-track invariants (non-negative start, non-zero duration, ordering),
/// and stably sorts by `(start, type-priority)` — spec.md §4.6 steps 2-4.
fn splice_and_sort(events: &[ClipEvent], at: Rat, track_name: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<IrEvent> {
    let mut out: Vec<IrEvent> = events.iter().filter_map(|ev| convert_event(ev, at)).collect();
    out.sort_by_key(|e| e.sort_key());

    let mut previous_end: Option<Rat> = None;
    for ev in &out {
        let start = ev.start();
        if start.is_negative() {
            diagnostics.push(Diagnostic::warning(
                "negative-duration",
                format!("track '{}' has an event starting before position 0", track_name),
            ));
        }
        if let Some(dur) = ev.duration() {
            if dur.is_zero() {
                diagnostics.push(Diagnostic::warning(
                    "negative-duration",
                    format!("track '{}' has a zero-duration event at {}", track_name, start),
                ));
            } else if dur.is_negative() {
                diagnostics.push(Diagnostic::warning(
                    "negative-duration",
                    format!("track '{}' has a negative-duration event at {}", track_name, start),
                ));
            }
            if let Some(prev_end) = previous_end {
                if start < prev_end {
                    diagnostics.push(Diagnostic::warning(
                        "overlapping-events",
                        format!("track '{}' has overlapping events around position {}", track_name, start),
                    ));
                }
            }
            previous_end = Some(start + dur);
        }
    }
    out
}

fn sound_decl_to_ir(sound: &crate::eval::value::SoundValue) -> IrSoundDecl {
    IrSoundDecl {
        id: sound.id.clone(),
        kind: sound.kind.clone(),
        label: sound.label.clone(),
        family: sound.family.clone(),
        tags: sound.tags.as_ref().map(|tags| serde_json::json!(tags)),
        range: sound.range.as_ref().map(runtime_to_json),
        transposition: sound.transposition,
        drum_keys: sound.drum_keys.as_ref().map(runtime_to_json),
        vocal: sound.vocal.as_ref().map(runtime_to_json),
        hints: sound.hints.as_ref().map(runtime_to_json),
        ext: if sound.ext.is_empty() { None } else { Some(object_to_json(&sound.ext)) },
    }
}

/// Converts a fully-evaluated [`ScoreValue`] into the canonical IR
/// document. Never fails: invariant violations become warnings folded into
/// the returned diagnostics, and the document is emitted regardless (spec.md
/// §4.6, §7).
pub fn normalize(score: &ScoreValue) -> (IrDocument, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    let (boundaries, meter_map) = resolve_meter_map(score, &mut diagnostics);

    let tempo_map = score
        .tempo_map
        .iter()
        .map(|t| IrTempoEvent { at: resolve_pos(t.at, &boundaries), bpm: t.bpm, unit: t.unit })
        .collect();

    let mut seen_sound_ids = HashSet::new();
    for sound in &score.sounds {
        if !seen_sound_ids.insert(sound.id.clone()) {
            diagnostics.push(Diagnostic::warning("duplicate-sound-id", format!("sound id '{}' is declared more than once", sound.id)));
        }
    }
    let sounds = score.sounds.iter().map(sound_decl_to_ir).collect();

    let tracks = score
        .tracks
        .iter()
        .map(|track| {
            let placements = track
                .placements
                .iter()
                .map(|placement| {
                    let at = resolve_pos(placement.at, &boundaries);
                    let events = splice_and_sort(&placement.clip.events, at, &track.name, &mut diagnostics);
                    IrPlacement { at, clip: IrClipLike { events, length: placement.clip.length } }
                })
                .collect();
            IrTrack {
                name: track.name.clone(),
                role: track.role.clone(),
                sound: track.sound.clone(),
                mix: track.mix.as_ref().map(runtime_to_json),
                placements,
            }
        })
        .collect();

    let markers = score
        .markers
        .iter()
        .map(|m| IrMarker { pos: resolve_pos(m.pos, &boundaries), kind: m.kind.clone(), label: m.label.clone() })
        .collect();

    let meta = IrMeta {
        title: score.meta.title.clone(),
        artist: score.meta.artist.clone(),
        album: score.meta.album.clone(),
        copyright: score.meta.copyright.clone(),
        ext: if score.meta.ext.is_empty() { None } else { Some(object_to_json(&score.meta.ext)) },
    };

    let doc = IrDocument { tako: TakoVersion { ir_version: IR_VERSION }, meta, tempo_map, meter_map, sounds, tracks, markers };
    (doc, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::value::{MeterEventValue, MetaValue, SoundValue, TempoEventValue, TrackValue};

    fn minimal_score() -> ScoreValue {
        ScoreValue {
            meta: MetaValue::default(),
            tempo_map: vec![TempoEventValue { at: PosAtom::origin(), bpm: 120.0, unit: Rat::new(1, 4) }],
            meter_map: vec![MeterEventValue { at: PosAtom::origin(), numerator: 4, denominator: 4 }],
            sounds: vec![SoundValue {
                id: "piano".to_string(),
                kind: "instrument".to_string(),
                label: None,
                family: None,
                tags: None,
                range: None,
                transposition: None,
                drum_keys: None,
                vocal: None,
                hints: None,
                ext: ObjectMap::new(),
            }],
            tracks: vec![TrackValue { name: "Piano".to_string(), role: "Instrument".to_string(), sound: "piano".to_string(), mix: None, placements: vec![] }],
            markers: vec![],
        }
    }

    #[test]
    fn minimal_score_normalizes_cleanly() {
        let (doc, diagnostics) = normalize(&minimal_score());
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        assert_eq!(doc.tako.ir_version, 4);
        assert_eq!(doc.tempo_map.len(), 1);
        assert_eq!(doc.tempo_map[0].at, Rat::ZERO);
        assert_eq!(doc.meter_map.len(), 1);
        assert_eq!(doc.tracks.len(), 1);
        assert!(doc.tracks[0].placements.is_empty());
    }

    #[test]
    fn six_eight_bar_two_resolves_to_three_quarters() {
        let mut score = minimal_score();
        score.meter_map = vec![MeterEventValue { at: PosAtom::origin(), numerator: 6, denominator: 8 }];
        let (boundaries, _) = resolve_meter_map(&score, &mut Vec::new());
        let resolved = resolve_pos_ref(PosRef::new(2, 1), &boundaries);
        assert_eq!(resolved, Rat::new(3, 4));
    }

    #[test]
    fn duplicate_sound_ids_produce_a_warning() {
        let mut score = minimal_score();
        score.sounds.push(score.sounds[0].clone());
        let (_, diagnostics) = normalize(&score);
        assert!(diagnostics.iter().any(|d| d.code == "duplicate-sound-id"));
    }

    #[test]
    fn idempotent_on_an_already_normalized_score() {
        let (doc1, _) = normalize(&minimal_score());
        let (doc2, _) = normalize(&minimal_score());
        assert_eq!(doc1, doc2);
    }
}
