//! # Runtime Value Model
//!
//! `RuntimeValue` is the tagged union every expression evaluates to (see
//! `SPEC_FULL.md` §3.2 and spec.md §3.2's "Runtime value" entry). It is
//! deliberately *not* `Serialize` — functions close over scopes, and
//! `Array`/`Object` are reference types — only [`crate::ir::IrDocument`],
//! built from a fully-evaluated `Score`, crosses the serialization boundary.
//!
//! Object properties stay in an insertion-ordered map rather than being
//! lowered to nominal structs, per the design note in spec.md §9: the
//! stdlib (itself written in TakoMusic) reads and rewrites event objects
//! field by field, the same way the teacher keeps `RawMetadata` as loosely
//! typed YAML rather than a nominal struct until validation.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::ast::{Block, Param};
use crate::pitch::Pitch;
use crate::pos::PosAtom;
use crate::rational::Rat;

use super::scope::Scope;
use crate::error::EvalError;

/// An insertion-ordered string-keyed map. `spread_from` copies then
/// overrides, matching the "spread copies then overrides" rule; `set` on an
/// existing key updates the value without moving its position, matching
/// ordinary object-literal key reassignment semantics.
#[derive(Debug, Clone, Default)]
pub struct ObjectMap {
    keys: Vec<String>,
    values: std::collections::HashMap<String, RuntimeValue>,
}

impl ObjectMap {
    pub fn new() -> ObjectMap {
        ObjectMap::default()
    }

    pub fn get(&self, key: &str) -> RuntimeValue {
        self.values.get(key).cloned().unwrap_or(RuntimeValue::Null)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: RuntimeValue) {
        if !self.values.contains_key(key) {
            self.keys.push(key.to_string());
        }
        self.values.insert(key.to_string(), value);
    }

    pub fn spread_from(&mut self, other: &ObjectMap) {
        for key in &other.keys {
            self.set(key, other.values.get(key).cloned().unwrap_or(RuntimeValue::Null));
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.keys.iter()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &RuntimeValue)> {
        self.keys.iter().map(move |k| (k.as_str(), self.values.get(k).unwrap()))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A closure's captured-environment variant, or a host-extension native
/// handler. Core bootstrap registers only natives for the always-present
/// intrinsics (`install_intrinsics`); closures are everything a TakoMusic
/// `fn` declaration produces.
pub enum FunctionValue {
    Closure { name: String, params: Vec<Param>, body: Block, scope: Scope },
    Native(&'static str, Rc<dyn Fn(&[RuntimeValue]) -> Result<RuntimeValue, EvalError>>),
}

impl FunctionValue {
    pub fn name(&self) -> &str {
        match self {
            FunctionValue::Closure { name, .. } => name,
            FunctionValue::Native(name, _) => name,
        }
    }
}

impl fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name())
    }
}

#[derive(Debug, Clone)]
pub struct EnumVariantValue {
    pub tag: String,
    pub payload: RuntimeValue,
}

/// One event inside a [`ClipValue`]. Kept as a plain [`ObjectMap`] rather
/// than a nominal struct — see the module doc comment — with a `type` key
/// discriminating `note`/`chord`/`drumHit`/`breath`/`control`/`automation`/
/// `marker`, matching the IR `Event` shape in spec.md §6.3 one-to-one
/// except that `start`/`pos` here is always a plain [`Rat`] relative to the
/// clip's own origin (see the clip-cursor design note in `SPEC_FULL.md`
/// §4.6).
pub type ClipEvent = ObjectMap;

#[derive(Debug, Clone)]
pub struct ClipValue {
    pub events: Vec<ClipEvent>,
    pub length: Option<Rat>,
}

#[derive(Debug, Clone)]
pub struct CurveValue {
    pub points: Vec<(Rat, Rat)>,
}

#[derive(Debug, Clone)]
pub struct LyricValue {
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct LyricTokenValue {
    pub text: String,
}

/// A simple reseedable linear congruential generator. `rngNext` returns a
/// fresh `Rng` rather than mutating this one in place — the stdlib's
/// `random.tako` threads the returned generator explicitly
/// (`let (value, rng2) = rngNext(rng);`), matching the language's
/// referentially-transparent-below-statements discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RngValue {
    pub state: u64,
}

impl RngValue {
    pub fn seeded(seed: i64) -> RngValue {
        RngValue { state: (seed as u64) ^ 0x9E3779B97F4A7C15 }
    }

    /// Returns the next state and a `[0, 1)` float derived from it. Numeric
    /// constants are the standard constants for a 64-bit LCG (Knuth's MMIX).
    pub fn next(self) -> (RngValue, f64) {
        let next_state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let sample = (next_state >> 11) as f64 / (1u64 << 53) as f64;
        (RngValue { state: next_state }, sample)
    }
}

#[derive(Debug, Clone)]
pub struct SoundValue {
    pub id: String,
    pub kind: String,
    pub label: Option<String>,
    pub family: Option<String>,
    pub tags: Option<Vec<String>>,
    pub range: Option<RuntimeValue>,
    pub transposition: Option<i64>,
    pub drum_keys: Option<RuntimeValue>,
    pub vocal: Option<RuntimeValue>,
    pub hints: Option<RuntimeValue>,
    pub ext: ObjectMap,
}

#[derive(Debug, Clone)]
pub struct PlacementValue {
    pub at: PosAtom,
    pub clip: Rc<ClipValue>,
}

#[derive(Debug, Clone)]
pub struct TrackValue {
    pub name: String,
    pub role: String,
    pub sound: String,
    pub mix: Option<RuntimeValue>,
    pub placements: Vec<PlacementValue>,
}

#[derive(Debug, Clone)]
pub struct TempoEventValue {
    pub at: PosAtom,
    pub bpm: f64,
    pub unit: Rat,
}

#[derive(Debug, Clone)]
pub struct MeterEventValue {
    pub at: PosAtom,
    pub numerator: i64,
    pub denominator: i64,
}

#[derive(Debug, Clone)]
pub struct MarkerEventValue {
    pub pos: PosAtom,
    pub kind: String,
    pub label: String,
}

#[derive(Debug, Clone, Default)]
pub struct MetaValue {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub copyright: Option<String>,
    pub ext: ObjectMap,
}

#[derive(Debug, Clone)]
pub struct ScoreValue {
    pub meta: MetaValue,
    pub tempo_map: Vec<TempoEventValue>,
    pub meter_map: Vec<MeterEventValue>,
    pub sounds: Vec<SoundValue>,
    pub tracks: Vec<TrackValue>,
    pub markers: Vec<MarkerEventValue>,
}

#[derive(Clone)]
pub enum RuntimeValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Rc<str>),
    Null,
    Rat(Rat),
    Pos(PosAtom),
    Pitch(Pitch),
    Array(Rc<RefCell<Vec<RuntimeValue>>>),
    Object(Rc<RefCell<ObjectMap>>),
    Function(Rc<FunctionValue>),
    /// Inclusive integer range; see the open question resolved in
    /// `SPEC_FULL.md` §9(a).
    Range(i64, i64),
    Clip(Rc<ClipValue>),
    Score(Rc<ScoreValue>),
    Curve(Rc<CurveValue>),
    Lyric(Rc<LyricValue>),
    LyricToken(Rc<LyricTokenValue>),
    Rng(RngValue),
    EnumVariant(Rc<EnumVariantValue>),
}

impl fmt::Debug for RuntimeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::eval::stringify(self))
    }
}

impl RuntimeValue {
    pub fn str(s: impl Into<Rc<str>>) -> RuntimeValue {
        RuntimeValue::Str(s.into())
    }

    pub fn array(items: Vec<RuntimeValue>) -> RuntimeValue {
        RuntimeValue::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(map: ObjectMap) -> RuntimeValue {
        RuntimeValue::Object(Rc::new(RefCell::new(map)))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            RuntimeValue::Bool(b) => *b,
            RuntimeValue::Null => false,
            RuntimeValue::Int(n) => *n != 0,
            RuntimeValue::Float(f) => *f != 0.0,
            RuntimeValue::Rat(r) => !r.is_zero(),
            RuntimeValue::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RuntimeValue::Int(_) | RuntimeValue::Float(_) => "Number",
            RuntimeValue::Bool(_) => "Bool",
            RuntimeValue::Str(_) => "String",
            RuntimeValue::Null => "Null",
            RuntimeValue::Rat(_) => "Dur",
            RuntimeValue::Pos(_) => "Pos",
            RuntimeValue::Pitch(_) => "Pitch",
            RuntimeValue::Array(_) => "Array",
            RuntimeValue::Object(_) => "Object",
            RuntimeValue::Function(_) => "Function",
            RuntimeValue::Range(_, _) => "Range",
            RuntimeValue::Clip(_) => "Clip",
            RuntimeValue::Score(_) => "Score",
            RuntimeValue::Curve(_) => "Curve",
            RuntimeValue::Lyric(_) => "Lyric",
            RuntimeValue::LyricToken(_) => "LyricToken",
            RuntimeValue::Rng(_) => "Rng",
            RuntimeValue::EnumVariant(_) => "EnumVariant",
        }
    }
}
