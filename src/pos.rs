//! # Symbolic Position
//!
//! A `Pos` value can be resolved (a plain [`Rat`]) or symbolic: a bar:beat
//! reference, or a reference plus an accumulated duration offset. Symbolic
//! positions survive evaluation unresolved — only [`crate::ir::normalize`],
//! which knows the full meter map, turns them into absolute rationals (see
//! `SPEC_FULL.md` §4.6 and the design note on symbolic positions in §9).

use crate::rational::Rat;
use serde::{Deserialize, Serialize};

/// A 1-indexed bar:beat reference, written `<bar>:<beat>` in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosRef {
    pub bar: u32,
    pub beat: u32,
}

impl PosRef {
    pub fn new(bar: u32, beat: u32) -> PosRef {
        PosRef { bar, beat }
    }

    pub fn is_origin(&self) -> bool {
        self.bar == 1 && self.beat == 1
    }
}

/// A position: either already resolved to an absolute rational, or still
/// symbolic (a bar:beat reference, optionally plus a duration offset).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PosAtom {
    Resolved(Rat),
    Ref(PosRef),
    RefPlus(PosRef, Rat),
}

impl PosAtom {
    pub fn origin() -> PosAtom {
        PosAtom::Resolved(Rat::ZERO)
    }

    /// `Pos + Dur`: folds the offset additively so repeated additions
    /// combine into a single symbolic offset rather than nesting.
    pub fn add_duration(self, dur: Rat) -> PosAtom {
        match self {
            PosAtom::Resolved(r) => PosAtom::Resolved(r + dur),
            PosAtom::Ref(base) => PosAtom::RefPlus(base, dur),
            PosAtom::RefPlus(base, offset) => PosAtom::RefPlus(base, offset + dur),
        }
    }

    pub fn sub_duration(self, dur: Rat) -> PosAtom {
        self.add_duration(-dur)
    }

    /// Resolve against an already-resolved whole-note offset for the bar
    /// this `PosRef` starts at, and the meter denominator in force there.
    /// Called by the normalizer, which walks the meter map to produce
    /// `bar_start` and `denominator` for any `PosRef`.
    pub fn resolve_ref(pos_ref: PosRef, bar_start: Rat, denominator: u32) -> Rat {
        bar_start + Rat::new((pos_ref.beat as i64) - 1, denominator as i64)
    }
}
