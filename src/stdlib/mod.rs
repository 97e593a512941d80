//! # Embedded Standard Library
//!
//! The ten `std:*` modules are ordinary TakoMusic source, shipped as
//! compile-time constants via `include_str!` (see `SPEC_FULL.md` §6.4 and
//! the "Stdlib embedding" design note). [`lookup`] is the table the
//! resolver consults before falling back to the host's
//! [`crate::resolver::SourceProvider`].
//!
//! These modules are written against a small set of evaluator intrinsics
//! (`clipFromEvents`, `clipEvents`, `len`, `rngNew`, ...) that are not
//! "native functions" in the host-extension sense — they are always
//! present, the same way a language runtime's builtins are always present
//! regardless of what any library does. See `eval/mod.rs`'s
//! `install_intrinsics` and `DESIGN.md`.

const CORE: &str = include_str!("sources/core.tako");
const DRUMS: &str = include_str!("sources/drums.tako");
const THEORY: &str = include_str!("sources/theory.tako");
const VOCAL: &str = include_str!("sources/vocal.tako");
const TRANSFORM: &str = include_str!("sources/transform.tako");
const CURVES: &str = include_str!("sources/curves.tako");
const TIME: &str = include_str!("sources/time.tako");
const RANDOM: &str = include_str!("sources/random.tako");
const RESULT: &str = include_str!("sources/result.tako");
const RHYTHM: &str = include_str!("sources/rhythm.tako");

/// Looks up the embedded source for a `std:<name>` module specifier, given
/// just the `<name>` part (without the `std:` prefix).
pub fn lookup(name: &str) -> Option<&'static str> {
    Some(match name {
        "core" => CORE,
        "drums" => DRUMS,
        "theory" => THEORY,
        "vocal" => VOCAL,
        "transform" => TRANSFORM,
        "curves" => CURVES,
        "time" => TIME,
        "random" => RANDOM,
        "result" => RESULT,
        "rhythm" => RHYTHM,
        _ => return None,
    })
}

pub const MODULE_NAMES: &[&str] =
    &["core", "drums", "theory", "vocal", "transform", "curves", "time", "random", "result", "rhythm"];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser};

    #[test]
    fn every_module_parses_without_errors() {
        for name in MODULE_NAMES {
            let source = lookup(name).unwrap();
            let tokens = lexer::tokenize(source).unwrap_or_else(|e| panic!("{}: {:?}", name, e));
            let (_program, errors) = parser::parse(tokens);
            assert!(errors.is_empty(), "std:{} failed to parse: {:?}", name, errors);
        }
    }
}
