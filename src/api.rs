//! # Compiler Facade
//!
//! [`compile`] is the one entry point a host needs: it drives all six
//! pipeline stages and always returns a [`CompileOutcome`], matching the
//! `{ ir?, diagnostics }` host contract in spec.md §7 — `ir` is present
//! exactly when no error-severity diagnostic was reported.
//!
//! [`compile_unchecked`] skips the type-checker pass (for trusted input
//! where the caller doesn't want to sift a diagnostics vector) and returns
//! a plain `Result` instead.

use crate::diagnostics::{self, Diagnostic};
use crate::error::TakoError;
use crate::ir::{self, IrDocument};
use crate::resolver::{self, SourceProvider};
use crate::{checker, eval};

/// The result of a full [`compile`] call. `ir` is `Some` iff `diagnostics`
/// contains no error-severity entry.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub ir: Option<IrDocument>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Runs source text through lexing, parsing, module resolution, type
/// checking, evaluation, and IR normalization, collecting diagnostics from
/// every stage that produces them.
///
/// A resolver failure (missing module, import cycle, missing export) is
/// structural — there is no module graph to check or evaluate — so it
/// short-circuits the remaining stages, surfacing as the sole diagnostic.
/// An evaluator failure halts evaluation per spec.md §7, but the
/// diagnostics already collected by the resolver and checker are kept.
pub fn compile(source: &str, provider: &dyn SourceProvider) -> CompileOutcome {
    let resolved = match resolver::resolve(source, provider) {
        Ok(resolved) => resolved,
        Err(err) => {
            return CompileOutcome { ir: None, diagnostics: vec![Diagnostic::from(err)] };
        }
    };

    let mut diagnostics = resolved.diagnostics.clone();

    let check_diagnostics = checker::check(&resolved.modules, &resolved.exports);
    diagnostics.extend(check_diagnostics);

    if diagnostics::has_errors(&diagnostics) {
        return CompileOutcome { ir: None, diagnostics };
    }

    let score_value = match eval::evaluate(&resolved.modules, &resolved.exports, &resolved.main_key) {
        Ok(crate::eval::value::RuntimeValue::Score(score)) => score,
        Ok(other) => {
            diagnostics.push(Diagnostic::error(
                "main-must-return-score",
                format!("main() must return a Score, found {}", other.type_name()),
            ));
            return CompileOutcome { ir: None, diagnostics };
        }
        Err(err) => {
            diagnostics.push(Diagnostic::from(err));
            return CompileOutcome { ir: None, diagnostics };
        }
    };

    let (doc, normalize_diagnostics) = ir::normalize(&score_value);
    diagnostics.extend(normalize_diagnostics);

    if diagnostics::has_errors(&diagnostics) {
        CompileOutcome { ir: None, diagnostics }
    } else {
        CompileOutcome { ir: Some(doc), diagnostics }
    }
}

/// Runs the pipeline without the type-checker pass, for trusted input (the
/// stdlib's own self-tests use this rather than sifting a diagnostics
/// vector for something that should never fail). Any lexer or parser
/// diagnostic the resolver collects along the way still aborts the call.
pub fn compile_unchecked(source: &str, provider: &dyn SourceProvider) -> Result<IrDocument, TakoError> {
    let resolved = resolver::resolve(source, provider)?;

    if !resolved.diagnostics.is_empty() {
        return Err(TakoError::Diagnostics(resolved.diagnostics.len()));
    }

    let score = match eval::evaluate(&resolved.modules, &resolved.exports, &resolved.main_key)? {
        crate::eval::value::RuntimeValue::Score(score) => score,
        _ => return Err(TakoError::Diagnostics(1)),
    };

    let (doc, _normalize_diagnostics) = ir::normalize(&score);
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoModules;
    impl SourceProvider for NoModules {
        fn load(&self, _specifier: &str) -> Option<(String, String)> {
            None
        }
    }

    const MINIMAL_SCORE: &str = r#"
        fn main() {
            return score {
                tempo { 1:1 -> 120bpm; }
                meter { 1:1 -> 4/4; }
                sound "piano" kind instrument {}
                track "Piano" role Instrument sound "piano" {
                    place 1:1 clip { note(C4, q); note(E4, q); };
                }
            };
        }
    "#;

    #[test]
    fn minimal_score_compiles_to_ir() {
        let outcome = compile(MINIMAL_SCORE, &NoModules);
        assert!(outcome.ir.is_some(), "{:?}", outcome.diagnostics);
        let doc = outcome.ir.unwrap();
        assert_eq!(doc.tako.ir_version, 4);
        assert_eq!(doc.tracks.len(), 1);
        assert_eq!(doc.tracks[0].placements[0].clip.events.len(), 2);
    }

    #[test]
    fn undefined_symbol_is_reported_without_an_ir() {
        let source = r#"
            fn main() {
                return score {
                    tempo { 1:1 -> 120bpm; }
                    meter { 1:1 -> 4/4; }
                    sound "piano" kind instrument {}
                    track "Piano" role Instrument sound "piano" {
                        place 1:1 clip { note(doesNotExist, q); };
                    }
                };
            }
        "#;
        let outcome = compile(source, &NoModules);
        assert!(outcome.ir.is_none());
        assert!(outcome.diagnostics.iter().any(|d| d.code == "undefined-symbol"));
    }

    #[test]
    fn missing_module_short_circuits_with_one_diagnostic() {
        let source = r#"import { x } from "nope"; fn main() { return 1; }"#;
        let outcome = compile(source, &NoModules);
        assert!(outcome.ir.is_none());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].code, "module-not-found");
    }

    #[test]
    fn compile_unchecked_returns_ir_directly() {
        let doc = compile_unchecked(MINIMAL_SCORE, &NoModules).expect("should compile");
        assert_eq!(doc.tako.ir_version, 4);
    }
}
