//! # Module Resolver
//!
//! Follows `import` directives starting from the main source unit,
//! returning modules in dependency-first order plus a per-module export
//! table. `std:*` specifiers are served by [`BuiltinProvider`] from the
//! embedded [`crate::stdlib`] table; everything else goes to the
//! host-supplied [`SourceProvider`].
//!
//! A resolution failure (missing module, import cycle, missing export) is
//! structural — there is no well-formed module graph to hand the checker —
//! so `resolve` returns `Result::Err` rather than folding it into a
//! diagnostics vector the way the checker and normalizer do; `api::compile`
//! converts that single error into a `Diagnostic` and stops the pipeline
//! there.

use crate::ast::{Program, TopLevel};
use crate::diagnostics::Diagnostic;
use crate::error::ResolveError;
use crate::{lexer, parser, stdlib};
use std::collections::{HashMap, HashSet};

/// A capability for turning a module specifier into source text. The host
/// implements this for user modules; `std:` specifiers never reach it
/// because [`CompositeProvider`] intercepts them first.
pub trait SourceProvider {
    /// Returns `(source_text, canonical_key)`, or `None` if the specifier
    /// is not known to this provider.
    fn load(&self, specifier: &str) -> Option<(String, String)>;
}

/// Serves the ten embedded `std:*` modules.
pub struct BuiltinProvider;

impl SourceProvider for BuiltinProvider {
    fn load(&self, specifier: &str) -> Option<(String, String)> {
        let name = specifier.strip_prefix("std:")?;
        let source = stdlib::lookup(name)?;
        Some((source.to_string(), specifier.to_string()))
    }
}

/// Tries the built-in provider before the host provider, per the "tries
/// `std:` first" rule.
pub struct CompositeProvider<'a> {
    builtin: BuiltinProvider,
    host: &'a dyn SourceProvider,
}

impl<'a> CompositeProvider<'a> {
    pub fn new(host: &'a dyn SourceProvider) -> CompositeProvider<'a> {
        CompositeProvider { builtin: BuiltinProvider, host }
    }
}

impl<'a> SourceProvider for CompositeProvider<'a> {
    fn load(&self, specifier: &str) -> Option<(String, String)> {
        self.builtin.load(specifier).or_else(|| self.host.load(specifier))
    }
}

/// A single resolved module: its canonical key and parsed AST.
pub struct ResolvedModule {
    pub key: String,
    pub program: Program,
}

/// Maps an exported name to the index of its declaration in
/// `ResolvedModule.program.body`.
pub type ExportTable = HashMap<String, usize>;

pub struct ResolveOutcome {
    /// Dependency-first order: a module's imports all appear before it.
    pub modules: Vec<ResolvedModule>,
    pub exports: HashMap<String, ExportTable>,
    pub main_key: String,
    pub diagnostics: Vec<Diagnostic>,
}

const MAIN_KEY: &str = "<main>";

/// Resolves the full module graph reachable from `main_source`.
pub fn resolve(
    main_source: &str,
    provider: &dyn SourceProvider,
) -> Result<ResolveOutcome, ResolveError> {
    let composite = CompositeProvider::new(provider);
    let mut diagnostics = Vec::new();
    let mut order: Vec<ResolvedModule> = Vec::new();
    let mut exports: HashMap<String, ExportTable> = HashMap::new();
    let mut visiting: Vec<String> = Vec::new();
    let mut resolved_keys: HashSet<String> = HashSet::new();

    let main_program = parse_unit(MAIN_KEY, main_source, &mut diagnostics);
    visit(
        MAIN_KEY.to_string(),
        main_program,
        &composite,
        &mut order,
        &mut exports,
        &mut visiting,
        &mut resolved_keys,
        &mut diagnostics,
    )?;

    Ok(ResolveOutcome { modules: order, exports, main_key: MAIN_KEY.to_string(), diagnostics })
}

fn parse_unit(key: &str, source: &str, diagnostics: &mut Vec<Diagnostic>) -> Program {
    match lexer::tokenize(source) {
        Ok(tokens) => {
            let (program, errors) = parser::parse(tokens);
            diagnostics.extend(errors.into_iter().map(|e| Diagnostic::from(e).with_file(key)));
            program
        }
        Err(err) => {
            diagnostics.push(Diagnostic::from(err).with_file(key));
            Program { imports: Vec::new(), body: Vec::new() }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn visit(
    key: String,
    program: Program,
    provider: &CompositeProvider,
    order: &mut Vec<ResolvedModule>,
    exports: &mut HashMap<String, ExportTable>,
    visiting: &mut Vec<String>,
    resolved_keys: &mut HashSet<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), ResolveError> {
    if resolved_keys.contains(&key) {
        return Ok(());
    }
    if visiting.contains(&key) {
        let mut path = visiting.clone();
        path.push(key);
        return Err(ResolveError::ImportCycle { path });
    }
    visiting.push(key.clone());

    let mut table = ExportTable::new();
    for (index, item) in program.body.iter().enumerate() {
        match item {
            TopLevel::Fn(f) if f.exported => {
                table.insert(f.name.clone(), index);
            }
            TopLevel::Const(c) if c.exported => {
                if let crate::ast::Pattern::Name(name) = &c.pattern {
                    table.insert(name.clone(), index);
                }
            }
            _ => {}
        }
    }

    for import in &program.imports {
        let (source, dep_key) = provider.load(&import.from).ok_or_else(|| ResolveError::ModuleNotFound {
            specifier: import.from.clone(),
        })?;
        let dep_program = parse_unit(&dep_key, &source, diagnostics);
        visit(
            dep_key.clone(),
            dep_program,
            provider,
            order,
            exports,
            visiting,
            resolved_keys,
            diagnostics,
        )?;

        let dep_exports = exports.get(&dep_key).cloned().unwrap_or_default();
        match &import.kind {
            crate::ast::ImportKind::Named(names) => {
                for (name, _alias) in names {
                    if !dep_exports.contains_key(name) {
                        return Err(ResolveError::MissingExport {
                            specifier: import.from.clone(),
                            name: name.clone(),
                        });
                    }
                }
            }
            crate::ast::ImportKind::Namespace(_) => {}
        }
    }

    visiting.pop();
    resolved_keys.insert(key.clone());
    exports.insert(key.clone(), table);
    order.push(ResolvedModule { key, program });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyProvider;
    impl SourceProvider for EmptyProvider {
        fn load(&self, _specifier: &str) -> Option<(String, String)> {
            None
        }
    }

    #[test]
    fn resolves_std_core_dependency() {
        let src = r#"import { concat } from "std:core"; fn main() { return 1; }"#;
        let outcome = resolve(src, &EmptyProvider).expect("resolution should succeed");
        assert_eq!(outcome.modules.len(), 2);
        assert_eq!(outcome.modules[0].key, "std:core");
        assert_eq!(outcome.modules[1].key, MAIN_KEY);
        assert!(outcome.exports["std:core"].contains_key("concat"));
    }

    #[test]
    fn missing_module_is_an_error() {
        let src = r#"import { x } from "nope"; fn main() { return 1; }"#;
        let err = resolve(src, &EmptyProvider).unwrap_err();
        assert!(matches!(err, ResolveError::ModuleNotFound { .. }));
    }

    #[test]
    fn missing_export_is_an_error() {
        let src = r#"import { doesNotExist } from "std:core"; fn main() { return 1; }"#;
        let err = resolve(src, &EmptyProvider).unwrap_err();
        assert!(matches!(err, ResolveError::MissingExport { .. }));
    }

    struct CyclicProvider;
    impl SourceProvider for CyclicProvider {
        fn load(&self, specifier: &str) -> Option<(String, String)> {
            match specifier {
                "a" => Some((r#"import { f } from "b"; export fn g() { return 1; }"#.to_string(), "a".to_string())),
                "b" => Some((r#"import { g } from "a"; export fn f() { return 1; }"#.to_string(), "b".to_string())),
                _ => None,
            }
        }
    }

    #[test]
    fn import_cycle_is_an_error() {
        let src = r#"import { f } from "b"; fn main() { return 1; }"#;
        let err = resolve(src, &CyclicProvider).unwrap_err();
        assert!(matches!(err, ResolveError::ImportCycle { .. }));
    }
}
