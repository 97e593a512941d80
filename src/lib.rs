//! # TakoMusic Core
//!
//! Language front-end and evaluator for TakoMusic, a DSL for composing
//! music as code. A source file declares pure functions that construct a
//! `Score` value; this crate turns that source text into a fully resolved,
//! backend-agnostic intermediate representation (IR). Renderers (MIDI,
//! MusicXML, DAW) consume the IR; they live outside this crate.
//!
//! ## Compilation pipeline
//!
//! ```text
//! source → Lexer → Parser → Resolver → Checker → Evaluator → IR normalizer
//! ```
//!
//! 1. **Lexer** ([`lexer`]) — byte stream to a located token stream.
//! 2. **Parser** ([`parser`]) — tokens to a typed [`ast::Program`].
//! 3. **Module resolver** ([`resolver`], [`stdlib`]) — follows `import`
//!    directives into a dependency-ordered module graph.
//! 4. **Type checker** ([`checker`]) — one advisory pass per module,
//!    collecting diagnostics without rewriting the AST.
//! 5. **Evaluator** ([`eval`]) — a tree-walking interpreter producing
//!    runtime values, including `Score` and `Clip` aggregates.
//! 6. **IR normalizer** ([`ir`]) — resolves symbolic positions against the
//!    meter map, validates invariants, sorts events, serializes.
//!
//! Every stage after the lexer shares one [`diagnostics::Diagnostic`]
//! stream. [`api::compile`] drives all six stages and returns a
//! `{ ir?, diagnostics }` pair matching the host contract in
//! `SPEC_FULL.md` §7.
//!
//! ## Quick start
//!
//! ```rust
//! use tako::{compile, resolver::SourceProvider};
//!
//! struct NoModules;
//! impl SourceProvider for NoModules {
//!     fn load(&self, _specifier: &str) -> Option<(String, String)> {
//!         None
//!     }
//! }
//!
//! let source = r#"
//! fn main() {
//!     return score {
//!         tempo { 1:1 -> 120bpm; }
//!         meter { 1:1 -> 4/4; }
//!         sound "piano" kind instrument {}
//!         track "Piano" role Instrument sound "piano" {
//!             place 1:1 clip { note(C4, q); note(E4, q); };
//!         }
//!     };
//! }
//! "#;
//!
//! let outcome = compile(source, &NoModules);
//! assert!(outcome.ir.is_some(), "{:?}", outcome.diagnostics);
//! ```
//!
//! ## Out of scope
//!
//! Surface file I/O, the CLI, watch mode, renderer plugins, editor
//! integrations. Source is supplied through [`resolver::SourceProvider`];
//! this crate never touches a filesystem itself (the `cli` feature's
//! `takoc` binary is a thin dev convenience, not part of the core).

pub mod ast;
pub mod checker;
pub mod diagnostics;
pub mod error;
pub mod eval;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod pitch;
pub mod pos;
pub mod rational;
pub mod resolver;
pub mod stdlib;

pub mod api;

pub use api::{compile, compile_unchecked, CompileOutcome};
pub use diagnostics::{Diagnostic, Position, Severity};
pub use error::TakoError;
pub use ir::IrDocument;
pub use resolver::SourceProvider;
