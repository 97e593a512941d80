//! # Error Types
//!
//! This module defines the error types for every stage of the pipeline that
//! is allowed to halt outright: the lexer (a single malformed byte ends
//! tokenization), the module resolver (a cycle or missing module ends
//! resolution), and the evaluator (a runtime error halts evaluation, per
//! the propagation policy in `SPEC_FULL.md` §7).
//!
//! The parser and type checker do not halt — they *collect* structured
//! problems instead, so their error shapes ([`ParseError`], [`CheckFinding`])
//! are converted straight into [`crate::diagnostics::Diagnostic`]s rather
//! than returned as a single `Result::Err`. The normalizer never halts at
//! all; its diagnostics are built directly in `ir.rs`.
//!
//! Every variant here carries enough position information to build a
//! [`crate::diagnostics::Diagnostic`] via `.into()`.

use crate::diagnostics::{Diagnostic, Position, Severity};
use thiserror::Error;

/// Errors that can stop the lexer outright.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedChar { ch: char, line: usize, column: usize },

    #[error("unterminated string literal starting at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },

    #[error("invalid escape sequence '\\{ch}' at line {line}, column {column}")]
    InvalidEscape { ch: char, line: usize, column: usize },

    #[error("unterminated template expression starting at line {line}, column {column}")]
    UnterminatedTemplateExpr { line: usize, column: usize },

    #[error("invalid number literal '{text}' at line {line}, column {column}")]
    InvalidNumber { text: String, line: usize, column: usize },
}

impl LexError {
    pub fn code(&self) -> &'static str {
        match self {
            LexError::UnexpectedChar { .. } => "unexpected-char",
            LexError::UnterminatedString { .. } => "unterminated-string",
            LexError::InvalidEscape { .. } => "invalid-escape",
            LexError::UnterminatedTemplateExpr { .. } => "unterminated-template-expr",
            LexError::InvalidNumber { .. } => "invalid-number",
        }
    }

    pub fn position(&self) -> Position {
        match *self {
            LexError::UnexpectedChar { line, column, .. }
            | LexError::UnterminatedString { line, column }
            | LexError::InvalidEscape { line, column, .. }
            | LexError::UnterminatedTemplateExpr { line, column }
            | LexError::InvalidNumber { line, column, .. } => Position::new(line, column),
        }
    }
}

impl From<LexError> for Diagnostic {
    fn from(err: LexError) -> Diagnostic {
        let code = err.code();
        let position = err.position();
        Diagnostic::error(code, err.to_string()).with_position(position)
    }
}

/// Errors the parser records and recovers from. A recovered parse keeps
/// producing a best-effort [`crate::ast::Program`] so the checker still has
/// something to look at.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token '{found}' at line {line}, column {column}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        line: usize,
        column: usize,
    },

    #[error("missing semicolon at line {line}, column {column}")]
    MissingSemicolon { line: usize, column: usize },

    #[error("missing closing brace at line {line}, column {column}")]
    MissingBrace { line: usize, column: usize },

    #[error("expected identifier at line {line}, column {column}")]
    ExpectedIdentifier { line: usize, column: usize },

    #[error("invalid import declaration at line {line}, column {column}: {message}")]
    InvalidImport { message: String, line: usize, column: usize },

    #[error("invalid pattern at line {line}, column {column}: {message}")]
    InvalidPattern { message: String, line: usize, column: usize },
}

impl ParseError {
    pub fn code(&self) -> &'static str {
        match self {
            ParseError::UnexpectedToken { .. } => "unexpected-token",
            ParseError::MissingSemicolon { .. } => "missing-semicolon",
            ParseError::MissingBrace { .. } => "missing-brace",
            ParseError::ExpectedIdentifier { .. } => "expected-identifier",
            ParseError::InvalidImport { .. } => "invalid-import",
            ParseError::InvalidPattern { .. } => "invalid-pattern",
        }
    }

    pub fn position(&self) -> Position {
        match *self {
            ParseError::UnexpectedToken { line, column, .. }
            | ParseError::MissingSemicolon { line, column }
            | ParseError::MissingBrace { line, column }
            | ParseError::ExpectedIdentifier { line, column }
            | ParseError::InvalidImport { line, column, .. }
            | ParseError::InvalidPattern { line, column, .. } => Position::new(line, column),
        }
    }
}

impl From<ParseError> for Diagnostic {
    fn from(err: ParseError) -> Diagnostic {
        let code = err.code();
        let position = err.position();
        Diagnostic::error(code, err.to_string()).with_position(position)
    }
}

/// Errors that stop module resolution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("module not found: {specifier}")]
    ModuleNotFound { specifier: String },

    #[error("import cycle detected: {}", path.join(" -> "))]
    ImportCycle { path: Vec<String> },

    #[error("module '{specifier}' has no export named '{name}'")]
    MissingExport { specifier: String, name: String },
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        match self {
            ResolveError::ModuleNotFound { .. } => "module-not-found",
            ResolveError::ImportCycle { .. } => "import-cycle",
            ResolveError::MissingExport { .. } => "missing-export",
        }
    }
}

impl From<ResolveError> for Diagnostic {
    fn from(err: ResolveError) -> Diagnostic {
        let code = err.code();
        Diagnostic::error(code, err.to_string())
    }
}

/// Runtime errors raised by the evaluator. The evaluator halts on the
/// first one of these rather than collecting, because continued
/// evaluation over a broken runtime value would be meaningless.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("function '{name}' expected {expected} argument(s), got {got}")]
    ArityMismatch { name: String, expected: usize, got: usize },

    #[error("missing required argument '{param}' in call to '{name}'")]
    MissingArgument { name: String, param: String },

    #[error("unknown named argument '{arg}' in call to '{name}'")]
    UnknownNamedArgument { name: String, arg: String },

    #[error("invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("stack overflow: call depth exceeded {limit}")]
    StackOverflow { limit: usize },

    #[error("division by zero")]
    DivideByZero,

    #[error("cannot add a Pos to a Pos")]
    PosPlusPos,

    #[error("value is not callable")]
    NonCallable,
}

impl EvalError {
    pub fn code(&self) -> &'static str {
        match self {
            EvalError::ArityMismatch { .. } => "arity-mismatch",
            EvalError::MissingArgument { .. } => "missing-argument",
            EvalError::UnknownNamedArgument { .. } => "unknown-named-argument",
            EvalError::InvalidOperation { .. } => "invalid-operation",
            EvalError::StackOverflow { .. } => "stack-overflow",
            EvalError::DivideByZero => "divide-by-zero",
            EvalError::PosPlusPos => "pos-plus-pos",
            EvalError::NonCallable => "non-callable",
        }
    }
}

impl From<EvalError> for Diagnostic {
    fn from(err: EvalError) -> Diagnostic {
        let code = err.code();
        Diagnostic::error(code, err.to_string())
    }
}

/// Type-checker findings. Unlike the other stage errors, these are never
/// returned as a `Result::Err` — `checker::check` always returns a
/// `Vec<Diagnostic>` built directly, since the checker "never throws...
/// collects" per the contract in `SPEC_FULL.md` §4.4. This enum exists so
/// the checker's own code can match exhaustively before converting, and so
/// every finding's wording lives in one place.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckFinding {
    #[error("undefined symbol '{name}'")]
    UndefinedSymbol { name: String, suggestion: Option<String> },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("expected a Dur (duration) value here")]
    ExpectedDuration,

    #[error("expected a Pos (position) value here")]
    ExpectedPosition,

    #[error("expected a Pitch value here")]
    ExpectedPitch,

    #[error("expected a Number value here")]
    ExpectedNumber,

    #[error("expected a String value here")]
    ExpectedString,

    #[error("expected a Clip value here")]
    ExpectedClip,

    #[error("track role does not match sound kind: {message}")]
    RoleMismatch { message: String },

    #[error("unknown sound id '{id}'")]
    UnknownSound { id: String },
}

impl CheckFinding {
    pub fn code(&self) -> &'static str {
        match self {
            CheckFinding::UndefinedSymbol { .. } => "undefined-symbol",
            CheckFinding::TypeMismatch { .. } => "type-mismatch",
            CheckFinding::ExpectedDuration => "expected-duration",
            CheckFinding::ExpectedPosition => "expected-position",
            CheckFinding::ExpectedPitch => "expected-pitch",
            CheckFinding::ExpectedNumber => "expected-number",
            CheckFinding::ExpectedString => "expected-string",
            CheckFinding::ExpectedClip => "expected-clip",
            CheckFinding::RoleMismatch { .. } => "role-mismatch",
            CheckFinding::UnknownSound { .. } => "unknown-sound",
        }
    }

    /// `role-mismatch` is the one checker finding the spec calls out as a
    /// warning rather than an error (see `SPEC_FULL.md` §4.4).
    pub fn severity(&self) -> Severity {
        match self {
            CheckFinding::RoleMismatch { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    fn full_message(&self) -> String {
        if let CheckFinding::UndefinedSymbol { name, suggestion } = self {
            match suggestion {
                Some(candidate) => format!(
                    "undefined symbol '{}' (did you mean '{}'?)",
                    name, candidate
                ),
                None => format!("undefined symbol '{}'", name),
            }
        } else {
            self.to_string()
        }
    }

    pub fn at(self, position: Position) -> Diagnostic {
        Diagnostic {
            severity: self.severity(),
            code: self.code().to_string(),
            message: self.full_message(),
            position: Some(position),
            file_path: None,
        }
    }
}

/// The single error type [`crate::api::compile_unchecked`] returns: that
/// function skips the type checker and wants a plain `Result` rather than a
/// diagnostics vector, so every stage's halting error (and a catch-all for
/// the lexer/parser diagnostics it still collects along the way) folds into
/// one enum here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TakoError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("{0} diagnostic(s) reported before evaluation could run")]
    Diagnostics(usize),
}
