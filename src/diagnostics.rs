//! # Diagnostic Stream
//!
//! Every stage of the pipeline (lexer, parser, resolver, checker,
//! evaluator, normalizer) writes into the same kind of value: a
//! [`Diagnostic`]. The host sees the accumulated list via
//! [`crate::api::CompileOutcome`]; this module only defines the shape, not
//! the collection policy (that lives per-stage, see `error.rs` and `§7` of
//! `SPEC_FULL.md`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a single diagnostic. Errors suppress IR emission; warnings
/// and info do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// A source position, 1-indexed line and column (matching the lexer's
/// `LocatedToken` convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Position {
        Position { line, column }
    }
}

/// A single diagnostic emitted by any pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub position: Option<Position>,
    pub file_path: Option<String>,
}

impl Diagnostic {
    pub fn error(code: &str, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            code: code.to_string(),
            message: message.into(),
            position: None,
            file_path: None,
        }
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            severity: Severity::Warning,
            code: code.to_string(),
            message: message.into(),
            position: None,
            file_path: None,
        }
    }

    pub fn with_position(mut self, position: Position) -> Diagnostic {
        self.position = Some(position);
        self
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Diagnostic {
        self.file_path = Some(file_path.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.severity, self.code)?;
        if let Some(path) = &self.file_path {
            write!(f, " {}", path)?;
        }
        if let Some(pos) = &self.position {
            write!(f, ":{}:{}", pos.line, pos.column)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// True if any diagnostic in the list is error-severity; used by
/// [`crate::api::compile`] to decide whether to withhold the IR.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}
