//! Error kinds and the diagnostic interface consumed by the node transformer (C3).
//!
//! Mirrors a stable-code compiler error (code, message, source position) but
//! closes the code set over the fixed ECMAScript completion taxonomy this
//! core actually raises, rather than an open-ended compiler-invariant
//! catalogue.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The ECMAScript completion category an error surfaces as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    ReferenceError,
    TypeError,
    Error,
    SyntaxError,
}

/// Stable error kinds raised by the scope/activation/module layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    TdzRead,
    TdzWrite,
    AssignConst,
    AssignReadonlyImport,
    StrictCaller,
    NotExtensible,
    ImportUnresolved,
    SyntaxError,
}

impl ErrorKind {
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorKind::TdzRead | ErrorKind::TdzWrite => ErrorCategory::ReferenceError,
            ErrorKind::AssignConst
            | ErrorKind::AssignReadonlyImport
            | ErrorKind::StrictCaller
            | ErrorKind::NotExtensible => ErrorCategory::TypeError,
            ErrorKind::ImportUnresolved => ErrorCategory::Error,
            ErrorKind::SyntaxError => ErrorCategory::SyntaxError,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::TdzRead => "TDZ_READ",
            ErrorKind::TdzWrite => "TDZ_WRITE",
            ErrorKind::AssignConst => "ASSIGN_CONST",
            ErrorKind::AssignReadonlyImport => "ASSIGN_READONLY_IMPORT",
            ErrorKind::StrictCaller => "STRICT_CALLER",
            ErrorKind::NotExtensible => "NOT_EXTENSIBLE",
            ErrorKind::ImportUnresolved => "IMPORT_UNRESOLVED",
            ErrorKind::SyntaxError => "SYNTAX_ERROR",
        }
    }
}

/// A source position copied from the originating node, when available.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: u32,
    pub column: u32,
}

impl SourcePosition {
    pub const fn unknown() -> Self {
        SourcePosition { line: 0, column: 0 }
    }
}

/// An abrupt completion carrying an error kind, message and source position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
    pub position: SourcePosition,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        EngineError {
            kind,
            message: message.into(),
            position: SourcePosition::unknown(),
        }
    }

    pub fn at(kind: ErrorKind, message: impl Into<String>, position: SourcePosition) -> Self {
        EngineError {
            kind,
            message: message.into(),
            position,
        }
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn category(&self) -> ErrorCategory {
        self.kind.category()
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} [{}] at {}:{}: {}",
            self.category(),
            self.code(),
            self.position.line,
            self.position.column,
            self.message
        )
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;

/// The diagnostic interface consumed by the node transformer (C3). The
/// transformer is pure for ordinary source and only reports *source-level*
/// errors through here (e.g. `eval` assignment in strict mode); internal
/// consistency violations crash the transformer directly instead (see
/// `transformer::panics_on_structural_impossibility`).
pub trait DiagnosticSink {
    fn report(&mut self, error: EngineError);
}

/// A `DiagnosticSink` that simply collects every reported error, in order.
#[derive(Debug, Default, Clone)]
pub struct CollectingDiagnostics {
    pub errors: Vec<EngineError>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl DiagnosticSink for CollectingDiagnostics {
    fn report(&mut self, error: EngineError) {
        self.errors.push(error);
    }
}
