//! Public error types for the VFR compiler API.
//!
//! Internal errors (lexing, compilation, emission) are converted to these
//! types at the API boundary.

use core::fmt;

use crate::syntax::Span;

/// Public error type for all compiler operations.
#[derive(Debug)]
pub enum Error {
    /// Lexical, syntactic or semantic errors in the VFR source.
    ///
    /// Carries every diagnostic collected in the pass and the source text
    /// they point into.
    Compilation {
        diagnostics: Vec<Diagnostic>,
        source: String,
    },

    /// The opcode tree could not be serialized. Always a compiler defect.
    Emit(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Compilation { diagnostics, .. } => {
                let error_count = diagnostics
                    .iter()
                    .filter(|d| d.severity == Severity::Error)
                    .count();
                write!(f, "Compilation failed with {} error(s)", error_count)
            }
            Error::Emit(msg) => write!(f, "Emit error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::Compilation { diagnostics, .. } => diagnostics,
            Error::Emit(_) => &[],
        }
    }
}

/// A diagnostic message (error, warning, or info) with source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,

    /// Primary diagnostic message.
    pub message: String,

    /// 1-based source line.
    pub line: u32,

    /// Source location of the primary issue.
    pub span: Span,

    /// Optional help text suggesting how to fix the issue.
    pub help: Option<String>,

    /// Stable error code (e.g., "V004").
    pub code: Option<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.severity)?;
        if let Some(code) = &self.code {
            write!(f, "[{}]", code)?;
        }
        write!(f, " (line {}): {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - compilation cannot succeed.
    Error,
    /// Warning - suspicious code that might be wrong.
    Warning,
    /// Info - informational message.
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl From<crate::lexer::LexError> for Diagnostic {
    fn from(err: crate::lexer::LexError) -> Self {
        Diagnostic {
            severity: Severity::Error,
            message: err.to_string(),
            line: err.line,
            span: err.span,
            help: None,
            code: Some(String::from("V000")),
        }
    }
}

impl From<crate::emitter::EmitError> for Error {
    fn from(err: crate::emitter::EmitError) -> Self {
        Error::Emit(err.to_string())
    }
}
