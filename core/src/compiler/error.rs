//! Compilation errors.

use core::fmt;

use thiserror::Error;

use crate::api::{Diagnostic, Severity};
use crate::lexer::Token;
use crate::syntax::Span;
use crate::table::SymbolError;

/// Error categories. Each has a stable diagnostic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompileErrorKind {
    Syntax,
    ScopeMismatch,
    DuplicateType,
    DuplicateField,
    DuplicateStore,
    DuplicateQuestion,
    DuplicateRule,
    UnknownField,
    UnknownType,
    UnknownStore,
    UnknownQuestion,
    UnknownRule,
    UnknownDefaultStore,
    UnknownString,
    IndexOutOfRange,
    Overflow,
    InvalidBitField,
    InvalidValue,
    DialectMix,
}

impl CompileErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            CompileErrorKind::Syntax => "V001",
            CompileErrorKind::ScopeMismatch => "V002",
            CompileErrorKind::DuplicateType => "V003",
            CompileErrorKind::DuplicateField => "V004",
            CompileErrorKind::DuplicateStore => "V005",
            CompileErrorKind::DuplicateQuestion => "V006",
            CompileErrorKind::DuplicateRule => "V007",
            CompileErrorKind::UnknownField => "V008",
            CompileErrorKind::UnknownType => "V009",
            CompileErrorKind::UnknownStore => "V010",
            CompileErrorKind::UnknownQuestion => "V011",
            CompileErrorKind::UnknownRule => "V012",
            CompileErrorKind::UnknownDefaultStore => "V013",
            CompileErrorKind::UnknownString => "V014",
            CompileErrorKind::IndexOutOfRange => "V015",
            CompileErrorKind::Overflow => "V016",
            CompileErrorKind::InvalidBitField => "V017",
            CompileErrorKind::InvalidValue => "V018",
            CompileErrorKind::DialectMix => "V019",
        }
    }

    /// Errors after which the rest of the enclosing form is skipped.
    pub fn aborts_form(self) -> bool {
        matches!(
            self,
            CompileErrorKind::ScopeMismatch | CompileErrorKind::DialectMix
        )
    }
}

impl fmt::Display for CompileErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<&SymbolError> for CompileErrorKind {
    fn from(err: &SymbolError) -> Self {
        match err {
            SymbolError::DuplicateType { .. } => CompileErrorKind::DuplicateType,
            SymbolError::DuplicateField { .. } => CompileErrorKind::DuplicateField,
            SymbolError::DuplicateStore { .. }
            | SymbolError::DuplicateStoreId { .. }
            | SymbolError::DuplicateDefaultStore { .. }
            | SymbolError::DuplicateDefaultStoreId { .. } => CompileErrorKind::DuplicateStore,
            SymbolError::DuplicateQuestion { .. } | SymbolError::DuplicateQuestionId { .. } => {
                CompileErrorKind::DuplicateQuestion
            }
            SymbolError::DuplicateRule { .. } => CompileErrorKind::DuplicateRule,
            SymbolError::UnknownType { .. } => CompileErrorKind::UnknownType,
            SymbolError::UnknownField { .. } => CompileErrorKind::UnknownField,
            SymbolError::UnknownStore { .. } => CompileErrorKind::UnknownStore,
            SymbolError::UnknownDefaultStore { .. } => CompileErrorKind::UnknownDefaultStore,
            SymbolError::UnknownQuestion { .. } => CompileErrorKind::UnknownQuestion,
            SymbolError::UnknownRule { .. } => CompileErrorKind::UnknownRule,
            SymbolError::IndexOutOfRange { .. } => CompileErrorKind::IndexOutOfRange,
            SymbolError::BitFieldOverflow { .. } | SymbolError::Overflow { .. } => {
                CompileErrorKind::Overflow
            }
            SymbolError::InvalidBitField { .. } => CompileErrorKind::InvalidBitField,
            SymbolError::InvalidPack(_) | SymbolError::PackStackEmpty => {
                CompileErrorKind::InvalidValue
            }
        }
    }
}

/// An error tied to a source position.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub message: String,
    pub line: u32,
    pub span: Span,
    pub help: Option<String>,
    #[source]
    pub symbol: Option<SymbolError>,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, message: impl Into<String>, at: &Token<'_>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: at.line,
            span: at.span.clone(),
            help: None,
            symbol: None,
        }
    }

    pub fn syntax(message: impl Into<String>, at: &Token<'_>) -> Self {
        Self::new(CompileErrorKind::Syntax, message, at)
    }

    pub fn symbol(err: SymbolError, at: &Token<'_>) -> Self {
        Self {
            kind: CompileErrorKind::from(&err),
            message: err.to_string(),
            line: at.line,
            span: at.span.clone(),
            help: None,
            symbol: Some(err),
        }
    }

    /// Error at the end of input.
    pub fn at_end(kind: CompileErrorKind, message: impl Into<String>, line: u32, offset: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
            span: Span::new(offset, offset),
            help: None,
            symbol: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Convert to a Diagnostic for API boundary.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            message: self.message.clone(),
            line: self.line,
            span: self.span.clone(),
            help: self.help.clone(),
            code: Some(self.kind.code().to_string()),
        }
    }
}

/// A non-fatal finding reported alongside a successful compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileWarning {
    pub message: String,
    pub line: u32,
    pub span: Span,
}

impl CompileWarning {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            severity: Severity::Warning,
            message: self.message.clone(),
            line: self.line,
            span: self.span.clone(),
            help: None,
            code: None,
        }
    }
}
