//! Lexer for VFR source text.
//!
//! The compilers consume a token stream; this module produces one from text
//! after preprocessing has already expanded `#define` and `#include`.

mod token;


pub use token::{Token, TokenKind, parse_number};

use logos::Logos;
use thiserror::Error;

use crate::syntax::{LineIndex, Span};

/// A character sequence that matches no token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized input '{text}'")]
pub struct LexError {
    pub text: String,
    pub span: Span,
    pub line: u32,
}

/// Tokenize `source`, collecting every lexical error instead of stopping at
/// the first one.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, Vec<LexError>> {
    let lines = LineIndex::new(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    let mut lexer = TokenKind::lexer(source);
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let line = lines.line_of(range.start);
        let span = Span(range);
        match result {
            Ok(kind) => tokens.push(Token::new(kind, lexer.slice(), span, line)),
            Err(()) => errors.push(LexError {
                text: lexer.slice().to_string(),
                span,
                line,
            }),
        }
    }

    tracing::trace!(count = tokens.len(), "tokenized VFR source");

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}
