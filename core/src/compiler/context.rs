//! Per-compilation state shared by the expression and statement compilers.

use super::cursor::Cursor;
use super::error::{CompileError, CompileErrorKind, CompileWarning};
use crate::api::CompileOptions;
use crate::lexer::{Token, TokenKind};
use crate::strings::StringResolver;
use crate::table::SymbolTable;

pub struct CompileContext<'r> {
    pub symbols: SymbolTable,
    pub strings: &'r dyn StringResolver,
    pub options: CompileOptions,
    pub errors: Vec<CompileError>,
    pub warnings: Vec<CompileWarning>,
    /// Form whose statements are being compiled.
    pub current_form: u16,
}

impl<'r> CompileContext<'r> {
    pub fn new(strings: &'r dyn StringResolver, options: CompileOptions) -> Self {
        Self {
            symbols: SymbolTable::new(options.default_pack),
            strings,
            options,
            errors: Vec::new(),
            warnings: Vec::new(),
            current_form: 0,
        }
    }

    pub fn report(&mut self, err: CompileError) {
        tracing::debug!(line = err.line, kind = %err.kind, "{}", err.message);
        self.errors.push(err);
    }

    pub fn warn(&mut self, message: impl Into<String>, at: &Token<'_>) {
        let message = message.into();
        tracing::warn!(line = at.line, "{}", message);
        self.warnings.push(CompileWarning {
            message,
            line: at.line,
            span: at.span.clone(),
        });
    }

    /// A string id: `STRING_TOKEN(NAME)`, `STRING_TOKEN(0x12)`, a bare name
    /// or a bare number.
    pub fn string_id(&self, cursor: &mut Cursor<'_, '_>) -> Result<u16, CompileError> {
        if cursor.eat_word("STRING_TOKEN") {
            cursor.expect(TokenKind::LParen)?;
            let id = self.string_operand(cursor)?;
            cursor.expect(TokenKind::RParen)?;
            Ok(id)
        } else {
            self.string_operand(cursor)
        }
    }

    fn string_operand(&self, cursor: &mut Cursor<'_, '_>) -> Result<u16, CompileError> {
        match cursor.peek() {
            Some(token) if token.kind == TokenKind::Number => {
                cursor.expect_number_as("string id")
            }
            Some(token) if token.kind == TokenKind::Ident => {
                cursor.next();
                self.strings.resolve(token.text).ok_or_else(|| {
                    CompileError::new(
                        CompileErrorKind::UnknownString,
                        format!("unknown string '{}'", token.text),
                        token,
                    )
                })
            }
            _ => Err(cursor.expected("a string token")),
        }
    }
}
