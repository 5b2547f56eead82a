//! Token cursor with the small parsers shared by every statement: numbers,
//! GUIDs, varid paths and flag lists.

use uuid::Uuid;

use super::error::{CompileError, CompileErrorKind};
use crate::ifr::guid;
use crate::lexer::{Token, TokenKind};
use crate::table::{PathSegment, VarIdPath};

/// Keywords that close a scope. Error recovery never skips past one.
pub const END_KEYWORDS: &[&str] = &[
    "endformset",
    "endform",
    "endif",
    "endsubtitle",
    "endcheckbox",
    "endnumeric",
    "endoneof",
    "endlist",
    "endstring",
    "endpassword",
    "enddate",
    "endtime",
    "endaction",
    "endresetbutton",
    "endrule",
];

/// One item of a `flags = A | B | 0x10` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagItem<'t, 'src> {
    Name(&'t Token<'src>),
    Number(u64, &'t Token<'src>),
}

#[derive(Debug, Clone)]
pub struct Cursor<'t, 'src> {
    tokens: &'t [Token<'src>],
    pos: usize,
}

impl<'t, 'src> Cursor<'t, 'src> {
    pub fn new(tokens: &'t [Token<'src>]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn reset(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek(&self) -> Option<&'t Token<'src>> {
        self.tokens.get(self.pos)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&'t Token<'src>> {
        self.tokens.get(self.pos + n)
    }

    pub fn next(&mut self) -> Option<&'t Token<'src>> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    pub fn at(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|t| t.kind == kind)
    }

    pub fn at_word(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(word))
    }

    pub fn at_any_word(&self, words: &[&str]) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Ident && words.contains(&t.text))
    }

    /// True at `word =`.
    pub fn at_key(&self, word: &str) -> bool {
        self.at_word(word) && self.peek_nth(1).is_some_and(|t| t.kind == TokenKind::Assign)
    }

    /// True when the last consumed token was a `;`.
    pub fn after_semi(&self) -> bool {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .is_some_and(|t| t.kind == TokenKind::Semi)
    }

    pub fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn eat_word(&mut self, word: &str) -> bool {
        if self.at_word(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// An error located at the current token (or the end of input).
    pub fn error(&self, kind: CompileErrorKind, message: impl Into<String>) -> CompileError {
        match self.peek() {
            Some(token) => CompileError::new(kind, message, token),
            None => {
                let (line, offset) = self
                    .tokens
                    .last()
                    .map(|t| (t.line, t.span.0.end))
                    .unwrap_or((1, 0));
                CompileError::at_end(kind, message, line, offset)
            }
        }
    }

    fn found(&self) -> String {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Ident || token.kind == TokenKind::Number => {
                format!("'{}'", token.text)
            }
            Some(token) => token.kind.describe().to_string(),
            None => "end of input".to_string(),
        }
    }

    pub fn expected(&self, what: &str) -> CompileError {
        self.error(
            CompileErrorKind::Syntax,
            format!("expected {}, found {}", what, self.found()),
        )
    }

    pub fn expect(&mut self, kind: TokenKind) -> Result<&'t Token<'src>, CompileError> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.expected(kind.describe())),
        }
    }

    pub fn expect_word(&mut self, word: &str) -> Result<&'t Token<'src>, CompileError> {
        match self.peek() {
            Some(token) if token.is_word(word) => {
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.expected(&format!("'{}'", word))),
        }
    }

    pub fn expect_ident(&mut self) -> Result<&'t Token<'src>, CompileError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Ident => {
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.expected("an identifier")),
        }
    }

    pub fn expect_number(&mut self) -> Result<(u64, &'t Token<'src>), CompileError> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Number => {
                let value = token.number().ok_or_else(|| {
                    CompileError::new(
                        CompileErrorKind::Overflow,
                        format!("number '{}' does not fit in 64 bits", token.text),
                        token,
                    )
                })?;
                self.pos += 1;
                Ok((value, token))
            }
            _ => Err(self.expected("a number")),
        }
    }

    /// A number that must fit in `T`.
    pub fn expect_number_as<T: TryFrom<u64>>(&mut self, what: &str) -> Result<T, CompileError> {
        let (value, token) = self.expect_number()?;
        T::try_from(value).map_err(|_| {
            CompileError::new(
                CompileErrorKind::Overflow,
                format!("{} {} is out of range", what, value),
                token,
            )
        })
    }

    /// `word =`.
    pub fn expect_key(&mut self, word: &str) -> Result<&'t Token<'src>, CompileError> {
        let token = self.expect_word(word)?;
        self.expect(TokenKind::Assign)?;
        Ok(token)
    }

    /// Skip to the end of the current statement: past the next `;`, or up to
    /// (not past) a scope-closing keyword.
    pub fn recover(&mut self) {
        while let Some(token) = self.peek() {
            if token.kind == TokenKind::Ident && END_KEYWORDS.contains(&token.text) {
                return;
            }
            self.pos += 1;
            if token.kind == TokenKind::Semi {
                return;
            }
        }
    }

    /// Skip past the next `word ;` (or to the end of input).
    pub fn skip_past_word(&mut self, word: &str) {
        while let Some(token) = self.next() {
            if token.is_word(word) {
                self.eat(TokenKind::Semi);
                return;
            }
        }
    }

    /// `{0x12345678, 0x1234, 0x1234, {0x12, ... x8}}` or the flat form with
    /// the last eight bytes inline.
    pub fn expect_guid(&mut self) -> Result<Uuid, CompileError> {
        self.expect(TokenKind::LBrace)?;
        let d1: u32 = self.expect_number_as("GUID field")?;
        self.expect(TokenKind::Comma)?;
        let d2: u16 = self.expect_number_as("GUID field")?;
        self.expect(TokenKind::Comma)?;
        let d3: u16 = self.expect_number_as("GUID field")?;
        self.expect(TokenKind::Comma)?;
        let nested = self.eat(TokenKind::LBrace);
        let mut d4 = [0u8; 8];
        for (i, byte) in d4.iter_mut().enumerate() {
            if i > 0 {
                self.expect(TokenKind::Comma)?;
            }
            *byte = self.expect_number_as("GUID byte")?;
        }
        if nested {
            self.expect(TokenKind::RBrace)?;
        }
        self.expect(TokenKind::RBrace)?;
        Ok(guid::from_parts(d1, d2, d3, d4))
    }

    /// `Store[0].Field.Array[2]`.
    pub fn expect_var_id(&mut self) -> Result<(VarIdPath, &'t Token<'src>), CompileError> {
        let first = self.expect_ident()?;
        let mut path = VarIdPath::new(first.text);
        path.store_index = self.index_suffix()?;
        while self.eat(TokenKind::Dot) {
            let name = self.expect_ident()?;
            let index = self.index_suffix()?;
            path.fields.push(PathSegment {
                name: name.text.to_string(),
                index,
            });
        }
        Ok((path, first))
    }

    fn index_suffix(&mut self) -> Result<Option<u32>, CompileError> {
        if !self.eat(TokenKind::LBracket) {
            return Ok(None);
        }
        let index = self.expect_number_as("array index")?;
        self.expect(TokenKind::RBracket)?;
        Ok(Some(index))
    }

    /// `A | B | 0x10`, the right-hand side of `flags =`.
    pub fn expect_flag_list(&mut self) -> Result<Vec<FlagItem<'t, 'src>>, CompileError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(token) if token.kind == TokenKind::Ident => {
                    self.pos += 1;
                    items.push(FlagItem::Name(token));
                }
                Some(token) if token.kind == TokenKind::Number => {
                    let (value, token) = self.expect_number()?;
                    items.push(FlagItem::Number(value, token));
                }
                _ => return Err(self.expected("a flag")),
            }
            if !self.eat(TokenKind::Pipe) {
                return Ok(items);
            }
        }
    }
}
