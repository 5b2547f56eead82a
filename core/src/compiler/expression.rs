//! Operator-precedence compiler from infix VFR expressions to postfix IFR
//! opcodes.
//!
//! Levels, lowest to highest: `OR`, `AND`, `|`, `&`, equality, relational,
//! shift, additive, multiplicative, then prefix casts. Operands are emitted
//! before their operator, so the output runs directly on a stack machine.

use core::mem;

use uuid::Uuid;

use super::context::CompileContext;
use super::cursor::{Cursor, FlagItem};
use super::error::{CompileError, CompileErrorKind};
use crate::ifr::flags::{numeric, string_ops};
use crate::ifr::{DataType, Expression, Op, OpcodeNode};
use crate::lexer::{Token, TokenKind};
use crate::table::SymbolError;

const CAST_LEVEL: usize = 9;

/// Compile one expression starting at the cursor.
///
/// Stops at the first token that cannot continue the expression (`;`, `,`,
/// `)`, `endif`, ...). On error the cursor position is unspecified and no
/// opcodes are returned.
pub fn compile_expression(
    cursor: &mut Cursor<'_, '_>,
    ctx: &CompileContext<'_>,
) -> Result<Expression, CompileError> {
    let mut compiler = ExpressionCompiler {
        cursor,
        ctx,
        depth: 0,
        out: Vec::new(),
    };
    compiler.level(0)?;
    tracing::trace!(opcodes = compiler.out.len(), "compiled expression");
    Ok(Expression(compiler.out))
}

struct ExpressionCompiler<'a, 't, 'src, 'r> {
    cursor: &'a mut Cursor<'t, 'src>,
    ctx: &'a CompileContext<'r>,
    depth: usize,
    out: Vec<OpcodeNode>,
}

/// Binary operator at `level` spelled by `token`.
fn binary_op(level: usize, token: &Token<'_>) -> Option<Op> {
    use TokenKind::*;
    Some(match (level, token.kind) {
        (0, Ident) if token.text == "OR" => Op::Or,
        (1, Ident) if token.text == "AND" => Op::And,
        (2, Pipe) => Op::BitwiseOr,
        (3, Amp) => Op::BitwiseAnd,
        (4, EqEq) => Op::Equal,
        (4, NotEq) => Op::NotEqual,
        (5, Lt) => Op::LessThan,
        (5, Le) => Op::LessEqual,
        (5, Gt) => Op::GreaterThan,
        (5, Ge) => Op::GreaterEqual,
        (6, Shl) => Op::ShiftLeft,
        (6, Shr) => Op::ShiftRight,
        (7, Plus) => Op::Add,
        (7, Minus) => Op::Subtract,
        (8, Star) => Op::Multiply,
        (8, Slash) => Op::Divide,
        (8, Percent) => Op::Modulo,
        _ => return None,
    })
}

/// Comparison accepted by `ideqval`, `ideqid` and `ideqvallist`.
fn comparison_op(token: &Token<'_>) -> Option<Op> {
    binary_op(4, token).or_else(|| binary_op(5, token))
}

fn cast_op(name: &str) -> Option<Op> {
    match name {
        "BOOLEAN" => Some(Op::ToBoolean),
        "UINT8" | "UINT16" | "UINT32" | "UINT64" => Some(Op::ToUint),
        _ => None,
    }
}

/// Smallest unsigned constant opcode holding `value`.
pub fn uint_constant(value: u64) -> Op {
    if let Ok(v) = u8::try_from(value) {
        Op::Uint8(v)
    } else if let Ok(v) = u16::try_from(value) {
        Op::Uint16(v)
    } else if let Ok(v) = u32::try_from(value) {
        Op::Uint32(v)
    } else {
        Op::Uint64(value)
    }
}

impl<'a, 't, 'src, 'r> ExpressionCompiler<'a, 't, 'src, 'r> {
    fn emit(&mut self, op: Op, line: u32) {
        self.out.push(OpcodeNode::leaf(op, line));
    }

    fn enter(&mut self, at: &Token<'_>) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > self.ctx.options.max_expression_depth {
            return Err(CompileError::new(
                CompileErrorKind::Overflow,
                format!(
                    "expression nested deeper than {} levels",
                    self.ctx.options.max_expression_depth
                ),
                at,
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Compile a full sub-expression into a separate list.
    fn capture(&mut self) -> Result<Vec<OpcodeNode>, CompileError> {
        let saved = mem::take(&mut self.out);
        let result = self.level(0);
        let captured = mem::replace(&mut self.out, saved);
        result.map(|_| captured)
    }

    fn level(&mut self, level: usize) -> Result<(), CompileError> {
        if level == CAST_LEVEL {
            return self.cast();
        }
        self.level(level + 1)?;
        while let Some(token) = self.cursor.peek() {
            let Some(op) = binary_op(level, token) else {
                break;
            };
            self.cursor.next();
            self.level(level + 1)?;
            self.emit(op, token.line);
        }
        Ok(())
    }

    /// `(UINT8)(BOOLEAN) x` applies the innermost cast first.
    fn cast(&mut self) -> Result<(), CompileError> {
        let cast = match (
            self.cursor.peek(),
            self.cursor.peek_nth(1),
            self.cursor.peek_nth(2),
        ) {
            (Some(open), Some(name), Some(close))
                if open.kind == TokenKind::LParen
                    && name.kind == TokenKind::Ident
                    && close.kind == TokenKind::RParen =>
            {
                cast_op(name.text).map(|op| (op, name.line))
            }
            _ => None,
        };
        match cast {
            Some((op, line)) => {
                for _ in 0..3 {
                    self.cursor.next();
                }
                self.cast()?;
                self.emit(op, line);
                Ok(())
            }
            None => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<(), CompileError> {
        let Some(token) = self.cursor.peek() else {
            return Err(self.cursor.expected("an expression"));
        };
        match token.kind {
            TokenKind::Number => {
                let (value, token) = self.cursor.expect_number()?;
                self.emit(uint_constant(value), token.line);
                Ok(())
            }
            TokenKind::LParen => {
                self.cursor.next();
                self.enter(token)?;
                self.level(0)?;
                self.cursor.expect(TokenKind::RParen)?;
                self.leave();
                Ok(())
            }
            TokenKind::Tilde => {
                self.cursor.next();
                self.atom()?;
                self.emit(Op::BitwiseNot, token.line);
                Ok(())
            }
            TokenKind::Ident => {
                self.cursor.next();
                self.word(token)
            }
            _ => Err(self.cursor.expected("an expression")),
        }
    }

    fn word(&mut self, token: &'t Token<'src>) -> Result<(), CompileError> {
        let line = token.line;
        let constant = match token.text {
            "TRUE" => Some(Op::True),
            "FALSE" => Some(Op::False),
            "ONE" => Some(Op::One),
            "ONES" => Some(Op::Ones),
            "ZERO" => Some(Op::Zero),
            "UNDEFINED" => Some(Op::Undefined),
            "VERSION" => Some(Op::Version),
            "dup" => Some(Op::Dup),
            "pushthis" => Some(Op::This),
            _ => None,
        };
        if let Some(op) = constant {
            self.emit(op, line);
            return Ok(());
        }

        match token.text {
            "NOT" => {
                self.atom()?;
                self.emit(Op::Not, line);
                Ok(())
            }
            "length" => self.unary_call(token, Op::Length),
            "boolval" => self.unary_call(token, Op::ToBoolean),
            "unintval" => self.unary_call(token, Op::ToUint),
            "toupper" => self.unary_call(token, Op::ToUpper),
            "tolower" => self.unary_call(token, Op::ToLower),
            "stringrefval" => self.unary_call(token, Op::StringRef2),
            "stringval" => self.stringval(token),
            "questionrefval" => self.questionrefval(token),
            "cond" => self.cond(token),
            "find" => self.find(token),
            "mid" => self.call(token, 3, Op::Mid),
            "tok" => self.call(token, 3, Op::Token),
            "span" => self.span(token),
            "catenate" => self.call(token, 2, Op::Catenate),
            "match" => self.call(token, 2, Op::Match),
            "match2" => self.match2(token),
            "map" => self.map(token),
            "questionref" => self.questionref(token),
            "ruleref" => self.ruleref(token),
            "stringref" => self.stringref(token),
            "security" => self.security(token),
            "get" => self.get(token),
            "set" => self.set(token),
            "ideqval" => self.ideqval(token),
            "ideqid" => self.ideqid(token),
            "ideqvallist" => self.ideqvallist(token),
            other => Err(CompileError::syntax(
                format!("'{}' is not a valid expression term", other),
                token,
            )),
        }
    }

    /// `name(e, e, ...)` with `argc` expression arguments.
    fn call(&mut self, token: &Token<'_>, argc: usize, op: Op) -> Result<(), CompileError> {
        self.open_call(token)?;
        self.arguments(argc)?;
        self.close_call()?;
        self.emit(op, token.line);
        Ok(())
    }

    fn unary_call(&mut self, token: &Token<'_>, op: Op) -> Result<(), CompileError> {
        self.call(token, 1, op)
    }

    fn open_call(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.cursor.expect(TokenKind::LParen)?;
        self.enter(token)
    }

    fn close_call(&mut self) -> Result<(), CompileError> {
        self.cursor.expect(TokenKind::RParen)?;
        self.leave();
        Ok(())
    }

    fn arguments(&mut self, argc: usize) -> Result<(), CompileError> {
        for i in 0..argc {
            if i > 0 {
                self.cursor.expect(TokenKind::Comma)?;
            }
            self.level(0)?;
        }
        Ok(())
    }

    /// `stringval([format = N,] e)`
    fn stringval(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        let mut format = 0u8;
        if self.cursor.at_key("format") {
            self.cursor.expect_key("format")?;
            format = self.cursor.expect_number_as("format")?;
            self.cursor.expect(TokenKind::Comma)?;
        }
        self.level(0)?;
        self.close_call()?;
        self.emit(Op::ToString { format }, token.line);
        Ok(())
    }

    /// `questionrefval([devicepath = S,] [guid = G,] e)`
    fn questionrefval(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        let mut device_path = None;
        let mut guid = None;
        if self.cursor.at_key("devicepath") {
            self.cursor.expect_key("devicepath")?;
            device_path = Some(self.ctx.string_id(self.cursor)?);
            self.cursor.expect(TokenKind::Comma)?;
        }
        if self.cursor.at_key("guid") {
            self.cursor.expect_key("guid")?;
            guid = Some(self.cursor.expect_guid()?);
            self.cursor.expect(TokenKind::Comma)?;
        }
        self.level(0)?;
        self.close_call()?;
        self.emit(Op::QuestionRef3 { device_path, guid }, token.line);
        Ok(())
    }

    /// `cond(e ? e : e)`
    fn cond(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        self.level(0)?;
        self.cursor.expect(TokenKind::Question)?;
        self.level(0)?;
        self.cursor.expect(TokenKind::Colon)?;
        self.level(0)?;
        self.close_call()?;
        self.emit(Op::Conditional, token.line);
        Ok(())
    }

    /// `find(SENSITIVE | INSENSITIVE, e, e, e)`
    fn find(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        let mut format = string_ops::FIND_SENSITIVE;
        for item in self.cursor.expect_flag_list()? {
            format |= match item {
                FlagItem::Name(t) if t.text == "SENSITIVE" => string_ops::FIND_SENSITIVE,
                FlagItem::Name(t) if t.text == "INSENSITIVE" => string_ops::FIND_INSENSITIVE,
                FlagItem::Name(t) => return Err(invalid_flag(t)),
                FlagItem::Number(value, t) => u8::try_from(value).map_err(|_| invalid_flag(t))?,
            };
        }
        self.cursor.expect(TokenKind::Comma)?;
        self.arguments(3)?;
        self.close_call()?;
        self.emit(Op::Find { format }, token.line);
        Ok(())
    }

    /// `span(flags = F [| F], e, e, e)`
    fn span(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        self.cursor.expect_key("flags")?;
        let mut flags = 0u8;
        for item in self.cursor.expect_flag_list()? {
            flags |= match item {
                FlagItem::Name(t) if t.text == "LAST_NON_MATCH" => {
                    string_ops::SPAN_LAST_NON_MATCH
                }
                FlagItem::Name(t) if t.text == "FIRST_NON_MATCH" => {
                    string_ops::SPAN_FIRST_NON_MATCH
                }
                FlagItem::Name(t) => return Err(invalid_flag(t)),
                FlagItem::Number(value, t) => u8::try_from(value).map_err(|_| invalid_flag(t))?,
            };
        }
        self.cursor.expect(TokenKind::Comma)?;
        self.arguments(3)?;
        self.close_call()?;
        self.emit(Op::Span { flags }, token.line);
        Ok(())
    }

    /// `match2(e, e, GUID)`
    fn match2(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        self.arguments(2)?;
        self.cursor.expect(TokenKind::Comma)?;
        let syntax = self.cursor.expect_guid()?;
        self.close_call()?;
        self.emit(Op::Match2 { syntax }, token.line);
        Ok(())
    }

    /// `map(e : k, v; k, v; ...)`
    fn map(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        self.level(0)?;
        self.cursor.expect(TokenKind::Colon)?;
        let mut node = OpcodeNode::scoped(Op::Map, token.line);
        while !self.cursor.at(TokenKind::RParen) {
            let key = self.capture()?;
            self.cursor.expect(TokenKind::Comma)?;
            let value = self.capture()?;
            self.cursor.expect(TokenKind::Semi)?;
            node.children.extend(key);
            node.children.extend(value);
        }
        self.close_call()?;
        self.out.push(node);
        Ok(())
    }

    /// Question named by identifier or varid text.
    fn question_id(&mut self) -> Result<(u16, &'t Token<'src>), CompileError> {
        let (path, at) = self.cursor.expect_var_id()?;
        let name = path.to_string();
        match self.ctx.symbols.questions.find(&name) {
            Some(question) => Ok((question.id, at)),
            None => Err(CompileError::symbol(
                SymbolError::UnknownQuestion { name },
                at,
            )),
        }
    }

    /// `questionref(Q)`
    fn questionref(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        let (question_id, _) = self.question_id()?;
        self.close_call()?;
        self.emit(Op::QuestionRef1 { question_id }, token.line);
        Ok(())
    }

    /// `ruleref(R)`
    fn ruleref(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        let name = self.cursor.expect_ident()?;
        let rule_id = self.ctx.symbols.rules.get(name.text).ok_or_else(|| {
            CompileError::symbol(
                SymbolError::UnknownRule {
                    name: name.text.to_string(),
                },
                name,
            )
        })?;
        self.close_call()?;
        self.emit(Op::RuleRef { rule_id }, token.line);
        Ok(())
    }

    /// `stringref(S)`
    fn stringref(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        let string_id = self.ctx.string_id(self.cursor)?;
        self.close_call()?;
        self.emit(Op::StringRef1 { string_id }, token.line);
        Ok(())
    }

    /// `security(GUID)`
    fn security(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        let permissions: Uuid = self.cursor.expect_guid()?;
        self.close_call()?;
        self.emit(Op::Security { permissions }, token.line);
        Ok(())
    }

    /// `varid [| flags = NUMERIC_SIZE_n]` shared by `get` and `set`.
    fn storage_operand(&mut self) -> Result<(crate::table::VarStoreInfo, DataType), CompileError> {
        let (path, at) = self.cursor.expect_var_id()?;
        let var = self
            .ctx
            .symbols
            .resolve_var_id(&path)
            .map_err(|err| CompileError::symbol(err, at))?;
        let mut data_type = var.data_type();
        if self.cursor.eat(TokenKind::Pipe) {
            self.cursor.expect_key("flags")?;
            for item in self.cursor.expect_flag_list()? {
                let width = match item {
                    FlagItem::Name(t) => size_flag_width(t.text).ok_or_else(|| invalid_flag(t))?,
                    FlagItem::Number(_, t) => return Err(invalid_flag(t)),
                };
                if var.width().is_some_and(|w| w != width as u32) && var.bits().is_none() {
                    return Err(CompileError::new(
                        CompileErrorKind::InvalidValue,
                        format!(
                            "NUMERIC_SIZE_{} does not match the {}-byte storage of '{}'",
                            width,
                            var.width().unwrap_or(0),
                            path
                        ),
                        at,
                    ));
                }
                data_type = DataType::uint_for_width(width).unwrap_or(DataType::Uint8);
            }
        }
        Ok((var, data_type))
    }

    /// `get(varid [| flags = NUMERIC_SIZE_n])`
    fn get(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        let (var, data_type) = self.storage_operand()?;
        self.close_call()?;
        self.emit(Op::Get { var, data_type }, token.line);
        Ok(())
    }

    /// `set(varid [| flags = NUMERIC_SIZE_n], e)`
    fn set(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        self.open_call(token)?;
        let (var, data_type) = self.storage_operand()?;
        self.cursor.expect(TokenKind::Comma)?;
        self.level(0)?;
        self.close_call()?;
        self.emit(Op::Set { var, data_type }, token.line);
        Ok(())
    }

    fn comparison(&mut self) -> Result<(Op, &'t Token<'src>), CompileError> {
        match self.cursor.peek() {
            Some(token) => match comparison_op(token) {
                Some(op) => {
                    self.cursor.next();
                    Ok((op, token))
                }
                None => Err(self.cursor.expected("a comparison operator")),
            },
            None => Err(self.cursor.expected("a comparison operator")),
        }
    }

    /// `ideqval Q OP N` → `QuestionRef1(Q), UintN(N), OP`.
    fn ideqval(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        let (question_id, _) = self.question_id()?;
        let (op, _) = self.comparison()?;
        let (value, _) = self.cursor.expect_number()?;
        self.emit(Op::QuestionRef1 { question_id }, token.line);
        self.emit(uint_constant(value), token.line);
        self.emit(op, token.line);
        Ok(())
    }

    /// `ideqid Q1 OP Q2` → `QuestionRef1(Q1), QuestionRef1(Q2), OP`.
    fn ideqid(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        let (left, _) = self.question_id()?;
        let (op, _) = self.comparison()?;
        let (right, _) = self.question_id()?;
        self.emit(Op::QuestionRef1 { question_id: left }, token.line);
        self.emit(Op::QuestionRef1 { question_id: right }, token.line);
        self.emit(op, token.line);
        Ok(())
    }

    /// `ideqvallist Q == N1 N2 ...` → one equality per value joined by `Or`.
    fn ideqvallist(&mut self, token: &Token<'_>) -> Result<(), CompileError> {
        let (question_id, _) = self.question_id()?;
        self.cursor.expect(TokenKind::EqEq)?;
        let mut count = 0;
        while self.cursor.at(TokenKind::Number) {
            let (value, _) = self.cursor.expect_number()?;
            self.emit(Op::QuestionRef1 { question_id }, token.line);
            self.emit(uint_constant(value), token.line);
            self.emit(Op::Equal, token.line);
            if count > 0 {
                self.emit(Op::Or, token.line);
            }
            count += 1;
        }
        if count == 0 {
            return Err(self.cursor.expected("a number"));
        }
        Ok(())
    }
}

/// Width selected by a `NUMERIC_SIZE_n` flag name.
pub fn size_flag_width(name: &str) -> Option<u8> {
    let flag = match name {
        "NUMERIC_SIZE_1" => numeric::SIZE_1,
        "NUMERIC_SIZE_2" => numeric::SIZE_2,
        "NUMERIC_SIZE_4" => numeric::SIZE_4,
        "NUMERIC_SIZE_8" => numeric::SIZE_8,
        _ => return None,
    };
    Some(numeric::width_of(flag))
}

fn invalid_flag(token: &Token<'_>) -> CompileError {
    CompileError::new(
        CompileErrorKind::InvalidValue,
        format!("'{}' is not a valid flag here", token.text),
        token,
    )
}
