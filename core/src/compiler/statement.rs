//! Forms and the statements inside them.
//!
//! Every construct closed by an end keyword pushes a frame on a
//! [`ScopeStack`]; the closing keyword pops it and attaches the finished node
//! to the frame below. Conditionals follow the if-chain dialect rules: a
//! chain's first keyword decides whether openers share one `endif`.

use super::Compiler;
use super::cursor::{END_KEYWORDS, FlagItem};
use super::declarations::check_record_len;
use super::error::{CompileError, CompileErrorKind};
use super::expression::compile_expression;
use crate::ifr::flags::SubtitleFlags;
use crate::ifr::guid::{self, tiano};
use crate::ifr::{FormMapMethod, Op, OpcodeNode, StatementHeader};
use crate::lexer::{Token, TokenKind};
use crate::scope_stack::{Dialect, Frame, FrameKind, ScopeStack};
use crate::table::SymbolError;

/// Keywords that open a question.
pub(super) const QUESTION_KEYWORDS: &[&str] = &[
    "checkbox",
    "numeric",
    "oneof",
    "orderedlist",
    "string",
    "password",
    "date",
    "time",
    "action",
    "goto",
];

/// Items only valid inside a question body.
const QUESTION_ITEMS: &[&str] = &[
    "default",
    "value",
    "read",
    "write",
    "refresh",
    "option",
    "inconsistentif",
    "nosubmitif",
    "warningif",
];

impl<'t, 'src, 'r> Compiler<'t, 'src, 'r> {
    /// `form formid = N, title = S; ... endform;` or
    /// `formmap formid = N, (maptitle = S; mapguid = G;)* ... endform;`
    ///
    /// Returns `None` when the form was abandoned.
    pub(super) fn form(&mut self) -> Option<OpcodeNode> {
        let start = self.cursor.position();
        let node = match self.form_header() {
            Ok(node) => node,
            Err(err) => {
                self.ctx.report(err);
                self.cursor.reset(start);
                self.cursor.next();
                self.skip_form();
                return None;
            }
        };

        let form_id = match &node.op {
            Op::Form { form_id, .. } | Op::FormMap { form_id, .. } => *form_id,
            _ => return None,
        };
        tracing::debug!(form_id, line = node.line, "form opened");
        self.ctx.current_form = form_id;
        self.ctx.symbols.forms.push(form_id);

        let mut stack = ScopeStack::new(Frame::new(FrameKind::Form, node));
        match self.form_body(&mut stack) {
            Ok(node) => {
                tracing::debug!(form_id, "form closed");
                node
            }
            Err(err) => {
                tracing::debug!(form_id, kind = %err.kind, "abandoning form");
                self.ctx.report(err);
                self.skip_form();
                None
            }
        }
    }

    fn form_header(&mut self) -> Result<OpcodeNode, CompileError> {
        let Some(opener) = self.cursor.next() else {
            return Err(self.cursor.expected("'form'"));
        };
        let id_token = self.cursor.expect_key("formid")?;
        let form_id: u16 = self.cursor.expect_number_as("form id")?;
        if form_id == 0 || self.ctx.symbols.forms.contains(&form_id) {
            self.ctx.report(CompileError::new(
                CompileErrorKind::InvalidValue,
                format!("form id {} is zero or already used", form_id),
                id_token,
            ));
        }
        self.cursor.expect(TokenKind::Comma)?;

        if opener.is_word("form") {
            self.cursor.expect_key("title")?;
            let title = self.ctx.string_id(&mut self.cursor)?;
            self.cursor.expect(TokenKind::Semi)?;
            return Ok(OpcodeNode::scoped(Op::Form { form_id, title }, opener.line));
        }

        let mut methods = Vec::new();
        while self.cursor.at_key("maptitle") {
            self.cursor.expect_key("maptitle")?;
            let title = self.ctx.string_id(&mut self.cursor)?;
            self.cursor.expect(TokenKind::Semi)?;
            self.cursor.expect_key("mapguid")?;
            let method = self.cursor.expect_guid()?;
            self.cursor.expect(TokenKind::Semi)?;
            methods.push(FormMapMethod { title, method });
        }
        let op = Op::FormMap { form_id, methods };
        check_record_len(&op, opener)?;
        Ok(OpcodeNode::scoped(op, opener.line))
    }

    /// Skip past the current form's `endform;`, or up to `endformset`.
    fn skip_form(&mut self) {
        while let Some(token) = self.cursor.peek() {
            if token.is_word("endformset") {
                return;
            }
            self.cursor.next();
            if token.is_word("endform") {
                self.cursor.eat(TokenKind::Semi);
                return;
            }
        }
    }

    /// Statements up to the `endform` that empties `stack`. An error
    /// returned from here abandons the form.
    fn form_body(&mut self, stack: &mut ScopeStack) -> Result<Option<OpcodeNode>, CompileError> {
        loop {
            let Some(token) = self.cursor.peek() else {
                return Err(self
                    .cursor
                    .error(CompileErrorKind::Syntax, "missing 'endform'"));
            };
            let start = self.cursor.position();

            if token.kind == TokenKind::Ident && END_KEYWORDS.contains(&token.text) {
                if let Some(form) = self.close_scope(stack, token)? {
                    return Ok(form);
                }
                continue;
            }

            let result = match token.text {
                "suppressif" | "grayoutif" | "disableif" => self.conditional(stack),
                item if QUESTION_ITEMS.contains(&item) => {
                    if stack.question().is_none() {
                        Err(CompileError::syntax(
                            format!("'{}' is only valid inside a question", item),
                            token,
                        ))
                    } else {
                        self.question_item(stack)
                    }
                }
                _ if stack.question().is_some() => Err(CompileError::syntax(
                    format!(
                        "unexpected '{}' inside {}",
                        token.text,
                        stack.enclosing().map_or("question", |f| f.opening_keyword())
                    ),
                    token,
                )),
                "subtitle" => self.subtitle(stack),
                "text" => self.text(stack),
                "resetbutton" => self.reset_button(stack),
                "label" => self.label(stack),
                "locked" => self.locked(stack),
                "rule" => self.rule(stack),
                keyword if QUESTION_KEYWORDS.contains(&keyword) => {
                    self.question(stack);
                    Ok(())
                }
                other => Err(CompileError::syntax(
                    format!("unexpected '{}' in form", other),
                    token,
                )),
            };
            if let Err(err) = result {
                if err.kind.aborts_form() {
                    return Err(err);
                }
                self.recover_from(err, start);
            }
        }
    }

    /// Handle a closing keyword. Returns the form node once `endform` pops
    /// the last frame.
    fn close_scope(
        &mut self,
        stack: &mut ScopeStack,
        token: &'t Token<'src>,
    ) -> Result<Option<Option<OpcodeNode>>, CompileError> {
        let Some(top) = stack.top() else {
            return Err(CompileError::syntax("no open scope", token));
        };
        if top.closing_keyword() != token.text {
            return Err(CompileError::new(
                CompileErrorKind::ScopeMismatch,
                format!(
                    "'{}' found while '{}' from line {} is open",
                    token.text,
                    top.opening_keyword(),
                    top.line
                ),
                token,
            )
            .with_help(format!("expected '{}'", top.closing_keyword())));
        }
        self.cursor.next();
        self.cursor.eat(TokenKind::Semi);

        while let Some(frame) = stack.pop() {
            let shares_end = matches!(
                frame.kind,
                FrameKind::Conditional {
                    shares_end: true,
                    ..
                }
            );
            let node = self.finish_frame(frame);
            if stack.is_empty() {
                return Ok(Some(node));
            }
            if let Some(node) = node {
                stack.attach(node);
            }
            if !shares_end {
                break;
            }
        }
        Ok(None)
    }

    /// The node a popped frame contributes, `None` if it was poisoned.
    fn finish_frame(&mut self, frame: Frame) -> Option<OpcodeNode> {
        if frame.poisoned {
            tracing::trace!(line = frame.line, "dropping poisoned scope");
            return None;
        }
        match frame.kind {
            FrameKind::Question { info, .. } => match info.bits {
                Some(_) => {
                    let mut wrapper = OpcodeNode::scoped(
                        Op::Guid {
                            guid: guid::BIT_VARSTORE,
                            data: Vec::new(),
                        },
                        frame.line,
                    );
                    wrapper.push(frame.node);
                    Some(wrapper)
                }
                None => Some(frame.node),
            },
            _ => Some(frame.node),
        }
    }

    /// `suppressif | grayoutif | disableif e;` opening a conditional scope.
    fn conditional(&mut self, stack: &mut ScopeStack) -> Result<(), CompileError> {
        let Some(opener) = self.cursor.next() else {
            return Ok(());
        };
        let (keyword, op) = match opener.text {
            "suppressif" => ("suppressif", Op::SuppressIf),
            "grayoutif" => ("grayoutif", Op::GrayOutIf),
            _ => ("disableif", Op::DisableIf),
        };

        let chain = match stack.top() {
            Some(frame) if frame.is_bare() => match frame.kind {
                FrameKind::Conditional {
                    dialect,
                    chain_head,
                    chain_len,
                    ..
                } => Some((dialect, chain_head, chain_len)),
                _ => None,
            },
            _ => None,
        };
        let shared_endif = self.ctx.options.framework_compatible;
        let kind = match chain {
            None => {
                let dialect = if keyword == "disableif" {
                    Dialect::Uefi
                } else {
                    Dialect::Framework
                };
                tracing::trace!(%dialect, keyword, line = opener.line, "if chain opened");
                FrameKind::Conditional {
                    keyword,
                    dialect,
                    chain_head: keyword,
                    chain_len: 1,
                    shares_end: false,
                }
            }
            Some((Dialect::Uefi, chain_head, chain_len)) => FrameKind::Conditional {
                keyword,
                dialect: Dialect::Uefi,
                chain_head,
                chain_len: chain_len + 1,
                shares_end: false,
            },
            Some((Dialect::Framework, chain_head, _)) if keyword == "disableif" => {
                return Err(dialect_mix(
                    opener,
                    format!("'disableif' cannot follow '{}' in one if chain", chain_head),
                    "open the chain with 'disableif' or close it with 'endif' first",
                ));
            }
            Some((Dialect::Framework, chain_head, 1)) if shared_endif && keyword != chain_head => {
                FrameKind::Conditional {
                    keyword,
                    dialect: Dialect::Framework,
                    chain_head,
                    chain_len: 2,
                    shares_end: true,
                }
            }
            Some((Dialect::Framework, chain_head, _)) if shared_endif => {
                return Err(dialect_mix(
                    opener,
                    format!(
                        "'{}' cannot follow '{}' in a Framework-style if chain",
                        keyword, chain_head
                    ),
                    "close the chain with 'endif' before opening another condition",
                ));
            }
            Some((Dialect::Framework, chain_head, chain_len)) => FrameKind::Conditional {
                keyword,
                dialect: Dialect::Framework,
                chain_head,
                chain_len: chain_len + 1,
                shares_end: false,
            },
        };

        let mut node = OpcodeNode::scoped(op, opener.line);
        let condition = compile_expression(&mut self.cursor, &self.ctx)
            .and_then(|expr| self.cursor.expect(TokenKind::Semi).map(|_| expr));
        match condition {
            Ok(expr) => {
                node.children.extend(expr.into_nodes());
                stack.push(Frame::new(kind, node));
            }
            Err(err) => {
                self.ctx.report(err);
                self.cursor.recover();
                stack.push(Frame::new(kind, node).poisoned());
            }
        }
        Ok(())
    }

    /// `subtitle text = S [, flags = F] ;` or `subtitle text = S, ...
    /// endsubtitle;` with nested statements.
    fn subtitle(&mut self, stack: &mut ScopeStack) -> Result<(), CompileError> {
        let opener = self.cursor.expect_word("subtitle")?;
        self.cursor.expect_key("text")?;
        let prompt = self.ctx.string_id(&mut self.cursor)?;
        let mut flags = SubtitleFlags::empty();
        let mut scoped = false;
        while self.cursor.eat(TokenKind::Comma) {
            if self.cursor.at_key("flags") {
                self.cursor.expect_key("flags")?;
                for item in self.cursor.expect_flag_list()? {
                    flags |= match item {
                        FlagItem::Name(t) if t.text == "HORIZONTAL" => SubtitleFlags::HORIZONTAL,
                        FlagItem::Name(t) => {
                            return Err(CompileError::new(
                                CompileErrorKind::InvalidValue,
                                format!("'{}' is not a subtitle flag", t.text),
                                t,
                            ));
                        }
                        FlagItem::Number(v, t) => u8::try_from(v)
                            .map(SubtitleFlags::from_bits_retain)
                            .map_err(|_| {
                                CompileError::new(
                                    CompileErrorKind::Overflow,
                                    format!("subtitle flags {:#x} do not fit in 8 bits", v),
                                    t,
                                )
                            })?,
                    };
                }
            } else {
                scoped = true;
                break;
            }
        }
        if !scoped {
            self.cursor.expect(TokenKind::Semi)?;
        }

        let op = Op::Subtitle {
            statement: StatementHeader { prompt, help: 0 },
            flags,
        };
        if scoped {
            stack.push(Frame::new(
                FrameKind::Subtitle,
                OpcodeNode::scoped(op, opener.line),
            ));
        } else {
            stack.attach(OpcodeNode::leaf(op, opener.line));
        }
        Ok(())
    }

    /// `text help = S, text = S [, text = S] [, flags = F, key = N];`
    ///
    /// The short form `text = S;` is accepted too.
    fn text(&mut self, stack: &mut ScopeStack) -> Result<(), CompileError> {
        let opener = self.cursor.expect_word("text")?;
        let mut help = 0;
        let mut texts = Vec::new();
        if self.cursor.eat(TokenKind::Assign) {
            texts.push(self.ctx.string_id(&mut self.cursor)?);
            self.cursor.eat(TokenKind::Comma);
        }
        while !self.cursor.eat(TokenKind::Semi) {
            let key = self.cursor.expect_ident()?;
            self.cursor.expect(TokenKind::Assign)?;
            match key.text {
                "help" => help = self.ctx.string_id(&mut self.cursor)?,
                "text" => texts.push(self.ctx.string_id(&mut self.cursor)?),
                "flags" | "key" => {
                    if key.text == "flags" {
                        self.cursor.expect_flag_list()?;
                    } else {
                        self.cursor.expect_number()?;
                    }
                    self.ctx
                        .warn(format!("ignoring '{}' on a text statement", key.text), key);
                }
                other => {
                    return Err(CompileError::syntax(
                        format!("unknown text attribute '{}'", other),
                        key,
                    ));
                }
            }
            if !self.cursor.eat(TokenKind::Comma) && !self.cursor.at(TokenKind::Semi) {
                return Err(self.cursor.expected("',' or ';'"));
            }
        }

        let (prompt, text_two) = match texts.as_slice() {
            [prompt] => (*prompt, 0),
            [prompt, two] => (*prompt, *two),
            _ => {
                return Err(CompileError::syntax(
                    "text takes one or two 'text = ...' attributes",
                    opener,
                ));
            }
        };
        stack.attach(OpcodeNode::leaf(
            Op::Text {
                statement: StatementHeader { prompt, help },
                text_two,
            },
            opener.line,
        ));
        Ok(())
    }

    /// `resetbutton defaultstore = D, prompt = S, help = S, endresetbutton;`
    fn reset_button(&mut self, stack: &mut ScopeStack) -> Result<(), CompileError> {
        let opener = self.cursor.expect_word("resetbutton")?;
        self.cursor.expect_key("defaultstore")?;
        let store = self.cursor.expect_ident()?;
        let default_id = self
            .ctx
            .symbols
            .defaults
            .get(store.text)
            .map(|s| s.id)
            .ok_or_else(|| {
                let err = SymbolError::UnknownDefaultStore {
                    name: store.text.to_string(),
                };
                CompileError::symbol(err, store)
            })?;
        self.cursor.expect(TokenKind::Comma)?;
        self.cursor.expect_key("prompt")?;
        let prompt = self.ctx.string_id(&mut self.cursor)?;
        self.cursor.expect(TokenKind::Comma)?;
        self.cursor.expect_key("help")?;
        let help = self.ctx.string_id(&mut self.cursor)?;
        self.cursor.expect(TokenKind::Comma)?;
        self.cursor.expect_word("endresetbutton")?;
        self.cursor.expect(TokenKind::Semi)?;

        stack.attach(OpcodeNode::scoped(
            Op::ResetButton {
                statement: StatementHeader { prompt, help },
                default_id,
            },
            opener.line,
        ));
        Ok(())
    }

    /// `label N;`, a Tiano label extension record.
    fn label(&mut self, stack: &mut ScopeStack) -> Result<(), CompileError> {
        let opener = self.cursor.expect_word("label")?;
        let number: u16 = self.cursor.expect_number_as("label number")?;
        self.cursor.expect(TokenKind::Semi)?;
        let mut data = vec![tiano::LABEL];
        data.extend_from_slice(&number.to_le_bytes());
        stack.attach(OpcodeNode::leaf(
            Op::Guid {
                guid: guid::TIANO_EXTENSION,
                data,
            },
            opener.line,
        ));
        Ok(())
    }

    fn locked(&mut self, stack: &mut ScopeStack) -> Result<(), CompileError> {
        let opener = self.cursor.expect_word("locked")?;
        self.cursor.expect(TokenKind::Semi)?;
        stack.attach(OpcodeNode::leaf(Op::Locked, opener.line));
        Ok(())
    }

    /// `rule NAME, e endrule;`
    ///
    /// The rule is declared after its expression, so it cannot refer to
    /// itself.
    fn rule(&mut self, stack: &mut ScopeStack) -> Result<(), CompileError> {
        let opener = self.cursor.expect_word("rule")?;
        let name = self.cursor.expect_ident()?;
        self.cursor.expect(TokenKind::Comma)?;
        let expr = match compile_expression(&mut self.cursor, &self.ctx) {
            Ok(expr) => expr,
            Err(err) => {
                self.ctx.report(err);
                self.cursor.skip_past_word("endrule");
                return Ok(());
            }
        };
        self.cursor.expect_word("endrule")?;
        self.cursor.expect(TokenKind::Semi)?;

        let rule_id = self
            .ctx
            .symbols
            .rules
            .declare(name.text)
            .map_err(|err| CompileError::symbol(err, name))?;
        let mut node = OpcodeNode::scoped(Op::Rule { rule_id }, opener.line);
        node.children.extend(expr.into_nodes());
        stack.attach(node);
        Ok(())
    }
}

fn dialect_mix(at: &Token<'_>, message: String, help: &str) -> CompileError {
    CompileError::new(CompileErrorKind::DialectMix, message, at).with_help(help)
}
