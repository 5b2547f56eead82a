//! Questions: header attributes, kind-specific flags and the items of a
//! question body (defaults, options, value/read/write expressions and
//! validation conditionals).

use uuid::Uuid;

use super::Compiler;
use super::cursor::FlagItem;
use super::error::{CompileError, CompileErrorKind};
use super::expression::{compile_expression, size_flag_width};
use crate::ifr::flags::{
    CheckboxFlags, DateTimeFlags, OptionFlags, OrderedListFlags, QuestionFlags, StringFlags,
    numeric, numeric_bit,
};
use crate::ifr::{
    DataType, HiiDate, HiiTime, NumericRange, Op, OpCode, OpcodeNode, QuestionHeader, RefTarget,
    StatementHeader, TypedValue,
};
use crate::lexer::{Token, TokenKind};
use crate::scope_stack::{Frame, FrameKind, QuestionInfo, ScopeStack};
use crate::table::{BitSlice, Question, SymbolError, VarIdPath, VarStoreInfo};

/// Opcode and closing keyword of each question keyword.
fn question_kind(keyword: &str) -> Option<(OpCode, &'static str)> {
    Some(match keyword {
        "checkbox" => (OpCode::CheckBox, "endcheckbox"),
        "numeric" => (OpCode::Numeric, "endnumeric"),
        "oneof" => (OpCode::OneOf, "endoneof"),
        "orderedlist" => (OpCode::OrderedList, "endlist"),
        "string" => (OpCode::String, "endstring"),
        "password" => (OpCode::Password, "endpassword"),
        "date" => (OpCode::Date, "enddate"),
        "time" => (OpCode::Time, "endtime"),
        "action" => (OpCode::Action, "endaction"),
        "goto" => (OpCode::Ref, ";"),
        _ => return None,
    })
}

const HEADER_KEYS: &[&str] = &[
    "name",
    "varid",
    "questionid",
    "key",
    "prompt",
    "help",
    "flags",
    "minimum",
    "maximum",
    "step",
    "minsize",
    "maxsize",
    "maxcontainers",
    "config",
    "formid",
    "question",
    "formsetguid",
    "devicepath",
];

/// Whether `key` is a header attribute of questions of kind `opcode`.
fn accepts(opcode: OpCode, key: &str) -> bool {
    match key {
        "name" | "varid" | "questionid" | "key" | "prompt" | "help" | "flags" => true,
        "minimum" | "maximum" | "step" => matches!(opcode, OpCode::Numeric | OpCode::OneOf),
        "minsize" | "maxsize" => matches!(opcode, OpCode::String | OpCode::Password),
        "maxcontainers" => opcode == OpCode::OrderedList,
        "config" => opcode == OpCode::Action,
        "formid" | "question" | "formsetguid" | "devicepath" => opcode == OpCode::Ref,
        _ => false,
    }
}

/// Bits of a kind-specific flag name.
fn kind_flag(opcode: OpCode, name: &str) -> Option<u8> {
    use OpCode::*;
    Some(match (opcode, name) {
        (CheckBox, "CHECKBOX_DEFAULT") => CheckboxFlags::DEFAULT.bits(),
        (CheckBox, "CHECKBOX_DEFAULT_MFG") => CheckboxFlags::DEFAULT_MFG.bits(),
        (Numeric | OneOf, "NUMERIC_SIZE_1") => numeric::SIZE_1,
        (Numeric | OneOf, "NUMERIC_SIZE_2") => numeric::SIZE_2,
        (Numeric | OneOf, "NUMERIC_SIZE_4") => numeric::SIZE_4,
        (Numeric | OneOf, "NUMERIC_SIZE_8") => numeric::SIZE_8,
        (Numeric | OneOf, "DISPLAY_INT_DEC") => numeric::DISPLAY_INT_DEC,
        (Numeric | OneOf, "DISPLAY_UINT_DEC") => numeric::DISPLAY_UINT_DEC,
        (Numeric | OneOf, "DISPLAY_UINT_HEX") => numeric::DISPLAY_UINT_HEX,
        (String, "MULTI_LINE") => StringFlags::MULTI_LINE.bits(),
        (OrderedList, "UNIQUE") => OrderedListFlags::UNIQUE_SET.bits(),
        (OrderedList, "NOEMPTY") => OrderedListFlags::NO_EMPTY_SET.bits(),
        (Date, "YEAR_SUPPRESS") | (Time, "HOUR_SUPPRESS") => DateTimeFlags::SUPPRESS_FIRST.bits(),
        (Date, "MONTH_SUPPRESS") | (Time, "MINUTE_SUPPRESS") => {
            DateTimeFlags::SUPPRESS_SECOND.bits()
        }
        (Date, "DAY_SUPPRESS") | (Time, "SECOND_SUPPRESS") => DateTimeFlags::SUPPRESS_THIRD.bits(),
        (Date | Time, "STORAGE_NORMAL") => 0,
        (Date | Time, "STORAGE_TIME") => DateTimeFlags::STORAGE_TIME.bits(),
        (Date | Time, "STORAGE_WAKEUP") => DateTimeFlags::STORAGE_WAKEUP.bits(),
        _ => return None,
    })
}

fn question_flag(name: &str) -> Option<QuestionFlags> {
    Some(match name {
        "READ_ONLY" => QuestionFlags::READ_ONLY,
        "INTERACTIVE" | "CALLBACK" => QuestionFlags::CALLBACK,
        "RESET_REQUIRED" => QuestionFlags::RESET_REQUIRED,
        "REST_STYLE" => QuestionFlags::REST_STYLE,
        "RECONNECT_REQUIRED" => QuestionFlags::RECONNECT_REQUIRED,
        "OPTIONS_ONLY" => QuestionFlags::OPTIONS_ONLY,
        // Accepted for compatibility; they have no IFR encoding.
        "NV_ACCESS" | "LATE_CHECK" => QuestionFlags::empty(),
        _ => return None,
    })
}

/// Attributes collected from a question header.
#[derive(Default)]
struct HeaderAttributes<'t, 'src> {
    name: Option<&'t Token<'src>>,
    var_id: Option<(VarIdPath, &'t Token<'src>)>,
    question_id: Option<u16>,
    prompt: Option<u16>,
    help: Option<u16>,
    flags: Vec<FlagItem<'t, 'src>>,
    minimum: Option<u64>,
    maximum: Option<u64>,
    step: Option<u64>,
    min_size: Option<u64>,
    max_size: Option<u64>,
    max_containers: Option<u64>,
    config: Option<u16>,
    form_id: Option<u16>,
    target_question: Option<u16>,
    formset: Option<Uuid>,
    device_path: Option<u16>,
}

/// Question and kind-specific flag bits.
struct ParsedFlags {
    question: QuestionFlags,
    kind: u8,
    /// Width selected by `NUMERIC_SIZE_n`.
    size_width: Option<u8>,
}

fn bit_limit(bits: BitSlice) -> u64 {
    if bits.width >= 64 {
        u64::MAX
    } else {
        (1u64 << bits.width) - 1
    }
}

impl<'t, 'src, 'r> Compiler<'t, 'src, 'r> {
    /// A question statement. Header errors are reported here and skip the
    /// whole question.
    pub(super) fn question(&mut self, stack: &mut ScopeStack) {
        let Some(opener) = self.cursor.next() else {
            return;
        };
        let Some((opcode, end)) = question_kind(opener.text) else {
            return;
        };

        match self.question_header(opener, opcode) {
            Ok((node, _)) if opcode == OpCode::Ref => stack.attach(node),
            Ok((node, info)) => stack.push(Frame::new(FrameKind::Question { end, info }, node)),
            Err(err) => {
                self.ctx.report(err);
                if opcode == OpCode::Ref {
                    self.cursor.recover();
                } else {
                    self.cursor.skip_past_word(end);
                }
            }
        }
    }

    fn question_header(
        &mut self,
        opener: &'t Token<'src>,
        opcode: OpCode,
    ) -> Result<(OpcodeNode, QuestionInfo), CompileError> {
        let attrs = self.header_attributes(opcode)?;
        let missing = |what: &str| {
            CompileError::syntax(
                format!("{} requires '{} = ...'", opener.text, what),
                opener,
            )
        };
        let prompt = attrs.prompt.ok_or_else(|| missing("prompt"))?;
        let help = attrs.help.ok_or_else(|| missing("help"))?;

        let var = match &attrs.var_id {
            Some((path, at)) => Some(
                self.ctx
                    .symbols
                    .resolve_var_id(path)
                    .map_err(|err| CompileError::symbol(err, at))?,
            ),
            None => None,
        };
        let name = attrs.name.map(|t| t.text);
        let question_id = self
            .ctx
            .symbols
            .questions
            .reserve(name, attrs.question_id)
            .map_err(|err| CompileError::symbol(err, attrs.name.unwrap_or(opener)))?;
        let flags = self.parse_flags(opcode, &attrs.flags)?;

        let header = QuestionHeader {
            statement: StatementHeader { prompt, help },
            question_id,
            var: var.clone(),
            flags: flags.question,
        };
        let bits = var.as_ref().and_then(VarStoreInfo::bits);
        let mut element_type = DataType::Uint8;
        let (op, value_type) = match opcode {
            OpCode::CheckBox => {
                if bits.is_none() && var.as_ref().and_then(|v| v.width()).is_some_and(|w| w != 1)
                {
                    return Err(CompileError::new(
                        CompileErrorKind::InvalidValue,
                        "checkbox storage must be one byte wide",
                        opener,
                    ));
                }
                let op = Op::CheckBox {
                    question: header,
                    flags: CheckboxFlags::from_bits_retain(flags.kind),
                };
                (op, DataType::Boolean)
            }
            OpCode::Numeric | OpCode::OneOf => {
                self.numeric_question(opener, opcode, header, &attrs, &flags)?
            }
            OpCode::String | OpCode::Password => {
                let max = attrs
                    .max_size
                    .or_else(|| var.as_ref().and_then(|v| v.width()).map(|w| u64::from(w / 2)))
                    .ok_or_else(|| missing("maxsize"))?;
                let min = attrs.min_size.unwrap_or(0);
                if min > max {
                    return Err(CompileError::new(
                        CompileErrorKind::InvalidValue,
                        format!("minsize {} exceeds maxsize {}", min, max),
                        opener,
                    ));
                }
                let op = if opcode == OpCode::String {
                    Op::String {
                        question: header,
                        min_size: size_in(min, opener)?,
                        max_size: size_in(max, opener)?,
                        flags: StringFlags::from_bits_retain(flags.kind),
                    }
                } else {
                    Op::Password {
                        question: header,
                        min_size: size_in(min, opener)?,
                        max_size: size_in(max, opener)?,
                    }
                };
                (op, DataType::String)
            }
            OpCode::OrderedList => {
                let count = attrs
                    .max_containers
                    .or_else(|| var.as_ref().and_then(|v| v.array_len()).map(u64::from))
                    .ok_or_else(|| missing("maxcontainers"))?;
                element_type = match var.as_ref() {
                    Some(v) => match (v.scalar(), v.width(), v.array_len()) {
                        (Some(scalar), _, _) => scalar.data_type(),
                        (None, Some(width), Some(len)) if len > 0 => {
                            let element = u8::try_from(width / len).map_err(|_| {
                                CompileError::new(
                                    CompileErrorKind::Overflow,
                                    format!(
                                        "{}-byte elements are too wide for an ordered list",
                                        width / len
                                    ),
                                    opener,
                                )
                            })?;
                            DataType::uint_for_width(element).unwrap_or(DataType::Uint8)
                        }
                        _ => DataType::Uint8,
                    },
                    None => DataType::Uint8,
                };
                let op = Op::OrderedList {
                    question: header,
                    max_containers: size_in(count, opener)?,
                    flags: OrderedListFlags::from_bits_retain(flags.kind),
                };
                (op, DataType::Buffer)
            }
            OpCode::Date => {
                let op = Op::Date {
                    question: header,
                    flags: DateTimeFlags::from_bits_retain(flags.kind),
                };
                (op, DataType::Date)
            }
            OpCode::Time => {
                let op = Op::Time {
                    question: header,
                    flags: DateTimeFlags::from_bits_retain(flags.kind),
                };
                (op, DataType::Time)
            }
            OpCode::Action => {
                let op = Op::Action {
                    question: header,
                    config: attrs.config,
                };
                (op, DataType::Action)
            }
            _ => {
                let form_id = attrs.form_id.ok_or_else(|| missing("formid"))?;
                let question = attrs.target_question.unwrap_or(0);
                let target = match (attrs.device_path, attrs.formset, attrs.target_question) {
                    (Some(device_path), formset, _) => RefTarget::DevicePath {
                        form_id,
                        question_id: question,
                        formset: formset.unwrap_or(Uuid::nil()),
                        device_path,
                    },
                    (None, Some(formset), _) => RefTarget::FormSet {
                        form_id,
                        question_id: question,
                        formset,
                    },
                    (None, None, Some(question_id)) => RefTarget::Question {
                        form_id,
                        question_id,
                    },
                    (None, None, None) => RefTarget::Form { form_id },
                };
                self.cursor.expect(TokenKind::Semi)?;
                (
                    Op::Ref {
                        question: header,
                        target,
                    },
                    DataType::Ref,
                )
            }
        };

        self.ctx.symbols.questions.insert(Question {
            id: question_id,
            name: name.map(str::to_string),
            var_id: attrs.var_id.as_ref().map(|(path, _)| path.to_string()),
            var,
            kind: opcode,
            form_id: self.ctx.current_form,
        });

        let node = if opcode == OpCode::Ref {
            OpcodeNode::leaf(op, opener.line)
        } else {
            OpcodeNode::scoped(op, opener.line)
        };
        let info = QuestionInfo {
            kind: opcode,
            question_id,
            value_type,
            element_type,
            bits,
        };
        Ok((node, info))
    }

    /// `key = value,` pairs up to the first item of the question body.
    fn header_attributes(
        &mut self,
        opcode: OpCode,
    ) -> Result<HeaderAttributes<'t, 'src>, CompileError> {
        let mut attrs = HeaderAttributes::default();
        if opcode == OpCode::Ref && self.cursor.at(TokenKind::Number) {
            attrs.form_id = Some(self.cursor.expect_number_as("form id")?);
            self.cursor.expect(TokenKind::Comma)?;
        }

        while let Some(key) = self.cursor.peek() {
            if key.kind != TokenKind::Ident
                || !HEADER_KEYS.contains(&key.text)
                || !self.cursor.at_key(key.text)
            {
                break;
            }
            if !accepts(opcode, key.text) {
                return Err(CompileError::syntax(
                    format!("'{}' is not an attribute of this question", key.text),
                    key,
                ));
            }
            self.cursor.next();
            self.cursor.expect(TokenKind::Assign)?;
            match key.text {
                "name" => attrs.name = Some(self.cursor.expect_ident()?),
                "varid" => attrs.var_id = Some(self.cursor.expect_var_id()?),
                "questionid" | "key" => {
                    attrs.question_id = Some(self.cursor.expect_number_as("question id")?)
                }
                "prompt" => attrs.prompt = Some(self.ctx.string_id(&mut self.cursor)?),
                "help" => attrs.help = Some(self.ctx.string_id(&mut self.cursor)?),
                "flags" => attrs.flags.extend(self.cursor.expect_flag_list()?),
                "minimum" => attrs.minimum = Some(self.cursor.expect_number()?.0),
                "maximum" => attrs.maximum = Some(self.cursor.expect_number()?.0),
                "step" => attrs.step = Some(self.cursor.expect_number()?.0),
                "minsize" => attrs.min_size = Some(self.cursor.expect_number()?.0),
                "maxsize" => attrs.max_size = Some(self.cursor.expect_number()?.0),
                "maxcontainers" => attrs.max_containers = Some(self.cursor.expect_number()?.0),
                "config" => attrs.config = Some(self.ctx.string_id(&mut self.cursor)?),
                "formid" => attrs.form_id = Some(self.cursor.expect_number_as("form id")?),
                "question" => attrs.target_question = Some(self.target_question()?),
                "formsetguid" => attrs.formset = Some(self.cursor.expect_guid()?),
                _ => attrs.device_path = Some(self.ctx.string_id(&mut self.cursor)?),
            }
            if !self.cursor.eat(TokenKind::Comma) {
                if opcode == OpCode::Ref && self.cursor.at(TokenKind::Semi) {
                    break;
                }
                return Err(self.cursor.expected("','"));
            }
        }
        Ok(attrs)
    }

    /// `question = N` or `question = NAME` of a `goto`.
    fn target_question(&mut self) -> Result<u16, CompileError> {
        if self.cursor.at(TokenKind::Number) {
            return self.cursor.expect_number_as("question id");
        }
        let (path, at) = self.cursor.expect_var_id()?;
        let name = path.to_string();
        match self.ctx.symbols.questions.find(&name) {
            Some(question) => Ok(question.id),
            None => Err(CompileError::symbol(SymbolError::UnknownQuestion { name }, at)),
        }
    }

    fn parse_flags(
        &mut self,
        opcode: OpCode,
        items: &[FlagItem<'t, 'src>],
    ) -> Result<ParsedFlags, CompileError> {
        let mut parsed = ParsedFlags {
            question: QuestionFlags::empty(),
            kind: 0,
            size_width: None,
        };
        for item in items {
            match *item {
                FlagItem::Name(t) => {
                    if let Some(flag) = question_flag(t.text) {
                        parsed.question |= flag;
                    } else if let Some(bits) = kind_flag(opcode, t.text) {
                        parsed.kind |= bits;
                        if let Some(width) = size_flag_width(t.text) {
                            parsed.size_width = Some(width);
                        }
                    } else {
                        return Err(CompileError::new(
                            CompileErrorKind::InvalidValue,
                            format!("'{}' is not a valid flag here", t.text),
                            t,
                        ));
                    }
                }
                FlagItem::Number(value, t) => {
                    parsed.kind |= u8::try_from(value).map_err(|_| {
                        CompileError::new(
                            CompileErrorKind::Overflow,
                            format!("flags {:#x} do not fit in a byte", value),
                            t,
                        )
                    })?;
                }
            }
        }
        Ok(parsed)
    }

    /// Numeric and one-of records: width, flags and range.
    fn numeric_question(
        &mut self,
        opener: &'t Token<'src>,
        opcode: OpCode,
        header: QuestionHeader,
        attrs: &HeaderAttributes<'t, 'src>,
        flags: &ParsedFlags,
    ) -> Result<(Op, DataType), CompileError> {
        let var = header.var.clone();
        let (flag_bits, limit, value_type, width) = match var.as_ref().and_then(|v| v.bits()) {
            Some(bits) => {
                let flag_bits =
                    (bits.width as u8 & numeric_bit::SIZE_MASK) | numeric_bit::display_from(flags.kind);
                (flag_bits, bit_limit(bits), DataType::Uint32, 4)
            }
            None => {
                let storage = var.as_ref().and_then(|v| v.width());
                let width = match (storage, flags.size_width) {
                    (Some(storage), Some(size)) if storage != u32::from(size) => {
                        return Err(CompileError::new(
                            CompileErrorKind::InvalidValue,
                            format!(
                                "NUMERIC_SIZE_{} does not match the {}-byte storage",
                                size, storage
                            ),
                            opener,
                        ));
                    }
                    (Some(storage), _) => storage,
                    (None, Some(size)) => u32::from(size),
                    (None, None) if var.is_some() => 2,
                    (None, None) => 1,
                };
                let (byte_width, value_type) = u8::try_from(width)
                    .ok()
                    .and_then(|w| Some((w, DataType::uint_for_width(w)?)))
                    .ok_or_else(|| {
                        CompileError::new(
                            CompileErrorKind::InvalidValue,
                            format!("{}-byte storage cannot hold a numeric value", width),
                            opener,
                        )
                    })?;
                let size_bits = numeric::size_for_width(byte_width).unwrap_or(numeric::SIZE_1);
                let flag_bits = (flags.kind & !numeric::SIZE_MASK) | size_bits;
                (flag_bits, value_type.max_uint().unwrap_or(u64::MAX), value_type, byte_width)
            }
        };

        let maximum = match (attrs.maximum, opcode) {
            (Some(max), _) => max,
            (None, OpCode::OneOf) => limit,
            (None, _) => {
                return Err(CompileError::syntax(
                    format!("{} requires 'maximum = ...'", opener.text),
                    opener,
                ));
            }
        };
        let minimum = attrs.minimum.unwrap_or(0);
        let step = attrs.step.unwrap_or(0);
        if minimum > maximum {
            return Err(CompileError::new(
                CompileErrorKind::InvalidValue,
                format!("minimum {} exceeds maximum {}", minimum, maximum),
                opener,
            ));
        }
        let range = if maximum > limit || step > limit {
            None
        } else {
            NumericRange::for_width(width, minimum, maximum, step)
        };
        let range = range.ok_or_else(|| {
            CompileError::new(
                CompileErrorKind::Overflow,
                format!("range {}..={} does not fit the question storage", minimum, maximum),
                opener,
            )
        })?;

        let op = if opcode == OpCode::Numeric {
            Op::Numeric {
                question: header,
                flags: flag_bits,
                range,
            }
        } else {
            Op::OneOf {
                question: header,
                flags: flag_bits,
                range,
            }
        };
        Ok((op, value_type))
    }

    /// One item of a question body.
    pub(super) fn question_item(&mut self, stack: &mut ScopeStack) -> Result<(), CompileError> {
        let Some(info) = stack.question().cloned() else {
            return Ok(());
        };
        let Some(token) = self.cursor.peek() else {
            return Ok(());
        };
        match token.text {
            "default" => self.default_item(stack, &info),
            "value" => self.expression_item(stack, Op::Value, true),
            "read" => self.expression_item(stack, Op::Read, false),
            "write" => self.expression_item(stack, Op::Write, false),
            "refresh" => self.refresh(stack),
            "option" => self.option(stack, &info),
            _ => {
                let start = self.cursor.position();
                if let Err(err) = self.validation(stack) {
                    self.ctx.report(err);
                    self.cursor.reset(start);
                    self.cursor.next();
                    self.cursor.skip_past_word("endif");
                }
                Ok(())
            }
        }
    }

    /// `default = CONST [, defaultstore = D],` or
    /// `default value = EXPR [, defaultstore = D],`
    fn default_item(&mut self, stack: &mut ScopeStack, info: &QuestionInfo) -> Result<(), CompileError> {
        let opener = self.cursor.expect_word("default")?;
        let value = if self.cursor.eat(TokenKind::Assign) {
            Some(self.constant(info, info.value_type)?)
        } else {
            None
        };
        let expression = match value {
            Some(_) => None,
            None => {
                self.cursor.expect_key("value")?;
                Some(compile_expression(&mut self.cursor, &self.ctx)?)
            }
        };

        let mut default_id = crate::ifr::flags::default_id::STANDARD;
        while self.cursor.eat(TokenKind::Comma) {
            if !self.cursor.at_key("defaultstore") {
                break;
            }
            self.cursor.expect_key("defaultstore")?;
            let store = self.cursor.expect_ident()?;
            default_id = self
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
        }
        self.cursor.eat(TokenKind::Semi);

        let node = match expression {
            None => OpcodeNode::leaf(Op::Default { default_id, value }, opener.line),
            Some(expr) => {
                let mut value_node = OpcodeNode::scoped(Op::Value, opener.line);
                value_node.children.extend(expr.into_nodes());
                let mut node = OpcodeNode::scoped(
                    Op::Default {
                        default_id,
                        value: None,
                    },
                    opener.line,
                );
                node.push(value_node);
                node
            }
        };
        stack.attach(node);
        Ok(())
    }

    /// `value = e;`, `read e;` or `write e;`
    fn expression_item(
        &mut self,
        stack: &mut ScopeStack,
        op: Op,
        assigned: bool,
    ) -> Result<(), CompileError> {
        let Some(opener) = self.cursor.next() else {
            return Ok(());
        };
        if assigned {
            self.cursor.expect(TokenKind::Assign)?;
        }
        let expr = compile_expression(&mut self.cursor, &self.ctx)?;
        self.cursor.expect(TokenKind::Semi)?;
        let mut node = OpcodeNode::scoped(op, opener.line);
        node.children.extend(expr.into_nodes());
        stack.attach(node);
        Ok(())
    }

    /// `refresh interval = N`
    fn refresh(&mut self, stack: &mut ScopeStack) -> Result<(), CompileError> {
        let opener = self.cursor.expect_word("refresh")?;
        self.cursor.expect_key("interval")?;
        let interval = self.cursor.expect_number_as("refresh interval")?;
        if !self.cursor.eat(TokenKind::Comma) {
            self.cursor.eat(TokenKind::Semi);
        }
        stack.attach(OpcodeNode::leaf(Op::Refresh { interval }, opener.line));
        Ok(())
    }

    /// `option text = S, value = V [, flags = F] [, key = N];`
    fn option(&mut self, stack: &mut ScopeStack, info: &QuestionInfo) -> Result<(), CompileError> {
        let opener = self.cursor.expect_word("option")?;
        let value_type = match info.kind {
            OpCode::OneOf => info.value_type,
            OpCode::OrderedList => info.element_type,
            _ => {
                return Err(CompileError::new(
                    CompileErrorKind::InvalidValue,
                    "options are only valid in oneof and orderedlist questions",
                    opener,
                ));
            }
        };
        self.cursor.expect_key("text")?;
        let text = self.ctx.string_id(&mut self.cursor)?;
        self.cursor.expect(TokenKind::Comma)?;
        self.cursor.expect_key("value")?;
        let value = self.constant(info, value_type)?;

        let mut flags = OptionFlags::empty();
        while self.cursor.eat(TokenKind::Comma) {
            if self.cursor.at(TokenKind::Semi) {
                break;
            }
            let key = self.cursor.expect_ident()?;
            self.cursor.expect(TokenKind::Assign)?;
            match key.text {
                "flags" => flags |= self.option_flags()?,
                "key" => {
                    self.cursor.expect_number()?;
                    self.ctx.warn("ignoring 'key' on an option", key);
                }
                other => {
                    return Err(CompileError::syntax(
                        format!("unknown option attribute '{}'", other),
                        key,
                    ));
                }
            }
        }
        self.cursor.expect(TokenKind::Semi)?;
        stack.attach(OpcodeNode::leaf(
            Op::OneOfOption { text, flags, value },
            opener.line,
        ));
        Ok(())
    }

    fn option_flags(&mut self) -> Result<OptionFlags, CompileError> {
        let mut flags = OptionFlags::empty();
        for item in self.cursor.expect_flag_list()? {
            match item {
                FlagItem::Name(t) if t.text == "DEFAULT" => flags |= OptionFlags::DEFAULT,
                FlagItem::Name(t) if t.text == "MANUFACTURING" => {
                    flags |= OptionFlags::DEFAULT_MFG
                }
                FlagItem::Name(t) if question_flag(t.text).is_some() => {
                    self.ctx
                        .warn(format!("ignoring question flag '{}' on an option", t.text), t);
                }
                FlagItem::Name(t) => {
                    return Err(CompileError::new(
                        CompileErrorKind::InvalidValue,
                        format!("'{}' is not an option flag", t.text),
                        t,
                    ));
                }
                FlagItem::Number(value, t) => {
                    let bits = u8::try_from(value).map_err(|_| {
                        CompileError::new(
                            CompileErrorKind::Overflow,
                            format!("flags {:#x} do not fit in a byte", value),
                            t,
                        )
                    })?;
                    flags |= OptionFlags::from_bits_retain(bits);
                }
            }
        }
        Ok(flags)
    }

    /// `inconsistentif | nosubmitif prompt = S, [flags = F,] e endif [;]`
    /// or `warningif prompt = S, [timeout = N,] e endif [;]`
    fn validation(&mut self, stack: &mut ScopeStack) -> Result<(), CompileError> {
        let Some(opener) = self.cursor.next() else {
            return Ok(());
        };
        self.cursor.expect_key("prompt")?;
        let message = self.ctx.string_id(&mut self.cursor)?;
        self.cursor.expect(TokenKind::Comma)?;
        let mut timeout = 0u8;
        loop {
            if opener.is_word("warningif") && self.cursor.at_key("timeout") {
                self.cursor.expect_key("timeout")?;
                timeout = self.cursor.expect_number_as("timeout")?;
            } else if !opener.is_word("warningif") && self.cursor.at_key("flags") {
                self.cursor.expect_key("flags")?;
                self.cursor.expect_flag_list()?;
            } else {
                break;
            }
            self.cursor.expect(TokenKind::Comma)?;
        }
        let expr = compile_expression(&mut self.cursor, &self.ctx)?;
        self.cursor.expect_word("endif")?;
        self.cursor.eat(TokenKind::Semi);

        let op = match opener.text {
            "inconsistentif" => Op::InconsistentIf { error: message },
            "nosubmitif" => Op::NoSubmitIf { error: message },
            _ => Op::WarningIf {
                warning: message,
                timeout,
            },
        };
        let mut node = OpcodeNode::scoped(op, opener.line);
        node.children.extend(expr.into_nodes());
        stack.attach(node);
        Ok(())
    }

    /// A constant of type `ty` for a default or option of `info`.
    fn constant(&mut self, info: &QuestionInfo, ty: DataType) -> Result<TypedValue, CompileError> {
        match ty {
            DataType::Boolean => {
                if self.cursor.eat_word("TRUE") {
                    return Ok(TypedValue::Boolean(true));
                }
                if self.cursor.eat_word("FALSE") {
                    return Ok(TypedValue::Boolean(false));
                }
                let (value, _) = self.cursor.expect_number()?;
                Ok(TypedValue::Boolean(value != 0))
            }
            DataType::Uint8 | DataType::Uint16 | DataType::Uint32 | DataType::Uint64 => {
                let (value, token) = self.cursor.expect_number()?;
                let fits_bits = info.bits.is_none_or(|bits| value <= bit_limit(bits));
                TypedValue::uint(ty, value)
                    .filter(|_| fits_bits)
                    .ok_or_else(|| {
                        CompileError::new(
                            CompileErrorKind::Overflow,
                            format!("{} does not fit the question storage", value),
                            token,
                        )
                    })
            }
            DataType::String => Ok(TypedValue::String(self.ctx.string_id(&mut self.cursor)?)),
            DataType::Date => {
                let year = self.cursor.expect_number_as("year")?;
                self.cursor.expect(TokenKind::Slash)?;
                let month = self.cursor.expect_number_as("month")?;
                self.cursor.expect(TokenKind::Slash)?;
                let day = self.cursor.expect_number_as("day")?;
                Ok(TypedValue::Date(HiiDate { year, month, day }))
            }
            DataType::Time => {
                let hour = self.cursor.expect_number_as("hour")?;
                self.cursor.expect(TokenKind::Colon)?;
                let minute = self.cursor.expect_number_as("minute")?;
                self.cursor.expect(TokenKind::Colon)?;
                let second = self.cursor.expect_number_as("second")?;
                Ok(TypedValue::Time(HiiTime {
                    hour,
                    minute,
                    second,
                }))
            }
            DataType::Buffer => {
                self.cursor.expect(TokenKind::LBrace)?;
                let mut bytes = Vec::new();
                loop {
                    let element = self.constant(info, info.element_type)?;
                    element.write(&mut bytes);
                    if !self.cursor.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.cursor.expect(TokenKind::RBrace)?;
                Ok(TypedValue::Buffer(bytes))
            }
            _ => Err(self.cursor.error(
                CompileErrorKind::InvalidValue,
                "this question takes no constant values",
            )),
        }
    }
}

/// A size attribute narrowed to its record field.
fn size_in<T: TryFrom<u64>>(value: u64, at: &Token<'_>) -> Result<T, CompileError> {
    T::try_from(value).map_err(|_| {
        CompileError::new(
            CompileErrorKind::Overflow,
            format!("{} is out of range", value),
            at,
        )
    })
}
