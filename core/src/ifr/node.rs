//! The opcode tree built by the compilers and consumed by the emitter.
//!
//! `Op` is a flat enum: one variant per IFR record kind, each carrying the
//! fields of its fixed payload. Scope and children live on `OpcodeNode`.

use core::fmt;

use uuid::Uuid;

use super::flags::{
    CheckboxFlags, DateTimeFlags, OptionFlags, OrderedListFlags, QuestionFlags, StringFlags,
    SubtitleFlags,
};
use super::guid;
use super::opcode::OpCode;
use super::value::{DataType, TypedValue};
use crate::table::VarStoreInfo;

/// Size of `EFI_IFR_OP_HEADER`.
pub const OP_HEADER_LEN: usize = 2;
/// Size of `EFI_IFR_STATEMENT_HEADER`.
pub const STATEMENT_HEADER_LEN: usize = 4;
/// Size of `EFI_IFR_QUESTION_HEADER`.
pub const QUESTION_HEADER_LEN: usize = 11;

static_assertions::const_assert_eq!(QUESTION_HEADER_LEN, STATEMENT_HEADER_LEN + 7);

/// `VarStoreInfo` value of a question with no storage.
pub const VAR_OFFSET_INVALID: u16 = 0xFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatementHeader {
    pub prompt: u16,
    pub help: u16,
}

impl StatementHeader {
    fn write(&self, buf: &mut Vec<u8>) {
        put_u16(buf, self.prompt);
        put_u16(buf, self.help);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuestionHeader {
    pub statement: StatementHeader,
    pub question_id: u16,
    pub var: Option<VarStoreInfo>,
    pub flags: QuestionFlags,
}

impl QuestionHeader {
    fn write(&self, buf: &mut Vec<u8>) {
        self.statement.write(buf);
        put_u16(buf, self.question_id);
        match &self.var {
            Some(var) => {
                put_u16(buf, var.store.0);
                put_u16(buf, var.header_info());
            }
            None => {
                put_u16(buf, 0);
                put_u16(buf, VAR_OFFSET_INVALID);
            }
        }
        buf.push(self.flags.bits());
    }
}

/// `MinValue`/`MaxValue`/`Step` triple of numeric and one-of questions,
/// sized by the question's storage width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericRange {
    U8 { min: u8, max: u8, step: u8 },
    U16 { min: u16, max: u16, step: u16 },
    U32 { min: u32, max: u32, step: u32 },
    U64 { min: u64, max: u64, step: u64 },
}

impl NumericRange {
    /// Range for a storage width in bytes; `None` if a bound does not fit.
    pub fn for_width(width: u8, min: u64, max: u64, step: u64) -> Option<NumericRange> {
        let fits = |limit: u64| min <= limit && max <= limit && step <= limit;
        match width {
            1 if fits(u8::MAX as u64) => Some(NumericRange::U8 {
                min: min as u8,
                max: max as u8,
                step: step as u8,
            }),
            2 if fits(u16::MAX as u64) => Some(NumericRange::U16 {
                min: min as u16,
                max: max as u16,
                step: step as u16,
            }),
            4 if fits(u32::MAX as u64) => Some(NumericRange::U32 {
                min: min as u32,
                max: max as u32,
                step: step as u32,
            }),
            8 => Some(NumericRange::U64 { min, max, step }),
            _ => None,
        }
    }

    fn write(&self, buf: &mut Vec<u8>) {
        match *self {
            NumericRange::U8 { min, max, step } => buf.extend_from_slice(&[min, max, step]),
            NumericRange::U16 { min, max, step } => {
                for v in [min, max, step] {
                    put_u16(buf, v);
                }
            }
            NumericRange::U32 { min, max, step } => {
                for v in [min, max, step] {
                    put_u32(buf, v);
                }
            }
            NumericRange::U64 { min, max, step } => {
                for v in [min, max, step] {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
    }
}

/// Destination of a `goto`, selecting the REF/REF2/REF3/REF4 layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    Form {
        form_id: u16,
    },
    Question {
        form_id: u16,
        question_id: u16,
    },
    FormSet {
        form_id: u16,
        question_id: u16,
        formset: Uuid,
    },
    DevicePath {
        form_id: u16,
        question_id: u16,
        formset: Uuid,
        device_path: u16,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormMapMethod {
    pub title: u16,
    pub method: Uuid,
}

/// One IFR record kind and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    // === Formset structure ===
    FormSet {
        guid: Uuid,
        title: u16,
        help: u16,
        class_guids: Vec<Uuid>,
    },
    Form {
        form_id: u16,
        title: u16,
    },
    FormMap {
        form_id: u16,
        methods: Vec<FormMapMethod>,
    },
    DefaultStore {
        name: u16,
        default_id: u16,
    },
    VarStore {
        guid: Uuid,
        var_store_id: u16,
        size: u16,
        name: String,
    },
    VarStoreEfi {
        var_store_id: u16,
        guid: Uuid,
        attributes: u32,
        size: u16,
        name: String,
    },
    VarStoreNameValue {
        var_store_id: u16,
        guid: Uuid,
    },

    // === Statements ===
    Subtitle {
        statement: StatementHeader,
        flags: SubtitleFlags,
    },
    Text {
        statement: StatementHeader,
        text_two: u16,
    },
    ResetButton {
        statement: StatementHeader,
        default_id: u16,
    },
    Locked,
    Guid {
        guid: Uuid,
        data: Vec<u8>,
    },

    // === Questions ===
    Ref {
        question: QuestionHeader,
        target: RefTarget,
    },
    Action {
        question: QuestionHeader,
        config: Option<u16>,
    },
    CheckBox {
        question: QuestionHeader,
        flags: CheckboxFlags,
    },
    Numeric {
        question: QuestionHeader,
        flags: u8,
        range: NumericRange,
    },
    OneOf {
        question: QuestionHeader,
        flags: u8,
        range: NumericRange,
    },
    Password {
        question: QuestionHeader,
        min_size: u16,
        max_size: u16,
    },
    String {
        question: QuestionHeader,
        min_size: u8,
        max_size: u8,
        flags: StringFlags,
    },
    Date {
        question: QuestionHeader,
        flags: DateTimeFlags,
    },
    Time {
        question: QuestionHeader,
        flags: DateTimeFlags,
    },
    OrderedList {
        question: QuestionHeader,
        max_containers: u8,
        flags: OrderedListFlags,
    },

    // === Question tags ===
    OneOfOption {
        text: u16,
        flags: OptionFlags,
        value: TypedValue,
    },
    /// `value: None` is the expression form (`EFI_IFR_TYPE_OTHER`), whose
    /// value is the scoped `Value` child.
    Default {
        default_id: u16,
        value: Option<TypedValue>,
    },
    Value,
    Read,
    Write,
    Refresh {
        interval: u8,
    },

    // === Conditionals ===
    SuppressIf,
    GrayOutIf,
    DisableIf,
    InconsistentIf {
        error: u16,
    },
    NoSubmitIf {
        error: u16,
    },
    WarningIf {
        warning: u16,
        timeout: u8,
    },
    Rule {
        rule_id: u8,
    },

    // === Expression constants ===
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    True,
    False,
    Zero,
    One,
    Ones,
    Undefined,
    Version,

    // === Expression references ===
    Dup,
    This,
    QuestionRef1 {
        question_id: u16,
    },
    QuestionRef2,
    QuestionRef3 {
        device_path: Option<u16>,
        guid: Option<Uuid>,
    },
    RuleRef {
        rule_id: u8,
    },
    StringRef1 {
        string_id: u16,
    },
    StringRef2,
    Security {
        permissions: Uuid,
    },
    Get {
        var: VarStoreInfo,
        data_type: DataType,
    },
    Set {
        var: VarStoreInfo,
        data_type: DataType,
    },

    // === Expression operators ===
    Length,
    BitwiseNot,
    Not,
    ToBoolean,
    ToString {
        format: u8,
    },
    ToUint,
    ToUpper,
    ToLower,
    Catenate,
    Match,
    Match2 {
        syntax: Uuid,
    },
    Conditional,
    Find {
        format: u8,
    },
    Mid,
    Token,
    Span {
        flags: u8,
    },
    Map,
    And,
    Or,
    BitwiseAnd,
    BitwiseOr,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    ShiftLeft,
    ShiftRight,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    End,
}

impl Op {
    pub fn opcode(&self) -> OpCode {
        match self {
            Op::FormSet { .. } => OpCode::FormSet,
            Op::Form { .. } => OpCode::Form,
            Op::FormMap { .. } => OpCode::FormMap,
            Op::DefaultStore { .. } => OpCode::DefaultStore,
            Op::VarStore { .. } => OpCode::VarStore,
            Op::VarStoreEfi { .. } => OpCode::VarStoreEfi,
            Op::VarStoreNameValue { .. } => OpCode::VarStoreNameValue,
            Op::Subtitle { .. } => OpCode::Subtitle,
            Op::Text { .. } => OpCode::Text,
            Op::ResetButton { .. } => OpCode::ResetButton,
            Op::Locked => OpCode::Locked,
            Op::Guid { .. } => OpCode::Guid,
            Op::Ref { .. } => OpCode::Ref,
            Op::Action { .. } => OpCode::Action,
            Op::CheckBox { .. } => OpCode::CheckBox,
            Op::Numeric { .. } => OpCode::Numeric,
            Op::OneOf { .. } => OpCode::OneOf,
            Op::Password { .. } => OpCode::Password,
            Op::String { .. } => OpCode::String,
            Op::Date { .. } => OpCode::Date,
            Op::Time { .. } => OpCode::Time,
            Op::OrderedList { .. } => OpCode::OrderedList,
            Op::OneOfOption { .. } => OpCode::OneOfOption,
            Op::Default { .. } => OpCode::Default,
            Op::Value => OpCode::Value,
            Op::Read => OpCode::Read,
            Op::Write => OpCode::Write,
            Op::Refresh { .. } => OpCode::Refresh,
            Op::SuppressIf => OpCode::SuppressIf,
            Op::GrayOutIf => OpCode::GrayOutIf,
            Op::DisableIf => OpCode::DisableIf,
            Op::InconsistentIf { .. } => OpCode::InconsistentIf,
            Op::NoSubmitIf { .. } => OpCode::NoSubmitIf,
            Op::WarningIf { .. } => OpCode::WarningIf,
            Op::Rule { .. } => OpCode::Rule,
            Op::Uint8(_) => OpCode::Uint8,
            Op::Uint16(_) => OpCode::Uint16,
            Op::Uint32(_) => OpCode::Uint32,
            Op::Uint64(_) => OpCode::Uint64,
            Op::True => OpCode::True,
            Op::False => OpCode::False,
            Op::Zero => OpCode::Zero,
            Op::One => OpCode::One,
            Op::Ones => OpCode::Ones,
            Op::Undefined => OpCode::Undefined,
            Op::Version => OpCode::Version,
            Op::Dup => OpCode::Dup,
            Op::This => OpCode::This,
            Op::QuestionRef1 { .. } => OpCode::QuestionRef1,
            Op::QuestionRef2 => OpCode::QuestionRef2,
            Op::QuestionRef3 { .. } => OpCode::QuestionRef3,
            Op::RuleRef { .. } => OpCode::RuleRef,
            Op::StringRef1 { .. } => OpCode::StringRef1,
            Op::StringRef2 => OpCode::StringRef2,
            Op::Security { .. } => OpCode::Security,
            Op::Get { .. } => OpCode::Get,
            Op::Set { .. } => OpCode::Set,
            Op::Length => OpCode::Length,
            Op::BitwiseNot => OpCode::BitwiseNot,
            Op::Not => OpCode::Not,
            Op::ToBoolean => OpCode::ToBoolean,
            Op::ToString { .. } => OpCode::ToString,
            Op::ToUint => OpCode::ToUint,
            Op::ToUpper => OpCode::ToUpper,
            Op::ToLower => OpCode::ToLower,
            Op::Catenate => OpCode::Catenate,
            Op::Match => OpCode::Match,
            Op::Match2 { .. } => OpCode::Match2,
            Op::Conditional => OpCode::Conditional,
            Op::Find { .. } => OpCode::Find,
            Op::Mid => OpCode::Mid,
            Op::Token => OpCode::Token,
            Op::Span { .. } => OpCode::Span,
            Op::Map => OpCode::Map,
            Op::And => OpCode::And,
            Op::Or => OpCode::Or,
            Op::BitwiseAnd => OpCode::BitwiseAnd,
            Op::BitwiseOr => OpCode::BitwiseOr,
            Op::Equal => OpCode::Equal,
            Op::NotEqual => OpCode::NotEqual,
            Op::GreaterThan => OpCode::GreaterThan,
            Op::GreaterEqual => OpCode::GreaterEqual,
            Op::LessThan => OpCode::LessThan,
            Op::LessEqual => OpCode::LessEqual,
            Op::ShiftLeft => OpCode::ShiftLeft,
            Op::ShiftRight => OpCode::ShiftRight,
            Op::Add => OpCode::Add,
            Op::Subtract => OpCode::Subtract,
            Op::Multiply => OpCode::Multiply,
            Op::Divide => OpCode::Divide,
            Op::Modulo => OpCode::Modulo,
            Op::End => OpCode::End,
        }
    }

    /// The question header, for question records.
    pub fn question(&self) -> Option<&QuestionHeader> {
        match self {
            Op::Ref { question, .. }
            | Op::Action { question, .. }
            | Op::CheckBox { question, .. }
            | Op::Numeric { question, .. }
            | Op::OneOf { question, .. }
            | Op::Password { question, .. }
            | Op::String { question, .. }
            | Op::Date { question, .. }
            | Op::Time { question, .. }
            | Op::OrderedList { question, .. } => Some(question),
            _ => None,
        }
    }

    /// Append the record payload (everything after the op header).
    pub fn write_payload(&self, buf: &mut Vec<u8>) {
        match self {
            Op::FormSet {
                guid,
                title,
                help,
                class_guids,
            } => {
                guid::write(buf, guid);
                put_u16(buf, *title);
                put_u16(buf, *help);
                buf.push(class_guids.len() as u8 & 0x03);
                for class in class_guids {
                    guid::write(buf, class);
                }
            }
            Op::Form { form_id, title } => {
                put_u16(buf, *form_id);
                put_u16(buf, *title);
            }
            Op::FormMap { form_id, methods } => {
                put_u16(buf, *form_id);
                for method in methods {
                    put_u16(buf, method.title);
                    guid::write(buf, &method.method);
                }
            }
            Op::DefaultStore { name, default_id } => {
                put_u16(buf, *name);
                put_u16(buf, *default_id);
            }
            Op::VarStore {
                guid,
                var_store_id,
                size,
                name,
            } => {
                guid::write(buf, guid);
                put_u16(buf, *var_store_id);
                put_u16(buf, *size);
                put_ascii(buf, name);
            }
            Op::VarStoreEfi {
                var_store_id,
                guid,
                attributes,
                size,
                name,
            } => {
                put_u16(buf, *var_store_id);
                guid::write(buf, guid);
                put_u32(buf, *attributes);
                put_u16(buf, *size);
                put_ascii(buf, name);
            }
            Op::VarStoreNameValue { var_store_id, guid } => {
                put_u16(buf, *var_store_id);
                guid::write(buf, guid);
            }
            Op::Subtitle { statement, flags } => {
                statement.write(buf);
                buf.push(flags.bits());
            }
            Op::Text {
                statement,
                text_two,
            } => {
                statement.write(buf);
                put_u16(buf, *text_two);
            }
            Op::ResetButton {
                statement,
                default_id,
            } => {
                statement.write(buf);
                put_u16(buf, *default_id);
            }
            Op::Guid { guid, data } => {
                guid::write(buf, guid);
                buf.extend_from_slice(data);
            }
            Op::Ref { question, target } => {
                question.write(buf);
                match target {
                    RefTarget::Form { form_id } => put_u16(buf, *form_id),
                    RefTarget::Question {
                        form_id,
                        question_id,
                    } => {
                        put_u16(buf, *form_id);
                        put_u16(buf, *question_id);
                    }
                    RefTarget::FormSet {
                        form_id,
                        question_id,
                        formset,
                    } => {
                        put_u16(buf, *form_id);
                        put_u16(buf, *question_id);
                        guid::write(buf, formset);
                    }
                    RefTarget::DevicePath {
                        form_id,
                        question_id,
                        formset,
                        device_path,
                    } => {
                        put_u16(buf, *form_id);
                        put_u16(buf, *question_id);
                        guid::write(buf, formset);
                        put_u16(buf, *device_path);
                    }
                }
            }
            Op::Action { question, config } => {
                question.write(buf);
                if let Some(config) = config {
                    put_u16(buf, *config);
                }
            }
            Op::CheckBox { question, flags } => {
                question.write(buf);
                buf.push(flags.bits());
            }
            Op::Numeric {
                question,
                flags,
                range,
            }
            | Op::OneOf {
                question,
                flags,
                range,
            } => {
                question.write(buf);
                buf.push(*flags);
                range.write(buf);
            }
            Op::Password {
                question,
                min_size,
                max_size,
            } => {
                question.write(buf);
                put_u16(buf, *min_size);
                put_u16(buf, *max_size);
            }
            Op::String {
                question,
                min_size,
                max_size,
                flags,
            } => {
                question.write(buf);
                buf.push(*min_size);
                buf.push(*max_size);
                buf.push(flags.bits());
            }
            Op::Date { question, flags } | Op::Time { question, flags } => {
                question.write(buf);
                buf.push(flags.bits());
            }
            Op::OrderedList {
                question,
                max_containers,
                flags,
            } => {
                question.write(buf);
                buf.push(*max_containers);
                buf.push(flags.bits());
            }
            Op::OneOfOption { text, flags, value } => {
                put_u16(buf, *text);
                buf.push(flags.bits());
                buf.push(value.data_type() as u8);
                value.write(buf);
            }
            Op::Default { default_id, value } => {
                put_u16(buf, *default_id);
                match value {
                    Some(value) => {
                        buf.push(value.data_type() as u8);
                        value.write(buf);
                    }
                    None => buf.push(DataType::Other as u8),
                }
            }
            Op::Refresh { interval } => buf.push(*interval),
            Op::InconsistentIf { error } | Op::NoSubmitIf { error } => put_u16(buf, *error),
            Op::WarningIf { warning, timeout } => {
                put_u16(buf, *warning);
                buf.push(*timeout);
            }
            Op::Rule { rule_id } | Op::RuleRef { rule_id } => buf.push(*rule_id),
            Op::Uint8(v) => buf.push(*v),
            Op::Uint16(v) => put_u16(buf, *v),
            Op::Uint32(v) => put_u32(buf, *v),
            Op::Uint64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            Op::QuestionRef1 { question_id } => put_u16(buf, *question_id),
            Op::QuestionRef3 { device_path, guid } => {
                if device_path.is_some() || guid.is_some() {
                    put_u16(buf, device_path.unwrap_or(0));
                }
                if let Some(guid) = guid {
                    guid::write(buf, guid);
                }
            }
            Op::StringRef1 { string_id } => put_u16(buf, *string_id),
            Op::Security { permissions } => guid::write(buf, permissions),
            Op::Get { var, data_type } | Op::Set { var, data_type } => {
                put_u16(buf, var.store.0);
                put_u16(buf, var.header_info());
                buf.push(*data_type as u8);
            }
            Op::ToString { format } | Op::Find { format } => buf.push(*format),
            Op::Span { flags } => buf.push(*flags),
            Op::Match2 { syntax } => guid::write(buf, syntax),
            Op::Locked
            | Op::Value
            | Op::Read
            | Op::Write
            | Op::SuppressIf
            | Op::GrayOutIf
            | Op::DisableIf
            | Op::True
            | Op::False
            | Op::Zero
            | Op::One
            | Op::Ones
            | Op::Undefined
            | Op::Version
            | Op::Dup
            | Op::This
            | Op::QuestionRef2
            | Op::StringRef2
            | Op::Length
            | Op::BitwiseNot
            | Op::Not
            | Op::ToBoolean
            | Op::ToUint
            | Op::ToUpper
            | Op::ToLower
            | Op::Catenate
            | Op::Match
            | Op::Conditional
            | Op::Mid
            | Op::Token
            | Op::Map
            | Op::And
            | Op::Or
            | Op::BitwiseAnd
            | Op::BitwiseOr
            | Op::Equal
            | Op::NotEqual
            | Op::GreaterThan
            | Op::GreaterEqual
            | Op::LessThan
            | Op::LessEqual
            | Op::ShiftLeft
            | Op::ShiftRight
            | Op::Add
            | Op::Subtract
            | Op::Multiply
            | Op::Divide
            | Op::Modulo
            | Op::End => {}
        }
    }

    /// Payload length in bytes.
    pub fn payload_len(&self) -> usize {
        let mut buf = Vec::new();
        self.write_payload(&mut buf);
        buf.len()
    }
}

/// A node of the opcode tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeNode {
    pub op: Op,
    /// Opens a scope closed by an `End` record after the children.
    pub scope: bool,
    /// Source line the node was compiled from (0 for synthesized nodes).
    pub line: u32,
    pub children: Vec<OpcodeNode>,
}

impl OpcodeNode {
    pub fn leaf(op: Op, line: u32) -> Self {
        Self {
            op,
            scope: false,
            line,
            children: Vec::new(),
        }
    }

    pub fn scoped(op: Op, line: u32) -> Self {
        Self {
            op,
            scope: true,
            line,
            children: Vec::new(),
        }
    }

    pub fn opcode(&self) -> OpCode {
        self.op.opcode()
    }

    pub fn push(&mut self, child: OpcodeNode) {
        self.children.push(child);
    }

    /// Depth-first pre-order traversal, including `self`.
    pub fn walk(&self) -> impl Iterator<Item = &OpcodeNode> {
        let mut stack = vec![self];
        core::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Children that are not part of the leading condition expression.
    ///
    /// Conditional scopes begin with their postfix condition; this skips
    /// expression records so callers see only nested statements.
    pub fn statements(&self) -> impl Iterator<Item = &OpcodeNode> {
        self.children.iter().filter(|c| !is_expression_op(c.opcode()))
    }

    /// Number of scope-opening nodes in this subtree.
    pub fn scope_count(&self) -> usize {
        self.walk().filter(|n| n.scope).count()
    }
}

/// True for opcodes that only occur inside expressions.
pub fn is_expression_op(opcode: OpCode) -> bool {
    use OpCode::*;
    matches!(
        opcode,
        EqIdVal
            | EqIdId
            | EqIdValList
            | And
            | Or
            | Not
            | ToLower
            | ToUpper
            | Map
            | Version
            | Match
            | Get
            | Set
            | Equal
            | NotEqual
            | GreaterThan
            | GreaterEqual
            | LessThan
            | LessEqual
            | BitwiseAnd
            | BitwiseOr
            | BitwiseNot
            | ShiftLeft
            | ShiftRight
            | Add
            | Subtract
            | Multiply
            | Divide
            | Modulo
            | RuleRef
            | QuestionRef1
            | QuestionRef2
            | QuestionRef3
            | Uint8
            | Uint16
            | Uint32
            | Uint64
            | True
            | False
            | ToUint
            | ToString
            | ToBoolean
            | Mid
            | Find
            | Token
            | StringRef1
            | StringRef2
            | Conditional
            | Zero
            | One
            | Ones
            | Undefined
            | Length
            | Dup
            | This
            | Span
            | Catenate
            | Security
            | Match2
    )
}

impl fmt::Display for OpcodeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn go(node: &OpcodeNode, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            writeln!(f, "{:indent$}{}", "", node.opcode().mnemonic(), indent = depth * 2)?;
            for child in &node.children {
                go(child, depth + 1, f)?;
            }
            if node.scope {
                writeln!(f, "{:indent$}END", "", indent = depth * 2)?;
            }
            Ok(())
        }
        go(self, 0, f)
    }
}

/// A compiled expression: postfix opcodes, operands before operators.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expression(pub Vec<OpcodeNode>);

impl Expression {
    pub fn nodes(&self) -> &[OpcodeNode] {
        &self.0
    }

    pub fn into_nodes(self) -> Vec<OpcodeNode> {
        self.0
    }

    /// Flattened opcode sequence, `Map` children included.
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.0
            .iter()
            .flat_map(|n| n.walk())
            .map(|n| n.opcode())
            .collect()
    }
}

pub(crate) fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_ascii(buf: &mut Vec<u8>, name: &str) {
    buf.extend(name.bytes().filter(u8::is_ascii));
    buf.push(0);
}
