//! Stack of open statement scopes.
//!
//! The statement compiler pushes a frame for every construct closed by an
//! end keyword (form, question, subtitle, conditional) and attaches each
//! finished node to the frame below it. A closing keyword must match the top
//! frame; anything else is a scope mismatch.

use core::fmt;

use crate::ifr::{DataType, OpCode, OpcodeNode};
use crate::table::BitSlice;

/// Conditional dialect of an if chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Headed by `disableif`; any opener may follow, each with its own
    /// `endif`.
    Uefi,
    /// Headed by `suppressif` or `grayoutif`; `disableif` may not follow.
    /// Under `framework_compatible` a `suppressif`/`grayoutif` pair shares
    /// one `endif`.
    Framework,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Uefi => write!(f, "UEFI"),
            Dialect::Framework => write!(f, "Framework"),
        }
    }
}

/// What inner items of a question need to know about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionInfo {
    pub kind: OpCode,
    pub question_id: u16,
    /// Value type of defaults and options.
    pub value_type: DataType,
    /// Element type of ordered-list containers.
    pub element_type: DataType,
    pub bits: Option<BitSlice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    Form,
    Subtitle,
    Question {
        end: &'static str,
        info: QuestionInfo,
    },
    Conditional {
        keyword: &'static str,
        dialect: Dialect,
        /// First keyword of the if chain this opener belongs to.
        chain_head: &'static str,
        /// Position in the chain, from 1.
        chain_len: usize,
        /// Closed together with the frame below by a single `endif`.
        shares_end: bool,
    },
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    pub node: OpcodeNode,
    /// The opening statement failed: the frame still balances its end
    /// keyword but its node is discarded.
    pub poisoned: bool,
    pub line: u32,
}

impl Frame {
    pub fn new(kind: FrameKind, node: OpcodeNode) -> Self {
        let line = node.line;
        Self {
            kind,
            node,
            poisoned: false,
            line,
        }
    }

    pub fn poisoned(mut self) -> Self {
        self.poisoned = true;
        self
    }

    pub fn closing_keyword(&self) -> &'static str {
        match &self.kind {
            FrameKind::Form => "endform",
            FrameKind::Subtitle => "endsubtitle",
            FrameKind::Question { end, .. } => *end,
            FrameKind::Conditional { .. } => "endif",
        }
    }

    pub fn opening_keyword(&self) -> &'static str {
        match &self.kind {
            FrameKind::Form => "form",
            FrameKind::Subtitle => "subtitle",
            FrameKind::Question { info, .. } => question_keyword(info.kind),
            FrameKind::Conditional { keyword, .. } => *keyword,
        }
    }

    /// True while only the condition has been attached.
    pub fn is_bare(&self) -> bool {
        self.node.statements().next().is_none()
    }
}

fn question_keyword(kind: OpCode) -> &'static str {
    match kind {
        OpCode::CheckBox => "checkbox",
        OpCode::Numeric => "numeric",
        OpCode::OneOf => "oneof",
        OpCode::OrderedList => "orderedlist",
        OpCode::String => "string",
        OpCode::Password => "password",
        OpCode::Date => "date",
        OpCode::Time => "time",
        OpCode::Action => "action",
        OpCode::Ref => "goto",
        _ => "question",
    }
}

/// The open frames of one form, innermost last.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    /// Create a stack holding the outermost frame.
    pub fn new(root: Frame) -> Self {
        Self { frames: vec![root] }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Innermost frame that is not a conditional.
    pub fn enclosing(&self) -> Option<&Frame> {
        self.frames
            .iter()
            .rev()
            .find(|f| !matches!(f.kind, FrameKind::Conditional { .. }))
    }

    /// The question whose body is being compiled, if any.
    pub fn question(&self) -> Option<&QuestionInfo> {
        match self.enclosing().map(|f| &f.kind) {
            Some(FrameKind::Question { info, .. }) => Some(info),
            _ => None,
        }
    }

    /// Append a finished node to the innermost frame.
    pub fn attach(&mut self, node: OpcodeNode) {
        if let Some(top) = self.frames.last_mut() {
            top.node.push(node);
        }
    }
}
