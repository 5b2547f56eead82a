//! IFR opcode numbers.
//!
//! Values are fixed by the UEFI specification (Internal Forms Representation
//! chapter) and must never be renumbered.

use core::fmt;

/// One-byte opcode tag that starts every IFR record.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Form = 0x01,
    Subtitle = 0x02,
    Text = 0x03,
    Image = 0x04,
    OneOf = 0x05,
    CheckBox = 0x06,
    Numeric = 0x07,
    Password = 0x08,
    OneOfOption = 0x09,
    SuppressIf = 0x0A,
    Locked = 0x0B,
    Action = 0x0C,
    ResetButton = 0x0D,
    FormSet = 0x0E,
    Ref = 0x0F,
    NoSubmitIf = 0x10,
    InconsistentIf = 0x11,
    EqIdVal = 0x12,
    EqIdId = 0x13,
    EqIdValList = 0x14,
    And = 0x15,
    Or = 0x16,
    Not = 0x17,
    Rule = 0x18,
    GrayOutIf = 0x19,
    Date = 0x1A,
    Time = 0x1B,
    String = 0x1C,
    Refresh = 0x1D,
    DisableIf = 0x1E,
    Animation = 0x1F,
    ToLower = 0x20,
    ToUpper = 0x21,
    Map = 0x22,
    OrderedList = 0x23,
    VarStore = 0x24,
    VarStoreNameValue = 0x25,
    VarStoreEfi = 0x26,
    VarStoreDevice = 0x27,
    Version = 0x28,
    End = 0x29,
    Match = 0x2A,
    Get = 0x2B,
    Set = 0x2C,
    Read = 0x2D,
    Write = 0x2E,
    Equal = 0x2F,
    NotEqual = 0x30,
    GreaterThan = 0x31,
    GreaterEqual = 0x32,
    LessThan = 0x33,
    LessEqual = 0x34,
    BitwiseAnd = 0x35,
    BitwiseOr = 0x36,
    BitwiseNot = 0x37,
    ShiftLeft = 0x38,
    ShiftRight = 0x39,
    Add = 0x3A,
    Subtract = 0x3B,
    Multiply = 0x3C,
    Divide = 0x3D,
    Modulo = 0x3E,
    RuleRef = 0x3F,
    QuestionRef1 = 0x40,
    QuestionRef2 = 0x41,
    Uint8 = 0x42,
    Uint16 = 0x43,
    Uint32 = 0x44,
    Uint64 = 0x45,
    True = 0x46,
    False = 0x47,
    ToUint = 0x48,
    ToString = 0x49,
    ToBoolean = 0x4A,
    Mid = 0x4B,
    Find = 0x4C,
    Token = 0x4D,
    StringRef1 = 0x4E,
    StringRef2 = 0x4F,
    Conditional = 0x50,
    QuestionRef3 = 0x51,
    Zero = 0x52,
    One = 0x53,
    Ones = 0x54,
    Undefined = 0x55,
    Length = 0x56,
    Dup = 0x57,
    This = 0x58,
    Span = 0x59,
    Value = 0x5A,
    Default = 0x5B,
    DefaultStore = 0x5C,
    FormMap = 0x5D,
    Catenate = 0x5E,
    Guid = 0x5F,
    Security = 0x60,
    ModalTag = 0x61,
    RefreshId = 0x62,
    WarningIf = 0x63,
    Match2 = 0x64,
}

impl OpCode {
    /// Decode an opcode byte; `None` for bytes the UEFI table leaves unassigned.
    pub fn from_byte(byte: u8) -> Option<OpCode> {
        use OpCode::*;
        const TABLE: [OpCode; 100] = [
            Form, Subtitle, Text, Image, OneOf, CheckBox, Numeric, Password, OneOfOption,
            SuppressIf, Locked, Action, ResetButton, FormSet, Ref, NoSubmitIf, InconsistentIf,
            EqIdVal, EqIdId, EqIdValList, And, Or, Not, Rule, GrayOutIf, Date, Time, String,
            Refresh, DisableIf, Animation, ToLower, ToUpper, Map, OrderedList, VarStore,
            VarStoreNameValue, VarStoreEfi, VarStoreDevice, Version, End, Match, Get, Set,
            Read, Write, Equal, NotEqual, GreaterThan, GreaterEqual, LessThan, LessEqual,
            BitwiseAnd, BitwiseOr, BitwiseNot, ShiftLeft, ShiftRight, Add, Subtract, Multiply,
            Divide, Modulo, RuleRef, QuestionRef1, QuestionRef2, Uint8, Uint16, Uint32, Uint64,
            True, False, ToUint, ToString, ToBoolean, Mid, Find, Token, StringRef1, StringRef2,
            Conditional, QuestionRef3, Zero, One, Ones, Undefined, Length, Dup, This, Span,
            Value, Default, DefaultStore, FormMap, Catenate, Guid, Security, ModalTag,
            RefreshId, WarningIf, Match2,
        ];
        match byte {
            0x01..=0x64 => Some(TABLE[byte as usize - 1]),
            _ => None,
        }
    }

    /// Upper-case mnemonic used in listings (`EFI_IFR_<NAME>_OP`).
    pub fn mnemonic(self) -> &'static str {
        use OpCode::*;
        match self {
            Form => "FORM",
            Subtitle => "SUBTITLE",
            Text => "TEXT",
            Image => "IMAGE",
            OneOf => "ONE_OF",
            CheckBox => "CHECKBOX",
            Numeric => "NUMERIC",
            Password => "PASSWORD",
            OneOfOption => "ONE_OF_OPTION",
            SuppressIf => "SUPPRESS_IF",
            Locked => "LOCKED",
            Action => "ACTION",
            ResetButton => "RESET_BUTTON",
            FormSet => "FORM_SET",
            Ref => "REF",
            NoSubmitIf => "NO_SUBMIT_IF",
            InconsistentIf => "INCONSISTENT_IF",
            EqIdVal => "EQ_ID_VAL",
            EqIdId => "EQ_ID_ID",
            EqIdValList => "EQ_ID_VAL_LIST",
            And => "AND",
            Or => "OR",
            Not => "NOT",
            Rule => "RULE",
            GrayOutIf => "GRAY_OUT_IF",
            Date => "DATE",
            Time => "TIME",
            String => "STRING",
            Refresh => "REFRESH",
            DisableIf => "DISABLE_IF",
            Animation => "ANIMATION",
            ToLower => "TO_LOWER",
            ToUpper => "TO_UPPER",
            Map => "MAP",
            OrderedList => "ORDERED_LIST",
            VarStore => "VARSTORE",
            VarStoreNameValue => "VARSTORE_NAME_VALUE",
            VarStoreEfi => "VARSTORE_EFI",
            VarStoreDevice => "VARSTORE_DEVICE",
            Version => "VERSION",
            End => "END",
            Match => "MATCH",
            Get => "GET",
            Set => "SET",
            Read => "READ",
            Write => "WRITE",
            Equal => "EQUAL",
            NotEqual => "NOT_EQUAL",
            GreaterThan => "GREATER_THAN",
            GreaterEqual => "GREATER_EQUAL",
            LessThan => "LESS_THAN",
            LessEqual => "LESS_EQUAL",
            BitwiseAnd => "BITWISE_AND",
            BitwiseOr => "BITWISE_OR",
            BitwiseNot => "BITWISE_NOT",
            ShiftLeft => "SHIFT_LEFT",
            ShiftRight => "SHIFT_RIGHT",
            Add => "ADD",
            Subtract => "SUBTRACT",
            Multiply => "MULTIPLY",
            Divide => "DIVIDE",
            Modulo => "MODULO",
            RuleRef => "RULE_REF",
            QuestionRef1 => "QUESTION_REF1",
            QuestionRef2 => "QUESTION_REF2",
            Uint8 => "UINT8",
            Uint16 => "UINT16",
            Uint32 => "UINT32",
            Uint64 => "UINT64",
            True => "TRUE",
            False => "FALSE",
            ToUint => "TO_UINT",
            ToString => "TO_STRING",
            ToBoolean => "TO_BOOLEAN",
            Mid => "MID",
            Find => "FIND",
            Token => "TOKEN",
            StringRef1 => "STRING_REF1",
            StringRef2 => "STRING_REF2",
            Conditional => "CONDITIONAL",
            QuestionRef3 => "QUESTION_REF3",
            Zero => "ZERO",
            One => "ONE",
            Ones => "ONES",
            Undefined => "UNDEFINED",
            Length => "LENGTH",
            Dup => "DUP",
            This => "THIS",
            Span => "SPAN",
            Value => "VALUE",
            Default => "DEFAULT",
            DefaultStore => "DEFAULTSTORE",
            FormMap => "FORM_MAP",
            Catenate => "CATENATE",
            Guid => "GUID",
            Security => "SECURITY",
            ModalTag => "MODAL_TAG",
            RefreshId => "REFRESH_ID",
            WarningIf => "WARNING_IF",
            Match2 => "MATCH2",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EFI_IFR_{}_OP", self.mnemonic())
    }
}
