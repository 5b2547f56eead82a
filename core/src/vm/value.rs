use core::fmt;

use crate::ifr::TypedValue;

/// A value on the evaluator stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    /// Unsigned integer; `width` is the byte width it was produced at.
    Uint {
        value: u64,
        width: u8,
    },
    String(String),
    Undefined,
}

impl Value {
    pub fn uint(value: u64, width: u8) -> Value {
        Value::Uint {
            value: value & mask(width),
            width,
        }
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::String(s.into())
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Uint { .. } => "integer",
            Value::String(_) => "string",
            Value::Undefined => "undefined",
        }
    }
}

/// All-ones mask for a byte width; widths of 8 and above keep every bit.
pub(crate) fn mask(width: u8) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (u32::from(width) * 8)) - 1
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl TryFrom<&TypedValue> for Value {
    type Error = ();

    /// Integer and boolean defaults convert; dates, times, strings and
    /// buffers have no stack representation.
    fn try_from(value: &TypedValue) -> Result<Value, ()> {
        match value {
            TypedValue::Uint8(v) => Ok(Value::uint(u64::from(*v), 1)),
            TypedValue::Uint16(v) => Ok(Value::uint(u64::from(*v), 2)),
            TypedValue::Uint32(v) => Ok(Value::uint(u64::from(*v), 4)),
            TypedValue::Uint64(v) => Ok(Value::uint(*v, 8)),
            TypedValue::Boolean(b) => Ok(Value::Bool(*b)),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => write!(f, "TRUE"),
            Value::Bool(false) => write!(f, "FALSE"),
            Value::Uint { value, width } => write!(f, "{} (UINT{})", value, u32::from(*width) * 8),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Undefined => write!(f, "UNDEFINED"),
        }
    }
}
