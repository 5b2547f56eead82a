//! Typed constant values as they appear in option, default and bound records.

use core::fmt;

use uuid::Uuid;

/// `EFI_IFR_TYPE_*` value-type codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Uint8 = 0x00,
    Uint16 = 0x01,
    Uint32 = 0x02,
    Uint64 = 0x03,
    Boolean = 0x04,
    Time = 0x05,
    Date = 0x06,
    String = 0x07,
    Other = 0x08,
    Undefined = 0x09,
    Action = 0x0A,
    Buffer = 0x0B,
    Ref = 0x0C,
}

impl DataType {
    /// Unsigned integer type for a storage width in bytes.
    pub fn uint_for_width(width: u8) -> Option<DataType> {
        match width {
            1 => Some(DataType::Uint8),
            2 => Some(DataType::Uint16),
            4 => Some(DataType::Uint32),
            8 => Some(DataType::Uint64),
            _ => None,
        }
    }

    /// Encoded size of a value of this type, when fixed.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            DataType::Uint8 | DataType::Boolean => Some(1),
            DataType::Uint16 | DataType::String | DataType::Action => Some(2),
            DataType::Uint32 => Some(4),
            DataType::Uint64 => Some(8),
            DataType::Time => Some(3),
            DataType::Date => Some(4),
            DataType::Ref => Some(22),
            DataType::Other | DataType::Undefined | DataType::Buffer => None,
        }
    }

    /// Largest unsigned value representable, for integer types.
    pub fn max_uint(self) -> Option<u64> {
        match self {
            DataType::Uint8 => Some(u8::MAX as u64),
            DataType::Uint16 => Some(u16::MAX as u64),
            DataType::Uint32 => Some(u32::MAX as u64),
            DataType::Uint64 => Some(u64::MAX),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HiiDate {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HiiTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HiiRef {
    pub question_id: u16,
    pub form_id: u16,
    pub formset: Uuid,
    pub device_path: u16,
}

/// A constant together with its IFR type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypedValue {
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Boolean(bool),
    Time(HiiTime),
    Date(HiiDate),
    String(u16),
    Ref(HiiRef),
    /// Ordered-list default: raw element bytes.
    Buffer(Vec<u8>),
}

impl TypedValue {
    /// Build an unsigned value of the given width, or `None` when the value
    /// does not fit.
    pub fn uint(ty: DataType, value: u64) -> Option<TypedValue> {
        if value > ty.max_uint()? {
            return None;
        }
        Some(match ty {
            DataType::Uint8 => TypedValue::Uint8(value as u8),
            DataType::Uint16 => TypedValue::Uint16(value as u16),
            DataType::Uint32 => TypedValue::Uint32(value as u32),
            _ => TypedValue::Uint64(value),
        })
    }

    pub fn data_type(&self) -> DataType {
        match self {
            TypedValue::Uint8(_) => DataType::Uint8,
            TypedValue::Uint16(_) => DataType::Uint16,
            TypedValue::Uint32(_) => DataType::Uint32,
            TypedValue::Uint64(_) => DataType::Uint64,
            TypedValue::Boolean(_) => DataType::Boolean,
            TypedValue::Time(_) => DataType::Time,
            TypedValue::Date(_) => DataType::Date,
            TypedValue::String(_) => DataType::String,
            TypedValue::Ref(_) => DataType::Ref,
            TypedValue::Buffer(_) => DataType::Buffer,
        }
    }

    /// Append the little-endian encoding of the value.
    pub fn write(&self, buf: &mut Vec<u8>) {
        match self {
            TypedValue::Uint8(v) => buf.push(*v),
            TypedValue::Uint16(v) => buf.extend_from_slice(&v.to_le_bytes()),
            TypedValue::Uint32(v) => buf.extend_from_slice(&v.to_le_bytes()),
            TypedValue::Uint64(v) => buf.extend_from_slice(&v.to_le_bytes()),
            TypedValue::Boolean(v) => buf.push(*v as u8),
            TypedValue::Time(t) => buf.extend_from_slice(&[t.hour, t.minute, t.second]),
            TypedValue::Date(d) => {
                buf.extend_from_slice(&d.year.to_le_bytes());
                buf.push(d.month);
                buf.push(d.day);
            }
            TypedValue::String(id) => buf.extend_from_slice(&id.to_le_bytes()),
            TypedValue::Ref(r) => {
                buf.extend_from_slice(&r.question_id.to_le_bytes());
                buf.extend_from_slice(&r.form_id.to_le_bytes());
                super::guid::write(buf, &r.formset);
                buf.extend_from_slice(&r.device_path.to_le_bytes());
            }
            TypedValue::Buffer(bytes) => buf.extend_from_slice(bytes),
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Uint8(v) => write!(f, "{:#04x}", v),
            TypedValue::Uint16(v) => write!(f, "{:#06x}", v),
            TypedValue::Uint32(v) => write!(f, "{:#010x}", v),
            TypedValue::Uint64(v) => write!(f, "{:#018x}", v),
            TypedValue::Boolean(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            TypedValue::Time(t) => write!(f, "{:02}:{:02}:{:02}", t.hour, t.minute, t.second),
            TypedValue::Date(d) => write!(f, "{}/{}/{}", d.year, d.month, d.day),
            TypedValue::String(id) => write!(f, "STRING_TOKEN({:#06x})", id),
            TypedValue::Ref(r) => write!(f, "REF(q={:#x}, form={:#x})", r.question_id, r.form_id),
            TypedValue::Buffer(bytes) => write!(f, "{:02x?}", bytes),
        }
    }
}
