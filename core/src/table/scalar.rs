//! Built-in scalar types of VFR data structures.

use core::fmt;

use crate::ifr::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Boolean,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Char16,
    StringId,
    Date,
    Time,
    Ref,
}

impl Scalar {
    pub const ALL: [Scalar; 10] = [
        Scalar::Boolean,
        Scalar::Uint8,
        Scalar::Uint16,
        Scalar::Uint32,
        Scalar::Uint64,
        Scalar::Char16,
        Scalar::StringId,
        Scalar::Date,
        Scalar::Time,
        Scalar::Ref,
    ];

    pub fn from_name(name: &str) -> Option<Scalar> {
        Scalar::ALL.into_iter().find(|s| s.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Scalar::Boolean => "BOOLEAN",
            Scalar::Uint8 => "UINT8",
            Scalar::Uint16 => "UINT16",
            Scalar::Uint32 => "UINT32",
            Scalar::Uint64 => "UINT64",
            Scalar::Char16 => "CHAR16",
            Scalar::StringId => "EFI_STRING_ID",
            Scalar::Date => "EFI_HII_DATE",
            Scalar::Time => "EFI_HII_TIME",
            Scalar::Ref => "EFI_HII_REF",
        }
    }

    pub fn size(self) -> u32 {
        match self {
            Scalar::Boolean | Scalar::Uint8 => 1,
            Scalar::Uint16 | Scalar::Char16 | Scalar::StringId => 2,
            Scalar::Uint32 | Scalar::Date => 4,
            Scalar::Uint64 => 8,
            Scalar::Time => 3,
            Scalar::Ref => 22,
        }
    }

    pub fn align(self) -> u32 {
        match self {
            Scalar::Boolean | Scalar::Uint8 | Scalar::Time => 1,
            Scalar::Uint16 | Scalar::Char16 | Scalar::StringId | Scalar::Date => 2,
            Scalar::Uint32 => 4,
            Scalar::Uint64 | Scalar::Ref => 8,
        }
    }

    /// Types a bit-field may be declared with.
    pub fn is_bit_field_unit(self) -> bool {
        matches!(
            self,
            Scalar::Uint8 | Scalar::Uint16 | Scalar::Uint32 | Scalar::Uint64
        )
    }

    /// IFR value type used when a question or `get`/`set` reads this scalar.
    pub fn data_type(self) -> DataType {
        match self {
            Scalar::Boolean => DataType::Boolean,
            Scalar::Uint8 => DataType::Uint8,
            Scalar::Uint16 | Scalar::Char16 => DataType::Uint16,
            Scalar::Uint32 => DataType::Uint32,
            Scalar::Uint64 => DataType::Uint64,
            Scalar::StringId => DataType::String,
            Scalar::Date => DataType::Date,
            Scalar::Time => DataType::Time,
            Scalar::Ref => DataType::Ref,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
