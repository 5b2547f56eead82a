//! Flag bytes carried by IFR records.

use bitflags::bitflags;

bitflags! {
    /// `EFI_IFR_QUESTION_HEADER.Flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct QuestionFlags: u8 {
        const READ_ONLY = 0x01;
        const CALLBACK = 0x04;
        const REST_STYLE = 0x08;
        const RESET_REQUIRED = 0x10;
        const RECONNECT_REQUIRED = 0x40;
        const OPTIONS_ONLY = 0x80;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CheckboxFlags: u8 {
        const DEFAULT = 0x01;
        const DEFAULT_MFG = 0x02;
    }
}

bitflags! {
    /// `EFI_IFR_ONE_OF_OPTION.Flags`; the low nibble is the value type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OptionFlags: u8 {
        const DEFAULT = 0x10;
        const DEFAULT_MFG = 0x20;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StringFlags: u8 {
        const MULTI_LINE = 0x01;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OrderedListFlags: u8 {
        const UNIQUE_SET = 0x01;
        const NO_EMPTY_SET = 0x02;
    }
}

bitflags! {
    /// Shared by date and time questions; the suppress bits differ in meaning.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DateTimeFlags: u8 {
        const SUPPRESS_FIRST = 0x01;
        const SUPPRESS_SECOND = 0x02;
        const SUPPRESS_THIRD = 0x04;
        const STORAGE_TIME = 0x10;
        const STORAGE_WAKEUP = 0x20;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SubtitleFlags: u8 {
        const HORIZONTAL = 0x01;
    }
}

/// `EFI_IFR_NUMERIC_SIZE` mask and display-format bits for byte-aligned storage.
pub mod numeric {
    pub const SIZE_MASK: u8 = 0x03;
    pub const SIZE_1: u8 = 0x00;
    pub const SIZE_2: u8 = 0x01;
    pub const SIZE_4: u8 = 0x02;
    pub const SIZE_8: u8 = 0x03;

    pub const DISPLAY_MASK: u8 = 0x30;
    pub const DISPLAY_INT_DEC: u8 = 0x00;
    pub const DISPLAY_UINT_DEC: u8 = 0x10;
    pub const DISPLAY_UINT_HEX: u8 = 0x20;

    /// Size flag for a storage width in bytes.
    pub fn size_for_width(width: u8) -> Option<u8> {
        match width {
            1 => Some(SIZE_1),
            2 => Some(SIZE_2),
            4 => Some(SIZE_4),
            8 => Some(SIZE_8),
            _ => None,
        }
    }

    /// Storage width in bytes encoded by `flags`.
    pub fn width_of(flags: u8) -> u8 {
        1 << (flags & SIZE_MASK)
    }
}

/// EDK II bit-field numeric encoding: the low six bits hold the width in bits.
pub mod numeric_bit {
    pub const SIZE_MASK: u8 = 0x3F;
    pub const DISPLAY_MASK: u8 = 0xC0;
    pub const DISPLAY_INT_DEC: u8 = 0x00;
    pub const DISPLAY_UINT_DEC: u8 = 0x40;
    pub const DISPLAY_UINT_HEX: u8 = 0x80;

    /// Translate byte-aligned display bits into the bit-field layout.
    pub fn display_from(flags: u8) -> u8 {
        match flags & super::numeric::DISPLAY_MASK {
            super::numeric::DISPLAY_UINT_DEC => DISPLAY_UINT_DEC,
            super::numeric::DISPLAY_UINT_HEX => DISPLAY_UINT_HEX,
            _ => DISPLAY_INT_DEC,
        }
    }
}

/// `EFI_IFR_TO_STRING`/`EFI_IFR_FIND` format values and `EFI_IFR_SPAN` flags.
pub mod string_ops {
    pub const FIND_SENSITIVE: u8 = 0x00;
    pub const FIND_INSENSITIVE: u8 = 0x01;

    pub const SPAN_LAST_NON_MATCH: u8 = 0x00;
    pub const SPAN_FIRST_NON_MATCH: u8 = 0x01;
}

/// Well-known default store ids.
pub mod default_id {
    pub const STANDARD: u16 = 0x0000;
    pub const MANUFACTURING: u16 = 0x0001;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_size_round_trip() {
        for width in [1u8, 2, 4, 8] {
            let flags = numeric::size_for_width(width).unwrap() | numeric::DISPLAY_UINT_HEX;
            assert_eq!(numeric::width_of(flags), width);
        }
        assert_eq!(numeric::size_for_width(3), None);
    }

    #[test]
    fn test_bit_display_translation() {
        assert_eq!(
            numeric_bit::display_from(numeric::DISPLAY_UINT_HEX | numeric::SIZE_2),
            numeric_bit::DISPLAY_UINT_HEX
        );
        assert_eq!(
            numeric_bit::display_from(numeric::DISPLAY_INT_DEC),
            numeric_bit::DISPLAY_INT_DEC
        );
    }
}
