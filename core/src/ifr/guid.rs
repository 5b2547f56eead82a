//! GUID helpers.
//!
//! IFR stores GUIDs as `EFI_GUID`: the first three fields little-endian, the
//! trailing eight bytes as-is. `Uuid::to_bytes_le` produces exactly that.

use uuid::Uuid;

/// `EFI_HII_PLATFORM_SETUP_FORMSET_GUID`, the class GUID used when a formset
/// names none.
pub const PLATFORM_SETUP_FORMSET: Uuid = Uuid::from_fields(
    0x9303_9971,
    0x8545,
    0x4b04,
    &[0xb4, 0x5e, 0x32, 0xeb, 0x83, 0x26, 0x04, 0x0e],
);

/// `EFI_IFR_TIANO_GUID`, owner of the label/class/subclass extension records.
pub const TIANO_EXTENSION: Uuid = Uuid::from_fields(
    0x0f0b_1735,
    0x87a0,
    0x4193,
    &[0xb2, 0x66, 0x53, 0x8c, 0x38, 0xaf, 0x48, 0xce],
);

/// `EDKII_IFR_BIT_VARSTORE_GUID`, wraps questions stored in bit-fields.
pub const BIT_VARSTORE: Uuid = Uuid::from_fields(
    0x82dd_d68b,
    0x9163,
    0x4187,
    &[0x9b, 0x27, 0x20, 0xa8, 0xfd, 0x60, 0xa7, 0x1d],
);

/// Extension opcodes carried inside a Tiano GUID record.
pub mod tiano {
    pub const LABEL: u8 = 0x00;
    pub const BANNER: u8 = 0x01;
    pub const TIMEOUT: u8 = 0x02;
    pub const CLASS: u8 = 0x03;
    pub const SUBCLASS: u8 = 0x04;
}

/// Build a GUID from the `{d1, d2, d3, {d4 × 8}}` notation.
pub fn from_parts(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Uuid {
    Uuid::from_fields(d1, d2, d3, &d4)
}

/// Append `guid` in `EFI_GUID` byte order.
pub fn write(buf: &mut Vec<u8>, guid: &Uuid) {
    buf.extend_from_slice(&guid.to_bytes_le());
}

/// Read an `EFI_GUID` from the first 16 bytes of `bytes`.
pub fn read(bytes: &[u8]) -> Option<Uuid> {
    let raw: [u8; 16] = bytes.get(..16)?.try_into().ok()?;
    Some(Uuid::from_bytes_le(raw))
}
