use thiserror::Error;

use super::types::TypeKind;

/// Declaration and lookup failures of the symbol tables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("type '{name}' is already declared as a {previous}")]
    DuplicateType { name: String, previous: TypeKind },

    #[error("field '{field}' is declared twice in '{record}'")]
    DuplicateField { record: String, field: String },

    #[error("variable store '{name}' is already declared")]
    DuplicateStore { name: String },

    #[error("variable store id {id} is already in use")]
    DuplicateStoreId { id: u16 },

    #[error("default store '{name}' is already declared")]
    DuplicateDefaultStore { name: String },

    #[error("default store id {id} is already in use")]
    DuplicateDefaultStoreId { id: u16 },

    #[error("question '{name}' is already declared")]
    DuplicateQuestion { name: String },

    #[error("question id {id} is already in use")]
    DuplicateQuestionId { id: u16 },

    #[error("rule '{name}' is already declared")]
    DuplicateRule { name: String },

    #[error("unknown type '{name}'")]
    UnknownType { name: String },

    #[error("'{record}' has no field '{field}'")]
    UnknownField { record: String, field: String },

    #[error("unknown variable store '{name}'")]
    UnknownStore { name: String },

    #[error("unknown default store '{name}'")]
    UnknownDefaultStore { name: String },

    #[error("unknown question '{name}'")]
    UnknownQuestion { name: String },

    #[error("unknown rule '{name}'")]
    UnknownRule { name: String },

    #[error("index {index} is out of range for '{field}' ({count} elements)")]
    IndexOutOfRange {
        field: String,
        index: u32,
        count: u32,
    },

    #[error("bit-field '{field}' is {width} bits wide but its unit holds {unit_bits}")]
    BitFieldOverflow {
        field: String,
        width: u32,
        unit_bits: u32,
    },

    #[error("{what} does not fit in {limit}")]
    Overflow { what: String, limit: u64 },

    #[error("bit-field '{field}' must have an integer type, not '{ty}'")]
    InvalidBitField { field: String, ty: String },

    #[error("invalid pack value {0}, expected 1, 2, 4, 8 or 16")]
    InvalidPack(u64),

    #[error("#pragma pack(pop) without a matching push")]
    PackStackEmpty,
}
