//! Symbol tables: type layouts, variable and default stores, questions and
//! rules. Created per compilation and filled during the single pass.

mod error;
mod questions;
mod scalar;
mod stores;
mod types;

#[cfg(test)]
mod table_test;

pub use error::SymbolError;
pub use questions::{Question, QuestionTable, RuleTable};
pub use scalar::Scalar;
pub use stores::{
    Binding, DefaultStore, DefaultStoreDecl, DefaultStoreTable, MANUFACTURING_DEFAULT,
    STANDARD_DEFAULT, StoreId, StoreKind, StoreShape, VarIdPath, VarStore, VarStoreInfo,
    VarStoreTable,
};
pub use types::{
    BitPlacement, BitSlice, DEFAULT_PACK, Field, FieldDecl, FieldLocation, FieldType,
    PathSegment, TypeId, TypeKind, TypeRecord, TypeTable,
};

/// Every table one compilation maintains.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    pub types: TypeTable,
    pub stores: VarStoreTable,
    pub defaults: DefaultStoreTable,
    pub questions: QuestionTable,
    pub rules: RuleTable,
    /// Form ids in declaration order.
    pub forms: Vec<u16>,
}

impl SymbolTable {
    pub fn new(default_pack: u32) -> Self {
        Self {
            types: TypeTable::new(default_pack),
            ..Self::default()
        }
    }

    pub fn resolve_var_id(&self, path: &VarIdPath) -> Result<VarStoreInfo, SymbolError> {
        self.stores.resolve_var_id(&self.types, path)
    }
}
