//! Variable stores, default stores and question storage bindings.

use hashbrown::HashMap;
use uuid::Uuid;

use super::error::SymbolError;
use super::scalar::Scalar;
use super::types::{BitSlice, PathSegment, TypeId, TypeTable};
use crate::ifr::DataType;
use crate::ifr::flags::default_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub u16);

/// Layout backing a buffer or EFI-variable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreShape {
    Record(TypeId),
    Scalar(Scalar),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    /// `varstore`: a named buffer.
    Buffer { shape: StoreShape, size: u16 },
    /// `efivarstore`: a UEFI variable.
    Efi {
        shape: StoreShape,
        attributes: u32,
        size: u16,
    },
    /// `namevaluevarstore`: one string key per element.
    NameValue { names: Vec<u16> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarStore {
    pub id: StoreId,
    pub name: String,
    pub guid: Uuid,
    pub kind: StoreKind,
}

/// The part of a store a question reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Field {
        offset: u16,
        width: u32,
        scalar: Option<Scalar>,
        array_len: Option<u32>,
        bits: Option<BitSlice>,
    },
    /// Name/value element, keyed by its name string.
    Name { string_id: u16 },
}

/// Binding of a question (or `get`/`set`) to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarStoreInfo {
    pub store: StoreId,
    pub binding: Binding,
}

impl VarStoreInfo {
    /// Binding to `width` bytes at `offset` of a buffer.
    pub fn buffer(store: StoreId, offset: u16, width: u32) -> Self {
        Self {
            store,
            binding: Binding::Field {
                offset,
                width,
                scalar: None,
                array_len: None,
                bits: None,
            },
        }
    }

    /// Value of the question header's `VarStoreInfo` union: byte offset,
    /// bit offset for bit-fields, or the name string id.
    ///
    /// `resolve_var_id` rejects bit offsets past `u16::MAX`.
    pub fn header_info(&self) -> u16 {
        match &self.binding {
            Binding::Field {
                bits: Some(bits), ..
            } => u16::try_from(bits.offset).unwrap_or(u16::MAX),
            Binding::Field { offset, .. } => *offset,
            Binding::Name { string_id } => *string_id,
        }
    }

    /// Storage width in bytes, unknown for name/value elements.
    pub fn width(&self) -> Option<u32> {
        match &self.binding {
            Binding::Field { width, .. } => Some(*width),
            Binding::Name { .. } => None,
        }
    }

    pub fn bits(&self) -> Option<BitSlice> {
        match &self.binding {
            Binding::Field { bits, .. } => *bits,
            Binding::Name { .. } => None,
        }
    }

    pub fn scalar(&self) -> Option<Scalar> {
        match &self.binding {
            Binding::Field { scalar, .. } => *scalar,
            Binding::Name { .. } => None,
        }
    }

    pub fn array_len(&self) -> Option<u32> {
        match &self.binding {
            Binding::Field { array_len, .. } => *array_len,
            Binding::Name { .. } => None,
        }
    }

    /// Value type read through this binding; unsized bindings default to
    /// `Uint16`.
    pub fn data_type(&self) -> DataType {
        if self.bits().is_some() {
            return DataType::Uint32;
        }
        if let Some(scalar) = self.scalar() {
            return scalar.data_type();
        }
        self.width()
            .and_then(|w| DataType::uint_for_width(w as u8))
            .unwrap_or(DataType::Uint16)
    }
}

/// `varid` text split into the store name and the field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarIdPath {
    pub store: String,
    pub store_index: Option<u32>,
    pub fields: Vec<PathSegment>,
}

impl VarIdPath {
    pub fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            store_index: None,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, segment: PathSegment) -> Self {
        self.fields.push(segment);
        self
    }
}

impl core::fmt::Display for VarIdPath {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.store)?;
        if let Some(index) = self.store_index {
            write!(f, "[{}]", index)?;
        }
        for segment in &self.fields {
            write!(f, ".{}", segment.name)?;
            if let Some(index) = segment.index {
                write!(f, "[{}]", index)?;
            }
        }
        Ok(())
    }
}

/// Stores declared in the current formset.
#[derive(Debug, Clone, Default)]
pub struct VarStoreTable {
    stores: Vec<VarStore>,
    by_name: HashMap<String, usize>,
}

impl VarStoreTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VarStore> {
        self.stores.iter()
    }

    pub fn get(&self, name: &str) -> Option<&VarStore> {
        self.by_name.get(name).map(|&i| &self.stores[i])
    }

    pub fn by_id(&self, id: StoreId) -> Option<&VarStore> {
        self.stores.iter().find(|s| s.id == id)
    }

    fn next_id(&self) -> Result<StoreId, SymbolError> {
        (1..=u16::MAX)
            .map(StoreId)
            .find(|id| self.by_id(*id).is_none())
            .ok_or_else(|| SymbolError::Overflow {
                what: "variable store ids".into(),
                limit: u16::MAX as u64,
            })
    }

    /// Declare a store; `id: None` allocates the lowest free id from 1.
    pub fn declare(
        &mut self,
        name: &str,
        id: Option<u16>,
        guid: Uuid,
        kind: StoreKind,
    ) -> Result<StoreId, SymbolError> {
        if self.by_name.contains_key(name) {
            return Err(SymbolError::DuplicateStore {
                name: name.to_string(),
            });
        }
        let id = match id {
            Some(id) if self.by_id(StoreId(id)).is_some() || id == 0 => {
                return Err(SymbolError::DuplicateStoreId { id });
            }
            Some(id) => StoreId(id),
            None => self.next_id()?,
        };
        tracing::debug!(name, id = id.0, "declared variable store");
        self.by_name.insert(name.to_string(), self.stores.len());
        self.stores.push(VarStore {
            id,
            name: name.to_string(),
            guid,
            kind,
        });
        Ok(id)
    }

    /// Bind `path` to a location inside its store.
    pub fn resolve_var_id(
        &self,
        types: &TypeTable,
        path: &VarIdPath,
    ) -> Result<VarStoreInfo, SymbolError> {
        let store = self.get(&path.store).ok_or_else(|| SymbolError::UnknownStore {
            name: path.store.clone(),
        })?;

        let shape = match &store.kind {
            StoreKind::NameValue { names } => {
                if let Some(first) = path.fields.first() {
                    return Err(SymbolError::UnknownField {
                        record: store.name.clone(),
                        field: first.name.clone(),
                    });
                }
                let index = path.store_index.unwrap_or(0);
                let string_id =
                    names
                        .get(index as usize)
                        .copied()
                        .ok_or_else(|| SymbolError::IndexOutOfRange {
                            field: store.name.clone(),
                            index,
                            count: names.len() as u32,
                        })?;
                return Ok(VarStoreInfo {
                    store: store.id,
                    binding: Binding::Name { string_id },
                });
            }
            StoreKind::Buffer { shape, .. } | StoreKind::Efi { shape, .. } => *shape,
        };

        if let Some(index) = path.store_index.filter(|i| *i != 0) {
            return Err(SymbolError::IndexOutOfRange {
                field: store.name.clone(),
                index,
                count: 1,
            });
        }

        let location = match shape {
            StoreShape::Scalar(scalar) => {
                if let Some(first) = path.fields.first() {
                    return Err(SymbolError::UnknownField {
                        record: store.name.clone(),
                        field: first.name.clone(),
                    });
                }
                return Ok(VarStoreInfo {
                    store: store.id,
                    binding: Binding::Field {
                        offset: 0,
                        width: scalar.size(),
                        scalar: Some(scalar),
                        array_len: None,
                        bits: None,
                    },
                });
            }
            StoreShape::Record(ty) => types.resolve_field(ty, &path.fields)?,
        };

        let offset = u16::try_from(location.offset).map_err(|_| SymbolError::Overflow {
            what: format!("offset of '{}'", path),
            limit: u16::MAX as u64,
        })?;
        if let Some(bits) = location.bits {
            u16::try_from(bits.offset).map_err(|_| SymbolError::Overflow {
                what: format!("bit offset of '{}'", path),
                limit: u16::MAX as u64,
            })?;
        }
        Ok(VarStoreInfo {
            store: store.id,
            binding: Binding::Field {
                offset,
                width: location.width,
                scalar: location.scalar,
                array_len: location.array_len,
                bits: location.bits,
            },
        })
    }
}

pub const STANDARD_DEFAULT: &str = "StandardDefault";
pub const MANUFACTURING_DEFAULT: &str = "ManufacturingDefault";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultStore {
    pub name: String,
    pub id: u16,
    pub prompt: u16,
    /// Created without a `defaultstore` statement.
    pub implicit: bool,
}

/// Default stores; the standard and manufacturing stores always exist.
#[derive(Debug, Clone)]
pub struct DefaultStoreTable {
    stores: Vec<DefaultStore>,
}

impl Default for DefaultStoreTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a `defaultstore` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultStoreDecl {
    New(u16),
    /// Named an implicit store, whose prompt was replaced.
    Renamed(u16),
}

impl DefaultStoreTable {
    pub fn new() -> Self {
        let implicit = |name: &str, id| DefaultStore {
            name: name.to_string(),
            id,
            prompt: 0,
            implicit: true,
        };
        Self {
            stores: vec![
                implicit(STANDARD_DEFAULT, default_id::STANDARD),
                implicit(MANUFACTURING_DEFAULT, default_id::MANUFACTURING),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DefaultStore> {
        self.stores.iter()
    }

    pub fn get(&self, name: &str) -> Option<&DefaultStore> {
        self.stores.iter().find(|s| s.name == name)
    }

    pub fn by_id(&self, id: u16) -> Option<&DefaultStore> {
        self.stores.iter().find(|s| s.id == id)
    }

    pub fn declare(
        &mut self,
        name: &str,
        prompt: u16,
        id: Option<u16>,
    ) -> Result<DefaultStoreDecl, SymbolError> {
        if let Some(existing) = self.stores.iter_mut().find(|s| s.name == name) {
            let same_id = id.is_none_or(|id| id == existing.id);
            if !existing.implicit || !same_id {
                return Err(SymbolError::DuplicateDefaultStore {
                    name: name.to_string(),
                });
            }
            existing.prompt = prompt;
            existing.implicit = false;
            return Ok(DefaultStoreDecl::Renamed(existing.id));
        }

        let id = match id {
            Some(id) if self.by_id(id).is_some() => {
                return Err(SymbolError::DuplicateDefaultStoreId { id });
            }
            Some(id) => id,
            None => (2..=u16::MAX)
                .find(|id| self.by_id(*id).is_none())
                .ok_or_else(|| SymbolError::Overflow {
                    what: "default store ids".into(),
                    limit: u16::MAX as u64,
                })?,
        };
        tracing::debug!(name, id, "declared default store");
        self.stores.push(DefaultStore {
            name: name.to_string(),
            id,
            prompt,
            implicit: false,
        });
        Ok(DefaultStoreDecl::New(id))
    }
}
