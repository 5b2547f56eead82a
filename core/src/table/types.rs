//! Struct and union layouts.
//!
//! Layout follows the C rules the firmware headers are compiled with:
//! declaration order, natural alignment capped by the active pack value,
//! bit-fields packed from the least significant bit within a unit of their
//! declared type.

use core::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;

use super::error::SymbolError;
use super::scalar::Scalar;

pub const DEFAULT_PACK: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Struct,
    Union,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Struct => f.write_str("struct"),
            TypeKind::Union => f.write_str("union"),
        }
    }
}

/// A member as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub type_name: String,
    pub array_len: Option<u32>,
    pub bit_width: Option<u32>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            array_len: None,
            bit_width: None,
        }
    }

    pub fn array(mut self, len: u32) -> Self {
        self.array_len = Some(len);
        self
    }

    pub fn bits(mut self, width: u32) -> Self {
        self.bit_width = Some(width);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Scalar(Scalar),
    Record(TypeId),
}

/// Position of a bit-field inside its storage unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitPlacement {
    pub bit_offset: u32,
    pub width: u32,
}

/// A member with its computed layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
    /// Byte offset from the start of the enclosing record.
    pub offset: u32,
    /// Size of one element (the unit size for bit-fields).
    pub elem_size: u32,
    pub array_len: Option<u32>,
    pub bits: Option<BitPlacement>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRecord {
    pub name: String,
    pub kind: TypeKind,
    pub fields: Vec<Field>,
    pub size: u32,
    pub align: u32,
}

impl TypeRecord {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One `.name[index]` step of a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    pub name: String,
    pub index: Option<u32>,
}

impl PathSegment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    pub fn indexed(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
        }
    }
}

/// Absolute bit slice of a bit-field, counted from the start of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitSlice {
    pub offset: u32,
    pub width: u32,
}

/// Where a field path lands inside a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLocation {
    pub offset: u32,
    pub width: u32,
    /// Leaf scalar type; `None` when the path names a struct or union.
    pub scalar: Option<Scalar>,
    /// Element count when the path names a whole array.
    pub array_len: Option<u32>,
    pub bits: Option<BitSlice>,
}

struct OpenUnit {
    offset: u32,
    size: u32,
    used_bits: u32,
}

/// Every declared struct and union plus the `#pragma pack` state.
#[derive(Debug, Clone)]
pub struct TypeTable {
    records: Vec<TypeRecord>,
    by_name: HashMap<String, TypeId>,
    pack: u32,
    pack_stack: SmallVec<[u32; 4]>,
    default_pack: u32,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new(DEFAULT_PACK)
    }
}

impl TypeTable {
    pub fn new(default_pack: u32) -> Self {
        Self {
            records: Vec::new(),
            by_name: HashMap::new(),
            pack: default_pack,
            pack_stack: SmallVec::new(),
            default_pack,
        }
    }

    pub fn pack(&self) -> u32 {
        self.pack
    }

    /// `#pragma pack(N)`; `None` restores the default.
    pub fn set_pack(&mut self, value: Option<u64>) -> Result<(), SymbolError> {
        self.pack = match value {
            Some(v) => check_pack(v)?,
            None => self.default_pack,
        };
        Ok(())
    }

    /// `#pragma pack(push [, N])`.
    pub fn push_pack(&mut self, value: Option<u64>) -> Result<(), SymbolError> {
        let next = match value {
            Some(v) => check_pack(v)?,
            None => self.pack,
        };
        self.pack_stack.push(self.pack);
        self.pack = next;
        Ok(())
    }

    /// `#pragma pack(pop)`.
    pub fn pop_pack(&mut self) -> Result<(), SymbolError> {
        self.pack = self.pack_stack.pop().ok_or(SymbolError::PackStackEmpty)?;
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TypeId) -> &TypeRecord {
        &self.records[id.0 as usize]
    }

    pub fn records(&self) -> impl Iterator<Item = &TypeRecord> {
        self.records.iter()
    }

    /// Resolve a member type name to a scalar or a declared record.
    pub fn field_type(&self, name: &str) -> Result<FieldType, SymbolError> {
        if let Some(scalar) = Scalar::from_name(name) {
            return Ok(FieldType::Scalar(scalar));
        }
        self.lookup(name)
            .map(FieldType::Record)
            .ok_or_else(|| SymbolError::UnknownType {
                name: name.to_string(),
            })
    }

    /// Size and natural alignment of a member type.
    pub fn size_align(&self, ty: FieldType) -> (u32, u32) {
        match ty {
            FieldType::Scalar(s) => (s.size(), s.align()),
            FieldType::Record(id) => {
                let record = self.get(id);
                (record.size, record.align)
            }
        }
    }

    /// Declare a struct or union and compute its layout.
    pub fn declare_type(
        &mut self,
        name: &str,
        kind: TypeKind,
        decls: &[FieldDecl],
    ) -> Result<TypeId, SymbolError> {
        if let Some(previous) = self.lookup(name) {
            return Err(SymbolError::DuplicateType {
                name: name.to_string(),
                previous: self.get(previous).kind,
            });
        }

        let mut fields: Vec<Field> = Vec::with_capacity(decls.len());
        let mut offset = 0u32;
        let mut max_align = 1u32;
        let mut size = 0u32;
        let mut unit: Option<OpenUnit> = None;

        for decl in decls {
            if fields.iter().any(|f| f.name == decl.name) {
                return Err(SymbolError::DuplicateField {
                    record: name.to_string(),
                    field: decl.name.clone(),
                });
            }
            let ty = self.field_type(&decl.type_name)?;
            let (elem_size, natural_align) = self.size_align(ty);
            let align = natural_align.min(self.pack).max(1);
            max_align = max_align.max(align);

            let (field_offset, bits) = match decl.bit_width {
                Some(width) => {
                    let unit_bits = match ty {
                        FieldType::Scalar(s) if s.is_bit_field_unit() => s.size() * 8,
                        _ => {
                            return Err(SymbolError::InvalidBitField {
                                field: decl.name.clone(),
                                ty: decl.type_name.clone(),
                            });
                        }
                    };
                    if width > unit_bits {
                        return Err(SymbolError::BitFieldOverflow {
                            field: decl.name.clone(),
                            width,
                            unit_bits,
                        });
                    }
                    if kind == TypeKind::Union {
                        (0, Some(BitPlacement { bit_offset: 0, width }))
                    } else if width == 0 {
                        unit = None;
                        continue;
                    } else {
                        let current = match unit.take() {
                            Some(open)
                                if open.size == elem_size
                                    && open.used_bits + width <= unit_bits =>
                            {
                                open
                            }
                            _ => {
                                let start = align_up(offset, align)
                                    .ok_or_else(|| too_large(name))?;
                                offset = start
                                    .checked_add(elem_size)
                                    .ok_or_else(|| too_large(name))?;
                                OpenUnit {
                                    offset: start,
                                    size: elem_size,
                                    used_bits: 0,
                                }
                            }
                        };
                        let placement = BitPlacement {
                            bit_offset: current.used_bits,
                            width,
                        };
                        let field_offset = current.offset;
                        unit = Some(OpenUnit {
                            used_bits: current.used_bits + width,
                            ..current
                        });
                        (field_offset, Some(placement))
                    }
                }
                None => {
                    unit = None;
                    let total = elem_size
                        .checked_mul(decl.array_len.unwrap_or(1))
                        .ok_or_else(|| too_large(name))?;
                    if kind == TypeKind::Union {
                        size = size.max(total);
                        (0, None)
                    } else {
                        let start = align_up(offset, align).ok_or_else(|| too_large(name))?;
                        offset = start.checked_add(total).ok_or_else(|| too_large(name))?;
                        (start, None)
                    }
                }
            };
            if kind == TypeKind::Union && bits.is_some() {
                size = size.max(elem_size);
            }

            fields.push(Field {
                name: decl.name.clone(),
                ty,
                offset: field_offset,
                elem_size,
                array_len: decl.array_len,
                bits,
            });
        }

        if kind == TypeKind::Struct {
            size = offset;
        }
        let size = align_up(size, max_align).ok_or_else(|| too_large(name))?;

        let id = TypeId(self.records.len() as u32);
        tracing::debug!(name, %kind, size, align = max_align, "declared type");
        self.records.push(TypeRecord {
            name: name.to_string(),
            kind,
            fields,
            size,
            align: max_align,
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Walk `A.B[2].C` from `root`, accumulating offsets.
    pub fn resolve_field(
        &self,
        root: TypeId,
        path: &[PathSegment],
    ) -> Result<FieldLocation, SymbolError> {
        let mut record = self.get(root);
        let mut base = 0u32;

        for (i, segment) in path.iter().enumerate() {
            let field = record
                .field(&segment.name)
                .ok_or_else(|| SymbolError::UnknownField {
                    record: record.name.clone(),
                    field: segment.name.clone(),
                })?;

            let count = field.array_len.unwrap_or(1);
            if let Some(index) = segment.index {
                if index >= count {
                    return Err(SymbolError::IndexOutOfRange {
                        field: segment.name.clone(),
                        index,
                        count,
                    });
                }
                base += index * field.elem_size;
            }
            base += field.offset;

            let is_last = i + 1 == path.len();
            match (field.ty, is_last) {
                (FieldType::Record(id), false) => record = self.get(id),
                (FieldType::Scalar(_), false) => {
                    return Err(SymbolError::UnknownField {
                        record: segment.name.clone(),
                        field: path[i + 1].name.clone(),
                    });
                }
                (ty, true) => {
                    let whole_array = segment.index.is_none() && field.array_len.is_some();
                    let width = if whole_array {
                        field.elem_size * count
                    } else {
                        field.elem_size
                    };
                    return Ok(FieldLocation {
                        offset: base,
                        width,
                        scalar: match ty {
                            FieldType::Scalar(s) => Some(s),
                            FieldType::Record(_) => None,
                        },
                        array_len: whole_array.then_some(count),
                        bits: match field.bits {
                            Some(b) => Some(BitSlice {
                                offset: base
                                    .checked_mul(8)
                                    .and_then(|bits| bits.checked_add(b.bit_offset))
                                    .ok_or_else(|| SymbolError::Overflow {
                                        what: format!("bit offset of '{}'", segment.name),
                                        limit: u64::from(u32::MAX),
                                    })?,
                                width: b.width,
                            }),
                            None => None,
                        },
                    });
                }
            }
        }

        Ok(FieldLocation {
            offset: 0,
            width: record.size,
            scalar: None,
            array_len: None,
            bits: None,
        })
    }
}

fn check_pack(value: u64) -> Result<u32, SymbolError> {
    match value {
        1 | 2 | 4 | 8 | 16 => Ok(value as u32),
        _ => Err(SymbolError::InvalidPack(value)),
    }
}

fn align_up(value: u32, align: u32) -> Option<u32> {
    value.div_ceil(align).checked_mul(align)
}

fn too_large(record: &str) -> SymbolError {
    SymbolError::Overflow {
        what: format!("size of '{}'", record),
        limit: u64::from(u32::MAX),
    }
}
