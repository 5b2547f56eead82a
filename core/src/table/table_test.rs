//! Tests for layout computation and the declaration tables.

use pretty_assertions::assert_eq;
use uuid::Uuid;

use super::*;

fn declare(table: &mut TypeTable, name: &str, fields: &[FieldDecl]) -> TypeId {
    table.declare_type(name, TypeKind::Struct, fields).unwrap()
}

fn offsets(table: &TypeTable, id: TypeId) -> Vec<(String, u32, Option<u32>)> {
    table
        .get(id)
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.offset, f.bits.map(|b| b.bit_offset)))
        .collect()
}

#[test]
fn test_mixed_layout_with_bit_fields() {
    let mut table = TypeTable::default();
    let id = declare(
        &mut table,
        "Mixed",
        &[
            FieldDecl::new("a", "UINT8"),
            FieldDecl::new("b", "UINT32"),
            FieldDecl::new("c", "UINT8").bits(3),
            FieldDecl::new("d", "UINT8").bits(5),
        ],
    );

    assert_eq!(
        offsets(&table, id),
        vec![
            ("a".into(), 0, None),
            ("b".into(), 4, None),
            ("c".into(), 8, Some(0)),
            ("d".into(), 8, Some(3)),
        ]
    );
    assert_eq!(table.get(id).size, 12);
    assert_eq!(table.get(id).align, 4);
}

#[test]
fn test_bit_field_starts_new_unit_when_full() {
    let mut table = TypeTable::default();
    let id = declare(
        &mut table,
        "Bits",
        &[
            FieldDecl::new("a", "UINT8").bits(6),
            FieldDecl::new("b", "UINT8").bits(4),
            FieldDecl::new("c", "UINT16").bits(1),
            FieldDecl::new("d", "UINT16").bits(0),
            FieldDecl::new("e", "UINT16").bits(2),
        ],
    );
    assert_eq!(
        offsets(&table, id),
        vec![
            ("a".into(), 0, Some(0)),
            ("b".into(), 1, Some(0)),
            ("c".into(), 2, Some(0)),
            ("e".into(), 4, Some(0)),
        ]
    );
    assert_eq!(table.get(id).size, 6);
}

#[test]
fn test_bit_field_errors() {
    let mut table = TypeTable::default();
    assert_eq!(
        table.declare_type("Wide", TypeKind::Struct, &[FieldDecl::new("w", "UINT8").bits(9)]),
        Err(SymbolError::BitFieldOverflow {
            field: "w".into(),
            width: 9,
            unit_bits: 8,
        })
    );
    assert_eq!(
        table.declare_type(
            "Flag",
            TypeKind::Struct,
            &[FieldDecl::new("f", "BOOLEAN").bits(1)]
        ),
        Err(SymbolError::InvalidBitField {
            field: "f".into(),
            ty: "BOOLEAN".into(),
        })
    );
}

#[test]
fn test_oversized_record_is_an_overflow() {
    let mut table = TypeTable::default();
    let result = table.declare_type(
        "Huge",
        TypeKind::Struct,
        &[FieldDecl::new("Big", "UINT64").array(0x4000_0000)],
    );
    assert!(matches!(result, Err(SymbolError::Overflow { .. })));

    let result = table.declare_type(
        "Tail",
        TypeKind::Struct,
        &[
            FieldDecl::new("Head", "UINT8").array(u32::MAX),
            FieldDecl::new("Next", "UINT32"),
        ],
    );
    assert!(matches!(result, Err(SymbolError::Overflow { .. })));
    assert_eq!(table.lookup("Huge"), None);
}

#[test]
fn test_pack_caps_alignment() {
    let mut table = TypeTable::default();
    table.push_pack(Some(1)).unwrap();
    let packed = declare(
        &mut table,
        "Packed",
        &[FieldDecl::new("a", "UINT8"), FieldDecl::new("b", "UINT32")],
    );
    table.pop_pack().unwrap();
    let natural = declare(
        &mut table,
        "Natural",
        &[FieldDecl::new("a", "UINT8"), FieldDecl::new("b", "UINT32")],
    );

    assert_eq!(table.get(packed).size, 5);
    assert_eq!(table.get(natural).size, 8);
    assert_eq!(table.pop_pack(), Err(SymbolError::PackStackEmpty));
    assert_eq!(table.set_pack(Some(3)), Err(SymbolError::InvalidPack(3)));
}

#[test]
fn test_union_members_share_offset() {
    let mut table = TypeTable::default();
    let id = table
        .declare_type(
            "Either",
            TypeKind::Union,
            &[
                FieldDecl::new("small", "UINT8"),
                FieldDecl::new("big", "UINT32"),
                FieldDecl::new("text", "CHAR16").array(3),
            ],
        )
        .unwrap();
    let record = table.get(id);
    assert!(record.fields.iter().all(|f| f.offset == 0));
    assert_eq!(record.size, 8);
}

#[test]
fn test_duplicate_declarations() {
    let mut table = TypeTable::default();
    table
        .declare_type("U", TypeKind::Union, &[FieldDecl::new("a", "UINT8")])
        .unwrap();
    assert_eq!(
        table.declare_type("U", TypeKind::Struct, &[]),
        Err(SymbolError::DuplicateType {
            name: "U".into(),
            previous: TypeKind::Union,
        })
    );
    assert_eq!(
        table.declare_type(
            "S",
            TypeKind::Struct,
            &[FieldDecl::new("a", "UINT8"), FieldDecl::new("a", "UINT16")]
        ),
        Err(SymbolError::DuplicateField {
            record: "S".into(),
            field: "a".into(),
        })
    );
    assert_eq!(
        table.declare_type("T", TypeKind::Struct, &[FieldDecl::new("a", "Missing")]),
        Err(SymbolError::UnknownType {
            name: "Missing".into()
        })
    );
}

#[test]
fn test_resolve_nested_path() {
    let mut table = TypeTable::default();
    declare(
        &mut table,
        "Inner",
        &[FieldDecl::new("x", "UINT16"), FieldDecl::new("y", "UINT32")],
    );
    let outer = declare(
        &mut table,
        "Outer",
        &[
            FieldDecl::new("flag", "UINT8"),
            FieldDecl::new("items", "Inner").array(3),
        ],
    );

    let loc = table
        .resolve_field(
            outer,
            &[PathSegment::indexed("items", 2), PathSegment::new("y")],
        )
        .unwrap();
    assert_eq!(loc.offset, 4 + 2 * 8 + 4);
    assert_eq!(loc.width, 4);
    assert_eq!(loc.scalar, Some(Scalar::Uint32));

    let whole = table
        .resolve_field(outer, &[PathSegment::new("items")])
        .unwrap();
    assert_eq!((whole.width, whole.array_len), (24, Some(3)));

    assert_eq!(
        table.resolve_field(outer, &[PathSegment::indexed("items", 3)]),
        Err(SymbolError::IndexOutOfRange {
            field: "items".into(),
            index: 3,
            count: 3,
        })
    );
    assert_eq!(
        table.resolve_field(outer, &[PathSegment::indexed("flag", 1)]),
        Err(SymbolError::IndexOutOfRange {
            field: "flag".into(),
            index: 1,
            count: 1,
        })
    );
    assert!(matches!(
        table.resolve_field(outer, &[PathSegment::new("flag"), PathSegment::new("z")]),
        Err(SymbolError::UnknownField { .. })
    ));
}

#[test]
fn test_bit_slice_is_absolute() {
    let mut table = TypeTable::default();
    let id = declare(
        &mut table,
        "Cfg",
        &[
            FieldDecl::new("head", "UINT16"),
            FieldDecl::new("lo", "UINT8").bits(3),
            FieldDecl::new("hi", "UINT8").bits(4),
        ],
    );
    let loc = table.resolve_field(id, &[PathSegment::new("hi")]).unwrap();
    assert_eq!(loc.bits, Some(BitSlice { offset: 19, width: 4 }));
}

fn symbols_with_store() -> (SymbolTable, StoreId) {
    let mut symbols = SymbolTable::default();
    let ty = symbols
        .types
        .declare_type(
            "MyData",
            TypeKind::Struct,
            &[FieldDecl::new("Flag", "UINT8"), FieldDecl::new("Count", "UINT16")],
        )
        .unwrap();
    let id = symbols
        .stores
        .declare(
            "MyVar",
            None,
            Uuid::nil(),
            StoreKind::Buffer {
                shape: StoreShape::Record(ty),
                size: 4,
            },
        )
        .unwrap();
    (symbols, id)
}

#[test]
fn test_store_ids_and_duplicates() {
    let (mut symbols, id) = symbols_with_store();
    assert_eq!(id, StoreId(1));

    let kind = StoreKind::Efi {
        shape: StoreShape::Scalar(Scalar::Uint8),
        attributes: 7,
        size: 1,
    };
    assert_eq!(
        symbols.stores.declare("Foo", Some(1), Uuid::nil(), kind.clone()),
        Err(SymbolError::DuplicateStoreId { id: 1 })
    );
    assert_eq!(
        symbols.stores.declare("Foo", None, Uuid::nil(), kind.clone()),
        Ok(StoreId(2))
    );
    assert_eq!(
        symbols.stores.declare("Foo", None, Uuid::nil(), kind),
        Err(SymbolError::DuplicateStore { name: "Foo".into() })
    );
}

#[test]
fn test_resolve_var_id() {
    let (mut symbols, id) = symbols_with_store();
    let info = symbols
        .resolve_var_id(&VarIdPath::new("MyVar").field(PathSegment::new("Count")))
        .unwrap();
    assert_eq!(info.store, id);
    assert_eq!(info.header_info(), 2);
    assert_eq!(info.width(), Some(2));

    assert_eq!(
        symbols.resolve_var_id(&VarIdPath::new("Nope")),
        Err(SymbolError::UnknownStore {
            name: "Nope".into()
        })
    );

    symbols
        .stores
        .declare(
            "Nv",
            None,
            Uuid::nil(),
            StoreKind::NameValue {
                names: vec![0x20, 0x21],
            },
        )
        .unwrap();
    let mut path = VarIdPath::new("Nv");
    path.store_index = Some(1);
    assert_eq!(symbols.resolve_var_id(&path).unwrap().header_info(), 0x21);
    path.store_index = Some(2);
    assert!(matches!(
        symbols.resolve_var_id(&path),
        Err(SymbolError::IndexOutOfRange { .. })
    ));
}

#[test]
fn test_bit_offset_past_header_range() {
    let mut symbols = SymbolTable::default();
    let ty = symbols
        .types
        .declare_type(
            "Wide",
            TypeKind::Struct,
            &[
                FieldDecl::new("Pad", "UINT8").array(8192),
                FieldDecl::new("Bits", "UINT8").bits(1),
            ],
        )
        .unwrap();
    symbols
        .stores
        .declare(
            "WideVar",
            None,
            Uuid::nil(),
            StoreKind::Buffer {
                shape: StoreShape::Record(ty),
                size: 8193,
            },
        )
        .unwrap();

    let pad = symbols
        .resolve_var_id(&VarIdPath::new("WideVar").field(PathSegment::new("Pad")))
        .unwrap();
    assert_eq!(pad.header_info(), 0);
    assert!(matches!(
        symbols.resolve_var_id(&VarIdPath::new("WideVar").field(PathSegment::new("Bits"))),
        Err(SymbolError::Overflow { limit: 0xFFFF, .. })
    ));
}

#[test]
fn test_default_stores() {
    let mut defaults = DefaultStoreTable::new();
    assert_eq!(defaults.iter().count(), 2);
    assert_eq!(
        defaults.declare(STANDARD_DEFAULT, 0x10, None),
        Ok(DefaultStoreDecl::Renamed(0))
    );
    assert_eq!(defaults.get(STANDARD_DEFAULT).unwrap().prompt, 0x10);
    assert_eq!(
        defaults.declare("Custom", 0x11, None),
        Ok(DefaultStoreDecl::New(2))
    );
    assert_eq!(
        defaults.declare("Other", 0x12, Some(1)),
        Err(SymbolError::DuplicateDefaultStoreId { id: 1 })
    );
    assert_eq!(
        defaults.declare("Custom", 0x13, None),
        Err(SymbolError::DuplicateDefaultStore {
            name: "Custom".into()
        })
    );
}

#[test]
fn test_question_ids() {
    let mut questions = QuestionTable::new();
    let mut add = |name: &str, explicit: Option<u16>| -> Result<u16, SymbolError> {
        let id = questions.reserve(Some(name), explicit)?;
        questions.insert(Question {
            id,
            name: Some(name.to_string()),
            var_id: None,
            var: None,
            kind: crate::ifr::OpCode::CheckBox,
            form_id: 1,
        });
        Ok(id)
    };
    assert_eq!(add("a", Some(2)), Ok(2));
    assert_eq!(add("b", None), Ok(1));
    assert_eq!(add("c", None), Ok(3));
    assert_eq!(add("d", Some(3)), Err(SymbolError::DuplicateQuestionId { id: 3 }));
    assert_eq!(
        add("a", None),
        Err(SymbolError::DuplicateQuestion { name: "a".into() })
    );
}

#[test]
fn test_rule_ids() {
    let mut rules = RuleTable::new();
    assert_eq!(rules.declare("First"), Ok(0));
    assert_eq!(rules.declare("Second"), Ok(1));
    assert_eq!(rules.get("Second"), Some(1));
    assert_eq!(
        rules.declare("First"),
        Err(SymbolError::DuplicateRule {
            name: "First".into()
        })
    );
}
