use pretty_assertions::assert_eq;
use uuid::Uuid;

use super::*;
use crate::ifr::{DataType, Expression, OpCode};
use crate::lexer::tokenize;
use crate::strings::SequentialStrings;
use crate::table::{FieldDecl, Question, StoreKind, StoreShape, TypeKind};

fn context(strings: &SequentialStrings) -> CompileContext<'_> {
    let mut ctx = CompileContext::new(strings, CompileOptions::default());
    ctx.symbols.questions.insert(Question {
        id: 7,
        name: Some("Q".to_string()),
        var_id: Some("Cfg.a".to_string()),
        var: None,
        kind: OpCode::Numeric,
        form_id: 1,
    });
    ctx.symbols.rules.declare("Always").unwrap();

    let ty = ctx
        .symbols
        .types
        .declare_type(
            "Config",
            TypeKind::Struct,
            &[FieldDecl::new("a", "UINT8"), FieldDecl::new("b", "UINT16")],
        )
        .unwrap();
    ctx.symbols
        .stores
        .declare(
            "Cfg",
            None,
            Uuid::nil(),
            StoreKind::Buffer {
                shape: StoreShape::Record(ty),
                size: 4,
            },
        )
        .unwrap();
    ctx
}

fn lower_with(ctx: &CompileContext<'_>, source: &str) -> Result<Expression, CompileError> {
    let tokens = tokenize(source).unwrap();
    let mut cursor = Cursor::new(&tokens);
    compile_expression(&mut cursor, ctx)
}

fn lower(source: &str) -> Result<Expression, CompileError> {
    let strings = SequentialStrings::new();
    let ctx = context(&strings);
    lower_with(&ctx, source)
}

fn opcodes(source: &str) -> Vec<OpCode> {
    lower(source).unwrap().opcodes()
}

fn ops(source: &str) -> Vec<Op> {
    lower(source)
        .unwrap()
        .into_nodes()
        .into_iter()
        .map(|n| n.op)
        .collect()
}

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    use OpCode::*;
    assert_eq!(opcodes("1 + 2 * 3"), vec![Uint8, Uint8, Uint8, Multiply, Add]);
    assert_eq!(opcodes("(1 + 2) * 3"), vec![Uint8, Uint8, Add, Uint8, Multiply]);
}

#[test]
fn test_logical_levels() {
    use OpCode::*;
    assert_eq!(
        opcodes("1 OR 2 AND 3 == 4"),
        vec![Uint8, Uint8, Uint8, Uint8, Equal, And, Or]
    );
    assert_eq!(opcodes("NOT TRUE AND FALSE"), vec![True, Not, False, And]);
    assert_eq!(opcodes("1 | 2 & 3"), vec![Uint8, Uint8, Uint8, BitwiseAnd, BitwiseOr]);
}

#[test]
fn test_operators_are_left_associative() {
    use OpCode::*;
    assert_eq!(opcodes("8 - 4 - 2"), vec![Uint8, Uint8, Subtract, Uint8, Subtract]);
    assert_eq!(opcodes("1 << 2 >> 1"), vec![Uint8, Uint8, ShiftLeft, Uint8, ShiftRight]);
}

#[test]
fn test_stacked_casts_apply_innermost_first() {
    use OpCode::*;
    assert_eq!(opcodes("(UINT8)(BOOLEAN) 5"), vec![Uint8, ToBoolean, ToUint]);
    assert_eq!(opcodes("(UINT16) 1 + 2"), vec![Uint8, ToUint, Uint8, Add]);
}

#[test]
fn test_constants_use_smallest_width() {
    assert_eq!(ops("255"), vec![Op::Uint8(255)]);
    assert_eq!(ops("0x100"), vec![Op::Uint16(0x100)]);
    assert_eq!(ops("0x10000"), vec![Op::Uint32(0x10000)]);
    assert_eq!(ops("0x100000000"), vec![Op::Uint64(0x1_0000_0000)]);
    assert_eq!(ops("ONES"), vec![Op::Ones]);
}

#[test]
fn test_ideqval_lowers_to_question_ref() {
    assert_eq!(
        ops("ideqval Q == 5"),
        vec![Op::QuestionRef1 { question_id: 7 }, Op::Uint8(5), Op::Equal]
    );
    assert_eq!(
        ops("ideqval Cfg.a >= 0x200"),
        vec![
            Op::QuestionRef1 { question_id: 7 },
            Op::Uint16(0x200),
            Op::GreaterEqual
        ]
    );
}

#[test]
fn test_ideqid_and_ideqvallist() {
    use OpCode::*;
    assert_eq!(opcodes("ideqid Q != Q"), vec![QuestionRef1, QuestionRef1, NotEqual]);
    assert_eq!(
        opcodes("ideqvallist Q == 1 2 3"),
        vec![
            QuestionRef1, Uint8, Equal, QuestionRef1, Uint8, Equal, Or, QuestionRef1, Uint8, Equal,
            Or
        ]
    );
}

#[test]
fn test_cond_emits_condition_then_branches() {
    use OpCode::*;
    assert_eq!(
        opcodes("cond(TRUE ? 1 : 2)"),
        vec![True, Uint8, Uint8, Conditional]
    );
}

#[test]
fn test_map_scopes_its_pairs() {
    let expr = lower("map(1 : 1, 10; 2, 20;)").unwrap();
    assert_eq!(expr.nodes().len(), 2);
    assert!(expr.nodes()[1].scope);
    assert_eq!(expr.nodes()[1].children.len(), 4);
    assert_eq!(
        expr.opcodes(),
        vec![
            OpCode::Uint8,
            OpCode::Map,
            OpCode::Uint8,
            OpCode::Uint8,
            OpCode::Uint8,
            OpCode::Uint8
        ]
    );
}

#[test]
fn test_string_builtins() {
    use OpCode::*;
    assert_eq!(
        opcodes("catenate(stringref(STR_A), stringref(STRING_TOKEN(STR_B)))"),
        vec![StringRef1, StringRef1, Catenate]
    );
    assert_eq!(
        opcodes("mid(stringref(STR_A), 1, 2)"),
        vec![StringRef1, Uint8, Uint8, Mid]
    );
    assert_eq!(
        ops("find(INSENSITIVE, stringref(1), stringref(2), 0)").last(),
        Some(&Op::Find { format: 1 })
    );
    assert_eq!(
        ops("span(flags = FIRST_NON_MATCH, stringref(1), stringref(2), 0)").last(),
        Some(&Op::Span { flags: 1 })
    );
    assert_eq!(
        ops("stringval(format = 2, 5)").last(),
        Some(&Op::ToString { format: 2 })
    );
}

#[test]
fn test_rule_and_question_refs() {
    assert_eq!(ops("ruleref(Always)"), vec![Op::RuleRef { rule_id: 0 }]);
    assert_eq!(
        ops("questionref(Q)"),
        vec![Op::QuestionRef1 { question_id: 7 }]
    );
    assert_eq!(
        ops("questionrefval(devicepath = STR_PATH, 3)").last(),
        Some(&Op::QuestionRef3 {
            device_path: Some(1),
            guid: None
        })
    );
}

#[test]
fn test_get_reads_field_width() {
    let expr = lower("get(Cfg.b)").unwrap();
    match &expr.nodes()[0].op {
        Op::Get { var, data_type } => {
            assert_eq!(var.header_info(), 2);
            assert_eq!(*data_type, DataType::Uint16);
        }
        other => panic!("expected Get, got {:?}", other),
    }
    assert_eq!(
        opcodes("set(Cfg.a, 1 + 1)"),
        vec![OpCode::Uint8, OpCode::Uint8, OpCode::Add, OpCode::Set]
    );
}

#[test]
fn test_get_size_flag_must_match_storage() {
    let err = lower("get(Cfg.b | flags = NUMERIC_SIZE_1)").unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::InvalidValue);
    assert!(lower("get(Cfg.b | flags = NUMERIC_SIZE_2)").is_ok());
}

#[test]
fn test_unknown_symbols() {
    assert_eq!(
        lower("ideqval Missing == 1").unwrap_err().kind,
        CompileErrorKind::UnknownQuestion
    );
    assert_eq!(
        lower("ruleref(Never)").unwrap_err().kind,
        CompileErrorKind::UnknownRule
    );
    assert_eq!(
        lower("get(Nowhere.a)").unwrap_err().kind,
        CompileErrorKind::UnknownStore
    );
    assert_eq!(
        lower("get(Cfg.zz)").unwrap_err().kind,
        CompileErrorKind::UnknownField
    );
}

#[test]
fn test_malformed_calls_are_syntax_errors() {
    let err = lower("length(1, 2)").unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::Syntax);
    assert_eq!(err.line, 1);
    assert_eq!(lower("cond(TRUE ? 1)").unwrap_err().kind, CompileErrorKind::Syntax);
    assert_eq!(lower("1 +").unwrap_err().kind, CompileErrorKind::Syntax);
}

#[test]
fn test_depth_limit() {
    let strings = SequentialStrings::new();
    let mut ctx = context(&strings);
    ctx.options.max_expression_depth = 3;
    assert!(lower_with(&ctx, "((1))").is_ok());
    let err = lower_with(&ctx, "((((1))))").unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::Overflow);
}

#[test]
fn test_stops_before_terminator() {
    let strings = SequentialStrings::new();
    let ctx = context(&strings);
    let tokens = tokenize("1 + 2; text").unwrap();
    let mut cursor = Cursor::new(&tokens);
    compile_expression(&mut cursor, &ctx).unwrap();
    assert_eq!(cursor.peek().map(|t| t.kind), Some(TokenKind::Semi));
}
