use pretty_assertions::assert_eq;

use super::*;
use crate::api::CompileOptions;
use crate::compiler::{CompileContext, Cursor, compile_expression};
use crate::ifr::{DataType, Expression, Op, OpCode, OpcodeNode};
use crate::lexer::tokenize;
use crate::strings::SequentialStrings;
use crate::table::{Question, StoreId, VarStoreInfo};

fn lower(source: &str) -> Expression {
    let strings = SequentialStrings::new();
    let mut ctx = CompileContext::new(&strings, CompileOptions::default());
    ctx.symbols.questions.insert(Question {
        id: 7,
        name: Some("Q".to_string()),
        var_id: None,
        var: None,
        kind: OpCode::Numeric,
        form_id: 1,
    });
    ctx.symbols.rules.declare("Double").unwrap();
    let tokens = tokenize(source).unwrap();
    let mut cursor = Cursor::new(&tokens);
    compile_expression(&mut cursor, &ctx).unwrap()
}

fn environment() -> MapEnvironment {
    MapEnvironment::new()
        .with_question(7, Value::uint(5, 2))
        .with_string(1, "Hello")
        .with_string(2, "World")
        .with_string(3, "LL")
        .with_string(4, "a,b;c")
        .with_string(5, ",;")
        .with_string(6, "az")
        .with_string(7, "12ab")
        .with_string(8, "H*o")
        .with_string(9, "H?llo")
        .with_string(10, "x*")
        .with_string(11, "TRUE")
        .with_string(12, "0x1F")
}

fn eval(source: &str) -> Result<Value, VmError> {
    eval_in(&mut environment(), source)
}

fn eval_in(env: &mut MapEnvironment, source: &str) -> Result<Value, VmError> {
    evaluate(lower(source).nodes(), env)
}

fn leaves(ops: Vec<Op>) -> Vec<OpcodeNode> {
    ops.into_iter().map(|op| OpcodeNode::leaf(op, 1)).collect()
}

#[test]
fn test_constants_keep_their_width() {
    assert_eq!(eval("255"), Ok(Value::uint(255, 1)));
    assert_eq!(eval("0x100"), Ok(Value::uint(0x100, 2)));
    assert_eq!(eval("ZERO"), Ok(Value::uint(0, 1)));
    assert_eq!(eval("ONES"), Ok(Value::uint(u64::MAX, 8)));
    assert_eq!(eval("TRUE"), Ok(Value::Bool(true)));
}

#[test]
fn test_arithmetic_follows_precedence() {
    assert_eq!(eval("1 + 2 * 3"), Ok(Value::uint(7, 8)));
    assert_eq!(eval("(1 + 2) * 3"), Ok(Value::uint(9, 8)));
    assert_eq!(eval("8 - 4 - 2"), Ok(Value::uint(2, 8)));
    assert_eq!(eval("7 / 2"), Ok(Value::uint(3, 8)));
    assert_eq!(eval("7 % 2"), Ok(Value::uint(1, 8)));
    assert_eq!(eval("1 << 2 >> 1"), Ok(Value::uint(2, 8)));
    assert_eq!(eval("1 | 2 & 3"), Ok(Value::uint(3, 8)));
}

#[test]
fn test_integer_results_are_64_bit() {
    assert_eq!(eval("0xFF + 1"), Ok(Value::uint(0x100, 8)));
    assert_eq!(eval("0 - 1"), Ok(Value::uint(u64::MAX, 8)));
    assert_eq!(eval("~0"), Ok(Value::uint(u64::MAX, 8)));
}

#[test]
fn test_division_by_zero() {
    assert_eq!(eval("1 / 0"), Err(VmError::DivisionByZero));
    assert_eq!(eval("1 % ZERO"), Err(VmError::DivisionByZero));
}

#[test]
fn test_logic_and_comparisons() {
    assert_eq!(eval("TRUE OR FALSE AND 3 == 4"), Ok(Value::Bool(true)));
    assert_eq!(eval("NOT TRUE AND FALSE"), Ok(Value::Bool(false)));
    assert_eq!(eval("2 > 1 AND 1 <= 1"), Ok(Value::Bool(true)));
    assert_eq!(eval("0x100 != 256"), Ok(Value::Bool(false)));
    assert_eq!(eval("TRUE == TRUE"), Ok(Value::Bool(true)));
}

#[test]
fn test_type_mismatches() {
    assert_eq!(
        eval("1 AND TRUE"),
        Err(VmError::TypeMismatch {
            opcode: OpCode::And,
            expected: "boolean",
            found: "integer",
        })
    );
    assert_eq!(
        eval("TRUE + 1"),
        Err(VmError::TypeMismatch {
            opcode: OpCode::Add,
            expected: "integer",
            found: "boolean",
        })
    );
    assert_eq!(
        eval("TRUE < FALSE"),
        Err(VmError::TypeMismatch {
            opcode: OpCode::LessThan,
            expected: "boolean",
            found: "boolean",
        })
    );
    assert!(matches!(
        eval("length(5)"),
        Err(VmError::TypeMismatch {
            opcode: OpCode::Length,
            ..
        })
    ));
}

#[test]
fn test_undefined_propagates() {
    assert_eq!(eval("UNDEFINED + 1"), Ok(Value::Undefined));
    assert_eq!(eval("NOT UNDEFINED"), Ok(Value::Undefined));
    assert_eq!(eval("cond(UNDEFINED ? 1 : 2)"), Ok(Value::Undefined));
    assert_eq!(eval("cond(TRUE ? 1 : UNDEFINED)"), Ok(Value::uint(1, 1)));
}

#[test]
fn test_conditional_picks_branch() {
    assert_eq!(eval("cond(1 == 1 ? 10 : 20)"), Ok(Value::uint(10, 1)));
    assert_eq!(eval("cond(1 == 2 ? 10 : 0x1234)"), Ok(Value::uint(0x1234, 2)));
}

#[test]
fn test_map_looks_up_pairs() {
    assert_eq!(eval("map(2 : 1, 10; 2, 20;)"), Ok(Value::uint(20, 1)));
    assert_eq!(eval("map(0x102 - 0x100 : 1, 10; 2, 20;)"), Ok(Value::uint(20, 1)));
    assert_eq!(eval("map(3 : 1, 10; 2, 20;)"), Ok(Value::Undefined));

    let mut map = OpcodeNode::scoped(Op::Map, 1);
    map.children = leaves(vec![Op::Uint8(1), Op::Uint8(2), Op::Uint8(3)]);
    let nodes = vec![OpcodeNode::leaf(Op::Uint8(1), 1), map];
    assert_eq!(evaluate(&nodes, &mut ()), Err(VmError::MalformedMap(3)));
}

#[test]
fn test_question_references() {
    assert_eq!(eval("ideqval Q == 5"), Ok(Value::Bool(true)));
    assert_eq!(eval("ideqvallist Q == 1 2 5"), Ok(Value::Bool(true)));
    assert_eq!(eval("questionref(Q) + 1"), Ok(Value::uint(6, 8)));
    assert_eq!(eval("questionrefval(7)"), Ok(Value::uint(5, 2)));
    assert_eq!(
        eval("questionrefval(devicepath = STR_PATH, 7)"),
        Ok(Value::Undefined)
    );
    assert_eq!(eval("questionrefval(8)"), Ok(Value::Undefined));
}

#[test]
fn test_this_reads_current_question() {
    let mut env = environment();
    env.this = Some(Value::uint(9, 1));
    assert_eq!(eval_in(&mut env, "pushthis == 9"), Ok(Value::Bool(true)));
    assert_eq!(eval("pushthis"), Ok(Value::Undefined));
}

#[test]
fn test_string_functions() {
    assert_eq!(
        eval("catenate(stringref(1), stringref(2))"),
        Ok(Value::string("HelloWorld"))
    );
    assert_eq!(eval("length(stringref(1))"), Ok(Value::uint(5, 8)));
    assert_eq!(eval("toupper(stringref(1))"), Ok(Value::string("HELLO")));
    assert_eq!(eval("tolower(stringref(1))"), Ok(Value::string("hello")));
    assert_eq!(eval("mid(stringref(1), 1, 3)"), Ok(Value::string("ell")));
    assert_eq!(eval("mid(stringref(1), 4, 10)"), Ok(Value::string("o")));
    assert_eq!(eval("stringrefval(2)"), Ok(Value::string("World")));
    assert_eq!(eval("stringref(99)"), Ok(Value::Undefined));
}

#[test]
fn test_find_and_token() {
    assert_eq!(
        eval("find(INSENSITIVE, stringref(1), stringref(3), 0)"),
        Ok(Value::uint(2, 8))
    );
    assert_eq!(
        eval("find(SENSITIVE, stringref(1), stringref(3), 0)"),
        Ok(Value::uint(NOT_FOUND, 8))
    );
    assert_eq!(
        eval("find(INSENSITIVE, stringref(1), stringref(3), 3)"),
        Ok(Value::uint(NOT_FOUND, 8))
    );
    assert_eq!(
        eval("tok(stringref(4), stringref(5), 2)"),
        Ok(Value::string("c"))
    );
    assert_eq!(
        eval("tok(stringref(4), stringref(5), 5)"),
        Ok(Value::string(""))
    );
}

#[test]
fn test_span() {
    assert_eq!(
        eval("span(flags = FIRST_NON_MATCH, stringref(7), stringref(6), 0)"),
        Ok(Value::uint(0, 8))
    );
    assert_eq!(
        eval("span(flags = LAST_NON_MATCH, stringref(7), stringref(6), 0)"),
        Ok(Value::uint(2, 8))
    );
    assert_eq!(
        eval("span(flags = FIRST_NON_MATCH, stringref(6), stringref(6), 0)"),
        Ok(Value::uint(NOT_FOUND, 8))
    );
}

#[test]
fn test_match_wildcards() {
    assert_eq!(eval("match(stringref(1), stringref(8))"), Ok(Value::Bool(true)));
    assert_eq!(eval("match(stringref(1), stringref(9))"), Ok(Value::Bool(true)));
    assert_eq!(eval("match(stringref(1), stringref(10))"), Ok(Value::Bool(false)));
    assert_eq!(eval("match(stringref(2), stringref(8))"), Ok(Value::Bool(false)));
}

#[test]
fn test_conversions() {
    assert_eq!(eval("stringval(255)"), Ok(Value::string("255")));
    assert_eq!(eval("stringval(format = 1, 255)"), Ok(Value::string("-1")));
    assert_eq!(eval("stringval(format = 2, 255)"), Ok(Value::string("ff")));
    assert_eq!(eval("stringval(format = 3, 255)"), Ok(Value::string("FF")));
    assert_eq!(eval("(BOOLEAN) 5"), Ok(Value::Bool(true)));
    assert_eq!(eval("(UINT8) TRUE"), Ok(Value::uint(1, 1)));
    assert_eq!(eval("boolval(stringref(11))"), Ok(Value::Bool(true)));
    assert_eq!(eval("boolval(stringref(1))"), Ok(Value::Undefined));
    assert_eq!(eval("unintval(stringref(12))"), Ok(Value::uint(31, 8)));
}

#[test]
fn test_rules_run_from_environment() {
    let mut env = environment().with_rule(0, lower("questionref(Q) * 2"));
    assert_eq!(eval_in(&mut env, "ruleref(Double) + 1"), Ok(Value::uint(11, 8)));
    assert_eq!(eval("ruleref(Double)"), Ok(Value::Undefined));

    let mut looping =
        MapEnvironment::new().with_rule(0, Expression(leaves(vec![Op::RuleRef { rule_id: 0 }])));
    assert_eq!(
        eval_in(&mut looping, "ruleref(Double)"),
        Err(VmError::RecursionLimit(MAX_RULE_DEPTH))
    );
}

#[test]
fn test_get_and_set_go_through_environment() {
    let var = VarStoreInfo::buffer(StoreId(1), 0, 1);
    let set = leaves(vec![
        Op::Uint8(3),
        Op::Set {
            var: var.clone(),
            data_type: DataType::Uint8,
        },
    ]);
    let get = leaves(vec![Op::Get {
        var,
        data_type: DataType::Uint8,
    }]);

    let mut env = MapEnvironment::new();
    assert_eq!(evaluate(&get, &mut env), Ok(Value::Undefined));
    assert_eq!(evaluate(&set, &mut env), Ok(Value::Bool(true)));
    assert_eq!(evaluate(&get, &mut env), Ok(Value::uint(3, 1)));

    assert_eq!(evaluate(&set, &mut ()), Ok(Value::Bool(false)));
}

#[test]
fn test_dup_copies_top() {
    let nodes = leaves(vec![Op::Uint8(4), Op::Dup, Op::Add]);
    assert_eq!(evaluate(&nodes, &mut ()), Ok(Value::uint(8, 8)));
}

#[test]
fn test_stack_shape_errors() {
    assert_eq!(evaluate(&[], &mut ()), Err(VmError::Empty));
    assert_eq!(
        evaluate(&leaves(vec![Op::Uint8(1), Op::Uint8(2)]), &mut ()),
        Err(VmError::LeftoverValues(1))
    );
    assert_eq!(
        evaluate(&leaves(vec![Op::Uint8(1), Op::Add]), &mut ()),
        Err(VmError::StackUnderflow {
            opcode: OpCode::Add
        })
    );
    let deep = leaves(vec![Op::One; MAX_STACK + 1]);
    assert_eq!(
        evaluate(&deep, &mut ()),
        Err(VmError::StackOverflow { limit: MAX_STACK })
    );
}

#[test]
fn test_unsupported_opcodes() {
    assert_eq!(
        evaluate(&leaves(vec![Op::Version]), &mut ()),
        Err(VmError::Unsupported(OpCode::Version))
    );
    assert_eq!(
        evaluate(&leaves(vec![Op::Locked]), &mut ()),
        Err(VmError::Unsupported(OpCode::Locked))
    );
}
