#![allow(dead_code)]

mod source;

use once_cell::sync::Lazy;
use vfr::ifr::is_expression_op;
use vfr::vm::{MapEnvironment, Value, VmError, evaluate};
use vfr::{Compilation, CompileOptions, Error, Expression, Op, OpCode, OpcodeNode};

pub use source::evaluate_source;

pub const GUID: &str =
    "{0xa04a27f4, 0xdf00, 0x4d42, {0xb5, 0x52, 0x39, 0x51, 0x13, 0x02, 0x11, 0x3d}}";

/// Declarations shared by the fixtures: a `Config` record and a buffer
/// store `Cfg` over it.
pub static PROLOGUE: Lazy<String> = Lazy::new(|| {
    "typedef struct {\n  UINT8  Flag;\n  UINT16 Count;\n} Config;\n\n\
     formset guid = GUID, title = STR_TITLE, help = STR_HELP,\n  \
     varstore Config, name = Cfg, guid = GUID;\n"
        .replace("GUID", GUID)
});

/// A complete formset whose form 1 holds `body`.
pub fn in_form(body: &str) -> String {
    format!(
        "{}  form formid = 1, title = STR_FORM;\n{}\n  endform;\nendformset;\n",
        *PROLOGUE, body
    )
}

pub fn compile_with(source: &str, options: CompileOptions) -> Result<Compilation, Error> {
    vfr::compile_source(source, &vfr::SequentialStrings::new(), options)
}

pub fn compile(source: &str) -> Result<Compilation, Error> {
    compile_with(source, CompileOptions::default())
}

pub fn compile_ok(source: &str) -> Compilation {
    match compile(source) {
        Ok(compiled) => compiled,
        Err(e) => panic!(
            "compilation failed:\n{}",
            vfr::render_error_to_string_no_color(&e, "test.vfr")
        ),
    }
}

/// Diagnostic codes of a failed compilation, errors first.
pub fn error_codes(err: &Error) -> Vec<String> {
    err.diagnostics()
        .iter()
        .filter_map(|d| d.code.clone())
        .collect()
}

pub fn form(compiled: &Compilation, form_id: u16) -> &OpcodeNode {
    compiled.tree[0]
        .children
        .iter()
        .find(|n| matches!(n.op, Op::Form { form_id: id, .. } if id == form_id))
        .unwrap_or_else(|| panic!("no form {}", form_id))
}

pub fn child_opcodes(node: &OpcodeNode) -> Vec<OpCode> {
    node.children.iter().map(|n| n.opcode()).collect()
}

/// The expression children of a conditional or validation node.
pub fn condition(node: &OpcodeNode) -> Vec<OpcodeNode> {
    node.children
        .iter()
        .filter(|n| is_expression_op(n.opcode()))
        .cloned()
        .collect()
}

/// Environment whose rules are the compiled `rule` bodies of `compiled`.
pub fn environment(compiled: &Compilation) -> MapEnvironment {
    let mut env = MapEnvironment::new();
    for node in compiled.tree.iter().flat_map(|n| n.walk()) {
        if let Op::Rule { rule_id } = node.op {
            env.rules.insert(rule_id, Expression(node.children.clone()));
        }
    }
    env
}

/// Compile `suppressif EXPR;` next to a `Count` question (id 1, value 42)
/// and a `Double` rule, then evaluate the compiled condition.
pub fn evaluate_condition(expr: &str) -> Result<Value, VmError> {
    let body = format!(
        "    numeric name = Count, varid = Cfg.Count, prompt = STR_P, help = STR_H,\n      \
         maximum = 1000,\n    endnumeric;\n    \
         rule Double, questionref(Count) * 2 endrule;\n    \
         suppressif {};\n      text = STR_T;\n    endif;",
        expr
    );
    let compiled = compile_ok(&in_form(&body));
    let suppress = form(&compiled, 1)
        .children
        .iter()
        .find(|n| n.opcode() == OpCode::SuppressIf)
        .unwrap_or_else(|| panic!("no suppressif for {:?}", expr));

    let mut env = environment(&compiled).with_question(1, Value::uint(42, 2));
    evaluate(&condition(suppress), &mut env)
}

/// One expression evaluated twice against the fixture of
/// `evaluate_condition`: compiled and run on the IFR evaluator, and read
/// straight from the source. Both must agree with each other and with
/// `$expected`.
#[macro_export]
macro_rules! round_trip {
    ($name:ident, $expr:expr, $expected:expr $(,)?) => {
        #[test]
        fn $name() {
            let direct = cases::evaluate_source($expr);
            pretty_assertions::assert_eq!(cases::evaluate_condition($expr), Ok(direct.clone()));
            pretty_assertions::assert_eq!(direct, $expected);
        }
    };
}
