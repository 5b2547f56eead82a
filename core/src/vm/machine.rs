use core::cmp::Ordering;

use tracing::trace;

use super::environment::Environment;
use super::error::VmError;
use super::stack::Stack;
use super::value::Value;
use crate::ifr::flags::string_ops;
use crate::ifr::{Op, OpCode, OpcodeNode};

/// Values the operand stack may hold at once.
pub const MAX_STACK: usize = 256;
/// How deep `RuleRef` may nest.
pub const MAX_RULE_DEPTH: usize = 16;

/// `Find`/`Span` result when nothing is found.
pub const NOT_FOUND: u64 = u64::MAX;

/// Evaluate one postfix run to its single value.
pub fn evaluate<E>(nodes: &[OpcodeNode], env: &mut E) -> Result<Value, VmError>
where
    E: Environment + ?Sized,
{
    Machine::new(env).run(nodes)
}

/// Stack machine over `Value`.
///
/// Rules referenced by `RuleRef` are fetched from the environment and run
/// on the same stack above the caller's operands.
pub struct Machine<'e, E: Environment + ?Sized> {
    env: &'e mut E,
    stack: Stack<Value>,
    depth: usize,
}

impl<'e, E: Environment + ?Sized> Machine<'e, E> {
    pub fn new(env: &'e mut E) -> Self {
        Self {
            env,
            stack: Stack::new(MAX_STACK),
            depth: 0,
        }
    }

    pub fn run(&mut self, nodes: &[OpcodeNode]) -> Result<Value, VmError> {
        let base = self.stack.len();
        for node in nodes {
            self.step(node)?;
        }
        let mut results = self.stack.split_off(base).into_iter();
        match (results.next(), results.len()) {
            (Some(value), 0) => Ok(value),
            (None, _) => Err(VmError::Empty),
            (Some(_), extra) => Err(VmError::LeftoverValues(extra)),
        }
    }

    fn step(&mut self, node: &OpcodeNode) -> Result<(), VmError> {
        let opcode = node.op.opcode();
        trace!(%opcode, stack = self.stack.len(), "step");
        let value = match &node.op {
            // Constants
            Op::Uint8(v) => Value::uint(u64::from(*v), 1),
            Op::Uint16(v) => Value::uint(u64::from(*v), 2),
            Op::Uint32(v) => Value::uint(u64::from(*v), 4),
            Op::Uint64(v) => Value::uint(*v, 8),
            Op::True => Value::Bool(true),
            Op::False => Value::Bool(false),
            Op::Zero => Value::uint(0, 1),
            Op::One => Value::uint(1, 1),
            Op::Ones => Value::uint(u64::MAX, 8),
            Op::Undefined => Value::Undefined,

            // References
            Op::Dup => self
                .stack
                .peek()
                .cloned()
                .ok_or(VmError::StackUnderflow { opcode })?,
            Op::This => self.env.this().unwrap_or(Value::Undefined),
            Op::QuestionRef1 { question_id } => {
                self.env.question(*question_id).unwrap_or(Value::Undefined)
            }
            Op::QuestionRef2 => {
                let id = self.pop(opcode)?;
                self.question_by_value(opcode, id)?
            }
            Op::QuestionRef3 { device_path, guid } => {
                let id = self.pop(opcode)?;
                if device_path.is_some() || guid.is_some() {
                    // Questions in other formsets are out of reach.
                    Value::Undefined
                } else {
                    self.question_by_value(opcode, id)?
                }
            }
            Op::RuleRef { rule_id } => self.rule(*rule_id)?,
            Op::StringRef1 { string_id } => self
                .env
                .string(*string_id)
                .map(Value::String)
                .unwrap_or(Value::Undefined),
            Op::StringRef2 => match self.operands::<1>(opcode)? {
                None => Value::Undefined,
                Some([id]) => {
                    let id = id16(opcode, &id)?;
                    self.env
                        .string(id)
                        .map(Value::String)
                        .unwrap_or(Value::Undefined)
                }
            },
            Op::Get { var, .. } => self.env.get(var).unwrap_or(Value::Undefined),
            Op::Set { var, .. } => {
                let value = self.pop(opcode)?;
                Value::Bool(self.env.set(var, &value))
            }

            // Unary
            Op::Length
            | Op::BitwiseNot
            | Op::Not
            | Op::ToBoolean
            | Op::ToString { .. }
            | Op::ToUint
            | Op::ToUpper
            | Op::ToLower => match self.operands::<1>(opcode)? {
                None => Value::Undefined,
                Some([operand]) => unary(&node.op, operand)?,
            },

            Op::Conditional => {
                let if_false = self.pop(opcode)?;
                let if_true = self.pop(opcode)?;
                match self.pop(opcode)? {
                    Value::Bool(true) => if_true,
                    Value::Bool(false) => if_false,
                    Value::Undefined => Value::Undefined,
                    other => return Err(mismatch(opcode, "boolean", &other)),
                }
            }

            // String functions
            Op::Catenate => match self.operands::<2>(opcode)? {
                None => Value::Undefined,
                Some([Value::String(a), Value::String(b)]) => Value::String(a + &b),
                Some([a, b]) => return Err(mismatch(opcode, "string", not_string(&a, &b))),
            },
            Op::Match => match self.operands::<2>(opcode)? {
                None => Value::Undefined,
                Some([Value::String(s), Value::String(pattern)]) => {
                    Value::Bool(wildcard_match(&pattern, &s))
                }
                Some([a, b]) => return Err(mismatch(opcode, "string", not_string(&a, &b))),
            },
            Op::Find { format } => match self.operands::<3>(opcode)? {
                None => Value::Undefined,
                Some([Value::String(s), Value::String(target), start]) => {
                    let start = uint(opcode, &start)?;
                    let found = if *format & string_ops::FIND_INSENSITIVE != 0 {
                        find(&s.to_lowercase(), &target.to_lowercase(), start)
                    } else {
                        find(&s, &target, start)
                    };
                    Value::uint(found, 8)
                }
                Some([a, b, _]) => return Err(mismatch(opcode, "string", not_string(&a, &b))),
            },
            Op::Mid => match self.operands::<3>(opcode)? {
                None => Value::Undefined,
                Some([Value::String(s), pos, len]) => {
                    let pos = usize_of(uint(opcode, &pos)?);
                    let len = usize_of(uint(opcode, &len)?);
                    Value::String(s.chars().skip(pos).take(len).collect())
                }
                Some([other, _, _]) => return Err(mismatch(opcode, "string", &other)),
            },
            Op::Token => match self.operands::<3>(opcode)? {
                None => Value::Undefined,
                Some([Value::String(s), Value::String(delimiters), index]) => {
                    let index = usize_of(uint(opcode, &index)?);
                    let token = s
                        .split(|c: char| delimiters.contains(c))
                        .nth(index)
                        .unwrap_or_default();
                    Value::string(token)
                }
                Some([a, b, _]) => return Err(mismatch(opcode, "string", not_string(&a, &b))),
            },
            Op::Span { flags } => match self.operands::<3>(opcode)? {
                None => Value::Undefined,
                Some([Value::String(s), Value::String(charset), start]) => {
                    let start = uint(opcode, &start)?;
                    let non_matching = *flags & string_ops::SPAN_FIRST_NON_MATCH != 0;
                    Value::uint(span(&s, &charset, start, non_matching), 8)
                }
                Some([a, b, _]) => return Err(mismatch(opcode, "string", not_string(&a, &b))),
            },

            Op::Map => self.map(node)?,

            // Binary
            Op::And | Op::Or => match self.operands::<2>(opcode)? {
                None => Value::Undefined,
                Some([Value::Bool(a), Value::Bool(b)]) => {
                    Value::Bool(if opcode == OpCode::And { a && b } else { a || b })
                }
                Some([a, b]) => {
                    let found = if a.as_bool().is_some() { &b } else { &a };
                    return Err(mismatch(opcode, "boolean", found));
                }
            },
            Op::Equal
            | Op::NotEqual
            | Op::GreaterThan
            | Op::GreaterEqual
            | Op::LessThan
            | Op::LessEqual => match self.operands::<2>(opcode)? {
                None => Value::Undefined,
                Some([a, b]) => compare(opcode, &a, &b)?,
            },
            Op::BitwiseAnd
            | Op::BitwiseOr
            | Op::ShiftLeft
            | Op::ShiftRight
            | Op::Add
            | Op::Subtract
            | Op::Multiply
            | Op::Divide
            | Op::Modulo => match self.operands::<2>(opcode)? {
                None => Value::Undefined,
                Some([a, b]) => arithmetic(opcode, &a, &b)?,
            },

            _ => return Err(VmError::Unsupported(opcode)),
        };
        self.stack.push(value)
    }

    fn pop(&mut self, opcode: OpCode) -> Result<Value, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow { opcode })
    }

    /// Pops `N` operands in push order; `None` when any is `Undefined`.
    fn operands<const N: usize>(&mut self, opcode: OpCode) -> Result<Option<[Value; N]>, VmError> {
        let Some(base) = self.stack.len().checked_sub(N) else {
            return Err(VmError::StackUnderflow { opcode });
        };
        let values: [Value; N] = self
            .stack
            .split_off(base)
            .try_into()
            .map_err(|_| VmError::StackUnderflow { opcode })?;
        if values.iter().any(Value::is_undefined) {
            return Ok(None);
        }
        Ok(Some(values))
    }

    fn question_by_value(&mut self, opcode: OpCode, id: Value) -> Result<Value, VmError> {
        if id.is_undefined() {
            return Ok(Value::Undefined);
        }
        let id = id16(opcode, &id)?;
        Ok(self.env.question(id).unwrap_or(Value::Undefined))
    }

    fn rule(&mut self, rule_id: u8) -> Result<Value, VmError> {
        let Some(body) = self.env.rule(rule_id) else {
            return Ok(Value::Undefined);
        };
        if self.depth >= MAX_RULE_DEPTH {
            return Err(VmError::RecursionLimit(MAX_RULE_DEPTH));
        }
        self.depth += 1;
        let result = self.run(body.nodes());
        self.depth -= 1;
        result
    }

    /// `Map`: the operand below the node is looked up in the match/result
    /// pairs its children evaluate to.
    fn map(&mut self, node: &OpcodeNode) -> Result<Value, VmError> {
        let operand = self.pop(OpCode::Map)?;
        let base = self.stack.len();
        for child in &node.children {
            self.step(child)?;
        }
        let pairs = self.stack.split_off(base);
        if pairs.len() % 2 != 0 {
            return Err(VmError::MalformedMap(pairs.len()));
        }
        if operand.is_undefined() {
            return Ok(Value::Undefined);
        }
        let mut pairs = pairs.into_iter();
        while let (Some(key), Some(result)) = (pairs.next(), pairs.next()) {
            if loosely_equal(&key, &operand) {
                return Ok(result);
            }
        }
        Ok(Value::Undefined)
    }
}

fn unary(op: &Op, operand: Value) -> Result<Value, VmError> {
    let opcode = op.opcode();
    Ok(match (op, operand) {
        (Op::Length, Value::String(s)) => Value::uint(s.chars().count() as u64, 8),
        (Op::BitwiseNot, Value::Uint { value, .. }) => Value::uint(!value, 8),
        (Op::Not, Value::Bool(b)) => Value::Bool(!b),

        (Op::ToBoolean, Value::Bool(b)) => Value::Bool(b),
        (Op::ToBoolean, Value::Uint { value, .. }) => Value::Bool(value != 0),
        (Op::ToBoolean, Value::String(s)) => {
            if s.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if s.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                Value::Undefined
            }
        }

        (Op::ToUint, Value::Bool(b)) => Value::uint(u64::from(b), 1),
        (Op::ToUint, v @ Value::Uint { .. }) => v,
        (Op::ToUint, Value::String(s)) => parse_uint(&s)
            .map(|v| Value::uint(v, 8))
            .unwrap_or(Value::Undefined),

        (Op::ToString { .. }, v @ Value::String(_)) => v,
        (Op::ToString { format }, Value::Bool(b)) => {
            Value::String(format_uint(u64::from(b), 1, *format))
        }
        (Op::ToString { format }, Value::Uint { value, width }) => {
            Value::String(format_uint(value, width, *format))
        }

        (Op::ToUpper, Value::String(s)) => Value::String(s.to_uppercase()),
        (Op::ToLower, Value::String(s)) => Value::String(s.to_lowercase()),

        (Op::Length | Op::ToUpper | Op::ToLower, other) => {
            return Err(mismatch(opcode, "string", &other));
        }
        (Op::BitwiseNot, other) => return Err(mismatch(opcode, "integer", &other)),
        (_, other) => return Err(mismatch(opcode, "boolean", &other)),
    })
}

fn compare(opcode: OpCode, a: &Value, b: &Value) -> Result<Value, VmError> {
    let ordering = match (a, b) {
        (Value::Uint { value: x, .. }, Value::Uint { value: y, .. }) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y))
            if matches!(opcode, OpCode::Equal | OpCode::NotEqual) =>
        {
            x.cmp(y)
        }
        _ => {
            return Err(VmError::TypeMismatch {
                opcode,
                expected: a.type_name(),
                found: b.type_name(),
            });
        }
    };
    Ok(Value::Bool(match opcode {
        OpCode::Equal => ordering == Ordering::Equal,
        OpCode::NotEqual => ordering != Ordering::Equal,
        OpCode::GreaterThan => ordering == Ordering::Greater,
        OpCode::GreaterEqual => ordering != Ordering::Less,
        OpCode::LessThan => ordering == Ordering::Less,
        _ => ordering != Ordering::Greater,
    }))
}

/// Integer operators work on 64 bits and produce `UINT64` results.
fn arithmetic(opcode: OpCode, a: &Value, b: &Value) -> Result<Value, VmError> {
    let (Some(x), Some(y)) = (a.as_uint(), b.as_uint()) else {
        let found = if a.as_uint().is_some() { b } else { a };
        return Err(mismatch(opcode, "integer", found));
    };
    let result = match opcode {
        OpCode::BitwiseAnd => x & y,
        OpCode::BitwiseOr => x | y,
        OpCode::ShiftLeft => x.checked_shl(shift(y)).unwrap_or(0),
        OpCode::ShiftRight => x.checked_shr(shift(y)).unwrap_or(0),
        OpCode::Add => x.wrapping_add(y),
        OpCode::Subtract => x.wrapping_sub(y),
        OpCode::Multiply => x.wrapping_mul(y),
        OpCode::Divide => x.checked_div(y).ok_or(VmError::DivisionByZero)?,
        OpCode::Modulo => x.checked_rem(y).ok_or(VmError::DivisionByZero)?,
        _ => return Err(VmError::Unsupported(opcode)),
    };
    Ok(Value::uint(result, 8))
}

fn shift(amount: u64) -> u32 {
    u32::try_from(amount).unwrap_or(u32::MAX)
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Uint { value: x, .. }, Value::Uint { value: y, .. }) => x == y,
        _ => a == b,
    }
}

fn mismatch(opcode: OpCode, expected: &'static str, found: &Value) -> VmError {
    VmError::TypeMismatch {
        opcode,
        expected,
        found: found.type_name(),
    }
}

fn not_string<'v>(a: &'v Value, b: &'v Value) -> &'v Value {
    if matches!(a, Value::String(_)) { b } else { a }
}

fn uint(opcode: OpCode, value: &Value) -> Result<u64, VmError> {
    value
        .as_uint()
        .ok_or_else(|| mismatch(opcode, "integer", value))
}

fn id16(opcode: OpCode, value: &Value) -> Result<u16, VmError> {
    let id = uint(opcode, value)?;
    u16::try_from(id).map_err(|_| VmError::TypeMismatch {
        opcode,
        expected: "16-bit id",
        found: "wider integer",
    })
}

fn usize_of(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn parse_uint(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// `ToString` formats: 0 unsigned decimal, 1 signed decimal, 2 lower-case
/// hex, 3 upper-case hex. Anything else falls back to unsigned decimal.
fn format_uint(value: u64, width: u8, format: u8) -> String {
    match format {
        1 => {
            let bits = u32::from(width.clamp(1, 8)) * 8;
            let signed = ((value << (64 - bits)) as i64) >> (64 - bits);
            signed.to_string()
        }
        2 => format!("{:x}", value),
        3 => format!("{:X}", value),
        _ => value.to_string(),
    }
}

/// Char index of `target` in `s` at or after `start`.
fn find(s: &str, target: &str, start: u64) -> u64 {
    let hay: Vec<char> = s.chars().collect();
    let needle: Vec<char> = target.chars().collect();
    let start = usize_of(start);
    if start > hay.len() || needle.len() > hay.len() {
        return NOT_FOUND;
    }
    (start..=hay.len() - needle.len())
        .find(|&i| hay[i..].starts_with(&needle))
        .map_or(NOT_FOUND, |i| i as u64)
}

/// Char index of the first char at or after `start` that is (or, with
/// `non_matching`, is not) inside one of the `charset` ranges. The charset
/// is read as low/high pairs; a trailing unpaired char stands for itself.
fn span(s: &str, charset: &str, start: u64, non_matching: bool) -> u64 {
    let bounds: Vec<char> = charset.chars().collect();
    let in_set = |c: char| {
        bounds.chunks(2).any(|range| match range {
            [low, high] => (*low..=*high).contains(&c),
            [single] => *single == c,
            _ => false,
        })
    };
    s.chars()
        .enumerate()
        .skip(usize_of(start))
        .find(|&(_, c)| in_set(c) != non_matching)
        .map_or(NOT_FOUND, |(i, _)| i as u64)
}

/// Glob match: `*` matches any run of chars, `?` any single char.
fn wildcard_match(pattern: &str, s: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = s.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}
