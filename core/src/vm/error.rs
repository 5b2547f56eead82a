//! Evaluation errors.
//!
//! `Undefined` operands are not errors: they flow through operators and
//! make the result `Undefined`. The variants below stop evaluation.

use thiserror::Error;

use crate::ifr::OpCode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// An operator found fewer operands than it pops.
    #[error("stack underflow at {opcode}")]
    StackUnderflow { opcode: OpCode },

    #[error("stack overflow: more than {limit} values")]
    StackOverflow { limit: usize },

    /// Operand of the wrong kind, e.g. `Length` on an integer.
    #[error("{opcode} expects {expected}, found {found}")]
    TypeMismatch {
        opcode: OpCode,
        expected: &'static str,
        found: &'static str,
    },

    /// `Divide` or `Modulo` by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Opcodes that need firmware state the evaluator does not model.
    #[error("{0} is not supported by the evaluator")]
    Unsupported(OpCode),

    /// The expression produced no value.
    #[error("expression produced no value")]
    Empty,

    #[error("expression left {0} extra values on the stack")]
    LeftoverValues(usize),

    /// The pairs under a `Map` did not come out even.
    #[error("map produced {0} values, expected match/result pairs")]
    MalformedMap(usize),

    #[error("rule references nest deeper than {0}")]
    RecursionLimit(usize),
}
