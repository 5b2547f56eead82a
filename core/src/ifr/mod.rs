//! IFR vocabulary: opcodes, flag sets, typed values, GUIDs and the opcode
//! tree.

pub mod flags;
pub mod guid;
mod node;
mod opcode;
mod value;


pub use node::{
    Expression, FormMapMethod, NumericRange, OP_HEADER_LEN, Op, OpcodeNode, QUESTION_HEADER_LEN,
    QuestionHeader, RefTarget, STATEMENT_HEADER_LEN, StatementHeader, VAR_OFFSET_INVALID,
    is_expression_op,
};
pub(crate) use node::{put_u16, put_u32};
pub use opcode::OpCode;
pub use value::{DataType, HiiDate, HiiRef, HiiTime, TypedValue};
