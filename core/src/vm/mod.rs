//! Reference evaluator for compiled expressions.
//!
//! Runs postfix opcode sequences on a stack of `Value`s. Firmware state
//! (questions, storage, strings, rules) is reached through `Environment`.

mod environment;
mod error;
mod machine;
mod stack;
mod value;

#[cfg(test)]
mod machine_test;

pub use environment::{Environment, MapEnvironment};
pub use error::VmError;
pub use machine::{MAX_RULE_DEPTH, MAX_STACK, Machine, NOT_FOUND, evaluate};
pub use value::Value;
