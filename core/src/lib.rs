//! VFR to IFR compiler core.
//!
//! Lexes Visual Forms Representation source, compiles it into an IFR
//! opcode tree and serializes the tree into a UEFI Form Package.

pub mod api;
pub mod compiler;
pub mod emitter;
pub mod ifr;
pub mod lexer;
pub mod scope_stack;
pub mod strings;
pub mod symbols;
pub mod syntax;
pub mod table;
pub mod vm;

pub use api::{Compilation, CompileOptions, Error, compile_source, compile_tokens};
