//! vfr - a compiler from VFR form descriptions to UEFI IFR
//!
//! # Overview
//!
//! VFR (Visual Forms Representation) describes firmware setup pages:
//! formsets, forms, questions bound to variable storage, and the
//! conditions that hide or disable them. This crate compiles VFR source
//! into a Form Package, the IFR byte stream firmware loads into its HII
//! database.
//!
//! # Quick Start
//!
//! ```
//! use vfr::{CompileOptions, SequentialStrings, compile_source};
//!
//! let source = r#"
//!     typedef struct { UINT8 Flag; } Config;
//!     formset guid = {0x1, 0x2, 0x3, {0x4, 0x5, 0x6, 0x7, 0x8, 0x9, 0xa, 0xb}},
//!       title = STR_TITLE, help = STR_HELP,
//!       varstore Config, name = MyVar,
//!         guid = {0x1, 0x2, 0x3, {0x4, 0x5, 0x6, 0x7, 0x8, 0x9, 0xa, 0xb}};
//!       form formid = 1, title = STR_TITLE;
//!         checkbox varid = MyVar.Flag, prompt = STR1, help = STR2,
//!           flags = CHECKBOX_DEFAULT,
//!         endcheckbox;
//!       endform;
//!     endformset;
//! "#;
//!
//! let strings = SequentialStrings::new();
//! let compiled = compile_source(source, &strings, CompileOptions::default()).unwrap();
//! assert_eq!(compiled.symbols.question_id("MyVar.Flag"), Some(1));
//! println!("{}", compiled.listing().unwrap());
//! ```
//!
//! # Errors
//!
//! A failed compilation returns `Error::Compilation` with every diagnostic
//! of the pass. [`render_error`] prints them as annotated source snippets.

mod error_renderer;

pub use error_renderer::{
    render_diagnostics, render_error, render_error_to, render_error_to_string,
    render_error_to_string_no_color,
};

// Re-export public API from vfr_core
pub use vfr_core::api::{
    Compilation, CompileOptions, Diagnostic, Error, Severity, compile_source, compile_tokens,
};

pub use vfr_core::emitter::{EmitError, RawRecord, disassemble, records, to_c_array, verify_scopes};
pub use vfr_core::ifr::{self, Expression, Op, OpCode, OpcodeNode};
pub use vfr_core::lexer::{self, Token, tokenize};
pub use vfr_core::strings::{SequentialStrings, StringResolver, StringTable};
pub use vfr_core::symbols::SymbolMap;
pub use vfr_core::vm;
