//! Public API of the VFR compiler.
//!
//! `compile_source` lexes, compiles and emits in one call. Any recorded
//! error means no package: the result is `Error::Compilation` carrying every
//! diagnostic of the pass.
//!
//! # Example
//!
//! ```
//! use vfr_core::api::{CompileOptions, compile_source};
//! use vfr_core::strings::SequentialStrings;
//!
//! let source = r#"
//!     formset guid = {0x1, 0x2, 0x3, {0x4, 0x5, 0x6, 0x7, 0x8, 0x9, 0xa, 0xb}},
//!       title = STR_TITLE, help = STR_HELP,
//!       form formid = 1, title = STR_TITLE;
//!         subtitle text = STR_HELP;
//!       endform;
//!     endformset;
//! "#;
//! let strings = SequentialStrings::new();
//! let compiled = compile_source(source, &strings, CompileOptions::default()).unwrap();
//! assert_eq!(compiled.symbols.forms, vec![1]);
//! ```

mod compile;
pub mod error;
pub mod options;

pub use compile::{Compilation, compile_source, compile_tokens};
pub use error::{Diagnostic, Error, Severity};
pub use options::CompileOptions;
