//! Form Package serialization and the byte-level tools built on it.
//!
//! [`emit_package`] flattens an opcode tree depth-first, closing every scope
//! with an `End` record. [`disassemble`] and [`verify_scopes`] read the
//! bytes back without the tree; [`to_c_array`] renders them for inclusion in
//! firmware sources.

mod binary;
mod listing;


pub use binary::{
    EmitError, FORMS_PACKAGE_TYPE, MAX_PACKAGE_LEN, MAX_RECORD_LEN, PACKAGE_HEADER_LEN, SCOPE_BIT,
    emit_package,
};
pub use listing::{RawRecord, disassemble, records, to_c_array, verify_scopes};
