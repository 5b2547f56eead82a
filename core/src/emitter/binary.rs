use thiserror::Error;

use crate::ifr::{OP_HEADER_LEN, OpCode, OpcodeNode};

/// HII package header: 24-bit length followed by the package type.
pub const PACKAGE_HEADER_LEN: usize = 4;
pub const FORMS_PACKAGE_TYPE: u8 = 0x02;
/// Records carry their length in 7 bits.
pub const MAX_RECORD_LEN: usize = 0x7F;
pub const MAX_PACKAGE_LEN: usize = 0x00FF_FFFF;
pub const SCOPE_BIT: u8 = 0x80;

/// Serialization failures. The compiler never builds trees that trigger
/// these; seeing one means a compiler defect or corrupt input bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmitError {
    #[error("{opcode} record from line {line} is {len} bytes, over the 127-byte limit")]
    RecordTooLong { opcode: OpCode, line: u32, len: usize },

    #[error("{opcode} from line {line} has children but does not open a scope")]
    ChildrenWithoutScope { opcode: OpCode, line: u32 },

    #[error("form package of {len} bytes does not fit the 24-bit length field")]
    PackageTooLarge { len: usize },

    #[error("unbalanced scope at byte {offset} ({open} scopes open)")]
    UnbalancedScope { offset: usize, open: usize },

    #[error("malformed package at byte {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },
}

/// Serialize `tree` into a complete Form Package, header included.
pub fn emit_package(tree: &[OpcodeNode]) -> Result<Vec<u8>, EmitError> {
    let mut buf = vec![0u8; PACKAGE_HEADER_LEN];
    for node in tree {
        emit_node(node, &mut buf)?;
    }

    let len = buf.len();
    if len > MAX_PACKAGE_LEN {
        return Err(EmitError::PackageTooLarge { len });
    }
    let [b0, b1, b2, _] = (len as u32).to_le_bytes();
    buf[..PACKAGE_HEADER_LEN].copy_from_slice(&[b0, b1, b2, FORMS_PACKAGE_TYPE]);
    tracing::debug!(bytes = len, "emitted form package");
    Ok(buf)
}

fn emit_node(node: &OpcodeNode, buf: &mut Vec<u8>) -> Result<(), EmitError> {
    let opcode = node.opcode();
    // End records come from scope flags only.
    if opcode == OpCode::End {
        return Err(EmitError::UnbalancedScope {
            offset: buf.len(),
            open: 0,
        });
    }
    if !node.scope && !node.children.is_empty() {
        return Err(EmitError::ChildrenWithoutScope {
            opcode,
            line: node.line,
        });
    }

    let start = buf.len();
    buf.push(opcode as u8);
    buf.push(0);
    node.op.write_payload(buf);
    let len = buf.len() - start;
    if len > MAX_RECORD_LEN {
        return Err(EmitError::RecordTooLong {
            opcode,
            line: node.line,
            len,
        });
    }
    buf[start + 1] = len as u8 | if node.scope { SCOPE_BIT } else { 0 };
    tracing::trace!(%opcode, offset = start, len, scope = node.scope, "record");

    for child in &node.children {
        emit_node(child, buf)?;
    }
    if node.scope {
        buf.extend_from_slice(&[OpCode::End as u8, OP_HEADER_LEN as u8]);
    }
    Ok(())
}
