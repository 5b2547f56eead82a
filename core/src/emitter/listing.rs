use core::fmt::Write;

use super::binary::{EmitError, FORMS_PACKAGE_TYPE, PACKAGE_HEADER_LEN, SCOPE_BIT};
use crate::ifr::{OP_HEADER_LEN, OpCode};

/// One record as it appears in the package bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    /// Offset from the start of the package, header included.
    pub offset: usize,
    /// `None` for opcode bytes this compiler does not know.
    pub opcode: Option<OpCode>,
    pub scope: bool,
    /// The whole record, header included.
    pub bytes: &'a [u8],
}

/// Split a Form Package into its records, checking the package header.
pub fn records(package: &[u8]) -> Result<Vec<RawRecord<'_>>, EmitError> {
    let Some(header) = package.get(..PACKAGE_HEADER_LEN) else {
        return Err(EmitError::Malformed {
            offset: 0,
            reason: "shorter than the package header",
        });
    };
    let declared = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
    if declared != package.len() {
        return Err(EmitError::Malformed {
            offset: 0,
            reason: "header length does not match the package size",
        });
    }
    if header[3] != FORMS_PACKAGE_TYPE {
        return Err(EmitError::Malformed {
            offset: 3,
            reason: "not a forms package",
        });
    }

    let mut out = Vec::new();
    let mut offset = PACKAGE_HEADER_LEN;
    while offset < package.len() {
        let Some(&[op, len_byte]) = package.get(offset..offset + OP_HEADER_LEN) else {
            return Err(EmitError::Malformed {
                offset,
                reason: "truncated record header",
            });
        };
        let len = usize::from(len_byte & !SCOPE_BIT);
        if len < OP_HEADER_LEN {
            return Err(EmitError::Malformed {
                offset,
                reason: "record shorter than its header",
            });
        }
        let Some(bytes) = package.get(offset..offset + len) else {
            return Err(EmitError::Malformed {
                offset,
                reason: "record runs past the end of the package",
            });
        };
        out.push(RawRecord {
            offset,
            opcode: OpCode::from_byte(op),
            scope: len_byte & SCOPE_BIT != 0,
            bytes,
        });
        offset += len;
    }
    Ok(out)
}

/// Check that every scope-opening record is closed by exactly one `End`.
/// Returns the number of scopes.
pub fn verify_scopes(package: &[u8]) -> Result<usize, EmitError> {
    let mut open = 0usize;
    let mut scopes = 0usize;
    for record in records(package)? {
        if record.opcode == Some(OpCode::End) {
            if open == 0 {
                return Err(EmitError::UnbalancedScope {
                    offset: record.offset,
                    open,
                });
            }
            open -= 1;
        }
        if record.scope {
            open += 1;
            scopes += 1;
        }
    }
    if open != 0 {
        return Err(EmitError::UnbalancedScope {
            offset: package.len(),
            open,
        });
    }
    Ok(scopes)
}

/// Indented listing: offset, mnemonic and raw bytes of each record.
pub fn disassemble(package: &[u8]) -> Result<String, EmitError> {
    let mut out = String::new();
    let mut depth = 0usize;
    let _ = writeln!(
        out,
        "{:06x}  PACKAGE_HEADER len={} type={:#04x}",
        0,
        package.len(),
        FORMS_PACKAGE_TYPE
    );
    for record in records(package)? {
        if record.opcode == Some(OpCode::End) {
            depth = depth.saturating_sub(1);
        }
        let name = match record.opcode {
            Some(opcode) => opcode.mnemonic().to_string(),
            None => format!("UNKNOWN_{:02X}", record.bytes[0]),
        };
        let _ = writeln!(
            out,
            "{:06x}  {:indent$}{:<24} {}",
            record.offset,
            "",
            name,
            hex(record.bytes, " "),
            indent = depth * 2
        );
        if record.scope {
            depth += 1;
        }
    }
    Ok(out)
}

/// The package as an EDK II style C array: a 4-byte array length, the
/// package header, then one line per record.
pub fn to_c_array(name: &str, package: &[u8]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "unsigned char {}[] = {{", name);
    let total = (package.len() + 4) as u32;
    let _ = writeln!(out, "  // ARRAY LENGTH\n");
    let _ = writeln!(out, "  {},\n", c_bytes(&total.to_le_bytes()));

    let header_len = PACKAGE_HEADER_LEN.min(package.len());
    let _ = writeln!(out, "  // PACKAGE HEADER\n");
    let _ = writeln!(out, "  {},\n", c_bytes(&package[..header_len]));

    let _ = writeln!(out, "  // PACKAGE DATA\n");
    let body = &package[header_len..];
    let lines: Vec<&[u8]> = match records(package) {
        Ok(records) => records.iter().map(|r| r.bytes).collect(),
        Err(_) => body.chunks(16).collect(),
    };
    for (i, line) in lines.iter().enumerate() {
        let sep = if i + 1 == lines.len() { "" } else { "," };
        let _ = writeln!(out, "  {}{}", c_bytes(line), sep);
    }
    out.push_str("};\n");
    out
}

fn c_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(",  ")
}

fn hex(bytes: &[u8], sep: &str) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(sep)
}
