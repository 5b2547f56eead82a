use tracing::debug;

use super::{CompileOptions, Diagnostic, Error};
use crate::compiler::{self, CompileError, CompileWarning};
use crate::emitter;
use crate::ifr::OpcodeNode;
use crate::lexer::{Token, tokenize};
use crate::strings::StringResolver;
use crate::symbols::SymbolMap;

/// A successful compilation.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// The Form Package, header included.
    pub package: Vec<u8>,
    pub tree: Vec<OpcodeNode>,
    pub symbols: SymbolMap,
    pub warnings: Vec<Diagnostic>,
}

impl Compilation {
    /// Indented record listing of the package.
    pub fn listing(&self) -> Result<String, Error> {
        Ok(emitter::disassemble(&self.package)?)
    }

    pub fn to_c_array(&self, name: &str) -> String {
        emitter::to_c_array(name, &self.package)
    }
}

/// Lex and compile VFR source.
pub fn compile_source(
    source: &str,
    strings: &dyn StringResolver,
    options: CompileOptions,
) -> Result<Compilation, Error> {
    let tokens = tokenize(source).map_err(|errors| Error::Compilation {
        diagnostics: errors.into_iter().map(Diagnostic::from).collect(),
        source: source.to_string(),
    })?;
    debug!(tokens = tokens.len(), "lexed");
    compile_tokens(&tokens, source, strings, options)
}

/// Compile an already lexed token stream. `source` is the text the token
/// spans point into; it is kept in the error for rendering.
pub fn compile_tokens(
    tokens: &[Token<'_>],
    source: &str,
    strings: &dyn StringResolver,
    options: CompileOptions,
) -> Result<Compilation, Error> {
    let output = compiler::compile(tokens, strings, options);
    if output.has_errors() {
        let diagnostics = output
            .errors
            .iter()
            .map(CompileError::to_diagnostic)
            .chain(output.warnings.iter().map(CompileWarning::to_diagnostic))
            .collect();
        return Err(Error::Compilation {
            diagnostics,
            source: source.to_string(),
        });
    }

    let package = emitter::emit_package(&output.tree)?;
    debug!(bytes = package.len(), "package emitted");
    Ok(Compilation {
        package,
        symbols: SymbolMap::from(&output.symbols),
        tree: output.tree,
        warnings: output
            .warnings
            .iter()
            .map(CompileWarning::to_diagnostic)
            .collect(),
    })
}
