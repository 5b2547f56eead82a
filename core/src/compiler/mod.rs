//! VFR compiler: declarations, formsets, forms, questions and expressions.
//!
//! A single top-to-bottom pass over the token stream builds the opcode tree
//! and fills the symbol tables. Errors are collected rather than returned
//! early; the caller decides whether a package can be produced.

mod context;
mod cursor;
mod declarations;
mod error;
mod expression;
mod question;
mod statement;

#[cfg(test)]
mod expression_test;

pub use context::CompileContext;
pub use cursor::Cursor;
pub use error::{CompileError, CompileErrorKind, CompileWarning};
pub use expression::{compile_expression, uint_constant};

use crate::api::CompileOptions;
use crate::ifr::guid::{self, tiano};
use crate::ifr::{Op, OpcodeNode};
use crate::lexer::{Token, TokenKind};
use crate::strings::StringResolver;
use crate::table::SymbolTable;

/// Everything one pass produced.
#[derive(Debug)]
pub struct CompileOutput {
    pub tree: Vec<OpcodeNode>,
    pub symbols: SymbolTable,
    pub errors: Vec<CompileError>,
    pub warnings: Vec<CompileWarning>,
}

impl CompileOutput {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Compile a token stream.
pub fn compile(
    tokens: &[Token<'_>],
    strings: &dyn StringResolver,
    options: CompileOptions,
) -> CompileOutput {
    let mut compiler = Compiler {
        cursor: Cursor::new(tokens),
        ctx: CompileContext::new(strings, options),
        tree: Vec::new(),
    };
    compiler.run();
    tracing::debug!(
        errors = compiler.ctx.errors.len(),
        warnings = compiler.ctx.warnings.len(),
        "compilation finished"
    );
    CompileOutput {
        tree: compiler.tree,
        symbols: compiler.ctx.symbols,
        errors: compiler.ctx.errors,
        warnings: compiler.ctx.warnings,
    }
}

/// Keywords that may start an item of a formset body.
const FORMSET_ITEMS: &[&str] = &[
    "varstore",
    "efivarstore",
    "namevaluevarstore",
    "defaultstore",
    "form",
    "formmap",
    "suppressif",
    "disableif",
    "endformset",
];

pub(crate) struct Compiler<'t, 'src, 'r> {
    cursor: Cursor<'t, 'src>,
    ctx: CompileContext<'r>,
    tree: Vec<OpcodeNode>,
}

impl<'t, 'src, 'r> Compiler<'t, 'src, 'r> {
    fn run(&mut self) {
        while let Some(token) = self.cursor.peek() {
            let start = self.cursor.position();
            let result = match token.text {
                "#" => self.pragma(),
                "typedef" | "struct" | "union" => self.type_declaration(),
                "formset" if self.tree.is_empty() => self.formset(),
                "formset" => Err(CompileError::syntax(
                    "only one formset may be declared per file",
                    token,
                )),
                _ => Err(CompileError::syntax(
                    format!("unexpected '{}' outside of a formset", token.text),
                    token,
                )),
            };
            if let Err(err) = result {
                self.recover_from(err, start);
            }
        }
    }

    /// Report `err` and skip to the end of the statement, always making
    /// progress. Nothing is skipped if the failing statement already
    /// consumed its `;`.
    fn recover_from(&mut self, err: CompileError, start: usize) {
        self.ctx.report(err);
        if self.cursor.position() > start && self.cursor.after_semi() {
            return;
        }
        self.cursor.recover();
        if self.cursor.position() == start {
            self.cursor.next();
        }
    }

    /// `formset guid = G, title = S, help = S, [classguid = G (| G)*,]
    /// [class = C,] [subclass = C,] ... endformset;`
    fn formset(&mut self) -> Result<(), CompileError> {
        let opener = self.cursor.expect_word("formset")?;
        let mut header = FormSetHeader::default();
        if let Err(err) = self.formset_header(&mut header) {
            self.ctx.report(err);
            while !self.cursor.is_eof() && !self.cursor.at_any_word(FORMSET_ITEMS) {
                self.cursor.next();
            }
        }
        let Some(guid) = header.guid else {
            return Err(CompileError::syntax("formset requires 'guid = ...'", opener));
        };

        let mut class_guids = header.class_guids;
        if class_guids.len() > 3 {
            self.ctx.report(CompileError::new(
                CompileErrorKind::InvalidValue,
                format!("a formset takes at most 3 class GUIDs, found {}", class_guids.len()),
                opener,
            ));
            class_guids.truncate(3);
        }
        if let Some(overridden) = self.ctx.options.override_class_guid {
            class_guids = vec![overridden];
        } else if class_guids.is_empty() {
            class_guids.push(guid::PLATFORM_SETUP_FORMSET);
        }

        tracing::debug!(%guid, line = opener.line, "formset opened");
        let body = self.formset_body("endformset");

        let mut node = OpcodeNode::scoped(
            Op::FormSet {
                guid,
                title: header.title,
                help: header.help,
                class_guids,
            },
            opener.line,
        );
        for store in self.ctx.symbols.defaults.iter() {
            if store.id <= 1 {
                node.push(OpcodeNode::leaf(
                    Op::DefaultStore {
                        name: store.prompt,
                        default_id: store.id,
                    },
                    opener.line,
                ));
            }
        }
        if let Some(class) = header.class {
            node.push(tiano_extension(tiano::CLASS, class, opener.line));
        }
        if let Some(subclass) = header.subclass {
            node.push(tiano_extension(tiano::SUBCLASS, subclass, opener.line));
        }
        node.children.extend(body);
        tracing::debug!(line = opener.line, "formset closed");
        self.tree.push(node);
        Ok(())
    }

    fn formset_header(&mut self, header: &mut FormSetHeader) -> Result<(), CompileError> {
        loop {
            let Some(key) = self.cursor.peek() else {
                return Ok(());
            };
            if !self.cursor.at_key(key.text) {
                return Ok(());
            }
            self.cursor.next();
            self.cursor.expect(TokenKind::Assign)?;
            match key.text {
                "guid" => header.guid = Some(self.cursor.expect_guid()?),
                "title" => header.title = self.ctx.string_id(&mut self.cursor)?,
                "help" => header.help = self.ctx.string_id(&mut self.cursor)?,
                "classguid" => loop {
                    header.class_guids.push(self.cursor.expect_guid()?);
                    if !self.cursor.eat(TokenKind::Pipe) {
                        break;
                    }
                },
                "class" => header.class = Some(self.class_value(CLASS_NAMES)?),
                "subclass" => header.subclass = Some(self.class_value(SUBCLASS_NAMES)?),
                other => {
                    return Err(CompileError::syntax(
                        format!("unknown formset attribute '{}'", other),
                        key,
                    ));
                }
            }
            self.cursor.eat(TokenKind::Comma);
        }
    }

    fn class_value(&mut self, names: &[(&str, u16)]) -> Result<u16, CompileError> {
        let mut value = 0u16;
        for item in self.cursor.expect_flag_list()? {
            value |= match item {
                cursor::FlagItem::Name(t) => names
                    .iter()
                    .find(|(name, _)| *name == t.text)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| {
                        CompileError::new(
                            CompileErrorKind::InvalidValue,
                            format!("unknown class '{}'", t.text),
                            t,
                        )
                    })?,
                cursor::FlagItem::Number(v, t) => u16::try_from(v).map_err(|_| {
                    CompileError::new(
                        CompileErrorKind::Overflow,
                        format!("class {} does not fit in 16 bits", v),
                        t,
                    )
                })?,
            };
        }
        Ok(value)
    }

    /// Items of a formset (or of a formset-level conditional) up to `until`.
    fn formset_body(&mut self, until: &str) -> Vec<OpcodeNode> {
        let mut nodes = Vec::new();
        loop {
            let Some(token) = self.cursor.peek() else {
                self.ctx.report(
                    self.cursor
                        .error(CompileErrorKind::Syntax, format!("missing '{}'", until)),
                );
                return nodes;
            };
            if token.is_word(until) {
                self.cursor.next();
                self.cursor.eat(TokenKind::Semi);
                return nodes;
            }
            if token.is_word("endformset") {
                self.ctx.report(CompileError::new(
                    CompileErrorKind::ScopeMismatch,
                    format!("'endformset' found while '{}' is expected", until),
                    token,
                ));
                return nodes;
            }

            let start = self.cursor.position();
            let result = match token.text {
                "varstore" => self.varstore().map(Some),
                "efivarstore" => self.efivarstore().map(Some),
                "namevaluevarstore" => self.namevaluevarstore().map(Some),
                "defaultstore" => self.defaultstore(),
                "form" | "formmap" => Ok(self.form()),
                "suppressif" | "disableif" => self.formset_conditional(),
                other => Err(CompileError::syntax(
                    format!("unexpected '{}' in formset", other),
                    token,
                )),
            };
            match result {
                Ok(Some(node)) => nodes.push(node),
                Ok(None) => {}
                Err(err) => self.recover_from(err, start),
            }
        }
    }

    /// `suppressif e; ... endif;` around formset items.
    fn formset_conditional(&mut self) -> Result<Option<OpcodeNode>, CompileError> {
        let Some(opener) = self.cursor.next() else {
            return Ok(None);
        };
        let op = match opener.text {
            "suppressif" => Op::SuppressIf,
            _ => Op::DisableIf,
        };
        let condition = compile_expression(&mut self.cursor, &self.ctx)?;
        self.cursor.expect(TokenKind::Semi)?;
        let mut node = OpcodeNode::scoped(op, opener.line);
        node.children.extend(condition.into_nodes());
        node.children.extend(self.formset_body("endif"));
        Ok(Some(node))
    }
}

#[derive(Debug, Default)]
struct FormSetHeader {
    guid: Option<uuid::Uuid>,
    title: u16,
    help: u16,
    class_guids: Vec<uuid::Uuid>,
    class: Option<u16>,
    subclass: Option<u16>,
}

const CLASS_NAMES: &[(&str, u16)] = &[
    ("NON_DEVICE", 0x01),
    ("DISK_DEVICE", 0x02),
    ("VIDEO_DEVICE", 0x04),
    ("NETWORK_DEVICE", 0x08),
    ("INPUT_DEVICE", 0x10),
    ("ONBOARD_DEVICE", 0x20),
    ("OTHER_DEVICE", 0x40),
];

const SUBCLASS_NAMES: &[(&str, u16)] = &[
    ("SETUP_APPLICATION", 0x00),
    ("GENERAL_APPLICATION", 0x01),
    ("FRONT_PAGE", 0x02),
    ("SINGLE_USE", 0x03),
];

/// A Tiano GUID extension record carrying a 16-bit value.
fn tiano_extension(extension: u8, value: u16, line: u32) -> OpcodeNode {
    let mut data = vec![extension];
    data.extend_from_slice(&value.to_le_bytes());
    OpcodeNode::leaf(
        Op::Guid {
            guid: guid::TIANO_EXTENSION,
            data,
        },
        line,
    )
}
