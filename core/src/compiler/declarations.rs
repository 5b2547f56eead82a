//! Header and formset declarations: `#pragma pack`, struct/union types,
//! variable stores and default stores.

use uuid::Uuid;

use super::Compiler;
use super::cursor::FlagItem;
use super::error::{CompileError, CompileErrorKind};
use crate::emitter::MAX_RECORD_LEN;
use crate::ifr::{OP_HEADER_LEN, Op, OpcodeNode};
use crate::lexer::{Token, TokenKind};
use crate::table::{
    DefaultStoreDecl, FieldDecl, Scalar, StoreKind, StoreShape, SymbolError, TypeKind,
};

const VARIABLE_ATTRIBUTES: &[(&str, u32)] = &[
    ("EFI_VARIABLE_NON_VOLATILE", 0x01),
    ("EFI_VARIABLE_BOOTSERVICE_ACCESS", 0x02),
    ("EFI_VARIABLE_RUNTIME_ACCESS", 0x04),
    ("EFI_VARIABLE_HARDWARE_ERROR_RECORD", 0x08),
    ("EFI_VARIABLE_AUTHENTICATED_WRITE_ACCESS", 0x10),
    ("EFI_VARIABLE_TIME_BASED_AUTHENTICATED_WRITE_ACCESS", 0x20),
    ("EFI_VARIABLE_APPEND_WRITE", 0x40),
];

/// Attributes shared by the store declarations.
#[derive(Default)]
struct StoreAttributes<'t, 'src> {
    id: Option<u16>,
    name: Option<&'t Token<'src>>,
    guid: Option<Uuid>,
    attributes: u32,
    names: Vec<u16>,
}

impl<'t, 'src, 'r> Compiler<'t, 'src, 'r> {
    /// `#pragma pack(N | push [, N] | pop | )`; other pragmas are skipped.
    pub(super) fn pragma(&mut self) -> Result<(), CompileError> {
        let hash = self.cursor.expect(TokenKind::Hash)?;
        self.cursor.expect_word("pragma")?;
        if !self.cursor.at_word("pack") {
            self.ctx.warn("ignoring unsupported #pragma", hash);
            while self.cursor.peek().is_some_and(|t| t.line == hash.line) {
                self.cursor.next();
            }
            return Ok(());
        }
        let pack = self.cursor.expect_word("pack")?;
        self.cursor.expect(TokenKind::LParen)?;

        let types = &mut self.ctx.symbols.types;
        let result = if self.cursor.eat_word("push") {
            let mut value = None;
            while self.cursor.eat(TokenKind::Comma) {
                if self.cursor.at(TokenKind::Number) {
                    value = Some(self.cursor.expect_number()?.0);
                } else {
                    self.cursor.expect_ident()?;
                }
            }
            types.push_pack(value)
        } else if self.cursor.eat_word("pop") {
            if self.cursor.eat(TokenKind::Comma) {
                self.cursor.expect_ident()?;
            }
            types.pop_pack()
        } else if self.cursor.at(TokenKind::Number) {
            let (value, _) = self.cursor.expect_number()?;
            types.set_pack(Some(value))
        } else {
            types.set_pack(None)
        };
        self.cursor.expect(TokenKind::RParen)?;
        if let Err(err) = result {
            self.ctx.report(CompileError::symbol(err, pack));
            return Ok(());
        }
        tracing::trace!(pack = self.ctx.symbols.types.pack(), "pragma pack");
        Ok(())
    }

    /// `typedef struct [Tag] { ... } Name;` or `struct Name { ... };`
    pub(super) fn type_declaration(&mut self) -> Result<(), CompileError> {
        let typedef = self.cursor.eat_word("typedef");
        let kind_token = self.cursor.expect_ident()?;
        let kind = match kind_token.text {
            "struct" => TypeKind::Struct,
            "union" => TypeKind::Union,
            _ => return Err(CompileError::syntax("expected 'struct' or 'union'", kind_token)),
        };
        let tag = if self.cursor.at(TokenKind::Ident) {
            Some(self.cursor.expect_ident()?)
        } else {
            None
        };

        self.cursor.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.cursor.eat(TokenKind::RBrace) {
            fields.push(self.field_declaration()?);
        }

        let name = if typedef {
            self.cursor.expect_ident()?
        } else {
            tag.ok_or_else(|| self.cursor.expected("a type name"))?
        };
        self.cursor.expect(TokenKind::Semi)?;

        self.ctx
            .symbols
            .types
            .declare_type(name.text, kind, &fields)
            .map_err(|err| CompileError::symbol(err, name))?;
        Ok(())
    }

    /// `TYPE name [N] [: W];`
    fn field_declaration(&mut self) -> Result<FieldDecl, CompileError> {
        if self.cursor.at_any_word(&["struct", "union"]) {
            self.cursor.next();
        }
        let ty = self.cursor.expect_ident()?;
        let name = self.cursor.expect_ident()?;
        let mut field = FieldDecl::new(name.text, ty.text);
        if self.cursor.eat(TokenKind::LBracket) {
            field = field.array(self.cursor.expect_number_as("array length")?);
            self.cursor.expect(TokenKind::RBracket)?;
        }
        if self.cursor.eat(TokenKind::Colon) {
            field = field.bits(self.cursor.expect_number_as("bit-field width")?);
        }
        self.cursor.expect(TokenKind::Semi)?;
        Ok(field)
    }

    /// Shape and byte size of a store's declared type.
    fn store_shape(&self, ty: &Token<'_>) -> Result<(StoreShape, u16), CompileError> {
        let (shape, size) = match Scalar::from_name(ty.text) {
            Some(scalar) => (StoreShape::Scalar(scalar), scalar.size()),
            None => {
                let id = self.ctx.symbols.types.lookup(ty.text).ok_or_else(|| {
                    let err = SymbolError::UnknownType {
                        name: ty.text.to_string(),
                    };
                    CompileError::symbol(err, ty)
                })?;
                (StoreShape::Record(id), self.ctx.symbols.types.get(id).size)
            }
        };
        let size = u16::try_from(size).map_err(|_| {
            CompileError::new(
                CompileErrorKind::Overflow,
                format!("'{}' is larger than a store can hold", ty.text),
                ty,
            )
        })?;
        Ok((shape, size))
    }

    /// `key = value,` pairs up to the closing `;`.
    fn store_attributes(&mut self) -> Result<StoreAttributes<'t, 'src>, CompileError> {
        let mut attrs = StoreAttributes::default();
        while !self.cursor.eat(TokenKind::Semi) {
            let key = self.cursor.expect_ident()?;
            self.cursor.expect(TokenKind::Assign)?;
            match key.text {
                "varid" => attrs.id = Some(self.cursor.expect_number_as("varid")?),
                "guid" => attrs.guid = Some(self.cursor.expect_guid()?),
                "attribute" => attrs.attributes = self.variable_attributes()?,
                "varsize" => {
                    self.cursor.expect_number()?;
                }
                "name" if self.cursor.at_word("STRING_TOKEN")
                    || self.cursor.at(TokenKind::Number) =>
                {
                    attrs.names.push(self.ctx.string_id(&mut self.cursor)?);
                }
                "name" => attrs.name = Some(self.cursor.expect_ident()?),
                other => {
                    return Err(CompileError::syntax(
                        format!("unknown variable store attribute '{}'", other),
                        key,
                    ));
                }
            }
            if !self.cursor.eat(TokenKind::Comma) && !self.cursor.at(TokenKind::Semi) {
                return Err(self.cursor.expected("',' or ';'"));
            }
        }
        Ok(attrs)
    }

    fn variable_attributes(&mut self) -> Result<u32, CompileError> {
        let mut value = 0u32;
        for item in self.cursor.expect_flag_list()? {
            value |= match item {
                FlagItem::Name(t) => VARIABLE_ATTRIBUTES
                    .iter()
                    .find(|(name, _)| *name == t.text)
                    .map(|(_, bit)| *bit)
                    .ok_or_else(|| {
                        CompileError::new(
                            CompileErrorKind::InvalidValue,
                            format!("unknown variable attribute '{}'", t.text),
                            t,
                        )
                    })?,
                FlagItem::Number(v, t) => u32::try_from(v).map_err(|_| {
                    CompileError::new(
                        CompileErrorKind::Overflow,
                        format!("attribute {:#x} does not fit in 32 bits", v),
                        t,
                    )
                })?,
            };
        }
        Ok(value)
    }

    fn require_guid(
        &self,
        attrs: &StoreAttributes<'_, '_>,
        at: &Token<'_>,
    ) -> Result<Uuid, CompileError> {
        attrs
            .guid
            .ok_or_else(|| CompileError::syntax("variable store requires 'guid = ...'", at))
    }

    /// `varstore TYPE, [varid = N,] [name = NAME,] guid = G;`
    pub(super) fn varstore(&mut self) -> Result<OpcodeNode, CompileError> {
        let opener = self.cursor.expect_word("varstore")?;
        let ty = self.cursor.expect_ident()?;
        self.cursor.expect(TokenKind::Comma)?;
        let (shape, size) = self.store_shape(ty)?;
        let attrs = self.store_attributes()?;
        let guid = self.require_guid(&attrs, opener)?;
        let name_at = attrs.name.unwrap_or(ty);
        let name = name_at.text.to_string();
        let record = |var_store_id| Op::VarStore {
            guid,
            var_store_id,
            size,
            name: name.clone(),
        };
        check_record_len(&record(0), name_at)?;

        let id = self
            .ctx
            .symbols
            .stores
            .declare(&name, attrs.id, guid, StoreKind::Buffer { shape, size })
            .map_err(|err| CompileError::symbol(err, ty))?;
        Ok(OpcodeNode::leaf(record(id.0), opener.line))
    }

    /// `efivarstore TYPE, [varid = N,] attribute = A, name = NAME, guid = G;`
    pub(super) fn efivarstore(&mut self) -> Result<OpcodeNode, CompileError> {
        let opener = self.cursor.expect_word("efivarstore")?;
        let ty = self.cursor.expect_ident()?;
        self.cursor.expect(TokenKind::Comma)?;
        let (shape, size) = self.store_shape(ty)?;
        let attrs = self.store_attributes()?;
        let guid = self.require_guid(&attrs, opener)?;
        let name_at = attrs
            .name
            .ok_or_else(|| CompileError::syntax("efivarstore requires 'name = ...'", opener))?;
        let name = name_at.text.to_string();
        let record = |var_store_id| Op::VarStoreEfi {
            var_store_id,
            guid,
            attributes: attrs.attributes,
            size,
            name: name.clone(),
        };
        check_record_len(&record(0), name_at)?;

        let id = self
            .ctx
            .symbols
            .stores
            .declare(
                &name,
                attrs.id,
                guid,
                StoreKind::Efi {
                    shape,
                    attributes: attrs.attributes,
                    size,
                },
            )
            .map_err(|err| CompileError::symbol(err, ty))?;
        Ok(OpcodeNode::leaf(record(id.0), opener.line))
    }

    /// `namevaluevarstore NAME, [varid = N,] name = S, ..., guid = G;`
    pub(super) fn namevaluevarstore(&mut self) -> Result<OpcodeNode, CompileError> {
        let opener = self.cursor.expect_word("namevaluevarstore")?;
        let store_name = self.cursor.expect_ident()?;
        self.cursor.expect(TokenKind::Comma)?;
        let attrs = self.store_attributes()?;
        let guid = self.require_guid(&attrs, opener)?;

        let id = self
            .ctx
            .symbols
            .stores
            .declare(
                store_name.text,
                attrs.id,
                guid,
                StoreKind::NameValue { names: attrs.names },
            )
            .map_err(|err| CompileError::symbol(err, store_name))?;
        Ok(OpcodeNode::leaf(
            Op::VarStoreNameValue {
                var_store_id: id.0,
                guid,
            },
            opener.line,
        ))
    }

    /// `defaultstore NAME, prompt = S [, attribute = N];`
    ///
    /// Naming an implicit store only assigns its prompt; its record is
    /// already part of the formset header.
    pub(super) fn defaultstore(&mut self) -> Result<Option<OpcodeNode>, CompileError> {
        let opener = self.cursor.expect_word("defaultstore")?;
        let name = self.cursor.expect_ident()?;
        self.cursor.expect(TokenKind::Comma)?;
        self.cursor.expect_key("prompt")?;
        let prompt = self.ctx.string_id(&mut self.cursor)?;
        let mut id = None;
        if self.cursor.eat(TokenKind::Comma) {
            self.cursor.expect_key("attribute")?;
            id = Some(self.cursor.expect_number_as("default store id")?);
        }
        self.cursor.expect(TokenKind::Semi)?;

        let decl = self
            .ctx
            .symbols
            .defaults
            .declare(name.text, prompt, id)
            .map_err(|err| CompileError::symbol(err, name))?;
        Ok(match decl {
            DefaultStoreDecl::New(default_id) => Some(OpcodeNode::leaf(
                Op::DefaultStore {
                    name: prompt,
                    default_id,
                },
                opener.line,
            )),
            DefaultStoreDecl::Renamed(_) => None,
        })
    }
}

/// Records whose payload grows with the source (store names, formmap
/// methods) must still fit the 7-bit length field.
pub(super) fn check_record_len(op: &Op, at: &Token<'_>) -> Result<(), CompileError> {
    let len = OP_HEADER_LEN + op.payload_len();
    if len > MAX_RECORD_LEN {
        return Err(CompileError::new(
            CompileErrorKind::Overflow,
            format!(
                "{} record would be {} bytes, over the {}-byte limit",
                op.opcode(),
                len,
                MAX_RECORD_LEN
            ),
            at,
        ));
    }
    Ok(())
}
