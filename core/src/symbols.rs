//! Symbol side-table returned with a compiled package.

use core::fmt;

use uuid::Uuid;

use crate::table::{StoreKind, SymbolTable};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSymbol {
    pub id: u16,
    pub name: Option<String>,
    pub var_id: Option<String>,
    pub form_id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSymbol {
    pub id: u16,
    pub name: String,
    pub guid: Uuid,
    /// `varstore`, `efivarstore` or `namevaluevarstore`.
    pub kind: &'static str,
}

/// Names and ids assigned during compilation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolMap {
    pub forms: Vec<u16>,
    pub questions: Vec<QuestionSymbol>,
    pub rules: Vec<(String, u8)>,
    pub stores: Vec<StoreSymbol>,
    pub default_stores: Vec<(String, u16)>,
}

impl SymbolMap {
    /// Id of a question by name or `varid` text.
    pub fn question_id(&self, reference: &str) -> Option<u16> {
        self.questions
            .iter()
            .find(|q| q.name.as_deref() == Some(reference) || q.var_id.as_deref() == Some(reference))
            .map(|q| q.id)
    }

    pub fn rule_id(&self, name: &str) -> Option<u8> {
        self.rules.iter().find(|(n, _)| n == name).map(|(_, id)| *id)
    }

    pub fn store_id(&self, name: &str) -> Option<u16> {
        self.stores.iter().find(|s| s.name == name).map(|s| s.id)
    }
}

impl From<&SymbolTable> for SymbolMap {
    fn from(table: &SymbolTable) -> Self {
        let mut questions: Vec<QuestionSymbol> = table
            .questions
            .iter()
            .map(|q| QuestionSymbol {
                id: q.id,
                name: q.name.clone(),
                var_id: q.var_id.clone(),
                form_id: q.form_id,
            })
            .collect();
        questions.sort_by_key(|q| q.id);

        SymbolMap {
            forms: table.forms.clone(),
            questions,
            rules: table
                .rules
                .iter()
                .map(|(id, name)| (name.to_string(), id))
                .collect(),
            stores: table
                .stores
                .iter()
                .map(|s| StoreSymbol {
                    id: s.id.0,
                    name: s.name.clone(),
                    guid: s.guid,
                    kind: match s.kind {
                        StoreKind::Buffer { .. } => "varstore",
                        StoreKind::Efi { .. } => "efivarstore",
                        StoreKind::NameValue { .. } => "namevaluevarstore",
                    },
                })
                .collect(),
            default_stores: table
                .defaults
                .iter()
                .map(|d| (d.name.clone(), d.id))
                .collect(),
        }
    }
}

impl fmt::Display for SymbolMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, id) in &self.default_stores {
            writeln!(f, "defaultstore {:#06x} {}", id, name)?;
        }
        for store in &self.stores {
            writeln!(
                f,
                "{} {:#06x} {} {{{}}}",
                store.kind, store.id, store.name, store.guid
            )?;
        }
        for id in &self.forms {
            writeln!(f, "form {:#06x}", id)?;
        }
        for q in &self.questions {
            write!(f, "question {:#06x} form={:#06x}", q.id, q.form_id)?;
            if let Some(name) = &q.name {
                write!(f, " name={}", name)?;
            }
            if let Some(var_id) = &q.var_id {
                write!(f, " varid={}", var_id)?;
            }
            writeln!(f)?;
        }
        for (name, id) in &self.rules {
            writeln!(f, "rule {:#04x} {}", id, name)?;
        }
        Ok(())
    }
}
