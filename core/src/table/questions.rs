//! Question and rule registries.

use hashbrown::{HashMap, HashSet};

use super::error::SymbolError;
use super::stores::VarStoreInfo;
use crate::ifr::OpCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: u16,
    pub name: Option<String>,
    /// `varid` text as written, e.g. `MyVar.Flag`.
    pub var_id: Option<String>,
    pub var: Option<VarStoreInfo>,
    pub kind: OpCode,
    pub form_id: u16,
}

/// Questions of the current formset, findable by name or varid text.
#[derive(Debug, Clone, Default)]
pub struct QuestionTable {
    questions: Vec<Question>,
    by_name: HashMap<String, usize>,
    by_var_id: HashMap<String, usize>,
    used: HashSet<u16>,
}

impl QuestionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Look a question up by name, then by varid text.
    pub fn find(&self, reference: &str) -> Option<&Question> {
        self.by_name
            .get(reference)
            .or_else(|| self.by_var_id.get(reference))
            .map(|&i| &self.questions[i])
    }

    pub fn by_id(&self, id: u16) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Check that `name` and `explicit_id` are free and pick the id the
    /// question will get, without registering it.
    pub fn reserve(&self, name: Option<&str>, explicit_id: Option<u16>) -> Result<u16, SymbolError> {
        if let Some(name) = name.filter(|n| self.by_name.contains_key(*n)) {
            return Err(SymbolError::DuplicateQuestion {
                name: name.to_string(),
            });
        }
        match explicit_id {
            Some(id) if id == 0 || self.used.contains(&id) => {
                Err(SymbolError::DuplicateQuestionId { id })
            }
            Some(id) => Ok(id),
            None => (1..=u16::MAX)
                .find(|id| !self.used.contains(id))
                .ok_or_else(|| SymbolError::Overflow {
                    what: "question ids".into(),
                    limit: u16::MAX as u64,
                }),
        }
    }

    /// Register a question whose id came from [`QuestionTable::reserve`].
    pub fn insert(&mut self, question: Question) {
        tracing::trace!(id = question.id, name = ?question.name, "declared question");
        let index = self.questions.len();
        self.used.insert(question.id);
        if let Some(name) = &question.name {
            self.by_name.insert(name.clone(), index);
        }
        if let Some(var_id) = &question.var_id {
            self.by_var_id.entry(var_id.clone()).or_insert(index);
        }
        self.questions.push(question);
    }
}

/// Rules, numbered from 0 in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<String>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str) -> Result<u8, SymbolError> {
        if self.get(name).is_some() {
            return Err(SymbolError::DuplicateRule {
                name: name.to_string(),
            });
        }
        let id = u8::try_from(self.rules.len()).map_err(|_| SymbolError::Overflow {
            what: "rule ids".into(),
            limit: u8::MAX as u64,
        })?;
        self.rules.push(name.to_string());
        Ok(id)
    }

    pub fn get(&self, name: &str) -> Option<u8> {
        self.rules.iter().position(|r| r == name).map(|i| i as u8)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.rules
            .iter()
            .enumerate()
            .map(|(i, name)| (i as u8, name.as_str()))
    }
}
