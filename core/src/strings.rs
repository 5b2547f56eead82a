//! String token resolution.
//!
//! The compiler never sees the string package; it asks a `StringResolver`
//! for the id of each `STRING_TOKEN(NAME)`.

use core::cell::RefCell;

use hashbrown::HashMap;
use thiserror::Error;

use crate::lexer::parse_number;

pub trait StringResolver {
    /// Id of the string named `name`, if known.
    fn resolve(&self, name: &str) -> Option<u16>;
}

impl<R: StringResolver + ?Sized> StringResolver for &R {
    fn resolve(&self, name: &str) -> Option<u16> {
        (**self).resolve(name)
    }
}

/// A fixed name → id map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringTable {
    ids: HashMap<String, u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: expected 'NAME = ID', found '{text}'")]
pub struct StringTableError {
    pub line: usize,
    pub text: String,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, id: u16) {
        self.ids.insert(name.into(), id);
    }

    /// Parse `NAME = ID` lines. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self, StringTableError> {
        let mut table = Self::new();
        for (i, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parsed = line.split_once('=').and_then(|(name, id)| {
                let id = parse_number(id.trim())?;
                Some((name.trim(), u16::try_from(id).ok()?))
            });
            match parsed {
                Some((name, id)) if !name.is_empty() => table.insert(name, id),
                _ => {
                    return Err(StringTableError {
                        line: i + 1,
                        text: line.to_string(),
                    });
                }
            }
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl StringResolver for StringTable {
    fn resolve(&self, name: &str) -> Option<u16> {
        self.ids.get(name).copied()
    }
}

/// Interns every name it is asked about, numbering from 1.
#[derive(Debug, Default)]
pub struct SequentialStrings {
    ids: RefCell<HashMap<String, u16>>,
}

impl SequentialStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interned names ordered by id.
    pub fn entries(&self) -> Vec<(String, u16)> {
        let mut entries: Vec<(String, u16)> = self
            .ids
            .borrow()
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect();
        entries.sort_by_key(|(_, id)| *id);
        entries
    }
}

impl StringResolver for SequentialStrings {
    fn resolve(&self, name: &str) -> Option<u16> {
        let mut ids = self.ids.borrow_mut();
        if let Some(id) = ids.get(name) {
            return Some(*id);
        }
        let id = u16::try_from(ids.len() + 1).ok()?;
        ids.insert(name.to_string(), id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_string_table() {
        let table = StringTable::parse(indoc! {"
            # generated
            STR_TITLE = 0x0002

            STR_HELP = 3
        "})
        .unwrap();
        assert_eq!(table.resolve("STR_TITLE"), Some(2));
        assert_eq!(table.resolve("STR_HELP"), Some(3));
        assert_eq!(table.resolve("STR_MISSING"), None);
    }

    #[test]
    fn test_parse_string_table_error() {
        assert_eq!(
            StringTable::parse("A = 1\nB 2\n"),
            Err(StringTableError {
                line: 2,
                text: "B 2".into(),
            })
        );
        assert!(StringTable::parse("A = 70000").is_err());
    }

    #[test]
    fn test_sequential_strings_intern() {
        let strings = SequentialStrings::new();
        assert_eq!(strings.resolve("STR_A"), Some(1));
        assert_eq!(strings.resolve("STR_B"), Some(2));
        assert_eq!(strings.resolve("STR_A"), Some(1));
        assert_eq!(
            strings.entries(),
            vec![("STR_A".to_string(), 1), ("STR_B".to_string(), 2)]
        );
    }
}
