//! Live table schema as observed through introspection.

use std::collections::{BTreeMap, BTreeSet};

use crate::metadata::KeyRole;

/// Columns and key memberships of a table at the instant it was introspected.
///
/// An empty field list means the table does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSchema {
    /// Column names in physical order.
    pub fields: Vec<String>,
    /// Primary-key columns.
    pub primary_keys: BTreeSet<String>,
    /// Columns carrying a single-column unique index.
    pub unique_keys: BTreeSet<String>,
    /// Columns carrying a single-column non-unique index.
    pub multi_keys: BTreeSet<String>,
    /// Column types as reported by the database, when available.
    pub column_types: BTreeMap<String, String>,
}

impl LiveSchema {
    /// A schema describing a missing table.
    #[must_use]
    pub fn missing() -> Self {
        Self::default()
    }

    /// Returns `true` when the table exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Returns `true` if the column exists.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f == name)
    }

    /// Appends a column with its reported type and key role.
    pub fn push_column(&mut self, name: impl Into<String>, column_type: Option<String>, role: KeyRole) {
        let name = name.into();
        if let Some(column_type) = column_type {
            self.column_types.insert(name.clone(), column_type);
        }
        self.add_key(&name, role);
        self.fields.push(name);
    }

    /// Records a key membership for an existing column.
    pub fn add_key(&mut self, name: &str, role: KeyRole) {
        let set = match role {
            KeyRole::None => return,
            KeyRole::Primary => &mut self.primary_keys,
            KeyRole::Unique => &mut self.unique_keys,
            KeyRole::Multi => &mut self.multi_keys,
        };
        set.insert(name.to_string());
    }

    /// The reported type of a column.
    #[must_use]
    pub fn column_type(&self, name: &str) -> Option<&str> {
        self.column_types.get(name).map(String::as_str)
    }

    /// Key set for a role. [`KeyRole::None`] yields an empty set.
    #[must_use]
    pub fn keys(&self, role: KeyRole) -> BTreeSet<&str> {
        let set = match role {
            KeyRole::None => return BTreeSet::new(),
            KeyRole::Primary => &self.primary_keys,
            KeyRole::Unique => &self.unique_keys,
            KeyRole::Multi => &self.multi_keys,
        };
        set.iter().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_columns() {
        let mut live = LiveSchema::missing();
        assert!(!live.exists());

        live.push_column("id", Some("int".into()), KeyRole::Primary);
        live.push_column("email", Some("varchar(255)".into()), KeyRole::Unique);
        live.push_column("note", None, KeyRole::None);

        assert!(live.exists());
        assert_eq!(live.fields, vec!["id", "email", "note"]);
        assert!(live.has_field("note"));
        assert_eq!(live.column_type("email"), Some("varchar(255)"));
        assert_eq!(live.column_type("note"), None);
        assert_eq!(live.keys(KeyRole::Primary), BTreeSet::from(["id"]));
        assert_eq!(live.keys(KeyRole::Unique), BTreeSet::from(["email"]));
        assert!(live.keys(KeyRole::Multi).is_empty());
    }
}
