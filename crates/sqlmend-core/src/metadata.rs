//! Entity field metadata.
//!
//! An [`EntityDescription`] is the static, ordered list of persisted fields
//! of one entity. Field order matters: it is the column order used by
//! `CREATE TABLE` and the `FIRST` / `AFTER` chain used when altering.

use std::borrow::Cow;
use std::fmt;

/// Index membership of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyRole {
    /// Not part of any key.
    #[default]
    None,
    /// Member of the primary key (`PRI`).
    Primary,
    /// Carries a single-column unique index (`UNI`).
    Unique,
    /// Carries a single-column non-unique index (`MUL`).
    Multi,
}

impl KeyRole {
    /// Parses the three letter key code used by annotations and by
    /// MySQL's `DESCRIBE` output. An empty code means [`KeyRole::None`].
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        if code.is_empty() {
            Some(Self::None)
        } else if code.eq_ignore_ascii_case("PRI") {
            Some(Self::Primary)
        } else if code.eq_ignore_ascii_case("UNI") {
            Some(Self::Unique)
        } else if code.eq_ignore_ascii_case("MUL") {
            Some(Self::Multi)
        } else {
            None
        }
    }

    /// Returns the key code, or `None` for [`KeyRole::None`].
    #[must_use]
    pub const fn code(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Primary => Some("PRI"),
            Self::Unique => Some("UNI"),
            Self::Multi => Some("MUL"),
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code().unwrap_or(""))
    }
}

/// Metadata of one persisted field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMetadata {
    /// Column name.
    pub name: Cow<'static, str>,
    /// Column type expression in the dialect's DDL, e.g. `INT AUTO_INCREMENT`.
    pub storage_type: Cow<'static, str>,
    /// Index membership.
    pub key_role: KeyRole,
    /// Whether inserts must supply a non-empty value.
    pub required: bool,
    /// Message reported when a required value is missing.
    pub required_message: Option<Cow<'static, str>>,
}

impl FieldMetadata {
    /// Creates field metadata from owned parts.
    #[must_use]
    pub fn new(name: impl Into<String>, storage_type: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            storage_type: Cow::Owned(storage_type.into()),
            key_role: KeyRole::None,
            required: false,
            required_message: None,
        }
    }

    /// Creates field metadata in a `const` context. Used by `#[derive(Entity)]`.
    #[must_use]
    pub const fn from_static(
        name: &'static str,
        storage_type: &'static str,
        key_role: KeyRole,
        required: bool,
        required_message: Option<&'static str>,
    ) -> Self {
        Self {
            name: Cow::Borrowed(name),
            storage_type: Cow::Borrowed(storage_type),
            key_role,
            required,
            required_message: match required_message {
                Some(message) => Some(Cow::Borrowed(message)),
                None => None,
            },
        }
    }

    /// Sets the key role.
    #[must_use]
    pub const fn key(mut self, role: KeyRole) -> Self {
        self.key_role = role;
        self
    }

    /// Marks the field as required, with an optional message.
    #[must_use]
    pub fn required(mut self, message: Option<impl Into<String>>) -> Self {
        self.required = true;
        self.required_message = message.map(|m| Cow::Owned(m.into()));
        self
    }

    /// Label used in validation errors: the custom message, else the name.
    #[must_use]
    pub fn required_label(&self) -> &str {
        self.required_message.as_deref().unwrap_or(&self.name)
    }

    /// Whether the storage type asks for an auto-incrementing column.
    #[must_use]
    pub fn is_auto_increment(&self) -> bool {
        let upper = self.storage_type.to_ascii_uppercase();
        upper.contains("AUTO_INCREMENT") || upper.contains("AUTOINCREMENT")
    }
}

/// Ordered field metadata of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityDescription {
    fields: Cow<'static, [FieldMetadata]>,
}

impl EntityDescription {
    /// Wraps a static field list.
    #[must_use]
    pub const fn from_static(fields: &'static [FieldMetadata]) -> Self {
        Self {
            fields: Cow::Borrowed(fields),
        }
    }

    /// Creates a description from owned fields.
    #[must_use]
    pub fn new(fields: Vec<FieldMetadata>) -> Self {
        Self {
            fields: Cow::Owned(fields),
        }
    }

    /// All fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldMetadata] {
        &self.fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` if a field with this name is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns `true` if no field is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of declared fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_ref())
    }

    /// Names of the fields with the given key role, in declaration order.
    #[must_use]
    pub fn keys(&self, role: KeyRole) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.key_role == role)
            .map(|f| f.name.as_ref())
            .collect()
    }

    /// Primary-key field names.
    #[must_use]
    pub fn primary_keys(&self) -> Vec<&str> {
        self.keys(KeyRole::Primary)
    }

    /// Unique-index field names.
    #[must_use]
    pub fn unique_keys(&self) -> Vec<&str> {
        self.keys(KeyRole::Unique)
    }

    /// Multi-index field names.
    #[must_use]
    pub fn multi_keys(&self) -> Vec<&str> {
        self.keys(KeyRole::Multi)
    }

    /// Fields that inserts must supply.
    pub fn required(&self) -> impl Iterator<Item = &FieldMetadata> {
        self.fields.iter().filter(|f| f.required)
    }
}

/// A type with a statically known table and field description.
///
/// Usually implemented with `#[derive(Entity)]`.
pub trait Entity {
    /// Table the entity is stored in.
    const TABLE: &'static str;

    /// Ordered field metadata.
    fn description() -> EntityDescription;
}
