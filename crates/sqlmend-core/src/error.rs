//! Error types shared by the metadata layer and the error classifier.

use std::fmt;

/// Errors raised while turning an entity descriptor into field metadata.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// The descriptor has no table name.
    #[error("Entity descriptor has an empty table name")]
    MissingTable,

    /// A field annotation is not valid structured data.
    #[error("Invalid annotation on field '{field}': {message}")]
    InvalidAnnotation {
        /// Field carrying the annotation.
        field: String,
        /// Parser message.
        message: String,
    },

    /// A field annotation does not declare a storage type.
    #[error("Annotation on field '{field}' has no storage type")]
    MissingType {
        /// Field carrying the annotation.
        field: String,
    },

    /// A field annotation declares a key role other than PRI, UNI or MUL.
    #[error("Annotation on field '{field}' has unknown key role '{key}'")]
    UnknownKeyRole {
        /// Field carrying the annotation.
        field: String,
        /// The rejected key role.
        key: String,
    },

    /// The same field name is declared twice.
    #[error("Field '{0}' is declared more than once")]
    DuplicateField(String),

    /// A required field does not exist on the entity.
    #[error("Required field '{field}' is not declared on entity '{table}'")]
    UnknownRequiredField {
        /// Entity table name.
        table: String,
        /// The undeclared field.
        field: String,
    },
}

/// A database error as reported by a dialect driver.
///
/// `sql_state` is the five character SQLSTATE when the driver exposes one,
/// `code` is the dialect's native numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DbError {
    /// SQLSTATE, if any.
    pub sql_state: Option<String>,
    /// Native error code (MySQL errno, SQLite result code).
    pub code: Option<i64>,
    /// Driver message.
    pub message: String,
}

impl DbError {
    /// Creates an error with only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            sql_state: None,
            code: None,
            message: message.into(),
        }
    }

    /// Sets the native error code.
    #[must_use]
    pub const fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// Sets the SQLSTATE.
    #[must_use]
    pub fn with_sql_state(mut self, sql_state: impl Into<String>) -> Self {
        self.sql_state = Some(sql_state.into());
        self
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.sql_state, self.code) {
            (Some(state), Some(code)) => write!(f, "[{state}] ({code}) {}", self.message),
            (Some(state), None) => write!(f, "[{state}] {}", self.message),
            (None, Some(code)) => write!(f, "({code}) {}", self.message),
            (None, None) => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DbError {}

/// Result type for metadata operations.
pub type Result<T> = std::result::Result<T, MetadataError>;
