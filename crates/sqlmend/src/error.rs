//! Error types for executors and repositories.

use std::fmt;

use sqlmend_core::{DbError, MetadataError};

/// Errors reported by an [`Executor`](crate::executor::Executor).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    /// The database rejected a statement.
    #[error("{0}")]
    Database(DbError),

    /// The connection could not be established or was lost.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Any other driver failure (decoding, protocol, configuration).
    #[error("Driver error: {0}")]
    Driver(String),
}

impl From<sqlx::Error> for ExecError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => Self::Database(database_error(db.as_ref())),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connectivity(err.to_string()),
            other => Self::Driver(other.to_string()),
        }
    }
}

/// Pulls the SQLSTATE and native code out of a driver error.
///
/// MySQL exposes both; SQLite reports its extended result code through
/// `code()`.
fn database_error(db: &dyn sqlx::error::DatabaseError) -> DbError {
    let mut error = DbError::new(db.message());
    if let Some(mysql) = db.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
        error = error.with_code(i64::from(mysql.number()));
        if let Some(state) = mysql.code() {
            error = error.with_sql_state(state);
        }
    } else if let Some(code) = db.code().and_then(|c| c.parse::<i64>().ok()) {
        error = error.with_code(code);
    }
    error
}

/// A statement that failed inside an atomic batch.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{error} (while executing: {statement})")]
pub struct FailedStatement {
    /// The statement that failed.
    pub statement: String,
    /// Why it failed.
    pub error: ExecError,
}

/// A required field that was missing or empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Field name.
    pub field: String,
    /// Human readable message.
    pub message: String,
}

impl Violation {
    /// Creates a violation.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Every violation found in one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(pub Vec<Violation>);

impl Violations {
    /// Returns `true` if nothing was violated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records a violation.
    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    /// Appends every violation from `other`.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Names of the offending fields, in discovery order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|v| v.field.as_str())
    }

    /// Returns `Ok(())` when empty, otherwise the violations as an error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(OrmError::Validation(self))
        }
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join(", "))
    }
}

/// Errors that can occur in repository and reconciliation operations.
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    /// Input failed required-field validation; nothing was written.
    #[error("Validation failed: {0}")]
    Validation(Violations),

    /// The live table did not match the entity. Reconciliation has run;
    /// the original database error is returned unchanged.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(DbError),

    /// The row was rejected by a column constraint.
    #[error("Constraint violation: {0}")]
    Constraint(DbError),

    /// Any other database error.
    #[error("Database error: {0}")]
    Database(DbError),

    /// A reconciliation statement failed.
    #[error("DDL statement failed: {statement}: {source}")]
    Ddl {
        /// The failing statement.
        statement: String,
        /// Executor error.
        source: ExecError,
    },

    /// A declared index name is already taken by another table. SQLite
    /// index names are global to the database.
    #[error("Index {index} for table {table} already belongs to table {owner}")]
    IndexConflict {
        /// Index name.
        index: String,
        /// Table being reconciled.
        table: String,
        /// Table that owns the index.
        owner: String,
    },

    /// The database could not be reached.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Driver failure outside of the database itself.
    #[error("Driver error: {0}")]
    Driver(String),

    /// The entity description could not be built.
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// A value could not be serialized into a row.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrmError {
    /// The underlying database error, if this error carries one.
    #[must_use]
    pub fn db_error(&self) -> Option<&DbError> {
        match self {
            Self::SchemaMismatch(e) | Self::Constraint(e) | Self::Database(e) => Some(e),
            Self::Ddl {
                source: ExecError::Database(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}

/// Unclassified conversion: database errors become [`OrmError::Database`].
impl From<ExecError> for OrmError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::Database(db) => Self::Database(db),
            ExecError::Connectivity(message) => Self::Connectivity(message),
            ExecError::Driver(message) => Self::Driver(message),
        }
    }
}

impl From<FailedStatement> for OrmError {
    fn from(failed: FailedStatement) -> Self {
        Self::Ddl {
            statement: failed.statement,
            source: failed.error,
        }
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, OrmError>;
