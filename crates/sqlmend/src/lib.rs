//! Lightweight ORM repository with self-healing schema reconciliation.
//!
//! `sqlmend` executes what `sqlmend-core` plans. It provides:
//!
//! - [`Executor`], the seam to the database, with sqlx-backed
//!   [`SqliteExecutor`] and [`MySqlExecutor`],
//! - [`Repository`], CRUD access to one entity's table that validates
//!   required fields and folds `name[key]` paths into JSON columns,
//! - [`reconcile()`], which introspects a table and applies the DDL needed to
//!   match its entity.
//!
//! # Example
//!
//! ```rust,no_run
//! use sqlmend::prelude::*;
//!
//! #[derive(Entity)]
//! #[entity(table = "users", required(name))]
//! struct User {
//!     #[field(type = "INTEGER AUTOINCREMENT", key = "PRI")]
//!     id: i64,
//!     #[field(type = "VARCHAR(64)")]
//!     name: String,
//! }
//!
//! # async fn run() -> sqlmend::Result<()> {
//! let executor = SqliteExecutor::connect("sqlite::memory:").await.map_err(OrmError::from)?;
//! let users = Repository::for_entity::<User>(executor);
//! users.reconcile().await?;
//!
//! let mut row = Record::new();
//! row.insert("name".into(), "Ada".into());
//! let id = users.insert(row).await?;
//! let found = users.get("*", Some(&Q::eq("id", id))).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod executor;
pub mod introspect;
pub mod query;
pub mod reconcile;
pub mod record;
pub mod repository;

pub use error::{ExecError, FailedStatement, OrmError, Result, Violation, Violations};
pub use executor::{Executor, MySqlExecutor, SqliteExecutor};
pub use introspect::introspect;
pub use query::{Columns, Q};
pub use reconcile::{apply, reconcile};
pub use record::{InsertData, Record};
pub use repository::Repository;

pub use sqlmend_core;
pub use sqlmend_derive::Entity;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{OrmError, Result};
    pub use crate::executor::{Executor, MySqlExecutor, SqliteExecutor};
    pub use crate::query::{Columns, Q};
    pub use crate::record::{InsertData, Record};
    pub use crate::repository::Repository;
    pub use sqlmend_core::{DialectKind, Entity, EntityDescription, FieldMetadata, KeyRole};
    pub use sqlmend_derive::Entity;
}
