//! Entity metadata and schema reconciliation planning.
//!
//! `sqlmend-core` is the I/O-free half of sqlmend. It knows how to
//!
//! - describe the persisted fields of an entity ([`EntityDescription`]),
//!   either statically with `#[derive(Entity)]` or at runtime from an
//!   [`EntityDescriptor`],
//! - compare that description with a [`LiveSchema`] read from the database,
//! - render the difference as dialect-specific DDL ([`DdlPlan`]),
//! - classify driver errors so callers can tell a schema mismatch from any
//!   other failure.
//!
//! # Example
//!
//! ```rust
//! use sqlmend_core::prelude::*;
//!
//! let entity = EntityDescription::new(vec![
//!     FieldMetadata::new("id", "INT AUTO_INCREMENT").key(KeyRole::Primary),
//!     FieldMetadata::new("email", "VARCHAR(255)").key(KeyRole::Unique),
//! ]);
//!
//! let plan = plan(&MySqlDialect, "users", &entity, &LiveSchema::missing());
//! assert_eq!(
//!     plan.statements(),
//!     vec![
//!         "CREATE TABLE IF NOT EXISTS `users` (`id` INT AUTO_INCREMENT, \
//!          `email` VARCHAR(255), PRIMARY KEY (`id`), \
//!          UNIQUE KEY `KEY_EMAIL` (`email`) USING BTREE)"
//!     ]
//! );
//! ```

pub mod classify;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod extract;
pub mod live;
pub mod metadata;
pub mod operation;
pub mod plan;

pub use classify::{classify, ErrorCategory, SchemaMismatchKind};
pub use dialect::{DialectKind, MySqlDialect, SchemaDialect, SqliteDialect};
pub use diff::{diff, plan};
pub use error::{DbError, MetadataError};
pub use extract::{extract, EntityDescriptor, FieldDescriptor, RequiredDescriptor};
pub use live::LiveSchema;
pub use metadata::{Entity, EntityDescription, FieldMetadata, KeyRole};
pub use plan::{DdlPlan, DdlStep, TableRebuild};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::classify::{classify, ErrorCategory, SchemaMismatchKind};
    pub use crate::dialect::{DialectKind, MySqlDialect, SchemaDialect, SqliteDialect};
    pub use crate::diff::{diff, plan};
    pub use crate::error::{DbError, MetadataError};
    pub use crate::extract::{extract, EntityDescriptor};
    pub use crate::live::LiveSchema;
    pub use crate::metadata::{Entity, EntityDescription, FieldMetadata, KeyRole};
    pub use crate::operation::Operation;
    pub use crate::plan::{DdlPlan, DdlStep};
}
