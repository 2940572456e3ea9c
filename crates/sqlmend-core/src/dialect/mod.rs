//! Dialect-specific DDL rendering.
//!
//! The diff decides *what* must change; a [`SchemaDialect`] decides what
//! it may do in place and renders the operations into statements.

mod mysql;
mod sqlite;

pub use mysql::{normalize_mysql_type, MySqlDialect};
pub use sqlite::SqliteDialect;

use std::fmt;

use crate::metadata::EntityDescription;
use crate::operation::{ColumnDef, Operation, RebuildTableOp};
use crate::plan::{DdlPlan, TableRebuild};

/// The supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    /// MySQL and MariaDB.
    MySql,
    /// SQLite.
    Sqlite,
}

impl DialectKind {
    /// Picks the dialect from a connection URL scheme.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split(':').next()?.to_ascii_lowercase();
        match scheme.as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// The renderer for this dialect.
    #[must_use]
    pub fn dialect(self) -> &'static dyn SchemaDialect {
        match self {
            Self::MySql => &MySqlDialect,
            Self::Sqlite => &SqliteDialect,
        }
    }

    /// Lower-case dialect name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// DDL capabilities and rendering of one database engine.
pub trait SchemaDialect: Send + Sync {
    /// Which engine this is.
    fn kind(&self) -> DialectKind;

    /// Quotes an identifier (table, column or index name).
    fn quote_identifier(&self, name: &str) -> String;

    /// Whether columns can be redefined and positioned in place
    /// (`MODIFY COLUMN ... FIRST | AFTER`).
    fn supports_alter_column(&self) -> bool;

    /// Whether the primary key can be replaced without rebuilding the table.
    fn supports_alter_primary_key(&self) -> bool;

    /// Whether a declared type and the type reported by introspection
    /// describe the same column. Dialects that do not report types accept
    /// everything.
    fn types_match(&self, declared: &str, live: &str) -> bool {
        let _ = (declared, live);
        true
    }

    /// The primary key as this dialect materializes it.
    fn effective_primary_key<'a>(&self, entity: &'a EntityDescription) -> Vec<&'a str> {
        entity.primary_keys()
    }

    /// Column definition inside CREATE TABLE or ADD COLUMN.
    fn column_definition(&self, column: &ColumnDef) -> String {
        format!(
            "{} {}",
            self.quote_identifier(&column.name),
            column.storage_type
        )
    }

    /// Comma-separated, quoted column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// CREATE TABLE without secondary indexes.
    fn create_table_sql(
        &self,
        table: &str,
        columns: &[ColumnDef],
        primary_key: &[String],
        if_not_exists: bool,
    ) -> String;

    /// The four statements of a table rebuild.
    fn rebuild_table(&self, op: &RebuildTableOp) -> TableRebuild {
        let temp = op.temp_table();
        let copy_rows = if op.copy_columns.is_empty() {
            None
        } else {
            let list = self.column_list(&op.copy_columns);
            Some(format!(
                "INSERT INTO {} ({list}) SELECT {list} FROM {}",
                self.quote_identifier(&temp),
                self.quote_identifier(&op.table)
            ))
        };
        TableRebuild {
            create_temp: self.create_table_sql(&temp, &op.columns, &op.primary_key, false),
            copy_rows,
            drop_original: format!("DROP TABLE {}", self.quote_identifier(&op.table)),
            rename_temp: format!(
                "ALTER TABLE {} RENAME TO {}",
                self.quote_identifier(&temp),
                self.quote_identifier(&op.table)
            ),
        }
    }

    /// Renders operations into an executable plan.
    fn render(&self, operations: &[Operation]) -> DdlPlan;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(
            DialectKind::from_url("mysql://root@localhost/app"),
            Some(DialectKind::MySql)
        );
        assert_eq!(
            DialectKind::from_url("sqlite::memory:"),
            Some(DialectKind::Sqlite)
        );
        assert_eq!(
            DialectKind::from_url("SQLITE:app.db"),
            Some(DialectKind::Sqlite)
        );
        assert_eq!(DialectKind::from_url("postgres://localhost"), None);
        assert_eq!(DialectKind::Sqlite.dialect().kind(), DialectKind::Sqlite);
        assert_eq!(DialectKind::MySql.to_string(), "mysql");
    }
}
