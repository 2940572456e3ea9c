//! SQLite dialect.

use super::{DialectKind, SchemaDialect};
use crate::metadata::EntityDescription;
use crate::operation::{ColumnDef, IndexDef, IndexKind, Operation};
use crate::plan::DdlPlan;

/// SQLite DDL.
///
/// SQLite cannot reposition or redefine columns, cannot alter a primary key
/// in place and accepts a single clause per `ALTER TABLE`, so every change is
/// its own statement and primary-key changes go through a table rebuild.
/// Auto-increment columns become `INTEGER PRIMARY KEY AUTOINCREMENT`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    fn create_index(&self, table: &str, index: &IndexDef) -> String {
        let unique = match index.kind {
            IndexKind::Unique => "UNIQUE ",
            IndexKind::Multi => "",
        };
        format!(
            "CREATE {unique}INDEX IF NOT EXISTS {} ON {} ({})",
            self.quote_identifier(&index.name),
            self.quote_identifier(table),
            self.quote_identifier(&index.column)
        )
    }
}

impl SchemaDialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn supports_alter_column(&self) -> bool {
        false
    }

    fn supports_alter_primary_key(&self) -> bool {
        false
    }

    /// An auto-increment column is the whole primary key; SQLite cannot
    /// combine `AUTOINCREMENT` with a composite key.
    fn effective_primary_key<'a>(&self, entity: &'a EntityDescription) -> Vec<&'a str> {
        entity
            .fields()
            .iter()
            .find(|f| f.is_auto_increment())
            .map_or_else(|| entity.primary_keys(), |f| vec![f.name.as_ref()])
    }

    fn column_definition(&self, column: &ColumnDef) -> String {
        let storage_type = if column.is_auto_increment() {
            "INTEGER PRIMARY KEY AUTOINCREMENT"
        } else {
            column.storage_type.as_str()
        };
        format!("{} {storage_type}", self.quote_identifier(&column.name))
    }

    fn create_table_sql(
        &self,
        table: &str,
        columns: &[ColumnDef],
        primary_key: &[String],
        if_not_exists: bool,
    ) -> String {
        let mut parts: Vec<String> = columns.iter().map(|c| self.column_definition(c)).collect();
        let inline_key = columns.iter().any(ColumnDef::is_auto_increment);
        if !inline_key && !primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.column_list(primary_key)));
        }
        format!(
            "CREATE TABLE {}{} ({})",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.quote_identifier(table),
            parts.join(", ")
        )
    }

    fn render(&self, operations: &[Operation]) -> DdlPlan {
        let mut plan = DdlPlan::default();
        for operation in operations {
            match operation {
                Operation::CreateTable(op) => {
                    plan.push(self.create_table_sql(&op.table, &op.columns, &op.primary_key, true));
                    for index in &op.indexes {
                        plan.push(self.create_index(&op.table, index));
                    }
                }
                Operation::AddColumn(op) => plan.push(format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    self.quote_identifier(&op.table),
                    self.column_definition(&op.column)
                )),
                Operation::RebuildTable(op) => plan.push_rebuild(self.rebuild_table(op)),
                Operation::CreateIndex(op) => plan.push(self.create_index(&op.table, &op.index)),
                Operation::DropIndex(op) => plan.push(format!(
                    "DROP INDEX IF EXISTS {}",
                    self.quote_identifier(&op.index.name)
                )),
                // The diff never asks SQLite for these; a rebuild covers them.
                Operation::ModifyColumn(_) | Operation::ReplacePrimaryKey(_) => {}
            }
        }
        plan
    }
}
