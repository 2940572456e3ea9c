//! Schema operations produced by the diff and rendered by a dialect.

use crate::metadata::{FieldMetadata, KeyRole};

/// All operations the reconciler can ask a dialect to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Create the table with its keys and indexes.
    CreateTable(CreateTableOp),
    /// Add a missing column.
    AddColumn(AddColumnOp),
    /// Redefine or reposition an existing column.
    ModifyColumn(ModifyColumnOp),
    /// Replace the primary key in place.
    ReplacePrimaryKey(ReplacePrimaryKeyOp),
    /// Recreate the table through a temporary copy.
    RebuildTable(RebuildTableOp),
    /// Create a single-column index.
    CreateIndex(CreateIndexOp),
    /// Drop a single-column index.
    DropIndex(DropIndexOp),
}

impl Operation {
    /// The table the operation applies to.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable(op) => &op.table,
            Self::AddColumn(op) => &op.table,
            Self::ModifyColumn(op) => &op.table,
            Self::ReplacePrimaryKey(op) => &op.table,
            Self::RebuildTable(op) => &op.table,
            Self::CreateIndex(op) => &op.table,
            Self::DropIndex(op) => &op.table,
        }
    }
}

/// Column name and DDL type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type expression.
    pub storage_type: String,
}

impl ColumnDef {
    /// Whether the type asks for an auto-incrementing column.
    #[must_use]
    pub fn is_auto_increment(&self) -> bool {
        let upper = self.storage_type.to_ascii_uppercase();
        upper.contains("AUTO_INCREMENT") || upper.contains("AUTOINCREMENT")
    }
}

impl From<&FieldMetadata> for ColumnDef {
    fn from(field: &FieldMetadata) -> Self {
        Self {
            name: field.name.to_string(),
            storage_type: field.storage_type.to_string(),
        }
    }
}

/// Physical placement of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnPosition {
    /// First column of the table.
    First,
    /// Directly after the named column.
    After(String),
}

/// Kind of a single-column index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Unique index, named `KEY_<FIELD>`.
    Unique,
    /// Non-unique index, named `IDX_<FIELD>`.
    Multi,
}

impl IndexKind {
    /// Name prefix of indexes of this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Unique => "KEY_",
            Self::Multi => "IDX_",
        }
    }

    /// Key role backed by this kind of index.
    #[must_use]
    pub const fn role(self) -> KeyRole {
        match self {
            Self::Unique => KeyRole::Unique,
            Self::Multi => KeyRole::Multi,
        }
    }

    /// Detects the kind from a conventional index name.
    #[must_use]
    pub fn from_index_name(name: &str) -> Option<Self> {
        if name.starts_with(Self::Unique.prefix()) {
            Some(Self::Unique)
        } else if name.starts_with(Self::Multi.prefix()) {
            Some(Self::Multi)
        } else {
            None
        }
    }
}

/// A single-column index with its deterministic name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    /// Index name.
    pub name: String,
    /// Indexed column.
    pub column: String,
    /// Index kind.
    pub kind: IndexKind,
}

impl IndexDef {
    /// Index of the given kind over one field.
    #[must_use]
    pub fn for_field(kind: IndexKind, field: &str) -> Self {
        Self {
            name: format!("{}{}", kind.prefix(), field.to_uppercase()),
            column: field.to_string(),
            kind,
        }
    }
}

/// CREATE TABLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableOp {
    /// Table name.
    pub table: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Primary-key columns.
    pub primary_key: Vec<String>,
    /// Unique indexes first, then non-unique ones.
    pub indexes: Vec<IndexDef>,
}

/// ADD COLUMN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddColumnOp {
    /// Table name.
    pub table: String,
    /// New column.
    pub column: ColumnDef,
    /// Placement, when the dialect can position columns.
    pub position: Option<ColumnPosition>,
}

/// MODIFY COLUMN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyColumnOp {
    /// Table name.
    pub table: String,
    /// Column with its declared type.
    pub column: ColumnDef,
    /// Target placement.
    pub position: ColumnPosition,
}

/// In-place primary-key replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacePrimaryKeyOp {
    /// Table name.
    pub table: String,
    /// Whether the table currently has a primary key to drop.
    pub drop_existing: bool,
    /// New primary-key columns. Empty means the key is only dropped.
    pub columns: Vec<String>,
}

/// Recreate a table as `<table>_temp`, copy its rows, drop it and rename
/// the copy back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildTableOp {
    /// Table name.
    pub table: String,
    /// Full declared column list.
    pub columns: Vec<ColumnDef>,
    /// New primary-key columns.
    pub primary_key: Vec<String>,
    /// Columns present in both the old and the new table.
    pub copy_columns: Vec<String>,
}

impl RebuildTableOp {
    /// Name of the temporary table.
    #[must_use]
    pub fn temp_table(&self) -> String {
        format!("{}_temp", self.table)
    }
}

/// CREATE INDEX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateIndexOp {
    /// Table name.
    pub table: String,
    /// Index to create.
    pub index: IndexDef,
}

/// DROP INDEX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropIndexOp {
    /// Table name.
    pub table: String,
    /// Index to drop.
    pub index: IndexDef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_names() {
        let unique = IndexDef::for_field(IndexKind::Unique, "email");
        assert_eq!(unique.name, "KEY_EMAIL");
        assert_eq!(unique.column, "email");

        let multi = IndexDef::for_field(IndexKind::Multi, "group_id");
        assert_eq!(multi.name, "IDX_GROUP_ID");

        assert_eq!(IndexKind::from_index_name("KEY_EMAIL"), Some(IndexKind::Unique));
        assert_eq!(IndexKind::from_index_name("IDX_GROUP_ID"), Some(IndexKind::Multi));
        assert_eq!(IndexKind::from_index_name("sqlite_autoindex_users_1"), None);
    }

    #[test]
    fn test_auto_increment_detection() {
        let column = ColumnDef {
            name: "id".into(),
            storage_type: "int auto_increment".into(),
        };
        assert!(column.is_auto_increment());
        let column = ColumnDef {
            name: "id".into(),
            storage_type: "INTEGER".into(),
        };
        assert!(!column.is_auto_increment());
    }
}
