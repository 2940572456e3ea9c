//! MySQL dialect.

use std::sync::LazyLock;

use regex::Regex;

use super::{DialectKind, SchemaDialect};
use crate::operation::{
    ColumnDef, ColumnPosition, CreateTableOp, IndexDef, IndexKind, Operation,
};
use crate::plan::DdlPlan;

/// MySQL DDL: one `CREATE TABLE` with inline indexes, and every change to an
/// existing table batched into a single `ALTER TABLE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    fn position(&self, position: Option<&ColumnPosition>) -> String {
        match position {
            None => String::new(),
            Some(ColumnPosition::First) => " FIRST".to_string(),
            Some(ColumnPosition::After(previous)) => {
                format!(" AFTER {}", self.quote_identifier(previous))
            }
        }
    }

    fn index_clause(&self, index: &IndexDef) -> String {
        let keyword = match index.kind {
            IndexKind::Unique => "UNIQUE KEY",
            IndexKind::Multi => "INDEX",
        };
        format!(
            "{keyword} {} ({}) USING BTREE",
            self.quote_identifier(&index.name),
            self.quote_identifier(&index.column)
        )
    }

    fn create_table(&self, op: &CreateTableOp, if_not_exists: bool) -> String {
        let mut parts: Vec<String> = op
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        if !op.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", self.column_list(&op.primary_key)));
        }
        parts.extend(op.indexes.iter().map(|i| self.index_clause(i)));
        format!(
            "CREATE TABLE {}{} ({})",
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            self.quote_identifier(&op.table),
            parts.join(", ")
        )
    }

    fn alter_clause(&self, operation: &Operation) -> Option<String> {
        let clause = match operation {
            Operation::AddColumn(op) => format!(
                "ADD COLUMN {}{}",
                self.column_definition(&op.column),
                self.position(op.position.as_ref())
            ),
            Operation::ModifyColumn(op) => format!(
                "MODIFY COLUMN {}{}",
                self.column_definition(&op.column),
                self.position(Some(&op.position))
            ),
            Operation::ReplacePrimaryKey(op) => {
                let mut parts = Vec::new();
                if op.drop_existing {
                    parts.push("DROP PRIMARY KEY".to_string());
                }
                if !op.columns.is_empty() {
                    parts.push(format!("ADD PRIMARY KEY ({})", self.column_list(&op.columns)));
                }
                parts.join(", ")
            }
            Operation::CreateIndex(op) => format!("ADD {}", self.index_clause(&op.index)),
            Operation::DropIndex(op) => {
                format!("DROP INDEX {}", self.quote_identifier(&op.index.name))
            }
            Operation::CreateTable(_) | Operation::RebuildTable(_) => return None,
        };
        Some(clause)
    }
}

impl SchemaDialect for MySqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn supports_alter_column(&self) -> bool {
        true
    }

    fn supports_alter_primary_key(&self) -> bool {
        true
    }

    fn types_match(&self, declared: &str, live: &str) -> bool {
        let (declared, live) = (normalize_mysql_type(declared), normalize_mysql_type(live));
        // MariaDB stores JSON as LONGTEXT and reports it that way.
        declared == live || matches!((declared.as_str(), live.as_str()), ("json", "longtext"))
    }

    fn create_table_sql(
        &self,
        table: &str,
        columns: &[ColumnDef],
        primary_key: &[String],
        if_not_exists: bool,
    ) -> String {
        let op = CreateTableOp {
            table: table.to_string(),
            columns: columns.to_vec(),
            primary_key: primary_key.to_vec(),
            indexes: Vec::new(),
        };
        self.create_table(&op, if_not_exists)
    }

    fn render(&self, operations: &[Operation]) -> DdlPlan {
        let mut plan = DdlPlan::default();
        let mut batch: Option<(&str, Vec<String>)> = None;

        let flush = |plan: &mut DdlPlan, batch: &mut Option<(&str, Vec<String>)>| {
            if let Some((table, clauses)) = batch.take() {
                plan.push(format!(
                    "ALTER TABLE {} {}",
                    self.quote_identifier(table),
                    clauses.join(", ")
                ));
            }
        };

        for operation in operations {
            match operation {
                Operation::CreateTable(op) => {
                    flush(&mut plan, &mut batch);
                    plan.push(self.create_table(op, true));
                }
                Operation::RebuildTable(op) => {
                    flush(&mut plan, &mut batch);
                    plan.push_rebuild(self.rebuild_table(op));
                }
                other => {
                    let Some(clause) = self.alter_clause(other) else {
                        continue;
                    };
                    let table = other.table();
                    if batch.as_ref().is_some_and(|(t, _)| *t != table) {
                        flush(&mut plan, &mut batch);
                    }
                    batch
                        .get_or_insert_with(|| (table, Vec::new()))
                        .1
                        .push(clause);
                }
            }
        }
        flush(&mut plan, &mut batch);
        plan
    }
}

static INT_DISPLAY_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(tinyint|smallint|mediumint|int|bigint)\(\d+\)").expect("valid int width regex")
});

/// Words that end the data type part of a column definition.
const CONSTRAINT_WORDS: &[&str] = &[
    "not",
    "null",
    "default",
    "auto_increment",
    "primary",
    "unique",
    "key",
    "comment",
    "collate",
    "character",
    "charset",
    "on",
    "check",
    "references",
    "generated",
    "as",
    "invisible",
    "visible",
];

/// Reduces a MySQL column type to the form `DESCRIBE` reports.
///
/// Constraint words are cut off, synonyms are folded, integer display
/// widths are dropped (except `tinyint(1)`) and implicit lengths are filled
/// in, so `INT(11) UNSIGNED NOT NULL` and `int unsigned` compare equal, as
/// do `DECIMAL` and `decimal(10,0)`.
#[must_use]
pub fn normalize_mysql_type(column_type: &str) -> String {
    let lowered = column_type.to_ascii_lowercase().replace(", ", ",");
    let words: Vec<&str> = lowered
        .split_whitespace()
        .take_while(|w| !CONSTRAINT_WORDS.contains(w))
        .collect();
    let mut base = words.join(" ");

    for (synonym, canonical) in [
        ("double precision", "double"),
        ("integer", "int"),
        ("boolean", "tinyint(1)"),
        ("bool", "tinyint(1)"),
        ("numeric", "decimal"),
        ("dec", "decimal"),
        ("real", "double"),
    ] {
        if let Some(rest) = base.strip_prefix(synonym) {
            if rest.is_empty() || rest.starts_with(['(', ' ']) {
                base = format!("{canonical}{rest}");
                break;
            }
        }
    }

    if base.starts_with("tinyint(1)") {
        return base;
    }
    with_default_length(&INT_DISPLAY_WIDTH.replace(&base, "$1"))
}

/// Spells out the length MySQL assumes when a type is declared without one.
fn with_default_length(base: &str) -> String {
    let (head, rest) = base.split_once(' ').unwrap_or((base, ""));
    let head = match head {
        "decimal" => "decimal(10,0)".to_string(),
        "char" | "binary" | "bit" => format!("{head}(1)"),
        _ => match head.strip_prefix("decimal(").and_then(|p| p.strip_suffix(')')) {
            Some(precision) if !precision.contains(',') => format!("decimal({precision},0)"),
            _ => head.to_string(),
        },
    };
    if rest.is_empty() {
        head
    } else {
        format!("{head} {rest}")
    }
}
