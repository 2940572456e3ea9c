//! Reads the live schema of a table.

use serde_json::Value;
use sqlmend_core::operation::{IndexDef, IndexKind};
use sqlmend_core::{
    classify, DialectKind, EntityDescription, ErrorCategory, KeyRole, LiveSchema,
    SchemaMismatchKind,
};
use tracing::debug;

use crate::error::{ExecError, OrmError, Result};
use crate::executor::Executor;
use crate::record::Record;

/// Introspects `table` through the executor.
///
/// A missing table yields [`LiveSchema::missing`]. The result is never
/// cached; every call reads the database again.
pub async fn introspect<E: Executor>(executor: &E, table: &str) -> Result<LiveSchema> {
    let live = match executor.dialect() {
        DialectKind::MySql => describe_mysql(executor, table).await?,
        DialectKind::Sqlite => describe_sqlite(executor, table).await?,
    };
    debug!(
        table = %table,
        exists = live.exists(),
        columns = live.fields.len(),
        "Introspected table"
    );
    Ok(live)
}

/// `DESCRIBE` lists columns in order with their type and key role.
async fn describe_mysql<E: Executor>(executor: &E, table: &str) -> Result<LiveSchema> {
    let sql = format!("DESCRIBE {}", DialectKind::MySql.dialect().quote_identifier(table));
    let rows = match executor.execute(&sql).await {
        Ok(rows) => rows,
        Err(ExecError::Database(db))
            if classify(DialectKind::MySql, &db)
                == ErrorCategory::SchemaMismatch(SchemaMismatchKind::TableMissing) =>
        {
            return Ok(LiveSchema::missing());
        }
        Err(err) => return Err(err.into()),
    };

    let mut live = LiveSchema::missing();
    for row in &rows {
        let Some(name) = text(row, "Field") else {
            continue;
        };
        let role = text(row, "Key")
            .and_then(|key| KeyRole::from_code(&key))
            .unwrap_or_default();
        live.push_column(name, text(row, "Type"), role);
    }
    Ok(live)
}

/// `PRAGMA table_info` gives columns and the primary key; single-column
/// indexes following the `KEY_` / `IDX_` naming give the other roles.
async fn describe_sqlite<E: Executor>(executor: &E, table: &str) -> Result<LiveSchema> {
    let dialect = DialectKind::Sqlite.dialect();
    let quoted = dialect.quote_identifier(table);

    let columns = executor
        .execute(&format!("PRAGMA table_info({quoted})"))
        .await?;
    let mut live = LiveSchema::missing();
    for row in &columns {
        let Some(name) = text(row, "name") else {
            continue;
        };
        let role = if integer(row, "pk") > 0 {
            KeyRole::Primary
        } else {
            KeyRole::None
        };
        live.push_column(name, text(row, "type"), role);
    }
    if !live.exists() {
        return Ok(live);
    }

    let indexes = executor
        .execute(&format!("PRAGMA index_list({quoted})"))
        .await?;
    for index in &indexes {
        let Some(name) = text(index, "name") else {
            continue;
        };
        let Some(kind) = IndexKind::from_index_name(&name) else {
            continue;
        };
        let members = executor
            .execute(&format!(
                "PRAGMA index_info({})",
                dialect.quote_identifier(&name)
            ))
            .await?;
        if let [member] = members.as_slice() {
            if let Some(column) = text(member, "name") {
                live.add_key(&column, kind.role());
            }
        }
    }
    Ok(live)
}

/// Fails with [`OrmError::IndexConflict`] when an index `entity` declares
/// for `table` is already owned by another table.
///
/// SQLite index names are global to the database, so `CREATE INDEX IF NOT
/// EXISTS` would otherwise skip the index silently. MySQL scopes index names
/// per table and always passes.
pub async fn check_index_owners<E: Executor>(
    executor: &E,
    table: &str,
    entity: &EntityDescription,
) -> Result<()> {
    if executor.dialect() != DialectKind::Sqlite {
        return Ok(());
    }
    let declared: Vec<IndexDef> = [IndexKind::Unique, IndexKind::Multi]
        .into_iter()
        .flat_map(|kind| {
            entity
                .keys(kind.role())
                .into_iter()
                .map(move |field| IndexDef::for_field(kind, field))
        })
        .collect();
    if declared.is_empty() {
        return Ok(());
    }

    let indexes = executor
        .execute("SELECT name, tbl_name FROM sqlite_master WHERE type = 'index'")
        .await?;
    for index in &indexes {
        let (Some(name), Some(owner)) = (text(index, "name"), text(index, "tbl_name")) else {
            continue;
        };
        if owner.eq_ignore_ascii_case(table) {
            continue;
        }
        if declared.iter().any(|d| d.name.eq_ignore_ascii_case(&name)) {
            return Err(OrmError::IndexConflict {
                index: name,
                table: table.to_string(),
                owner,
            });
        }
    }
    Ok(())
}

fn text(row: &Record, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn integer(row: &Record, column: &str) -> i64 {
    row.get(column).map_or(0, crate::executor::value_as_i64)
}
