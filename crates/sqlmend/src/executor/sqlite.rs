//! SQLite executor.

use std::str::FromStr;

use serde_json::Value;
use sqlmend_core::DialectKind;
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteConnectOptions, SqlitePool, SqliteQueryResult, SqliteRow,
};
use sqlx::{Column, Row, TypeInfo, ValueRef};

use super::{impl_executor, next_scope};
use crate::error::ExecError;
use crate::record::Record;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Executes statements on a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
    scope: u64,
}

impl SqliteExecutor {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            scope: next_scope(),
        }
    }

    /// Connects to `url`, e.g. `sqlite:app.db` or `sqlite::memory:`.
    /// The database file is created if it does not exist.
    pub async fn connect(url: &str) -> Result<Self, ExecError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        Ok(Self::new(SqlitePool::connect_with(options).await?))
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl_executor!(SqliteExecutor, DialectKind::Sqlite);

fn prepare<'q>(sql: &'q str, params: &[Value]) -> SqliteQuery<'q> {
    params
        .iter()
        .fold(sqlx::query(sql), bind_value)
}

/// Binds a JSON value. Objects and arrays are stored as JSON text.
fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(value.to_string()),
    }
}

fn inserted_id(result: &SqliteQueryResult) -> Option<i64> {
    Some(result.last_insert_rowid())
}

/// Decodes a row by storage class.
fn row_to_record(row: &SqliteRow) -> Result<Record, ExecError> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" | "BOOLEAN" | "INT8" | "BIGINT" => {
                    Value::from(row.try_get_unchecked::<i64, _>(index)?)
                }
                "REAL" => Value::from(row.try_get_unchecked::<f64, _>(index)?),
                "BLOB" => {
                    let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
                    Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
                _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
            }
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}
