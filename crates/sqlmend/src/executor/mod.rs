//! Statement execution against a live database.
//!
//! The [`Executor`] trait is the only seam between the repository and the
//! driver. Every call returns its own error; there is no shared last-error
//! state.

mod mysql;
mod sqlite;

pub use mysql::MySqlExecutor;
pub use sqlite::SqliteExecutor;

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use sqlmend_core::DialectKind;

use crate::error::{ExecError, FailedStatement};
use crate::query::{Columns, Q};
use crate::record::Record;

/// Runs statements and CRUD calls for one database.
#[allow(async_fn_in_trait)]
pub trait Executor {
    /// The dialect of the connected database.
    fn dialect(&self) -> DialectKind;

    /// Identifies the pool behind this executor. Clones share it; executors
    /// built separately get distinct scopes even for the same database.
    fn scope(&self) -> u64;

    /// Runs one statement and returns any rows it produced.
    async fn execute(&self, sql: &str) -> Result<Vec<Record>, ExecError>;

    /// Runs the statements in one transaction. The first failure rolls the
    /// whole batch back and is reported with the failing statement.
    async fn execute_atomic(&self, statements: &[&str]) -> Result<(), FailedStatement>;

    /// Inserts the rows in one transaction and returns the last generated id.
    async fn insert(&self, table: &str, rows: &[Record]) -> Result<Option<i64>, ExecError>;

    /// Updates the rows matching `filter`, returning the affected count.
    async fn update(&self, table: &str, data: &Record, filter: &Q) -> Result<u64, ExecError>;

    /// Deletes the rows matching `filter`, returning the affected count.
    async fn delete(&self, table: &str, filter: &Q) -> Result<u64, ExecError>;

    /// Reads every matching row.
    async fn select(
        &self,
        table: &str,
        columns: &Columns,
        filter: Option<&Q>,
    ) -> Result<Vec<Record>, ExecError>;

    /// Reads the first matching row.
    async fn get(
        &self,
        table: &str,
        columns: &Columns,
        filter: Option<&Q>,
    ) -> Result<Option<Record>, ExecError>;

    /// Counts matching rows.
    async fn count(&self, table: &str, columns: &Columns, filter: Option<&Q>)
        -> Result<i64, ExecError>;

    /// Sums one column over the matching rows.
    async fn sum(&self, table: &str, column: &str, filter: Option<&Q>) -> Result<f64, ExecError>;
}

/// Hands out pool scopes.
pub(crate) fn next_scope() -> u64 {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// Reads an aggregate result as a float. Drivers report sums as integers,
/// floats or decimal strings depending on the column type.
pub(crate) fn value_as_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

/// Reads an aggregate result as an integer.
pub(crate) fn value_as_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

/// Implements [`Executor`] for a pool-backed executor.
///
/// The invoking module provides `prepare(sql, params)`, `row_to_record(row)`
/// and `inserted_id(result)` for its driver.
macro_rules! impl_executor {
    ($executor:ty, $kind:expr) => {
        impl $crate::executor::Executor for $executor {
            fn dialect(&self) -> ::sqlmend_core::DialectKind {
                $kind
            }

            fn scope(&self) -> u64 {
                self.scope
            }

            async fn execute(
                &self,
                sql: &str,
            ) -> Result<Vec<$crate::record::Record>, $crate::error::ExecError> {
                ::tracing::debug!(sql = %sql, "Executing SQL");
                let rows = prepare(sql, &[]).fetch_all(&self.pool).await?;
                rows.iter().map(row_to_record).collect()
            }

            async fn execute_atomic(
                &self,
                statements: &[&str],
            ) -> Result<(), $crate::error::FailedStatement> {
                let failed = |statement: &str, err: ::sqlx::Error| $crate::error::FailedStatement {
                    statement: statement.to_string(),
                    error: err.into(),
                };
                let mut tx = self.pool.begin().await.map_err(|e| failed("BEGIN", e))?;
                for &statement in statements {
                    ::tracing::debug!(sql = %statement, "Executing SQL");
                    prepare(statement, &[])
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| failed(statement, e))?;
                }
                tx.commit().await.map_err(|e| failed("COMMIT", e))
            }

            async fn insert(
                &self,
                table: &str,
                rows: &[$crate::record::Record],
            ) -> Result<Option<i64>, $crate::error::ExecError> {
                let dialect = $kind.dialect();
                let mut tx = self.pool.begin().await?;
                let mut last_id = None;
                for row in rows {
                    let (sql, params) = $crate::query::build_insert(dialect, table, row);
                    ::tracing::debug!(sql = %sql, "Executing SQL");
                    let result = prepare(&sql, &params).execute(&mut *tx).await?;
                    last_id = inserted_id(&result);
                }
                tx.commit().await?;
                Ok(last_id)
            }

            async fn update(
                &self,
                table: &str,
                data: &$crate::record::Record,
                filter: &$crate::query::Q,
            ) -> Result<u64, $crate::error::ExecError> {
                let (sql, params) = $crate::query::build_update($kind.dialect(), table, data, filter);
                ::tracing::debug!(sql = %sql, "Executing SQL");
                let result = prepare(&sql, &params).execute(&self.pool).await?;
                Ok(result.rows_affected())
            }

            async fn delete(
                &self,
                table: &str,
                filter: &$crate::query::Q,
            ) -> Result<u64, $crate::error::ExecError> {
                let (sql, params) = $crate::query::build_delete($kind.dialect(), table, filter);
                ::tracing::debug!(sql = %sql, "Executing SQL");
                let result = prepare(&sql, &params).execute(&self.pool).await?;
                Ok(result.rows_affected())
            }

            async fn select(
                &self,
                table: &str,
                columns: &$crate::query::Columns,
                filter: Option<&$crate::query::Q>,
            ) -> Result<Vec<$crate::record::Record>, $crate::error::ExecError> {
                let (sql, params) =
                    $crate::query::build_select($kind.dialect(), table, columns, filter, None);
                ::tracing::debug!(sql = %sql, "Executing SQL");
                let rows = prepare(&sql, &params).fetch_all(&self.pool).await?;
                rows.iter().map(row_to_record).collect()
            }

            async fn get(
                &self,
                table: &str,
                columns: &$crate::query::Columns,
                filter: Option<&$crate::query::Q>,
            ) -> Result<Option<$crate::record::Record>, $crate::error::ExecError> {
                let (sql, params) =
                    $crate::query::build_select($kind.dialect(), table, columns, filter, Some(1));
                ::tracing::debug!(sql = %sql, "Executing SQL");
                let row = prepare(&sql, &params).fetch_optional(&self.pool).await?;
                row.as_ref().map(row_to_record).transpose()
            }

            async fn count(
                &self,
                table: &str,
                columns: &$crate::query::Columns,
                filter: Option<&$crate::query::Q>,
            ) -> Result<i64, $crate::error::ExecError> {
                let (sql, params) = $crate::query::build_count($kind.dialect(), table, columns, filter);
                ::tracing::debug!(sql = %sql, "Executing SQL");
                let row = prepare(&sql, &params).fetch_one(&self.pool).await?;
                let record = row_to_record(&row)?;
                Ok(record.values().next().map_or(0, $crate::executor::value_as_i64))
            }

            async fn sum(
                &self,
                table: &str,
                column: &str,
                filter: Option<&$crate::query::Q>,
            ) -> Result<f64, $crate::error::ExecError> {
                let (sql, params) = $crate::query::build_sum($kind.dialect(), table, column, filter);
                ::tracing::debug!(sql = %sql, "Executing SQL");
                let row = prepare(&sql, &params).fetch_one(&self.pool).await?;
                let record = row_to_record(&row)?;
                Ok(record.values().next().map_or(0.0, $crate::executor::value_as_f64))
            }
        }
    };
}

pub(crate) use impl_executor;
