//! Brings a live table into conformance with an entity description.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use sqlmend_core::{DdlPlan, DdlStep, EntityDescription};
use tracing::{debug, info};

use crate::error::{OrmError, Result};
use crate::executor::Executor;
use crate::introspect::{check_index_owners, introspect};

type LockKey = (u64, String);
type TableLocks = Mutex<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>;

/// Process-wide registry of reconciliation locks, one per pool and table.
fn locks() -> &'static TableLocks {
    static LOCKS: OnceLock<TableLocks> = OnceLock::new();
    LOCKS.get_or_init(Mutex::default)
}

fn acquire(key: &LockKey) -> Arc<tokio::sync::Mutex<()>> {
    let mut locks = locks().lock().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(key.clone()).or_default())
}

/// Forgets the lock once no other caller holds or awaits it.
fn release(key: &LockKey, lock: &Arc<tokio::sync::Mutex<()>>) {
    let mut locks = locks().lock().unwrap_or_else(PoisonError::into_inner);
    // One reference in the registry, one here.
    if Arc::strong_count(lock) == 2 {
        locks.remove(key);
    }
}

/// Computes the DDL that would reconcile `table`, without executing it.
pub async fn plan<E: Executor>(
    executor: &E,
    table: &str,
    entity: &EntityDescription,
) -> Result<DdlPlan> {
    check_index_owners(executor, table, entity).await?;
    let live = introspect(executor, table).await?;
    Ok(sqlmend_core::plan(
        executor.dialect().dialect(),
        table,
        entity,
        &live,
    ))
}

/// Reconciles `table` with `entity`.
///
/// Returns `true` if any DDL ran. Calls for the same table through the same
/// pool are serialized and the live schema is re-read under the lock, so a
/// second caller finds the work already done. Other pools and processes
/// rely on `IF NOT EXISTS`.
pub async fn reconcile<E: Executor>(
    executor: &E,
    table: &str,
    entity: &EntityDescription,
) -> Result<bool> {
    if entity.is_empty() {
        debug!(table = %table, "Entity declares no fields, nothing to reconcile");
        return Ok(false);
    }

    let key = (executor.scope(), table.to_string());
    let lock = acquire(&key);
    let result = {
        let _guard = lock.lock().await;
        reconcile_locked(executor, table, entity).await
    };
    release(&key, &lock);
    result
}

async fn reconcile_locked<E: Executor>(
    executor: &E,
    table: &str,
    entity: &EntityDescription,
) -> Result<bool> {
    check_index_owners(executor, table, entity).await?;
    let live = introspect(executor, table).await?;
    let plan = sqlmend_core::plan(executor.dialect().dialect(), table, entity, &live);
    if plan.is_empty() {
        debug!(table = %table, "Table already conforms");
        return Ok(false);
    }

    if live.exists() {
        info!(
            table = %table,
            statements = plan.statements().len(),
            rebuild = plan.has_rebuild(),
            "Altering table"
        );
    } else {
        info!(table = %table, "Creating table");
    }
    apply(executor, &plan).await?;
    Ok(true)
}

/// Executes a plan step by step. Rebuilds run atomically.
pub async fn apply<E: Executor>(executor: &E, plan: &DdlPlan) -> Result<()> {
    for step in &plan.steps {
        match step {
            DdlStep::Statement(sql) => {
                executor
                    .execute(sql)
                    .await
                    .map_err(|source| OrmError::Ddl {
                        statement: sql.clone(),
                        source,
                    })?;
            }
            DdlStep::Rebuild(rebuild) => {
                executor.execute_atomic(&rebuild.statements()).await?;
            }
        }
    }
    Ok(())
}
