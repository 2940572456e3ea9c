//! Generic CRUD repository with self-healing schema reconciliation.

use serde::Serialize;
use sqlmend_core::{classify, extract, DdlPlan, Entity, EntityDescription, EntityDescriptor, ErrorCategory};
use tracing::{debug, info, warn};

use crate::error::{ExecError, OrmError, Result, Violation, Violations};
use crate::executor::Executor;
use crate::query::{Columns, Q};
use crate::record::{check_required, flatten, retain_declared, InsertData, Record};
use crate::reconcile;

/// CRUD access to one table described by an entity.
///
/// When the database reports that the table or a column is missing, the
/// repository reconciles the table and returns the original error; the
/// caller decides whether to retry.
///
/// # Example
///
/// ```ignore
/// let users = Repository::for_entity::<User>(executor);
/// let id = users.insert(row).await?;
/// let adults = users.select("id, name", Some(&Q::gte("age", 18))).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Repository<E: Executor> {
    executor: E,
    name: String,
    table: String,
    entity: EntityDescription,
    self_heal: bool,
}

impl<E: Executor> Repository<E> {
    /// Creates a repository for `table`.
    pub fn new(executor: E, table: impl Into<String>, entity: EntityDescription) -> Self {
        let name = table.into();
        Self {
            executor,
            table: name.clone(),
            name,
            entity,
            self_heal: true,
        }
    }

    /// Creates a repository for a derived entity.
    pub fn for_entity<T: Entity>(executor: E) -> Self {
        Self::new(executor, T::TABLE, T::description())
    }

    /// Creates a repository from a runtime descriptor.
    pub fn from_descriptor(executor: E, descriptor: &EntityDescriptor) -> Result<Self> {
        let entity = extract(descriptor)?;
        Ok(Self::new(executor, descriptor.table.clone(), entity))
    }

    /// Enables or disables reconciliation on schema-mismatch errors.
    #[must_use]
    pub fn with_self_heal(mut self, enabled: bool) -> Self {
        self.self_heal = enabled;
        self
    }

    /// Prepends `prefix` to the table name for every statement, including
    /// introspection and reconciliation. Replaces any earlier prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        self.table = format!("{}{}", prefix.as_ref(), self.name);
        self
    }

    /// The table name as used in SQL, prefix included.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The table name without prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The entity description.
    #[must_use]
    pub fn entity(&self) -> &EntityDescription {
        &self.entity
    }

    /// The executor.
    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Reconciles the table now. Returns `true` if any DDL ran.
    pub async fn reconcile(&self) -> Result<bool> {
        reconcile::reconcile(&self.executor, &self.table, &self.entity).await
    }

    /// The DDL a reconciliation would run, without running it.
    pub async fn plan(&self) -> Result<DdlPlan> {
        reconcile::plan(&self.executor, &self.table, &self.entity).await
    }

    /// Inserts one or more rows and returns the last generated id, or 0.
    ///
    /// Composite paths are folded, null values and undeclared fields are
    /// dropped, and every row is checked for its required fields before
    /// anything is written.
    pub async fn insert(&self, data: impl Into<InsertData>) -> Result<i64> {
        let mut rows = Vec::new();
        let mut violations = Violations::default();
        for row in data.into().into_rows() {
            match self.prepare_row(row) {
                Ok(row) => {
                    violations.extend(check_required(&row, &self.entity));
                    rows.push(row);
                }
                Err(found) => violations.extend(found),
            }
        }
        violations.into_result()?;
        if rows.is_empty() {
            return Ok(0);
        }

        debug!(table = %self.table, rows = rows.len(), "Inserting rows");
        match self.executor.insert(&self.table, &rows).await {
            Ok(id) => Ok(id.unwrap_or(0)),
            Err(err) => Err(self.heal(err).await),
        }
    }

    /// Serializes an entity value into a row and inserts it.
    pub async fn insert_entity<T: Serialize>(&self, value: &T) -> Result<i64> {
        let row: Record = serde_json::from_value(serde_json::to_value(value)?)?;
        self.insert(row).await
    }

    /// Updates the rows matching `filter`. Required fields are not enforced.
    pub async fn update(&self, data: Record, filter: &Q) -> Result<u64> {
        let row = self.prepare_row(data).map_err(OrmError::Validation)?;
        if row.is_empty() {
            let mut violations = Violations::default();
            violations.push(Violation::new(
                self.table.clone(),
                format!("{} - no declared fields to update", self.table),
            ));
            return Err(OrmError::Validation(violations));
        }

        match self.executor.update(&self.table, &row, filter).await {
            Ok(count) => Ok(count),
            Err(err) => Err(self.heal(err).await),
        }
    }

    /// Reads every matching row. `columns` is `"*"` or a comma-separated list.
    pub async fn select(&self, columns: &str, filter: Option<&Q>) -> Result<Vec<Record>> {
        let columns = Columns::parse(columns);
        match self.executor.select(&self.table, &columns, filter).await {
            Ok(rows) => Ok(rows),
            Err(err) => Err(self.heal(err).await),
        }
    }

    /// Reads the first matching row.
    pub async fn get(&self, columns: &str, filter: Option<&Q>) -> Result<Option<Record>> {
        let columns = Columns::parse(columns);
        match self.executor.get(&self.table, &columns, filter).await {
            Ok(row) => Ok(row),
            Err(err) => Err(self.heal(err).await),
        }
    }

    /// Counts matching rows.
    pub async fn count(&self, columns: &str, filter: Option<&Q>) -> Result<i64> {
        let columns = Columns::parse(columns);
        match self.executor.count(&self.table, &columns, filter).await {
            Ok(count) => Ok(count),
            Err(err) => Err(self.heal(err).await),
        }
    }

    /// Sums `column` over the matching rows. No rows sum to zero.
    pub async fn sum(&self, column: &str, filter: Option<&Q>) -> Result<f64> {
        match self.executor.sum(&self.table, column, filter).await {
            Ok(total) => Ok(total),
            Err(err) => Err(self.heal(err).await),
        }
    }

    /// Deletes the rows matching `filter`.
    pub async fn delete(&self, filter: &Q) -> Result<u64> {
        match self.executor.delete(&self.table, filter).await {
            Ok(count) => Ok(count),
            Err(err) => Err(self.heal(err).await),
        }
    }

    fn prepare_row(&self, row: Record) -> std::result::Result<Record, Violations> {
        let mut row = flatten(row)?;
        retain_declared(&mut row, &self.entity, &self.table);
        Ok(row)
    }

    /// Classifies an executor error. A schema mismatch triggers one
    /// reconciliation pass; the original error is returned either way.
    async fn heal(&self, err: ExecError) -> OrmError {
        let ExecError::Database(db) = err else {
            return err.into();
        };
        match classify(self.executor.dialect(), &db) {
            ErrorCategory::SchemaMismatch(kind) => {
                if self.self_heal {
                    info!(table = %self.table, kind = ?kind, error = %db, "Schema mismatch, reconciling table");
                    if let Err(reconcile_err) = self.reconcile().await {
                        warn!(table = %self.table, error = %reconcile_err, "Self-heal reconciliation failed");
                    }
                }
                OrmError::SchemaMismatch(db)
            }
            ErrorCategory::ValidationFailure => OrmError::Constraint(db),
            ErrorCategory::Other => OrmError::Database(db),
        }
    }
}
