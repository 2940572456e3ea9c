//! Rendered DDL, ready for execution.

use std::fmt;

/// The four statements of a table rebuild. They must run as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRebuild {
    /// Creates the temporary table with the new definition.
    pub create_temp: String,
    /// Copies the rows over. `None` when the tables share no column.
    pub copy_rows: Option<String>,
    /// Drops the original table.
    pub drop_original: String,
    /// Renames the temporary table to the original name.
    pub rename_temp: String,
}

impl TableRebuild {
    /// The statements in execution order.
    #[must_use]
    pub fn statements(&self) -> Vec<&str> {
        let mut statements = vec![self.create_temp.as_str()];
        if let Some(copy) = &self.copy_rows {
            statements.push(copy);
        }
        statements.push(&self.drop_original);
        statements.push(&self.rename_temp);
        statements
    }
}

/// One unit of execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlStep {
    /// A single statement.
    Statement(String),
    /// A rebuild that must run atomically.
    Rebuild(TableRebuild),
}

impl DdlStep {
    /// The statements of this step in execution order.
    #[must_use]
    pub fn statements(&self) -> Vec<&str> {
        match self {
            Self::Statement(sql) => vec![sql.as_str()],
            Self::Rebuild(rebuild) => rebuild.statements(),
        }
    }
}

/// Ordered DDL steps for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdlPlan {
    /// Steps in emission order.
    pub steps: Vec<DdlStep>,
}

impl DdlPlan {
    /// Appends a single statement.
    pub fn push(&mut self, sql: impl Into<String>) {
        self.steps.push(DdlStep::Statement(sql.into()));
    }

    /// Appends a rebuild.
    pub fn push_rebuild(&mut self, rebuild: TableRebuild) {
        self.steps.push(DdlStep::Rebuild(rebuild));
    }

    /// Returns `true` if there is nothing to execute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Returns `true` if the plan contains a table rebuild.
    #[must_use]
    pub fn has_rebuild(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, DdlStep::Rebuild(_)))
    }

    /// Every statement, flattened, in execution order.
    #[must_use]
    pub fn statements(&self) -> Vec<&str> {
        self.steps.iter().flat_map(DdlStep::statements).collect()
    }
}

impl fmt::Display for DdlPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            match step {
                DdlStep::Statement(sql) => writeln!(f, "{sql};")?,
                DdlStep::Rebuild(rebuild) => {
                    writeln!(f, "BEGIN;")?;
                    for sql in rebuild.statements() {
                        writeln!(f, "{sql};")?;
                    }
                    writeln!(f, "COMMIT;")?;
                }
            }
        }
        Ok(())
    }
}
