//! Maps dialect-native database errors to semantic categories.

use crate::dialect::DialectKind;
use crate::error::DbError;

/// What kind of schema mismatch an error reveals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaMismatchKind {
    /// The table does not exist.
    TableMissing,
    /// A referenced column does not exist.
    ColumnMissing,
    /// A write collided on a primary or unique key.
    DuplicateKey,
}

/// Semantic category of a database error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// The live table does not match the entity; reconciliation may help.
    SchemaMismatch(SchemaMismatchKind),
    /// The row was rejected by a column constraint.
    ValidationFailure,
    /// Anything else.
    Other,
}

impl ErrorCategory {
    /// Returns `true` for schema mismatches.
    #[must_use]
    pub const fn is_schema_mismatch(self) -> bool {
        matches!(self, Self::SchemaMismatch(_))
    }
}

mod mysql {
    pub const NO_SUCH_TABLE: i64 = 1146;
    pub const BAD_FIELD: i64 = 1054;
    pub const DUP_ENTRY: i64 = 1062;
    pub const BAD_NULL: i64 = 1048;
    pub const NO_DEFAULT_FOR_FIELD: i64 = 1364;
    pub const DATA_TOO_LONG: i64 = 1406;
    pub const STATE_NO_SUCH_TABLE: &str = "42S02";
    pub const STATE_BAD_FIELD: &str = "42S22";
}

mod sqlite {
    pub const ERROR: i64 = 1;
    pub const CONSTRAINT: i64 = 19;
    pub const CONSTRAINT_CHECK: i64 = 275;
    pub const CONSTRAINT_NOTNULL: i64 = 1299;
}

/// Classifies a database error reported by the given dialect.
#[must_use]
pub fn classify(dialect: DialectKind, error: &DbError) -> ErrorCategory {
    match dialect {
        DialectKind::MySql => classify_mysql(error),
        DialectKind::Sqlite => classify_sqlite(error),
    }
}

fn classify_mysql(error: &DbError) -> ErrorCategory {
    match (error.code, error.sql_state.as_deref()) {
        (Some(mysql::NO_SUCH_TABLE), _) | (_, Some(mysql::STATE_NO_SUCH_TABLE)) => {
            ErrorCategory::SchemaMismatch(SchemaMismatchKind::TableMissing)
        }
        (Some(mysql::BAD_FIELD), _) | (_, Some(mysql::STATE_BAD_FIELD)) => {
            ErrorCategory::SchemaMismatch(SchemaMismatchKind::ColumnMissing)
        }
        (Some(mysql::DUP_ENTRY), _) => {
            ErrorCategory::SchemaMismatch(SchemaMismatchKind::DuplicateKey)
        }
        (Some(mysql::BAD_NULL | mysql::NO_DEFAULT_FOR_FIELD | mysql::DATA_TOO_LONG), _) => {
            ErrorCategory::ValidationFailure
        }
        _ => ErrorCategory::Other,
    }
}

fn classify_sqlite(error: &DbError) -> ErrorCategory {
    let message = error.message.to_ascii_lowercase();
    match error.code {
        Some(sqlite::ERROR) if message.contains("no such table") => {
            ErrorCategory::SchemaMismatch(SchemaMismatchKind::TableMissing)
        }
        Some(sqlite::ERROR)
            if message.contains("no such column") || message.contains("has no column named") =>
        {
            ErrorCategory::SchemaMismatch(SchemaMismatchKind::ColumnMissing)
        }
        Some(sqlite::CONSTRAINT_NOTNULL | sqlite::CONSTRAINT_CHECK) => {
            ErrorCategory::ValidationFailure
        }
        Some(sqlite::CONSTRAINT) if message.contains("not null") || message.contains("check") => {
            ErrorCategory::ValidationFailure
        }
        _ => ErrorCategory::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mysql_error(code: i64, state: &str) -> DbError {
        DbError::new("mysql says no").with_code(code).with_sql_state(state)
    }

    #[test]
    fn test_mysql_schema_mismatch_codes() {
        assert_eq!(
            classify(DialectKind::MySql, &mysql_error(1146, "42S02")),
            ErrorCategory::SchemaMismatch(SchemaMismatchKind::TableMissing)
        );
        assert_eq!(
            classify(DialectKind::MySql, &mysql_error(1054, "42S22")),
            ErrorCategory::SchemaMismatch(SchemaMismatchKind::ColumnMissing)
        );
        assert_eq!(
            classify(DialectKind::MySql, &mysql_error(1062, "23000")),
            ErrorCategory::SchemaMismatch(SchemaMismatchKind::DuplicateKey)
        );
        assert_eq!(
            classify(DialectKind::MySql, &DbError::new("x").with_sql_state("42S02")),
            ErrorCategory::SchemaMismatch(SchemaMismatchKind::TableMissing)
        );
    }

    #[test]
    fn test_mysql_validation_and_other() {
        assert_eq!(
            classify(DialectKind::MySql, &mysql_error(1048, "23000")),
            ErrorCategory::ValidationFailure
        );
        assert_eq!(
            classify(DialectKind::MySql, &mysql_error(1406, "22001")),
            ErrorCategory::ValidationFailure
        );
        assert_eq!(
            classify(DialectKind::MySql, &mysql_error(1045, "28000")),
            ErrorCategory::Other
        );
    }

    #[test]
    fn test_sqlite_codes() {
        let missing_table = DbError::new("no such table: users").with_code(1);
        assert_eq!(
            classify(DialectKind::Sqlite, &missing_table),
            ErrorCategory::SchemaMismatch(SchemaMismatchKind::TableMissing)
        );

        let missing_column = DbError::new("table users has no column named age").with_code(1);
        assert_eq!(
            classify(DialectKind::Sqlite, &missing_column),
            ErrorCategory::SchemaMismatch(SchemaMismatchKind::ColumnMissing)
        );

        let missing_column = DbError::new("no such column: age").with_code(1);
        assert!(classify(DialectKind::Sqlite, &missing_column).is_schema_mismatch());

        let not_null = DbError::new("NOT NULL constraint failed: users.name").with_code(1299);
        assert_eq!(
            classify(DialectKind::Sqlite, &not_null),
            ErrorCategory::ValidationFailure
        );

        let syntax = DbError::new("near \"SELEC\": syntax error").with_code(1);
        assert_eq!(classify(DialectKind::Sqlite, &syntax), ErrorCategory::Other);

        let unique = DbError::new("UNIQUE constraint failed: users.email").with_code(2067);
        assert_eq!(classify(DialectKind::Sqlite, &unique), ErrorCategory::Other);
    }
}
