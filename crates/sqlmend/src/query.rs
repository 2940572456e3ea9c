//! Q objects and CRUD statement builders.
//!
//! Q objects allow building filter expressions that can be combined with
//! AND, OR and NOT. Every builder returns the SQL text with `?`
//! placeholders together with the values to bind, in order.

use std::fmt;

use serde_json::Value;
use sqlmend_core::{DialectKind, SchemaDialect};

use crate::record::Record;

/// A filter expression that can be combined with other expressions.
///
/// # Example
///
/// ```rust
/// use sqlmend::Q;
/// use sqlmend_core::SqliteDialect;
///
/// let filter = Q::eq("status", "active").and(Q::gt("age", 18).or(Q::eq("verified", true)));
/// let (sql, params) = filter.build(&SqliteDialect);
/// assert_eq!(sql, "(\"status\" = ?) AND ((\"age\" > ?) OR (\"verified\" = ?))");
/// assert_eq!(params.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Q {
    expr: FilterExpr,
}

/// Internal filter expression representation.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// Simple comparison: field op value
    Comparison {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// IS NULL check
    IsNull { field: String },
    /// IS NOT NULL check
    IsNotNull { field: String },
    /// IN list check
    InList { field: String, values: Vec<Value> },
    /// LIKE pattern match
    Like { field: String, pattern: String },
    /// AND combination
    And(Box<FilterExpr>, Box<FilterExpr>),
    /// OR combination
    Or(Box<FilterExpr>, Box<FilterExpr>),
    /// NOT negation
    Not(Box<FilterExpr>),
    /// Raw SQL expression (use with caution)
    Raw { sql: String, params: Vec<Value> },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (=)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Gte,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Lte,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq => write!(f, "="),
            Self::Ne => write!(f, "!="),
            Self::Gt => write!(f, ">"),
            Self::Gte => write!(f, ">="),
            Self::Lt => write!(f, "<"),
            Self::Lte => write!(f, "<="),
        }
    }
}

impl Q {
    fn compare(field: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            expr: FilterExpr::Comparison {
                field: field.to_string(),
                op,
                value: value.into(),
            },
        }
    }

    /// Creates an equality filter (field = value).
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    /// Creates an inequality filter (field != value).
    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    /// Creates a greater-than filter (field > value).
    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    /// Creates a greater-than-or-equal filter (field >= value).
    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gte, value)
    }

    /// Creates a less-than filter (field < value).
    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    /// Creates a less-than-or-equal filter (field <= value).
    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lte, value)
    }

    /// Creates an IS NULL filter.
    #[must_use]
    pub fn is_null(field: &str) -> Self {
        Self {
            expr: FilterExpr::IsNull {
                field: field.to_string(),
            },
        }
    }

    /// Creates an IS NOT NULL filter.
    #[must_use]
    pub fn is_not_null(field: &str) -> Self {
        Self {
            expr: FilterExpr::IsNotNull {
                field: field.to_string(),
            },
        }
    }

    /// Creates an IN list filter. An empty list matches nothing.
    pub fn in_list<V: Into<Value>>(field: &str, values: Vec<V>) -> Self {
        Self {
            expr: FilterExpr::InList {
                field: field.to_string(),
                values: values.into_iter().map(Into::into).collect(),
            },
        }
    }

    /// Creates a LIKE filter. Use `%` for wildcard matching.
    #[must_use]
    pub fn like(field: &str, pattern: &str) -> Self {
        Self {
            expr: FilterExpr::Like {
                field: field.to_string(),
                pattern: pattern.to_string(),
            },
        }
    }

    /// Creates a raw SQL filter expression.
    ///
    /// **Warning**: Use parameterized values to prevent SQL injection.
    #[must_use]
    pub fn raw(sql: &str, params: Vec<Value>) -> Self {
        Self {
            expr: FilterExpr::Raw {
                sql: sql.to_string(),
                params,
            },
        }
    }

    /// Combines this filter with another using AND.
    #[must_use]
    pub fn and(self, other: Q) -> Q {
        Q {
            expr: FilterExpr::And(Box::new(self.expr), Box::new(other.expr)),
        }
    }

    /// Combines this filter with another using OR.
    #[must_use]
    pub fn or(self, other: Q) -> Q {
        Q {
            expr: FilterExpr::Or(Box::new(self.expr), Box::new(other.expr)),
        }
    }

    /// Negates this filter with NOT.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Q {
        Q {
            expr: FilterExpr::Not(Box::new(self.expr)),
        }
    }

    /// Builds the SQL WHERE clause and parameters.
    #[must_use]
    pub fn build(&self, dialect: &dyn SchemaDialect) -> (String, Vec<Value>) {
        build_filter_expr(&self.expr, dialect)
    }
}

fn build_filter_expr(expr: &FilterExpr, dialect: &dyn SchemaDialect) -> (String, Vec<Value>) {
    let quote = |field: &str| dialect.quote_identifier(field);
    match expr {
        FilterExpr::Comparison { field, op, value } => {
            (format!("{} {op} ?", quote(field)), vec![value.clone()])
        }
        FilterExpr::IsNull { field } => (format!("{} IS NULL", quote(field)), vec![]),
        FilterExpr::IsNotNull { field } => (format!("{} IS NOT NULL", quote(field)), vec![]),
        FilterExpr::InList { values, .. } if values.is_empty() => ("1 = 0".to_string(), vec![]),
        FilterExpr::InList { field, values } => {
            let placeholders: Vec<&str> = values.iter().map(|_| "?").collect();
            (
                format!("{} IN ({})", quote(field), placeholders.join(", ")),
                values.clone(),
            )
        }
        FilterExpr::Like { field, pattern } => (
            format!("{} LIKE ?", quote(field)),
            vec![Value::String(pattern.clone())],
        ),
        FilterExpr::And(left, right) => {
            let (left_sql, mut left_params) = build_filter_expr(left, dialect);
            let (right_sql, right_params) = build_filter_expr(right, dialect);
            left_params.extend(right_params);
            (format!("({left_sql}) AND ({right_sql})"), left_params)
        }
        FilterExpr::Or(left, right) => {
            let (left_sql, mut left_params) = build_filter_expr(left, dialect);
            let (right_sql, right_params) = build_filter_expr(right, dialect);
            left_params.extend(right_params);
            (format!("({left_sql}) OR ({right_sql})"), left_params)
        }
        FilterExpr::Not(inner) => {
            let (inner_sql, params) = build_filter_expr(inner, dialect);
            (format!("NOT ({inner_sql})"), params)
        }
        FilterExpr::Raw { sql, params } => (sql.clone(), params.clone()),
    }
}

/// The column list of a read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Columns {
    /// Every column (`*`).
    #[default]
    All,
    /// The named columns or expressions, in order.
    List(Vec<String>),
}

impl Columns {
    /// Normalizes a column string: `"*"` or blank selects every column,
    /// anything else is split on commas and trimmed.
    #[must_use]
    pub fn parse(columns: &str) -> Self {
        let columns = columns.trim();
        if columns.is_empty() || columns == "*" {
            return Self::All;
        }
        let list: Vec<String> = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        if list.is_empty() {
            Self::All
        } else {
            Self::List(list)
        }
    }

    /// Renders the list. Plain identifiers are quoted, expressions such as
    /// `COUNT(*)` pass through as written.
    #[must_use]
    pub fn render(&self, dialect: &dyn SchemaDialect) -> String {
        match self {
            Self::All => "*".to_string(),
            Self::List(list) => list
                .iter()
                .map(|c| render_column(c, dialect))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<&str> for Columns {
    fn from(columns: &str) -> Self {
        Self::parse(columns)
    }
}

fn render_column(column: &str, dialect: &dyn SchemaDialect) -> String {
    if is_identifier(column) {
        dialect.quote_identifier(column)
    } else {
        column.to_string()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn where_clause(filter: Option<&Q>, dialect: &dyn SchemaDialect) -> (String, Vec<Value>) {
    match filter {
        Some(q) => {
            let (sql, params) = q.build(dialect);
            (format!(" WHERE {sql}"), params)
        }
        None => (String::new(), vec![]),
    }
}

/// Builds an INSERT for one row.
///
/// An empty row inserts defaults only.
#[must_use]
pub fn build_insert(dialect: &dyn SchemaDialect, table: &str, row: &Record) -> (String, Vec<Value>) {
    let table = dialect.quote_identifier(table);
    if row.is_empty() {
        let sql = match dialect.kind() {
            DialectKind::Sqlite => format!("INSERT INTO {table} DEFAULT VALUES"),
            DialectKind::MySql => format!("INSERT INTO {table} () VALUES ()"),
        };
        return (sql, vec![]);
    }
    let columns: Vec<String> = row.keys().map(|c| dialect.quote_identifier(c)).collect();
    let placeholders: Vec<&str> = row.keys().map(|_| "?").collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );
    (sql, row.values().cloned().collect())
}

/// Builds an UPDATE of the given columns for the rows matching `filter`.
#[must_use]
pub fn build_update(
    dialect: &dyn SchemaDialect,
    table: &str,
    data: &Record,
    filter: &Q,
) -> (String, Vec<Value>) {
    let assignments: Vec<String> = data
        .keys()
        .map(|c| format!("{} = ?", dialect.quote_identifier(c)))
        .collect();
    let mut params: Vec<Value> = data.values().cloned().collect();
    let (where_sql, where_params) = where_clause(Some(filter), dialect);
    params.extend(where_params);
    (
        format!(
            "UPDATE {} SET {}{where_sql}",
            dialect.quote_identifier(table),
            assignments.join(", ")
        ),
        params,
    )
}

/// Builds a DELETE for the rows matching `filter`.
#[must_use]
pub fn build_delete(dialect: &dyn SchemaDialect, table: &str, filter: &Q) -> (String, Vec<Value>) {
    let (where_sql, params) = where_clause(Some(filter), dialect);
    (
        format!("DELETE FROM {}{where_sql}", dialect.quote_identifier(table)),
        params,
    )
}

/// Builds a SELECT, optionally limited.
#[must_use]
pub fn build_select(
    dialect: &dyn SchemaDialect,
    table: &str,
    columns: &Columns,
    filter: Option<&Q>,
    limit: Option<u64>,
) -> (String, Vec<Value>) {
    let (where_sql, params) = where_clause(filter, dialect);
    let mut sql = format!(
        "SELECT {} FROM {}{where_sql}",
        columns.render(dialect),
        dialect.quote_identifier(table)
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    (sql, params)
}

/// Builds a COUNT. A single named column counts its non-null values.
#[must_use]
pub fn build_count(
    dialect: &dyn SchemaDialect,
    table: &str,
    columns: &Columns,
    filter: Option<&Q>,
) -> (String, Vec<Value>) {
    let target = match columns {
        Columns::List(list) if list.len() == 1 => render_column(&list[0], dialect),
        _ => "*".to_string(),
    };
    let (where_sql, params) = where_clause(filter, dialect);
    (
        format!(
            "SELECT COUNT({target}) FROM {}{where_sql}",
            dialect.quote_identifier(table)
        ),
        params,
    )
}

/// Builds a SUM of one column. No matching rows sums to zero.
#[must_use]
pub fn build_sum(
    dialect: &dyn SchemaDialect,
    table: &str,
    column: &str,
    filter: Option<&Q>,
) -> (String, Vec<Value>) {
    let (where_sql, params) = where_clause(filter, dialect);
    (
        format!(
            "SELECT COALESCE(SUM({}), 0) FROM {}{where_sql}",
            render_column(column.trim(), dialect),
            dialect.quote_identifier(table)
        ),
        params,
    )
}
