//! Row maps and composite field paths.
//!
//! A row is a plain [`Record`]. Keys are either a column name or a bracketed
//! path such as `attributes[color]` or `meta[size][label]`; bracketed keys are
//! folded into one nested object stored under the base column.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use sqlmend_core::EntityDescription;
use tracing::warn;

use crate::error::{Violation, Violations};

/// A row: column name to value.
pub type Record = Map<String, Value>;

/// Rows accepted by [`Repository::insert`](crate::Repository::insert).
#[derive(Debug, Clone, PartialEq)]
pub enum InsertData {
    /// A single row.
    One(Record),
    /// Several rows, validated together and written in one batch.
    Many(Vec<Record>),
}

impl InsertData {
    /// The rows, in order.
    #[must_use]
    pub fn into_rows(self) -> Vec<Record> {
        match self {
            Self::One(row) => vec![row],
            Self::Many(rows) => rows,
        }
    }
}

impl From<Record> for InsertData {
    fn from(row: Record) -> Self {
        Self::One(row)
    }
}

impl From<Vec<Record>> for InsertData {
    fn from(rows: Vec<Record>) -> Self {
        Self::Many(rows)
    }
}

static FIELD_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^\[\]]+)((?:\[[^\[\]]*\])*)$").expect("valid field path regex")
});

/// A parsed row key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    /// Column the value belongs to.
    pub base: String,
    /// Nested keys below the column, outermost first.
    pub keys: Vec<String>,
}

impl FieldPath {
    /// Parses `name` or `name[k1][k2]...`.
    ///
    /// Returns `None` for malformed keys: unbalanced brackets, an empty base
    /// or an empty segment.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        let captures = FIELD_PATH.captures(key.trim())?;
        let base = captures.get(1)?.as_str().trim().to_string();
        if base.is_empty() {
            return None;
        }
        let keys: Vec<String> = captures
            .get(2)
            .map(|m| m.as_str())
            .unwrap_or_default()
            .split(']')
            .filter_map(|segment| segment.strip_prefix('['))
            .map(str::to_string)
            .collect();
        if keys.iter().any(String::is_empty) {
            return None;
        }
        Some(Self { base, keys })
    }

    /// Returns `true` for plain column keys.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Folds bracketed keys into nested objects and drops null values.
///
/// `{"attributes[color]": "red", "attributes[size]": "M"}` becomes
/// `{"attributes": {"color": "red", "size": "M"}}`. A column given both as
/// a plain key and as a path, or a malformed key, is a violation.
pub fn flatten(row: Record) -> Result<Record, Violations> {
    let mut flat = Record::new();
    let mut violations = Violations::default();

    for (key, value) in row {
        if value.is_null() {
            continue;
        }
        let Some(path) = FieldPath::parse(&key) else {
            violations.push(Violation::new(key.clone(), format!("{key} - malformed field path")));
            continue;
        };
        if path.is_plain() {
            if flat.get(&path.base).is_some_and(Value::is_object) && !value.is_object() {
                violations.push(conflict(&path.base));
                continue;
            }
            flat.insert(path.base, value);
            continue;
        }

        let slot = flat
            .entry(path.base.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if insert_path(slot, &path.keys, value).is_err() {
            violations.push(conflict(&path.base));
        }
    }

    if violations.is_empty() {
        Ok(flat)
    } else {
        Err(violations)
    }
}

fn conflict(base: &str) -> Violation {
    Violation::new(base, format!("{base} - conflicting values for composite field"))
}

/// Writes `value` at `keys` below `slot`, creating objects on the way.
fn insert_path(slot: &mut Value, keys: &[String], value: Value) -> Result<(), ()> {
    let Some((last, parents)) = keys.split_last() else {
        return Err(());
    };
    let mut current = slot;
    for key in parents {
        let Value::Object(map) = current else {
            return Err(());
        };
        current = map
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    let Value::Object(map) = current else {
        return Err(());
    };
    map.insert(last.clone(), value);
    Ok(())
}

/// Removes columns the entity does not declare.
pub fn retain_declared(row: &mut Record, entity: &EntityDescription, table: &str) {
    row.retain(|column, _| {
        let declared = entity.contains(column);
        if !declared {
            warn!(table = %table, column = %column, "Dropping undeclared field");
        }
        declared
    });
}

/// Checks that every required field carries a non-empty value.
///
/// Missing, null, empty strings and empty composites all count as empty.
#[must_use]
pub fn check_required(row: &Record, entity: &EntityDescription) -> Violations {
    let mut violations = Violations::default();
    for field in entity.required() {
        let empty = match row.get(&*field.name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(_) => false,
        };
        if empty {
            violations.push(Violation::new(&*field.name, field.required_label()));
        }
    }
    violations
}
