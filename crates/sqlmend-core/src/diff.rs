//! Schema diff engine.
//!
//! Compares an [`EntityDescription`] with the [`LiveSchema`] of its table and
//! produces the operations that bring the table into conformance. The
//! result is empty once the table has converged, so reconciling twice in a
//! row does nothing the second time.

use std::collections::BTreeSet;

use crate::dialect::SchemaDialect;
use crate::live::LiveSchema;
use crate::metadata::{EntityDescription, KeyRole};
use crate::operation::{
    AddColumnOp, ColumnDef, ColumnPosition, CreateIndexOp, CreateTableOp, DropIndexOp, IndexDef,
    IndexKind, ModifyColumnOp, Operation, RebuildTableOp, ReplacePrimaryKeyOp,
};
use crate::plan::DdlPlan;

const INDEX_KINDS: [IndexKind; 2] = [IndexKind::Unique, IndexKind::Multi];

/// Computes the operations needed to migrate `live` to `entity`.
#[must_use]
pub fn diff(
    dialect: &dyn SchemaDialect,
    table: &str,
    entity: &EntityDescription,
    live: &LiveSchema,
) -> Vec<Operation> {
    if entity.is_empty() {
        return Vec::new();
    }
    if !live.exists() {
        return vec![create_table(dialect, table, entity)];
    }

    let mut operations = Vec::new();

    let declared_key = dialect.effective_primary_key(entity);
    let key_changed = declared_key.iter().copied().collect::<BTreeSet<_>>()
        != live.keys(KeyRole::Primary);
    let rebuild = key_changed && !dialect.supports_alter_primary_key();

    if rebuild {
        operations.push(Operation::RebuildTable(RebuildTableOp {
            table: table.to_string(),
            columns: entity.fields().iter().map(ColumnDef::from).collect(),
            primary_key: to_strings(&declared_key),
            copy_columns: entity
                .names()
                .filter(|name| live.has_field(name))
                .map(str::to_string)
                .collect(),
        }));
        // The rebuild dropped every index along with the old table.
        index_operations(table, entity, &LiveSchema::missing(), &mut operations);
        return operations;
    }

    column_operations(dialect, table, entity, live, &mut operations);
    if key_changed {
        operations.push(Operation::ReplacePrimaryKey(ReplacePrimaryKeyOp {
            table: table.to_string(),
            drop_existing: !live.primary_keys.is_empty(),
            columns: to_strings(&declared_key),
        }));
    }
    index_operations(table, entity, live, &mut operations);
    operations
}

/// Computes the operations and renders them with `dialect`.
#[must_use]
pub fn plan(
    dialect: &dyn SchemaDialect,
    table: &str,
    entity: &EntityDescription,
    live: &LiveSchema,
) -> DdlPlan {
    dialect.render(&diff(dialect, table, entity, live))
}

fn create_table(dialect: &dyn SchemaDialect, table: &str, entity: &EntityDescription) -> Operation {
    Operation::CreateTable(CreateTableOp {
        table: table.to_string(),
        columns: entity.fields().iter().map(ColumnDef::from).collect(),
        primary_key: to_strings(&dialect.effective_primary_key(entity)),
        indexes: INDEX_KINDS
            .iter()
            .flat_map(|&kind| {
                entity
                    .keys(kind.role())
                    .into_iter()
                    .map(move |field| IndexDef::for_field(kind, field))
            })
            .collect(),
    })
}

/// Emits ADD / MODIFY operations while tracking the physical column order,
/// so a column that already sits after its declared predecessor with the
/// declared type is left alone.
fn column_operations(
    dialect: &dyn SchemaDialect,
    table: &str,
    entity: &EntityDescription,
    live: &LiveSchema,
    operations: &mut Vec<Operation>,
) {
    let positioned = dialect.supports_alter_column();
    let mut order: Vec<&str> = live.fields.iter().map(String::as_str).collect();
    let mut previous: Option<&str> = None;

    for field in entity.fields() {
        let name = field.name.as_ref();
        let position = previous.map_or(ColumnPosition::First, |p| ColumnPosition::After(p.to_string()));

        match order.iter().position(|c| *c == name) {
            None if positioned => {
                order.insert(slot_after(&order, previous), name);
                operations.push(Operation::AddColumn(AddColumnOp {
                    table: table.to_string(),
                    column: ColumnDef::from(field),
                    position: Some(position),
                }));
            }
            None => {
                order.push(name);
                operations.push(Operation::AddColumn(AddColumnOp {
                    table: table.to_string(),
                    column: ColumnDef::from(field),
                    position: None,
                }));
            }
            Some(index) if positioned => {
                let actual_previous = index.checked_sub(1).map(|i| order[i]);
                let type_drift = live
                    .column_type(name)
                    .is_some_and(|live_type| !dialect.types_match(&field.storage_type, live_type));
                if actual_previous != previous || type_drift {
                    order.remove(index);
                    order.insert(slot_after(&order, previous), name);
                    operations.push(Operation::ModifyColumn(ModifyColumnOp {
                        table: table.to_string(),
                        column: ColumnDef::from(field),
                        position,
                    }));
                }
            }
            Some(_) => {}
        }
        previous = Some(name);
    }
}

fn slot_after(order: &[&str], previous: Option<&str>) -> usize {
    previous
        .and_then(|p| order.iter().position(|c| *c == p))
        .map_or(0, |i| i + 1)
}

fn index_operations(
    table: &str,
    entity: &EntityDescription,
    live: &LiveSchema,
    operations: &mut Vec<Operation>,
) {
    for kind in INDEX_KINDS {
        let declared = entity.keys(kind.role());
        let existing = live.keys(kind.role());

        for field in &declared {
            if !existing.contains(field) {
                operations.push(Operation::CreateIndex(CreateIndexOp {
                    table: table.to_string(),
                    index: IndexDef::for_field(kind, field),
                }));
            }
        }
        for field in &existing {
            if !declared.contains(field) {
                operations.push(Operation::DropIndex(DropIndexOp {
                    table: table.to_string(),
                    index: IndexDef::for_field(kind, field),
                }));
            }
        }
    }
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, SqliteDialect};
    use crate::metadata::FieldMetadata;

    fn users() -> EntityDescription {
        EntityDescription::new(vec![
            FieldMetadata::new("id", "INT AUTO_INCREMENT").key(KeyRole::Primary),
            FieldMetadata::new("email", "VARCHAR(255)").key(KeyRole::Unique),
            FieldMetadata::new("name", "VARCHAR(64)"),
            FieldMetadata::new("phone", "VARCHAR(20)"),
        ])
    }

    fn live_users(with_phone: bool) -> LiveSchema {
        let mut live = LiveSchema::missing();
        live.push_column("id", Some("int".into()), KeyRole::Primary);
        live.push_column("email", Some("varchar(255)".into()), KeyRole::Unique);
        live.push_column("name", Some("varchar(64)".into()), KeyRole::None);
        if with_phone {
            live.push_column("phone", Some("varchar(20)".into()), KeyRole::None);
        }
        live
    }

    // ================================================================
    // Create
    // ================================================================

    #[test]
    fn test_create_from_empty_emits_single_statement() {
        let entity = EntityDescription::new(vec![
            FieldMetadata::new("id", "INT AUTO_INCREMENT").key(KeyRole::Primary),
            FieldMetadata::new("email", "VARCHAR(255)").key(KeyRole::Unique),
        ]);
        let plan = plan(&MySqlDialect, "users", &entity, &LiveSchema::missing());
        let statements = plan.statements();
        assert_eq!(statements.len(), 1);
        assert!(statements[0].starts_with("CREATE TABLE"));
        assert!(statements[0].contains("PRIMARY KEY (`id`)"));
        assert!(statements[0].contains("UNIQUE KEY `KEY_EMAIL` (`email`)"));
    }

    #[test]
    fn test_empty_entity_is_noop() {
        let ops = diff(
            &MySqlDialect,
            "users",
            &EntityDescription::default(),
            &LiveSchema::missing(),
        );
        assert!(ops.is_empty());
    }

    // ================================================================
    // Columns
    // ================================================================

    #[test]
    fn test_converged_table_yields_nothing() {
        assert!(diff(&MySqlDialect, "users", &users(), &live_users(true)).is_empty());
        assert!(diff(&SqliteDialect, "users", &users(), &live_users(true)).is_empty());
    }

    #[test]
    fn test_add_column_after_previous_field() {
        let ops = diff(&MySqlDialect, "users", &users(), &live_users(false));
        assert_eq!(
            ops,
            vec![Operation::AddColumn(AddColumnOp {
                table: "users".into(),
                column: ColumnDef {
                    name: "phone".into(),
                    storage_type: "VARCHAR(20)".into(),
                },
                position: Some(ColumnPosition::After("name".into())),
            })]
        );
        assert_eq!(
            plan(&MySqlDialect, "users", &users(), &live_users(false)).statements(),
            vec!["ALTER TABLE `users` ADD COLUMN `phone` VARCHAR(20) AFTER `name`"]
        );
    }

    #[test]
    fn test_add_first_column() {
        let entity = EntityDescription::new(vec![
            FieldMetadata::new("uuid", "CHAR(36)"),
            FieldMetadata::new("name", "VARCHAR(64)"),
        ]);
        let mut live = LiveSchema::missing();
        live.push_column("name", Some("varchar(64)".into()), KeyRole::None);
        assert_eq!(
            plan(&MySqlDialect, "t", &entity, &live).statements(),
            vec!["ALTER TABLE `t` ADD COLUMN `uuid` CHAR(36) FIRST"]
        );
    }

    #[test]
    fn test_sqlite_adds_without_position() {
        assert_eq!(
            plan(&SqliteDialect, "users", &users(), &live_users(false)).statements(),
            vec!["ALTER TABLE \"users\" ADD COLUMN \"phone\" VARCHAR(20)"]
        );
    }

    #[test]
    fn test_modify_on_type_drift() {
        let mut live = live_users(true);
        live.column_types.insert("name".into(), "varchar(32)".into());
        assert_eq!(
            plan(&MySqlDialect, "users", &users(), &live).statements(),
            vec!["ALTER TABLE `users` MODIFY COLUMN `name` VARCHAR(64) AFTER `email`"]
        );
        // SQLite cannot redefine columns.
        assert!(diff(&SqliteDialect, "users", &users(), &live).is_empty());
    }

    #[test]
    fn test_implicit_lengths_converge() {
        let entity = EntityDescription::new(vec![
            FieldMetadata::new("id", "INT AUTO_INCREMENT").key(KeyRole::Primary),
            FieldMetadata::new("price", "DECIMAL"),
            FieldMetadata::new("grade", "CHAR"),
            FieldMetadata::new("flag", "BIT"),
            FieldMetadata::new("digest", "BINARY"),
            FieldMetadata::new("payload", "JSON"),
        ]);
        let mut live = LiveSchema::missing();
        live.push_column("id", Some("int(11)".into()), KeyRole::Primary);
        live.push_column("price", Some("decimal(10,0)".into()), KeyRole::None);
        live.push_column("grade", Some("char(1)".into()), KeyRole::None);
        live.push_column("flag", Some("bit(1)".into()), KeyRole::None);
        live.push_column("digest", Some("binary(1)".into()), KeyRole::None);
        live.push_column("payload", Some("longtext".into()), KeyRole::None);
        assert!(plan(&MySqlDialect, "t", &entity, &live).is_empty());

        live.column_types.insert("price".into(), "decimal(12,2)".into());
        assert_eq!(
            plan(&MySqlDialect, "t", &entity, &live).statements(),
            vec!["ALTER TABLE `t` MODIFY COLUMN `price` DECIMAL AFTER `id`"]
        );
    }

    #[test]
    fn test_modify_reorders_and_converges() {
        let mut live = LiveSchema::missing();
        live.push_column("id", Some("int".into()), KeyRole::Primary);
        live.push_column("name", Some("varchar(64)".into()), KeyRole::None);
        live.push_column("legacy", Some("text".into()), KeyRole::None);
        live.push_column("email", Some("varchar(255)".into()), KeyRole::Unique);
        live.push_column("phone", Some("varchar(20)".into()), KeyRole::None);

        let ops = diff(&MySqlDialect, "users", &users(), &live);
        let modified: Vec<(&str, &ColumnPosition)> = ops
            .iter()
            .filter_map(|op| match op {
                Operation::ModifyColumn(m) => Some((m.column.name.as_str(), &m.position)),
                _ => None,
            })
            .collect();
        assert_eq!(
            modified,
            vec![
                ("email", &ColumnPosition::After("id".into())),
                ("phone", &ColumnPosition::After("name".into())),
            ]
        );

        // Apply the moves and diff again.
        let mut converged = LiveSchema::missing();
        converged.push_column("id", Some("int".into()), KeyRole::Primary);
        converged.push_column("email", Some("varchar(255)".into()), KeyRole::Unique);
        converged.push_column("name", Some("varchar(64)".into()), KeyRole::None);
        converged.push_column("phone", Some("varchar(20)".into()), KeyRole::None);
        converged.push_column("legacy", Some("text".into()), KeyRole::None);
        assert!(diff(&MySqlDialect, "users", &users(), &converged).is_empty());
    }

    // ================================================================
    // Keys
    // ================================================================

    #[test]
    fn test_index_drop_when_annotation_removed() {
        let entity = EntityDescription::new(vec![
            FieldMetadata::new("id", "INT AUTO_INCREMENT").key(KeyRole::Primary),
            FieldMetadata::new("email", "VARCHAR(255)"),
            FieldMetadata::new("name", "VARCHAR(64)"),
            FieldMetadata::new("phone", "VARCHAR(20)"),
        ]);
        assert_eq!(
            plan(&MySqlDialect, "users", &entity, &live_users(true)).statements(),
            vec!["ALTER TABLE `users` DROP INDEX `KEY_EMAIL`"]
        );
        assert_eq!(
            plan(&SqliteDialect, "users", &entity, &live_users(true)).statements(),
            vec!["DROP INDEX IF EXISTS \"KEY_EMAIL\""]
        );
    }

    #[test]
    fn test_index_role_change() {
        let entity = EntityDescription::new(vec![
            FieldMetadata::new("id", "INT AUTO_INCREMENT").key(KeyRole::Primary),
            FieldMetadata::new("email", "VARCHAR(255)").key(KeyRole::Multi),
            FieldMetadata::new("name", "VARCHAR(64)"),
            FieldMetadata::new("phone", "VARCHAR(20)"),
        ]);
        assert_eq!(
            plan(&MySqlDialect, "users", &entity, &live_users(true)).statements(),
            vec![
                "ALTER TABLE `users` DROP INDEX `KEY_EMAIL`, \
                 ADD INDEX `IDX_EMAIL` (`email`) USING BTREE"
            ]
        );
    }

    #[test]
    fn test_mysql_primary_key_replaced_in_place() {
        let entity = EntityDescription::new(vec![
            FieldMetadata::new("id", "INT AUTO_INCREMENT").key(KeyRole::Primary),
            FieldMetadata::new("email", "VARCHAR(255)").key(KeyRole::Primary),
            FieldMetadata::new("name", "VARCHAR(64)"),
            FieldMetadata::new("phone", "VARCHAR(20)"),
        ]);
        let mut live = live_users(true);
        live.unique_keys.clear();
        assert_eq!(
            plan(&MySqlDialect, "users", &entity, &live).statements(),
            vec!["ALTER TABLE `users` DROP PRIMARY KEY, ADD PRIMARY KEY (`id`, `email`)"]
        );
    }

    #[test]
    fn test_sqlite_primary_key_change_rebuilds() {
        let entity = EntityDescription::new(vec![
            FieldMetadata::new("tenant", "INTEGER").key(KeyRole::Primary),
            FieldMetadata::new("slug", "TEXT").key(KeyRole::Primary),
            FieldMetadata::new("title", "TEXT").key(KeyRole::Multi),
            FieldMetadata::new("body", "TEXT"),
        ]);
        let mut live = LiveSchema::missing();
        live.push_column("tenant", None, KeyRole::Primary);
        live.push_column("slug", None, KeyRole::None);
        live.push_column("title", None, KeyRole::Multi);

        let plan = plan(&SqliteDialect, "pages", &entity, &live);
        assert!(plan.has_rebuild());
        assert_eq!(
            plan.statements(),
            vec![
                "CREATE TABLE \"pages_temp\" (\"tenant\" INTEGER, \"slug\" TEXT, \
                 \"title\" TEXT, \"body\" TEXT, PRIMARY KEY (\"tenant\", \"slug\"))",
                "INSERT INTO \"pages_temp\" (\"tenant\", \"slug\", \"title\") \
                 SELECT \"tenant\", \"slug\", \"title\" FROM \"pages\"",
                "DROP TABLE \"pages\"",
                "ALTER TABLE \"pages_temp\" RENAME TO \"pages\"",
                "CREATE INDEX IF NOT EXISTS \"IDX_TITLE\" ON \"pages\" (\"title\")",
            ]
        );
    }

    #[test]
    fn test_sqlite_inline_auto_increment_key_is_stable() {
        let mut live = live_users(true);
        live.column_types.clear();
        assert!(diff(&SqliteDialect, "users", &users(), &live).is_empty());
    }
}
