//! Repository behavior against an in-memory SQLite database.

use serde::Serialize;
use serde_json::{json, Value};
use sqlmend::prelude::*;
use sqlmend::sqlmend_core::{classify, EntityDescriptor, ErrorCategory, SchemaMismatchKind};
use sqlmend::{introspect, InsertData};
use sqlx::sqlite::SqlitePoolOptions;

async fn executor() -> SqliteExecutor {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .unwrap();
    SqliteExecutor::new(pool)
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected an object"),
    }
}

#[derive(Entity, Serialize)]
#[entity(table = "products", required(name))]
struct Product {
    #[field(type = "INT AUTO_INCREMENT", key = "PRI")]
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[field(type = "VARCHAR(64)")]
    name: String,
    #[field(type = "REAL")]
    price: f64,
    #[field(type = "TEXT")]
    attributes: Option<String>,
}

async fn products() -> Repository<SqliteExecutor> {
    let repository = Repository::for_entity::<Product>(executor().await);
    repository.reconcile().await.unwrap();
    repository
}

// ================================================================
// Insert validation and flattening
// ================================================================

#[tokio::test]
async fn test_insert_rejects_missing_required_field() {
    let repository = products().await;

    let err = repository
        .insert(record(json!({"name": "", "price": 3.5})))
        .await
        .unwrap_err();
    match err {
        OrmError::Validation(violations) => {
            assert_eq!(violations.fields().collect::<Vec<_>>(), vec!["name"]);
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = repository
        .insert(record(json!({"name": null, "price": 3.5})))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));

    assert_eq!(repository.count("*", None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_batch_validation_writes_nothing() {
    let repository = products().await;

    let rows = vec![
        record(json!({"name": "Shirt", "price": 10})),
        record(json!({"price": 12})),
    ];
    let err = repository.insert(rows).await.unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
    assert_eq!(repository.count("*", None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_insert_flattens_bracketed_fields() {
    let repository = products().await;

    let id = repository
        .insert(record(json!({
            "name": "Shirt",
            "price": 19.5,
            "attributes[color]": "red",
            "attributes[size]": "M",
            "discount": 5,
        })))
        .await
        .unwrap();
    assert_eq!(id, 1);

    let row = repository
        .get("attributes", Some(&Q::eq("id", id)))
        .await
        .unwrap()
        .unwrap();
    let stored: Value = serde_json::from_str(row["attributes"].as_str().unwrap()).unwrap();
    assert_eq!(stored, json!({"color": "red", "size": "M"}));
}

#[tokio::test]
async fn test_insert_many_returns_last_id() {
    let repository = products().await;

    let rows = InsertData::Many(vec![
        record(json!({"name": "Shirt", "price": 10})),
        record(json!({"name": "Hat", "price": 5})),
        record(json!({"name": "Sock", "price": 2.5})),
    ]);
    assert_eq!(repository.insert(rows).await.unwrap(), 3);
    assert_eq!(repository.insert(Vec::<Record>::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_insert_entity() {
    let repository = products().await;

    let product = Product {
        id: None,
        name: "Scarf".into(),
        price: 7.0,
        attributes: None,
    };
    let id = repository.insert_entity(&product).await.unwrap();

    let row = repository
        .get("name, price", Some(&Q::eq("id", id)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(Value::Object(row), json!({"name": "Scarf", "price": 7.0}));
}

// ================================================================
// Reads, updates and deletes
// ================================================================

#[tokio::test]
async fn test_select_get_count_sum_delete() {
    let repository = products().await;
    repository
        .insert(vec![
            record(json!({"name": "Shirt", "price": 10})),
            record(json!({"name": "Hat", "price": 5})),
            record(json!({"name": "Sock", "price": 2.5})),
        ])
        .await
        .unwrap();

    let cheap = repository
        .select("id,name", Some(&Q::lt("price", 6)))
        .await
        .unwrap();
    assert_eq!(cheap.len(), 2);
    assert!(cheap.iter().all(|r| r.len() == 2));

    let all = repository.select("*", None).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].len(), 4);

    let hat = repository
        .get("*", Some(&Q::eq("name", "Hat")))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hat["price"], json!(5.0));
    assert!(repository
        .get("*", Some(&Q::eq("name", "Coat")))
        .await
        .unwrap()
        .is_none());

    assert_eq!(repository.count("*", None).await.unwrap(), 3);
    assert_eq!(
        repository
            .count("*", Some(&Q::gt("price", 4)))
            .await
            .unwrap(),
        2
    );
    assert!((repository.sum("price", None).await.unwrap() - 17.5).abs() < f64::EPSILON);
    assert!(repository
        .sum("price", Some(&Q::eq("name", "Coat")))
        .await
        .unwrap()
        .abs()
        < f64::EPSILON);

    assert_eq!(repository.delete(&Q::eq("name", "Sock")).await.unwrap(), 1);
    assert_eq!(repository.count("*", None).await.unwrap(), 2);
}

#[tokio::test]
async fn test_update_drops_undeclared_fields() {
    let repository = products().await;
    let id = repository
        .insert(record(json!({"name": "Shirt", "price": 10})))
        .await
        .unwrap();

    let updated = repository
        .update(record(json!({"price": 12, "colour": "blue"})), &Q::eq("id", id))
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let err = repository
        .update(record(json!({"colour": "blue"})), &Q::eq("id", id))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Validation(_)));
}

// ================================================================
// Self-heal
// ================================================================

fn users_v1() -> EntityDescription {
    EntityDescription::new(vec![
        FieldMetadata::new("id", "INT AUTO_INCREMENT").key(KeyRole::Primary),
        FieldMetadata::new("name", "VARCHAR(64)").required(None::<String>),
    ])
}

fn users_v2() -> EntityDescription {
    EntityDescription::new(vec![
        FieldMetadata::new("id", "INT AUTO_INCREMENT").key(KeyRole::Primary),
        FieldMetadata::new("name", "VARCHAR(64)").required(None::<String>),
        FieldMetadata::new("age", "INTEGER"),
    ])
}

#[tokio::test]
async fn test_self_heal_adds_missing_column_then_reraises() {
    let executor = executor().await;
    let v1 = Repository::new(executor.clone(), "users", users_v1());
    v1.reconcile().await.unwrap();
    let id = v1.insert(record(json!({"name": "Ada"}))).await.unwrap();

    let v2 = Repository::new(executor.clone(), "users", users_v2());
    let err = v2
        .update(record(json!({"age": 36})), &Q::eq("id", id))
        .await
        .unwrap_err();
    let OrmError::SchemaMismatch(db) = err else {
        panic!("expected a schema mismatch, got {err}");
    };
    assert!(db.message.contains("age"));

    let live = introspect(&executor, "users").await.unwrap();
    assert_eq!(live.fields, vec!["id", "name", "age"]);

    assert_eq!(
        v2.update(record(json!({"age": 36})), &Q::eq("id", id))
            .await
            .unwrap(),
        1
    );
    let row = v2.get("age", Some(&Q::eq("id", id))).await.unwrap().unwrap();
    assert_eq!(row["age"], json!(36));
}

#[tokio::test]
async fn test_self_heal_creates_missing_table() {
    let executor = executor().await;
    let repository = Repository::new(executor.clone(), "users", users_v1());

    let err = repository.select("*", None).await.unwrap_err();
    assert!(matches!(err, OrmError::SchemaMismatch(_)));
    let db = err.db_error().unwrap();
    assert_eq!(
        classify(DialectKind::Sqlite, db),
        ErrorCategory::SchemaMismatch(SchemaMismatchKind::TableMissing)
    );

    assert!(repository.select("*", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_self_heal_still_returns_original_error() {
    let executor = executor().await;
    let v1 = Repository::new(executor.clone(), "users", users_v1());
    v1.reconcile().await.unwrap();
    let id = v1.insert(record(json!({"name": "Ada"}))).await.unwrap();

    // SQLite refuses to add a NOT NULL column without a default to a
    // populated table, so the reconciliation pass fails.
    let strict = Repository::new(
        executor.clone(),
        "users",
        EntityDescription::new(vec![
            FieldMetadata::new("id", "INT AUTO_INCREMENT").key(KeyRole::Primary),
            FieldMetadata::new("name", "VARCHAR(64)").required(None::<String>),
            FieldMetadata::new("age", "INTEGER NOT NULL"),
        ]),
    );
    for _ in 0..2 {
        let err = strict
            .update(record(json!({"age": 36})), &Q::eq("id", id))
            .await
            .unwrap_err();
        let OrmError::SchemaMismatch(db) = err else {
            panic!("expected a schema mismatch, got {err}");
        };
        assert!(db.message.contains("age"));
    }
    assert!(!introspect(&executor, "users").await.unwrap().has_field("age"));
    assert_eq!(v1.count("*", None).await.unwrap(), 1);
}

#[tokio::test]
async fn test_self_heal_can_be_disabled() {
    let executor = executor().await;
    let repository = Repository::new(executor.clone(), "users", users_v1()).with_self_heal(false);

    let err = repository.count("*", None).await.unwrap_err();
    assert!(matches!(err, OrmError::SchemaMismatch(_)));
    assert!(!introspect(&executor, "users").await.unwrap().exists());
}

#[tokio::test]
async fn test_unique_violation_is_not_a_schema_mismatch() {
    let executor = executor().await;
    let entity = EntityDescription::new(vec![
        FieldMetadata::new("id", "INT AUTO_INCREMENT").key(KeyRole::Primary),
        FieldMetadata::new("email", "VARCHAR(255)").key(KeyRole::Unique),
    ]);
    let repository = Repository::new(executor, "accounts", entity);
    repository.reconcile().await.unwrap();

    repository
        .insert(record(json!({"email": "a@example.com"})))
        .await
        .unwrap();
    let err = repository
        .insert(record(json!({"email": "a@example.com"})))
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Database(_)));
}

// ================================================================
// Table prefix
// ================================================================

#[tokio::test]
async fn test_prefix_applies_to_every_statement() {
    let executor = executor().await;
    let repository = Repository::new(executor.clone(), "users", users_v1()).with_prefix("app_");
    assert_eq!(repository.table(), "app_users");
    assert_eq!(repository.name(), "users");

    // Self-heal creates the prefixed table.
    let err = repository.count("*", None).await.unwrap_err();
    assert!(matches!(err, OrmError::SchemaMismatch(_)));
    assert!(introspect(&executor, "app_users").await.unwrap().exists());
    assert!(!introspect(&executor, "users").await.unwrap().exists());

    let id = repository.insert(record(json!({"name": "Ada"}))).await.unwrap();
    assert_eq!(
        repository
            .update(record(json!({"name": "Grace"})), &Q::eq("id", id))
            .await
            .unwrap(),
        1
    );
    let row = repository.get("name", Some(&Q::eq("id", id))).await.unwrap().unwrap();
    assert_eq!(row["name"], json!("Grace"));
    assert_eq!(repository.select("*", None).await.unwrap().len(), 1);
    assert!(repository.sum("id", None).await.unwrap() > 0.0);
    assert!(!repository.reconcile().await.unwrap());
    assert!(repository.plan().await.unwrap().is_empty());
    assert_eq!(repository.delete(&Q::eq("id", id)).await.unwrap(), 1);

    // A later prefix replaces the earlier one.
    let other = repository.with_prefix("tmp_");
    assert_eq!(other.table(), "tmp_users");
}

// ================================================================
// Runtime descriptors
// ================================================================

#[tokio::test]
async fn test_repository_from_descriptor() {
    let descriptor = EntityDescriptor::new("tags")
        .field("id", r#""type": "INT AUTO_INCREMENT", "key": "PRI""#)
        .field("label", r#"{"type": "VARCHAR(32)", "key": "UNI"}"#)
        .require("label", Some("Please enter a label"));
    let repository = Repository::from_descriptor(executor().await, &descriptor).unwrap();
    assert_eq!(repository.table(), "tags");

    let err = repository.insert(record(json!({}))).await.unwrap_err();
    assert_eq!(err.to_string(), "Validation failed: Please enter a label");

    repository.reconcile().await.unwrap();
    assert_eq!(
        repository
            .insert(record(json!({"label": "rust"})))
            .await
            .unwrap(),
        1
    );
}
