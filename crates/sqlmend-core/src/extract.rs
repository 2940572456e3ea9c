//! Runtime entity descriptors.
//!
//! Entities declared in code use `#[derive(Entity)]`. Entities that are only
//! known at runtime (loaded from a JSON file, for instance) are described
//! with an [`EntityDescriptor`] and turned into an [`EntityDescription`] by
//! [`extract`].
//!
//! Each field carries an annotation of the form
//! `{"type": "<DDL type>", "key": "PRI|UNI|MUL"}`. The surrounding braces may
//! be left out, and the annotation may be given either as text or as an
//! already structured JSON object.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MetadataError, Result};
use crate::metadata::{EntityDescription, FieldMetadata, KeyRole};

/// Unparsed description of one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Table name.
    pub table: String,
    /// Persisted fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Fields that inserts must supply.
    #[serde(default)]
    pub required: Vec<RequiredDescriptor>,
}

/// A field name with its annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name.
    pub name: String,
    /// Annotation, as text or as a JSON object.
    pub annotation: Value,
}

/// A required field declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredDescriptor {
    /// Field name.
    pub name: String,
    /// Message used when the value is missing.
    #[serde(default)]
    pub message: Option<String>,
}

impl EntityDescriptor {
    /// Starts a descriptor for the given table.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Vec::new(),
            required: Vec::new(),
        }
    }

    /// Adds a field with a textual annotation.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            annotation: Value::String(annotation.into()),
        });
        self
    }

    /// Declares a required field.
    #[must_use]
    pub fn require(mut self, name: impl Into<String>, message: Option<&str>) -> Self {
        self.required.push(RequiredDescriptor {
            name: name.into(),
            message: message.map(str::to_string),
        });
        self
    }
}

#[derive(Deserialize)]
struct Annotation {
    #[serde(rename = "type", default)]
    storage_type: Option<String>,
    #[serde(default)]
    key: Option<String>,
}

/// Builds the ordered field metadata of an entity.
///
/// # Errors
///
/// Returns a [`MetadataError`] when an annotation is malformed, lacks a
/// storage type or names an unknown key role, when a field is declared
/// twice, or when a required field is not declared.
pub fn extract(descriptor: &EntityDescriptor) -> Result<EntityDescription> {
    if descriptor.table.trim().is_empty() {
        return Err(MetadataError::MissingTable);
    }

    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(descriptor.fields.len());
    for field in &descriptor.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(MetadataError::DuplicateField(field.name.clone()));
        }
        fields.push(parse_field(field)?);
    }

    for required in &descriptor.required {
        let Some(field) = fields.iter_mut().find(|f| f.name == required.name.as_str()) else {
            return Err(MetadataError::UnknownRequiredField {
                table: descriptor.table.clone(),
                field: required.name.clone(),
            });
        };
        *field = field.clone().required(required.message.clone());
    }

    Ok(EntityDescription::new(fields))
}

fn parse_field(field: &FieldDescriptor) -> Result<FieldMetadata> {
    let annotation = parse_annotation(&field.name, &field.annotation)?;

    let storage_type = annotation
        .storage_type
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| MetadataError::MissingType {
            field: field.name.clone(),
        })?;

    let key_role = match annotation.key.as_deref() {
        None => KeyRole::None,
        Some(code) => KeyRole::from_code(code).ok_or_else(|| MetadataError::UnknownKeyRole {
            field: field.name.clone(),
            key: code.to_string(),
        })?,
    };

    Ok(FieldMetadata::new(field.name.clone(), storage_type).key(key_role))
}

fn parse_annotation(field: &str, annotation: &Value) -> Result<Annotation> {
    let invalid = |message: String| MetadataError::InvalidAnnotation {
        field: field.to_string(),
        message,
    };

    match annotation {
        Value::String(text) => {
            let text = text.trim();
            let parsed = if text.starts_with('{') {
                serde_json::from_str(text)
            } else {
                serde_json::from_str(&format!("{{{text}}}"))
            };
            parsed.map_err(|e| invalid(e.to_string()))
        }
        Value::Object(_) => {
            serde_json::from_value(annotation.clone()).map_err(|e| invalid(e.to_string()))
        }
        other => Err(invalid(format!("expected text or object, found {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> EntityDescriptor {
        EntityDescriptor::new("users")
            .field("id", r#""type": "INT AUTO_INCREMENT", "key": "PRI""#)
            .field("email", r#"{"type": "VARCHAR(255)", "key": "UNI"}"#)
            .field("name", r#""type": "VARCHAR(64) NOT NULL DEFAULT ''""#)
            .require("email", None)
            .require("name", Some("Please tell us your name"))
    }

    #[test]
    fn test_extract_ordered_fields() {
        let entity = extract(&users()).unwrap();
        let names: Vec<&str> = entity.names().collect();
        assert_eq!(names, vec!["id", "email", "name"]);
        assert_eq!(entity.primary_keys(), vec!["id"]);
        assert_eq!(entity.unique_keys(), vec!["email"]);

        let name = entity.get("name").unwrap();
        assert_eq!(name.storage_type, "VARCHAR(64) NOT NULL DEFAULT ''");
        assert!(name.required);
        assert_eq!(name.required_label(), "Please tell us your name");
        assert_eq!(entity.get("email").unwrap().required_label(), "email");
        assert!(!entity.get("id").unwrap().required);
    }

    #[test]
    fn test_structured_annotation() {
        let descriptor = EntityDescriptor {
            table: "tags".into(),
            fields: vec![FieldDescriptor {
                name: "label".into(),
                annotation: json!({"type": "VARCHAR(32)", "key": "MUL"}),
            }],
            required: vec![],
        };
        let entity = extract(&descriptor).unwrap();
        assert_eq!(entity.multi_keys(), vec!["label"]);
    }

    #[test]
    fn test_malformed_annotation() {
        let descriptor = EntityDescriptor::new("users").field("id", r#""type": INT"#);
        assert!(matches!(
            extract(&descriptor),
            Err(MetadataError::InvalidAnnotation { field, .. }) if field == "id"
        ));
    }

    #[test]
    fn test_missing_type() {
        let descriptor = EntityDescriptor::new("users").field("id", r#""key": "PRI""#);
        assert_eq!(
            extract(&descriptor),
            Err(MetadataError::MissingType { field: "id".into() })
        );
    }

    #[test]
    fn test_unknown_key_role() {
        let descriptor =
            EntityDescriptor::new("users").field("id", r#""type": "INT", "key": "FOREIGN""#);
        assert!(matches!(
            extract(&descriptor),
            Err(MetadataError::UnknownKeyRole { key, .. }) if key == "FOREIGN"
        ));
    }

    #[test]
    fn test_unknown_required_field() {
        let descriptor = users().require("phone", None);
        assert_eq!(
            extract(&descriptor),
            Err(MetadataError::UnknownRequiredField {
                table: "users".into(),
                field: "phone".into(),
            })
        );
    }

    #[test]
    fn test_duplicate_field() {
        let descriptor = EntityDescriptor::new("users")
            .field("id", r#""type": "INT""#)
            .field("id", r#""type": "BIGINT""#);
        assert_eq!(
            extract(&descriptor),
            Err(MetadataError::DuplicateField("id".into()))
        );
    }

    #[test]
    fn test_descriptor_from_json() {
        let descriptor: EntityDescriptor = serde_json::from_value(json!({
            "table": "posts",
            "fields": [
                {"name": "id", "annotation": "\"type\": \"INTEGER\", \"key\": \"PRI\""},
                {"name": "title", "annotation": {"type": "TEXT"}}
            ],
            "required": [{"name": "title"}]
        }))
        .unwrap();
        let entity = extract(&descriptor).unwrap();
        assert_eq!(entity.len(), 2);
        assert!(entity.get("title").unwrap().required);
    }
}
