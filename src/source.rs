//! Entity source: read access to the live application records whose fields are
//! translated.
//!
//! The store never owns or mutates entity records. It only needs to know which
//! fields an entity type declares and the current string value of a named field
//! on each live instance.

use crate::error::{Result, TranslationError};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::Path;

/// A live entity instance that can report its field values by name.
pub trait Entity {
    /// Current string value of `field`, or `None` when the field is unset.
    fn field_value(&self, field: &str) -> Option<String>;
}

/// Provider of live entity instances, per entity type.
pub trait EntitySource {
    type Instance: Entity;

    /// Entity types this source knows about, in a stable order.
    fn entity_types(&self) -> Vec<String>;

    /// Field names declared by `entity_type`, or `None` for an unknown type.
    fn declared_fields(&self, entity_type: &str) -> Option<Vec<String>>;

    /// Every live instance of `entity_type`, in a stable order.
    fn instances(&self, entity_type: &str) -> Result<Vec<Self::Instance>>;
}

/// A record from a JSON entity document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct JsonRecord(Map<String, Value>);

impl JsonRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl Entity for JsonRecord {
    /// Strings are returned as-is, numbers and booleans in their JSON rendering.
    /// Null, missing, array and object values are unset.
    fn field_value(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct JsonEntityType {
    #[serde(rename = "type")]
    name: String,
    fields: Vec<String>,
    #[serde(default)]
    records: Vec<JsonRecord>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonDocument {
    entities: Vec<JsonEntityType>,
}

/// Entity source backed by a JSON document:
///
/// ```json
/// {"entities": [
///   {"type": "Article", "fields": ["title", "body"],
///    "records": [{"title": "Hello", "body": "World"}]}
/// ]}
/// ```
#[derive(Debug, Clone)]
pub struct JsonSource {
    types: Vec<JsonEntityType>,
}

impl JsonSource {
    /// Load a JSON entity document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TranslationError::Source(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let document: JsonDocument = serde_json::from_str(content)
            .map_err(|e| TranslationError::Source(format!("invalid entity document: {}", e)))?;
        Self::from_document(document)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let document: JsonDocument = serde_json::from_value(value)
            .map_err(|e| TranslationError::Source(format!("invalid entity document: {}", e)))?;
        Self::from_document(document)
    }

    fn from_document(document: JsonDocument) -> Result<Self> {
        for (i, entity_type) in document.entities.iter().enumerate() {
            if document.entities[..i]
                .iter()
                .any(|other| other.name == entity_type.name)
            {
                return Err(TranslationError::Source(format!(
                    "entity type '{}' is declared twice",
                    entity_type.name
                )));
            }
        }
        Ok(Self {
            types: document.entities,
        })
    }

    fn find(&self, entity_type: &str) -> Option<&JsonEntityType> {
        self.types.iter().find(|t| t.name == entity_type)
    }
}

impl EntitySource for JsonSource {
    type Instance = JsonRecord;

    fn entity_types(&self) -> Vec<String> {
        self.types.iter().map(|t| t.name.clone()).collect()
    }

    fn declared_fields(&self, entity_type: &str) -> Option<Vec<String>> {
        self.find(entity_type).map(|t| t.fields.clone())
    }

    fn instances(&self, entity_type: &str) -> Result<Vec<JsonRecord>> {
        self.find(entity_type)
            .map(|t| t.records.clone())
            .ok_or_else(|| TranslationError::NotRegistered(entity_type.to_string()))
    }
}
