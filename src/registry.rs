//! Registry of translatable entity types and their fields.
//!
//! The host application registers each translatable entity type once at startup.
//! After that the registry is only read, so it is shared by reference.

use crate::error::{Result, TranslationError};
use crate::source::EntitySource;
use serde::Serialize;
use tracing::debug;

/// An entity type together with its translatable field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryEntry {
    pub entity_type: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `fields` of `entity_type` as translatable.
    ///
    /// # Errors
    /// * `NotRegistered` if `source` does not know `entity_type`
    /// * `UnknownField` if a field is not declared by the entity type
    /// * `AlreadyRegistered` if the entity type was registered before
    pub fn register<S, I, F>(&mut self, source: &S, entity_type: &str, fields: I) -> Result<()>
    where
        S: EntitySource,
        I: IntoIterator<Item = F>,
        F: Into<String>,
    {
        if self.entries.iter().any(|e| e.entity_type == entity_type) {
            return Err(TranslationError::AlreadyRegistered(entity_type.to_string()));
        }

        let declared = source
            .declared_fields(entity_type)
            .ok_or_else(|| TranslationError::NotRegistered(entity_type.to_string()))?;

        let mut accepted: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into();
            if !declared.contains(&field) {
                return Err(TranslationError::UnknownField {
                    entity_type: entity_type.to_string(),
                    field,
                });
            }
            if !accepted.contains(&field) {
                accepted.push(field);
            }
        }

        debug!("Registered {} with fields {:?}", entity_type, accepted);
        self.entries.push(RegistryEntry {
            entity_type: entity_type.to_string(),
            fields: accepted,
        });
        Ok(())
    }

    /// Register every entity type `source` declares, with all of its fields.
    pub fn register_all<S: EntitySource>(&mut self, source: &S) -> Result<()> {
        for entity_type in source.entity_types() {
            let fields = source.declared_fields(&entity_type).unwrap_or_default();
            self.register(source, &entity_type, fields)?;
        }
        Ok(())
    }

    /// Registered entries, in registration order.
    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn lookup(&self, entity_type: &str) -> Result<&RegistryEntry> {
        self.entries
            .iter()
            .find(|e| e.entity_type == entity_type)
            .ok_or_else(|| TranslationError::NotRegistered(entity_type.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
