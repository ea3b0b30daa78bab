//! Error types for the translation store and its collaborators.

use thiserror::Error;

/// Errors raised by the store, registry and review workflow.
#[derive(Debug, Error)]
pub enum TranslationError {
    /// Stats or detail requested for an entity type with no registry entry.
    #[error("entity type '{0}' is not registered")]
    NotRegistered(String),

    /// A key value id that does not exist in the store.
    #[error("key value {0} not found")]
    RowNotFound(i64),

    /// A language code that is not part of the configured language list.
    #[error("unknown language code: '{0}'")]
    UnknownLanguage(String),

    /// Registration named a field the entity type does not declare.
    #[error("'{field}' is not a field of entity type '{entity_type}'")]
    UnknownField { entity_type: String, field: String },

    #[error("entity type '{0}' is already registered")]
    AlreadyRegistered(String),

    /// The configured language list is unusable (empty, duplicate codes, missing default).
    #[error("invalid language configuration: {0}")]
    InvalidLanguages(String),

    /// The entity source could not be read or parsed.
    #[error("entity source error: {0}")]
    Source(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl TranslationError {
    /// Whether the error means "no such resource" to the presentation layer.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TranslationError::NotRegistered(_)
                | TranslationError::RowNotFound(_)
                | TranslationError::UnknownLanguage(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TranslationError>;
