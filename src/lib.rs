//! Translation store for application data fields.
//!
//! Translatable field values are keyed by the digest of their original-language
//! content. Every language variant of a value shares that digest, which makes it the
//! join key across languages. Around the store sit the review workflow (display and
//! submit of translations), progress statistics and obsolescence tracking for rows
//! whose source content has changed.
//!
//! # Example
//!
//! ```rust,ignore
//! use field_translations::{KeyValueStore, Registry, ReviewService, JsonSource};
//!
//! let source = JsonSource::from_path("data/entities.json")?;
//! let mut registry = Registry::new();
//! registry.register(&source, "Article", ["title", "body"])?;
//!
//! let store = KeyValueStore::connect("sqlite://translations.db", "en", 5).await?;
//! let service = ReviewService::new(&store, &source, &registry, &languages)?;
//! let page = service.model_detail("Article", "fr").await?;
//! ```

pub mod config;
pub mod digest;
pub mod error;
pub mod language;
pub mod obsolete;
pub mod registry;
pub mod review;
pub mod scan;
pub mod source;
pub mod stats;
pub mod store;

pub use digest::{digest, Digest};
pub use error::{Result, TranslationError};
pub use language::{LanguageConfig, LanguageList};
pub use registry::{Registry, RegistryEntry};
pub use review::{Edit, ReviewPage, ReviewService, Submission, SubmitOutcome};
pub use source::{Entity, EntitySource, JsonRecord, JsonSource};
pub use stats::Progress;
pub use store::{KeyValue, KeyValueStore, Scope};
