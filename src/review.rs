//! Review workflow: the query/command surface the presentation layer calls.
//!
//! A review session covers one (entity type, language) pair. Display pairs every
//! original value with its translation and points at the first unedited one.
//! Submit applies a batch of edits as a conditional update: rows the reviewer did
//! not touch are left exactly as they were.

use crate::error::{Result, TranslationError};
use crate::language::{LanguageConfig, LanguageList};
use crate::obsolete;
use crate::registry::Registry;
use crate::scan::{self, ExportReport};
use crate::source::EntitySource;
use crate::stats::{self, ModelStats, Progress};
use crate::store::{KeyValue, KeyValueStore, Scope};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

static EDIT_KEY_REGEX: OnceLock<Regex> = OnceLock::new();

/// One original value and its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewItem {
    pub original: KeyValue,
    pub translation: KeyValue,
}

/// Review items of one registered field, one per live instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSection {
    pub name: String,
    pub items: Vec<ReviewItem>,
}

/// Everything needed to render a review session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewPage {
    pub entity_type: String,
    pub original_language: LanguageConfig,
    pub target_language: LanguageConfig,
    pub fields: Vec<FieldSection>,
    pub progress: Progress,
    /// Id of the first translation row not yet edited, in display order.
    pub first_unedited: Option<i64>,
}

/// One line of the model list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub entity_type: String,
    pub fields: Vec<String>,
    pub stats: ModelStats,
}

/// A reviewer's edit of one translation row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub id: i64,
    pub text: String,
    /// Translate to the empty string on purpose.
    pub empty: bool,
    /// Keep the current value but mark the row as reviewed.
    pub ignore: bool,
}

impl Edit {
    pub fn new(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            empty: false,
            ignore: false,
        }
    }

    pub fn empty(mut self) -> Self {
        self.empty = true;
        self
    }

    pub fn ignore(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Blank text without a marker means the reviewer did not touch the row.
    pub fn is_touched(&self) -> bool {
        !self.text.is_empty() || self.empty || self.ignore
    }
}

/// A batch of edits plus the section to return to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub edits: Vec<Edit>,
    /// Anchor of the section the reviewer was working in.
    pub section: Option<String>,
}

impl Submission {
    /// Decode form pairs.
    ///
    /// * `translation_<id>` carries the new text for row `<id>`
    /// * `empty_<id>` and `ignore_<id>` set the markers for row `<id>`
    /// * the first `section_<name>` key becomes the return anchor
    ///
    /// Edits keep the order of their `translation_` keys. Keys whose id is not an
    /// integer are dropped.
    pub fn from_form<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let regex = EDIT_KEY_REGEX
            .get_or_init(|| Regex::new(r"^(translation|empty|ignore)_(.+)$").unwrap());

        let mut edits: Vec<Edit> = Vec::new();
        let mut empty: HashSet<i64> = HashSet::new();
        let mut ignore: HashSet<i64> = HashSet::new();
        let mut section: Option<String> = None;

        for (key, value) in pairs {
            if key.starts_with("section_") {
                if section.is_none() {
                    section = Some(key.to_string());
                }
                continue;
            }

            let Some(captures) = regex.captures(key) else {
                continue;
            };
            let Ok(id) = captures[2].parse::<i64>() else {
                warn!("Dropping form field with malformed id: {}", key);
                continue;
            };

            match &captures[1] {
                "translation" => match edits.iter().position(|e| e.id == id) {
                    Some(i) => edits[i].text = value.to_string(),
                    None => edits.push(Edit::new(id, value)),
                },
                "empty" => {
                    empty.insert(id);
                }
                _ => {
                    ignore.insert(id);
                }
            }
        }

        for edit in &mut edits {
            edit.empty = empty.contains(&edit.id);
            edit.ignore = ignore.contains(&edit.id);
        }

        Self { edits, section }
    }
}

/// Where the presentation layer goes after a submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Redirect {
    pub entity_type: String,
    pub language: String,
    pub section: Option<String>,
}

impl Redirect {
    /// URL fragment for the section anchor, or the empty string.
    pub fn fragment(&self) -> String {
        self.section
            .as_ref()
            .map(|s| format!("#{}", s))
            .unwrap_or_default()
    }
}

/// Result of applying a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitOutcome {
    /// Rows marked edited.
    pub processed: usize,
    /// Processed rows whose stored value or flag actually changed.
    pub changed: usize,
    /// Edits left alone because the reviewer did not touch them.
    pub skipped: usize,
    /// Ids that referenced no stored row.
    pub missing: Vec<i64>,
    /// Ids of default-language rows. Originals mirror the source and are never edited.
    pub protected: Vec<i64>,
    pub redirect: Redirect,
}

/// Review operations over a store, an entity source, a registry and the languages.
pub struct ReviewService<'a, S: EntitySource> {
    store: &'a KeyValueStore,
    source: &'a S,
    registry: &'a Registry,
    languages: &'a LanguageList,
}

impl<'a, S: EntitySource> ReviewService<'a, S> {
    /// # Errors
    /// `InvalidLanguages` when the store and the language list disagree on the
    /// default language.
    pub fn new(
        store: &'a KeyValueStore,
        source: &'a S,
        registry: &'a Registry,
        languages: &'a LanguageList,
    ) -> Result<Self> {
        if store.default_language() != languages.default_code() {
            return Err(TranslationError::InvalidLanguages(format!(
                "store default language '{}' does not match '{}'",
                store.default_language(),
                languages.default_code()
            )));
        }
        Ok(Self {
            store,
            source,
            registry,
            languages,
        })
    }

    /// Every registered entity type with its overall and per-language progress.
    pub async fn model_list(&self) -> Result<Vec<ModelSummary>> {
        let mut models = Vec::new();
        for entry in self.registry.entries() {
            let stats = stats::model_stats(self.store, self.source, entry, self.languages).await?;
            models.push(ModelSummary {
                entity_type: entry.entity_type.clone(),
                fields: entry.fields.clone(),
                stats,
            });
        }
        Ok(models)
    }

    /// Progress of one entity type in one language.
    pub async fn progress(&self, entity_type: &str, language: &str) -> Result<Progress> {
        let entry = self.registry.lookup(entity_type)?;
        self.languages.require(language)?;
        stats::stats(self.store, self.source, entry, Scope::Language(language)).await
    }

    /// Pair every current value of `entity_type` with its `language` translation,
    /// creating missing rows on the way.
    pub async fn model_detail(&self, entity_type: &str, language: &str) -> Result<ReviewPage> {
        let entry = self.registry.lookup(entity_type)?;
        let target = self.languages.require(language)?;
        let default_code = self.languages.default_code();

        let mut fields = Vec::new();
        let mut first_unedited: Option<i64> = None;

        for fv in scan::field_values(self.source, entry)? {
            let mut items = Vec::with_capacity(fv.values.len());
            for value in &fv.values {
                let original = self.store.get_or_create(value, default_code).await?;
                let translation = self.store.get_or_create(value, language).await?;
                if first_unedited.is_none() && !translation.edited {
                    first_unedited = Some(translation.id);
                }
                items.push(ReviewItem {
                    original,
                    translation,
                });
            }
            fields.push(FieldSection {
                name: fv.field,
                items,
            });
        }

        let progress =
            stats::stats(self.store, self.source, entry, Scope::Language(language)).await?;

        Ok(ReviewPage {
            entity_type: entry.entity_type.clone(),
            original_language: self.languages.default_language().clone(),
            target_language: target.clone(),
            fields,
            progress,
            first_unedited,
        })
    }

    /// Apply a batch of edits.
    ///
    /// Untouched edits are skipped. Touched edits replace the value (unless
    /// ignored) and always mark the row edited. Each row is updated on its own: an
    /// unknown id is recorded and the rest of the batch still applies.
    pub async fn submit(
        &self,
        entity_type: &str,
        language: &str,
        submission: &Submission,
    ) -> Result<SubmitOutcome> {
        let entry = self.registry.lookup(entity_type)?;
        self.languages.require(language)?;

        let mut processed = 0;
        let mut changed = 0;
        let mut skipped = 0;
        let mut missing = Vec::new();
        let mut protected = Vec::new();
        let default_code = self.languages.default_code();

        for edit in &submission.edits {
            if !edit.is_touched() {
                skipped += 1;
                continue;
            }

            let mut keyvalue = match self.store.get(edit.id).await {
                Ok(kv) => kv,
                Err(TranslationError::RowNotFound(id)) => {
                    warn!("Submitted edit for unknown key value {}", id);
                    missing.push(id);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if keyvalue.language == default_code {
                warn!("Refusing edit of original key value {}", keyvalue.id);
                protected.push(keyvalue.id);
                continue;
            }

            let value = if !edit.ignore && keyvalue.value != edit.text {
                edit.text.clone()
            } else {
                keyvalue.value.clone()
            };

            if self.store.save(&mut keyvalue, &value, true).await? {
                changed += 1;
            }
            processed += 1;
            debug!("Reviewed key value {}", keyvalue.id);
        }

        info!(
            "Submitted {} {} edits: {} processed, {} changed, {} skipped, {} missing, {} protected",
            entry.entity_type,
            language,
            processed,
            changed,
            skipped,
            missing.len(),
            protected.len()
        );

        Ok(SubmitOutcome {
            processed,
            changed,
            skipped,
            missing,
            protected,
            redirect: Redirect {
                entity_type: entry.entity_type.clone(),
                language: language.to_string(),
                section: submission.section.clone(),
            },
        })
    }

    /// Obsolete rows worth a reviewer's attention, ordered by digest.
    pub async fn obsolete_list(&self) -> Result<Vec<KeyValue>> {
        obsolete::obsolete_list(self.store, self.source, self.registry).await
    }

    /// Delete every obsolete row. Irreversible; confirmation is the caller's job.
    pub async fn purge_obsolete(&self) -> Result<u64> {
        obsolete::purge(self.store, self.source, self.registry).await
    }

    /// Materialize default-language rows for every current value.
    pub async fn export(&self, with_targets: bool) -> Result<ExportReport> {
        scan::export(self.store, self.source, self.registry, self.languages, with_targets).await
    }
}
