//! Translation progress per entity type and language.

use crate::error::Result;
use crate::language::LanguageList;
use crate::registry::RegistryEntry;
use crate::scan::entity_digests;
use crate::source::EntitySource;
use crate::store::{KeyValueStore, Scope};
use serde::Serialize;

/// Completion of a set of translation rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// `floor(done * 100 / total)`, or 0 when there is nothing to translate.
    pub percent: u32,
    pub done: u64,
    pub total: u64,
}

impl Progress {
    /// Build progress from counts. An empty set (`total == 0`) is `(0, 0, 0)`.
    pub fn new(done: u64, total: u64) -> Self {
        if total == 0 {
            return Self::default();
        }
        let done = done.min(total);
        Self {
            percent: (done * 100 / total) as u32,
            done,
            total,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }
}

/// Progress of the rows reachable from `entry`'s current field values in `scope`.
pub async fn stats<S: EntitySource>(
    store: &KeyValueStore,
    source: &S,
    entry: &RegistryEntry,
    scope: Scope<'_>,
) -> Result<Progress> {
    let reachable = entity_digests(source, entry)?;
    let counts = store.count_for(&reachable, scope).await?;
    Ok(Progress::new(counts.done, counts.total))
}

/// Progress of one target language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageProgress {
    pub code: String,
    pub name: String,
    pub progress: Progress,
}

/// Overall and per-language progress of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelStats {
    /// Across every target language.
    pub overall: Progress,
    /// One entry per target language, in configured order.
    pub languages: Vec<LanguageProgress>,
}

/// Overall and per-target-language progress for `entry`.
pub async fn model_stats<S: EntitySource>(
    store: &KeyValueStore,
    source: &S,
    entry: &RegistryEntry,
    languages: &LanguageList,
) -> Result<ModelStats> {
    let reachable = entity_digests(source, entry)?;

    let overall = store.count_for(&reachable, Scope::Targets).await?;

    let mut per_language = Vec::new();
    for target in languages.targets() {
        let counts = store
            .count_for(&reachable, Scope::Language(&target.code))
            .await?;
        per_language.push(LanguageProgress {
            code: target.code.clone(),
            name: target.name.clone(),
            progress: Progress::new(counts.done, counts.total),
        });
    }

    Ok(ModelStats {
        overall: Progress::new(overall.done, overall.total),
        languages: per_language,
    })
}
