//! Obsolescence detection: stored rows whose digest no live field value produces.
//!
//! Source content changes over time. A changed value digests differently, so the
//! rows keyed by the old digest are orphaned. Only the orphans worth a human's
//! attention are listed (edited translations and original-language rows), but a
//! purge removes every orphan.

use crate::digest::Digest;
use crate::error::Result;
use crate::registry::Registry;
use crate::scan::reachable_digests;
use crate::source::EntitySource;
use crate::store::{KeyValue, KeyValueStore};
use std::collections::HashSet;
use tracing::info;

/// Split `rows` into (obsolete, live) by digest reachability, keeping row order.
pub fn classify(rows: Vec<KeyValue>, reachable: &HashSet<Digest>) -> (Vec<KeyValue>, Vec<KeyValue>) {
    rows.into_iter()
        .partition(|row| !reachable.contains(&row.digest))
}

/// Whether an obsolete row belongs in the review list.
pub fn is_reviewable(row: &KeyValue, default_language: &str) -> bool {
    row.edited || row.language == default_language
}

/// Every obsolete row in the store, ordered by digest then language.
pub async fn find_obsoletes<S: EntitySource>(
    store: &KeyValueStore,
    source: &S,
    registry: &Registry,
) -> Result<Vec<KeyValue>> {
    let reachable = reachable_digests(source, registry)?;
    let (obsolete, _) = classify(store.rows().await?, &reachable);
    Ok(obsolete)
}

/// Obsolete rows to show a reviewer: edited rows and default-language rows only.
pub async fn obsolete_list<S: EntitySource>(
    store: &KeyValueStore,
    source: &S,
    registry: &Registry,
) -> Result<Vec<KeyValue>> {
    let default_language = store.default_language().to_string();
    Ok(find_obsoletes(store, source, registry)
        .await?
        .into_iter()
        .filter(|row| is_reviewable(row, &default_language))
        .collect())
}

/// Delete every obsolete row, reviewable or not. Returns the number deleted.
pub async fn purge<S: EntitySource>(
    store: &KeyValueStore,
    source: &S,
    registry: &Registry,
) -> Result<u64> {
    let obsolete = find_obsoletes(store, source, registry).await?;
    let ids: Vec<i64> = obsolete.iter().map(|row| row.id).collect();
    let deleted = store.delete(&ids).await?;
    info!("Purged {} obsolete key values", deleted);
    Ok(deleted)
}
