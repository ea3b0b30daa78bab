//! Scanning registered entity fields: current values, reachable digests and export.

use crate::digest::Digest;
use crate::error::Result;
use crate::language::LanguageList;
use crate::registry::{Registry, RegistryEntry};
use crate::source::{Entity, EntitySource};
use crate::store::KeyValueStore;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

/// Current values of one registered field, one per live instance that has it set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValues {
    pub field: String,
    pub values: Vec<String>,
}

/// Read the current values of every registered field of `entry`, field by field.
pub fn field_values<S: EntitySource>(source: &S, entry: &RegistryEntry) -> Result<Vec<FieldValues>> {
    let instances = source.instances(&entry.entity_type)?;

    Ok(entry
        .fields
        .iter()
        .map(|field| FieldValues {
            field: field.clone(),
            values: instances
                .iter()
                .filter_map(|instance| instance.field_value(field))
                .collect(),
        })
        .collect())
}

/// Digests of every current value of `entry`'s registered fields.
pub fn entity_digests<S: EntitySource>(source: &S, entry: &RegistryEntry) -> Result<HashSet<Digest>> {
    Ok(field_values(source, entry)?
        .iter()
        .flat_map(|fv| fv.values.iter())
        .map(|value| Digest::of(value))
        .collect())
}

/// Digests reachable from any registered field of any live instance.
pub fn reachable_digests<S: EntitySource>(source: &S, registry: &Registry) -> Result<HashSet<Digest>> {
    let mut reachable = HashSet::new();
    for entry in registry.entries() {
        let digests = entity_digests(source, entry)?;
        debug!("{}: {} reachable digests", entry.entity_type, digests.len());
        reachable.extend(digests);
    }
    Ok(reachable)
}

/// Outcome of an export run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    /// Registered entity types scanned.
    pub entity_types: usize,
    /// Distinct original strings found.
    pub originals: usize,
    /// Translation rows ensured (zero unless targets were requested).
    pub translations: usize,
    /// Rows that did not exist before the run.
    pub created: u64,
}

/// Ensure a default-language row exists for every current value of every registered
/// field. With `with_targets`, also ensure the translation row for every target
/// language.
pub async fn export<S: EntitySource>(
    store: &KeyValueStore,
    source: &S,
    registry: &Registry,
    languages: &LanguageList,
    with_targets: bool,
) -> Result<ExportReport> {
    info!("Exporting translatable strings for {} entity types", registry.entries().len());
    let before = store.len().await?;

    let mut seen: HashSet<Digest> = HashSet::new();
    let mut report = ExportReport::default();

    for entry in registry.entries() {
        report.entity_types += 1;
        for fv in field_values(source, entry)? {
            for value in &fv.values {
                if !seen.insert(Digest::of(value)) {
                    continue;
                }
                store.get_or_create(value, languages.default_code()).await?;
                report.originals += 1;

                if with_targets {
                    for target in languages.targets() {
                        store.get_or_create(value, &target.code).await?;
                        report.translations += 1;
                    }
                }
            }
        }
    }

    report.created = store.len().await?.saturating_sub(before);
    info!(
        "Export finished: {} originals, {} translations, {} new rows",
        report.originals, report.translations, report.created
    );
    Ok(report)
}
