use crate::language::{LanguageConfig, LanguageList};
use anyhow::{bail, Context, Result};

/// An entity type and the fields to register as translatable.
pub type FieldRegistration = (String, Vec<String>);

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Languages
    pub languages: Vec<LanguageConfig>,
    pub default_language: String,

    // Entity source
    pub source_file: String,
    /// Empty means every declared field of every entity type.
    pub translatable_fields: Vec<FieldRegistration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            // Database
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://translations.db?mode=rwc".to_string()),
            database_max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),

            // Languages
            languages: parse_languages(
                &std::env::var("LANGUAGES").unwrap_or_else(|_| "en:English".to_string()),
            )
            .context("Invalid LANGUAGES")?,
            default_language: std::env::var("DEFAULT_LANGUAGE")
                .unwrap_or_else(|_| "en".to_string()),

            // Entity source
            source_file: std::env::var("SOURCE_FILE")
                .unwrap_or_else(|_| "data/entities.json".to_string()),
            translatable_fields: parse_translatable_fields(
                &std::env::var("TRANSLATABLE_FIELDS").unwrap_or_default(),
            )
            .context("Invalid TRANSLATABLE_FIELDS")?,
        })
    }

    /// Validated language list built from `languages` and `default_language`.
    pub fn language_list(&self) -> Result<LanguageList> {
        LanguageList::new(self.languages.clone(), &self.default_language)
            .context("Invalid language configuration")
    }
}

/// Parse `en:English,fr:French` (names optional: `en,fr`).
pub fn parse_languages(spec: &str) -> Result<Vec<LanguageConfig>> {
    let languages: Vec<LanguageConfig> = spec
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((code, name)) => LanguageConfig::new(code.trim(), name.trim()),
            None => LanguageConfig::new(entry, entry),
        })
        .collect();

    if languages.is_empty() {
        bail!("No languages configured");
    }
    Ok(languages)
}

/// Parse `Article=title,body;Page=heading`.
pub fn parse_translatable_fields(spec: &str) -> Result<Vec<FieldRegistration>> {
    let mut registrations = Vec::new();

    for entry in spec.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((entity_type, fields)) = entry.split_once('=') else {
            bail!("Expected <Type>=<field>,<field> but got '{}'", entry);
        };

        let fields: Vec<String> = fields
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if fields.is_empty() {
            bail!("No fields listed for '{}'", entity_type.trim());
        }

        registrations.push((entity_type.trim().to_string(), fields));
    }

    Ok(registrations)
}
