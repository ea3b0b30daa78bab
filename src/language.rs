//! Language list: the supported languages and the designated default.
//!
//! The default (original) language is the source of truth that every other
//! language translates from. It is never a translation target and is left out of
//! progress reporting.

use crate::error::{Result, TranslationError};
use serde::Serialize;

/// Configuration for a supported language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageConfig {
    /// Language code (e.g., "en", "fr", "pt-br")
    pub code: String,

    /// Display name of the language (e.g., "English", "French")
    pub name: String,
}

impl LanguageConfig {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Ordered set of supported languages with exactly one default.
///
/// Constructed once at startup and handed to the components that need it.
#[derive(Debug, Clone)]
pub struct LanguageList {
    languages: Vec<LanguageConfig>,
    default_index: usize,
}

impl LanguageList {
    /// Build a language list.
    ///
    /// # Errors
    /// `InvalidLanguages` if the list is empty, contains an empty or duplicate
    /// code, or does not contain `default_code`.
    pub fn new(languages: Vec<LanguageConfig>, default_code: &str) -> Result<Self> {
        if languages.is_empty() {
            return Err(TranslationError::InvalidLanguages(
                "at least one language is required".to_string(),
            ));
        }

        for (i, lang) in languages.iter().enumerate() {
            if lang.code.trim().is_empty() {
                return Err(TranslationError::InvalidLanguages(
                    "language codes must not be empty".to_string(),
                ));
            }
            if languages[..i].iter().any(|other| other.code == lang.code) {
                return Err(TranslationError::InvalidLanguages(format!(
                    "duplicate language code '{}'",
                    lang.code
                )));
            }
        }

        let default_index = languages
            .iter()
            .position(|lang| lang.code == default_code)
            .ok_or_else(|| {
                TranslationError::InvalidLanguages(format!(
                    "default language '{}' is not in the language list",
                    default_code
                ))
            })?;

        Ok(Self {
            languages,
            default_index,
        })
    }

    /// The default (original) language.
    pub fn default_language(&self) -> &LanguageConfig {
        &self.languages[self.default_index]
    }

    pub fn default_code(&self) -> &str {
        &self.default_language().code
    }

    pub fn is_default(&self, code: &str) -> bool {
        self.default_code() == code
    }

    /// Get a language configuration by its code.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Like [`get_by_code`](Self::get_by_code) but reports `UnknownLanguage`.
    pub fn require(&self, code: &str) -> Result<&LanguageConfig> {
        self.get_by_code(code)
            .ok_or_else(|| TranslationError::UnknownLanguage(code.to_string()))
    }

    /// All languages, in configured order.
    pub fn list_all(&self) -> &[LanguageConfig] {
        &self.languages
    }

    /// Translation targets: every language except the default, in configured order.
    pub fn targets(&self) -> Vec<&LanguageConfig> {
        self.languages
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != self.default_index)
            .map(|(_, lang)| lang)
            .collect()
    }
}
