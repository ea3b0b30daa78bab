//! KeyValue store: per-language values keyed by the digest of the original string.
//!
//! One row per (digest, language). The default-language row holds the original
//! content; every other language holds a translation that starts out empty and
//! unedited. The `UNIQUE (digest, language)` constraint is what keeps concurrent
//! writers from creating duplicates.

use crate::digest::Digest;
use crate::error::{Result, TranslationError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Maximum bound values per `IN (...)` list (well under SQLite's bind limit).
const BIND_CHUNK_SIZE: usize = 500;

/// Attempts at inserting a row that keeps losing races to concurrent purges.
const GET_OR_CREATE_ATTEMPTS: u32 = 3;

const SELECT_COLUMNS: &str = "id, digest, language, value, edited, updated_at";

/// A stored value for one (digest, language) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct KeyValue {
    pub id: i64,
    pub digest: Digest,
    pub language: String,
    pub value: String,
    /// Set once a reviewer has explicitly saved this row.
    pub edited: bool,
    pub updated_at: DateTime<Utc>,
}

/// Which languages a count covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// A single language.
    Language(&'a str),
    /// Every language except the default.
    Targets,
}

/// Row counts for a reachable digest set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub total: u64,
    pub done: u64,
}

#[derive(Clone)]
pub struct KeyValueStore {
    pool: SqlitePool,
    default_language: String,
}

impl KeyValueStore {
    /// Open (creating if missing) the database at `database_url` and ensure the schema.
    pub async fn connect(
        database_url: &str,
        default_language: &str,
        max_connections: u32,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        info!("Connected to translation store at {}", database_url);
        Self::with_pool(pool, default_language).await
    }

    /// Open a private in-memory store. Everything is lost when the store is dropped.
    pub async fn in_memory(default_language: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // A single connection that never recycles: each in-memory connection is its own database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool, default_language).await
    }

    /// Wrap an existing pool, creating tables and indexes if needed.
    pub async fn with_pool(pool: SqlitePool, default_language: &str) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS key_values (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                digest TEXT NOT NULL,
                language TEXT NOT NULL,
                value TEXT NOT NULL,
                edited INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                UNIQUE (digest, language)
            )",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_key_values_language ON key_values (language)")
            .execute(&pool)
            .await?;

        Ok(Self {
            pool,
            default_language: default_language.to_string(),
        })
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Find or create the row for `original` in `language`.
    ///
    /// The default-language row stores `original` itself. Rows for other languages
    /// start with an empty value and `edited = false`. A concurrent insert of the same
    /// row is resolved by re-fetching the winner.
    pub async fn get_or_create(&self, original: &str, language: &str) -> Result<KeyValue> {
        let digest = Digest::of(original);
        let initial = if language == self.default_language {
            original
        } else {
            ""
        };

        for _ in 0..GET_OR_CREATE_ATTEMPTS {
            if let Some(existing) = self.lookup(&digest, language).await? {
                return Ok(existing);
            }

            let inserted = sqlx::query_as::<_, KeyValue>(&format!(
                "INSERT INTO key_values (digest, language, value, edited, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4)
                 RETURNING {}",
                SELECT_COLUMNS
            ))
            .bind(digest.as_str())
            .bind(language)
            .bind(initial)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await;

            match inserted {
                Ok(row) => {
                    debug!("Created key value {} ({}, {})", row.id, digest, language);
                    return Ok(row);
                }
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    debug!(
                        "Key value ({}, {}) was created concurrently, re-fetching",
                        digest, language
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Created and deleted underneath us on every attempt.
        Err(TranslationError::Database(sqlx::Error::RowNotFound))
    }

    /// Fetch a row by id.
    pub async fn get(&self, id: i64) -> Result<KeyValue> {
        sqlx::query_as::<_, KeyValue>(&format!(
            "SELECT {} FROM key_values WHERE id = ?1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TranslationError::RowNotFound(id))
    }

    /// Fetch the row for (digest, language) without creating it.
    pub async fn lookup(&self, digest: &Digest, language: &str) -> Result<Option<KeyValue>> {
        let row = sqlx::query_as::<_, KeyValue>(&format!(
            "SELECT {} FROM key_values WHERE digest = ?1 AND language = ?2",
            SELECT_COLUMNS
        ))
        .bind(digest.as_str())
        .bind(language)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Store `value` and `edited` on the row, refreshing `keyvalue` in place.
    ///
    /// Returns whether anything changed. Saving the same value and flag again is a
    /// no-op, including the timestamp.
    pub async fn save(&self, keyvalue: &mut KeyValue, value: &str, edited: bool) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE key_values SET value = ?1, edited = ?2, updated_at = ?3
             WHERE id = ?4 AND (value <> ?1 OR edited <> ?2)",
        )
        .bind(value)
        .bind(edited)
        .bind(now)
        .bind(keyvalue.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Unchanged, or deleted: get() tells the two apart.
            *keyvalue = self.get(keyvalue.id).await?;
            return Ok(false);
        }

        debug!("Saved key value {} (edited = {})", keyvalue.id, edited);
        keyvalue.value = value.to_string();
        keyvalue.edited = edited;
        keyvalue.updated_at = now;
        Ok(true)
    }

    /// Count rows in `scope` whose digest is in `reachable`.
    ///
    /// `done` is the subset with `edited = true`. Default-language rows are never
    /// counted, so `Scope::Language(default)` yields zero counts. Rows outside
    /// `reachable` (obsolete rows, or rows of other entity types) are not counted.
    pub async fn count_for(&self, reachable: &HashSet<Digest>, scope: Scope<'_>) -> Result<Counts> {
        let mut counts = Counts::default();
        if reachable.is_empty() {
            return Ok(counts);
        }
        if let Scope::Language(code) = scope {
            if code == self.default_language {
                return Ok(counts);
            }
        }

        let digests: Vec<&Digest> = reachable.iter().collect();
        for chunk in digests.chunks(BIND_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT COUNT(*), COALESCE(SUM(edited), 0) FROM key_values WHERE language <> ",
            );
            builder.push_bind(self.default_language.as_str());
            if let Scope::Language(code) = scope {
                builder.push(" AND language = ");
                builder.push_bind(code);
            }
            builder.push(" AND digest IN (");
            let mut separated = builder.separated(", ");
            for digest in chunk {
                separated.push_bind(digest.as_str());
            }
            separated.push_unseparated(")");

            let (total, done): (i64, i64) = builder
                .build_query_as()
                .fetch_one(&self.pool)
                .await?;
            counts.total += total as u64;
            counts.done += done as u64;
        }
        Ok(counts)
    }

    /// Every stored row, ordered by digest then language.
    pub async fn rows(&self) -> Result<Vec<KeyValue>> {
        let rows = sqlx::query_as::<_, KeyValue>(&format!(
            "SELECT {} FROM key_values ORDER BY digest, language",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Number of stored rows.
    pub async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM key_values")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Delete the rows with the given ids in one transaction. Returns the number deleted.
    pub async fn delete(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for chunk in ids.chunks(BIND_CHUNK_SIZE) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("DELETE FROM key_values WHERE id IN (");
            let mut separated = builder.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            deleted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        debug!("Deleted {} key values", deleted);
        Ok(deleted)
    }

    /// Translated value of `original` in `language`.
    ///
    /// Falls back to `original` until a reviewer has saved the translation. A saved
    /// empty translation is returned as the empty string.
    pub async fn translate(&self, original: &str, language: &str) -> Result<String> {
        if language == self.default_language {
            return Ok(original.to_string());
        }

        let keyvalue = self.get_or_create(original, language).await?;
        if keyvalue.edited {
            Ok(keyvalue.value)
        } else {
            Ok(original.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ==================== Helper Functions ====================

    async fn create_test_store() -> KeyValueStore {
        KeyValueStore::in_memory("en")
            .await
            .expect("Failed to create store")
    }

    // ==================== Initialization Tests ====================

    #[tokio::test]
    async fn test_store_starts_empty() {
        let store = create_test_store().await;
        assert!(store.is_empty().await.expect("Should count"));
        assert!(store.rows().await.expect("Should list").is_empty());
    }

    #[tokio::test]
    async fn test_store_reopening() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("translations.db");
        let url = format!("sqlite://{}", db_path.display());

        {
            let store = KeyValueStore::connect(&url, "en", 2)
                .await
                .expect("Failed to create store");
            store.get_or_create("Hello", "en").await.expect("Should create");
        }

        {
            let store = KeyValueStore::connect(&url, "en", 2)
                .await
                .expect("Failed to reopen store");
            assert_eq!(store.len().await.expect("Should count"), 1, "Row should persist");
            let row = store
                .lookup(&Digest::of("Hello"), "en")
                .await
                .expect("Should query");
            assert_eq!(row.map(|r| r.value), Some("Hello".to_string()));
        }
    }

    #[tokio::test]
    async fn test_invalid_database_path() {
        let result = KeyValueStore::connect("sqlite:///non/existent/path/db.db", "en", 1).await;
        assert!(result.is_err());
    }

    // ==================== get_or_create Tests ====================

    #[tokio::test]
    async fn test_default_language_row_holds_original() {
        let store = create_test_store().await;
        let row = store.get_or_create("Hello", "en").await.expect("Should create");

        assert_eq!(row.digest, Digest::of("Hello"));
        assert_eq!(row.language, "en");
        assert_eq!(row.value, "Hello");
        assert!(!row.edited);
    }

    #[tokio::test]
    async fn test_translation_row_starts_empty() {
        let store = create_test_store().await;
        let row = store.get_or_create("Hello", "fr").await.expect("Should create");

        assert_eq!(row.digest, Digest::of("Hello"));
        assert_eq!(row.language, "fr");
        assert_eq!(row.value, "");
        assert!(!row.edited);
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = create_test_store().await;
        let first = store.get_or_create("Hello", "fr").await.expect("first");
        let second = store.get_or_create("Hello", "fr").await.expect("second");

        assert_eq!(first, second);
        assert_eq!(store.len().await.expect("Should count"), 1);
    }

    #[tokio::test]
    async fn test_languages_share_digest() {
        let store = create_test_store().await;
        let en = store.get_or_create("Hello", "en").await.expect("en");
        let fr = store.get_or_create("Hello", "fr").await.expect("fr");

        assert_ne!(en.id, fr.id);
        assert_eq!(en.digest, fr.digest);
    }

    #[tokio::test]
    async fn test_changed_content_creates_new_row() {
        let store = create_test_store().await;
        let old = store.get_or_create("Hello", "en").await.expect("old");
        let new = store.get_or_create("Hello!", "en").await.expect("new");

        assert_ne!(old.id, new.id);
        assert_eq!(store.len().await.expect("Should count"), 2);
        // The old row stays until it is purged as obsolete
        assert_eq!(store.get(old.id).await.expect("Should exist").value, "Hello");
    }

    #[tokio::test]
    async fn test_existing_translation_is_not_reset() {
        let store = create_test_store().await;
        let mut row = store.get_or_create("Hello", "fr").await.expect("create");
        store.save(&mut row, "Bonjour", true).await.expect("save");

        let again = store.get_or_create("Hello", "fr").await.expect("again");
        assert_eq!(again.value, "Bonjour");
        assert!(again.edited);
    }

    // ==================== get / lookup Tests ====================

    #[tokio::test]
    async fn test_get_missing_row() {
        let store = create_test_store().await;
        let err = store.get(999).await.unwrap_err();
        assert!(matches!(err, TranslationError::RowNotFound(999)));
    }

    #[tokio::test]
    async fn test_lookup_does_not_create() {
        let store = create_test_store().await;
        let row = store
            .lookup(&Digest::of("Hello"), "fr")
            .await
            .expect("Should query");
        assert!(row.is_none());
        assert!(store.is_empty().await.expect("Should count"));
    }

    // ==================== save Tests ====================

    #[tokio::test]
    async fn test_save_updates_value_and_flag() {
        let store = create_test_store().await;
        let mut row = store.get_or_create("Hello", "fr").await.expect("create");

        let changed = store.save(&mut row, "Bonjour", true).await.expect("save");
        assert!(changed);
        assert_eq!(row.value, "Bonjour");
        assert!(row.edited);

        let stored = store.get(row.id).await.expect("Should exist");
        assert_eq!(stored.value, "Bonjour");
        assert!(stored.edited);
    }

    #[tokio::test]
    async fn test_save_same_value_is_noop() {
        let store = create_test_store().await;
        let mut row = store.get_or_create("Hello", "fr").await.expect("create");
        store.save(&mut row, "Bonjour", true).await.expect("first save");
        let after_first = store.get(row.id).await.expect("Should exist");

        let changed = store.save(&mut row, "Bonjour", true).await.expect("second save");
        assert!(!changed);
        assert_eq!(store.get(row.id).await.expect("Should exist"), after_first);
        assert_eq!(row, after_first);
    }

    #[tokio::test]
    async fn test_save_flag_only() {
        let store = create_test_store().await;
        let mut row = store.get_or_create("Hello", "fr").await.expect("create");

        let changed = store.save(&mut row, "", true).await.expect("save");
        assert!(changed);
        assert_eq!(row.value, "");
        assert!(row.edited);
    }

    #[tokio::test]
    async fn test_save_deleted_row() {
        let store = create_test_store().await;
        let mut row = store.get_or_create("Hello", "fr").await.expect("create");
        store.delete(&[row.id]).await.expect("delete");

        let err = store.save(&mut row, "Bonjour", true).await.unwrap_err();
        assert!(matches!(err, TranslationError::RowNotFound(_)));
    }

    // ==================== count_for Tests ====================

    #[tokio::test]
    async fn test_count_for_language() {
        let store = create_test_store().await;
        let mut hello = store.get_or_create("Hello", "fr").await.expect("create");
        store.get_or_create("World", "fr").await.expect("create");
        store.get_or_create("Hello", "de").await.expect("create");
        store.save(&mut hello, "Bonjour", true).await.expect("save");

        let reachable: HashSet<Digest> = ["Hello", "World"].iter().map(|s| Digest::of(s)).collect();

        let fr = store.count_for(&reachable, Scope::Language("fr")).await.expect("count");
        assert_eq!(fr, Counts { total: 2, done: 1 });

        let de = store.count_for(&reachable, Scope::Language("de")).await.expect("count");
        assert_eq!(de, Counts { total: 1, done: 0 });
    }

    #[tokio::test]
    async fn test_count_for_targets_excludes_default() {
        let store = create_test_store().await;
        store.get_or_create("Hello", "en").await.expect("create");
        store.get_or_create("Hello", "fr").await.expect("create");
        let mut de = store.get_or_create("Hello", "de").await.expect("create");
        store.save(&mut de, "Hallo", true).await.expect("save");

        let reachable: HashSet<Digest> = [Digest::of("Hello")].into_iter().collect();
        let counts = store.count_for(&reachable, Scope::Targets).await.expect("count");
        assert_eq!(counts, Counts { total: 2, done: 1 });
    }

    #[tokio::test]
    async fn test_count_for_ignores_unreachable_rows() {
        let store = create_test_store().await;
        let mut stale = store.get_or_create("Old title", "fr").await.expect("create");
        store.save(&mut stale, "Ancien titre", true).await.expect("save");
        store.get_or_create("Hello", "fr").await.expect("create");

        let reachable: HashSet<Digest> = [Digest::of("Hello")].into_iter().collect();
        let counts = store.count_for(&reachable, Scope::Language("fr")).await.expect("count");
        assert_eq!(counts, Counts { total: 1, done: 0 });
    }

    #[tokio::test]
    async fn test_count_for_default_language_is_zero() {
        let store = create_test_store().await;
        let mut original = store.get_or_create("Hello", "en").await.expect("create");
        store.save(&mut original, "Hello", true).await.expect("save");
        store.get_or_create("Hello", "fr").await.expect("create");

        let reachable: HashSet<Digest> = [Digest::of("Hello")].into_iter().collect();
        let counts = store.count_for(&reachable, Scope::Language("en")).await.expect("count");
        assert_eq!(counts, Counts::default());
    }

    #[tokio::test]
    async fn test_count_for_spans_bind_chunks() {
        let store = create_test_store().await;
        let texts: Vec<String> = (0..(BIND_CHUNK_SIZE + 20)).map(|i| format!("text {}", i)).collect();
        for text in &texts {
            store.get_or_create(text, "fr").await.expect("create");
        }
        let mut first = store.get_or_create(&texts[0], "fr").await.expect("get");
        store.save(&mut first, "texte 0", true).await.expect("save");

        let reachable: HashSet<Digest> = texts.iter().map(|t| Digest::of(t)).collect();
        let counts = store.count_for(&reachable, Scope::Targets).await.expect("count");
        assert_eq!(
            counts,
            Counts { total: (BIND_CHUNK_SIZE + 20) as u64, done: 1 }
        );

        let none = store.count_for(&HashSet::new(), Scope::Targets).await.expect("count");
        assert_eq!(none, Counts::default());
    }

    // ==================== rows / delete Tests ====================

    #[tokio::test]
    async fn test_rows_ordered_by_digest() {
        let store = create_test_store().await;
        for text in ["one", "two", "three", "four"] {
            store.get_or_create(text, "en").await.expect("create");
            store.get_or_create(text, "fr").await.expect("create");
        }

        let rows = store.rows().await.expect("Should list");
        assert_eq!(rows.len(), 8);
        let keys: Vec<_> = rows.iter().map(|r| (r.digest.clone(), r.language.clone())).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[tokio::test]
    async fn test_delete_rows() {
        let store = create_test_store().await;
        let a = store.get_or_create("a", "en").await.expect("create");
        let b = store.get_or_create("b", "en").await.expect("create");
        let c = store.get_or_create("c", "en").await.expect("create");

        let deleted = store.delete(&[a.id, c.id, 12345]).await.expect("delete");
        assert_eq!(deleted, 2);

        let rows = store.rows().await.expect("Should list");
        assert_eq!(rows, vec![b]);
    }

    #[tokio::test]
    async fn test_delete_nothing() {
        let store = create_test_store().await;
        assert_eq!(store.delete(&[]).await.expect("delete"), 0);
    }

    #[tokio::test]
    async fn test_delete_many_rows_in_chunks() {
        let store = create_test_store().await;
        let mut ids = Vec::new();
        for i in 0..(BIND_CHUNK_SIZE + 20) {
            ids.push(store.get_or_create(&format!("text {}", i), "en").await.expect("create").id);
        }

        let deleted = store.delete(&ids).await.expect("delete");
        assert_eq!(deleted, ids.len() as u64);
        assert!(store.is_empty().await.expect("Should count"));
    }

    // ==================== translate Tests ====================

    #[tokio::test]
    async fn test_translate_falls_back_to_original() {
        let store = create_test_store().await;
        let value = store.translate("Hello", "fr").await.expect("translate");
        assert_eq!(value, "Hello");
        // The translation row is materialized on first use
        assert!(store
            .lookup(&Digest::of("Hello"), "fr")
            .await
            .expect("Should query")
            .is_some());
    }

    #[tokio::test]
    async fn test_translate_returns_edited_value() {
        let store = create_test_store().await;
        let mut row = store.get_or_create("Hello", "fr").await.expect("create");
        store.save(&mut row, "Bonjour", true).await.expect("save");

        assert_eq!(store.translate("Hello", "fr").await.expect("translate"), "Bonjour");
    }

    #[tokio::test]
    async fn test_translate_deliberately_empty() {
        let store = create_test_store().await;
        let mut row = store.get_or_create("Hello", "fr").await.expect("create");
        store.save(&mut row, "", true).await.expect("save");

        assert_eq!(store.translate("Hello", "fr").await.expect("translate"), "");
    }

    #[tokio::test]
    async fn test_translate_default_language() {
        let store = create_test_store().await;
        assert_eq!(store.translate("Hello", "en").await.expect("translate"), "Hello");
        assert!(store.is_empty().await.expect("Should count"));
    }
}
