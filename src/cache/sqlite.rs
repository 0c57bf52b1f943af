use super::{expiry, CacheKey, CacheStore, CacheStoreError, Clock, SystemClock};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// SQLite-backed translation cache, shared by every request of the process.
#[derive(Clone)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Self::connect_with_clock(database_url, Arc::new(SystemClock)).await
    }

    pub async fn connect_with_clock(database_url: &str, clock: Arc<dyn Clock>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid cache database URL: {}", database_url))?
            .create_if_missing(true);

        // Every connection to `:memory:` gets its own database, so keep exactly one alive.
        let in_memory = database_url.contains(":memory:");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open cache database at {}", database_url))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS translation_cache (
                cache_key TEXT PRIMARY KEY,
                locale TEXT NOT NULL,
                translated TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .context("Failed to create translation_cache table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_translation_cache_expires_at
                ON translation_cache(expires_at)",
        )
        .execute(&pool)
        .await
        .context("Failed to create translation_cache index")?;

        info!("Translation cache database ready at {}", database_url);

        Ok(Self { pool, clock })
    }

    /// Count stored entries, expired ones included.
    pub async fn entry_count(&self) -> Result<i64, CacheStoreError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM translation_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheStoreError> {
        let now = self.clock.now().timestamp_millis();
        let translated = sqlx::query_scalar::<_, String>(
            "SELECT translated FROM translation_cache
             WHERE cache_key = ?1 AND expires_at > ?2",
        )
        .bind(key.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(translated)
    }

    async fn put(
        &self,
        key: &CacheKey,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheStoreError> {
        let now = self.clock.now();
        let expires_at = expiry(now, ttl);

        sqlx::query(
            "INSERT INTO translation_cache (cache_key, locale, translated, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(cache_key) DO UPDATE SET
                translated = excluded.translated,
                created_at = excluded.created_at,
                expires_at = excluded.expires_at",
        )
        .bind(key.as_str())
        .bind(key.locale().code())
        .bind(value)
        .bind(now.timestamp_millis())
        .bind(expires_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, CacheStoreError> {
        let now = self.clock.now().timestamp_millis();
        let result = sqlx::query("DELETE FROM translation_cache WHERE expires_at <= ?1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, DEFAULT_TTL};
    use crate::i18n::Language;
    use chrono::Utc;
    use tempfile::TempDir;

    // ==================== Helper Functions ====================

    async fn create_test_store() -> (SqliteCacheStore, Arc<ManualClock>, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("translations.db");
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = SqliteCacheStore::connect_with_clock(
            &format!("sqlite://{}", db_path.display()),
            clock.clone(),
        )
        .await
        .expect("Failed to create cache database");
        (store, clock, temp_dir)
    }

    // ==================== Initialization Tests ====================

    #[tokio::test]
    async fn test_database_creation() {
        let (store, _clock, _temp_dir) = create_test_store().await;

        assert_eq!(store.entry_count().await.expect("Should count"), 0);
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let store = SqliteCacheStore::connect("sqlite::memory:")
            .await
            .expect("Should open in-memory database");
        let key = CacheKey::new(Language::FRENCH, "Hello");

        store.put(&key, "Bonjour", DEFAULT_TTL).await.unwrap();

        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("Bonjour"));
    }

    #[tokio::test]
    async fn test_database_reopening() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let url = format!("sqlite://{}", temp_dir.path().join("cache.db").display());
        let key = CacheKey::new(Language::SPANISH, "Checkout");

        {
            let store = SqliteCacheStore::connect(&url).await.expect("Should open");
            store.put(&key, "Pagar", DEFAULT_TTL).await.unwrap();
        }

        {
            let store = SqliteCacheStore::connect(&url).await.expect("Should reopen");
            assert_eq!(
                store.get(&key).await.unwrap().as_deref(),
                Some("Pagar"),
                "Entry should persist"
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_database_path() {
        let result = SqliteCacheStore::connect("sqlite:///non/existent/path/cache.db").await;
        assert!(result.is_err());
    }

    // ==================== get/put Tests ====================

    #[tokio::test]
    async fn test_get_missing_key() {
        let (store, _clock, _temp_dir) = create_test_store().await;

        let key = CacheKey::new(Language::GERMAN, "Brands");
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_keys_are_locale_scoped() {
        let (store, _clock, _temp_dir) = create_test_store().await;

        store
            .put(&CacheKey::new(Language::FRENCH, "Hello"), "Bonjour", DEFAULT_TTL)
            .await
            .unwrap();

        let german = CacheKey::new(Language::GERMAN, "Hello");
        assert!(store.get(&german).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_is_last_write_wins() {
        let (store, _clock, _temp_dir) = create_test_store().await;
        let key = CacheKey::new(Language::FRENCH, "Hello");

        store.put(&key, "Salut", DEFAULT_TTL).await.unwrap();
        store.put(&key, "Bonjour", DEFAULT_TTL).await.unwrap();

        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some("Bonjour"));
        assert_eq!(store.entry_count().await.unwrap(), 1);
    }

    // ==================== TTL Tests ====================

    #[tokio::test]
    async fn test_entry_is_a_miss_after_ttl() {
        let (store, clock, _temp_dir) = create_test_store().await;
        let key = CacheKey::new(Language::FRENCH, "Hello");

        store.put(&key, "Bonjour", DEFAULT_TTL).await.unwrap();

        clock.advance(Duration::from_secs(25 * 3600));
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock, _temp_dir) = create_test_store().await;

        store
            .put(&CacheKey::new(Language::FRENCH, "a"), "a", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .put(&CacheKey::new(Language::FRENCH, "b"), "b", DEFAULT_TTL)
            .await
            .unwrap();
        clock.advance(Duration::from_secs(61));

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.entry_count().await.unwrap(), 1);
    }
}
