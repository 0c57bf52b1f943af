//! Persisted translation cache.
//!
//! Translations are stored under a key derived from the target locale and a
//! SHA-256 digest of the source text, with a time-to-live. The store is shared
//! by every request; entries are never deleted explicitly, only expired.

mod memory;
mod sqlite;

pub use memory::MemoryCacheStore;
pub use sqlite::SqliteCacheStore;

use crate::i18n::Language;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Default lifetime of a cached translation.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Key of one cached translation: `translation:{locale}:{sha256(text)}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
    locale: Language,
}

impl CacheKey {
    pub fn new(locale: Language, text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        Self {
            key: format!("translation:{}:{}", locale.code(), hex::encode(digest)),
            locale,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn locale(&self) -> Language {
        self.locale
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// Key/value store with per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live entry. Expired entries read as absent.
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheStoreError>;

    /// Insert or overwrite an entry, live for `ttl` from now.
    async fn put(&self, key: &CacheKey, value: &str, ttl: Duration)
        -> Result<(), CacheStoreError>;

    /// Drop expired entries, returning how many were removed.
    async fn purge_expired(&self) -> Result<u64, CacheStoreError>;
}

/// Source of the current time for TTL bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = expiry(*now, by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// `now + ttl`, saturating at the largest representable instant.
pub(crate) fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
