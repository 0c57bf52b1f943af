use crate::cache::{CacheKey, CacheStore, DEFAULT_TTL};
use crate::i18n::{Language, TranslationMetrics};
use crate::provider::{ProviderError, TranslationProvider};
use crate::wire::dedup_preserving_order;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, warn};

type SharedTranslation = Shared<BoxFuture<'static, Result<String, ProviderError>>>;
type InFlight = Arc<Mutex<HashMap<CacheKey, SharedTranslation>>>;

/// Result of translating one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub translations: BTreeMap<String, String>,
    /// Set when at least one text fell back to itself because the provider failed.
    pub degraded: bool,
}

impl BatchOutcome {
    fn identity(texts: &[String]) -> Self {
        Self {
            translations: texts.iter().map(|t| (t.clone(), t.clone())).collect(),
            degraded: false,
        }
    }
}

/// Cache-backed batch translation shared by every request of the process.
///
/// Concurrent misses for the same key share one provider call through the
/// in-flight registry.
pub struct TranslationService {
    store: Arc<dyn CacheStore>,
    provider: Arc<dyn TranslationProvider>,
    metrics: Arc<TranslationMetrics>,
    source: Language,
    ttl: Duration,
    in_flight: InFlight,
}

impl TranslationService {
    pub fn new(store: Arc<dyn CacheStore>, provider: Arc<dyn TranslationProvider>) -> Self {
        Self {
            store,
            provider,
            metrics: Arc::new(TranslationMetrics::new()),
            source: Language::canonical(),
            ttl: DEFAULT_TTL,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<TranslationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &TranslationMetrics {
        &self.metrics
    }

    pub fn store(&self) -> Arc<dyn CacheStore> {
        Arc::clone(&self.store)
    }

    /// Translate `texts` into `target`.
    ///
    /// A missing or canonical target answers with the identity map without
    /// touching the cache or the provider. Cache store failures count as
    /// misses. After the first provider failure every unresolved text maps to
    /// itself and the outcome is flagged as degraded.
    pub async fn translate_batch(
        &self,
        texts: Vec<String>,
        target: Option<Language>,
    ) -> BatchOutcome {
        let texts = dedup_preserving_order(texts);

        let target = match target {
            Some(target) if target != self.source && !target.is_canonical() => target,
            _ => return BatchOutcome::identity(&texts),
        };

        let mut outcome = BatchOutcome::default();
        let mut misses = Vec::new();

        for text in &texts {
            let key = CacheKey::new(target, text);
            match self.store.get(&key).await {
                Ok(Some(cached)) => {
                    self.metrics.record_cache_hit();
                    outcome.translations.insert(text.clone(), cached);
                }
                Ok(None) => {
                    self.metrics.record_cache_miss();
                    misses.push((key, text));
                }
                Err(e) => {
                    warn!("Cache lookup failed for {}, treating as miss: {}", key, e);
                    self.metrics.record_store_error();
                    self.metrics.record_cache_miss();
                    misses.push((key, text));
                }
            }
        }

        debug!(
            "Translating batch to {}: {} hits, {} misses",
            target,
            outcome.translations.len(),
            misses.len()
        );

        let mut misses = misses.into_iter();
        for (key, text) in misses.by_ref() {
            match self.resolve_miss(key, text, target).await {
                Ok(translated) => {
                    outcome.translations.insert(text.clone(), translated);
                }
                Err(e) => {
                    error!("Translation error for {}: {}", target, e);
                    outcome.translations.insert(text.clone(), text.clone());
                    outcome.degraded = true;
                    break;
                }
            }
        }

        for (_, text) in misses {
            outcome.translations.insert(text.clone(), text.clone());
        }

        if outcome.degraded {
            self.metrics.record_degraded_response();
        }

        outcome
    }

    /// Translate one missed text, joining an in-flight provider call for the
    /// same key when there is one.
    async fn resolve_miss(
        &self,
        key: CacheKey,
        text: &str,
        target: Language,
    ) -> Result<String, ProviderError> {
        let pending = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            match in_flight.get(&key) {
                Some(pending) => {
                    self.metrics.record_coalesced();
                    pending.clone()
                }
                None => {
                    let pending = self.spawn_provider_call(key.clone(), text.to_string(), target);
                    in_flight.insert(key, pending.clone());
                    pending
                }
            }
        };

        pending.await
    }

    /// Start the provider call on its own task so it completes, is cached and
    /// leaves the registry even if every waiting request goes away.
    ///
    /// Must be called with the registry lock held: the task removes its key
    /// under the same lock, so it cannot do so before the caller inserts it.
    fn spawn_provider_call(
        &self,
        key: CacheKey,
        text: String,
        target: Language,
    ) -> SharedTranslation {
        let provider = Arc::clone(&self.provider);
        let store = Arc::clone(&self.store);
        let metrics = Arc::clone(&self.metrics);
        let registry = Arc::clone(&self.in_flight);
        let source = self.source;
        let ttl = self.ttl;

        let task = tokio::spawn(async move {
            metrics.record_api_call();
            let result = provider.translate(&text, source, target).await;

            match &result {
                Ok(translated) => {
                    if let Err(e) = store.put(&key, translated, ttl).await {
                        warn!("Failed to cache translation {}: {}", key, e);
                        metrics.record_store_error();
                    }
                }
                Err(_) => metrics.record_api_failure(),
            }

            registry
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&key);

            result
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(ProviderError::Network(format!(
                    "translation task failed: {}",
                    e
                )))
            })
        }
        .boxed()
        .shared()
    }
}
