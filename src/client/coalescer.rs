use super::transport::{TranslationTransport, TransportError, TransportReply};
use crate::i18n::Language;
use crate::retry::RetryConfig;
use crate::wire::TranslationBatch;
use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    /// Quiet period after the last enqueue before a batch is sent
    pub debounce: Duration,
    /// Backoff for texts whose batch failed
    pub retry: RetryConfig,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            retry: RetryConfig::failed_lookup(),
        }
    }
}

#[derive(Debug)]
struct State {
    active: Language,
    /// Bumped on every locale switch; replies tagged with an older epoch are dropped.
    epoch: u64,
    cache: HashMap<String, String>,
    loaded: HashMap<Language, HashMap<String, String>>,
    pending: Vec<String>,
    pending_set: HashSet<String>,
    in_flight_texts: HashSet<String>,
    /// Texts showing their source form until a retry succeeds.
    failed: HashSet<String>,
    attempts: HashMap<String, u32>,
    in_flight: bool,
    flush_deferred: bool,
    debounce_generation: u64,
}

impl State {
    fn new(active: Language) -> Self {
        Self {
            active,
            epoch: 0,
            cache: HashMap::new(),
            loaded: HashMap::new(),
            pending: Vec::new(),
            pending_set: HashSet::new(),
            in_flight_texts: HashSet::new(),
            failed: HashSet::new(),
            attempts: HashMap::new(),
            in_flight: false,
            flush_deferred: false,
            debounce_generation: 0,
        }
    }

    fn enqueue(&mut self, text: &str) -> bool {
        if self.pending_set.contains(text)
            || self.in_flight_texts.contains(text)
            || self.failed.contains(text)
        {
            return false;
        }
        self.pending_set.insert(text.to_string());
        self.pending.push(text.to_string());
        true
    }

    /// Drain the pending set into a batch and mark it in flight.
    fn take_batch(&mut self) -> Option<(TranslationBatch, u64)> {
        self.pending_set.clear();
        let batch = TranslationBatch::new(self.active, mem::take(&mut self.pending))?;
        self.in_flight = true;
        self.in_flight_texts = batch.texts().iter().cloned().collect();
        Some((batch, self.epoch))
    }
}

struct Inner<T> {
    transport: T,
    config: CoalescerConfig,
    runtime: Handle,
    state: Mutex<State>,
    revision: watch::Sender<u64>,
}

/// Session-scoped translation lookups with request coalescing.
///
/// `lookup` never blocks: a miss answers with the source text and queues it;
/// queued texts are sent as one batch once lookups go quiet for the debounce
/// window. Subscribers are notified whenever translations land so the UI can
/// render again.
pub struct Coalescer<T: TranslationTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: TranslationTransport> Clone for Coalescer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: TranslationTransport> Coalescer<T> {
    /// # Panics
    /// Panics when called outside a tokio runtime; timers and flushes run on it.
    pub fn new(transport: T, locale: Language, config: CoalescerConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                runtime: Handle::current(),
                state: Mutex::new(State::new(locale)),
                revision,
            }),
        }
    }

    /// Translation of `text` in `locale`, or `text` itself while none is known.
    pub fn lookup(&self, text: &str, locale: Language) -> String {
        let generation = {
            let mut state = self.inner.lock();
            if locale != state.active {
                self.inner.switch_locked(&mut state, locale);
            }

            if let Some(translated) = state.cache.get(text) {
                return translated.clone();
            }

            // Blank strings have nothing to translate.
            if locale.is_canonical() || text.trim().is_empty() || !state.enqueue(text) {
                return text.to_string();
            }

            state.debounce_generation += 1;
            state.debounce_generation
        };

        Inner::schedule_flush(&self.inner, generation);
        text.to_string()
    }

    /// Make `locale` active: previously loaded translations come back, queued
    /// and failed lookups of the old locale are forgotten.
    pub fn switch_locale(&self, locale: Language) {
        let mut state = self.inner.lock();
        if locale != state.active {
            self.inner.switch_locked(&mut state, locale);
        }
    }

    /// Queue every failed text again right away (e.g. on navigation).
    pub fn retry_failed(&self) {
        let generation = {
            let mut state = self.inner.lock();
            if state.failed.is_empty() {
                return;
            }
            let failed: Vec<String> = state.failed.drain().collect();
            for text in failed {
                state.enqueue(&text);
            }
            state.debounce_generation += 1;
            state.debounce_generation
        };

        Inner::schedule_flush(&self.inner, generation);
    }

    /// Seed a locale's translations, e.g. from a persisted snapshot.
    pub fn preload<I>(&self, locale: Language, entries: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        {
            let mut state = self.inner.lock();
            if locale == state.active {
                for (text, translated) in entries {
                    state.pending_set.remove(&text);
                    state.failed.remove(&text);
                    state.cache.insert(text, translated);
                }
                let State {
                    pending,
                    pending_set,
                    ..
                } = &mut *state;
                pending.retain(|text| pending_set.contains(text));
            } else {
                state.loaded.entry(locale).or_default().extend(entries);
            }
        }
        self.inner.bump_revision();
    }

    /// Known translations for `locale`.
    pub fn snapshot(&self, locale: Language) -> HashMap<String, String> {
        let state = self.inner.lock();
        if locale == state.active {
            state.cache.clone()
        } else {
            state.loaded.get(&locale).cloned().unwrap_or_default()
        }
    }

    /// Receiver bumped whenever visible translations change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub fn active_locale(&self) -> Language {
        self.inner.lock().active
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn failed_len(&self) -> usize {
        self.inner.lock().failed.len()
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.lock().in_flight
    }

    /// Wait until nothing is queued or in flight. Failed texts waiting for a
    /// retry do not count.
    pub async fn settle(&self) {
        loop {
            {
                let state = self.inner.lock();
                if state.pending.is_empty() && !state.in_flight {
                    return;
                }
            }
            tokio::time::sleep(self.inner.config.debounce).await;
        }
    }
}

impl<T: TranslationTransport> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }

    fn switch_locked(&self, state: &mut State, locale: Language) {
        debug!("Switching translations from {} to {}", state.active, locale);

        let previous = mem::take(&mut state.cache);
        state.loaded.insert(state.active, previous);
        state.cache = state.loaded.remove(&locale).unwrap_or_default();
        state.active = locale;
        state.epoch += 1;

        state.pending.clear();
        state.pending_set.clear();
        // The old locale's flight is left to finish on its own; its reply is dropped.
        state.in_flight = false;
        state.in_flight_texts.clear();
        state.flush_deferred = false;
        state.failed.clear();
        state.attempts.clear();
        // Orphan any armed debounce timer.
        state.debounce_generation += 1;

        self.bump_revision();
    }

    fn schedule_flush(this: &Arc<Self>, generation: u64) {
        let inner = Arc::clone(this);
        this.runtime.spawn(async move {
            tokio::time::sleep(inner.config.debounce).await;
            Inner::on_debounce_elapsed(&inner, generation).await;
        });
    }

    async fn on_debounce_elapsed(this: &Arc<Self>, generation: u64) {
        let next = {
            let mut state = this.lock();
            if state.debounce_generation != generation {
                return;
            }
            if state.in_flight {
                state.flush_deferred = true;
                return;
            }
            state.take_batch()
        };

        if let Some((batch, epoch)) = next {
            Inner::run_flushes(this, batch, epoch).await;
        }
    }

    /// Send `batch`, then keep sending whatever was deferred behind it.
    async fn run_flushes(this: &Arc<Self>, mut batch: TranslationBatch, mut epoch: u64) {
        loop {
            debug!(
                "Sending {} texts for translation to {}",
                batch.len(),
                batch.locale()
            );
            let result = this.transport.send(&batch).await;

            let next = {
                let mut state = this.lock();
                if epoch != state.epoch {
                    // Flight state now belongs to the new locale.
                    debug!(
                        "Discarding translations for {}: locale changed to {}",
                        batch.locale(),
                        state.active
                    );
                    return;
                }

                state.in_flight = false;
                state.in_flight_texts.clear();
                this.apply_reply(&mut state, &batch, result);

                if mem::take(&mut state.flush_deferred) {
                    state.take_batch()
                } else {
                    None
                }
            };

            match next {
                Some((next_batch, next_epoch)) => {
                    batch = next_batch;
                    epoch = next_epoch;
                }
                None => return,
            }
        }
    }

    fn apply_reply(
        self: &Arc<Self>,
        state: &mut State,
        batch: &TranslationBatch,
        result: Result<TransportReply, TransportError>,
    ) {
        let mut failed = Vec::new();

        match result {
            Ok(reply) => {
                for text in batch.texts() {
                    match reply.translations.get(text) {
                        Some(translated) if !(reply.degraded && translated == text) => {
                            state.attempts.remove(text);
                            state.cache.insert(text.clone(), translated.clone());
                        }
                        _ => failed.push(text.clone()),
                    }
                }
            }
            Err(e) => {
                warn!("Translation batch for {} failed: {}", batch.locale(), e);
                failed.extend(batch.texts().iter().cloned());
            }
        }

        if failed.len() < batch.len() {
            self.bump_revision();
        }
        if !failed.is_empty() {
            self.mark_failed(state, failed);
        }
    }

    /// Park texts in the failed set and arm a retry for those with attempts left.
    fn mark_failed(self: &Arc<Self>, state: &mut State, texts: Vec<String>) {
        let max_attempts = self.config.retry.max_attempts;
        let mut retryable = Vec::new();
        let mut highest_attempt = 0;

        for text in texts {
            let attempts = state.attempts.entry(text.clone()).or_insert(0);
            *attempts += 1;
            if *attempts < max_attempts {
                highest_attempt = highest_attempt.max(*attempts);
                retryable.push(text.clone());
            } else {
                warn!("Giving up on translating {:?} after {} attempts", text, attempts);
            }
            state.failed.insert(text);
        }

        if retryable.is_empty() {
            return;
        }

        let delay = self.config.retry.delay_for_attempt(highest_attempt);
        let epoch = state.epoch;
        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            Inner::requeue(&inner, retryable, epoch);
        });
    }

    fn requeue(this: &Arc<Self>, texts: Vec<String>, epoch: u64) {
        let generation = {
            let mut state = this.lock();
            if state.epoch != epoch {
                return;
            }
            let mut queued = false;
            for text in texts {
                if state.failed.remove(&text) {
                    queued |= state.enqueue(&text);
                }
            }
            if !queued {
                return;
            }
            state.debounce_generation += 1;
            state.debounce_generation
        };

        Inner::schedule_flush(this, generation);
    }
}
