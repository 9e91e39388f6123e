use async_trait::async_trait;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

/// Counter state for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Bucket identifier (client IP or custom key).
    pub key: String,
    /// Requests counted in the current window.
    pub count: u64,
    /// When the current window began, in clock milliseconds.
    pub window_start: u64,
}

impl RateLimitEntry {
    /// A fresh window opened by the request at `now`.
    pub fn first_hit(key: impl Into<String>, now: u64) -> Self {
        Self { key: key.into(), count: 1, window_start: now }
    }

    /// Whether the window has elapsed at `now`.
    ///
    /// Windows are fixed: once `window_start + window <= now` the entry is stale.
    pub fn is_expired(&self, window_ms: u64, now: u64) -> bool {
        self.window_start.saturating_add(window_ms) <= now
    }

    /// Time left until the window resets.
    pub fn resets_in(&self, window_ms: u64, now: u64) -> Duration {
        let ends_at = self.window_start.saturating_add(window_ms);
        Duration::from_millis(ends_at.saturating_sub(now))
    }
}

/// Outcome of counting one request against a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    /// The entry after this request was counted.
    pub entry: RateLimitEntry,
    /// Whether this request opened a new window over an elapsed one.
    pub renewed: bool,
}

/// Abstract storage interface for rate limit counters.
///
/// Designed to support both the in-memory default and shared backends (e.g. a
/// distributed cache). The limiter counts through [`hit`](RateLimitStore::hit). Its
/// default composes `get`, `set` and `increment` and is only race-free within a single
/// limiter; stores shared by several limiters or processes must override it with one
/// atomic operation.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Error type for storage operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the current entry for a key.
    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>, Self::Error>;

    /// Overwrite the entry for a key.
    async fn set(&self, key: &str, entry: RateLimitEntry) -> Result<(), Self::Error>;

    /// Add one to the key's count and return the new count.
    ///
    /// Creates the entry with `count = 1, window_start = now` if absent.
    async fn increment(&self, key: &str, now: u64) -> Result<u64, Self::Error>;

    /// Drop every tracked key.
    async fn reset_all(&self) -> Result<(), Self::Error>;

    /// Count one request against `key` at `now`.
    ///
    /// Increments the current window, or starts a new one with `count = 1` when the key
    /// is absent or its window of `window_ms` has elapsed.
    async fn hit(&self, key: &str, now: u64, window_ms: u64) -> Result<Hit, Self::Error> {
        match self.get(key).await? {
            Some(entry) if !entry.is_expired(window_ms, now) => {
                let count = self.increment(key, now).await?;
                Ok(Hit { entry: RateLimitEntry { count, ..entry }, renewed: false })
            }
            stale => {
                let entry = RateLimitEntry::first_hit(key, now);
                self.set(key, entry.clone()).await?;
                Ok(Hit { entry, renewed: stale.is_some() })
            }
        }
    }
}

/// Simple in-memory store.
///
/// Clones share the same map, so one store can back several limiters.
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    data: Arc<Mutex<HashMap<String, RateLimitEntry>>>,
}

static GLOBAL_STORE: OnceLock<InMemoryStore> = OnceLock::new();

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the process-wide store.
    ///
    /// Every limiter built on this handle shares counters for the life of the process;
    /// call [`RateLimitStore::reset_all`] between tests.
    pub fn global() -> Self {
        GLOBAL_STORE.get_or_init(InMemoryStore::new).clone()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove entries whose window started at least `idle` before `now`.
    ///
    /// `idle` is raised to `window` when shorter, so only entries whose window has
    /// elapsed are dropped and a later request would have reset them anyway. Returns how
    /// many keys were dropped.
    pub fn evict_idle(&self, now: u64, window: Duration, idle: Duration) -> usize {
        let cutoff_ms = u64::try_from(idle.max(window).as_millis()).unwrap_or(u64::MAX);
        let mut guard = self.lock();
        let before = guard.len();
        guard.retain(|_, entry| !entry.is_expired(cutoff_ms, now));
        let evicted = before - guard.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = guard.len(), "evicted idle rate limit entries");
        }
        evicted
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitEntry>> {
        // The map holds plain data; a panic mid-update cannot leave it half-written.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RateLimitStore for InMemoryStore {
    type Error = Infallible;

    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>, Self::Error> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, entry: RateLimitEntry) -> Result<(), Self::Error> {
        self.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn increment(&self, key: &str, now: u64) -> Result<u64, Self::Error> {
        let mut guard = self.lock();
        let entry = guard
            .entry(key.to_string())
            .or_insert_with(|| RateLimitEntry { key: key.to_string(), count: 0, window_start: now });
        entry.count = entry.count.saturating_add(1);
        Ok(entry.count)
    }

    async fn reset_all(&self) -> Result<(), Self::Error> {
        self.lock().clear();
        Ok(())
    }

    async fn hit(&self, key: &str, now: u64, window_ms: u64) -> Result<Hit, Self::Error> {
        let mut guard = self.lock();
        let renewed = match guard.get_mut(key) {
            Some(entry) if !entry.is_expired(window_ms, now) => {
                entry.count = entry.count.saturating_add(1);
                return Ok(Hit { entry: entry.clone(), renewed: false });
            }
            existing => existing.is_some(),
        };
        let entry = RateLimitEntry::first_hit(key, now);
        guard.insert(key.to_string(), entry.clone());
        Ok(Hit { entry, renewed })
    }
}
