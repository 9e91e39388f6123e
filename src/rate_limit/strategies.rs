use crate::clock::{Clock, SystemClock};
use crate::config::RateLimiterConfig;
use crate::error::StoreError;
use crate::rate_limit::locks::KeyLocks;
use crate::rate_limit::store::{InMemoryStore, RateLimitStore};
use crate::rate_limit::{Decision, RateLimiter};
use crate::telemetry::{emit_best_effort, LogSink, RateLimitEvent, TelemetrySink};
use async_trait::async_trait;
use std::sync::Arc;

/// A fixed-window rate limiter.
///
/// Admits up to `max_requests` per key per window. A key's window opens with its first
/// request and restarts with the first request after it elapses.
///
/// Each request is counted with one [`RateLimitStore::hit`]. Per key, that call also
/// runs under a lock, so stores relying on the default `hit` never lose updates within
/// one limiter. Distinct keys never wait on each other.
///
/// # Examples
/// ```
/// use throttlekit::{FixedWindowLimiter, RateLimiter, RateLimiterConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let limiter = FixedWindowLimiter::new(RateLimiterConfig::from_millis(2, 60_000).unwrap());
/// assert!(limiter.admit("203.0.113.7").await.is_allowed());
/// assert!(limiter.admit("203.0.113.7").await.is_allowed());
/// assert!(limiter.admit("203.0.113.7").await.is_denied());
/// # }
/// ```
pub struct FixedWindowLimiter<St = InMemoryStore, T = LogSink> {
    config: RateLimiterConfig,
    store: Arc<St>,
    clock: Arc<dyn Clock>,
    locks: KeyLocks,
    sink: T,
}

impl FixedWindowLimiter {
    /// Create a limiter backed by its own in-memory store.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_store(config, InMemoryStore::new())
    }
}

impl<St> FixedWindowLimiter<St, LogSink>
where
    St: RateLimitStore + 'static,
{
    /// Create a limiter backed by `store`.
    pub fn with_store(config: RateLimiterConfig, store: St) -> Self {
        Self {
            config,
            store: Arc::new(store),
            clock: Arc::new(SystemClock),
            locks: KeyLocks::new(),
            sink: LogSink,
        }
    }
}

impl<St, T> FixedWindowLimiter<St, T>
where
    St: RateLimitStore + 'static,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Route telemetry events to `sink` instead of the tracing log.
    pub fn with_sink<T2>(self, sink: T2) -> FixedWindowLimiter<St, T2>
    where
        T2: TelemetrySink,
    {
        FixedWindowLimiter {
            config: self.config,
            store: self.store,
            clock: self.clock,
            locks: self.locks,
            sink,
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    /// Clear every key's state.
    ///
    /// Gives tests a clean baseline; not part of the request path.
    pub async fn reset_all(&self) -> Result<(), StoreError> {
        self.store.reset_all().await.map_err(StoreError::new)
    }

    async fn emit(&self, event: RateLimitEvent) {
        emit_best_effort(self.sink.clone(), event).await;
    }
}

#[async_trait]
impl<St, T> RateLimiter for FixedWindowLimiter<St, T>
where
    St: RateLimitStore + 'static,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    async fn acquire(&self, key: &str) -> Result<Decision, StoreError> {
        let limit = self.config.max_requests();
        let window_ms = self.config.window_millis();

        tracing::trace!(key, limit, window_ms, "checking rate limit");

        // Events go out after the key is unlocked so a slow sink never stalls the key.
        let (now, hit) = {
            let _guard = self.locks.lock(key).await;
            let now = self.clock.now_millis();
            (now, self.store.hit(key, now, window_ms).await)
        };

        let hit = match hit {
            Ok(hit) => hit,
            Err(error) => {
                let error = StoreError::new(error);
                self.emit(RateLimitEvent::StoreFailure {
                    key: key.to_string(),
                    error: error.to_string(),
                })
                .await;
                return Err(error);
            }
        };

        if hit.renewed {
            tracing::debug!(key, "rate limit window elapsed, starting a new one");
            self.emit(RateLimitEvent::WindowReset { key: key.to_string() }).await;
        }

        let count = hit.entry.count;
        let reset_after = hit.entry.resets_in(window_ms, now);

        if count <= limit {
            self.emit(RateLimitEvent::Allowed { key: key.to_string(), count, limit }).await;
            Ok(Decision::Allowed { remaining: limit - count, limit, reset_after })
        } else {
            tracing::debug!(key, count, limit, "rate limit exceeded");
            self.emit(RateLimitEvent::Denied {
                key: key.to_string(),
                count,
                limit,
                retry_after: reset_after,
            })
            .await;
            Ok(Decision::Denied { retry_after: reset_after, limit })
        }
    }
}

impl<St, T> std::fmt::Debug for FixedWindowLimiter<St, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedWindowLimiter")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
