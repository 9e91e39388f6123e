mod common;

use async_trait::async_trait;
use common::{Failures, FaultyStore};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use throttlekit::prelude::*;
use tokio::sync::Barrier;

fn config(max: u64, window_ms: u64) -> RateLimiterConfig {
    RateLimiterConfig::from_millis(max, window_ms).expect("valid config")
}

#[tokio::test]
async fn first_n_admitted_then_rejected() {
    let limiter = FixedWindowLimiter::new(config(4, 60_000));
    for _ in 0..4 {
        assert!(limiter.acquire("198.51.100.4").await.expect("no error").is_allowed());
    }
    assert!(limiter.acquire("198.51.100.4").await.expect("no error").is_denied());
}

#[tokio::test]
async fn exhausting_one_key_leaves_another_untouched() {
    let limiter = FixedWindowLimiter::new(config(2, 60_000));
    for _ in 0..5 {
        limiter.acquire("k1").await.expect("no error");
    }
    assert!(limiter.acquire("k1").await.expect("no error").is_denied());

    match limiter.acquire("k2").await.expect("no error") {
        Decision::Allowed { remaining, .. } => assert_eq!(remaining, 1),
        other => panic!("expected allowed, got {:?}", other),
    }
}

#[tokio::test]
async fn exhausted_key_is_readmitted_after_window() {
    let clock = ManualClock::new(0);
    let limiter = FixedWindowLimiter::new(config(2, 1_000)).with_clock(clock.clone());

    limiter.acquire("k").await.expect("no error");
    limiter.acquire("k").await.expect("no error");
    assert!(limiter.acquire("k").await.expect("no error").is_denied());

    clock.advance(Duration::from_millis(1_000));
    assert!(limiter.acquire("k").await.expect("no error").is_allowed());
}

#[tokio::test]
async fn failing_get_fails_open_and_reports() {
    let store = FaultyStore::failing_get();
    let sink = MemorySink::new();
    let limiter = FixedWindowLimiter::with_store(config(1, 60_000), store.clone())
        .with_sink(sink.clone());

    let err = limiter.acquire("k").await.unwrap_err();
    assert!(err.to_string().contains("store unavailable"));

    for _ in 0..3 {
        assert_eq!(limiter.admit("k").await, Decision::FailedOpen);
    }

    assert_eq!(store.gets(), 4);
    assert!(sink
        .events()
        .iter()
        .all(|event| matches!(event, RateLimitEvent::StoreFailure { .. })));
    assert_eq!(sink.len(), 4);
}

#[tokio::test]
async fn failing_writes_fail_open() {
    for failures in [
        Failures { set: true, ..Failures::default() },
        Failures { increment: true, ..Failures::default() },
    ] {
        let limiter = FixedWindowLimiter::with_store(config(1, 60_000), FaultyStore::new(failures));
        // First hit goes through `set`, later hits through `increment`.
        for _ in 0..3 {
            assert!(limiter.admit("k").await.is_allowed());
        }
    }
}

#[tokio::test]
async fn limiters_sharing_a_store_share_counts() {
    let store = InMemoryStore::new();
    let a = FixedWindowLimiter::with_store(config(3, 60_000), store.clone());
    let b = FixedWindowLimiter::with_store(config(3, 60_000), store.clone());

    a.acquire("k").await.expect("no error");
    b.acquire("k").await.expect("no error");
    a.acquire("k").await.expect("no error");
    assert!(b.acquire("k").await.expect("no error").is_denied());
    assert_eq!(store.len(), 1);
}

/// Holds every `hit` until `parties` callers have read the key, so they all see the
/// same state before any of them counts.
#[derive(Clone)]
struct RendezvousStore {
    inner: InMemoryStore,
    barrier: Arc<Barrier>,
}

#[async_trait]
impl RateLimitStore for RendezvousStore {
    type Error = Infallible;

    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>, Infallible> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, entry: RateLimitEntry) -> Result<(), Infallible> {
        self.inner.set(key, entry).await
    }

    async fn increment(&self, key: &str, now: u64) -> Result<u64, Infallible> {
        self.inner.increment(key, now).await
    }

    async fn reset_all(&self) -> Result<(), Infallible> {
        self.inner.reset_all().await
    }

    async fn hit(&self, key: &str, now: u64, window_ms: u64) -> Result<Hit, Infallible> {
        self.inner.get(key).await?;
        self.barrier.wait().await;
        self.inner.hit(key, now, window_ms).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn limiters_sharing_a_store_never_both_open_a_window() {
    let clock = ManualClock::new(10_000);
    let inner = InMemoryStore::new();
    inner.set("k", RateLimitEntry { key: "k".into(), count: 7, window_start: 0 }).await.unwrap();
    let store = RendezvousStore { inner: inner.clone(), barrier: Arc::new(Barrier::new(2)) };

    let a = Arc::new(
        FixedWindowLimiter::with_store(config(1, 1_000), store.clone()).with_clock(clock.clone()),
    );
    let b = Arc::new(FixedWindowLimiter::with_store(config(1, 1_000), store).with_clock(clock));

    let first = tokio::spawn(async move { a.admit("k").await });
    let second = tokio::spawn(async move { b.admit("k").await });
    let decisions = [first.await.expect("task"), second.await.expect("task")];

    let admitted = decisions.iter().filter(|d| d.is_allowed()).count();
    assert_eq!(admitted, 1, "decisions: {:?}", decisions);
    assert_eq!(inner.get("k").await.unwrap().expect("entry").count, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn global_store_enforces_one_limit_across_limiters() {
    let key = "rate_limit::global_store_enforces_one_limit_across_limiters";
    let limiters: Vec<_> = (0..4)
        .map(|_| Arc::new(FixedWindowLimiter::with_store(config(10, 60_000), InMemoryStore::global())))
        .collect();

    let mut handles = Vec::new();
    for i in 0..40 {
        let limiter = limiters[i % limiters.len()].clone();
        handles.push(tokio::spawn(async move { limiter.admit(key).await }));
    }

    let mut admitted = 0;
    for handle in handles {
        if handle.await.expect("task").is_allowed() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);
}

#[tokio::test]
async fn idle_entries_can_be_evicted_without_changing_decisions() {
    let clock = ManualClock::new(0);
    let store = InMemoryStore::new();
    let limiter =
        FixedWindowLimiter::with_store(config(1, 1_000), store.clone()).with_clock(clock.clone());

    limiter.acquire("idle").await.expect("no error");
    clock.advance(Duration::from_millis(5_000));
    limiter.acquire("busy").await.expect("no error");

    let window = Duration::from_millis(1_000);
    assert_eq!(store.evict_idle(clock.now_millis(), window, Duration::from_millis(100)), 1);
    assert!(limiter.acquire("idle").await.expect("no error").is_allowed());
    assert!(limiter.acquire("busy").await.expect("no error").is_denied());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_keys_count_independently() {
    let limiter = Arc::new(FixedWindowLimiter::new(config(10, 60_000)));
    let mut handles = Vec::new();
    for client in 0..8 {
        for _ in 0..15 {
            let limiter = limiter.clone();
            let key = format!("10.0.0.{}", client);
            handles.push(tokio::spawn(async move { (key.clone(), limiter.admit(&key).await) }));
        }
    }

    let mut admitted = std::collections::HashMap::new();
    for handle in handles {
        let (key, decision) = handle.await.expect("task");
        if decision.is_allowed() {
            *admitted.entry(key).or_insert(0) += 1;
        }
    }

    assert_eq!(admitted.len(), 8);
    assert!(admitted.values().all(|&n| n == 10));
}
