#![allow(dead_code)]

use async_trait::async_trait;
use std::convert::Infallible;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use throttlekit::{InMemoryStore, RateLimitEntry, RateLimitStore};

/// Which store operations should fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct Failures {
    pub get: bool,
    pub set: bool,
    pub increment: bool,
}

/// Wraps an in-memory store and fails the selected operations.
#[derive(Debug, Clone, Default)]
pub struct FaultyStore {
    inner: InMemoryStore,
    failures: Failures,
    gets: Arc<AtomicUsize>,
}

impl FaultyStore {
    pub fn new(failures: Failures) -> Self {
        Self { inner: InMemoryStore::new(), failures, gets: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn failing_get() -> Self {
        Self::new(Failures { get: true, ..Failures::default() })
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    fn unavailable() -> io::Error {
        io::Error::new(io::ErrorKind::ConnectionRefused, "store unavailable")
    }
}

#[async_trait]
impl RateLimitStore for FaultyStore {
    type Error = io::Error;

    async fn get(&self, key: &str) -> Result<Option<RateLimitEntry>, Self::Error> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.failures.get {
            return Err(Self::unavailable());
        }
        Ok(self.inner.get(key).await.unwrap_or_else(|never: Infallible| match never {}))
    }

    async fn set(&self, key: &str, entry: RateLimitEntry) -> Result<(), Self::Error> {
        if self.failures.set {
            return Err(Self::unavailable());
        }
        self.inner.set(key, entry).await.unwrap_or_else(|never: Infallible| match never {});
        Ok(())
    }

    async fn increment(&self, key: &str, now: u64) -> Result<u64, Self::Error> {
        if self.failures.increment {
            return Err(Self::unavailable());
        }
        Ok(self.inner.increment(key, now).await.unwrap_or_else(|never: Infallible| match never {}))
    }

    async fn reset_all(&self) -> Result<(), Self::Error> {
        self.inner.reset_all().await.unwrap_or_else(|never: Infallible| match never {});
        Ok(())
    }
}

pub fn request_from(ip: &str) -> http::Request<String> {
    http::Request::builder()
        .uri("/api/connections")
        .header("x-forwarded-for", ip)
        .body(String::new())
        .unwrap()
}
