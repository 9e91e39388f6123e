//! Rate limiting primitives.
//!
//! This module provides the building blocks for rate limiting:
//! - [`RateLimiter`]: The core trait for rate limiting logic.
//! - [`RateLimitLayer`]: Tower middleware that enforces the limit on `http` services.
//! - [`Decision`]: The result of a rate limit check.
//!
//! # Architecture
//!
//! The system is designed to be modular:
//! - **Middleware**: `RateLimitLayer` wraps your service. It doesn't know *how* limiting works,
//!   only that it should ask a `RateLimiter` about the key a `KeyExtractor` derives.
//! - **Logic**: `FixedWindowLimiter` (in `strategies` module) handles the counting.
//! - **Storage**: `RateLimitStore` (in `store` module) handles the state, enabling
//!   in-memory or distributed backends (e.g., Redis).
//! - **Legacy**: `LegacyRateLimiter` (in `legacy` module) is the synchronous, error-returning
//!   form built on the same limiter.
//!
//! # Fixed windows
//!
//! A key's window starts at its first request and lasts `window`; the next request after
//! that opens a new window. A client can therefore land up to `2 * max_requests - 1`
//! admitted requests across one window edge. This is a known property of the algorithm.
//!
//! # Failure policy
//!
//! Store errors fail open: the request is admitted and the failure is logged and emitted
//! as telemetry. The limiter never turns an unhealthy store into rejected traffic.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;

pub mod keys;
pub mod legacy;
mod locks;
pub mod middleware;
pub mod store;
pub mod strategies;

pub use keys::{key_fn, ClientIp, ConstantKey, KeyExtractor, KeyFn, RequestHead};
pub use legacy::{rate_limiter, LegacyRateLimiter};
pub use middleware::{create_rate_limiter, RateLimitLayer, RateLimitService};
pub use store::{Hit, InMemoryStore, RateLimitEntry, RateLimitStore};
pub use strategies::FixedWindowLimiter;

/// The decision returned by a rate limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The request is allowed to proceed.
    Allowed {
        /// Requests left in the current window after this one.
        /// Useful for `X-RateLimit-Remaining` headers.
        remaining: u64,
        /// Configured limit.
        limit: u64,
        /// Time until the window resets.
        reset_after: Duration,
    },
    /// The request is denied.
    Denied {
        /// How long the caller should wait before retrying.
        /// Useful for `Retry-After` headers.
        retry_after: Duration,
        /// Configured limit.
        limit: u64,
    },
    /// The store failed and the request was admitted without being counted.
    FailedOpen,
}

impl Decision {
    /// Helper to check if the request may proceed.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Denied { .. })
    }

    /// Helper to check if the request was rejected.
    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Denied { .. })
    }
}

/// Core interface for rate limiting logic.
///
/// Decouples the middleware from the algorithm and the storage.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request against `key` and decide whether it may proceed.
    ///
    /// Errors only when the backing store fails; callers decide the failure policy.
    async fn acquire(&self, key: &str) -> Result<Decision, StoreError>;

    /// [`RateLimiter::acquire`] with the fail-open policy applied.
    async fn admit(&self, key: &str) -> Decision {
        match self.acquire(key).await {
            Ok(decision) => decision,
            Err(error) => {
                tracing::warn!(key, %error, "rate limit store unavailable, failing open");
                Decision::FailedOpen
            }
        }
    }
}
