//! Synchronous, error-returning limiter.
//!
//! A thin adapter over [`FixedWindowLimiter`] for call sites that check a request
//! inline and map the error to a 429 themselves. New code should prefer the
//! [`RateLimitLayer`](crate::RateLimitLayer) middleware.

use crate::config::RateLimiterConfig;
use crate::error::{ConfigError, RateLimitExceeded, StoreError};
use crate::rate_limit::keys::{ClientIp, KeyExtractor, RequestHead};
use crate::rate_limit::store::RateLimitStore;
use crate::rate_limit::strategies::FixedWindowLimiter;
use crate::rate_limit::{Decision, RateLimiter};
use crate::telemetry::TelemetrySink;
use http::Request;

/// Build a synchronous limiter admitting `max_requests` per client IP per `window_ms`.
///
/// # Examples
/// ```
/// use throttlekit::rate_limiter;
///
/// let limiter = rate_limiter(5, 15 * 60 * 1000).unwrap();
/// for _ in 0..5 {
///     limiter.check_key("192.168.1.2").unwrap();
/// }
/// let err = limiter.check_key("192.168.1.2").unwrap_err();
/// assert_eq!(err.to_string(), "Rate limit exceeded");
/// ```
pub fn rate_limiter(max_requests: u64, window_ms: u64) -> Result<LegacyRateLimiter, ConfigError> {
    let config = RateLimiterConfig::from_millis(max_requests, window_ms)?;
    Ok(LegacyRateLimiter::new(FixedWindowLimiter::new(config)))
}

/// Checks requests synchronously, returning [`RateLimitExceeded`] once a key is over quota.
///
/// Blocks the calling thread for the duration of the check. With the in-memory store
/// nothing inside the check ever waits on I/O.
#[derive(Debug)]
pub struct LegacyRateLimiter<L = FixedWindowLimiter> {
    limiter: L,
}

impl<L> LegacyRateLimiter<L>
where
    L: RateLimiter,
{
    pub fn new(limiter: L) -> Self {
        Self { limiter }
    }

    /// Count `req` against its client IP.
    pub fn check<B>(&self, req: &Request<B>) -> Result<(), RateLimitExceeded> {
        let key = ClientIp.extract(&RequestHead::from_request(req));
        self.check_key(&key)
    }

    /// Count one request against `key`.
    pub fn check_key(&self, key: &str) -> Result<(), RateLimitExceeded> {
        match futures::executor::block_on(self.limiter.admit(key)) {
            Decision::Denied { retry_after, limit } => Err(RateLimitExceeded {
                limit,
                retry_after_ms: u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
            }),
            Decision::Allowed { .. } | Decision::FailedOpen => Ok(()),
        }
    }

    pub fn limiter(&self) -> &L {
        &self.limiter
    }
}

impl<St, T> LegacyRateLimiter<FixedWindowLimiter<St, T>>
where
    St: RateLimitStore + 'static,
    T: TelemetrySink,
    T::Future: Send + 'static,
{
    /// Forget every tracked client.
    ///
    /// Meant for tests. Unlike request checks, a store failure here is returned.
    pub fn reset_all(&self) -> Result<(), StoreError> {
        futures::executor::block_on(self.limiter.reset_all())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::store::RateLimitEntry;
    use async_trait::async_trait;
    use std::time::Duration;

    fn from_ip(ip: &str) -> Request<()> {
        Request::builder().header("x-forwarded-for", ip).body(()).unwrap()
    }

    #[test]
    fn sixth_request_in_fifteen_minutes_is_rejected() {
        let limiter = rate_limiter(5, 900_000).unwrap();
        let req = from_ip("192.168.1.2");

        for _ in 0..5 {
            assert!(limiter.check(&req).is_ok());
        }
        let err = limiter.check(&req).unwrap_err();
        assert_eq!(err.to_string(), "Rate limit exceeded");
        assert_eq!(err.limit, 5);
    }

    #[test]
    fn ips_are_tracked_independently() {
        let limiter = rate_limiter(10, 900_000).unwrap();
        let first = from_ip("192.168.1.10");
        for _ in 0..10 {
            limiter.check(&first).unwrap();
        }
        assert!(limiter.check(&first).is_err());
        assert!(limiter.check(&from_ip("192.168.1.11")).is_ok());
    }

    #[test]
    fn window_expiry_readmits() {
        let clock = ManualClock::new(0);
        let limiter = LegacyRateLimiter::new(
            FixedWindowLimiter::new(RateLimiterConfig::from_millis(1, 1_000).unwrap())
                .with_clock(clock.clone()),
        );

        limiter.check_key("k").unwrap();
        assert!(limiter.check_key("k").is_err());
        clock.advance(Duration::from_millis(1_000));
        assert!(limiter.check_key("k").is_ok());
    }

    #[test]
    fn reset_all_restores_quota() {
        let limiter = rate_limiter(1, 60_000).unwrap();
        limiter.check_key("k").unwrap();
        assert!(limiter.check_key("k").is_err());

        limiter.reset_all().unwrap();
        assert!(limiter.check_key("k").is_ok());
    }

    #[test]
    fn store_failure_fails_open() {
        struct Unavailable;

        #[async_trait]
        impl RateLimiter for Unavailable {
            async fn acquire(&self, _key: &str) -> Result<Decision, StoreError> {
                Err(StoreError::new("timed out"))
            }
        }

        let limiter = LegacyRateLimiter::new(Unavailable);
        for _ in 0..3 {
            assert!(limiter.check_key("k").is_ok());
        }
    }

    #[test]
    fn reset_all_reports_store_failure() {
        struct Offline;

        fn offline() -> std::io::Error {
            std::io::Error::new(std::io::ErrorKind::NotConnected, "offline")
        }

        #[async_trait]
        impl RateLimitStore for Offline {
            type Error = std::io::Error;

            async fn get(&self, _key: &str) -> Result<Option<RateLimitEntry>, Self::Error> {
                Err(offline())
            }
            async fn set(&self, _key: &str, _entry: RateLimitEntry) -> Result<(), Self::Error> {
                Err(offline())
            }
            async fn increment(&self, _key: &str, _now: u64) -> Result<u64, Self::Error> {
                Err(offline())
            }
            async fn reset_all(&self) -> Result<(), Self::Error> {
                Err(offline())
            }
        }

        let config = RateLimiterConfig::from_millis(1, 1_000).unwrap();
        let limiter = LegacyRateLimiter::new(FixedWindowLimiter::with_store(config, Offline));

        assert!(limiter.check_key("k").is_ok());
        let err = limiter.reset_all().unwrap_err();
        assert!(err.to_string().contains("offline"));
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        assert_eq!(rate_limiter(0, 1_000).unwrap_err(), ConfigError::ZeroMaxRequests);
        assert_eq!(rate_limiter(1, 0).unwrap_err(), ConfigError::ZeroWindow);
    }
}
