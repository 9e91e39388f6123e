//! Convenient re-exports for common throttlekit types.
pub use crate::{
    clock::{Clock, ManualClock, SystemClock},
    config::RateLimiterConfig,
    error::{ConfigError, ErrorEnvelope, RateLimitExceeded, StoreError},
    rate_limit::{
        create_rate_limiter, key_fn, rate_limiter, ClientIp, ConstantKey, Decision,
        FixedWindowLimiter, Hit, InMemoryStore, KeyExtractor, LegacyRateLimiter, RateLimitEntry,
        RateLimitLayer, RateLimitStore, RateLimiter, RequestHead,
    },
    telemetry::{LogSink, MemorySink, NullSink, RateLimitEvent, TelemetrySink},
};
