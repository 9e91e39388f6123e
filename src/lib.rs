#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # throttlekit
//!
//! Fixed-window request rate limiting for `tower` and `http` services.
//!
//! ## Features
//!
//! - **Per-key fixed windows** keyed by client IP or any custom extractor
//! - **Tower middleware** answering over-limit requests with a structured 429
//! - **Pluggable stores**: in-memory by default, any shared backend via [`RateLimitStore`]
//! - **Fail-open** on store failure, logged and emitted as telemetry
//! - **Synchronous adapter** for inline checks that return an error instead
//!
//! ## Quick Start
//!
//! ```rust
//! use throttlekit::{create_rate_limiter, RateLimiterConfig};
//! use tower::{Service, ServiceBuilder, ServiceExt};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RateLimiterConfig::from_millis(1, 1_000).unwrap();
//!     let mut svc = ServiceBuilder::new()
//!         .layer(create_rate_limiter(config))
//!         .service_fn(|_req: http::Request<String>| async {
//!             Ok::<_, std::convert::Infallible>(http::Response::new(String::from("ok")))
//!         });
//!
//!     let req = || http::Request::builder()
//!         .header("x-forwarded-for", "203.0.113.7")
//!         .body(String::new())
//!         .unwrap();
//!
//!     let first = svc.ready().await.unwrap().call(req()).await.unwrap();
//!     assert_eq!(first.status(), 200);
//!
//!     let second = svc.ready().await.unwrap().call(req()).await.unwrap();
//!     assert_eq!(second.status(), 429);
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod prelude;
pub mod rate_limit;
pub mod telemetry;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RateLimiterConfig;
pub use error::{ConfigError, ErrorEnvelope, RateLimitExceeded, StoreError};
pub use rate_limit::{
    create_rate_limiter, rate_limiter, Decision, FixedWindowLimiter, Hit, InMemoryStore,
    LegacyRateLimiter, RateLimitEntry, RateLimitLayer, RateLimitService, RateLimitStore,
    RateLimiter,
};
