//! Telemetry and observability for rate limiters.
//!
//! Limiters emit a [`RateLimitEvent`] for every admission decision. Events flow
//! through `TelemetrySink` implementations which can log, collect, or forward them.
//!
//! # Event Types
//!
//! - `Allowed`, `Denied`: one per `acquire` call that reached the store.
//! - `WindowReset`: a key's fixed window elapsed and restarted.
//! - `StoreFailure`: the counter store errored; the caller fails open.
//!
//! # Telemetry Sinks
//!
//! The `TelemetrySink` trait is a `tower::Service<RateLimitEvent>` for composability.

pub mod events;
pub mod sinks;

pub use events::RateLimitEvent;
pub use sinks::{emit_best_effort, LogSink, MemorySink, NullSink, TelemetrySink};
