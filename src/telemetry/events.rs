use std::fmt;
use std::time::Duration;

/// Events emitted by rate limiters.
///
/// Keys are carried verbatim; sinks that export them should treat client IPs as
/// personal data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitEvent {
    /// A request was admitted.
    Allowed {
        /// Bucket key
        key: String,
        /// Requests counted in the current window, including this one
        count: u64,
        /// Configured limit
        limit: u64,
    },
    /// A request was rejected for exceeding the limit.
    Denied {
        /// Bucket key
        key: String,
        /// Requests counted in the current window, including this one
        count: u64,
        /// Configured limit
        limit: u64,
        /// Time until the window resets
        retry_after: Duration,
    },
    /// A key's window elapsed and a new one started with this request.
    WindowReset {
        /// Bucket key
        key: String,
    },
    /// The backing store failed; the request is admitted without counting.
    StoreFailure {
        /// Bucket key
        key: String,
        /// Rendered store error
        error: String,
    },
}

impl RateLimitEvent {
    /// The key this event concerns.
    pub fn key(&self) -> &str {
        match self {
            RateLimitEvent::Allowed { key, .. }
            | RateLimitEvent::Denied { key, .. }
            | RateLimitEvent::WindowReset { key }
            | RateLimitEvent::StoreFailure { key, .. } => key,
        }
    }
}

impl fmt::Display for RateLimitEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitEvent::Allowed { key, count, limit } => {
                write!(f, "Allowed(key={}, {}/{})", key, count, limit)
            }
            RateLimitEvent::Denied { key, count, limit, retry_after } => {
                write!(f, "Denied(key={}, {}/{}, retry_after={:?})", key, count, limit, retry_after)
            }
            RateLimitEvent::WindowReset { key } => write!(f, "WindowReset(key={})", key),
            RateLimitEvent::StoreFailure { key, error } => {
                write!(f, "StoreFailure(key={}, error={})", key, error)
            }
        }
    }
}
