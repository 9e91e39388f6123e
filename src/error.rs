//! Error types and the JSON error envelope returned to HTTP clients.
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable machine-readable code carried by every rate-limit rejection.
pub const RATE_LIMIT_EXCEEDED_CODE: &str = "RATE_LIMIT_EXCEEDED";

/// Human-readable message carried by every rate-limit rejection.
pub const RATE_LIMIT_EXCEEDED_MESSAGE: &str = "Rate limit exceeded";

/// Errors produced when validating limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `max_requests` must be > 0.
    #[error("max_requests must be > 0 (got 0)")]
    ZeroMaxRequests,
    /// `window` must be > 0.
    #[error("window must be > 0 (got 0ms)")]
    ZeroWindow,
}

/// Failure inside the counter store backing a limiter.
///
/// Never reaches HTTP callers; the middleware and the legacy adapter both fail open on it.
#[derive(Debug, Error)]
#[error("rate limit store failure: {source}")]
pub struct StoreError {
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl StoreError {
    /// Wrap a store-specific error.
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self { source: source.into() }
    }

    /// Borrow the underlying store error.
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self.source.as_ref()
    }
}

/// Raised by the synchronous limiter once a key is over its quota.
///
/// Displays exactly `"Rate limit exceeded"`; callers translate it into a 429 with
/// [`RateLimitExceeded::into_response`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Rate limit exceeded")]
pub struct RateLimitExceeded {
    /// Requests admitted per window for the rejected key.
    pub limit: u64,
    /// Milliseconds until the key's window resets.
    pub retry_after_ms: u64,
}

impl RateLimitExceeded {
    /// The stable code for this error.
    pub fn code(&self) -> &'static str {
        RATE_LIMIT_EXCEEDED_CODE
    }

    /// Render as the JSON envelope.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.to_string(), RATE_LIMIT_EXCEEDED_CODE).with_details(
            serde_json::json!({ "limit": self.limit, "retryAfterMs": self.retry_after_ms }),
        )
    }

    /// Build the 429 response a client sees for this error.
    pub fn into_response<B: From<String>>(self) -> Response<B> {
        let retry_after_secs = self.retry_after_ms.div_ceil(1_000);
        let mut response = self.envelope().into_response(StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers_mut();
        headers.insert(http::header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(0u64));
        response
    }
}

/// The generic error body: `{ success: false, error, code, details?, stack? }`.
///
/// `stack` carries diagnostic context for development builds; rate limit rejections
/// never set it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self { success: false, error: error.into(), code: code.into(), details: None, stack: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Serialize into a JSON response with the given status.
    pub fn into_response<B: From<String>>(self, status: StatusCode) -> Response<B> {
        // Serializing a struct of strings and a `Value` cannot fail.
        let body = serde_json::to_string(&self).unwrap_or_default();
        let mut response = Response::new(B::from(body));
        *response.status_mut() = status;
        response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
