//! Mapping requests to rate limit keys.

use http::{Extensions, HeaderMap, Method, Request, Uri};
use std::net::SocketAddr;

/// Key shared by every request whose client address cannot be resolved.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Borrowed view of the request line, headers and extensions.
///
/// Lets extractors work the same whatever the body type is.
#[derive(Debug, Clone, Copy)]
pub struct RequestHead<'a> {
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
    pub extensions: &'a Extensions,
}

impl<'a> RequestHead<'a> {
    pub fn from_request<B>(req: &'a Request<B>) -> Self {
        Self {
            method: req.method(),
            uri: req.uri(),
            headers: req.headers(),
            extensions: req.extensions(),
        }
    }
}

/// Maps a request to the key its requests are counted under.
pub trait KeyExtractor: Send + Sync + 'static {
    fn extract(&self, head: &RequestHead<'_>) -> String;
}

/// Default extractor: the caller's IP address.
///
/// Checks, in order: the first `X-Forwarded-For` entry, `X-Real-IP`, then a
/// `SocketAddr` in the request extensions (as inserted by the server accept loop).
/// Falls back to [`UNKNOWN_CLIENT`], so unidentifiable clients share one bucket.
///
/// Forwarded headers are client-controlled; only trust them behind a proxy that
/// overwrites them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientIp;

impl ClientIp {
    fn header_ip(headers: &HeaderMap, name: &str) -> Option<String> {
        let raw = headers.get(name)?.to_str().ok()?;
        let first = raw.split(',').next()?.trim();
        (!first.is_empty()).then(|| first.to_string())
    }
}

impl KeyExtractor for ClientIp {
    fn extract(&self, head: &RequestHead<'_>) -> String {
        Self::header_ip(head.headers, "x-forwarded-for")
            .or_else(|| Self::header_ip(head.headers, "x-real-ip"))
            .or_else(|| head.extensions.get::<SocketAddr>().map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }
}

/// Every request maps to the same key: one bucket for all callers.
#[derive(Debug, Clone)]
pub struct ConstantKey(pub String);

impl ConstantKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl KeyExtractor for ConstantKey {
    fn extract(&self, _head: &RequestHead<'_>) -> String {
        self.0.clone()
    }
}

/// Extractor backed by a closure; build with [`key_fn`].
#[derive(Clone)]
pub struct KeyFn<F>(F);

impl<F> std::fmt::Debug for KeyFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyFn(..)")
    }
}

/// Use a closure as the key extractor.
///
/// # Examples
/// ```
/// use throttlekit::rate_limit::keys::{key_fn, KeyExtractor, RequestHead};
///
/// // Bucket by API key header instead of IP.
/// let by_api_key = key_fn(|head: &RequestHead<'_>| {
///     head.headers
///         .get("x-api-key")
///         .and_then(|v| v.to_str().ok())
///         .unwrap_or("anonymous")
///         .to_string()
/// });
///
/// let req = http::Request::builder().header("x-api-key", "k-123").body(()).unwrap();
/// assert_eq!(by_api_key.extract(&RequestHead::from_request(&req)), "k-123");
/// ```
pub fn key_fn<F>(f: F) -> KeyFn<F>
where
    F: Fn(&RequestHead<'_>) -> String + Send + Sync + 'static,
{
    KeyFn(f)
}

impl<F> KeyExtractor for KeyFn<F>
where
    F: Fn(&RequestHead<'_>) -> String + Send + Sync + 'static,
{
    fn extract(&self, head: &RequestHead<'_>) -> String {
        (self.0)(head)
    }
}
