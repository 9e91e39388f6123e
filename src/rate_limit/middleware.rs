use crate::config::RateLimiterConfig;
use crate::error::RateLimitExceeded;
use crate::rate_limit::keys::{ClientIp, KeyExtractor, RequestHead};
use crate::rate_limit::strategies::FixedWindowLimiter;
use crate::rate_limit::{Decision, RateLimiter};
use http::header::HeaderValue;
use http::{Request, Response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Build the default HTTP rate limiting layer for `config`.
///
/// Requests are keyed by client IP ([`ClientIp`]) and counted in a fresh in-memory store.
///
/// # Examples
/// ```
/// use throttlekit::{create_rate_limiter, RateLimiterConfig};
/// use tower::ServiceBuilder;
///
/// let config = RateLimiterConfig::from_millis(100, 15 * 60 * 1000).unwrap();
/// let svc = ServiceBuilder::new()
///     .layer(create_rate_limiter(config))
///     .service_fn(|_req: http::Request<String>| async {
///         Ok::<_, std::convert::Infallible>(http::Response::new(String::from("ok")))
///     });
/// # let _ = svc;
/// ```
pub fn create_rate_limiter(config: RateLimiterConfig) -> RateLimitLayer<FixedWindowLimiter> {
    RateLimitLayer::new(FixedWindowLimiter::new(config))
}

/// A layer that enforces rate limits using a [`RateLimiter`].
///
/// Clones (and every service it produces) share one limiter, so counts are global to
/// the layer rather than per connection.
#[derive(Debug)]
pub struct RateLimitLayer<L, K = ClientIp> {
    limiter: Arc<L>,
    keys: Arc<K>,
}

impl<L, K> Clone for RateLimitLayer<L, K> {
    fn clone(&self) -> Self {
        Self { limiter: self.limiter.clone(), keys: self.keys.clone() }
    }
}

impl<L> RateLimitLayer<L> {
    /// Create a new rate limit layer keyed by client IP.
    pub fn new(limiter: L) -> Self {
        Self::from_shared(Arc::new(limiter))
    }

    /// Create a layer around a limiter that is also used elsewhere.
    pub fn from_shared(limiter: Arc<L>) -> Self {
        Self { limiter, keys: Arc::new(ClientIp) }
    }
}

impl<L, K> RateLimitLayer<L, K> {
    /// Replace the key extractor.
    pub fn with_key_extractor<K2: KeyExtractor>(self, keys: K2) -> RateLimitLayer<L, K2> {
        RateLimitLayer { limiter: self.limiter, keys: Arc::new(keys) }
    }

    pub fn limiter(&self) -> &Arc<L> {
        &self.limiter
    }
}

impl<S, L, K> Layer<S> for RateLimitLayer<L, K>
where
    L: RateLimiter + 'static,
    K: KeyExtractor,
{
    type Service = RateLimitService<S, L, K>;

    fn layer(&self, service: S) -> Self::Service {
        RateLimitService {
            inner: service,
            limiter: self.limiter.clone(),
            keys: self.keys.clone(),
        }
    }
}

/// Middleware service that enforces rate limits.
///
/// Over-limit requests never reach the inner service; they get a 429 JSON envelope
/// with code `RATE_LIMIT_EXCEEDED`. Store failures admit the request.
#[derive(Debug)]
pub struct RateLimitService<S, L, K = ClientIp> {
    inner: S,
    limiter: Arc<L>,
    keys: Arc<K>,
}

impl<S: Clone, L, K> Clone for RateLimitService<S, L, K> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), limiter: self.limiter.clone(), keys: self.keys.clone() }
    }
}

impl<S, L, K, ReqBody, ResBody> Service<Request<ReqBody>> for RateLimitService<S, L, K>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    L: RateLimiter + 'static,
    K: KeyExtractor,
    ReqBody: Send + 'static,
    ResBody: From<String> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let limiter = self.limiter.clone();
        let key = self.keys.extract(&RequestHead::from_request(&req));
        // Call the instance that was driven to readiness; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match limiter.admit(&key).await {
                Decision::Allowed { remaining, limit, .. } => {
                    let mut response = inner.call(req).await?;
                    let headers = response.headers_mut();
                    headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
                    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
                    Ok(response)
                }
                Decision::FailedOpen => inner.call(req).await,
                Decision::Denied { retry_after, limit } => {
                    let retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX);
                    Ok(RateLimitExceeded { limit, retry_after_ms }.into_response())
                }
            }
        })
    }
}
