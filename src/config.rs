//! Limiter configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Validated configuration for a fixed-window limiter.
///
/// Immutable once built. Deserializes from `{ "windowMs": .., "maxRequests": .. }` and
/// rejects zero values at parse time.
///
/// # Examples
/// ```
/// use throttlekit::RateLimiterConfig;
/// use std::time::Duration;
///
/// let cfg = RateLimiterConfig::new(100, Duration::from_secs(60)).unwrap();
/// assert_eq!(cfg.max_requests(), 100);
///
/// let parsed: RateLimiterConfig =
///     serde_json::from_str(r#"{ "windowMs": 900000, "maxRequests": 5 }"#).unwrap();
/// assert_eq!(parsed.window(), Duration::from_secs(900));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    window: Duration,
    max_requests: u64,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    window_ms: u64,
    max_requests: u64,
}

impl RateLimiterConfig {
    /// Create a config with validation.
    pub fn new(max_requests: u64, window: Duration) -> Result<Self, ConfigError> {
        if max_requests == 0 {
            return Err(ConfigError::ZeroMaxRequests);
        }
        if window_millis(window) == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(Self { window, max_requests })
    }

    /// Same as [`RateLimiterConfig::new`] with the window given in milliseconds.
    pub fn from_millis(max_requests: u64, window_ms: u64) -> Result<Self, ConfigError> {
        Self::new(max_requests, Duration::from_millis(window_ms))
    }

    /// Maximum admitted requests per key per window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Length of one counting window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Window length in whole milliseconds, the unit stored alongside entries.
    pub fn window_millis(&self) -> u64 {
        window_millis(self.window)
    }
}

fn window_millis(window: Duration) -> u64 {
    u64::try_from(window.as_millis()).unwrap_or(u64::MAX)
}

impl Serialize for RateLimiterConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RawConfig { window_ms: self.window_millis(), max_requests: self.max_requests }
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RateLimiterConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawConfig::deserialize(deserializer)?;
        Self::from_millis(raw.max_requests, raw.window_ms).map_err(serde::de::Error::custom)
    }
}
