//! Client configuration.
//!
//! [`ClientConfig`] is a plain value struct: fill in the fields (or start
//! from [`ClientConfig::new`] and adjust), hand it to
//! [`Client::new`](super::Client::new), and validation happens once, eagerly.
//! There is no builder and no late surprise — a bad configuration never
//! produces a half-working client.

use std::time::Duration;

use url::Url;

use crate::cache::store::DEFAULT_CACHE_CAPACITY;
use crate::error::ApiError;
use crate::retry::RetryPolicy;
use crate::version::{MAX_KNOWN_PROTOCOL, MIN_SUPPORTED_PROTOCOL, ProtocolVersion};

/// Configuration for a [`Client`](super::Client).
///
/// # Examples
///
/// ```
/// use reqflow::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig {
///     timeout: Duration::from_secs(10),
///     ..ClientConfig::new("http://api.example.com", "sk-test")
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL all request paths are resolved against.
    pub base_url: String,
    /// Credential sent as `Authorization: Bearer <api_key>`.
    pub api_key: String,
    /// Per-attempt timeout. Retries each get the full budget again.
    pub timeout: Duration,
    /// Retry count and backoff shape for transient failures.
    pub retry: RetryPolicy,
    /// Whether GET responses are cached at all.
    pub cache_enabled: bool,
    /// Maximum number of cached entries before FIFO eviction.
    pub cache_capacity: usize,
    /// Oldest server protocol this client accepts. Overridable for tests.
    pub min_supported_protocol: String,
    /// Newest server protocol this client knows. Overridable for tests.
    pub max_known_protocol: String,
}

impl ClientConfig {
    /// Creates a configuration with the two required fields set and
    /// everything else at its default.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Checks the configuration, returning [`ApiError::Config`] with a
    /// descriptive reason on the first problem found.
    pub fn validate(&self) -> Result<(), ApiError> {
        let fail = |reason: String| Err(ApiError::Config { reason });

        if self.base_url.is_empty() {
            return fail("base_url must not be empty".to_owned());
        }
        match Url::parse(&self.base_url) {
            Ok(url) if url.host_str().is_none() => {
                return fail(format!("base_url {:?} has no host", self.base_url));
            }
            Ok(_) => {}
            Err(e) => {
                return fail(format!(
                    "base_url {:?} is not a valid URL: {e}",
                    self.base_url
                ));
            }
        }

        if self.api_key.is_empty() {
            return fail("api_key must not be empty".to_owned());
        }

        if self.timeout.is_zero() {
            return fail("timeout must be greater than zero".to_owned());
        }

        if self.retry.base_ms == 0 {
            return fail("retry base delay must be greater than zero".to_owned());
        }
        if self.retry.cap_ms < self.retry.base_ms {
            return fail(format!(
                "retry cap ({}ms) must be at least the base delay ({}ms)",
                self.retry.cap_ms, self.retry.base_ms
            ));
        }

        if self.cache_enabled && self.cache_capacity == 0 {
            return fail(
                "cache_capacity must be greater than zero when caching is enabled".to_owned(),
            );
        }

        if let Err(e) = self.min_supported_protocol.parse::<ProtocolVersion>() {
            return fail(format!("min_supported_protocol: {e}"));
        }
        if let Err(e) = self.max_known_protocol.parse::<ProtocolVersion>() {
            return fail(format!("max_known_protocol: {e}"));
        }

        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            cache_enabled: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            min_supported_protocol: MIN_SUPPORTED_PROTOCOL.to_owned(),
            max_known_protocol: MAX_KNOWN_PROTOCOL.to_owned(),
        }
    }
}
