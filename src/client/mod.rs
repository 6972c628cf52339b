//! Request execution pipeline.
//!
//! [`Client`] turns a logical API call into a reliable network operation:
//! cache lookup for GETs, a bounded retry loop for transient failures
//! (HTTP 429, HTTP 5xx, transport errors), typed error classification for
//! everything else, and a one-time protocol compatibility check on the first
//! successful response. One call in, one typed value or one [`ApiError`] out.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::cache::{
    CacheDirectives, CacheEntry, CacheStore, MemoryCache, generate_cache_key, identity_hash,
};
use crate::error::ApiError;
use crate::http::{Headers, Method, Response};
use crate::retry::{RetryState, backoff_delay, parse_retry_after};
use crate::time::{Clock, SystemClock};
use crate::transport::{RequestParts, TcpTransport, Transport};
use crate::version::{ProtocolVersion, VersionGate};

pub mod config;

pub use config::ClientConfig;

/// Crate version, advertised in `User-Agent` and `X-Client-Version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Response header carrying the server's protocol version.
const PROTOCOL_VERSION_HEADER: &str = "x-api-version";

/// Wait before retrying a 429 that carried no usable `Retry-After` header.
/// Distinct from the classifier's 60s default, which describes a terminal
/// rate-limit error to the caller; this one just paces the next attempt.
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(1);

/// Per-call options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOptions {
    /// Skip the cache lookup for this call. A cacheable response is still
    /// stored, so the fresh value benefits later callers.
    pub skip_cache: bool,
}

/// An API client with caching, retries, and typed errors.
///
/// Cheap to share: all methods take `&self`, and concurrent calls on one
/// client are fine. Each call runs as a single sequential task; concurrency
/// across calls is the caller's choice.
///
/// # Examples
///
/// ```rust,no_run
/// use reqflow::{Client, ClientConfig};
///
/// #[tokio::main]
/// async fn main() -> reqflow::Result<()> {
///     let client = Client::new(ClientConfig::new("http://127.0.0.1:8080", "sk-test"))?;
///     let item: serde_json::Value = client.get("/v1/items/1").await?;
///     println!("{item}");
///     Ok(())
/// }
/// ```
pub struct Client {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    config: ClientConfig,
    base_url: Url,
    /// FNV-1a hash of the API key, namespacing cache entries per credential.
    identity: u64,
    version_gate: VersionGate,
    min_supported: ProtocolVersion,
    max_known: ProtocolVersion,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client with the default transport ([`TcpTransport`]), an
    /// in-memory cache, and the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Config`] if the configuration fails validation.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cache = Arc::new(MemoryCache::with_clock(
            config.cache_capacity,
            Arc::clone(&clock),
        ));
        Self::with_parts(config, Arc::new(TcpTransport::new()), cache, clock)
    }

    /// Creates a client from explicit parts. This is how tests inject a
    /// scripted transport and a manual clock, and how applications swap in
    /// their own transport (e.g. one that speaks TLS) or cache backend.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ApiError> {
        config.validate()?;

        let base_url = Url::parse(&config.base_url).map_err(|e| ApiError::Config {
            reason: format!("base_url {:?} is not a valid URL: {e}", config.base_url),
        })?;
        let min_supported = config
            .min_supported_protocol
            .parse()
            .map_err(|e| ApiError::Config {
                reason: format!("min_supported_protocol: {e}"),
            })?;
        let max_known = config
            .max_known_protocol
            .parse()
            .map_err(|e| ApiError::Config {
                reason: format!("max_known_protocol: {e}"),
            })?;
        let identity = identity_hash(&config.api_key);

        Ok(Self {
            transport,
            cache,
            clock,
            config,
            base_url,
            identity,
            version_gate: VersionGate::new(),
            min_supported,
            max_known,
        })
    }

    /// Issues a GET and deserializes the response body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::Get, path, None, RequestOptions::default())
            .await
    }

    /// Issues a POST with a JSON body and deserializes the response body.
    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        self.execute(Method::Post, path, Some(body), RequestOptions::default())
            .await
    }

    /// Issues a PUT with a JSON body and deserializes the response body.
    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        self.execute(Method::Put, path, Some(body), RequestOptions::default())
            .await
    }

    /// Issues a PATCH with a JSON body and deserializes the response body.
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ApiError> {
        self.execute(Method::Patch, path, Some(body), RequestOptions::default())
            .await
    }

    /// Issues a DELETE and deserializes the response body.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute(Method::Delete, path, None, RequestOptions::default())
            .await
    }

    /// Removes the cached entry for a request, if any.
    ///
    /// Useful after an out-of-band mutation that makes a cached GET stale.
    pub fn invalidate(&self, method: Method, path: &str) -> Result<(), ApiError> {
        let url = self.resolve_url(path)?;
        let key = generate_cache_key(method, &url, Some(self.identity));
        self.cache.delete(&key);
        debug!(%key, "invalidated cache entry");
        Ok(())
    }

    /// Executes one API call through the full pipeline.
    ///
    /// The flow: cache lookup (cacheable GETs only) → transport attempt under
    /// the per-attempt timeout → retry transient failures with the configured
    /// policy → classify terminal failures → on the first success of this
    /// client's lifetime, check the server's protocol version → store
    /// cacheable responses → deserialize into `T`.
    ///
    /// Retry rules: 429 waits the server's `Retry-After` (default 1s) and
    /// retries; 5xx and transport errors back off exponentially with jitter;
    /// a per-attempt timeout and every other non-2xx status are terminal on
    /// first occurrence.
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        opts: RequestOptions,
    ) -> Result<T, ApiError> {
        let url = self.resolve_url(path)?;
        let cache_key = (self.config.cache_enabled && method == Method::Get)
            .then(|| generate_cache_key(method, &url, Some(self.identity)));

        if !opts.skip_cache {
            if let Some(key) = &cache_key {
                if let Some(entry) = self.cache.get(key) {
                    debug!(%key, "cache hit");
                    return serde_json::from_value(entry.value).map_err(ApiError::from);
                }
                debug!(%key, "cache miss");
            }
        }

        let encoded_body = body.map(serde_json::to_vec).transpose()?;
        let retry = &self.config.retry;
        let mut state = RetryState::new();

        let response = loop {
            let parts = self.request_parts(method, &url, encoded_body.clone());
            let outcome = tokio::time::timeout(self.config.timeout, self.transport.send(parts));

            let attempt_result = match outcome.await {
                Ok(result) => result,
                Err(_) => {
                    let after_ms = self.config.timeout.as_millis() as u64;
                    warn!(%url, attempt = state.attempt, after_ms, "attempt timed out");
                    return Err(ApiError::Timeout { after_ms });
                }
            };

            let response = match attempt_result {
                Ok(response) => response,
                Err(cause) => {
                    if state.can_retry(retry) {
                        let delay = backoff_delay(state.attempt, retry.base_ms, retry.cap_ms);
                        warn!(
                            %url,
                            attempt = state.attempt,
                            error = %cause,
                            delay_ms = delay.as_millis() as u64,
                            "transport failure, backing off"
                        );
                        tokio::time::sleep(delay).await;
                        state.bump();
                        continue;
                    }
                    return Err(ApiError::NetworkFailure { cause });
                }
            };

            let status = response.status();

            if status.as_u16() == 429 {
                if state.can_retry(retry) {
                    let wait = parse_retry_after(response.headers().get("retry-after"))
                        .map(Duration::from_secs)
                        .unwrap_or(DEFAULT_RATE_LIMIT_WAIT);
                    warn!(
                        %url,
                        attempt = state.attempt,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                    state.bump();
                    continue;
                }
            } else if status.is_server_error() {
                if state.can_retry(retry) {
                    let delay = backoff_delay(state.attempt, retry.base_ms, retry.cap_ms);
                    warn!(
                        %url,
                        attempt = state.attempt,
                        status = status.as_u16(),
                        delay_ms = delay.as_millis() as u64,
                        "server error, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    state.bump();
                    continue;
                }
            }

            if !status.is_success() {
                debug!(%url, status = status.as_u16(), "request failed");
                return Err(ApiError::from_response(
                    status.as_u16(),
                    response.headers(),
                    response.body(),
                ));
            }

            break response;
        };

        self.check_protocol_version(&response)?;

        let parsed: Value = if response.body().is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(response.body())?
        };

        if let Some(key) = &cache_key {
            let directives = CacheDirectives::parse(response.headers().get("cache-control"));
            if directives.is_storable() {
                let entry = CacheEntry::new(parsed.clone(), &directives, self.clock.now_ms());
                self.cache.set(key, entry);
                debug!(%key, "stored response in cache");
            }
        }

        serde_json::from_value(parsed).map_err(ApiError::from)
    }

    /// Resolves a request path against the configured base URL per RFC 3986
    /// relative resolution (`/absolute` paths replace, `relative` ones join).
    fn resolve_url(&self, path: &str) -> Result<String, ApiError> {
        self.base_url
            .join(path)
            .map(String::from)
            .map_err(|e| ApiError::Config {
                reason: format!("path {path:?} cannot be resolved against the base URL: {e}"),
            })
    }

    /// Builds the transport-ready parts for one attempt. `Host` and
    /// `Content-Length` are derived by the transport.
    fn request_parts(&self, method: Method, url: &str, body: Option<Vec<u8>>) -> RequestParts {
        let mut headers = Headers::with_capacity(5);
        headers.insert("Authorization", format!("Bearer {}", self.config.api_key));
        headers.insert("Accept", "application/json");
        headers.insert("User-Agent", format!("reqflow/{VERSION}"));
        headers.insert("X-Client-Version", VERSION);
        if body.is_some() {
            headers.insert("Content-Type", "application/json");
        }

        RequestParts {
            method,
            url: url.to_owned(),
            headers,
            body,
        }
    }

    /// Runs the one-shot protocol version check against a successful
    /// response. A response without a version header consumes the check and
    /// logs a warning; the server's compatibility is then simply unknown.
    fn check_protocol_version(&self, response: &Response) -> Result<(), ApiError> {
        match response.headers().get(PROTOCOL_VERSION_HEADER) {
            Some(raw) => self
                .version_gate
                .check(raw, &self.min_supported, &self.max_known),
            None => {
                if self.version_gate.mark_unversioned() {
                    warn!(
                        header = PROTOCOL_VERSION_HEADER,
                        "server did not advertise a protocol version; compatibility not checked"
                    );
                }
                Ok(())
            }
        }
    }
}
