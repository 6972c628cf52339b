//! Error taxonomy for the request pipeline.
//!
//! Every failed call surfaces exactly one [`ApiError`]. HTTP failures are
//! classified from the status code plus the server's JSON error envelope;
//! transport and timeout failures carry their own variants. The enum is
//! closed so callers can match exhaustively and act on structured payloads
//! (`retry_after_secs`, `field_errors`) instead of string-sniffing.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::http::{Headers, Status};
use crate::retry::parse_retry_after;
use crate::transport::TransportError;

/// Fallback for `RateLimited` when a 429 arrives without a usable
/// `Retry-After` header.
pub const DEFAULT_RATE_LIMIT_RETRY_SECS: u64 = 60;

/// Convenience alias used across the crate's public surface.
pub type Result<T> = std::result::Result<T, ApiError>;

/// All the ways a request can fail.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 429 with retries exhausted. `retry_after_secs` echoes the
    /// server's `Retry-After` header, defaulting to 60 when absent.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// HTTP 400. `field_errors` maps field names to their messages when the
    /// server provided them.
    #[error("validation failed: {message}")]
    ValidationFailed {
        message: String,
        field_errors: BTreeMap<String, Vec<String>>,
    },

    /// HTTP 401.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// HTTP 403.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// HTTP 404.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The server speaks a protocol older than this client supports. Always
    /// fatal; raised at most once per client by the version gate.
    #[error(
        "server protocol {server_version} is older than the minimum supported \
         {min_supported} (newest known: {max_known})"
    )]
    ProtocolTooOld {
        server_version: String,
        min_supported: String,
        max_known: String,
    },

    /// A single attempt exceeded the per-attempt timeout. Never retried.
    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Connection-level failure with retries exhausted.
    #[error("network failure: {cause}")]
    NetworkFailure {
        #[source]
        cause: TransportError,
    },

    /// Any HTTP failure without a more specific classification.
    #[error("HTTP {status}: {detail}")]
    Generic { status: u16, detail: String },

    /// Client configuration rejected before any request was made.
    #[error("invalid configuration: {reason}")]
    Config { reason: String },

    /// Request-body encoding or success-body decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The error envelope well-behaved servers send alongside failure statuses.
#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<BTreeMap<String, Vec<String>>>,
}

impl ApiError {
    /// Classifies a non-2xx response into a typed error.
    ///
    /// The body is read as a JSON `{ "message": …, "errors": … }` envelope;
    /// when it is not one, the status's canonical reason phrase stands in
    /// for the message. Pure function of status, headers, and body.
    pub fn from_response(status: u16, headers: &Headers, body: &[u8]) -> Self {
        let envelope: ErrorEnvelope = serde_json::from_slice(body).unwrap_or_default();
        let message = envelope
            .message
            .unwrap_or_else(|| Status(status).canonical_reason().to_owned());

        match status {
            400 => ApiError::ValidationFailed {
                message,
                field_errors: envelope.errors.unwrap_or_default(),
            },
            401 => ApiError::Unauthorized { message },
            403 => ApiError::Forbidden { message },
            404 => ApiError::NotFound { message },
            429 => ApiError::RateLimited {
                retry_after_secs: parse_retry_after(headers.get("retry-after"))
                    .unwrap_or(DEFAULT_RATE_LIMIT_RETRY_SECS),
            },
            _ => ApiError::Generic {
                status,
                detail: message,
            },
        }
    }

    /// Returns `true` for failures a caller could reasonably submit again:
    /// rate limits, server errors, network failures. The pipeline has
    /// already retried these internally; this classifies the surfaced error
    /// for callers with their own retry budgets.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } | ApiError::NetworkFailure { .. } => true,
            ApiError::Generic { status, .. } => Status(*status).is_server_error(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_headers() -> Headers {
        Headers::new()
    }

    #[test]
    fn validation_with_field_errors() {
        let body = br#"{"message":"name is required","errors":{"name":["must not be empty"]}}"#;
        let err = ApiError::from_response(400, &no_headers(), body);
        match err {
            ApiError::ValidationFailed {
                message,
                field_errors,
            } => {
                assert_eq!(message, "name is required");
                assert_eq!(
                    field_errors.get("name").map(Vec::as_slice),
                    Some(&["must not be empty".to_owned()][..])
                );
            }
            other => panic!("expected ValidationFailed, got {other:?}"),
        }
    }

    #[test]
    fn unauthorized_falls_back_to_reason_phrase() {
        let err = ApiError::from_response(401, &no_headers(), b"");
        match err {
            ApiError::Unauthorized { message } => assert_eq!(message, "Unauthorized"),
            other => panic!("expected Unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn not_found_uses_envelope_message() {
        let err = ApiError::from_response(404, &no_headers(), br#"{"message":"no such item"}"#);
        match err {
            ApiError::NotFound { message } => assert_eq!(message, "no such item"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn rate_limited_reads_retry_after_header() {
        let headers = Headers::from_pairs([("Retry-After", "120")]);
        let err = ApiError::from_response(429, &headers, b"");
        assert!(matches!(
            err,
            ApiError::RateLimited {
                retry_after_secs: 120
            }
        ));
    }

    #[test]
    fn rate_limited_defaults_to_sixty() {
        let missing = ApiError::from_response(429, &no_headers(), b"");
        assert!(matches!(
            missing,
            ApiError::RateLimited {
                retry_after_secs: 60
            }
        ));

        let invalid_headers = Headers::from_pairs([("Retry-After", "tomorrow")]);
        let invalid = ApiError::from_response(429, &invalid_headers, b"");
        assert!(matches!(
            invalid,
            ApiError::RateLimited {
                retry_after_secs: 60
            }
        ));
    }

    #[test]
    fn unmapped_status_becomes_generic() {
        let err = ApiError::from_response(503, &no_headers(), b"not json at all");
        match err {
            ApiError::Generic { status, detail } => {
                assert_eq!(status, 503);
                assert_eq!(detail, "Service Unavailable");
            }
            other => panic!("expected Generic, got {other:?}"),
        }
    }

    #[test]
    fn retryability_classification() {
        assert!(
            ApiError::RateLimited {
                retry_after_secs: 1
            }
            .is_retryable()
        );
        assert!(
            ApiError::Generic {
                status: 500,
                detail: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ApiError::Generic {
                status: 418,
                detail: String::new()
            }
            .is_retryable()
        );
        assert!(
            !ApiError::NotFound {
                message: String::new()
            }
            .is_retryable()
        );
        assert!(!ApiError::Timeout { after_ms: 5_000 }.is_retryable());
    }
}
