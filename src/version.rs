//! Protocol version compatibility checking.
//!
//! The first successful response of a client's lifetime carries the server's
//! protocol version header. [`VersionGate`] evaluates it exactly once: a
//! server older than the minimum supported protocol fails the triggering
//! request, a server newer than the newest protocol this build knows logs a
//! warning, and every later response skips the check entirely.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ApiError;

/// Oldest server protocol this client can talk to.
pub const MIN_SUPPORTED_PROTOCOL: &str = "1.0.0";

/// Newest server protocol this client was built against.
pub const MAX_KNOWN_PROTOCOL: &str = "2.1.0";

/// A `MAJOR.MINOR.PATCH[-PRERELEASE]` protocol version.
///
/// Parsing is lenient: a leading `v` is accepted, and anything unparsable
/// collapses to `0.0.0` rather than erroring (an unversioned or garbled
/// server header should degrade to "too old", not crash the pipeline).
/// Ordering and equality use the numeric triple only; the prerelease tag is
/// kept for display.
///
/// # Examples
///
/// ```
/// use reqflow::version::ProtocolVersion;
///
/// let v: ProtocolVersion = "v2.1.0-beta.1".parse().unwrap();
/// assert_eq!((v.major, v.minor, v.patch), (2, 1, 0));
/// assert_eq!(v.prerelease.as_deref(), Some("beta.1"));
///
/// let junk = ProtocolVersion::parse_lenient("not-a-version");
/// assert_eq!(junk, ProtocolVersion::new(0, 0, 0));
/// ```
#[derive(Debug, Clone)]
pub struct ProtocolVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
}

impl ProtocolVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
        }
    }

    fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// Lenient parse that never fails: unparsable input becomes `0.0.0`.
    pub fn parse_lenient(input: &str) -> Self {
        input.parse().unwrap_or_else(|_| Self::new(0, 0, 0))
    }
}

impl PartialEq for ProtocolVersion {
    fn eq(&self, other: &Self) -> bool {
        self.triple() == other.triple()
    }
}

impl Eq for ProtocolVersion {}

impl PartialOrd for ProtocolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProtocolVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.triple().cmp(&other.triple())
    }
}

/// Parse failure for a strict [`ProtocolVersion`] parse. Callers that want
/// the lenient behavior use [`ProtocolVersion::parse_lenient`].
#[derive(Debug, thiserror::Error)]
#[error("invalid protocol version: {input:?}")]
pub struct InvalidVersion {
    input: String,
}

impl FromStr for ProtocolVersion {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidVersion {
            input: s.to_owned(),
        };

        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);

        let (core, prerelease) = match trimmed.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_owned())),
            Some((core, _)) => (core, None),
            None => (trimmed, None),
        };

        let mut parts = core.split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let minor = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let patch = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            major,
            minor,
            patch,
            prerelease,
        })
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

/// One-shot compatibility check, evaluated on the first response that
/// reaches it and skipped forever after.
///
/// The gate is a single atomic flag: when several first responses race, the
/// compare-exchange picks exactly one winner to run the check and the losers
/// pass through untouched.
#[derive(Debug, Default)]
pub struct VersionGate {
    checked: AtomicBool,
}

impl VersionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the check has already run.
    pub fn is_checked(&self) -> bool {
        self.checked.load(Ordering::Acquire)
    }

    /// Consumes the gate without evaluating anything, for responses that
    /// carry no version header at all. Returns `true` only for the call that
    /// actually flipped the flag, so the caller can warn exactly once.
    pub fn mark_unversioned(&self) -> bool {
        self.checked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Evaluates the server's advertised version against the supported range.
    ///
    /// Only the first caller ever evaluates; later calls return `Ok(())`
    /// without looking at their arguments. A server below `min_supported`
    /// fails with [`ApiError::ProtocolTooOld`]; a server whose major version
    /// is above `max_known`'s logs a warning and passes.
    pub fn check(
        &self,
        server: &str,
        min_supported: &ProtocolVersion,
        max_known: &ProtocolVersion,
    ) -> Result<(), ApiError> {
        if self
            .checked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        let server_version = ProtocolVersion::parse_lenient(server);
        tracing::debug!(server = %server_version, "checking server protocol version");

        if server_version < *min_supported {
            return Err(ApiError::ProtocolTooOld {
                server_version: server_version.to_string(),
                min_supported: min_supported.to_string(),
                max_known: max_known.to_string(),
            });
        }

        if server_version.major > max_known.major {
            tracing::warn!(
                server = %server_version,
                max_known = %max_known,
                "server protocol is newer than this client knows; some features may be unavailable"
            );
        }

        Ok(())
    }
}
