//! Retry policy and exponential backoff.
//!
//! Only transient failures are retried: HTTP 429, HTTP 5xx, and
//! transport-level errors. 429 waits use the server's `Retry-After` value
//! verbatim; 5xx and transport failures back off exponentially with jitter.
//! Timeouts and all other client errors never retry.

use std::time::Duration;

use rand::Rng;

/// How many retries to attempt and how to space them.
///
/// `max_retries` counts retries, not attempts: the default of 3 allows up to
/// 4 transport calls per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// First backoff delay in milliseconds.
    pub base_ms: u64,
    /// Upper bound on the un-jittered backoff delay in milliseconds.
    pub cap_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_ms: 1_000,
            cap_ms: 30_000,
        }
    }
}

/// Per-call retry bookkeeping. `attempt` is 1-based: the first transport
/// call is attempt 1.
#[derive(Debug, Clone, Copy)]
pub struct RetryState {
    pub attempt: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self { attempt: 1 }
    }

    /// Returns `true` if another retry is allowed under `policy`.
    pub fn can_retry(&self, policy: &RetryPolicy) -> bool {
        self.attempt <= policy.max_retries
    }

    pub fn bump(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

/// Computes the backoff delay before retrying `attempt` (1-based).
///
/// The un-jittered delay doubles per attempt starting from `base_ms` and is
/// capped at `cap_ms`; a uniform jitter of up to a quarter of the capped
/// value is added so simultaneous clients fan out instead of retrying in
/// lockstep. Arithmetic saturates, so large attempt numbers stay at the cap.
pub fn backoff_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63);
    let uncapped = base_ms.saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX));
    let capped = uncapped.min(cap_ms);

    let jitter = if capped < 4 {
        0
    } else {
        rand::thread_rng().gen_range(0..capped / 4)
    };

    Duration::from_millis(capped.saturating_add(jitter))
}

/// Parses a `Retry-After` header value as integer seconds.
///
/// HTTP-date forms are not supported; anything non-numeric yields `None` and
/// the caller falls back to its default wait.
pub fn parse_retry_after(header: Option<&str>) -> Option<u64> {
    header?.trim().parse().ok()
}
