//! Bounded in-memory response cache.
//!
//! [`MemoryCache`] keeps parsed JSON response bodies behind a single mutex,
//! bounded by a fixed capacity with FIFO eviction (oldest-inserted entry goes
//! first, regardless of access pattern). Expiry is lazy: an entry past both
//! its `max-age` and any `stale-while-revalidate` window is dropped on the
//! `get` that finds it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use super::CacheDirectives;
use crate::time::{Clock, SystemClock};

/// A cached response body with its expiry metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The parsed JSON response body.
    pub value: Value,
    /// Absolute expiry instant in milliseconds since the Unix epoch.
    pub expires_at_ms: i64,
    /// The directives the response carried, kept for the stale window check.
    pub directives: CacheDirectives,
}

impl CacheEntry {
    /// Creates an entry expiring `max-age` seconds after `now_ms`.
    pub fn new(value: Value, directives: &CacheDirectives, now_ms: i64) -> Self {
        let ttl_ms = directives.max_age_secs.unwrap_or(0).saturating_mul(1000);
        Self {
            value,
            expires_at_ms: now_ms.saturating_add(ttl_ms.min(i64::MAX as u64) as i64),
            directives: directives.clone(),
        }
    }

    /// Returns `true` while the entry is within its `max-age` lifetime.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms
    }

    /// Returns `true` if the entry is past expiry but still inside its
    /// `stale-while-revalidate` window.
    pub fn is_within_stale_window(&self, now_ms: i64) -> bool {
        match self.directives.stale_while_revalidate_secs {
            Some(window_secs) => {
                let window_ms = window_secs.saturating_mul(1000).min(i64::MAX as u64) as i64;
                now_ms < self.expires_at_ms.saturating_add(window_ms)
            }
            None => false,
        }
    }
}

/// Storage backend for the response cache.
///
/// Implementations must be safe to share across concurrent requests;
/// [`MemoryCache`] is the bundled implementation, and callers can supply
/// their own (e.g. a metrics-wrapping decorator) through
/// [`Client::with_parts`](crate::client::Client::with_parts).
pub trait CacheStore: Send + Sync {
    /// Looks up an entry, applying expiry and the stale serving window.
    fn get(&self, key: &str) -> Option<CacheEntry>;

    /// Stores an entry. A `no-store` entry is silently dropped.
    fn set(&self, key: &str, entry: CacheEntry);

    /// Removes an entry. Absent keys are a no-op.
    fn delete(&self, key: &str);
}

/// Default number of entries [`MemoryCache`] holds before evicting.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Insertion order, front = oldest. Re-inserting a key moves it to the back.
    order: VecDeque<String>,
}

/// Bounded in-memory [`CacheStore`] with FIFO eviction.
///
/// One mutex covers lookup, insert, and eviction, so capacity accounting
/// stays exact under concurrent use.
///
/// # Examples
///
/// ```
/// use reqflow::cache::{CacheDirectives, CacheEntry, CacheStore, MemoryCache};
/// use reqflow::time::{Clock, SystemClock};
/// use serde_json::json;
///
/// let cache = MemoryCache::new();
/// let directives = CacheDirectives::parse(Some("max-age=60"));
/// let entry = CacheEntry::new(json!({"id": 1}), &directives, SystemClock.now_ms());
///
/// cache.set("GET:http://api.local/v1/items/1", entry);
/// assert!(cache.get("GET:http://api.local/v1/items/1").is_some());
/// ```
pub struct MemoryCache {
    state: Mutex<CacheState>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    /// Creates a cache with the default capacity and the system clock.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a cache bounded to `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    /// Creates a cache with an injected clock. Tests use this with
    /// [`ManualClock`](crate::time::ManualClock) to drive expiry.
    pub fn with_clock(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            clock,
        }
    }

    /// Returns the number of stored entries, including stale-but-servable ones.
    pub fn len(&self) -> usize {
        let state = self.state.lock().expect("response cache mutex poisoned");
        state.entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("response cache mutex poisoned");
        state.entries.clear();
        state.order.clear();
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        let mut state = self.state.lock().expect("response cache mutex poisoned");
        let entry = state.entries.get(key)?;
        let now_ms = self.clock.now_ms();

        if entry.is_fresh(now_ms) || entry.is_within_stale_window(now_ms) {
            return Some(entry.clone());
        }

        // Fully expired: drop it now rather than waiting for eviction.
        state.entries.remove(key);
        state.order.retain(|k| k != key);
        tracing::debug!(%key, "dropped expired cache entry");
        None
    }

    fn set(&self, key: &str, entry: CacheEntry) {
        if entry.directives.no_store || self.capacity == 0 {
            return;
        }

        let mut state = self.state.lock().expect("response cache mutex poisoned");

        if state.entries.contains_key(key) {
            // Refresh in place, move to the back of the insertion queue.
            state.order.retain(|k| k != key);
        } else if state.entries.len() >= self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
                tracing::debug!(key = %oldest, "cache full, evicted oldest entry");
            }
        }

        state.entries.insert(key.to_owned(), entry);
        state.order.push_back(key.to_owned());
    }

    fn delete(&self, key: &str) {
        let mut state = self.state.lock().expect("response cache mutex poisoned");
        if state.entries.remove(key).is_some() {
            state.order.retain(|k| k != key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use serde_json::json;

    fn entry(value: Value, header: &str, now_ms: i64) -> CacheEntry {
        CacheEntry::new(value, &CacheDirectives::parse(Some(header)), now_ms)
    }

    fn cache_at(capacity: usize, clock: &Arc<ManualClock>) -> MemoryCache {
        MemoryCache::with_clock(capacity, Arc::clone(clock) as Arc<dyn Clock>)
    }

    #[test]
    fn miss_on_absent_key() {
        let cache = MemoryCache::new();
        assert!(cache.get("GET:http://h/missing").is_none());
    }

    #[test]
    fn round_trip_within_max_age() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_at(10, &clock);

        cache.set("k", entry(json!({"id": 1}), "max-age=60", 0));
        clock.advance(59_000);

        let hit = cache.get("k").expect("entry should still be fresh");
        assert_eq!(hit.value, json!({"id": 1}));
    }

    #[test]
    fn expired_entry_dropped_on_get() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_at(10, &clock);

        cache.set("k", entry(json!(1), "max-age=1", 0));
        clock.advance(1_000);

        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn stale_while_revalidate_window_serves_unchanged() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_at(10, &clock);

        cache.set("k", entry(json!(42), "max-age=0, stale-while-revalidate=60", 0));

        clock.advance(59_999);
        let hit = cache.get("k").expect("inside the stale window");
        assert_eq!(hit.value, json!(42));

        clock.advance(1);
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn fifo_eviction_drops_oldest_inserted() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_at(3, &clock);

        for key in ["k1", "k2", "k3", "k4"] {
            cache.set(key, entry(json!(key), "max-age=600", 0));
        }

        assert_eq!(cache.len(), 3);
        assert!(cache.get("k1").is_none());
        assert!(cache.get("k2").is_some());
        assert!(cache.get("k3").is_some());
        assert!(cache.get("k4").is_some());
    }

    #[test]
    fn reinsert_moves_key_to_back_of_queue() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_at(2, &clock);

        cache.set("k1", entry(json!(1), "max-age=600", 0));
        cache.set("k2", entry(json!(2), "max-age=600", 0));
        cache.set("k1", entry(json!(10), "max-age=600", 0)); // refresh, k2 is now oldest
        cache.set("k3", entry(json!(3), "max-age=600", 0));

        assert!(cache.get("k2").is_none());
        assert_eq!(cache.get("k1").unwrap().value, json!(10));
        assert!(cache.get("k3").is_some());
    }

    #[test]
    fn no_store_entry_is_never_written() {
        let cache = MemoryCache::new();
        cache.set("k", entry(json!(1), "no-store, max-age=600", 0));
        assert!(cache.is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let cache = MemoryCache::new();
        cache.set("k", entry(json!(1), "max-age=600", 0));
        cache.delete("k");
        cache.delete("k"); // absent key, still fine
        assert!(cache.is_empty());
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = MemoryCache::new();
        cache.set("a", entry(json!(1), "max-age=600", 0));
        cache.set("b", entry(json!(2), "max-age=600", 0));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }
}
