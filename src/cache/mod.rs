//! Response caching.
//!
//! Three pieces cooperate here:
//!
//! - [`CacheDirectives`] parses the `Cache-Control` response header into the
//!   handful of directives the pipeline honors.
//! - [`generate_cache_key`] and [`identity_hash`] build the store key from
//!   the request method, URL, and caller credential, so distinct credentials
//!   never share entries.
//! - [`CacheStore`] is the storage trait; [`MemoryCache`] is the bounded
//!   in-memory implementation with FIFO eviction and a
//!   stale-while-revalidate serving window.
//!
//! Only successful GET responses are ever stored, and only when their
//! directives permit it (`max-age` present, `no-store` absent).

pub mod directives;
pub mod key;
pub mod store;

pub use directives::CacheDirectives;
pub use key::{generate_cache_key, identity_hash};
pub use store::{CacheEntry, CacheStore, MemoryCache};
