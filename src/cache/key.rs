//! Cache key generation.
//!
//! Keys are `"METHOD:url"` with an optional third segment carrying a hash of
//! the caller credential, so two clients configured with different API keys
//! never read each other's cached responses. The hash is FNV-1a: fast and
//! deterministic, not cryptographic. A collision only merges two cache
//! namespaces and costs hit-rate accuracy; the server still authorizes every
//! request that actually reaches the network.

use crate::http::Method;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashes a credential string with 64-bit FNV-1a.
pub fn identity_hash(credential: &str) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in credential.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Builds the cache key for a request.
///
/// Format: `"METHOD:url"` or `"METHOD:url:<hash>"` with the hash in
/// zero-padded lowercase hex. Identical inputs always produce identical keys.
///
/// # Examples
///
/// ```
/// use reqflow::cache::{generate_cache_key, identity_hash};
/// use reqflow::http::Method;
///
/// let key = generate_cache_key(Method::Get, "http://api.local/v1/items", None);
/// assert_eq!(key, "GET:http://api.local/v1/items");
///
/// let hash = identity_hash("sk-secret");
/// let namespaced = generate_cache_key(Method::Get, "http://api.local/v1/items", Some(hash));
/// assert!(namespaced.starts_with("GET:http://api.local/v1/items:"));
/// ```
pub fn generate_cache_key(method: Method, url: &str, identity: Option<u64>) -> String {
    match identity {
        Some(hash) => format!("{}:{}:{:016x}", method.as_str(), url, hash),
        None => format!("{}:{}", method.as_str(), url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(identity_hash("sk-abc"), identity_hash("sk-abc"));
    }

    #[test]
    fn hash_distinguishes_credentials() {
        assert_ne!(identity_hash("sk-abc"), identity_hash("sk-abd"));
    }

    #[test]
    fn fnv1a_known_vector() {
        // FNV-1a 64-bit of "a" per the reference algorithm.
        assert_eq!(identity_hash("a"), 0xaf63dc4c8601ec8c);
        assert_eq!(identity_hash(""), 0xcbf29ce484222325);
    }

    #[test]
    fn key_without_identity() {
        let key = generate_cache_key(Method::Get, "http://h/p", None);
        assert_eq!(key, "GET:http://h/p");
    }

    #[test]
    fn key_with_identity_is_padded_hex() {
        let key = generate_cache_key(Method::Get, "http://h/p", Some(0xff));
        assert_eq!(key, "GET:http://h/p:00000000000000ff");
    }

    #[test]
    fn distinct_credentials_produce_distinct_keys() {
        let a = generate_cache_key(Method::Get, "http://h/p", Some(identity_hash("key-a")));
        let b = generate_cache_key(Method::Get, "http://h/p", Some(identity_hash("key-b")));
        assert_ne!(a, b);
    }
}
