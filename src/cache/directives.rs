//! `Cache-Control` response header parsing.

/// The subset of `Cache-Control` directives the caching layer honors.
///
/// Parsed leniently: directive names are case-insensitive, unknown directives
/// and malformed values are ignored rather than rejected, and a missing
/// header yields the all-default value. Parsing never fails.
///
/// # Examples
///
/// ```
/// use reqflow::cache::CacheDirectives;
///
/// let d = CacheDirectives::parse(Some("private, max-age=3600, stale-while-revalidate=60"));
/// assert!(d.private);
/// assert_eq!(d.max_age_secs, Some(3600));
/// assert_eq!(d.stale_while_revalidate_secs, Some(60));
/// assert!(!d.no_store);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheDirectives {
    /// `max-age=<secs>`: how long the response stays fresh.
    pub max_age_secs: Option<u64>,
    /// `no-store`: the response must never be written to the cache.
    pub no_store: bool,
    /// `no-cache`: a stored response must be revalidated before use.
    pub no_cache: bool,
    /// `private`: the response is specific to one caller.
    pub private: bool,
    /// `stale-while-revalidate=<secs>`: window past expiry during which the
    /// stale response may still be served.
    pub stale_while_revalidate_secs: Option<u64>,
}

impl CacheDirectives {
    /// Parses a `Cache-Control` header value.
    ///
    /// `None` (header absent) and empty strings both yield the default value.
    pub fn parse(header: Option<&str>) -> Self {
        let mut directives = Self::default();
        let Some(header) = header else {
            return directives;
        };

        for token in header.split(',') {
            let token = token.trim().to_ascii_lowercase();
            match token.as_str() {
                "no-store" => directives.no_store = true,
                "no-cache" => directives.no_cache = true,
                "private" => directives.private = true,
                _ => {
                    if let Some((name, value)) = token.split_once('=') {
                        let value = value.trim().parse::<u64>().ok();
                        match name.trim() {
                            "max-age" => directives.max_age_secs = value,
                            "stale-while-revalidate" => {
                                directives.stale_while_revalidate_secs = value;
                            }
                            _ => {} // unknown directive
                        }
                    }
                    // bare unknown tokens fall through untouched
                }
            }
        }

        directives
    }

    /// Returns `true` if a response carrying these directives may be stored.
    ///
    /// Storage requires an explicit freshness lifetime (`max-age`) and the
    /// absence of `no-store`. `private` does not block storage here: the
    /// store key is already namespaced per caller credential.
    pub fn is_storable(&self) -> bool {
        !self.no_store && self.max_age_secs.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_header_yields_defaults() {
        let d = CacheDirectives::parse(None);
        assert_eq!(d, CacheDirectives::default());
        assert!(!d.is_storable());
    }

    #[test]
    fn empty_header_yields_defaults() {
        assert_eq!(CacheDirectives::parse(Some("")), CacheDirectives::default());
    }

    #[test]
    fn full_header() {
        let d = CacheDirectives::parse(Some("private, max-age=3600, stale-while-revalidate=60"));
        assert!(d.private);
        assert!(!d.no_store);
        assert!(!d.no_cache);
        assert_eq!(d.max_age_secs, Some(3600));
        assert_eq!(d.stale_while_revalidate_secs, Some(60));
        assert!(d.is_storable());
    }

    #[test]
    fn case_insensitive_names() {
        let d = CacheDirectives::parse(Some("No-Store, MAX-AGE=10"));
        assert!(d.no_store);
        assert_eq!(d.max_age_secs, Some(10));
    }

    #[test]
    fn malformed_value_is_ignored() {
        let d = CacheDirectives::parse(Some("max-age=abc, stale-while-revalidate="));
        assert_eq!(d.max_age_secs, None);
        assert_eq!(d.stale_while_revalidate_secs, None);
    }

    #[test]
    fn unknown_directives_are_ignored() {
        let d = CacheDirectives::parse(Some("immutable, s-maxage=30, max-age=5"));
        assert_eq!(d.max_age_secs, Some(5));
        assert_eq!(d.stale_while_revalidate_secs, None);
    }

    #[test]
    fn whitespace_tolerant() {
        let d = CacheDirectives::parse(Some("  max-age = 120 ,  no-cache  "));
        assert_eq!(d.max_age_secs, Some(120));
        assert!(d.no_cache);
    }

    #[test]
    fn no_store_blocks_storage_even_with_max_age() {
        let d = CacheDirectives::parse(Some("no-store, max-age=600"));
        assert!(!d.is_storable());
    }
}
