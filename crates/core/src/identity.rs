//! Article identity and cache-key derivation.
//!
//! Every cache in this workspace is keyed by a value derived here. The
//! identity of an article is its canonical URL, falling back to the title
//! when no URL is present. Articles with neither have no identity and
//! cannot be cached; callers treat caching operations on them as no-ops.

use sha2::{Digest, Sha256};

/// Version tag mixed into the key hash. Bump when the derivation changes
/// so old on-disk entries become unreachable instead of ambiguous.
const KEY_VERSION: &str = "shelfmark.key.v1";

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize a URL string so equivalent spellings derive the same key.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Default scheme to https:// if missing
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn canonicalize(input: &str) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let url_str = if trimmed.contains("://") { trimmed.to_string() } else { format!("https://{trimmed}") };

    let mut parsed = url::Url::parse(&url_str).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(mut host) = parsed.host_str() {
        let h = host.to_lowercase();
        host = h.as_str();
        parsed
            .set_host(Some(host))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// The stable identity of an article: canonical URL, or title fallback.
///
/// Identities compare by their string form and survive process restarts;
/// they are never derived from in-memory addresses or hasher state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArticleIdentity(String);

impl ArticleIdentity {
    /// Build an identity from a raw URL string, canonicalizing it first.
    pub fn from_url(raw: &str) -> Result<Self, UrlError> {
        let url = canonicalize(raw)?;
        Ok(Self(url.to_string()))
    }

    /// Build an identity from an article title. Returns `None` for titles
    /// that are empty after trimming.
    pub fn from_title(title: &str) -> Option<Self> {
        let trimmed = title.trim();
        if trimmed.is_empty() { None } else { Some(Self(trimmed.to_string())) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The filesystem-safe cache key for this identity.
    pub fn cache_key(&self) -> String {
        derive_cache_key(&self.0)
    }
}

impl std::fmt::Display for ArticleIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the storage key for an identity string.
///
/// A pure, versioned SHA-256 of the identity, hex-encoded: identical input
/// yields an identical key in every process, and the output is safe as a
/// file name on any filesystem.
pub fn derive_cache_key(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(KEY_VERSION.as_bytes());
    hasher.update(b"\n");
    hasher.update(identity.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stability() {
        let key1 = derive_cache_key("https://example.com/article");
        let key2 = derive_cache_key("https://example.com/article");
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_key_distinct_identities() {
        let key1 = derive_cache_key("https://example.com/a");
        let key2 = derive_cache_key("https://example.com/b");
        assert_ne!(key1, key2);
    }

    #[test]
    fn test_key_format() {
        let key = derive_cache_key("https://example.com");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_identity_from_url_canonical() {
        let a = ArticleIdentity::from_url("https://EXAMPLE.com/story#comments").unwrap();
        let b = ArticleIdentity::from_url("  https://example.com/story  ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn test_identity_from_url_preserves_query() {
        let id = ArticleIdentity::from_url("https://example.com/story?page=2").unwrap();
        assert_eq!(id.as_str(), "https://example.com/story?page=2");
    }

    #[test]
    fn test_identity_from_title() {
        let id = ArticleIdentity::from_title("  Breaking News  ").unwrap();
        assert_eq!(id.as_str(), "Breaking News");
    }

    #[test]
    fn test_identity_from_blank_title() {
        assert!(ArticleIdentity::from_title("   ").is_none());
        assert!(ArticleIdentity::from_title("").is_none());
    }

    #[test]
    fn test_canonicalize_default_scheme() {
        let url = canonicalize("example.com/story").unwrap();
        assert_eq!(url.scheme(), "https");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize("   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_key_depends_only_on_identity_string() {
        let by_url = ArticleIdentity::from_url("https://example.com").unwrap();
        let by_title = ArticleIdentity::from_title("https://example.com/").unwrap();
        assert_eq!(by_url.as_str(), by_title.as_str());
        assert_eq!(by_url.cache_key(), by_title.cache_key());
    }
}
