//! The article boundary model.
//!
//! Articles arrive from an external pool provider (feed client, stored
//! list, test fixture); this crate never fetches or mutates them. Only the
//! fields that feed identity derivation and the caches are modeled here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::ArticleIdentity;

/// An article as supplied by the pool provider.
///
/// Every field is optional: feeds are messy, and the caches must cope with
/// partial records. An article with neither URL nor title has no identity
/// and is invisible to every cache and the bookmark store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    /// The stable identity: canonical URL, falling back to the title.
    ///
    /// `None` means the article cannot participate in bookmarking or
    /// caching; callers treat operations on it as no-ops rather than
    /// errors.
    pub fn identity(&self) -> Option<ArticleIdentity> {
        if let Some(url) = self.url.as_deref()
            && let Ok(id) = ArticleIdentity::from_url(url)
        {
            return Some(id);
        }
        self.title.as_deref().and_then(ArticleIdentity::from_title)
    }

    /// Derived cache key, when the article has an identity.
    pub fn cache_key(&self) -> Option<String> {
        self.identity().map(|id| id.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: Option<&str>, title: Option<&str>) -> Article {
        Article {
            url: url.map(String::from),
            title: title.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_identity_prefers_url() {
        let a = article(Some("https://example.com/story"), Some("A Story"));
        assert_eq!(a.identity().unwrap().as_str(), "https://example.com/story");
    }

    #[test]
    fn test_identity_falls_back_to_title() {
        let a = article(None, Some("A Story"));
        assert_eq!(a.identity().unwrap().as_str(), "A Story");
    }

    #[test]
    fn test_unparseable_url_falls_back_to_title() {
        let a = article(Some("ftp://example.com/story"), Some("A Story"));
        assert_eq!(a.identity().unwrap().as_str(), "A Story");
    }

    #[test]
    fn test_no_identity() {
        assert!(article(None, None).identity().is_none());
        assert!(article(None, None).cache_key().is_none());
    }

    #[test]
    fn test_cache_key_stable_across_instances() {
        let a = article(Some("https://Example.com/story#x"), None);
        let b = article(Some("https://example.com/story"), Some("different title"));
        assert_eq!(a.cache_key().unwrap(), b.cache_key().unwrap());
    }
}
