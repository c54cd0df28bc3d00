//! Read-through image loader.
//!
//! `load` resolves a URL through the tiers in order: memory, disk
//! (promoting the hit), then the network. A successful fetch populates
//! both tiers before returning. A disk-write failure after a successful
//! fetch is soft: the bytes are still returned, the cache just stays
//! cold for that URL.
//!
//! Concurrent loads of the same URL each fetch independently; the last
//! write wins. The redundancy is accepted rather than coordinated.

use bytes::Bytes;
use std::sync::Arc;

use shelfmark_core::{Error, ImageStore};

use crate::fetch::FetchClient;

/// Tiered image loader backed by the shared image store.
pub struct ImageLoader {
    fetch: FetchClient,
    store: Arc<ImageStore>,
}

impl ImageLoader {
    pub fn new(fetch: FetchClient, store: Arc<ImageStore>) -> Self {
        Self { fetch, store }
    }

    /// Resolve `url` to image bytes: memory, disk, then network.
    pub async fn load(&self, url: &str) -> Result<Bytes, Error> {
        if let Some(bytes) = self.store.get(url).await {
            return Ok(bytes);
        }

        let response = self.fetch.fetch(url).await?;
        let bytes = response.bytes;

        if let Err(e) = self.store.insert(url, bytes.clone()).await {
            tracing::warn!(url, "failed to cache fetched image: {e}");
        }

        Ok(bytes)
    }

    /// Empty the memory tier and best-effort remove the disk tier.
    pub async fn clear(&self) {
        self.store.clear().await;
    }

    /// The underlying store, for sharing with other consumers.
    pub fn store(&self) -> &Arc<ImageStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchConfig;

    async fn loader_for(dir: &tempfile::TempDir) -> ImageLoader {
        let store = ImageStore::open(dir.path().join("images"), 8, 1024 * 1024).await.unwrap();
        ImageLoader::new(FetchClient::new(FetchConfig::default()).unwrap(), Arc::new(store))
    }

    #[tokio::test]
    async fn test_load_fetches_once_then_serves_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a.png")
            .with_status(200)
            .with_body(b"imagebytes")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(&dir).await;
        let url = format!("{}/a.png", server.url());

        let first = loader.load(&url).await.unwrap();
        let second = loader.load(&url).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_ref(), b"imagebytes");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_load_served_from_disk_without_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a.png")
            .with_status(200)
            .with_body(b"imagebytes")
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/a.png", server.url());

        {
            let loader = loader_for(&dir).await;
            loader.load(&url).await.unwrap();
        }

        // Fresh loader: empty memory tier, same disk tier. The mock's
        // expect(1) proves this second load never reaches the network.
        let loader = loader_for(&dir).await;
        let bytes = loader.load(&url).await.unwrap();
        assert_eq!(bytes.as_ref(), b"imagebytes");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_load_network_failure_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/gone.png")
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(&dir).await;

        let result = loader.load(&format!("{}/gone.png", server.url())).await;
        assert!(matches!(result, Err(Error::Http(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_url_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(&dir).await;

        let result = loader.load("   ").await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/a.png")
            .with_status(200)
            .with_body(b"imagebytes")
            .expect(2)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(&dir).await;
        let url = format!("{}/a.png", server.url());

        loader.load(&url).await.unwrap();
        loader.clear().await;
        loader.load(&url).await.unwrap();

        mock.assert_async().await;
    }
}
