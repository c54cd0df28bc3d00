//! The offline reader facade.
//!
//! `OfflineReader` wires the bookmark store, the snapshot cache, the image
//! loader, and the preload worker into the surface consumed by UI layers.
//! Every collaborator is an explicit, owner-controlled instance injected
//! at construction; nothing here is a process-wide singleton.
//!
//! Failure policy at this surface: a missing cache entry is `None`, image
//! fetch failures degrade to `None`, and snapshot eviction failures on
//! the unbookmark path are logged, never surfaced. The one operation that
//! reports an error to its caller is `cache_web_content`, the synchronous
//! on-demand capture path.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::broadcast;

use shelfmark_client::render::Renderer;
use shelfmark_client::{FetchClient, FetchConfig, ImageLoader};
use shelfmark_core::{AppConfig, Article, BookmarkEvent, BookmarkStore, Error, EventBus, ImageStore, SnapshotCache};

use crate::preload::{PreloadUpdate, PreloadWorker};

/// Offline reading service: bookmarks, snapshots, images, preloading.
pub struct OfflineReader {
    store: BookmarkStore,
    snapshots: Arc<SnapshotCache>,
    images: ImageLoader,
    worker: PreloadWorker,
    events: EventBus,
}

impl OfflineReader {
    /// Build the service from configuration and an injected renderer.
    ///
    /// The renderer becomes the exclusive property of the preload worker.
    pub async fn new(config: &AppConfig, renderer: Arc<dyn Renderer>) -> Result<Self, Error> {
        let events = EventBus::default();
        let store = BookmarkStore::open(config.bookmarks_path(), events.clone()).await;
        let snapshots = Arc::new(SnapshotCache::open(config.snapshot_dir()).await?);
        let image_store = Arc::new(
            ImageStore::open(config.image_dir(), config.image_memory_entries, config.image_memory_bytes).await?,
        );
        let fetch = FetchClient::new(FetchConfig {
            user_agent: config.user_agent.clone(),
            max_bytes: config.fetch_max_bytes,
            timeout: config.fetch_timeout(),
            ..Default::default()
        })?;
        let images = ImageLoader::new(fetch, image_store);
        let worker = PreloadWorker::spawn(Arc::clone(&snapshots), renderer, config.render_timeout());

        Ok(Self { store, snapshots, images, worker, events })
    }

    /// Whether the article is currently bookmarked.
    pub fn is_bookmarked(&self, article: &Article) -> bool {
        self.store.is_bookmarked(article)
    }

    /// Flip bookmark membership and return the new state.
    ///
    /// Bookmarking requests a background preload unless the article is
    /// already cached; unbookmarking evicts its snapshot. Neither side
    /// effect can fail the toggle itself.
    pub async fn toggle_bookmark(&self, article: &Article) -> bool {
        let bookmarked = self.store.toggle(article).await;

        if bookmarked {
            self.worker.preload(article).await;
        } else if let Some(key) = article.cache_key()
            && let Err(e) = self.snapshots.remove(&key).await
        {
            tracing::warn!(key, "failed to evict snapshot on unbookmark: {e}");
        }

        bookmarked
    }

    /// The bookmarked subset of the supplied article pool, in pool order.
    pub fn all_bookmarked(&self, pool: &[Article]) -> Vec<Article> {
        self.store.all_bookmarked(pool)
    }

    /// Store externally captured HTML for the article.
    ///
    /// This is the on-demand capture path: the UI's own rendering surface
    /// hands over the serialized page. Unlike background preloads, a
    /// write failure here is returned so the caller can show an
    /// offline-unavailable notice. Articles without identity are a no-op.
    pub async fn cache_web_content(&self, article: &Article, html: &str) -> Result<(), Error> {
        let Some(key) = article.cache_key() else {
            tracing::debug!("capture skipped: article has no identity");
            return Ok(());
        };
        self.snapshots.put(&key, html).await
    }

    /// The cached snapshot for the article, if any.
    pub async fn get_cached_web_content(&self, article: &Article) -> Option<String> {
        let key = article.cache_key()?;
        self.snapshots.get(&key).await
    }

    /// Whether a snapshot exists for the article.
    pub async fn has_cached_content(&self, article: &Article) -> bool {
        match article.cache_key() {
            Some(key) => self.snapshots.has(&key).await,
            None => false,
        }
    }

    /// Remove the article's snapshot. Absence is not an error.
    pub async fn remove_cached_content(&self, article: &Article) -> Result<(), Error> {
        match article.cache_key() {
            Some(key) => self.snapshots.remove(&key).await,
            None => Ok(()),
        }
    }

    /// Best-effort removal of every cached snapshot.
    pub async fn clear_cached_content(&self) {
        self.snapshots.clear().await;
    }

    /// Queue a background preload for the article and return immediately.
    pub async fn preload_content(&self, article: &Article) {
        self.worker.preload(article).await;
    }

    /// Queue preloads for every bookmarked article in the pool that is
    /// not yet cached.
    pub async fn preload_all_bookmarked(&self, pool: &[Article]) {
        for article in self.store.all_bookmarked(pool) {
            self.worker.preload(&article).await;
        }
    }

    /// Drop all queued preloads and abort the in-flight one.
    pub fn cancel_all(&self) {
        self.worker.cancel_all();
    }

    /// Resolve an image URL through memory, disk, then network.
    ///
    /// Every failure mode degrades to `None`; callers render a
    /// placeholder rather than an error state.
    pub async fn load_image(&self, url: &str) -> Option<Bytes> {
        match self.images.load(url).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(url, "image load failed: {e}");
                None
            }
        }
    }

    /// Empty the image cache, both tiers.
    pub async fn clear_image_cache(&self) {
        self.images.clear().await;
    }

    /// Subscribe to bookmark-state transitions. Drop the receiver to
    /// unsubscribe.
    pub fn subscribe(&self) -> broadcast::Receiver<BookmarkEvent> {
        self.events.subscribe()
    }

    /// Subscribe to preload job transitions.
    pub fn preload_updates(&self) -> broadcast::Receiver<PreloadUpdate> {
        self.worker.updates()
    }
}
