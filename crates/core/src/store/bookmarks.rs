//! The bookmark-state store: source of truth for membership.
//!
//! The store holds only identity strings, never article payloads; callers
//! supply the current article pool when they need the bookmarked subset.
//! Every mutation persists the full set atomically (temp file + rename), so
//! a crash mid-write never leaves a corrupt or partial record on disk.
//! Persistence failures are soft: the in-memory set stays authoritative and
//! the error is logged, never surfaced to the toggling caller.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::RwLock;

use tokio::sync::Mutex;

use crate::article::Article;
use crate::events::{BookmarkEvent, EventBus};

/// Persisted set of bookmarked article identities.
#[derive(Debug)]
pub struct BookmarkStore {
    path: PathBuf,
    ids: RwLock<HashSet<String>>,
    /// Serializes the persist step so concurrent toggles cannot interleave
    /// their temp-file writes.
    writer: Mutex<()>,
    events: EventBus,
}

impl BookmarkStore {
    /// Open the store at `path`, loading any previously persisted set.
    ///
    /// A missing file is an empty set. An unreadable or corrupt file is
    /// also an empty set, with a warning; the next toggle rewrites it.
    pub async fn open(path: PathBuf, events: EventBus) -> Self {
        let ids = match tokio::fs::read(&path).await {
            Ok(data) => match serde_json::from_slice::<Vec<String>>(&data) {
                Ok(list) => list.into_iter().collect(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "corrupt bookmark file, starting empty: {e}");
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to read bookmark file, starting empty: {e}");
                HashSet::new()
            }
        };

        tracing::debug!(count = ids.len(), "loaded bookmark set");
        Self { path, ids: RwLock::new(ids), writer: Mutex::new(()), events }
    }

    /// Whether the article's identity is in the bookmarked set.
    ///
    /// Articles without an identity are never bookmarked.
    pub fn is_bookmarked(&self, article: &Article) -> bool {
        let Some(id) = article.identity() else { return false };
        self.ids.read().is_ok_and(|ids| ids.contains(id.as_str()))
    }

    /// Flip the article's membership and persist the full set atomically.
    ///
    /// Returns the resulting state (`true` = now bookmarked). Articles
    /// without an identity are a no-op returning `false`. The matching
    /// `BookmarkEvent` is published after the mutation is applied.
    pub async fn toggle(&self, article: &Article) -> bool {
        let Some(id) = article.identity() else {
            tracing::debug!("toggle on article without identity ignored");
            return false;
        };

        let (now_bookmarked, snapshot) = {
            let mut ids = match self.ids.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let now = if ids.remove(id.as_str()) {
                false
            } else {
                ids.insert(id.as_str().to_string());
                true
            };
            let mut list: Vec<String> = ids.iter().cloned().collect();
            list.sort();
            (now, list)
        };

        self.persist(snapshot).await;

        self.events
            .publish(BookmarkEvent { article: article.clone(), bookmarked: now_bookmarked });

        now_bookmarked
    }

    /// Filter the supplied pool down to the bookmarked subset, preserving
    /// pool order. The store never owns article payloads.
    pub fn all_bookmarked(&self, pool: &[Article]) -> Vec<Article> {
        let Ok(ids) = self.ids.read() else { return Vec::new() };
        pool.iter()
            .filter(|a| a.identity().is_some_and(|id| ids.contains(id.as_str())))
            .cloned()
            .collect()
    }

    /// Write the identity list to disk via temp file + rename.
    ///
    /// Failures are logged and swallowed; in-memory truth proceeds.
    async fn persist(&self, ids: Vec<String>) {
        let _write_guard = self.writer.lock().await;

        let result = async {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let data = serde_json::to_vec(&ids).map_err(std::io::Error::other)?;
            let tmp = self.path.with_extension("json.tmp");
            tokio::fs::write(&tmp, &data).await?;
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = result {
            tracing::warn!(path = %self.path.display(), "failed to persist bookmark set: {e}");
        }
    }
}
