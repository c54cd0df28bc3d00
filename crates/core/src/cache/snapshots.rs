//! Full-page snapshot cache.
//!
//! Stores captured HTML keyed by derived article identity, one file per
//! key under its own namespace directory. Writes are atomic (temp file +
//! rename), so `get` immediately after `put` on the same key returns
//! byte-identical content. Entries carry no freshness metadata and live
//! until explicitly removed; staleness is the accepted price of offline
//! availability.

use std::path::PathBuf;

use crate::error::Error;

/// Disk-backed store of captured full-page HTML.
#[derive(Debug)]
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    /// Open the cache rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: PathBuf) -> Result<Self, Error> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.html"))
    }

    /// Atomically write the snapshot for `key`, replacing any prior entry.
    pub async fn put(&self, key: &str, html: &str) -> Result<(), Error> {
        let path = self.entry_path(key);
        let tmp = self.dir.join(format!("{key}.html.tmp"));

        tokio::fs::write(&tmp, html.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(key, bytes = html.len(), "cached snapshot");
        Ok(())
    }

    /// Read the snapshot for `key`. Absence is `None`; a present-but-
    /// unreadable entry is also `None`, with a warning.
    pub async fn get(&self, key: &str) -> Option<String> {
        match tokio::fs::read_to_string(self.entry_path(key)).await {
            Ok(html) => Some(html),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(key, "failed to read snapshot: {e}");
                None
            }
        }
    }

    /// Whether a snapshot exists for `key`.
    pub async fn has(&self, key: &str) -> bool {
        tokio::fs::try_exists(self.entry_path(key)).await.unwrap_or(false)
    }

    /// Remove the snapshot for `key`. A missing entry is not an error.
    pub async fn remove(&self, key: &str) -> Result<(), Error> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Best-effort delete of all entries. Individual file failures are
    /// warned and skipped, never fatal.
    pub async fn clear(&self) {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("failed to list snapshot cache: {e}");
                return;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                        tracing::warn!(path = %entry.path().display(), "failed to remove snapshot: {e}");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("failed to walk snapshot cache: {e}");
                    break;
                }
            }
        }
    }
}
