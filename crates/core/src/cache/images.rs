//! Two-tier image store: bounded memory over unbounded disk.
//!
//! The memory tier is bounded by an entry count and a total byte cost;
//! when either bound is exceeded the least-recently-promoted entries are
//! evicted first. Eviction only drops the in-memory copy, the disk file
//! stays. The memory tier is populated exclusively from disk writes and
//! disk-hit promotions, so it never holds bytes the disk tier does not.
//! Only an explicit `clear` empties the disk tier.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;

use bytes::Bytes;

use crate::error::Error;
use crate::identity::derive_cache_key;

#[derive(Debug)]
struct MemoryTier {
    entries: HashMap<String, Bytes>,
    /// Promotion order, oldest at the front.
    order: VecDeque<String>,
    total_bytes: usize,
    max_entries: usize,
    max_total_bytes: usize,
}

impl MemoryTier {
    fn get(&self, key: &str) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    /// Admit `bytes` under `key`, evicting oldest entries while over
    /// either bound. Entries that alone exceed the byte budget are not
    /// admitted at all; they stay disk-only.
    fn admit(&mut self, key: &str, bytes: Bytes) {
        if bytes.len() > self.max_total_bytes {
            tracing::debug!(key, len = bytes.len(), "image exceeds memory budget, disk tier only");
            return;
        }

        if let Some(old) = self.entries.insert(key.to_string(), bytes.clone()) {
            self.total_bytes -= old.len();
            self.order.retain(|k| k != key);
        }
        self.total_bytes += bytes.len();
        self.order.push_back(key.to_string());

        while self.entries.len() > self.max_entries || self.total_bytes > self.max_total_bytes {
            let Some(oldest) = self.order.pop_front() else { break };
            if let Some(evicted) = self.entries.remove(&oldest) {
                self.total_bytes -= evicted.len();
            }
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.total_bytes = 0;
    }
}

/// Tiered store of image bytes keyed by source URL.
#[derive(Debug)]
pub struct ImageStore {
    dir: PathBuf,
    mem: Mutex<MemoryTier>,
}

impl ImageStore {
    /// Open the store with its disk tier rooted at `dir`.
    pub async fn open(dir: PathBuf, max_entries: usize, max_total_bytes: usize) -> Result<Self, Error> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            mem: Mutex::new(MemoryTier {
                entries: HashMap::new(),
                order: VecDeque::new(),
                total_bytes: 0,
                max_entries,
                max_total_bytes,
            }),
        })
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        self.dir.join(derive_cache_key(url))
    }

    /// Look up `url` in the memory tier, then the disk tier. A disk hit is
    /// promoted into memory. Absence is `None`.
    pub async fn get(&self, url: &str) -> Option<Bytes> {
        if let Ok(mem) = self.mem.lock()
            && let Some(bytes) = mem.get(&derive_cache_key(url))
        {
            tracing::trace!(url, "image memory hit");
            return Some(bytes);
        }

        match tokio::fs::read(self.entry_path(url)).await {
            Ok(data) => {
                let bytes = Bytes::from(data);
                if let Ok(mut mem) = self.mem.lock() {
                    mem.admit(&derive_cache_key(url), bytes.clone());
                }
                tracing::trace!(url, "image disk hit, promoted");
                Some(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(url, "failed to read cached image: {e}");
                None
            }
        }
    }

    /// Store freshly fetched bytes in both tiers. The disk write happens
    /// first so the memory tier never leads the durable copy.
    pub async fn insert(&self, url: &str, bytes: Bytes) -> Result<(), Error> {
        let path = self.entry_path(url);
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;

        if let Ok(mut mem) = self.mem.lock() {
            mem.admit(&derive_cache_key(url), bytes);
        }
        Ok(())
    }

    /// Whether `url` currently sits in the memory tier.
    pub fn in_memory(&self, url: &str) -> bool {
        self.mem
            .lock()
            .is_ok_and(|mem| mem.entries.contains_key(&derive_cache_key(url)))
    }

    /// Synchronously empty the memory tier, then best-effort remove every
    /// disk-tier file. Missing or locked files are warned and skipped.
    pub async fn clear(&self) {
        if let Ok(mut mem) = self.mem.lock() {
            mem.clear();
        }

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("failed to list image cache: {e}");
                return;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                        tracing::warn!(path = %entry.path().display(), "failed to remove cached image: {e}");
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("failed to walk image cache: {e}");
                    break;
                }
            }
        }
    }
}
