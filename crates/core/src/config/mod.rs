//! Application configuration with layered loading.
//!
//! Configuration is assembled with figment from three sources:
//!
//! 1. Environment variables (SHELFMARK_*)
//! 2. TOML config file (if SHELFMARK_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELFMARK_*)
/// 2. TOML config file (if SHELFMARK_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root directory for all persisted state: the bookmark set and both
    /// cache namespaces live beneath it.
    ///
    /// Set via SHELFMARK_DATA_DIR environment variable.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via SHELFMARK_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes accepted per image fetch.
    ///
    /// Set via SHELFMARK_FETCH_MAX_BYTES environment variable.
    #[serde(default = "default_fetch_max_bytes")]
    pub fetch_max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via SHELFMARK_FETCH_TIMEOUT_MS environment variable.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Entry-count bound of the image cache memory tier.
    ///
    /// Set via SHELFMARK_IMAGE_MEMORY_ENTRIES environment variable.
    #[serde(default = "default_image_memory_entries")]
    pub image_memory_entries: usize,

    /// Total-byte bound of the image cache memory tier.
    ///
    /// Set via SHELFMARK_IMAGE_MEMORY_BYTES environment variable.
    #[serde(default = "default_image_memory_bytes")]
    pub image_memory_bytes: usize,

    /// Per-job deadline for a background render, in milliseconds. A render
    /// that exceeds it is cancelled and the job fails, so one stalled page
    /// cannot wedge the preload backlog.
    ///
    /// Set via SHELFMARK_RENDER_TIMEOUT_MS environment variable.
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("shelfmark"))
        .unwrap_or_else(|| PathBuf::from("./shelfmark-data"))
}

fn default_user_agent() -> String {
    "shelfmark/0.1".into()
}

fn default_fetch_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_fetch_timeout_ms() -> u64 {
    20_000
}

fn default_image_memory_entries() -> usize {
    64
}

fn default_image_memory_bytes() -> usize {
    33_554_432 // 32MB
}

fn default_render_timeout_ms() -> u64 {
    30_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            user_agent: default_user_agent(),
            fetch_max_bytes: default_fetch_max_bytes(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            image_memory_entries: default_image_memory_entries(),
            image_memory_bytes: default_image_memory_bytes(),
            render_timeout_ms: default_render_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Fetch timeout as a Duration for use with reqwest/tokio.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Render deadline as a Duration.
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    /// Path of the persisted bookmark set.
    pub fn bookmarks_path(&self) -> PathBuf {
        self.data_dir.join("bookmarks.json")
    }

    /// Namespace directory for snapshot files.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    /// Namespace directory for the image cache disk tier.
    ///
    /// Disjoint from the snapshot namespace; the two caches never share a
    /// keyspace.
    pub fn image_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELFMARK_`
    /// 2. TOML file from `SHELFMARK_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELFMARK_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELFMARK_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.user_agent, "shelfmark/0.1");
        assert_eq!(config.fetch_max_bytes, 10_485_760);
        assert_eq!(config.fetch_timeout_ms, 20_000);
        assert_eq!(config.image_memory_entries, 64);
        assert_eq!(config.image_memory_bytes, 33_554_432);
        assert_eq!(config.render_timeout_ms, 30_000);
    }

    #[test]
    fn test_duration_helpers() {
        let config = AppConfig::default();
        assert_eq!(config.fetch_timeout(), Duration::from_millis(20_000));
        assert_eq!(config.render_timeout(), Duration::from_millis(30_000));
    }

    #[test]
    fn test_namespaces_disjoint() {
        let config = AppConfig::default();
        assert_ne!(config.snapshot_dir(), config.image_dir());
        assert!(config.snapshot_dir().starts_with(&config.data_dir));
        assert!(config.image_dir().starts_with(&config.data_dir));
    }

    #[test]
    fn test_bookmarks_path_under_data_dir() {
        let config = AppConfig::default();
        assert!(config.bookmarks_path().starts_with(&config.data_dir));
    }
}
