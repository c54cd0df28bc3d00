//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `fetch_max_bytes` is 0 or exceeds 50MB
    /// - `fetch_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `render_timeout_ms` is less than 1s or exceeds 5 minutes
    /// - either memory-tier bound is 0
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_max_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "fetch_max_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.fetch_max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid {
                field: "fetch_max_bytes".into(),
                reason: "must not exceed 50MB".into(),
            });
        }

        if self.fetch_timeout_ms < 100 {
            return Err(ConfigError::Invalid {
                field: "fetch_timeout_ms".into(),
                reason: "must be at least 100ms".into(),
            });
        }
        if self.fetch_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "fetch_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.render_timeout_ms < 1_000 {
            return Err(ConfigError::Invalid {
                field: "render_timeout_ms".into(),
                reason: "must be at least 1000ms".into(),
            });
        }
        if self.render_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "render_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.image_memory_entries == 0 {
            return Err(ConfigError::Invalid {
                field: "image_memory_entries".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.image_memory_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "image_memory_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        Ok(())
    }
}
