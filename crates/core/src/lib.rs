//! Core types and offline storage for shelfmark.
//!
//! This crate provides:
//! - Article identity and versioned cache-key derivation
//! - The persisted bookmark-state store (source of truth for membership)
//! - The snapshot cache and two-tier image store
//! - The bookmark-change event bus
//! - Unified error type and layered configuration

pub mod article;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod store;

pub use article::Article;
pub use cache::{ImageStore, SnapshotCache};
pub use config::AppConfig;
pub use error::Error;
pub use events::{BookmarkEvent, EventBus};
pub use identity::ArticleIdentity;
pub use store::BookmarkStore;
