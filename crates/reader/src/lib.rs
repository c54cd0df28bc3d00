//! Offline reader service layer for shelfmark.
//!
//! This crate provides the serialized background preload worker and the
//! `OfflineReader` facade that UI surfaces consume.

pub mod preload;
pub mod service;

pub use preload::{JobState, PreloadUpdate, PreloadWorker};
pub use service::OfflineReader;
