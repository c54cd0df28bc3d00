//! Network edge for shelfmark.
//!
//! This crate provides the HTTP byte fetcher, the read-through image
//! loader over the core two-tier store, and the headless renderer seam
//! used by the preload worker.

pub mod fetch;
pub mod images;
pub mod render;

pub use fetch::{FetchClient, FetchConfig, FetchResponse};
pub use images::ImageLoader;
pub use render::{RenderError, RenderedPage, Renderer};

#[cfg(feature = "render")]
pub use render::HeadlessRenderer;
