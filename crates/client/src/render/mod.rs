//! Headless page rendering for snapshot capture.
//!
//! The `Renderer` trait is the seam the preload worker drives; the
//! chromiumoxide implementation behind the `render` feature executes page
//! scripts and serializes the resulting DOM. Capture happens on the
//! browser's navigation-finished signal, not a fixed delay. The renderer
//! does not enforce a deadline itself; the worker wraps each render in its
//! configured per-job timeout.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Errors that can occur during page rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to launch or connect to browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to navigate to URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Failed to serialize the loaded page.
    #[error("content retrieval failed: {0}")]
    ContentRetrieval(String),

    /// Browser closed unexpectedly.
    #[error("browser closed unexpectedly")]
    BrowserClosed,
}

/// Result of rendering a page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Fully script-executed HTML serialization.
    pub html: String,

    /// Final URL after redirects.
    pub final_url: Url,

    /// Time taken to render in milliseconds.
    pub render_time_ms: u64,
}

/// Renderer trait for headless page capture.
///
/// Implementations must be drivable from a single owner; the preload
/// worker never runs two renders concurrently against one instance.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Navigate to `url`, wait for the page to finish loading, and return
    /// the serialized DOM.
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError>;
}

/// Headless Chrome/Chromium renderer using chromiumoxide.
#[cfg(feature = "render")]
pub struct HeadlessRenderer {
    browser: chromiumoxide::Browser,
}

#[cfg(feature = "render")]
impl HeadlessRenderer {
    /// Launch a headless browser instance.
    ///
    /// A background task drains Chrome DevTools Protocol events for the
    /// lifetime of the browser.
    pub async fn new() -> Result<Self, RenderError> {
        use chromiumoxide::browser::{Browser, BrowserConfig};
        use futures_util::StreamExt;

        let (browser, mut handler) = Browser::launch(
            BrowserConfig::builder()
                .build()
                .map_err(RenderError::BrowserLaunch)?,
        )
        .await
        .map_err(|e| RenderError::BrowserLaunch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("browser handler event error: {e}");
                    break;
                }
            }
        });

        Ok(Self { browser })
    }
}

#[cfg(feature = "render")]
#[async_trait]
impl Renderer for HeadlessRenderer {
    async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
        let start = std::time::Instant::now();

        let page = self
            .browser
            .new_page(url.as_str())
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        // Explicit completion signal: resolve when navigation settles
        // rather than after an arbitrary wait.
        page.wait_for_navigation()
            .await
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        let html = page
            .content()
            .await
            .map_err(|e| RenderError::ContentRetrieval(e.to_string()))?;

        let page_url = page
            .url()
            .await
            .map_err(|e| RenderError::ContentRetrieval(e.to_string()))?;

        let final_url = Url::parse(page_url.as_deref().unwrap_or(url.as_str()))
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        let render_time_ms = start.elapsed().as_millis() as u64;

        page.close().await.ok();
        Ok(RenderedPage { html, final_url, render_time_ms })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "render")]
    #[tokio::test]
    #[ignore = "requires Chrome/Chromium installation"]
    async fn test_headless_renderer_new() {
        let renderer = HeadlessRenderer::new().await;
        assert!(renderer.is_ok());
    }

    #[cfg(feature = "render")]
    #[tokio::test]
    #[ignore = "requires network and Chrome/Chromium"]
    async fn test_render_simple_page() {
        let renderer = HeadlessRenderer::new().await.unwrap();
        let url = Url::parse("https://example.com").unwrap();

        let page = renderer.render(&url).await.unwrap();
        assert!(page.html.contains("<html"));
        assert_eq!(page.final_url.host_str(), Some("example.com"));
    }

    #[test]
    fn test_render_error_display() {
        let err = RenderError::Navigation("net::ERR_NAME_NOT_RESOLVED".into());
        assert!(err.to_string().contains("navigation failed"));
    }
}
