//! shelfmark CLI entry point.
//!
//! Bookmarks an article URL, follows the background preload to a terminal
//! state, and reports whether the page is now readable offline. Logging
//! goes to stderr so the status output on stdout stays clean.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use shelfmark_core::{AppConfig, Article};
use shelfmark_reader::{JobState, OfflineReader};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: shelfmark <url> [title]");
        std::process::exit(2);
    };
    let title = args.next();

    let config = AppConfig::load()?;
    tracing::info!(data_dir = %config.data_dir.display(), "starting shelfmark");

    let renderer = launch_renderer().await?;
    let reader = OfflineReader::new(&config, renderer).await?;

    let article = Article { url: Some(url.clone()), title, ..Default::default() };
    let Some(key) = article.cache_key() else {
        anyhow::bail!("article has no derivable identity: {url}");
    };

    let mut updates = reader.preload_updates();
    let bookmarked = reader.toggle_bookmark(&article).await;

    if !bookmarked {
        println!("unbookmarked {url}; cached snapshot evicted");
        return Ok(());
    }

    if reader.has_cached_content(&article).await {
        println!("bookmarked {url}; snapshot already cached");
        return Ok(());
    }

    println!("bookmarked {url}; preloading...");
    loop {
        let update = updates.recv().await?;
        if update.key != key {
            continue;
        }
        match update.state {
            JobState::Cached => {
                let html = reader.get_cached_web_content(&article).await.unwrap_or_default();
                println!("cached ({} bytes); readable offline", html.len());
                break;
            }
            JobState::Failed => {
                println!("preload failed; article will load from the network next time");
                break;
            }
            state => tracing::debug!(?state, "preload progress"),
        }
    }

    Ok(())
}

#[cfg(feature = "render")]
async fn launch_renderer() -> Result<std::sync::Arc<dyn shelfmark_client::Renderer>> {
    let renderer = shelfmark_client::HeadlessRenderer::new().await?;
    Ok(std::sync::Arc::new(renderer))
}

#[cfg(not(feature = "render"))]
async fn launch_renderer() -> Result<std::sync::Arc<dyn shelfmark_client::Renderer>> {
    anyhow::bail!("this build has no renderer; rebuild with the `render` feature")
}
