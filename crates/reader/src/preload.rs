//! Serialized background preload worker.
//!
//! One spawned task drains a FIFO backlog of preload jobs, driving the
//! injected renderer for one job at a time: at most one job is ever in
//! Loading or Extracting. Enqueueing is dedup'd by derived cache key
//! against both the backlog and the active job, and skipped entirely when
//! the snapshot cache already holds the article. A failed job is dropped
//! without retry and the backlog moves on.
//!
//! Every render runs under the configured per-job deadline, so a stalled
//! page fails that one job instead of wedging the backlog. `cancel_all`
//! clears the backlog and aborts the in-flight render.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, broadcast};
use tokio_util::sync::CancellationToken;
use url::Url;

use shelfmark_client::render::Renderer;
use shelfmark_core::identity::canonicalize;
use shelfmark_core::{Article, SnapshotCache};

/// Lifecycle of a single preload job. Terminal states are `Cached` and
/// `Failed`; there is no retry out of `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Loading,
    Extracting,
    Cached,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Cached | JobState::Failed)
    }
}

/// A state transition of one job, broadcast to observers.
#[derive(Debug, Clone)]
pub struct PreloadUpdate {
    /// Derived cache key of the article being preloaded.
    pub key: String,
    pub state: JobState,
}

#[derive(Debug)]
struct QueuedJob {
    key: String,
    url: Url,
}

#[derive(Debug)]
struct ActiveJob {
    key: String,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
struct QueueState {
    backlog: VecDeque<QueuedJob>,
    active: Option<ActiveJob>,
}

struct Inner {
    snapshots: Arc<SnapshotCache>,
    renderer: Arc<dyn Renderer>,
    deadline: Duration,
    queue: Mutex<QueueState>,
    wake: Notify,
    updates: broadcast::Sender<PreloadUpdate>,
}

impl Inner {
    fn emit(&self, key: &str, state: JobState) {
        let _ = self.updates.send(PreloadUpdate { key: key.to_string(), state });
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, QueueState> {
        match self.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Background preload runner. Owns the renderer and the worker task;
/// dropping the worker aborts the task.
pub struct PreloadWorker {
    inner: Arc<Inner>,
    task: tokio::task::JoinHandle<()>,
}

impl PreloadWorker {
    /// Spawn the worker task. `deadline` bounds each render.
    pub fn spawn(snapshots: Arc<SnapshotCache>, renderer: Arc<dyn Renderer>, deadline: Duration) -> Self {
        let (updates, _) = broadcast::channel(64);
        let inner = Arc::new(Inner {
            snapshots,
            renderer,
            deadline,
            queue: Mutex::new(QueueState::default()),
            wake: Notify::new(),
            updates,
        });

        let task = tokio::spawn(run(Arc::clone(&inner)));
        Self { inner, task }
    }

    /// Enqueue a preload for `article` and return immediately.
    ///
    /// No-ops: article without identity or without a renderable URL,
    /// snapshot already cached, or an identity-matching job already
    /// queued or active.
    pub async fn preload(&self, article: &Article) {
        let Some(key) = article.cache_key() else {
            tracing::debug!("preload skipped: article has no identity");
            return;
        };

        let url = match article.url.as_deref().map(canonicalize) {
            Some(Ok(url)) => url,
            _ => {
                tracing::debug!(key, "preload skipped: no renderable URL");
                return;
            }
        };

        if self.inner.snapshots.has(&key).await {
            tracing::debug!(key, "preload skipped: already cached");
            return;
        }

        {
            let mut queue = self.inner.lock_queue();
            let already_tracked = queue.active.as_ref().is_some_and(|a| a.key == key)
                || queue.backlog.iter().any(|j| j.key == key);
            if already_tracked {
                tracing::debug!(key, "preload skipped: job already queued or active");
                return;
            }
            queue.backlog.push_back(QueuedJob { key: key.clone(), url });
        }

        self.inner.emit(&key, JobState::Queued);
        self.inner.wake.notify_one();
    }

    /// Number of jobs waiting behind the active one.
    pub fn backlog_len(&self) -> usize {
        self.inner.lock_queue().backlog.len()
    }

    /// Whether the worker has neither an active job nor a backlog.
    pub fn is_idle(&self) -> bool {
        let queue = self.inner.lock_queue();
        queue.active.is_none() && queue.backlog.is_empty()
    }

    /// Clear the backlog and abort the in-flight render, if any.
    pub fn cancel_all(&self) {
        let dropped = {
            let mut queue = self.inner.lock_queue();
            let dropped = queue.backlog.len();
            queue.backlog.clear();
            if let Some(active) = &queue.active {
                active.cancel.cancel();
            }
            dropped
        };
        tracing::debug!(dropped, "preload backlog cancelled");
    }

    /// Observe job state transitions. Dropping the receiver detaches it.
    pub fn updates(&self) -> broadcast::Receiver<PreloadUpdate> {
        self.inner.updates.subscribe()
    }
}

impl Drop for PreloadWorker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(inner: Arc<Inner>) {
    loop {
        let job = {
            let mut queue = inner.lock_queue();
            match queue.backlog.pop_front() {
                Some(job) => {
                    let cancel = CancellationToken::new();
                    queue.active = Some(ActiveJob { key: job.key.clone(), cancel: cancel.clone() });
                    Some((job, cancel))
                }
                None => None,
            }
        };

        match job {
            Some((job, cancel)) => {
                let key = job.key.clone();
                let terminal = process(&inner, job, cancel).await;
                // Clear the active slot before announcing the terminal
                // state, so observers of a terminal update see an idle
                // or advanced worker, never a stale active job.
                inner.lock_queue().active = None;
                if let Some(state) = terminal {
                    inner.emit(&key, state);
                }
            }
            None => inner.wake.notified().await,
        }
    }
}

enum RenderOutcome {
    Page(shelfmark_client::render::RenderedPage),
    Failed(String),
    Cancelled,
}

/// Drive one job to completion. Returns the terminal state to announce,
/// or `None` when the job was cancelled and simply dropped.
async fn process(inner: &Inner, job: QueuedJob, cancel: CancellationToken) -> Option<JobState> {
    inner.emit(&job.key, JobState::Loading);
    tracing::debug!(key = job.key, url = %job.url, "preloading");

    let outcome = tokio::select! {
        _ = cancel.cancelled() => RenderOutcome::Cancelled,
        result = tokio::time::timeout(inner.deadline, inner.renderer.render(&job.url)) => match result {
            Ok(Ok(page)) => RenderOutcome::Page(page),
            Ok(Err(e)) => RenderOutcome::Failed(e.to_string()),
            Err(_) => RenderOutcome::Failed(format!("render deadline of {:?} exceeded", inner.deadline)),
        },
    };

    match outcome {
        RenderOutcome::Cancelled => {
            tracing::debug!(key = job.key, "in-flight preload cancelled");
            None
        }
        RenderOutcome::Failed(reason) => {
            tracing::warn!(key = job.key, url = %job.url, "preload failed: {reason}");
            Some(JobState::Failed)
        }
        RenderOutcome::Page(page) => {
            inner.emit(&job.key, JobState::Extracting);
            match inner.snapshots.put(&job.key, &page.html).await {
                Ok(()) => {
                    tracing::debug!(key = job.key, ms = page.render_time_ms, "preloaded and cached");
                    Some(JobState::Cached)
                }
                Err(e) => {
                    tracing::warn!(key = job.key, "failed to cache preloaded snapshot: {e}");
                    Some(JobState::Failed)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shelfmark_client::render::{RenderError, RenderedPage};
    use tokio::sync::Semaphore;

    /// Renderer that blocks until the test hands it a permit, then echoes
    /// the URL path into the page body. Paths containing "fail" error.
    struct GatedRenderer {
        gate: Semaphore,
    }

    impl GatedRenderer {
        fn new(permits: usize) -> Self {
            Self { gate: Semaphore::new(permits) }
        }

        fn release(&self, n: usize) {
            self.gate.add_permits(n);
        }
    }

    #[async_trait]
    impl Renderer for GatedRenderer {
        async fn render(&self, url: &Url) -> Result<RenderedPage, RenderError> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|_| RenderError::BrowserClosed)?;
            permit.forget();

            if url.path().contains("fail") {
                return Err(RenderError::Navigation("simulated navigation error".into()));
            }
            Ok(RenderedPage {
                html: format!("<html>{}</html>", url.path()),
                final_url: url.clone(),
                render_time_ms: 1,
            })
        }
    }

    fn article(url: &str) -> Article {
        Article { url: Some(url.to_string()), ..Default::default() }
    }

    async fn snapshots(dir: &tempfile::TempDir) -> Arc<SnapshotCache> {
        Arc::new(SnapshotCache::open(dir.path().join("snapshots")).await.unwrap())
    }

    const DEADLINE: Duration = Duration::from_secs(10);

    /// Collect updates until the expected number of terminal states.
    async fn collect_terminals(
        rx: &mut broadcast::Receiver<PreloadUpdate>, count: usize,
    ) -> Vec<PreloadUpdate> {
        let mut all = Vec::new();
        let mut terminals = 0;
        while terminals < count {
            let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for preload updates")
                .unwrap();
            if update.state.is_terminal() {
                terminals += 1;
            }
            all.push(update);
        }
        all
    }

    #[tokio::test]
    async fn test_preload_renders_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = snapshots(&dir).await;
        let renderer = Arc::new(GatedRenderer::new(8));
        let worker = PreloadWorker::spawn(Arc::clone(&snapshots), renderer, DEADLINE);

        let a = article("https://example.com/story");
        let mut rx = worker.updates();
        worker.preload(&a).await;

        let updates = collect_terminals(&mut rx, 1).await;
        assert_eq!(updates.last().unwrap().state, JobState::Cached);

        let key = a.cache_key().unwrap();
        assert_eq!(snapshots.get(&key).await.as_deref(), Some("<html>/story</html>"));
    }

    #[tokio::test]
    async fn test_already_cached_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = snapshots(&dir).await;
        let renderer = Arc::new(GatedRenderer::new(8));
        let worker = PreloadWorker::spawn(Arc::clone(&snapshots), renderer, DEADLINE);

        let a = article("https://example.com/story");
        let key = a.cache_key().unwrap();
        snapshots.put(&key, "<html>prior</html>").await.unwrap();

        worker.preload(&a).await;

        assert!(worker.is_idle());
        assert_eq!(snapshots.get(&key).await.as_deref(), Some("<html>prior</html>"));
    }

    #[tokio::test]
    async fn test_dedup_by_identity() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = snapshots(&dir).await;
        let renderer = Arc::new(GatedRenderer::new(0));
        let worker = PreloadWorker::spawn(snapshots, Arc::clone(&renderer) as Arc<dyn Renderer>, DEADLINE);

        let blocker = article("https://example.com/blocker");
        let a = article("https://example.com/story");
        let mut rx = worker.updates();

        worker.preload(&blocker).await;
        // Wait until the blocker occupies the renderer.
        loop {
            let update = rx.recv().await.unwrap();
            if update.state == JobState::Loading {
                break;
            }
        }

        worker.preload(&a).await;
        assert_eq!(worker.backlog_len(), 1);

        // Same identity, different spelling of the same canonical URL.
        worker.preload(&article("https://EXAMPLE.com/story#frag")).await;
        assert_eq!(worker.backlog_len(), 1);

        renderer.release(8);
        collect_terminals(&mut rx, 2).await;
        assert!(worker.is_idle());
    }

    #[tokio::test]
    async fn test_fifo_order_and_single_flight() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = snapshots(&dir).await;
        let renderer = Arc::new(GatedRenderer::new(8));
        let worker = PreloadWorker::spawn(snapshots, renderer, DEADLINE);

        let pool: Vec<Article> = (0..4)
            .map(|i| article(&format!("https://example.com/{i}")))
            .collect();
        let keys: Vec<String> = pool.iter().map(|a| a.cache_key().unwrap()).collect();

        let mut rx = worker.updates();
        for a in &pool {
            worker.preload(a).await;
        }

        let updates = collect_terminals(&mut rx, pool.len()).await;

        // Jobs reach a terminal state in enqueue order.
        let terminal_keys: Vec<&str> = updates
            .iter()
            .filter(|u| u.state.is_terminal())
            .map(|u| u.key.as_str())
            .collect();
        assert_eq!(terminal_keys, keys.iter().map(String::as_str).collect::<Vec<_>>());

        // Single-flight: a job only enters Loading after the previous
        // job's terminal state.
        let mut in_flight: Option<&str> = None;
        for update in &updates {
            match update.state {
                JobState::Loading => {
                    assert!(in_flight.is_none(), "two jobs in flight at once");
                    in_flight = Some(&update.key);
                }
                JobState::Extracting => assert_eq!(in_flight, Some(update.key.as_str())),
                JobState::Cached | JobState::Failed => {
                    assert_eq!(in_flight, Some(update.key.as_str()));
                    in_flight = None;
                }
                JobState::Queued => {}
            }
        }
    }

    #[tokio::test]
    async fn test_backlog_depth_while_loading() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = snapshots(&dir).await;
        let renderer = Arc::new(GatedRenderer::new(0));
        let worker = PreloadWorker::spawn(snapshots, Arc::clone(&renderer) as Arc<dyn Renderer>, DEADLINE);

        let mut rx = worker.updates();
        for i in 0..3 {
            worker.preload(&article(&format!("https://example.com/{i}"))).await;
        }

        // First job is picked up and held at Loading; the other two wait.
        loop {
            let update = rx.recv().await.unwrap();
            if update.state == JobState::Loading {
                break;
            }
        }
        assert_eq!(worker.backlog_len(), 2);

        renderer.release(8);
        collect_terminals(&mut rx, 3).await;
        assert!(worker.is_idle());
    }

    #[tokio::test]
    async fn test_failed_job_drops_and_backlog_continues() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = snapshots(&dir).await;
        let renderer = Arc::new(GatedRenderer::new(8));
        let worker = PreloadWorker::spawn(Arc::clone(&snapshots), renderer, DEADLINE);

        let bad = article("https://example.com/fail/story");
        let good = article("https://example.com/good");
        let mut rx = worker.updates();

        worker.preload(&bad).await;
        worker.preload(&good).await;

        let updates = collect_terminals(&mut rx, 2).await;
        let terminals: Vec<(&str, JobState)> = updates
            .iter()
            .filter(|u| u.state.is_terminal())
            .map(|u| (u.key.as_str(), u.state))
            .collect();

        assert_eq!(terminals[0], (bad.cache_key().unwrap().as_str(), JobState::Failed));
        assert_eq!(terminals[1], (good.cache_key().unwrap().as_str(), JobState::Cached));

        assert!(!snapshots.has(&bad.cache_key().unwrap()).await);
        assert!(snapshots.has(&good.cache_key().unwrap()).await);
    }

    #[tokio::test]
    async fn test_render_deadline_fails_job() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = snapshots(&dir).await;
        // Renderer never releases: only the deadline can end the job.
        let renderer = Arc::new(GatedRenderer::new(0));
        let worker = PreloadWorker::spawn(
            Arc::clone(&snapshots),
            renderer,
            Duration::from_millis(100),
        );

        let a = article("https://example.com/stalled");
        let mut rx = worker.updates();
        worker.preload(&a).await;

        let updates = collect_terminals(&mut rx, 1).await;
        assert_eq!(updates.last().unwrap().state, JobState::Failed);
        assert!(!snapshots.has(&a.cache_key().unwrap()).await);
        assert!(worker.is_idle());
    }

    #[tokio::test]
    async fn test_cancel_all_clears_backlog_and_aborts_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let snapshots = snapshots(&dir).await;
        let renderer = Arc::new(GatedRenderer::new(0));
        let worker = PreloadWorker::spawn(
            Arc::clone(&snapshots),
            Arc::clone(&renderer) as Arc<dyn Renderer>,
            DEADLINE,
        );

        let mut rx = worker.updates();
        for i in 0..3 {
            worker.preload(&article(&format!("https://example.com/{i}"))).await;
        }
        loop {
            let update = rx.recv().await.unwrap();
            if update.state == JobState::Loading {
                break;
            }
        }

        worker.cancel_all();
        assert_eq!(worker.backlog_len(), 0);

        // The worker returns to Idle and accepts fresh work.
        renderer.release(8);
        let a = article("https://example.com/after-cancel");
        worker.preload(&a).await;
        let updates = collect_terminals(&mut rx, 1).await;
        assert_eq!(updates.last().unwrap().state, JobState::Cached);
        assert_eq!(updates.last().unwrap().key, a.cache_key().unwrap());
    }
}
