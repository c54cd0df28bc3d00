//! Typed bookmark-change notifications.
//!
//! A thin wrapper over a tokio broadcast channel. Publishing delivers to
//! every live subscriber at the call site; subscribing returns a receiver
//! whose drop is the unsubscribe, so listener lifetime is owned by the
//! consumer and stale listeners cannot accumulate.

use tokio::sync::broadcast;

use crate::article::Article;

/// Default buffered events per subscriber before lagging kicks in.
const DEFAULT_CAPACITY: usize = 64;

/// A bookmark-state transition.
#[derive(Debug, Clone)]
pub struct BookmarkEvent {
    pub article: Article,
    pub bookmarked: bool,
}

/// Broadcast bus for bookmark-state transitions.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BookmarkEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Deliver an event to every current subscriber.
    ///
    /// With no subscribers this is a no-op, not an error.
    pub fn publish(&self, event: BookmarkEvent) {
        let delivered = self.tx.send(event).unwrap_or(0);
        tracing::trace!(delivered, "published bookmark event");
    }

    /// Register a listener. Dropping the receiver unsubscribes it.
    pub fn subscribe(&self) -> broadcast::Receiver<BookmarkEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
