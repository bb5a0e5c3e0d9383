//! Change feeds carry full selection snapshots between store instances.
//!
//! Delivery is always queued: a publisher enqueues the snapshot and returns, and
//! subscribers pick it up the next time they poll. No subscriber code ever runs
//! inside the publisher's call.

use crate::domain::model::{Origin, SelectionChange};
use crate::domain::ports::ChangeFeed;
use crate::utils::error::Result;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

pub const DEFAULT_FEED_CAPACITY: usize = 64;

/// Receiving end of a change feed that skips messages from muted origins.
pub struct Subscription {
    rx: broadcast::Receiver<SelectionChange>,
    muted: Vec<Origin>,
}

impl Subscription {
    pub fn new(rx: broadcast::Receiver<SelectionChange>) -> Self {
        Self { rx, muted: Vec::new() }
    }

    pub fn mute(mut self, origin: Origin) -> Self {
        if !self.muted.contains(&origin) {
            self.muted.push(origin);
        }
        self
    }

    /// Next queued message, without waiting.
    pub fn try_next(&mut self) -> Option<SelectionChange> {
        loop {
            match self.rx.try_recv() {
                Ok(change) if self.muted.contains(&change.origin) => continue,
                Ok(change) => return Some(change),
                // Snapshots are complete, so skipping lagged ones loses nothing.
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::debug!("Change feed lagged, skipped {} snapshots", skipped);
                    continue;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drains the queue and keeps only the newest message.
    pub fn latest(&mut self) -> Option<SelectionChange> {
        let mut latest = None;
        while let Some(change) = self.try_next() {
            latest = Some(change);
        }
        latest
    }

    /// Waits for the next message. `None` once every publisher is gone.
    pub async fn next(&mut self) -> Option<SelectionChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.muted.contains(&change.origin) => continue,
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("Change feed lagged, skipped {} snapshots", skipped);
                    continue;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Same-process feed shared by every store mounted in this process.
#[derive(Debug, Clone)]
pub struct InProcessFeed {
    tx: broadcast::Sender<SelectionChange>,
}

impl InProcessFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }
}

impl Default for InProcessFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed for InProcessFeed {
    fn publish(&self, change: &SelectionChange) -> Result<()> {
        // A send error only means nobody is listening yet.
        if self.tx.send(change.clone()).is_err() {
            tracing::debug!("No in-process listeners for key '{}'", change.key);
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.tx.subscribe())
    }
}
