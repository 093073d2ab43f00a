use tokio::sync::{mpsc, oneshot};

use crate::activity::ActivityEvent;
use crate::query::{ActivityQuery, ActivityStats};

use super::{ActivityLog, BoundedStore};

/// The live store: a bounded in-memory window backed by the append log.
///
/// Owned by the pipeline loop; everything else reaches it through a
/// [`LiveHandle`].
#[derive(Debug)]
pub struct LiveStore {
    events: BoundedStore,
    log: ActivityLog,
}

impl LiveStore {
    /// Reload the newest `capacity` persisted events and start from there.
    pub fn open(log: ActivityLog, capacity: usize) -> Self {
        let events = BoundedStore::from_events(log.load(capacity), capacity);
        tracing::info!(count = events.len(), path = %log.path().display(), "loaded existing events");
        Self { events, log }
    }

    /// Persist the event, then insert it into the in-memory window. A failed
    /// append is logged and does not stop the in-memory path.
    pub fn record(&mut self, event: ActivityEvent) {
        if let Err(err) = self.log.append(&event) {
            tracing::warn!(error = %err, "failed to write activity");
        }
        self.events.push(event);
    }

    pub fn events(&self) -> &BoundedStore {
        &self.events
    }

    /// Serve one query against the current window.
    pub fn answer(&self, request: StoreRequest) {
        // A dropped receiver just means the caller went away.
        match request {
            StoreRequest::Activity { query, reply } => {
                let _ = reply.send(query.apply(&self.events));
            }
            StoreRequest::Stats { reply } => {
                let _ = reply.send(ActivityStats::from_events(&self.events));
            }
        }
    }
}

/// A read request sent to the loop that owns the live store.
#[derive(Debug)]
pub enum StoreRequest {
    Activity {
        query: ActivityQuery,
        reply: oneshot::Sender<Vec<ActivityEvent>>,
    },
    Stats {
        reply: oneshot::Sender<ActivityStats>,
    },
}

/// Cloneable query handle for the live store.
#[derive(Debug, Clone)]
pub struct LiveHandle {
    tx: mpsc::Sender<StoreRequest>,
}

impl LiveHandle {
    /// Create a handle and the receiver the owning loop drains.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<StoreRequest>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Run an activity query. Returns an empty list if the store has shut down.
    pub async fn activity(&self, query: ActivityQuery) -> Vec<ActivityEvent> {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(StoreRequest::Activity { query, reply }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn stats(&self) -> ActivityStats {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(StoreRequest::Stats { reply }).await.is_err() {
            return ActivityStats::default();
        }
        rx.await.unwrap_or_default()
    }
}
