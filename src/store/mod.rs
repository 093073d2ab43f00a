pub mod history;
pub mod live;
pub mod log;

use std::collections::VecDeque;

use crate::activity::ActivityEvent;

pub use history::TranscriptArchive;
pub use live::{LiveHandle, LiveStore, StoreRequest};
pub use log::ActivityLog;

/// Default capacity of the live in-memory store.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Capacity-bounded collection kept in descending `ts` order.
///
/// New events normally go to the front; once `capacity` is exceeded the
/// oldest entries are evicted from the back.
#[derive(Debug, Clone)]
pub struct BoundedStore {
    events: VecDeque<ActivityEvent>,
    capacity: usize,
}

impl BoundedStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Build a store from an unordered batch, keeping the newest `capacity`.
    pub fn from_events(mut events: Vec<ActivityEvent>, capacity: usize) -> Self {
        events.sort_by(|a, b| b.ts.cmp(&a.ts));
        events.truncate(capacity);
        Self {
            events: events.into(),
            capacity,
        }
    }

    /// Insert an event at its position in the descending order. An event
    /// whose `ts` ties existing ones goes in front of them.
    pub fn push(&mut self, event: ActivityEvent) {
        let idx = self.events.partition_point(|e| e.ts > event.ts);
        self.events.insert(idx, event);
        self.events.truncate(self.capacity);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityEvent> {
        self.events.iter()
    }

    pub fn newest(&self) -> Option<&ActivityEvent> {
        self.events.front()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<'a> IntoIterator for &'a BoundedStore {
    type Item = &'a ActivityEvent;
    type IntoIter = std::collections::vec_deque::Iter<'a, ActivityEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
