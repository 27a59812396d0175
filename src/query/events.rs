//! Query event bus.
//!
//! Orders every request and resolution with a shared monotonic epoch and
//! wakes the session when an entry settles or the selection moves.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use time::OffsetDateTime;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

use crate::util::lock;

use super::key::QueryKey;

const SOURCE: &str = "query::events";

/// Monotonic epoch for ordering requests and resolutions.
///
/// Epochs are process-wide and strictly increasing, so a late resolution
/// carrying an older epoch can always be told apart from the current one.
pub type Epoch = u64;

/// One observable transition in the query layer.
#[derive(Debug, Clone)]
pub struct QueryEvent {
    /// Unique identifier for idempotent consumption.
    pub id: Uuid,
    /// Epoch at publication time.
    pub epoch: Epoch,
    pub kind: QueryEventKind,
    pub timestamp: OffsetDateTime,
}

/// Transitions the session reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEventKind {
    /// The analysis subject changed.
    SelectionChanged,
    /// An entry resolved to Success.
    Resolved { key: QueryKey },
    /// An entry resolved to Failure.
    Failed { key: QueryKey },
    /// An entry was reset to Idle by an invalidation.
    Invalidated { key: QueryKey },
}

/// In-memory event queue with an async wakeup signal.
///
/// Contention is low (a handful of products per session), so a mutex-guarded
/// deque is sufficient.
pub struct EventBus {
    queue: Mutex<VecDeque<QueryEvent>>,
    epoch_counter: AtomicU64,
    wakeup: Notify,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
            wakeup: Notify::new(),
        }
    }

    /// Next epoch; strictly increasing for the life of the process.
    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Publish an event and wake any pending [`EventBus::changed`] call.
    pub fn publish(&self, kind: QueryEventKind) {
        let event = QueryEvent {
            id: Uuid::new_v4(),
            epoch: self.next_epoch(),
            kind,
            timestamp: OffsetDateTime::now_utc(),
        };
        debug!(
            event_id = %event.id,
            event_epoch = event.epoch,
            event_kind = ?event.kind,
            "Query event published"
        );
        lock::acquire(&self.queue, SOURCE, "publish").push_back(event);
        self.wakeup.notify_one();
    }

    /// Drain up to `limit` events in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<QueryEvent> {
        let mut queue = lock::acquire(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        queue.drain(..count).collect()
    }

    /// Wait until the next publication. A publication that happened since
    /// the last wait completes immediately.
    pub async fn changed(&self) {
        self.wakeup.notified().await;
    }

    pub fn len(&self) -> usize {
        lock::acquire(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
