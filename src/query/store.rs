//! Keyed query cache.
//!
//! One entry per distinct [`QueryKey`], with subscriber counting, at most
//! one in-flight fetch per key, and epoch-guarded completion so a late
//! resolution can never overwrite a newer one.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, RwLock};

use metrics::counter;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::ClientError;
use crate::domain::ProductOutput;
use crate::util::lock;

use super::events::{Epoch, EventBus, QueryEventKind};
use super::key::QueryKey;

const SOURCE: &str = "query::store";

const METRIC_CACHE_HIT: &str = "marketscope_query_cache_hit_total";
const METRIC_CACHE_MISS: &str = "marketscope_query_cache_miss_total";
const METRIC_CACHE_EVICT: &str = "marketscope_query_cache_evict_total";
const METRIC_STALE_DROPPED: &str = "marketscope_query_stale_dropped_total";

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Idle,
    Loading,
    Success,
    Failure,
}

/// Failure class surfaced to view bindings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Http(u16),
    Decode,
}

/// Human-displayable failure attached to a Failure entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ClientError> for ErrorInfo {
    fn from(error: &ClientError) -> Self {
        let kind = match error {
            ClientError::Network(_) => FailureKind::Network,
            ClientError::Http { status } => FailureKind::Http(*status),
            ClientError::Decode(_) => FailureKind::Decode,
            ClientError::Url(_) => FailureKind::Network,
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

/// One cached query result and its bookkeeping.
#[derive(Debug, Clone)]
pub struct QueryEntry {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub value: Option<ProductOutput>,
    pub error: Option<ErrorInfo>,
    /// Epoch of the request that produced (or is producing) this entry.
    /// Only moves forward.
    pub requested_at: Epoch,
    subscribers: HashSet<Uuid>,
}

impl QueryEntry {
    fn idle(key: QueryKey) -> Self {
        Self {
            key,
            status: QueryStatus::Idle,
            value: None,
            error: None,
            requested_at: 0,
            subscribers: HashSet::new(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Proof of interest in one key; pass back to [`QueryStore::unsubscribe`].
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: Uuid,
    pub key: QueryKey,
}

/// Process-wide keyed cache of query results.
///
/// Mutations happen under a single write lock; completion of spawned
/// fetches re-enters through [`QueryStore::complete`], which applies a
/// resolution only when its epoch still matches the entry's latest request.
pub struct QueryStore {
    entries: RwLock<HashMap<QueryKey, QueryEntry>>,
    events: Arc<EventBus>,
}

impl QueryStore {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Register interest in `key`.
    ///
    /// An existing entry is reused whatever its status; `fetch` is spawned
    /// only when the entry is Idle, so there is at most one in-flight
    /// request per distinct key and a Failure entry stays failed until the
    /// key changes or it is explicitly invalidated.
    pub fn subscribe<F>(self: &Arc<Self>, key: QueryKey, fetch: F) -> SubscriptionHandle
    where
        F: Future<Output = Result<ProductOutput, ClientError>> + Send + 'static,
    {
        let handle = SubscriptionHandle {
            id: Uuid::new_v4(),
            key: key.clone(),
        };

        let spawn_epoch = {
            let mut entries = lock::write(&self.entries, SOURCE, "subscribe");
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| QueryEntry::idle(key.clone()));
            entry.subscribers.insert(handle.id);

            match entry.status {
                QueryStatus::Idle => {
                    let epoch = self.events.next_epoch();
                    entry.status = QueryStatus::Loading;
                    entry.error = None;
                    entry.requested_at = epoch;
                    counter!(METRIC_CACHE_MISS).increment(1);
                    Some(epoch)
                }
                QueryStatus::Loading | QueryStatus::Success | QueryStatus::Failure => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    None
                }
            }
        };

        if let Some(epoch) = spawn_epoch {
            debug!(key = %key, epoch, "Query fetch started");
            let store = Arc::clone(self);
            tokio::spawn(async move {
                let result = fetch.await;
                store.complete(&key, epoch, result);
            });
        }

        handle
    }

    /// Apply a fetch resolution to the entry it was started for.
    ///
    /// Dropped when the entry is gone, has been re-requested under a newer
    /// epoch, or is no longer Loading; `requested_at` never moves backward.
    pub(crate) fn complete(
        &self,
        key: &QueryKey,
        epoch: Epoch,
        result: Result<ProductOutput, ClientError>,
    ) {
        let event = {
            let mut entries = lock::write(&self.entries, SOURCE, "complete");
            let Some(entry) = entries.get_mut(key) else {
                counter!(METRIC_STALE_DROPPED).increment(1);
                debug!(key = %key, epoch, "Dropped resolution for evicted entry");
                return;
            };
            if entry.status != QueryStatus::Loading || entry.requested_at != epoch {
                counter!(METRIC_STALE_DROPPED).increment(1);
                warn!(
                    key = %key,
                    resolution_epoch = epoch,
                    entry_epoch = entry.requested_at,
                    "Dropped out-of-date resolution"
                );
                return;
            }

            let event = match result {
                Ok(value) => {
                    entry.status = QueryStatus::Success;
                    entry.value = Some(value);
                    entry.error = None;
                    QueryEventKind::Resolved { key: key.clone() }
                }
                Err(error) => {
                    entry.status = QueryStatus::Failure;
                    entry.error = Some(ErrorInfo::from(&error));
                    QueryEventKind::Failed { key: key.clone() }
                }
            };

            // Everyone lost interest while the fetch was in flight.
            if entry.subscribers.is_empty() {
                entries.remove(key);
                counter!(METRIC_CACHE_EVICT).increment(1);
            }
            event
        };

        self.events.publish(event);
    }

    /// Drop interest in the handle's key; the entry is evicted once the
    /// subscriber count reaches zero and no resolution is pending.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut entries = lock::write(&self.entries, SOURCE, "unsubscribe");
        if let Some(entry) = entries.get_mut(&handle.key) {
            entry.subscribers.remove(&handle.id);
            if entry.subscribers.is_empty() && entry.status != QueryStatus::Loading {
                entries.remove(&handle.key);
                counter!(METRIC_CACHE_EVICT).increment(1);
                debug!(key = %handle.key, "Query entry evicted");
            }
        }
    }

    /// Reset every entry matching `predicate` to Idle, forcing the next
    /// subscription to those keys to refetch. Returns how many matched.
    pub fn invalidate<P>(&self, predicate: P) -> usize
    where
        P: Fn(&QueryKey) -> bool,
    {
        let invalidated: Vec<QueryKey> = {
            let mut entries = lock::write(&self.entries, SOURCE, "invalidate");
            entries
                .values_mut()
                .filter(|entry| predicate(&entry.key))
                .map(|entry| {
                    entry.status = QueryStatus::Idle;
                    entry.error = None;
                    entry.key.clone()
                })
                .collect()
        };
        for key in &invalidated {
            self.events
                .publish(QueryEventKind::Invalidated { key: key.clone() });
        }
        invalidated.len()
    }

    /// Snapshot of the entry for `key`, if any.
    pub fn get(&self, key: &QueryKey) -> Option<QueryEntry> {
        lock::read(&self.entries, SOURCE, "get").get(key).cloned()
    }

    pub fn len(&self) -> usize {
        lock::read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
