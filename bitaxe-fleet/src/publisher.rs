use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::poller::MinerRecord;

/// Membership change emitted after a poll cycle
#[derive(Debug, Clone)]
pub struct FleetEvent {
    /// Addresses that entered the active set this cycle
    pub added: Vec<String>,
    /// Addresses that dropped out of the active set this cycle
    pub removed: Vec<String>,
    /// Snapshot of the full record table at cycle end
    pub records: HashMap<String, MinerRecord>,
}

/// Handle for removing a registered observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Arc<dyn Fn(&FleetEvent) + Send + Sync>;

/// Tracks the active-miner set across poll cycles and notifies
/// observers only when membership changes.
///
/// Notification is synchronous and in registration order. A panicking
/// observer is logged and skipped; it never blocks delivery to later
/// observers. Observers may see the same address added more than once
/// across reconfigurations and must treat adds as idempotent.
pub struct ChangePublisher {
    inner: Mutex<PublisherInner>,
}

struct PublisherInner {
    previous: HashSet<String>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_id: u64,
}

impl ChangePublisher {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PublisherInner {
                previous: HashSet::new(),
                observers: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Register an observer; returns a handle for [`unsubscribe`](Self::unsubscribe)
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&FleetEvent) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.observers.push((id, Arc::new(observer)));
        id
    }

    /// Remove a registered observer. Returns false if the handle was
    /// already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.observers.len();
        inner.observers.retain(|(sid, _)| *sid != id);
        inner.observers.len() != before
    }

    /// The active set as of the most recently published cycle
    pub fn active_set(&self) -> HashSet<String> {
        self.inner.lock().previous.clone()
    }

    /// Feed the result of one complete poll cycle.
    ///
    /// Observers are notified only when the active set differs from the
    /// previous cycle's; identical-membership cycles are silent.
    pub fn publish(&self, current: HashSet<String>, records: HashMap<String, MinerRecord>) {
        let mut inner = self.inner.lock();

        let mut added: Vec<String> = current.difference(&inner.previous).cloned().collect();
        let mut removed: Vec<String> = inner.previous.difference(&current).cloned().collect();
        inner.previous = current;

        if added.is_empty() && removed.is_empty() {
            return;
        }
        added.sort();
        removed.sort();

        debug!(
            added = added.len(),
            removed = removed.len(),
            "Active miner set changed"
        );

        // Snapshot the list so observers can re-enter subscribe/unsubscribe
        let observers: Vec<(SubscriptionId, Observer)> = inner.observers.clone();
        drop(inner);

        let event = FleetEvent {
            added,
            removed,
            records,
        };
        for (id, observer) in &observers {
            let observer = observer.as_ref();
            if catch_unwind(AssertUnwindSafe(|| observer(&event))).is_err() {
                warn!(subscription = id.0, "Observer panicked during notification");
            }
        }
    }
}

impl Default for ChangePublisher {
    fn default() -> Self {
        Self::new()
    }
}
