//! Live query subscriptions.
//!
//! # Responsibility
//! - Track subscribers (query + callback) registered on a repository.
//! - Deliver ordered snapshots to each subscriber at most once per change.
//!
//! # Invariants
//! - A subscriber never observes an older revision after a newer one.
//! - A snapshot equal to the last delivered one is not re-delivered.
//! - No registry lock is held while a callback runs, so callbacks may
//!   subscribe, unsubscribe or mutate the repository.
//! - Deliveries to one subscriber are serialized; a callback that mutates
//!   the repository receives the nested newer snapshot re-entrantly.
//! - Delivery locks assume one mutating thread per callback chain. Two
//!   threads mutating from inside callbacks of different subscribers can
//!   each hold one delivery lock while waiting on the other and deadlock.

use crate::model::note::Note;
use crate::search::query::NoteQuery;
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Registry-unique subscription id.
pub type SubscriptionId = u64;

/// Boxed change callback receiving the full ordered result.
pub type ChangeCallback = Box<dyn Fn(&[Note]) + Send + Sync>;

#[derive(Default)]
struct DeliveryState {
    last_revision: Option<u64>,
    last_result: Option<Vec<Note>>,
}

/// One registered live query.
pub(crate) struct Subscriber {
    id: SubscriptionId,
    query: NoteQuery,
    active: AtomicBool,
    state: ReentrantMutex<RefCell<DeliveryState>>,
    callback: ChangeCallback,
}

impl Subscriber {
    pub(crate) fn query(&self) -> &NoteQuery {
        &self.query
    }

    pub(crate) fn id(&self) -> SubscriptionId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Delivers `notes` computed at `revision`.
    ///
    /// Returns whether the callback ran.
    pub(crate) fn deliver(&self, revision: u64, notes: Vec<Note>) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }

        let guard = self.state.lock();
        {
            let mut state = guard.borrow_mut();
            if matches!(state.last_revision, Some(last) if revision <= last) {
                return false;
            }
            state.last_revision = Some(revision);
            if state.last_result.as_deref() == Some(notes.as_slice()) {
                return false;
            }
            state.last_result = Some(notes.clone());
        }

        // Unsubscribed while waiting for the delivery lock.
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        (self.callback)(&notes);
        true
    }
}

/// Set of live subscribers owned by one repository.
#[derive(Default)]
pub(crate) struct SubscriberRegistry {
    next_id: AtomicU64,
    subscribers: Mutex<BTreeMap<SubscriptionId, Arc<Subscriber>>>,
}

impl SubscriberRegistry {
    pub(crate) fn register(&self, query: NoteQuery, callback: ChangeCallback) -> Arc<Subscriber> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let subscriber = Arc::new(Subscriber {
            id,
            query,
            active: AtomicBool::new(true),
            state: ReentrantMutex::new(RefCell::new(DeliveryState::default())),
            callback,
        });
        self.subscribers.lock().insert(id, Arc::clone(&subscriber));
        subscriber
    }

    /// Removes a subscriber; returns `false` when it was already gone.
    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        match self.subscribers.lock().remove(&id) {
            Some(subscriber) => {
                subscriber.active.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Point-in-time copy of the current subscribers, in registration order.
    pub(crate) fn active(&self) -> Vec<Arc<Subscriber>> {
        self.subscribers.lock().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// Token returned by `subscribe`.
///
/// Dropping the handle keeps the subscription alive; call
/// [`SubscriptionHandle::unsubscribe`] to stop deliveries.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    registry: Weak<SubscriberRegistry>,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: SubscriptionId, registry: &Arc<SubscriberRegistry>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stops deliveries. Safe to call repeatedly, from any thread, and from
    /// inside the subscription's own callback.
    ///
    /// Returns `true` only for the call that actually removed it.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }

    /// Whether the subscription still receives deliveries.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.subscribers.lock().contains_key(&self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriberRegistry;
    use crate::search::query::NoteQuery;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn stale_and_unchanged_snapshots_are_skipped() {
        let registry = SubscriberRegistry::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscriber = registry.register(
            NoteQuery::all(),
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(subscriber.deliver(2, Vec::new()));
        assert!(!subscriber.deliver(1, Vec::new()));
        assert!(!subscriber.deliver(3, Vec::new()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn removed_subscriber_is_not_delivered() {
        let registry = SubscriberRegistry::default();
        let subscriber = registry.register(NoteQuery::all(), Box::new(|_| {}));
        assert!(registry.remove(subscriber.id()));
        assert!(!registry.remove(subscriber.id()));
        assert!(!subscriber.deliver(1, Vec::new()));
        assert_eq!(registry.len(), 0);
    }
}
