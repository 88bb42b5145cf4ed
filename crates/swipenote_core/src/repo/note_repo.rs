//! Live note repository.
//!
//! # Responsibility
//! - Serialize every store mutation and query evaluation behind one lock.
//! - Turn one-shot store queries into live subscriptions.
//! - Notify every subscriber whose result changed before a mutating call
//!   returns.
//!
//! # Invariants
//! - Snapshots are computed under the store lock, so none reflects a
//!   partial mutation.
//! - Failed mutations bump no revision and notify nobody.
//! - A committed mutation whose live queries cannot be re-evaluated, even
//!   after one retry outside the lock, fails with `RepoError::NotifyFailed`.
//! - Callbacks run after the store lock is released.

use crate::model::note::{Note, NoteDraft, NoteId, NotePatch};
use crate::repo::live_query::{Subscriber, SubscriberRegistry, SubscriptionHandle};
use crate::repo::note_store::{NoteStore, RepoError, RepoResult, SqliteNoteStore};
use crate::search::query::NoteQuery;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

type PendingDelivery = (Arc<Subscriber>, Vec<Note>);

/// Mutator-facing gateway over a [`NoteStore`] with live queries.
pub struct NoteRepository<S: NoteStore = SqliteNoteStore> {
    store: Mutex<S>,
    revision: AtomicU64,
    subscribers: Arc<SubscriberRegistry>,
}

impl<S: NoteStore> NoteRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
            revision: AtomicU64::new(0),
            subscribers: Arc::new(SubscriberRegistry::default()),
        }
    }

    /// Persists a draft and returns the store-assigned id.
    pub fn insert(&self, draft: &NoteDraft) -> RepoResult<NoteId> {
        self.mutate("note_insert", |store| store.insert(draft))
            .map(|note| note.id)
    }

    /// Applies a partial update.
    pub fn update(&self, id: NoteId, patch: &NotePatch) -> RepoResult<()> {
        self.mutate("note_update", |store| store.update(id, patch))
            .map(|_| ())
    }

    pub fn delete(&self, id: NoteId) -> RepoResult<()> {
        self.take(id).map(|_| ())
    }

    /// Deletes one note and returns the payload it had at deletion time.
    pub fn take(&self, id: NoteId) -> RepoResult<Note> {
        self.mutate("note_delete", |store| store.delete(id))
    }

    /// Deletes every note. An empty collection is a successful no-op.
    pub fn delete_all(&self) -> RepoResult<()> {
        let removed = self.mutate("note_delete_all", |store| store.delete_all())?;
        debug!("event=note_delete_all module=repo removed={removed}");
        Ok(())
    }

    pub fn get(&self, id: NoteId) -> RepoResult<Option<Note>> {
        self.store.lock().get(id)
    }

    /// One-shot evaluation of `query`.
    pub fn snapshot(&self, query: &NoteQuery) -> RepoResult<Vec<Note>> {
        self.store.lock().query(query)
    }

    /// Registers a live query.
    ///
    /// `on_change` receives the current result before this call returns and
    /// then once per mutation that changes the result.
    pub fn subscribe<F>(&self, query: NoteQuery, on_change: F) -> RepoResult<SubscriptionHandle>
    where
        F: Fn(&[Note]) + Send + Sync + 'static,
    {
        let (subscriber, revision, initial) = {
            let store = self.store.lock();
            let initial = store.query(&query)?;
            let revision = self.revision.load(Ordering::Acquire);
            let subscriber = self.subscribers.register(query, Box::new(on_change));
            (subscriber, revision, initial)
        };

        info!(
            "event=live_subscribe module=repo status=ok subscription_id={} revision={revision} rows={}",
            subscriber.id(),
            initial.len()
        );
        let handle = SubscriptionHandle::new(subscriber.id(), &self.subscribers);
        subscriber.deliver(revision, initial);
        Ok(handle)
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Monotonic count of successful mutations.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn mutate<T>(
        &self,
        event: &'static str,
        op: impl FnOnce(&mut S) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let (value, revision, pending, failed) = {
            let mut store = self.store.lock();
            let value = op(&mut *store).map_err(|err| {
                error!(
                    "event={event} module=repo status=error duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                err
            })?;
            let revision = self.revision.fetch_add(1, Ordering::AcqRel) + 1;
            let (pending, failed) = self.evaluate_subscribers(&*store, revision);
            (value, revision, pending, failed)
        };

        let mut notified = pending
            .into_iter()
            .map(|(subscriber, notes)| subscriber.deliver(revision, notes))
            .filter(|delivered| *delivered)
            .count();
        if !failed.is_empty() {
            notified += self.refresh_failed(event, revision, failed)?;
        }
        info!(
            "event={event} module=repo status=ok revision={revision} notified={notified} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(value)
    }

    fn evaluate_subscribers(
        &self,
        store: &S,
        revision: u64,
    ) -> (Vec<PendingDelivery>, Vec<Arc<Subscriber>>) {
        let mut results: HashMap<NoteQuery, Vec<Note>> = HashMap::new();
        let mut pending = Vec::new();
        let mut failed = Vec::new();
        for subscriber in self.subscribers.active() {
            let query = subscriber.query();
            let notes = match results.get(query) {
                Some(notes) => notes.clone(),
                None => match store.query(query) {
                    Ok(notes) => {
                        results.insert(query.clone(), notes.clone());
                        notes
                    }
                    Err(err) => {
                        warn!(
                            "event=live_evaluate module=repo status=retry subscription_id={} revision={revision} error={err}",
                            subscriber.id()
                        );
                        failed.push(subscriber);
                        continue;
                    }
                },
            };
            pending.push((subscriber, notes));
        }
        (pending, failed)
    }

    /// Re-evaluates subscribers whose query failed under the mutation lock.
    ///
    /// Each retry reads at the then-current revision. Subscribers that fail
    /// again keep their previous result and surface as `NotifyFailed`.
    fn refresh_failed(
        &self,
        event: &'static str,
        revision: u64,
        failed: Vec<Arc<Subscriber>>,
    ) -> RepoResult<usize> {
        let mut notified = 0;
        let mut still_failed = 0;
        let mut last_error = None;
        for subscriber in failed {
            if !subscriber.is_active() {
                continue;
            }
            let retried = {
                let store = self.store.lock();
                store
                    .query(subscriber.query())
                    .map(|notes| (self.revision.load(Ordering::Acquire), notes))
            };
            match retried {
                Ok((current, notes)) => {
                    if subscriber.deliver(current, notes) {
                        notified += 1;
                    }
                }
                Err(err) => {
                    error!(
                        "event=live_evaluate module=repo status=error subscription_id={} revision={revision} error={err}",
                        subscriber.id()
                    );
                    still_failed += 1;
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            None => Ok(notified),
            Some(source) => {
                error!(
                    "event={event} module=repo status=partial revision={revision} notified={notified} failed={still_failed}"
                );
                Err(RepoError::NotifyFailed {
                    revision,
                    failed: still_failed,
                    source: Box::new(source),
                })
            }
        }
    }
}
