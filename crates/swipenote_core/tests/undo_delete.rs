use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use swipenote_core::db::open_db_in_memory;
use swipenote_core::{
    ManualClock, Note, NoteDraft, NoteId, NotePatch, NoteQuery, NoteRepository, NoteService,
    NoteServiceError, NoteStore, Priority, RepoError, RepoResult, SqliteNoteStore,
    UndoDeleteCoordinator, UndoError,
};

const LONG_WINDOW: Duration = Duration::from_secs(30);
const SHORT_WINDOW: Duration = Duration::from_millis(50);

fn repo() -> Arc<NoteRepository> {
    let clock = Arc::new(ManualClock::new(1_000, 10));
    let store = SqliteNoteStore::with_clock(open_db_in_memory().unwrap(), clock).unwrap();
    Arc::new(NoteRepository::new(store))
}

fn service(window: Duration) -> NoteService {
    NoteService::new(repo(), window)
}

#[test]
fn undo_restores_deleted_note_under_a_new_identity() {
    let service = service(LONG_WINDOW);
    let deliveries: Arc<Mutex<Vec<Vec<Note>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&deliveries);
    service
        .subscribe(NoteQuery::all(), move |notes| sink.lock().push(notes.to_vec()))
        .unwrap();

    let id = service
        .insert(&NoteDraft::new("A", "body", Priority::High))
        .unwrap();
    service.delete(id).unwrap();
    assert!(service.list(&NoteQuery::all()).unwrap().is_empty());
    assert_eq!(service.pending_undo().map(|note| note.id), Some(id));

    let restored_id = service.undo_last_delete().unwrap();
    let latest = deliveries.lock().last().cloned().unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].id, restored_id);
    assert_eq!(latest[0].title, "A");
    assert_eq!(latest[0].content, "body");
    assert_eq!(latest[0].priority, Priority::High);
    assert_ne!(restored_id, id);

    assert!(matches!(
        service.undo_last_delete(),
        Err(NoteServiceError::NoPendingDelete)
    ));
    assert!(service.pending_undo().is_none());
}

#[test]
fn undo_after_grace_window_fails_and_restores_nothing() {
    let service = service(SHORT_WINDOW);
    let id = service
        .insert(&NoteDraft::new("A", "", Priority::Low))
        .unwrap();
    service.delete(id).unwrap();

    thread::sleep(SHORT_WINDOW * 4);

    assert!(service.pending_undo().is_none());
    assert!(matches!(
        service.undo_last_delete(),
        Err(NoteServiceError::NoPendingDelete)
    ));
    assert!(service.list(&NoteQuery::all()).unwrap().is_empty());
}

#[test]
fn undo_with_nothing_deleted_fails() {
    let service = service(LONG_WINDOW);
    assert!(matches!(
        service.undo_last_delete(),
        Err(NoteServiceError::NoPendingDelete)
    ));
}

#[test]
fn second_delete_discards_first_pending_note() {
    let service = service(LONG_WINDOW);
    let first = service
        .insert(&NoteDraft::new("first", "", Priority::Low))
        .unwrap();
    let second = service
        .insert(&NoteDraft::new("second", "", Priority::Low))
        .unwrap();

    service.delete(first).unwrap();
    service.delete(second).unwrap();
    assert_eq!(service.pending_undo().map(|note| note.id), Some(second));

    service.undo_last_delete().unwrap();
    let remaining = service.list(&NoteQuery::all()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "second");
    assert!(service.undo_last_delete().is_err());
}

#[test]
fn stale_timer_does_not_clear_newer_pending_note() {
    let repo = repo();
    let coordinator = UndoDeleteCoordinator::new(Arc::clone(&repo), Duration::from_millis(150));
    let first = repo
        .insert(&NoteDraft::new("first", "", Priority::Low))
        .unwrap();
    let second = repo
        .insert(&NoteDraft::new("second", "", Priority::Low))
        .unwrap();

    coordinator.delete(first).unwrap();
    thread::sleep(Duration::from_millis(100));
    coordinator.delete(second).unwrap();
    // First entry's deadline has passed; the second is still inside its window.
    thread::sleep(Duration::from_millis(80));

    assert_eq!(coordinator.pending().map(|note| note.id), Some(second));
    coordinator.undo_last_delete().unwrap();
    let titles: Vec<_> = repo
        .snapshot(&NoteQuery::all())
        .unwrap()
        .into_iter()
        .map(|note| note.title)
        .collect();
    assert_eq!(titles, ["second"]);
}

#[test]
fn failed_delete_does_not_arm_undo() {
    let service = service(LONG_WINDOW);
    let id = service
        .insert(&NoteDraft::new("A", "", Priority::Low))
        .unwrap();
    service.delete(id).unwrap();
    service.undo_last_delete().unwrap();

    assert!(matches!(
        service.delete(id),
        Err(NoteServiceError::NoteNotFound(missing)) if missing == id
    ));
    assert!(service.pending_undo().is_none());
}

/// Store whose inserts can be switched to fail, to exercise restore errors.
struct FlakyStore {
    inner: SqliteNoteStore,
    fail_inserts: Arc<AtomicBool>,
}

impl NoteStore for FlakyStore {
    fn insert(&mut self, draft: &NoteDraft) -> RepoResult<Note> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RepoError::InvalidData("simulated disk full".to_string()));
        }
        self.inner.insert(draft)
    }

    fn update(&mut self, id: NoteId, patch: &NotePatch) -> RepoResult<Note> {
        self.inner.update(id, patch)
    }

    fn delete(&mut self, id: NoteId) -> RepoResult<Note> {
        self.inner.delete(id)
    }

    fn delete_all(&mut self) -> RepoResult<usize> {
        self.inner.delete_all()
    }

    fn get(&self, id: NoteId) -> RepoResult<Option<Note>> {
        self.inner.get(id)
    }

    fn query(&self, query: &NoteQuery) -> RepoResult<Vec<Note>> {
        self.inner.query(query)
    }
}

#[test]
fn failed_restore_keeps_note_pending_for_retry() {
    let fail_inserts = Arc::new(AtomicBool::new(false));
    let store = FlakyStore {
        inner: SqliteNoteStore::try_new(open_db_in_memory().unwrap()).unwrap(),
        fail_inserts: Arc::clone(&fail_inserts),
    };
    let service = NoteService::new(Arc::new(NoteRepository::new(store)), LONG_WINDOW);
    let id = service
        .insert(&NoteDraft::new("keep", "", Priority::Medium))
        .unwrap();
    service.delete(id).unwrap();

    fail_inserts.store(true, Ordering::SeqCst);
    assert!(matches!(
        service.undo_last_delete(),
        Err(NoteServiceError::Persistence(_))
    ));
    assert_eq!(
        service.pending_undo().map(|note| note.title),
        Some("keep".to_string())
    );

    fail_inserts.store(false, Ordering::SeqCst);
    service.undo_last_delete().unwrap();
    assert_eq!(service.list(&NoteQuery::all()).unwrap().len(), 1);
}

#[test]
fn dismiss_discards_pending_note() {
    let repo = repo();
    let coordinator = UndoDeleteCoordinator::new(Arc::clone(&repo), LONG_WINDOW);
    let id = repo
        .insert(&NoteDraft::new("gone", "", Priority::Low))
        .unwrap();
    coordinator.delete(id).unwrap();

    assert!(coordinator.has_pending());
    assert!(coordinator.dismiss());
    assert!(!coordinator.dismiss());
    assert!(matches!(
        coordinator.undo_last_delete(),
        Err(UndoError::NoPendingDelete)
    ));
    assert!(repo.snapshot(&NoteQuery::all()).unwrap().is_empty());
}
