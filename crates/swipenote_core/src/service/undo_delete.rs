//! Undo-delete coordinator.
//!
//! # Responsibility
//! - Delete a note while holding its payload for a bounded grace window.
//! - Restore the held payload as a new note on explicit undo.
//!
//! # Invariants
//! - At most one note is pending restore; a newer delete discards the older
//!   pending note, which stays deleted.
//! - Every pending entry owns one single-shot timer; consuming or replacing
//!   the entry cancels its timer.
//! - A timer only clears the slot for the generation that armed it.
//! - Pending state is in memory only and is lost on process exit.

use crate::model::note::{Note, NoteId};
use crate::repo::note_repo::NoteRepository;
use crate::repo::note_store::{NoteStore, RepoError, SqliteNoteStore};
use log::{error, info, warn};
use parking_lot::Mutex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

const TIMER_THREAD_NAME: &str = "swipenote-undo-timer";

/// Undo-path error.
#[derive(Debug)]
pub enum UndoError {
    /// The slot is empty or its grace window has elapsed.
    NoPendingDelete,
    /// Re-inserting the held note failed; the note stays pending.
    Repo(RepoError),
}

impl Display for UndoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPendingDelete => write!(f, "no deleted note is pending restore"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for UndoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NoPendingDelete => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for UndoError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

struct PendingRestore {
    note: Note,
    generation: u64,
    expires_at: Instant,
    // Dropping the sender wakes and ends the timer thread.
    _cancel: Sender<()>,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<PendingRestore>,
}

/// Single-slot "delete with undo" state machine over a repository.
pub struct UndoDeleteCoordinator<S: NoteStore = SqliteNoteStore> {
    repo: Arc<NoteRepository<S>>,
    window: Duration,
    slot: Arc<Mutex<Slot>>,
}

impl<S: NoteStore> UndoDeleteCoordinator<S> {
    pub fn new(repo: Arc<NoteRepository<S>>, window: Duration) -> Self {
        Self {
            repo,
            window,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Grace window applied to each delete.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Deletes `id` and holds its payload for the grace window.
    ///
    /// A failed delete leaves the slot untouched.
    pub fn delete(&self, id: NoteId) -> Result<(), RepoError> {
        let note = self.repo.take(id)?;
        self.arm(note, false);
        Ok(())
    }

    /// Re-inserts the pending note under a new id.
    ///
    /// # Errors
    /// - `NoPendingDelete` when nothing is held or the window elapsed.
    /// - `Repo` when the insert fails; the note is then re-armed with a fresh
    ///   window unless a newer delete took the slot meanwhile.
    pub fn undo_last_delete(&self) -> Result<NoteId, UndoError> {
        let pending = {
            let mut slot = self.slot.lock();
            match slot.pending.take() {
                Some(pending) if pending.expires_at > Instant::now() => pending,
                Some(expired) => {
                    info!(
                        "event=undo_restore module=undo status=expired note_id={} generation={}",
                        expired.note.id, expired.generation
                    );
                    return Err(UndoError::NoPendingDelete);
                }
                None => return Err(UndoError::NoPendingDelete),
            }
        };

        let PendingRestore {
            note,
            generation,
            _cancel: cancel,
            ..
        } = pending;
        drop(cancel);
        match self.repo.insert(&note.to_draft()) {
            Ok(restored_id) => {
                info!(
                    "event=undo_restore module=undo status=ok note_id={} restored_id={restored_id} generation={generation}",
                    note.id
                );
                Ok(restored_id)
            }
            Err(err) => {
                error!(
                    "event=undo_restore module=undo status=error note_id={} generation={generation} error={err}",
                    note.id
                );
                self.arm(note, true);
                Err(UndoError::Repo(err))
            }
        }
    }

    /// Payload currently pending restore, if its window is still open.
    pub fn pending(&self) -> Option<Note> {
        let slot = self.slot.lock();
        slot.pending
            .as_ref()
            .filter(|pending| pending.expires_at > Instant::now())
            .map(|pending| pending.note.clone())
    }

    pub fn has_pending(&self) -> bool {
        self.pending().is_some()
    }

    /// Drops the pending note without restoring it.
    ///
    /// Returns whether anything was discarded.
    pub fn dismiss(&self) -> bool {
        let dismissed = self.slot.lock().pending.take();
        match dismissed {
            Some(pending) => {
                info!(
                    "event=undo_discard module=undo status=ok reason=dismissed note_id={} generation={}",
                    pending.note.id, pending.generation
                );
                true
            }
            None => false,
        }
    }

    fn arm(&self, note: Note, only_if_empty: bool) {
        let (cancel_tx, cancel_rx) = mpsc::channel();
        let (generation, superseded) = {
            let mut slot = self.slot.lock();
            if only_if_empty && slot.pending.is_some() {
                warn!(
                    "event=undo_arm module=undo status=skipped reason=slot_taken note_id={}",
                    note.id
                );
                return;
            }
            slot.generation += 1;
            let generation = slot.generation;
            let superseded = slot.pending.replace(PendingRestore {
                note,
                generation,
                expires_at: Instant::now() + self.window,
                _cancel: cancel_tx,
            });
            (generation, superseded)
        };

        if let Some(previous) = superseded {
            info!(
                "event=undo_discard module=undo status=ok reason=superseded note_id={} generation={}",
                previous.note.id, previous.generation
            );
        }

        spawn_expiry_timer(Arc::downgrade(&self.slot), generation, self.window, cancel_rx);
        info!(
            "event=undo_arm module=undo status=ok generation={generation} window_ms={}",
            self.window.as_millis()
        );
    }
}

fn spawn_expiry_timer(
    slot: Weak<Mutex<Slot>>,
    generation: u64,
    window: Duration,
    cancel: mpsc::Receiver<()>,
) {
    let spawned = thread::Builder::new()
        .name(TIMER_THREAD_NAME.to_string())
        .spawn(move || {
            if !matches!(cancel.recv_timeout(window), Err(RecvTimeoutError::Timeout)) {
                return;
            }
            let Some(slot) = slot.upgrade() else {
                return;
            };
            let mut slot = slot.lock();
            let current = slot.pending.as_ref().map(|pending| pending.generation);
            if current == Some(generation) {
                if let Some(expired) = slot.pending.take() {
                    info!(
                        "event=undo_expire module=undo status=ok note_id={} generation={generation}",
                        expired.note.id
                    );
                }
            }
        });

    // The slot still expires lazily through `expires_at`.
    if let Err(err) = spawned {
        warn!(
            "event=undo_timer module=undo status=error generation={generation} error={err}"
        );
    }
}
