//! Note use-case service.
//!
//! # Responsibility
//! - Expose the in-process API the list screen drives: live subscriptions,
//!   insert/update, swipe delete with undo, bulk delete.
//! - Map store and undo errors onto the caller-facing error taxonomy.
//!
//! # Invariants
//! - `delete` always goes through the undo coordinator.
//! - No error returned here is fatal; callers decide whether to retry.

use crate::config::CoreConfig;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::logging::init_logging;
use crate::model::note::{Note, NoteDraft, NoteId, NotePatch};
use crate::repo::live_query::SubscriptionHandle;
use crate::repo::note_repo::NoteRepository;
use crate::repo::note_store::{NoteStore, RepoError, SqliteNoteStore};
use crate::search::query::NoteQuery;
use crate::service::undo_delete::{UndoDeleteCoordinator, UndoError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// Target note does not exist.
    NoteNotFound(NoteId),
    /// Durable storage failure.
    Persistence(RepoError),
    /// Undo requested with nothing pending.
    NoPendingDelete,
    /// Host-provided configuration was rejected.
    InvalidConfig(String),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::Persistence(err) => write!(f, "{err}"),
            Self::NoPendingDelete => write!(f, "no deleted note is pending restore"),
            Self::InvalidConfig(message) => write!(f, "invalid configuration: {message}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NoteNotFound(id),
            other => Self::Persistence(other),
        }
    }
}

impl From<UndoError> for NoteServiceError {
    fn from(value: UndoError) -> Self {
        match value {
            UndoError::NoPendingDelete => Self::NoPendingDelete,
            UndoError::Repo(err) => err.into(),
        }
    }
}

impl From<DbError> for NoteServiceError {
    fn from(value: DbError) -> Self {
        Self::Persistence(RepoError::Db(value))
    }
}

pub type ServiceResult<T> = Result<T, NoteServiceError>;

/// Note service facade over the live repository and undo coordinator.
pub struct NoteService<S: NoteStore = SqliteNoteStore> {
    repo: Arc<NoteRepository<S>>,
    undo: UndoDeleteCoordinator<S>,
}

impl NoteService<SqliteNoteStore> {
    /// Wires logging, storage and undo from host configuration.
    ///
    /// # Errors
    /// - `InvalidConfig` when logging cannot be initialized.
    /// - `Persistence` when the database cannot be opened or migrated.
    pub fn open(config: &CoreConfig) -> ServiceResult<Self> {
        if let Some(log_dir) = config.log_dir.as_ref() {
            let log_dir = log_dir.to_str().ok_or_else(|| {
                NoteServiceError::InvalidConfig("log_dir must be valid UTF-8".to_string())
            })?;
            init_logging(config.log_level.as_str(), log_dir)
                .map_err(NoteServiceError::InvalidConfig)?;
        }

        let conn = match config.db_path.as_ref() {
            Some(path) => open_db(path)?,
            None => open_db_in_memory()?,
        };
        let store = SqliteNoteStore::try_new(conn)?;
        Ok(Self::new(
            Arc::new(NoteRepository::new(store)),
            config.undo_window(),
        ))
    }
}

impl<S: NoteStore> NoteService<S> {
    /// Creates a service over an existing repository.
    pub fn new(repo: Arc<NoteRepository<S>>, undo_window: Duration) -> Self {
        let undo = UndoDeleteCoordinator::new(Arc::clone(&repo), undo_window);
        Self { repo, undo }
    }

    /// Shared repository handle for other consumers.
    pub fn repository(&self) -> &Arc<NoteRepository<S>> {
        &self.repo
    }

    pub fn undo_coordinator(&self) -> &UndoDeleteCoordinator<S> {
        &self.undo
    }

    /// Registers a live query; see [`NoteRepository::subscribe`].
    pub fn subscribe<F>(&self, query: NoteQuery, on_change: F) -> ServiceResult<SubscriptionHandle>
    where
        F: Fn(&[Note]) + Send + Sync + 'static,
    {
        Ok(self.repo.subscribe(query, on_change)?)
    }

    pub fn insert(&self, draft: &NoteDraft) -> ServiceResult<NoteId> {
        Ok(self.repo.insert(draft)?)
    }

    pub fn update(&self, id: NoteId, patch: &NotePatch) -> ServiceResult<()> {
        Ok(self.repo.update(id, patch)?)
    }

    /// Deletes a note and arms undo for it.
    pub fn delete(&self, id: NoteId) -> ServiceResult<()> {
        Ok(self.undo.delete(id)?)
    }

    /// Restores the most recently deleted note under a new id.
    pub fn undo_last_delete(&self) -> ServiceResult<NoteId> {
        Ok(self.undo.undo_last_delete()?)
    }

    /// Note currently restorable by [`NoteService::undo_last_delete`].
    pub fn pending_undo(&self) -> Option<Note> {
        self.undo.pending()
    }

    /// Deletes every note. Pending undo state is left as is.
    pub fn delete_all(&self) -> ServiceResult<()> {
        Ok(self.repo.delete_all()?)
    }

    pub fn get(&self, id: NoteId) -> ServiceResult<Option<Note>> {
        Ok(self.repo.get(id)?)
    }

    /// One-shot list evaluation.
    pub fn list(&self, query: &NoteQuery) -> ServiceResult<Vec<Note>> {
        Ok(self.repo.snapshot(query)?)
    }
}
