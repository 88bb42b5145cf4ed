//! Core domain logic for SwipeNote.
//! Owns the note store, live list queries and the swipe-delete undo flow.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;
pub mod view;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoreConfig;
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{Note, NoteDraft, NoteId, NotePatch, ParsePriorityError, Priority};
pub use repo::live_query::{SubscriptionHandle, SubscriptionId};
pub use repo::note_repo::NoteRepository;
pub use repo::note_store::{NoteStore, RepoError, RepoResult, SqliteNoteStore};
pub use search::query::{NoteOrder, NoteQuery};
pub use service::note_service::{NoteService, NoteServiceError, ServiceResult};
pub use service::undo_delete::{UndoDeleteCoordinator, UndoError};
pub use view::list_sync::{diff_rows, ListChange, ListSyncController};
pub use view::view_model::{deleted_banner_text, present, NoteViewModel};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
