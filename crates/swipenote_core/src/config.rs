//! Core runtime configuration.
//!
//! # Responsibility
//! - Describe storage location, undo grace window and logging settings.
//! - Normalize host-provided values before they reach core components.
//!
//! # Invariants
//! - The undo window is always within `MIN_UNDO_WINDOW_MS..=MAX_UNDO_WINDOW_MS`.
//! - `db_path = None` selects an in-memory database.

use crate::logging::default_log_level;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Matches the "long" snackbar duration the undo affordance is shown for.
pub const DEFAULT_UNDO_WINDOW_MS: u64 = 4_000;
pub const MIN_UNDO_WINDOW_MS: u64 = 500;
pub const MAX_UNDO_WINDOW_MS: u64 = 60_000;

/// Host-supplied configuration for [`crate::NoteService::open`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite database file. `None` keeps notes in memory.
    pub db_path: Option<PathBuf>,
    /// Grace window during which the last delete can be undone.
    pub undo_window_ms: u64,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute log directory. Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            undo_window_ms: DEFAULT_UNDO_WINDOW_MS,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Config for an on-disk database with default settings.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Effective undo grace window after clamping.
    pub fn undo_window(&self) -> Duration {
        Duration::from_millis(normalize_undo_window_ms(self.undo_window_ms))
    }
}

/// Clamps an undo window into the supported range.
pub fn normalize_undo_window_ms(value: u64) -> u64 {
    value.clamp(MIN_UNDO_WINDOW_MS, MAX_UNDO_WINDOW_MS)
}
