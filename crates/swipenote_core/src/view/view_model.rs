//! Note view-models for list rendering.
//!
//! # Invariants
//! - `preview` is single-line, whitespace-normalized and at most
//!   `PREVIEW_MAX_CHARS` characters (plus an ellipsis when truncated).

use crate::model::note::{Note, NoteId, Priority};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const PREVIEW_MAX_CHARS: usize = 100;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// One list row as the rendering surface consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteViewModel {
    pub id: NoteId,
    pub title: String,
    pub preview: String,
    pub priority: Priority,
    pub modified_at: i64,
}

impl NoteViewModel {
    pub fn from_note(note: &Note) -> Self {
        Self {
            id: note.id,
            title: note.title.clone(),
            preview: derive_preview(&note.content),
            priority: note.priority,
            modified_at: note.modified_at,
        }
    }

    /// Stable label used for the priority chip.
    pub fn priority_label(&self) -> &'static str {
        self.priority.as_str()
    }
}

/// Projects an ordered live result into view-models, keeping order.
pub fn present(notes: &[Note]) -> Vec<NoteViewModel> {
    notes.iter().map(NoteViewModel::from_note).collect()
}

/// Text for the transient "undo" banner shown after a swipe delete.
pub fn deleted_banner_text(note: &Note) -> String {
    format!("Deleted: '{}'", note.title)
}

/// Collapses whitespace and caps the preview length.
pub fn derive_preview(content: &str) -> String {
    let normalized = WHITESPACE_RE.replace_all(content.trim(), " ");
    if normalized.chars().count() <= PREVIEW_MAX_CHARS {
        return normalized.into_owned();
    }
    let mut preview: String = normalized.chars().take(PREVIEW_MAX_CHARS).collect();
    preview.push('…');
    preview
}
