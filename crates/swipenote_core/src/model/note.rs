//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical persisted note and its priority scale.
//! - Provide draft/patch shapes used by insert and update paths.
//!
//! # Invariants
//! - `id` and `created_at` never change after the first insert.
//! - `modified_at` is bumped on every applied field change.
//! - `Priority` ordering is `Low < Medium < High`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Store-assigned note identity.
pub type NoteId = Uuid;

/// Ordered priority scale driving priority-sorted queries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

impl Priority {
    /// Stable lowercase label used by view-models and parsing.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Integer rank persisted in `notes.priority`; larger is more urgent.
    pub fn rank(self) -> i64 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    /// Inverse of [`Priority::rank`].
    pub fn from_rank(rank: i64) -> Option<Self> {
        match rank {
            0 => Some(Self::Low),
            1 => Some(Self::Medium),
            2 => Some(Self::High),
            _ => None,
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a priority label cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePriorityError(pub String);

impl Display for ParsePriorityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unsupported priority `{}`; expected high|medium|low",
            self.0
        )
    }
}

impl Error for ParsePriorityError {}

impl FromStr for Priority {
    type Err = ParsePriorityError;

    /// Accepts full labels and their first letter, case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Ok(Self::High),
            "medium" | "m" => Ok(Self::Medium),
            "low" | "l" => Ok(Self::Low),
            other => Err(ParsePriorityError(other.to_string())),
        }
    }
}

/// Persisted note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub priority: Priority,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds. Never earlier than `created_at`.
    pub modified_at: i64,
}

impl Note {
    /// Returns a draft carrying this note's user-editable fields.
    ///
    /// Used by undo-restore, which re-inserts the payload under a new id.
    pub fn to_draft(&self) -> NoteDraft {
        NoteDraft {
            title: self.title.clone(),
            content: self.content.clone(),
            priority: self.priority,
        }
    }

    /// Applies `patch` in place, returning whether any field was supplied.
    pub fn apply(&mut self, patch: &NotePatch, now_ms: i64) -> bool {
        if patch.is_empty() {
            return false;
        }
        if let Some(title) = patch.title.as_ref() {
            self.title = title.clone();
        }
        if let Some(content) = patch.content.as_ref() {
            self.content = content.clone();
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        self.modified_at = now_ms.max(self.created_at);
        true
    }
}

/// Insert-side note shape. Has no identity until persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub priority: Priority,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>, priority: Priority) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            priority,
        }
    }
}

/// Partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub priority: Option<Priority>,
}

impl NotePatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.priority.is_none()
    }
}
