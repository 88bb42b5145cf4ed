//! Note query shapes, filter predicate and ordering contract.
//!
//! # Invariants
//! - Every ordering ends with insertion order, so results are total and
//!   stable until the next mutation.
//! - An empty (or whitespace-only) filter matches every note.
//! - Filter matching is Unicode case-insensitive containment against
//!   `title` or `content`.

use crate::model::note::Note;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Result ordering for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteOrder {
    /// Insertion order.
    #[default]
    Insertion,
    /// `High` first; ties by `modified_at DESC`, then insertion order.
    PriorityHighFirst,
    /// `Low` first; ties by `modified_at DESC`, then insertion order.
    PriorityLowFirst,
}

impl NoteOrder {
    /// SQL `ORDER BY` body over the `notes` table.
    pub fn order_by_sql(self) -> &'static str {
        match self {
            Self::Insertion => "seq ASC",
            Self::PriorityHighFirst => "priority DESC, modified_at DESC, seq ASC",
            Self::PriorityLowFirst => "priority ASC, modified_at DESC, seq ASC",
        }
    }
}

/// One list request: optional substring filter plus ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NoteQuery {
    /// Normalized (trimmed, whitespace-collapsed, lowercased) needle.
    filter: Option<String>,
    pub order: NoteOrder,
}

impl NoteQuery {
    /// Every note in insertion order.
    pub fn all() -> Self {
        Self::default()
    }

    /// Notes whose title or content contains `text`, in insertion order.
    pub fn search(text: &str) -> Self {
        Self::all().with_filter(text)
    }

    /// Every note sorted by priority.
    pub fn by_priority(high_first: bool) -> Self {
        let order = if high_first {
            NoteOrder::PriorityHighFirst
        } else {
            NoteOrder::PriorityLowFirst
        };
        Self::all().with_order(order)
    }

    pub fn with_filter(mut self, text: &str) -> Self {
        self.filter = normalize_search_text(text);
        self
    }

    pub fn with_order(mut self, order: NoteOrder) -> Self {
        self.order = order;
        self
    }

    /// Normalized filter needle, if any.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Returns whether `note` satisfies this query's predicate.
    pub fn matches(&self, note: &Note) -> bool {
        match self.filter.as_deref() {
            None => true,
            Some(needle) => {
                contains_folded(&note.title, needle) || contains_folded(&note.content, needle)
            }
        }
    }
}

/// Normalizes user search input; returns `None` when it matches everything.
pub fn normalize_search_text(text: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(text.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.to_lowercase())
    }
}

fn contains_folded(haystack: &str, needle_lower: &str) -> bool {
    let collapsed = WHITESPACE_RE.replace_all(haystack, " ");
    collapsed.to_lowercase().contains(needle_lower)
}
