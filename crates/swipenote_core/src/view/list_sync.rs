//! List reconciliation between rendered rows and live snapshots.
//!
//! # Responsibility
//! - Compute the remove/move/insert/update operations that turn the
//!   previously rendered row sequence into a new one.
//! - Bind a rendered list to a live repository query.
//!
//! # Invariants
//! - Changes are applied in order with `Vec::remove`/`Vec::insert`
//!   semantics; applying them to the old rows yields the new rows.
//! - Removes come first (descending index), then moves, then inserts
//!   (ascending index), then in-place updates at final indices.
//! - The move count equals the number of kept rows outside the longest
//!   common subsequence of kept ids, which is minimal.

use crate::model::note::{Note, NoteId};
use crate::repo::live_query::SubscriptionHandle;
use crate::repo::note_repo::NoteRepository;
use crate::repo::note_store::{NoteStore, RepoResult};
use crate::search::query::NoteQuery;
use crate::view::view_model::{present, NoteViewModel};
use log::debug;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One row-level change for the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChange {
    Remove { index: usize },
    Move { from: usize, to: usize },
    Insert { index: usize, row: NoteViewModel },
    Update { index: usize, row: NoteViewModel },
}

impl ListChange {
    /// Applies this change to `rows`.
    pub fn apply_to(&self, rows: &mut Vec<NoteViewModel>) {
        match self {
            Self::Remove { index } => {
                rows.remove(*index);
            }
            Self::Move { from, to } => {
                let row = rows.remove(*from);
                rows.insert(*to, row);
            }
            Self::Insert { index, row } => rows.insert(*index, row.clone()),
            Self::Update { index, row } => rows[*index] = row.clone(),
        }
    }
}

/// Computes the changes turning `old` into `new`. Rows are keyed by id.
pub fn diff_rows(old: &[NoteViewModel], new: &[NoteViewModel]) -> Vec<ListChange> {
    let old_ids: HashSet<NoteId> = old.iter().map(|row| row.id).collect();
    let new_ids: HashSet<NoteId> = new.iter().map(|row| row.id).collect();
    let mut changes = Vec::new();

    let mut working: Vec<NoteId> = old.iter().map(|row| row.id).collect();
    for index in (0..working.len()).rev() {
        if !new_ids.contains(&working[index]) {
            working.remove(index);
            changes.push(ListChange::Remove { index });
        }
    }

    let target: Vec<NoteId> = new
        .iter()
        .map(|row| row.id)
        .filter(|id| old_ids.contains(id))
        .collect();
    let stationary = longest_common_ids(&working, &target);
    for (position, id) in target.iter().enumerate() {
        if stationary.contains(id) {
            continue;
        }
        let Some(from) = index_of(&working, id) else {
            continue;
        };
        working.remove(from);
        // Settled rows keep target-relative order, so the row goes right
        // after its settled predecessor.
        let to = match position.checked_sub(1) {
            Some(previous) => index_of(&working, &target[previous]).map_or(0, |index| index + 1),
            None => 0,
        };
        working.insert(to, *id);
        if from != to {
            changes.push(ListChange::Move { from, to });
        }
    }

    for (index, row) in new.iter().enumerate() {
        if !old_ids.contains(&row.id) {
            changes.push(ListChange::Insert {
                index,
                row: row.clone(),
            });
        }
    }

    let old_rows: HashMap<NoteId, &NoteViewModel> = old.iter().map(|row| (row.id, row)).collect();
    for (index, row) in new.iter().enumerate() {
        if old_rows.get(&row.id).is_some_and(|previous| *previous != row) {
            changes.push(ListChange::Update {
                index,
                row: row.clone(),
            });
        }
    }

    changes
}

/// Holds the rows currently shown and reconciles them with new snapshots.
#[derive(Debug, Default)]
pub struct ListSyncController {
    rendered: Vec<NoteViewModel>,
}

impl ListSyncController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> &[NoteViewModel] {
        &self.rendered
    }

    /// Replaces the rendered rows with `notes` and returns the changes.
    pub fn reconcile(&mut self, notes: &[Note]) -> Vec<ListChange> {
        let next = present(notes);
        let changes = diff_rows(&self.rendered, &next);
        self.rendered = next;
        changes
    }

    /// Subscribes a controller to `query` and forwards each non-empty
    /// change set to `sink`, starting with the initial snapshot.
    pub fn attach<S, F>(
        repo: &NoteRepository<S>,
        query: NoteQuery,
        sink: F,
    ) -> RepoResult<(Arc<Mutex<Self>>, SubscriptionHandle)>
    where
        S: NoteStore,
        F: Fn(&[ListChange]) + Send + Sync + 'static,
    {
        let controller = Arc::new(Mutex::new(Self::new()));
        let bound = Arc::clone(&controller);
        let handle = repo.subscribe(query, move |notes| {
            let changes = bound.lock().reconcile(notes);
            if changes.is_empty() {
                return;
            }
            debug!(
                "event=list_sync module=view status=ok changes={} rows={}",
                changes.len(),
                notes.len()
            );
            sink(&changes);
        })?;
        Ok((controller, handle))
    }
}

fn index_of(ids: &[NoteId], id: &NoteId) -> Option<usize> {
    ids.iter().position(|current| current == id)
}

fn longest_common_ids(left: &[NoteId], right: &[NoteId]) -> HashSet<NoteId> {
    let width = right.len() + 1;
    let mut table = vec![0_u32; (left.len() + 1) * width];
    for i in (0..left.len()).rev() {
        for j in (0..right.len()).rev() {
            table[i * width + j] = if left[i] == right[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut common = HashSet::new();
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        if left[i] == right[j] {
            common.insert(left[i]);
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    common
}

#[cfg(test)]
mod tests {
    use super::{diff_rows, ListChange};
    use crate::model::note::Priority;
    use crate::view::view_model::NoteViewModel;
    use uuid::Uuid;

    fn row(title: &str) -> NoteViewModel {
        NoteViewModel {
            id: Uuid::new_v4(),
            title: title.to_string(),
            preview: String::new(),
            priority: Priority::Low,
            modified_at: 0,
        }
    }

    fn apply(old: &[NoteViewModel], changes: &[ListChange]) -> Vec<NoteViewModel> {
        let mut rows = old.to_vec();
        for change in changes {
            change.apply_to(&mut rows);
        }
        rows
    }

    #[test]
    fn moving_first_row_to_end_is_one_move() {
        let old: Vec<_> = ["a", "b", "c", "d"].into_iter().map(row).collect();
        let new = vec![
            old[1].clone(),
            old[2].clone(),
            old[3].clone(),
            old[0].clone(),
        ];
        let changes = diff_rows(&old, &new);
        assert_eq!(changes, vec![ListChange::Move { from: 0, to: 3 }]);
        assert_eq!(apply(&old, &changes), new);
    }

    #[test]
    fn mixed_remove_insert_move_and_update_reproduce_new_rows() {
        let old: Vec<_> = ["a", "b", "c", "d", "e"].into_iter().map(row).collect();
        let mut edited = old[2].clone();
        edited.title = "c2".to_string();
        let fresh = row("f");
        let new = vec![
            old[4].clone(),
            fresh.clone(),
            old[0].clone(),
            edited.clone(),
            old[1].clone(),
        ];

        let changes = diff_rows(&old, &new);
        assert_eq!(apply(&old, &changes), new);
        assert!(changes.contains(&ListChange::Remove { index: 3 }));
        assert!(changes.contains(&ListChange::Insert {
            index: 1,
            row: fresh
        }));
        assert!(changes.contains(&ListChange::Update {
            index: 3,
            row: edited
        }));
        let moves = changes
            .iter()
            .filter(|change| matches!(change, ListChange::Move { .. }))
            .count();
        // Kept ids a,b,c,e become e,a,c,b: longest common run is two long.
        assert_eq!(moves, 2);
    }

    #[test]
    fn reversal_needs_len_minus_one_moves() {
        let old: Vec<_> = ["a", "b", "c", "d"].into_iter().map(row).collect();
        let new: Vec<_> = old.iter().rev().cloned().collect();
        let changes = diff_rows(&old, &new);
        assert_eq!(changes.len(), 3);
        assert_eq!(apply(&old, &changes), new);
    }

    #[test]
    fn identical_rows_produce_no_changes() {
        let old: Vec<_> = ["a", "b"].into_iter().map(row).collect();
        assert!(diff_rows(&old, &old).is_empty());
        assert!(diff_rows(&[], &[]).is_empty());
    }
}
