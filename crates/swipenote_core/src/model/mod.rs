//! Domain model for prioritized short notes.
//!
//! # Responsibility
//! - Define the persisted `Note` record and its write-side shapes.
//! - Keep identity assignment out of callers' hands.
//!
//! # Invariants
//! - A `Note` always carries a store-assigned `NoteId`.
//! - Deletion is a hard delete; no tombstone flag exists on the record.

pub mod note;
