//! Note persistence and live query layer.
//!
//! # Responsibility
//! - `note_store`: durable record storage and one-shot queries.
//! - `note_repo`: serialized mutations plus live subscriptions.
//!
//! # Invariants
//! - Callers mutate notes only through `NoteRepository`.
//! - Store APIs return semantic `NotFound` errors in addition to DB
//!   transport errors.

pub mod live_query;
pub mod note_repo;
pub mod note_store;
