//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into list-screen level APIs.
//! - Own the transient undo buffer for swipe deletes.

pub mod note_service;
pub mod undo_delete;
