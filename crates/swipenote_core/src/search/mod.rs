//! Query engine for note list requests.
//!
//! # Responsibility
//! - Describe list requests as predicate + ordering pairs.
//! - Own the deterministic ordering contract for every request shape.
//!
//! # See also
//! - `repo::note_store` for SQL evaluation.

pub mod query;
