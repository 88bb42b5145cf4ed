//! Rendering-side projections of live note results.
//!
//! # Responsibility
//! - Project notes into the view-models a list surface lays out.
//! - Reconcile a rendered list with a new live snapshot.

pub mod list_sync;
pub mod view_model;
