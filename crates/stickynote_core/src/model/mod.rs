//! Domain model for sticky notes and their list projection.
//!
//! # Responsibility
//! - Define canonical data structures used by the synchronization core.
//! - Keep the persisted record and the list view as separate shapes.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId`.
//! - `NoteSummary` values are derived, never persisted.

pub mod note;
pub mod summary;
