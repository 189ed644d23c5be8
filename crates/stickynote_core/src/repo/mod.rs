//! Repository layer over the SQLite `notes` table.
//!
//! # Responsibility
//! - Define the synchronous data access contract used by the store gateway.
//! - Isolate SQL details from the async synchronization layer.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateId`) in
//!   addition to DB transport errors.

pub mod note_repo;
