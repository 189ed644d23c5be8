//! Note state synchronization between windows and the store gateway.
//!
//! # Responsibility
//! - Debounce bursty writes (`coalescer`, `geometry`).
//! - Own the edited note per window (`session`).
//! - Keep the shared notes list fresh without fetch storms (`list`).
//!
//! # Invariants
//! - Every component has an explicit start and teardown; nothing lives in
//!   module-level state.
//! - Plain mutexes are never held across an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod coalescer;
pub mod geometry;
pub mod list;
pub mod session;

/// Locks `mutex`, taking the guard over even if a previous holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
