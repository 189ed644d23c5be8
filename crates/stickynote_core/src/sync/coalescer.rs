//! Debounced write coalescer.
//!
//! # Responsibility
//! - Collapse bursts of full-snapshot save requests into one write per idle
//!   window, carrying the latest snapshot.
//! - Let owners force the pending write out before a subject switch or
//!   teardown.
//!
//! # Invariants
//! - At most one snapshot is pending; `submit` replaces it, never queues.
//! - A snapshot is written at most once: whichever of timer expiry and
//!   `flush` takes it from the slot first issues the write.
//! - Write failures are logged and dropped. There is no retry and no read-back.
//!
//! `submit` and `flush` spawn tokio tasks and must run inside a runtime.

use crate::model::note::NoteId;
use crate::store::StoreResult;
use crate::sync::lock_unpoisoned;
use async_trait::async_trait;
use log::{debug, warn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// A value persisted as one unit for one note.
pub trait Snapshot: Send + 'static {
    fn subject(&self) -> &NoteId;
}

/// Destination of coalesced writes.
#[async_trait]
pub trait SnapshotSink<T>: Send + Sync {
    async fn write(&self, snapshot: T) -> StoreResult<()>;
}

struct PendingSlot<T> {
    snapshot: Option<T>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every submit/flush/discard so a stale timer can't fire.
    generation: u64,
}

impl<T> PendingSlot<T> {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation += 1;
    }
}

/// Last-write-wins debouncer for one owner (one window, one concern).
pub struct WriteCoalescer<T: Snapshot> {
    label: &'static str,
    delay: Duration,
    sink: Arc<dyn SnapshotSink<T>>,
    slot: Arc<Mutex<PendingSlot<T>>>,
}

impl<T: Snapshot> WriteCoalescer<T> {
    /// `label` names the concern in log lines (`content`, `geometry`).
    pub fn new(label: &'static str, delay: Duration, sink: Arc<dyn SnapshotSink<T>>) -> Self {
        Self {
            label,
            delay,
            sink,
            slot: Arc::new(Mutex::new(PendingSlot {
                snapshot: None,
                timer: None,
                generation: 0,
            })),
        }
    }

    /// Replaces the pending snapshot and restarts the idle timer.
    pub fn submit(&self, snapshot: T) {
        let mut slot = lock_unpoisoned(&self.slot);
        slot.cancel_timer();
        slot.snapshot = Some(snapshot);

        let generation = slot.generation;
        let shared = Arc::clone(&self.slot);
        let sink = Arc::clone(&self.sink);
        let label = self.label;
        let delay = self.delay;
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let pending = {
                let mut slot = lock_unpoisoned(&shared);
                if slot.generation != generation {
                    return;
                }
                slot.timer = None;
                slot.snapshot.take()
            };
            if let Some(snapshot) = pending {
                write_snapshot(label, sink, snapshot).await;
            }
        }));
    }

    /// Issues the pending write now, if any.
    ///
    /// Returns the handle of the spawned write so teardown paths can wait for
    /// it; subject switches drop it and let the write finish in the background.
    pub fn flush(&self) -> Option<JoinHandle<()>> {
        let pending = {
            let mut slot = lock_unpoisoned(&self.slot);
            if slot.snapshot.is_none() {
                return None;
            }
            slot.cancel_timer();
            slot.snapshot.take()
        }?;
        Some(tokio::spawn(write_snapshot(
            self.label,
            Arc::clone(&self.sink),
            pending,
        )))
    }

    /// Drops the pending snapshot for `id` without writing it.
    ///
    /// Returns whether a snapshot was evicted.
    pub fn discard_for(&self, id: &NoteId) -> bool {
        let mut slot = lock_unpoisoned(&self.slot);
        let matches = slot
            .snapshot
            .as_ref()
            .is_some_and(|snapshot| snapshot.subject() == id);
        if matches {
            slot.cancel_timer();
            slot.snapshot = None;
            debug!(
                "event=coalescer_discard module=sync concern={} note_id={id}",
                self.label
            );
        }
        matches
    }

    /// Edits the pending snapshot in place without restarting the timer.
    ///
    /// Returns whether a snapshot was pending.
    pub fn amend_pending(&self, edit: impl FnOnce(&mut T)) -> bool {
        match lock_unpoisoned(&self.slot).snapshot.as_mut() {
            Some(snapshot) => {
                edit(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn has_pending(&self) -> bool {
        lock_unpoisoned(&self.slot).snapshot.is_some()
    }
}

async fn write_snapshot<T: Snapshot>(
    label: &'static str,
    sink: Arc<dyn SnapshotSink<T>>,
    snapshot: T,
) {
    let started_at = Instant::now();
    let id = snapshot.subject().clone();
    match sink.write(snapshot).await {
        Ok(()) => debug!(
            "event=snapshot_write module=sync status=ok concern={label} note_id={id} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event=snapshot_write module=sync status=error concern={label} note_id={id} duration_ms={} error={err}",
            started_at.elapsed().as_millis()
        ),
    }
}
