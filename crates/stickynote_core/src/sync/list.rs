//! Notes list synchronizer.
//!
//! # Responsibility
//! - Cache display-ordered note summaries for one window.
//! - Refresh the cache on change notifications, focus/visibility regain and a
//!   coarse periodic poll, coalescing bursts into single fetches.
//!
//! # Invariants
//! - At most one coalesced refresh is queued at a time.
//! - A failed refresh keeps the previous cache.
//! - Overlapping refreshes never roll the cache back: a result is dropped
//!   once a later-issued refresh has been applied.
//! - After teardown no timer or subscription survives, and any refresh that
//!   was already running leaves the cache untouched.

use crate::config::SyncConfig;
use crate::model::note::NoteId;
use crate::model::summary::{summarize, NoteSummary};
use crate::store::{NoteChange, NoteStore};
use crate::sync::lock_unpoisoned;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Keyboard navigation direction through the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

struct ListState {
    summaries: Vec<NoteSummary>,
    queued: Option<JoinHandle<()>>,
    /// Generation of the last refresh issued and of the last one applied.
    issued: u64,
    applied: u64,
    torn_down: bool,
}

struct ListShared {
    store: Arc<dyn NoteStore>,
    refresh_delay: Duration,
    state: Mutex<ListState>,
}

impl ListShared {
    async fn refresh_now(&self) {
        let generation = {
            let mut state = lock_unpoisoned(&self.state);
            if state.torn_down {
                return;
            }
            state.issued += 1;
            state.issued
        };
        let started_at = Instant::now();
        let result = self.store.list().await;

        let mut state = lock_unpoisoned(&self.state);
        if state.torn_down {
            return;
        }
        if generation < state.applied {
            debug!(
                "event=list_refresh module=list status=stale generation={generation} applied={}",
                state.applied
            );
            return;
        }
        match result {
            Ok(notes) => {
                state.applied = generation;
                state.summaries = summarize(&notes);
                debug!(
                    "event=list_refresh module=list status=ok count={} duration_ms={}",
                    state.summaries.len(),
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => warn!(
                "event=list_refresh module=list status=error duration_ms={} kept={} error={err}",
                started_at.elapsed().as_millis(),
                state.summaries.len()
            ),
        }
    }

    fn queue_refresh(self: &Arc<Self>) {
        let mut state = lock_unpoisoned(&self.state);
        if state.torn_down || state.queued.is_some() {
            return;
        }
        let shared = Arc::clone(self);
        state.queued = Some(tokio::spawn(async move {
            tokio::time::sleep(shared.refresh_delay).await;
            lock_unpoisoned(&shared.state).queued = None;
            shared.refresh_now().await;
        }));
    }
}

/// Per-window cache of the notes list.
pub struct NoteListSync {
    shared: Arc<ListShared>,
    background: Vec<JoinHandle<()>>,
}

impl NoteListSync {
    /// Subscribes to store changes, runs an initial refresh and starts polling.
    pub fn start(store: Arc<dyn NoteStore>, config: &SyncConfig) -> Self {
        let changes = store.subscribe();
        let shared = Arc::new(ListShared {
            store,
            refresh_delay: config.list_refresh_delay(),
            state: Mutex::new(ListState {
                summaries: Vec::new(),
                queued: None,
                issued: 0,
                applied: 0,
                torn_down: false,
            }),
        });

        let background = vec![
            tokio::spawn(poll(Arc::clone(&shared), config.list_poll_interval())),
            tokio::spawn(watch_changes(Arc::clone(&shared), changes)),
        ];
        info!("event=list_start module=list status=ok");
        Self { shared, background }
    }

    /// Fetches the full list now and replaces the cache.
    pub async fn refresh_now(&self) {
        self.shared.refresh_now().await;
    }

    /// Schedules one coalesced refresh unless one is already queued.
    pub fn queue_refresh(&self) {
        self.shared.queue_refresh();
    }

    pub fn on_focus(&self) {
        self.queue_refresh();
    }

    pub fn on_visibility_changed(&self, visible: bool) {
        if visible {
            self.queue_refresh();
        }
    }

    pub fn summaries(&self) -> Vec<NoteSummary> {
        lock_unpoisoned(&self.shared.state).summaries.clone()
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.shared.state).summaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        lock_unpoisoned(&self.shared.state)
            .summaries
            .iter()
            .any(|summary| &summary.id == id)
    }

    /// Returns the note above/below `current`, wrapping at both ends.
    ///
    /// When `current` isn't listed, `Up` picks the last entry and `Down` the
    /// first.
    pub fn adjacent(&self, current: &NoteId, direction: Direction) -> Option<NoteId> {
        let state = lock_unpoisoned(&self.shared.state);
        let summaries = &state.summaries;
        let last = summaries.len().checked_sub(1)?;
        let position = summaries.iter().position(|summary| &summary.id == current);
        let next = match (direction, position) {
            (Direction::Up, Some(0) | None) => last,
            (Direction::Up, Some(index)) => index - 1,
            (Direction::Down, Some(index)) if index < last => index + 1,
            (Direction::Down, _) => 0,
        };
        Some(summaries[next].id.clone())
    }

    /// Cancels the queued refresh, the poll timer and the subscription.
    pub fn teardown(&self) {
        {
            let mut state = lock_unpoisoned(&self.shared.state);
            if state.torn_down {
                return;
            }
            state.torn_down = true;
            if let Some(queued) = state.queued.take() {
                queued.abort();
            }
        }
        for task in &self.background {
            task.abort();
        }
        info!("event=list_teardown module=list status=ok");
    }
}

impl Drop for NoteListSync {
    fn drop(&mut self) {
        self.teardown();
    }
}

async fn poll(shared: Arc<ListShared>, period: Duration) {
    shared.refresh_now().await;
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        shared.refresh_now().await;
    }
}

async fn watch_changes(shared: Arc<ListShared>, mut changes: broadcast::Receiver<NoteChange>) {
    loop {
        match changes.recv().await {
            Ok(change) => {
                debug!(
                    "event=notes_changed module=list kind={} note_id={}",
                    change.kind.as_str(),
                    change.id
                );
                shared.queue_refresh();
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!("event=notes_changed module=list status=lagged skipped={skipped}");
                shared.queue_refresh();
            }
            Err(RecvError::Closed) => return,
        }
    }
}
