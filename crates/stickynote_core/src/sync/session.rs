//! Note session controller.
//!
//! # Responsibility
//! - Hold the one note a window is editing and its load state.
//! - Order subject switches: flush outgoing edits, invalidate, fetch, then
//!   commit or drop the fetch result.
//! - Route content/color mutations into the content coalescer.
//!
//! # Invariants
//! - The outgoing subject's flush is issued before the incoming fetch starts;
//!   the flush is not awaited.
//! - A fetch whose cancellation token was cancelled never touches state.
//! - A mutation is applied only when the loaded note's id equals the active
//!   subject, so a snapshot is never persisted under another subject's id.
//! - Lock order is session state, then coalescer slot.

use crate::model::note::{Geometry, Note, NoteId, WindowLevel};
use crate::store::{NoteStore, StoreError, StoreResult};
use crate::sync::coalescer::{Snapshot, SnapshotSink, WriteCoalescer};
use crate::sync::geometry::{GeometryObserver, GeometrySnapshot};
use crate::sync::lock_unpoisoned;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Outcome of loading the active subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// No subject selected.
    Idle,
    Loading,
    Loaded,
    /// The store has no note with the subject id.
    NotFound,
    /// The fetch failed. Terminal for this subject until it is selected again.
    Failed,
}

/// What the presentation layer renders for one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub subject: Option<NoteId>,
    pub note: Option<Note>,
    pub load_state: LoadState,
}

impl SessionView {
    pub fn is_loading(&self) -> bool {
        self.load_state == LoadState::Loading
    }
}

impl Snapshot for Note {
    fn subject(&self) -> &NoteId {
        &self.id
    }
}

struct ContentSink {
    store: Arc<dyn NoteStore>,
}

#[async_trait]
impl SnapshotSink<Note> for ContentSink {
    async fn write(&self, snapshot: Note) -> StoreResult<()> {
        self.store.update(&snapshot).await
    }
}

/// Window facts persisted for the active subject by other writers.
#[derive(Debug, Clone, Copy, Default)]
struct Absorbed {
    geometry: Option<Geometry>,
    level: Option<WindowLevel>,
}

impl Absorbed {
    fn apply(&self, note: &mut Note) {
        if let Some(geometry) = self.geometry {
            note.geometry = geometry;
        }
        if let Some(level) = self.level {
            note.window_level = level;
        }
    }
}

struct SessionState {
    view: SessionView,
    fetch: Option<CancellationToken>,
    /// Reset on every switch; survives the fetch so a result read before a
    /// move doesn't bring back the old geometry.
    absorbed: Absorbed,
    closed: bool,
}

/// Per-window editing session.
///
/// Call [`NoteSession::teardown`] before dropping it. A dropped session's
/// pending edit is still written when its idle timer fires, as long as the
/// runtime keeps running.
pub struct NoteSession {
    store: Arc<dyn NoteStore>,
    content: WriteCoalescer<Note>,
    state: Arc<Mutex<SessionState>>,
    views: Arc<watch::Sender<SessionView>>,
}

impl NoteSession {
    /// Creates an idle session whose edits are written after `save_delay`.
    pub fn new(store: Arc<dyn NoteStore>, save_delay: Duration) -> Self {
        let view = SessionView {
            subject: None,
            note: None,
            load_state: LoadState::Idle,
        };
        let (views, _) = watch::channel(view.clone());
        let sink = Arc::new(ContentSink {
            store: Arc::clone(&store),
        });
        Self {
            store,
            content: WriteCoalescer::new("content", save_delay, sink),
            state: Arc::new(Mutex::new(SessionState {
                view,
                fetch: None,
                absorbed: Absorbed::default(),
                closed: false,
            })),
            views: Arc::new(views),
        }
    }

    /// Makes `subject` the note this session edits.
    ///
    /// Selecting the subject that is already loading or loaded is a no-op;
    /// selecting it again after `NotFound`/`Failed` retries the fetch.
    pub fn switch_subject(&self, subject: Option<NoteId>) {
        let mut state = lock_unpoisoned(&self.state);
        if state.closed {
            return;
        }
        if state.view.subject == subject
            && matches!(
                state.view.load_state,
                LoadState::Loading | LoadState::Loaded
            )
        {
            return;
        }

        // Issued before the fetch below; runs concurrently with it.
        let _ = self.content.flush();

        if let Some(previous) = state.fetch.take() {
            previous.cancel();
        }
        state.absorbed = Absorbed::default();
        state.view = SessionView {
            subject: subject.clone(),
            note: None,
            load_state: if subject.is_some() {
                LoadState::Loading
            } else {
                LoadState::Idle
            },
        };
        self.views.send_replace(state.view.clone());

        let Some(id) = subject else {
            return;
        };
        info!("event=subject_switch module=session status=start note_id={id}");
        let token = CancellationToken::new();
        state.fetch = Some(token.clone());
        drop(state);

        tokio::spawn(load_subject(
            Arc::clone(&self.store),
            Arc::clone(&self.state),
            Arc::clone(&self.views),
            id,
            token,
        ));
    }

    /// Replaces the loaded note's content. Returns whether the edit applied.
    pub fn update_content(&self, content: impl Into<String>) -> bool {
        let content = content.into();
        self.mutate("content", |note| note.with_content(content, Utc::now()))
    }

    /// Replaces the loaded note's colors. Returns whether the edit applied.
    pub fn update_colors(&self, bg_color: impl Into<String>, fg_color: impl Into<String>) -> bool {
        let (bg_color, fg_color) = (bg_color.into(), fg_color.into());
        self.mutate("colors", |note| {
            note.with_colors(bg_color, fg_color, Utc::now())
        })
    }

    fn mutate(&self, field: &'static str, edit: impl FnOnce(&Note) -> Note) -> bool {
        let mut state = lock_unpoisoned(&self.state);
        let snapshot = match (&state.view.note, &state.view.subject) {
            (Some(note), Some(subject)) if !state.closed && &note.id == subject => edit(note),
            _ => {
                debug!("event=note_mutation module=session status=skip field={field} reason=no_matching_note");
                return false;
            }
        };
        state.view.note = Some(snapshot.clone());
        self.views.send_replace(state.view.clone());
        self.content.submit(snapshot);
        true
    }

    /// Mirrors geometry persisted by another writer into the loaded note and
    /// the pending snapshot, so a later content write doesn't revert it.
    ///
    /// While the subject is still loading the geometry is kept and applied to
    /// the fetched note. Returns `false` when `id` isn't the active subject.
    pub fn absorb_geometry(&self, id: &NoteId, geometry: Geometry) -> bool {
        self.absorb(id, |absorbed| absorbed.geometry = Some(geometry))
    }

    /// Mirrors a window-level change written directly to the store.
    pub fn absorb_window_level(&self, id: &NoteId, level: WindowLevel) -> bool {
        self.absorb(id, |absorbed| absorbed.level = Some(level))
    }

    fn absorb(&self, id: &NoteId, record: impl FnOnce(&mut Absorbed)) -> bool {
        let mut state = lock_unpoisoned(&self.state);
        if state.view.subject.as_ref() != Some(id) {
            return false;
        }
        record(&mut state.absorbed);
        let absorbed = state.absorbed;
        if let Some(note) = state.view.note.as_mut().filter(|note| &note.id == id) {
            absorbed.apply(note);
            self.views.send_replace(state.view.clone());
        }
        self.content.amend_pending(|pending| {
            if &pending.id == id {
                absorbed.apply(pending);
            }
        });
        true
    }

    /// Evicts a pending, unwritten edit for `id` (used before deleting it).
    pub fn discard_pending(&self, id: &NoteId) -> bool {
        let _state = lock_unpoisoned(&self.state);
        self.content.discard_for(id)
    }

    pub fn has_pending_write(&self) -> bool {
        self.content.has_pending()
    }

    pub fn view(&self) -> SessionView {
        lock_unpoisoned(&self.state).view.clone()
    }

    pub fn subject(&self) -> Option<NoteId> {
        lock_unpoisoned(&self.state).view.subject.clone()
    }

    pub fn current_note(&self) -> Option<Note> {
        lock_unpoisoned(&self.state).view.note.clone()
    }

    pub fn load_state(&self) -> LoadState {
        lock_unpoisoned(&self.state).view.load_state
    }

    pub fn is_loading(&self) -> bool {
        self.load_state() == LoadState::Loading
    }

    /// Observes every state change (switches, loads, edits).
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.views.subscribe()
    }

    /// Drops any in-flight fetch effect and writes the pending edit.
    ///
    /// Later switches and mutations are ignored.
    pub async fn teardown(&self) {
        let write = {
            let mut state = lock_unpoisoned(&self.state);
            state.closed = true;
            if let Some(fetch) = state.fetch.take() {
                fetch.cancel();
            }
            self.content.flush()
        };
        if let Some(write) = write {
            if let Err(err) = write.await {
                warn!("event=session_teardown module=session status=error error={err}");
            }
        }
        info!("event=session_teardown module=session status=ok");
    }
}

impl GeometryObserver for NoteSession {
    fn geometry_changed(&self, snapshot: &GeometrySnapshot) {
        self.absorb_geometry(&snapshot.id, snapshot.geometry);
    }
}

async fn load_subject(
    store: Arc<dyn NoteStore>,
    state: Arc<Mutex<SessionState>>,
    views: Arc<watch::Sender<SessionView>>,
    id: NoteId,
    token: CancellationToken,
) {
    let started_at = Instant::now();
    let result = store.get(&id).await;

    let mut state = lock_unpoisoned(&state);
    if token.is_cancelled() {
        debug!(
            "event=note_load module=session status=cancelled note_id={id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        return;
    }
    state.fetch = None;

    match result {
        Ok(mut note) => {
            state.absorbed.apply(&mut note);
            info!(
                "event=note_load module=session status=ok note_id={id} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            state.view.note = Some(note);
            state.view.load_state = LoadState::Loaded;
        }
        Err(StoreError::NotFound(_)) => {
            warn!("event=note_load module=session status=error note_id={id} error_code=not_found");
            state.view.load_state = LoadState::NotFound;
        }
        Err(err) => {
            warn!(
                "event=note_load module=session status=error note_id={id} error_code=load_failed error={err}"
            );
            state.view.load_state = LoadState::Failed;
        }
    }
    views.send_replace(state.view.clone());
}
