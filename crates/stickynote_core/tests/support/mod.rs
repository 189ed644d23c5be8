#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use stickynote_core::{
    ChangeKind, Geometry, Note, NoteChange, NoteId, NoteStore, SqliteNoteStore, StoreError,
    StoreResult, WindowError, WindowEvent, WindowHandle, WindowLevel,
};
use tokio::sync::{broadcast, Notify};

/// Fixed instant that seeded notes are dated from.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
}

/// A note created `minutes` after [`base_time`].
pub fn note_at(id: &str, content: &str, minutes: i64) -> Note {
    let now = base_time() + ChronoDuration::minutes(minutes);
    Note::with_id(NoteId::from(id), now).with_content(content, now)
}

/// Lets spawned tasks run without advancing the paused clock.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Note store over in-memory SQLite that records every request.
///
/// It owns its change channel, so tests can mute notifications or inject
/// them by hand.
pub struct RecordingStore {
    inner: SqliteNoteStore,
    changes: broadcast::Sender<NoteChange>,
    ops: Mutex<Vec<String>>,
    updates: Mutex<Vec<Note>>,
    geometry_writes: Mutex<Vec<(NoteId, Geometry)>>,
    list_calls: AtomicUsize,
    gates: Mutex<HashMap<NoteId, Arc<Notify>>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
    fail_updates: AtomicBool,
    fail_gets: AtomicBool,
    fail_lists: AtomicBool,
    muted: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(256);
        Arc::new(Self {
            inner: SqliteNoteStore::open_in_memory().unwrap(),
            changes,
            ops: Mutex::new(Vec::new()),
            updates: Mutex::new(Vec::new()),
            geometry_writes: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            gates: Mutex::new(HashMap::new()),
            list_gate: Mutex::new(None),
            fail_updates: AtomicBool::new(false),
            fail_gets: AtomicBool::new(false),
            fail_lists: AtomicBool::new(false),
            muted: AtomicBool::new(false),
        })
    }

    pub fn with_notes(notes: &[Note]) -> Arc<Self> {
        let store = Self::new();
        for note in notes {
            store.seed(note);
        }
        store
    }

    /// Inserts without recording or notifying.
    pub fn seed(&self, note: &Note) {
        self.inner.import_note(note).unwrap();
    }

    /// Makes `get(id)` wait until the returned handle is notified.
    pub fn gate_get(&self, id: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(NoteId::from(id), Arc::clone(&gate));
        gate
    }

    /// Makes the next `list()` read the rows at once but return them only
    /// after the returned handle is notified.
    pub fn gate_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.list_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn notify(&self, kind: ChangeKind, id: &str) {
        let _ = self.changes.send(NoteChange {
            kind,
            id: NoteId::from(id),
        });
    }

    pub fn mute(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_gets(&self, fail: bool) {
        self.fail_gets.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Request log such as `get:a`, `update:a`, `list`.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<Note> {
        self.updates.lock().unwrap().clone()
    }

    pub fn updated_contents(&self) -> Vec<(String, String)> {
        self.updates()
            .into_iter()
            .map(|note| (note.id.to_string(), note.content))
            .collect()
    }

    pub fn geometry_writes(&self) -> Vec<(NoteId, Geometry)> {
        self.geometry_writes.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Reads the persisted row, bypassing the request log.
    pub async fn stored(&self, id: &str) -> StoreResult<Note> {
        self.inner.get(&NoteId::from(id)).await
    }

    fn record(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }

    fn emit(&self, kind: ChangeKind, id: &NoteId) {
        if !self.muted.load(Ordering::SeqCst) {
            let _ = self.changes.send(NoteChange {
                kind,
                id: id.clone(),
            });
        }
    }
}

#[async_trait]
impl NoteStore for RecordingStore {
    async fn create(&self) -> StoreResult<Note> {
        let note = self.inner.create().await?;
        self.record(format!("create:{}", note.id));
        self.emit(ChangeKind::Created, &note.id);
        Ok(note)
    }

    async fn list(&self) -> StoreResult<Vec<Note>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.record("list".to_string());
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("list refused".to_string()));
        }
        let rows = self.inner.list().await;
        let gate = self.list_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        rows
    }

    async fn get(&self, id: &NoteId) -> StoreResult<Note> {
        self.record(format!("get:{id}"));
        let gate = self.gates.lock().unwrap().remove(id);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("get refused".to_string()));
        }
        self.inner.get(id).await
    }

    async fn update(&self, note: &Note) -> StoreResult<()> {
        self.record(format!("update:{}", note.id));
        self.updates.lock().unwrap().push(note.clone());
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("update refused".to_string()));
        }
        self.inner.update(note).await?;
        self.emit(ChangeKind::Updated, &note.id);
        Ok(())
    }

    async fn update_geometry(&self, id: &NoteId, geometry: Geometry) -> StoreResult<()> {
        self.record(format!("geometry:{id}"));
        self.geometry_writes
            .lock()
            .unwrap()
            .push((id.clone(), geometry));
        self.inner.update_geometry(id, geometry).await
    }

    async fn set_window_level(&self, id: &NoteId, level: WindowLevel) -> StoreResult<()> {
        self.record(format!("level:{id}"));
        self.inner.set_window_level(id, level).await?;
        self.emit(ChangeKind::Updated, id);
        Ok(())
    }

    async fn delete(&self, id: &NoteId) -> StoreResult<()> {
        self.record(format!("delete:{id}"));
        self.inner.delete(id).await?;
        self.emit(ChangeKind::Deleted, id);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<NoteChange> {
        self.changes.subscribe()
    }
}

/// Scriptable stand-in for the native window.
pub struct FakeWindow {
    position: Mutex<(i32, i32)>,
    size: Mutex<(u32, u32)>,
    events: broadcast::Sender<WindowEvent>,
    fail_reads: AtomicBool,
}

impl FakeWindow {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            position: Mutex::new((100, 100)),
            size: Mutex::new((320, 280)),
            events,
            fail_reads: AtomicBool::new(false),
        })
    }

    pub fn move_to(&self, x: i32, y: i32) {
        *self.position.lock().unwrap() = (x, y);
        let _ = self.events.send(WindowEvent::Moved);
    }

    pub fn resize_to(&self, width: u32, height: u32) {
        *self.size.lock().unwrap() = (width, height);
        let _ = self.events.send(WindowEvent::Resized);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl WindowHandle for FakeWindow {
    async fn position(&self) -> Result<(i32, i32), WindowError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(WindowError("window closed".to_string()));
        }
        Ok(*self.position.lock().unwrap())
    }

    async fn size(&self) -> Result<(u32, u32), WindowError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(WindowError("window closed".to_string()));
        }
        Ok(*self.size.lock().unwrap())
    }

    fn subscribe(&self) -> broadcast::Receiver<WindowEvent> {
        self.events.subscribe()
    }
}
