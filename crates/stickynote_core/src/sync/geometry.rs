//! Window geometry persistence.
//!
//! # Responsibility
//! - Listen to move/resize events from the window-manager collaborator.
//! - Debounce the resulting position/size writes separately from content.
//!
//! # Invariants
//! - One persister serves exactly one subject; switching notes replaces it.
//! - Geometry writes never touch `updated_at` and never block content saves.

use crate::model::note::{Geometry, NoteId};
use crate::store::{NoteStore, StoreResult};
use crate::sync::coalescer::{Snapshot, SnapshotSink, WriteCoalescer};
use async_trait::async_trait;
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Window-manager signal that geometry may have changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    Moved,
    Resized,
}

/// Failure reported by the window-manager collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowError(pub String);

impl Display for WindowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "window query failed: {}", self.0)
    }
}

impl Error for WindowError {}

/// The native window a note is displayed in.
#[async_trait]
pub trait WindowHandle: Send + Sync {
    /// Outer position in physical pixels.
    async fn position(&self) -> Result<(i32, i32), WindowError>;
    /// Outer size in physical pixels.
    async fn size(&self) -> Result<(u32, u32), WindowError>;
    fn subscribe(&self) -> broadcast::Receiver<WindowEvent>;
}

/// Notified of every geometry sample before its write is scheduled.
pub trait GeometryObserver: Send + Sync {
    fn geometry_changed(&self, snapshot: &GeometrySnapshot);
}

/// Geometry of one note at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometrySnapshot {
    pub id: NoteId,
    pub geometry: Geometry,
}

impl Snapshot for GeometrySnapshot {
    fn subject(&self) -> &NoteId {
        &self.id
    }
}

struct GeometrySink {
    store: Arc<dyn NoteStore>,
}

#[async_trait]
impl SnapshotSink<GeometrySnapshot> for GeometrySink {
    async fn write(&self, snapshot: GeometrySnapshot) -> StoreResult<()> {
        self.store
            .update_geometry(&snapshot.id, snapshot.geometry)
            .await
    }
}

/// Debounced geometry writer bound to one subject.
pub struct GeometryPersister {
    subject: NoteId,
    coalescer: Arc<WriteCoalescer<GeometrySnapshot>>,
    listener: JoinHandle<()>,
}

impl GeometryPersister {
    /// Subscribes to `window` events and starts persisting for `subject`.
    pub fn start(
        subject: NoteId,
        window: Arc<dyn WindowHandle>,
        store: Arc<dyn NoteStore>,
        save_delay: Duration,
    ) -> Self {
        Self::start_observed(subject, window, store, save_delay, None)
    }

    /// Like [`GeometryPersister::start`], also reporting each sample to `observer`.
    pub fn start_observed(
        subject: NoteId,
        window: Arc<dyn WindowHandle>,
        store: Arc<dyn NoteStore>,
        save_delay: Duration,
        observer: Option<Arc<dyn GeometryObserver>>,
    ) -> Self {
        let coalescer = Arc::new(WriteCoalescer::new(
            "geometry",
            save_delay,
            Arc::new(GeometrySink { store }),
        ));
        // Subscribe before spawning so no event between start and first poll is lost.
        let events = window.subscribe();
        let listener = tokio::spawn(listen(
            subject.clone(),
            window,
            events,
            Arc::clone(&coalescer),
            observer,
        ));
        Self {
            subject,
            coalescer,
            listener,
        }
    }

    pub fn subject(&self) -> &NoteId {
        &self.subject
    }

    /// Evicts the pending write for `id` (the note is being deleted).
    pub fn discard_for(&self, id: &NoteId) -> bool {
        self.coalescer.discard_for(id)
    }

    pub fn has_pending_write(&self) -> bool {
        self.coalescer.has_pending()
    }

    /// Stops listening and issues the pending write without waiting for it.
    pub fn stop(self) -> Option<JoinHandle<()>> {
        self.listener.abort();
        self.coalescer.flush()
    }

    /// Stops listening and waits for the pending write to finish.
    pub async fn teardown(self) {
        if let Some(write) = self.stop() {
            if let Err(err) = write.await {
                warn!("event=geometry_teardown module=geometry status=error error={err}");
            }
        }
    }
}

impl Drop for GeometryPersister {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn listen(
    subject: NoteId,
    window: Arc<dyn WindowHandle>,
    mut events: broadcast::Receiver<WindowEvent>,
    coalescer: Arc<WriteCoalescer<GeometrySnapshot>>,
    observer: Option<Arc<dyn GeometryObserver>>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                debug!("event=window_event module=geometry kind={event:?} note_id={subject}");
            }
            // Missed events still mean the window moved; read the latest geometry.
            Err(RecvError::Lagged(skipped)) => {
                debug!("event=window_event module=geometry status=lagged skipped={skipped} note_id={subject}");
            }
            Err(RecvError::Closed) => return,
        }

        match read_geometry(window.as_ref()).await {
            Ok(geometry) => {
                let snapshot = GeometrySnapshot {
                    id: subject.clone(),
                    geometry,
                };
                if let Some(observer) = &observer {
                    observer.geometry_changed(&snapshot);
                }
                coalescer.submit(snapshot);
            }
            Err(err) => {
                warn!("event=geometry_read module=geometry status=error note_id={subject} error={err}");
            }
        }
    }
}

async fn read_geometry(window: &dyn WindowHandle) -> Result<Geometry, WindowError> {
    let (x, y) = window.position().await?;
    let (width, height) = window.size().await?;
    Ok(Geometry {
        x,
        y,
        width,
        height,
    })
}
