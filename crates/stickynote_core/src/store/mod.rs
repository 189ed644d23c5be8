//! Store gateway contract shared by every note window.
//!
//! # Responsibility
//! - Define the async request/response surface the sync layer consumes.
//! - Define the change-notification payload broadcast after writes.
//!
//! # Invariants
//! - A change event is emitted at least once per successful create, update,
//!   window-level change and delete.
//! - Consumers treat change events as "something changed" and refetch; the
//!   payload is informational only.
//! - `update` is a full-snapshot replace keyed by `id` (last write wins).

use crate::db::DbError;
use crate::model::note::{Geometry, Note, NoteId, WindowLevel};
use crate::repo::note_repo::RepoError;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::broadcast;

pub mod legacy;
pub mod sqlite;

pub use sqlite::SqliteNoteStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// What kind of write produced a change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }
}

/// Broadcast after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteChange {
    pub kind: ChangeKind,
    pub id: NoteId,
}

/// Gateway error taxonomy.
#[derive(Debug)]
pub enum StoreError {
    /// Requested id is absent or deleted.
    NotFound(NoteId),
    /// Insert attempted with an id that is (or was) in use.
    DuplicateId(NoteId),
    /// Backing store could not serve the request; may succeed later.
    Unavailable(String),
    /// Persisted data failed to decode.
    InvalidData(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "note {id} not found"),
            Self::DuplicateId(id) => write!(f, "note id {id} already used"),
            Self::Unavailable(message) => write!(f, "note store unavailable: {message}"),
            Self::InvalidData(message) => write!(f, "{message}"),
        }
    }
}

impl Error for StoreError {}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::DuplicateId(id) => Self::DuplicateId(id),
            RepoError::InvalidData(message) => Self::InvalidData(message),
            RepoError::Db(err) => Self::Unavailable(err.to_string()),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Unavailable(value.to_string())
    }
}

/// Async gateway to the shared note store.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Creates a note with generated id, default theme/geometry and timestamps.
    async fn create(&self) -> StoreResult<Note>;
    /// Lists live notes, most recently updated first.
    async fn list(&self) -> StoreResult<Vec<Note>>;
    async fn get(&self, id: &NoteId) -> StoreResult<Note>;
    /// Full-snapshot replace keyed by `note.id`.
    async fn update(&self, note: &Note) -> StoreResult<()>;
    /// Persists window geometry without touching `updated_at`. Emits no event.
    async fn update_geometry(&self, id: &NoteId, geometry: Geometry) -> StoreResult<()>;
    async fn set_window_level(&self, id: &NoteId, level: WindowLevel) -> StoreResult<()>;
    /// Deletes a note. Deleting an unknown id succeeds.
    async fn delete(&self, id: &NoteId) -> StoreResult<()>;
    /// Subscribes to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<NoteChange>;
}
