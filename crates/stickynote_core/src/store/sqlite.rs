//! SQLite implementation of the store gateway.
//!
//! # Responsibility
//! - Serve `NoteStore` requests from one shared connection.
//! - Broadcast a `NoteChange` after each successful write.
//!
//! # Invariants
//! - The connection lock is never held across an `.await`.
//! - Change events are sent only after the SQL statement succeeded.

use crate::db::{open_db, open_db_in_memory};
use crate::model::note::{Geometry, Note, NoteId, WindowLevel};
use crate::repo::note_repo::{NoteRepository, RepoResult, SqliteNoteRepository};
use crate::store::{ChangeKind, NoteChange, NoteStore, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, warn};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Store gateway backed by a single SQLite connection.
pub struct SqliteNoteStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<NoteChange>,
}

impl SqliteNoteStore {
    /// Opens (and migrates) a database file.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            conn: Mutex::new(conn),
            changes,
        }
    }

    /// Inserts a note that already has an identity (imports, fixtures).
    ///
    /// Fails with `DuplicateId` when the id is live or was ever deleted.
    pub fn import_note(&self, note: &Note) -> StoreResult<()> {
        self.with_repo("import", |repo| repo.insert_note(note))?;
        self.emit(ChangeKind::Created, &note.id);
        Ok(())
    }

    fn with_repo<T>(
        &self,
        op: &'static str,
        run: impl FnOnce(&SqliteNoteRepository<'_>) -> RepoResult<T>,
    ) -> StoreResult<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("note store lock poisoned".to_string()))?;
        let repo = SqliteNoteRepository::new(&conn);
        run(&repo).map_err(|err| {
            let err = StoreError::from(err);
            if !err.is_not_found() {
                warn!("event=store_op module=store status=error op={op} error={err}");
            }
            err
        })
    }

    fn emit(&self, kind: ChangeKind, id: &NoteId) {
        // No receivers is fine: nobody is listening yet.
        let _ = self.changes.send(NoteChange {
            kind,
            id: id.clone(),
        });
        debug!(
            "event=notes_changed module=store kind={} note_id={id}",
            kind.as_str()
        );
    }
}

/// Current time at the precision timestamps are persisted with.
fn stored_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[async_trait]
impl NoteStore for SqliteNoteStore {
    async fn create(&self) -> StoreResult<Note> {
        let note = Note::new(stored_now());
        self.with_repo("create", |repo| repo.insert_note(&note))?;
        self.emit(ChangeKind::Created, &note.id);
        Ok(note)
    }

    async fn list(&self) -> StoreResult<Vec<Note>> {
        self.with_repo("list", |repo| repo.list_notes())
    }

    async fn get(&self, id: &NoteId) -> StoreResult<Note> {
        self.with_repo("get", |repo| repo.get_note(id))?
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn update(&self, note: &Note) -> StoreResult<()> {
        self.with_repo("update", |repo| repo.update_note(note))?;
        self.emit(ChangeKind::Updated, &note.id);
        Ok(())
    }

    async fn update_geometry(&self, id: &NoteId, geometry: Geometry) -> StoreResult<()> {
        self.with_repo("update_geometry", |repo| repo.update_geometry(id, geometry))
    }

    async fn set_window_level(&self, id: &NoteId, level: WindowLevel) -> StoreResult<()> {
        self.with_repo("set_window_level", |repo| {
            repo.set_window_level(id, level, stored_now())
        })?;
        self.emit(ChangeKind::Updated, id);
        Ok(())
    }

    async fn delete(&self, id: &NoteId) -> StoreResult<()> {
        let removed = self.with_repo("delete", |repo| repo.soft_delete_note(id))?;
        if !removed {
            debug!("event=store_op module=store status=skip op=delete note_id={id} reason=absent");
        }
        self.emit(ChangeKind::Deleted, id);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<NoteChange> {
        self.changes.subscribe()
    }
}
