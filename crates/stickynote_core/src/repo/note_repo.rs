//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide synchronous CRUD over the `notes` table.
//! - Keep SQL and column encoding inside the persistence boundary.
//!
//! # Invariants
//! - Reads and updates only see live rows (`is_deleted = 0`).
//! - Deletion writes a tombstone; an id that ever existed can't be inserted again.
//! - `created_at` is written once on insert and never updated.
//! - Timestamps are stored as fixed-width RFC 3339 UTC text so SQL ordering
//!   matches chronological ordering.

use crate::db::DbError;
use crate::model::note::{Geometry, Note, NoteId, WindowLevel};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    content,
    bg_color,
    fg_color,
    x,
    y,
    width,
    height,
    window_level,
    created_at,
    updated_at
FROM notes";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for note persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// No live row exists for the id.
    NotFound(NoteId),
    /// The id is live or tombstoned already.
    DuplicateId(NoteId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "note not found: {id}"),
            Self::DuplicateId(id) => write!(f, "note id already used: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for note rows.
pub trait NoteRepository {
    /// Inserts a note with its existing identity.
    fn insert_note(&self, note: &Note) -> RepoResult<()>;
    /// Replaces every mutable column of a live note.
    fn update_note(&self, note: &Note) -> RepoResult<()>;
    /// Replaces window geometry only; `updated_at` is left untouched.
    fn update_geometry(&self, id: &NoteId, geometry: Geometry) -> RepoResult<()>;
    fn set_window_level(
        &self,
        id: &NoteId,
        level: WindowLevel,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<()>;
    fn get_note(&self, id: &NoteId) -> RepoResult<Option<Note>>;
    /// Lists live notes, most recently updated first.
    fn list_notes(&self) -> RepoResult<Vec<Note>>;
    /// Tombstones a note. Returns `false` when no live row matched.
    fn soft_delete_note(&self, id: &NoteId) -> RepoResult<bool>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert_note(&self, note: &Note) -> RepoResult<()> {
        let used: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?1);",
            [note.id.as_str()],
            |row| row.get(0),
        )?;
        if used == 1 {
            return Err(RepoError::DuplicateId(note.id.clone()));
        }

        self.conn.execute(
            "INSERT INTO notes (
                id,
                content,
                bg_color,
                fg_color,
                x,
                y,
                width,
                height,
                window_level,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                note.id.as_str(),
                note.content.as_str(),
                note.bg_color.as_str(),
                note.fg_color.as_str(),
                note.geometry.x,
                note.geometry.y,
                note.geometry.width,
                note.geometry.height,
                window_level_to_db(note.window_level),
                timestamp_to_db(note.created_at),
                timestamp_to_db(note.updated_at),
            ],
        )?;
        Ok(())
    }

    fn update_note(&self, note: &Note) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET
                content = ?2,
                bg_color = ?3,
                fg_color = ?4,
                x = ?5,
                y = ?6,
                width = ?7,
                height = ?8,
                window_level = ?9,
                updated_at = ?10
             WHERE id = ?1
               AND is_deleted = 0;",
            params![
                note.id.as_str(),
                note.content.as_str(),
                note.bg_color.as_str(),
                note.fg_color.as_str(),
                note.geometry.x,
                note.geometry.y,
                note.geometry.width,
                note.geometry.height,
                window_level_to_db(note.window_level),
                timestamp_to_db(note.updated_at),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(note.id.clone()));
        }
        Ok(())
    }

    fn update_geometry(&self, id: &NoteId, geometry: Geometry) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET x = ?2, y = ?3, width = ?4, height = ?5
             WHERE id = ?1
               AND is_deleted = 0;",
            params![
                id.as_str(),
                geometry.x,
                geometry.y,
                geometry.width,
                geometry.height
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id.clone()));
        }
        Ok(())
    }

    fn set_window_level(
        &self,
        id: &NoteId,
        level: WindowLevel,
        updated_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET window_level = ?2, updated_at = ?3
             WHERE id = ?1
               AND is_deleted = 0;",
            params![
                id.as_str(),
                window_level_to_db(level),
                timestamp_to_db(updated_at)
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id.clone()));
        }
        Ok(())
    }

    fn get_note(&self, id: &NoteId) -> RepoResult<Option<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE id = ?1
               AND is_deleted = 0;"
        ))?;

        let mut rows = stmt.query([id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(row)?));
        }
        Ok(None)
    }

    fn list_notes(&self) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE is_deleted = 0
             ORDER BY updated_at DESC, id ASC;"
        ))?;

        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn soft_delete_note(&self, id: &NoteId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET is_deleted = 1
             WHERE id = ?1
               AND is_deleted = 0;",
            [id.as_str()],
        )?;
        Ok(changed > 0)
    }
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id: String = row.get("id")?;

    let level_text: String = row.get("window_level")?;
    let window_level = parse_window_level(&level_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid window level `{level_text}` in notes.window_level"
        ))
    })?;

    let created_text: String = row.get("created_at")?;
    let updated_text: String = row.get("updated_at")?;

    Ok(Note {
        id: NoteId::from(id),
        content: row.get("content")?,
        bg_color: row.get("bg_color")?,
        fg_color: row.get("fg_color")?,
        geometry: Geometry {
            x: row.get("x")?,
            y: row.get("y")?,
            width: row.get("width")?,
            height: row.get("height")?,
        },
        window_level,
        created_at: parse_timestamp(&created_text, "created_at")?,
        updated_at: parse_timestamp(&updated_text, "updated_at")?,
    })
}

fn timestamp_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str, column: &str) -> RepoResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| RepoError::InvalidData(format!("invalid timestamp `{value}` in notes.{column}")))
}

fn window_level_to_db(level: WindowLevel) -> &'static str {
    match level {
        WindowLevel::Normal => "normal",
        WindowLevel::AlwaysOnTop => "always_on_top",
        WindowLevel::Desktop => "desktop",
    }
}

fn parse_window_level(value: &str) -> Option<WindowLevel> {
    match value {
        "normal" => Some(WindowLevel::Normal),
        "always_on_top" => Some(WindowLevel::AlwaysOnTop),
        "desktop" => Some(WindowLevel::Desktop),
        _ => None,
    }
}
