//! Import of notes saved by the JSON-file storage of earlier releases.
//!
//! # Responsibility
//! - Decode the legacy `notes.json` array (float geometry, RFC 3339 times).
//! - Insert every note under its existing identity.
//!
//! # Invariants
//! - Ids already present in the store (live or deleted) are skipped, so the
//!   import can run on every start without duplicating notes.

use crate::model::note::{Geometry, Note, NoteId, WindowLevel};
use crate::store::{SqliteNoteStore, StoreError};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// One note as written by the legacy JSON storage.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyNote {
    pub id: String,
    pub content: String,
    pub bg_color: String,
    pub fg_color: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub window_level: WindowLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LegacyNote> for Note {
    fn from(value: LegacyNote) -> Self {
        Self {
            id: NoteId::from(value.id),
            content: value.content,
            bg_color: value.bg_color,
            fg_color: value.fg_color,
            geometry: Geometry {
                x: value.x.round() as i32,
                y: value.y.round() as i32,
                width: value.width.max(0.0).round() as u32,
                height: value.height.max(0.0).round() as u32,
            },
            window_level: value.window_level,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

/// Outcome counters for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LegacyImportReport {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug)]
pub enum LegacyImportError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Store(StoreError),
}

impl Display for LegacyImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read legacy notes: {err}"),
            Self::Parse(err) => write!(f, "failed to parse legacy notes: {err}"),
            Self::Store(err) => write!(f, "failed to import legacy note: {err}"),
        }
    }
}

impl Error for LegacyImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

/// Parses the legacy JSON document.
pub fn parse_legacy_notes(json: &str) -> Result<Vec<LegacyNote>, LegacyImportError> {
    serde_json::from_str(json).map_err(LegacyImportError::Parse)
}

/// Imports parsed legacy notes, skipping ids the store already knows.
pub fn import_legacy_notes(
    store: &SqliteNoteStore,
    notes: Vec<LegacyNote>,
) -> Result<LegacyImportReport, LegacyImportError> {
    let mut report = LegacyImportReport::default();
    for legacy in notes {
        let note = Note::from(legacy);
        match store.import_note(&note) {
            Ok(()) => report.imported += 1,
            Err(StoreError::DuplicateId(id)) => {
                warn!("event=legacy_import module=store status=skip note_id={id} reason=duplicate_id");
                report.skipped += 1;
            }
            Err(err) => return Err(LegacyImportError::Store(err)),
        }
    }
    info!(
        "event=legacy_import module=store status=ok imported={} skipped={}",
        report.imported, report.skipped
    );
    Ok(report)
}

/// Reads and imports a legacy `notes.json` file.
///
/// A missing file is not an error and imports nothing.
pub fn import_legacy_file(
    store: &SqliteNoteStore,
    path: impl AsRef<Path>,
) -> Result<LegacyImportReport, LegacyImportError> {
    let json = match std::fs::read_to_string(path.as_ref()) {
        Ok(json) => json,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(LegacyImportReport::default());
        }
        Err(err) => return Err(LegacyImportError::Io(err)),
    };
    import_legacy_notes(store, parse_legacy_notes(&json)?)
}
