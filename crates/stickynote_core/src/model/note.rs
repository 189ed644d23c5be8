//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record persisted by the store gateway.
//! - Provide creation defaults and the snapshot helpers used by mutations.
//!
//! # Invariants
//! - `id` is stable and never reused for another note, even after deletion.
//! - `created_at` never changes after creation.
//! - `updated_at` is rewritten by every content/color mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Background color assigned to freshly created notes.
pub const DEFAULT_BG_COLOR: &str = "#0a0e14";
/// Foreground color assigned to freshly created notes.
pub const DEFAULT_FG_COLOR: &str = "#00ff88";
/// Default window position and size for freshly created notes.
pub const DEFAULT_GEOMETRY: Geometry = Geometry {
    x: 100,
    y: 100,
    width: 320,
    height: 280,
};

/// Opaque note identifier.
///
/// Generated as UUID v4 text by [`NoteId::generate`]; any non-empty string is
/// accepted when an identity already exists (import paths, tests).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Creates a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stacking level of a note window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowLevel {
    #[default]
    Normal,
    AlwaysOnTop,
    /// Pinned below regular windows.
    Desktop,
}

/// Window position and size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Canonical persisted note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Serialized rich-text document. Opaque to the core.
    pub content: String,
    pub bg_color: String,
    pub fg_color: String,
    pub geometry: Geometry,
    pub window_level: WindowLevel,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates a note with a generated id and default theme/geometry.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_id(NoteId::generate(), now)
    }

    /// Creates a note with a caller-provided id and default theme/geometry.
    pub fn with_id(id: NoteId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            content: String::new(),
            bg_color: DEFAULT_BG_COLOR.to_string(),
            fg_color: DEFAULT_FG_COLOR.to_string(),
            geometry: DEFAULT_GEOMETRY,
            window_level: WindowLevel::Normal,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns a snapshot with replaced content and a fresh `updated_at`.
    pub fn with_content(&self, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            updated_at: now,
            ..self.clone()
        }
    }

    /// Returns a snapshot with replaced colors and a fresh `updated_at`.
    pub fn with_colors(
        &self,
        bg_color: impl Into<String>,
        fg_color: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            bg_color: bg_color.into(),
            fg_color: fg_color.into(),
            updated_at: now,
            ..self.clone()
        }
    }

    /// Whether the note still carries creation colors and no meaningful content.
    ///
    /// Editors serialize an empty document as `<p></p>`, which counts as empty.
    pub fn is_untouched(&self) -> bool {
        let content = self.content.trim();
        self.bg_color == DEFAULT_BG_COLOR
            && self.fg_color == DEFAULT_FG_COLOR
            && (content.is_empty() || content == "<p></p>")
    }
}
