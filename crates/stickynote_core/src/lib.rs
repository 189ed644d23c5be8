//! Core state sync and persistence for StickyNote windows.
//! This crate is the single source of truth for note invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;
pub mod sync;
pub mod window;

pub use config::{ConfigError, SyncConfig, Theme};
pub use logging::{init_logging, logging_status, LogLevel, LoggingError};
pub use model::note::{Geometry, Note, NoteId, WindowLevel};
pub use model::summary::NoteSummary;
pub use store::{ChangeKind, NoteChange, NoteStore, SqliteNoteStore, StoreError, StoreResult};
pub use sync::geometry::{GeometryPersister, WindowError, WindowEvent, WindowHandle};
pub use sync::list::{Direction, NoteListSync};
pub use sync::session::{LoadState, NoteSession, SessionView};
pub use window::NoteWindow;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
