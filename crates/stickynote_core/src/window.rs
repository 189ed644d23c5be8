//! One desktop note window.
//!
//! # Responsibility
//! - Compose the session, the geometry persister and the list synchronizer
//!   that serve a single window.
//! - Implement the window-level flows: switch, create, delete, navigate and
//!   first-use theming.
//!
//! # Invariants
//! - The geometry persister always targets the session's subject.
//! - Deleting a note evicts its pending writes before the store delete, so a
//!   debounced save can't race the deletion.

use crate::config::{SyncConfig, Theme};
use crate::model::note::{Note, NoteId, WindowLevel, DEFAULT_BG_COLOR, DEFAULT_FG_COLOR};
use crate::store::{NoteStore, StoreResult};
use crate::sync::geometry::{GeometryObserver, GeometryPersister, WindowHandle};
use crate::sync::list::{Direction, NoteListSync};
use crate::sync::lock_unpoisoned;
use crate::sync::session::NoteSession;
use log::{debug, info};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// State sync for one note window.
pub struct NoteWindow {
    store: Arc<dyn NoteStore>,
    window: Arc<dyn WindowHandle>,
    config: SyncConfig,
    session: Arc<NoteSession>,
    list: NoteListSync,
    geometry: Mutex<Option<GeometryPersister>>,
    themed: Mutex<HashSet<NoteId>>,
}

impl NoteWindow {
    /// Starts syncing a window, optionally opening `subject` right away.
    pub fn open(
        store: Arc<dyn NoteStore>,
        window: Arc<dyn WindowHandle>,
        config: SyncConfig,
        subject: Option<NoteId>,
    ) -> Self {
        let session = Arc::new(NoteSession::new(
            Arc::clone(&store),
            config.content_save_delay(),
        ));
        let list = NoteListSync::start(Arc::clone(&store), &config);
        let note_window = Self {
            store,
            window,
            config,
            session,
            list,
            geometry: Mutex::new(None),
            themed: Mutex::new(HashSet::new()),
        };
        if let Some(id) = subject {
            note_window.switch_note(id);
        }
        info!("event=window_open module=window status=ok");
        note_window
    }

    pub fn session(&self) -> &NoteSession {
        &self.session
    }

    pub fn list(&self) -> &NoteListSync {
        &self.list
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Shows `id` in this window.
    pub fn switch_note(&self, id: NoteId) {
        let mut geometry = lock_unpoisoned(&self.geometry);
        if geometry
            .as_ref()
            .is_some_and(|persister| persister.subject() != &id)
        {
            if let Some(previous) = geometry.take() {
                // Pending geometry for the outgoing note is written, not dropped.
                let _ = previous.stop();
            }
        }
        self.session.switch_subject(Some(id.clone()));
        if geometry.is_none() {
            let observer: Arc<dyn GeometryObserver> = self.session.clone();
            *geometry = Some(GeometryPersister::start_observed(
                id,
                Arc::clone(&self.window),
                Arc::clone(&self.store),
                self.config.geometry_save_delay(),
                Some(observer),
            ));
        }
    }

    /// Creates a note and shows it.
    pub async fn create_note(&self) -> StoreResult<Note> {
        let note = self.store.create().await?;
        info!("event=note_create module=window status=ok note_id={}", note.id);
        self.switch_note(note.id.clone());
        self.list.queue_refresh();
        Ok(note)
    }

    /// Deletes `id`. When it is the open note, shows the most recently
    /// updated remaining note, or a fresh one when none remain.
    pub async fn delete_note(&self, id: &NoteId) -> StoreResult<()> {
        self.evict_pending(id);
        self.store.delete(id).await?;
        lock_unpoisoned(&self.themed).remove(id);
        info!("event=note_delete module=window status=ok note_id={id}");

        if self.session.subject().as_ref() == Some(id) {
            // Edits that raced the delete are dropped, not flushed by the switch.
            self.evict_pending(id);
            drop(lock_unpoisoned(&self.geometry).take());

            match self.store.list().await?.into_iter().next() {
                Some(next) => self.switch_note(next.id),
                None => {
                    self.create_note().await?;
                }
            }
        }
        self.list.queue_refresh();
        Ok(())
    }

    fn evict_pending(&self, id: &NoteId) {
        let content = self.session.discard_pending(id);
        let geometry = lock_unpoisoned(&self.geometry)
            .as_ref()
            .is_some_and(|persister| persister.discard_for(id));
        if content || geometry {
            debug!(
                "event=pending_evict module=window note_id={id} content={content} geometry={geometry}"
            );
        }
    }

    /// Moves to the neighbouring note of the list, wrapping at both ends.
    pub fn navigate(&self, direction: Direction) -> Option<NoteId> {
        let current = self.session.subject()?;
        let next = self.list.adjacent(&current, direction)?;
        if next != current {
            self.switch_note(next.clone());
        }
        Some(next)
    }

    /// Gives a freshly created note the preferred theme, once per note.
    ///
    /// Only the first check of a loaded note counts: it applies when the note
    /// still has the built-in colors and no content, and a note that had
    /// content then is never themed later. Returns whether the colors changed.
    pub fn apply_default_theme(&self, theme: &Theme) -> bool {
        if theme.bg == DEFAULT_BG_COLOR && theme.fg == DEFAULT_FG_COLOR {
            return false;
        }
        let Some(note) = self.session.current_note() else {
            return false;
        };
        if !lock_unpoisoned(&self.themed).insert(note.id.clone()) || !note.is_untouched() {
            return false;
        }
        let applied = self
            .session
            .update_colors(theme.bg.as_str(), theme.fg.as_str());
        debug!(
            "event=theme_apply module=window note_id={} applied={applied}",
            note.id
        );
        applied
    }

    /// Applies the configured preferred theme, if any.
    pub fn apply_configured_theme(&self) -> bool {
        match &self.config.default_theme {
            Some(theme) => self.apply_default_theme(theme),
            None => false,
        }
    }

    /// Persists the stacking level of the open note immediately.
    ///
    /// Returns `false` when no note is loaded.
    pub async fn set_window_level(&self, level: WindowLevel) -> StoreResult<bool> {
        let Some(id) = self.session.current_note().map(|note| note.id) else {
            return Ok(false);
        };
        self.store.set_window_level(&id, level).await?;
        self.session.absorb_window_level(&id, level);
        Ok(true)
    }

    /// Stops every timer and subscription and writes pending edits.
    pub async fn teardown(self) {
        self.list.teardown();
        let geometry = lock_unpoisoned(&self.geometry).take();
        if let Some(persister) = geometry {
            persister.teardown().await;
        }
        self.session.teardown().await;
        info!("event=window_teardown module=window status=ok");
    }
}
