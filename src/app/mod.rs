use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::error::{NotepadError, NotepadResult, PersistenceError};
use crate::export::{self, ExportFormat};
use crate::session::{Clock, CommitEvent, EditSession, SessionStatus, SystemClock};
use crate::storage::{KeyValueStore, SessionPersistence, StorageKeys};
use crate::store::{Note, NoteId, NoteStore};
use crate::text::{self, DocumentStats, TransformOp};

mod actions;

pub use actions::Action;

#[derive(Debug, Default)]
pub struct MutationOutcome {
    pub changed: bool,
    pub committed: Option<CommitEvent>,
    /// Set when the change is only held in memory.
    pub warning: Option<PersistenceError>,
}

impl MutationOutcome {
    fn unchanged() -> Self {
        Self::default()
    }
}

pub struct Notepad<K, C = SystemClock> {
    store: NoteStore,
    persistence: SessionPersistence<K>,
    session: EditSession<C>,
}

impl<K: KeyValueStore> Notepad<K, SystemClock> {
    pub fn open(kv: K, config: &AppConfig) -> Self {
        Self::open_with_clock(kv, config, SystemClock)
    }
}

impl<K: KeyValueStore, C: Clock> Notepad<K, C> {
    pub fn open_with_clock(kv: K, config: &AppConfig, clock: C) -> Self {
        let persistence = SessionPersistence::new(kv, StorageKeys::from_options(&config.storage));
        let loaded = persistence.load();
        let store = NoteStore::hydrate(loaded.clone());
        let mut notepad = Self {
            store,
            persistence,
            session: EditSession::with_clock(&config.editor, clock),
        };
        notepad.session.attach(&mut notepad.store);
        if loaded.as_ref() != Some(&notepad.store.snapshot()) {
            if let Some(err) = notepad.persist() {
                tracing::warn!(%err, "initial note state not persisted");
            }
        }
        tracing::info!(count = notepad.store.len(), "notepad ready");
        notepad
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    pub fn session(&self) -> &EditSession<C> {
        &self.session
    }

    pub fn persistence(&self) -> &SessionPersistence<K> {
        &self.persistence
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.store.notes()
    }

    pub fn active_note(&self) -> Option<&Note> {
        self.store.active_note()
    }

    pub fn resolve(&self, needle: &str) -> Option<NoteId> {
        self.store.resolve(needle).cloned()
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn create(&mut self, title_hint: Option<&str>) -> MutationOutcome {
        let id = self.store.create(title_hint);
        tracing::debug!(note_id = %id, "created note");
        self.after_mutation(true)
    }

    pub fn select(&mut self, id: &NoteId) -> NotepadResult<MutationOutcome> {
        if self.store.active_id() == Some(id) {
            return Ok(MutationOutcome::unchanged());
        }
        self.store.select(id)?;
        Ok(self.after_mutation(true))
    }

    pub fn rename(&mut self, id: &NoteId, title: &str) -> MutationOutcome {
        let changed = self.store.rename(id, title);
        self.after_mutation(changed)
    }

    pub fn delete(&mut self, id: &NoteId) -> MutationOutcome {
        let changed = self.store.delete(id);
        self.after_mutation(changed)
    }

    /// Commits canonical plaintext directly, bypassing the debounce window.
    pub fn update_content(&mut self, id: &NoteId, content: &str) -> MutationOutcome {
        let mut committed = None;
        if self.session.note_id() == Some(id) {
            committed = self.session.flush(&mut self.store);
        }
        let changed = self.store.update_content(id, content);
        let mut outcome = self.after_mutation(changed || committed.is_some());
        outcome.committed = outcome.committed.or(committed);
        outcome
    }

    /// Feeds raw surface content into the edit session.
    pub fn input(&mut self, rich: &str) {
        self.session.on_input(rich);
    }

    /// Editable rendering of the active note, pending edits included.
    pub fn editable(&self) -> String {
        self.session.editable()
    }

    /// Host tick: lands a debounced commit when its window has passed.
    pub fn tick(&mut self) -> MutationOutcome {
        match self.session.poll(&mut self.store) {
            Some(event) => self.committed(event),
            None => MutationOutcome::unchanged(),
        }
    }

    pub fn flush(&mut self) -> MutationOutcome {
        match self.session.flush(&mut self.store) {
            Some(event) => self.committed(event),
            None => MutationOutcome::unchanged(),
        }
    }

    /// Runs a transform over the active note without committing it.
    pub fn preview_transform(&self, op: TransformOp) -> String {
        let content = self.active_note().map(|n| n.content.as_str()).unwrap_or("");
        text::transform(content, op)
    }

    pub fn apply_transform(&mut self, op: TransformOp) -> MutationOutcome {
        let flushed = self.session.flush(&mut self.store);
        let Some(active) = self.store.active_note() else {
            return MutationOutcome::unchanged();
        };
        let id = active.id.clone();
        let transformed = text::transform(&active.content, op);
        let differs = transformed != active.content;
        let changed = differs && self.store.update_content(&id, &transformed);
        tracing::debug!(note_id = %id, %op, changed, "applied transform");
        let mut outcome = self.after_mutation(changed || flushed.is_some());
        outcome.committed = flushed;
        outcome
    }

    pub fn stats(&self) -> DocumentStats {
        self.active_note()
            .map(|n| DocumentStats::compute(&n.content))
            .unwrap_or_default()
    }

    pub fn export_active(&self, format: ExportFormat, dir: &Path) -> NotepadResult<PathBuf> {
        let note = self
            .active_note()
            .ok_or_else(|| NotepadError::InvalidInput("no active note".into()))?;
        export::export_note(note, format, dir)
    }

    /// Flushes pending edits and persists. Call before the host goes away.
    pub fn close(&mut self) -> MutationOutcome {
        match self.session.detach(&mut self.store) {
            Some(event) => self.committed(event),
            None => MutationOutcome::unchanged(),
        }
    }

    fn committed(&mut self, event: CommitEvent) -> MutationOutcome {
        MutationOutcome {
            changed: true,
            committed: Some(event),
            warning: self.persist(),
        }
    }

    fn after_mutation(&mut self, changed: bool) -> MutationOutcome {
        let committed = self.session.attach(&mut self.store);
        if !changed && committed.is_none() {
            return MutationOutcome::unchanged();
        }
        MutationOutcome {
            changed: true,
            committed,
            warning: self.persist(),
        }
    }

    fn persist(&mut self) -> Option<PersistenceError> {
        match self.persistence.save(&self.store) {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(%err, "note state is only held in memory");
                Some(err)
            }
        }
    }
}
