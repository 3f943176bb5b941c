use anyhow::Result;

use crate::config::StorageOptions;
use crate::error::PersistenceError;
use crate::store::{Note, NoteId, NoteStore, StoreSnapshot};

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryKv;
pub use sqlite::SqliteKv;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub notes: String,
    pub active: String,
}

impl StorageKeys {
    pub fn from_options(options: &StorageOptions) -> Self {
        Self {
            notes: options.notes_key.clone(),
            active: options.active_key.clone(),
        }
    }
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self::from_options(&StorageOptions::default())
    }
}

#[derive(Debug)]
pub struct SessionPersistence<K> {
    kv: K,
    keys: StorageKeys,
}

impl<K: KeyValueStore> SessionPersistence<K> {
    pub fn new(kv: K, keys: StorageKeys) -> Self {
        Self { kv, keys }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn backend(&self) -> &K {
        &self.kv
    }

    /// Returns `None` when nothing usable is stored. Decode and read failures
    /// are logged and swallowed so the store can fall back to a default note.
    pub fn load(&self) -> Option<StoreSnapshot> {
        let notes = match self.read_notes() {
            Ok(Some(notes)) => notes,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(%err, "discarding unreadable note collection");
                return None;
            }
        };
        let active_id = match self.read_active() {
            Ok(active) => active,
            Err(err) => {
                tracing::warn!(%err, "discarding unreadable active note id");
                None
            }
        };
        tracing::debug!(count = notes.len(), "loaded note collection");
        Some(StoreSnapshot { notes, active_id })
    }

    pub fn save(&self, store: &NoteStore) -> std::result::Result<(), PersistenceError> {
        self.save_snapshot(&store.snapshot())
    }

    pub fn save_snapshot(&self, snapshot: &StoreSnapshot) -> std::result::Result<(), PersistenceError> {
        let notes = serde_json::to_string(&snapshot.notes).map_err(|source| {
            PersistenceError::Encode {
                key: self.keys.notes.clone(),
                source,
            }
        })?;
        let active = serde_json::to_string(
            snapshot
                .active_id
                .as_ref()
                .map(NoteId::as_str)
                .unwrap_or_default(),
        )
        .map_err(|source| PersistenceError::Encode {
            key: self.keys.active.clone(),
            source,
        })?;
        self.write(&self.keys.notes, &notes)?;
        self.write(&self.keys.active, &active)?;
        Ok(())
    }

    fn read_notes(&self) -> std::result::Result<Option<Vec<Note>>, PersistenceError> {
        let Some(raw) = self.read(&self.keys.notes)? else {
            return Ok(None);
        };
        let notes: Vec<Note> =
            serde_json::from_str(&raw).map_err(|source| PersistenceError::Decode {
                key: self.keys.notes.clone(),
                source,
            })?;
        if notes.is_empty() {
            return Ok(None);
        }
        Ok(Some(notes))
    }

    fn read_active(&self) -> std::result::Result<Option<NoteId>, PersistenceError> {
        let Some(raw) = self.read(&self.keys.active)? else {
            return Ok(None);
        };
        let id: String = serde_json::from_str(&raw).map_err(|source| PersistenceError::Decode {
            key: self.keys.active.clone(),
            source,
        })?;
        if id.is_empty() {
            Ok(None)
        } else {
            Ok(Some(NoteId::from(id)))
        }
    }

    fn read(&self, key: &str) -> std::result::Result<Option<String>, PersistenceError> {
        self.kv.get(key).map_err(|err| PersistenceError::Read {
            key: key.to_string(),
            message: format!("{err:#}"),
        })
    }

    fn write(&self, key: &str, value: &str) -> std::result::Result<(), PersistenceError> {
        self.kv.set(key, value).map_err(|err| PersistenceError::Write {
            key: key.to_string(),
            message: format!("{err:#}"),
        })
    }
}
