use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;

use super::{schema, KeyValueStore};
use crate::config::StorageOptions;

/// Durable key-value table in a SQLite file. Each call opens its own
/// connection.
#[derive(Debug, Clone)]
pub struct SqliteKv {
    db_path: Arc<PathBuf>,
    wal_autocheckpoint: u32,
}

impl SqliteKv {
    pub fn open(options: &StorageOptions) -> Result<Self> {
        let db_path = &options.database_path;
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating data directory {}", parent.display()))?;
        }
        let kv = Self {
            db_path: Arc::new(db_path.clone()),
            wal_autocheckpoint: options.wal_autocheckpoint,
        };
        let conn = kv.connect()?;
        schema::apply(&conn)?;
        tracing::debug!(path = %db_path.display(), "opened sqlite key-value store");
        Ok(kv)
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        self.prepare_connection(&conn)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<Result<Vec<_>, _>>()
                .context("listing stored keys")
        })
    }

    fn prepare_connection(&self, conn: &Connection) -> Result<()> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("setting journal_mode=WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("setting synchronous=NORMAL")?;
        conn.pragma_update(
            None,
            "wal_autocheckpoint",
            self.wal_autocheckpoint.to_string(),
        )
        .context("setting wal_autocheckpoint")?;
        Ok(())
    }
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_connection(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .with_context(|| format!("reading key {key}"))
        })
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .with_context(|| format!("writing key {key}"))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SessionPersistence, StorageKeys};
    use crate::store::NoteStore;
    use tempfile::TempDir;

    fn open_temp() -> Result<(TempDir, SqliteKv)> {
        let temp = TempDir::new()?;
        let mut options = StorageOptions::default();
        options.database_path = temp.path().join("data").join("notepad.db");
        let kv = SqliteKv::open(&options)?;
        Ok((temp, kv))
    }

    #[test]
    fn upserts_values() -> Result<()> {
        let (_temp, kv) = open_temp()?;
        assert_eq!(kv.get("alpha")?, None);
        kv.set("alpha", "1")?;
        kv.set("alpha", "2")?;
        kv.set("beta", "3")?;
        assert_eq!(kv.get("alpha")?.as_deref(), Some("2"));
        assert_eq!(kv.keys()?, vec!["alpha".to_string(), "beta".to_string()]);
        Ok(())
    }

    #[test]
    fn survives_reopen() -> Result<()> {
        let (temp, kv) = open_temp()?;
        let mut store = NoteStore::hydrate(None);
        let id = store.create(Some("Durable"));
        store.update_content(&id, "kept across sessions");
        SessionPersistence::new(&kv, StorageKeys::default()).save(&store)?;
        drop(kv);

        let mut options = StorageOptions::default();
        options.database_path = temp.path().join("data").join("notepad.db");
        let reopened = SqliteKv::open(&options)?;
        let restored =
            NoteStore::hydrate(SessionPersistence::new(&reopened, StorageKeys::default()).load());
        assert_eq!(restored.snapshot(), store.snapshot());
        Ok(())
    }
}
