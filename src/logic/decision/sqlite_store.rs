//! SQLite State Store
//!
//! Persistent SecureStateStore backed by a local SQLite file.
//! Lock flag survives restarts; sessions and cache regions are plain tables.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use super::store::{SecureStateStore, StoreError};
use super::types::LockState;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS lock_state (
        id           INTEGER PRIMARY KEY CHECK (id = 1),
        locked       INTEGER NOT NULL,
        timestamp_ms INTEGER NOT NULL,
        reason       TEXT    NOT NULL,
        score        REAL    NOT NULL
    );
    CREATE TABLE IF NOT EXISTS sessions (
        session_id    TEXT PRIMARY KEY,
        created_at_ms INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS cache_entries (
        region TEXT NOT NULL,
        key    TEXT NOT NULL,
        value  BLOB,
        PRIMARY KEY (region, key)
    );
";

pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        log::info!("[StateStore] Opened state store: {:?}", path);
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn add_session(&self, session_id: &str) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO sessions (session_id, created_at_ms) VALUES (?1, ?2)",
            params![session_id, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    pub fn session_count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn put_cache(&self, region: &str, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO cache_entries (region, key, value) VALUES (?1, ?2, ?3)",
            params![region, key, value],
        )?;
        Ok(())
    }

    pub fn cache_len(&self, region: &str) -> Result<usize, StoreError> {
        let count: i64 = self.conn.lock().query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE region = ?1",
            params![region],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl SecureStateStore for SqliteStateStore {
    fn set_lock(&self, state: &LockState) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO lock_state (id, locked, timestamp_ms, reason, score)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                state.locked,
                state.timestamp.timestamp_millis(),
                state.reason,
                state.score
            ],
        )?;
        Ok(())
    }

    fn lock_state(&self) -> Result<Option<LockState>, StoreError> {
        let row = self
            .conn
            .lock()
            .query_row(
                "SELECT locked, timestamp_ms, reason, score FROM lock_state WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, bool>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((locked, timestamp_ms, reason, score)) = row else {
            return Ok(None);
        };

        let timestamp: DateTime<Utc> = DateTime::from_timestamp_millis(timestamp_ms)
            .ok_or_else(|| StoreError::Corrupt(format!("lock timestamp {}", timestamp_ms)))?;

        Ok(Some(LockState { locked, timestamp, reason, score }))
    }

    fn clear_lock(&self) -> Result<(), StoreError> {
        self.conn.lock().execute("DELETE FROM lock_state", [])?;
        Ok(())
    }

    fn invalidate_sessions(&self) -> Result<usize, StoreError> {
        let removed = self.conn.lock().execute("DELETE FROM sessions", [])?;
        Ok(removed)
    }

    fn clear_cache(&self, name: &str) -> Result<(), StoreError> {
        self.conn
            .lock()
            .execute("DELETE FROM cache_entries WHERE region = ?1", params![name])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("state.db");

        {
            let store = SqliteStateStore::open(&path).unwrap();
            store.set_lock(&LockState::locked("network trap triggered", 0.97)).unwrap();
            // Re-lock refreshes the single row
            store.set_lock(&LockState::locked("refreshed", 0.99)).unwrap();
        }

        let store = SqliteStateStore::open(&path).unwrap();
        let state = store.lock_state().unwrap().unwrap();
        assert!(state.locked);
        assert_eq!(state.reason, "refreshed");
        assert_eq!(state.score, 0.99);

        store.clear_lock().unwrap();
        assert!(store.lock_state().unwrap().is_none());
    }

    #[test]
    fn test_sessions_and_cache_regions() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store.add_session("a").unwrap();
        store.add_session("b").unwrap();
        store.put_cache("credentials", "pin", b"1234").unwrap();
        store.put_cache("payment_tokens", "card", b"tok").unwrap();

        assert_eq!(store.invalidate_sessions().unwrap(), 2);
        assert_eq!(store.session_count().unwrap(), 0);

        store.clear_cache("credentials").unwrap();
        assert_eq!(store.cache_len("credentials").unwrap(), 0);
        assert_eq!(store.cache_len("payment_tokens").unwrap(), 1);
    }
}
