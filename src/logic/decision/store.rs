//! Secure State Store
//!
//! Interface to the lock flag, the session table and the sensitive cache
//! regions. The decision engine only talks to this trait.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;

use super::types::LockState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub trait SecureStateStore: Send + Sync {
    /// Write (or refresh) the lock flag
    fn set_lock(&self, state: &LockState) -> Result<(), StoreError>;

    fn lock_state(&self) -> Result<Option<LockState>, StoreError>;

    fn clear_lock(&self) -> Result<(), StoreError>;

    /// Drop every active session. Returns how many were removed.
    fn invalidate_sessions(&self) -> Result<usize, StoreError>;

    /// Wipe one named cache region
    fn clear_cache(&self, name: &str) -> Result<(), StoreError>;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Process-local store (tests, demos, platforms with their own persistence)
#[derive(Default)]
pub struct MemoryStateStore {
    lock: RwLock<Option<LockState>>,
    sessions: RwLock<HashMap<String, DateTime<Utc>>>,
    caches: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_session(&self, session_id: &str) {
        self.sessions.write().insert(session_id.to_string(), Utc::now());
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn put_cache(&self, region: &str, key: &str, value: Vec<u8>) {
        self.caches
            .write()
            .entry(region.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn cache_len(&self, region: &str) -> usize {
        self.caches.read().get(region).map(|c| c.len()).unwrap_or(0)
    }
}

impl SecureStateStore for MemoryStateStore {
    fn set_lock(&self, state: &LockState) -> Result<(), StoreError> {
        *self.lock.write() = Some(state.clone());
        Ok(())
    }

    fn lock_state(&self) -> Result<Option<LockState>, StoreError> {
        Ok(self.lock.read().clone())
    }

    fn clear_lock(&self) -> Result<(), StoreError> {
        self.lock.write().take();
        Ok(())
    }

    fn invalidate_sessions(&self) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.write();
        let count = sessions.len();
        sessions.clear();
        Ok(count)
    }

    fn clear_cache(&self, name: &str) -> Result<(), StoreError> {
        self.caches.write().remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_lock_roundtrip() {
        let store = MemoryStateStore::new();
        assert!(store.lock_state().unwrap().is_none());

        store.set_lock(&LockState::locked("test", 0.95)).unwrap();
        let state = store.lock_state().unwrap().unwrap();
        assert!(state.locked);
        assert_eq!(state.reason, "test");

        store.clear_lock().unwrap();
        assert!(store.lock_state().unwrap().is_none());
    }

    #[test]
    fn test_memory_store_sessions_and_caches() {
        let store = MemoryStateStore::new();
        store.add_session("s1");
        store.add_session("s2");
        store.put_cache("credentials", "token", vec![1, 2, 3]);
        store.put_cache("other", "k", vec![0]);

        assert_eq!(store.invalidate_sessions().unwrap(), 2);
        assert_eq!(store.session_count(), 0);

        store.clear_cache("credentials").unwrap();
        assert_eq!(store.cache_len("credentials"), 0);
        assert_eq!(store.cache_len("other"), 1);
    }
}
