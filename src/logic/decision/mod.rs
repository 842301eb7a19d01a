//! Decision Module
//!
//! Maps a FusionResult to a concrete action and executes it.
//!
//! ## Structure
//! - `types`: DecisionAction, DecisionRecord, LockState, ForensicRecord
//! - `store`: SecureStateStore trait + in-memory store
//! - `sqlite_store`: persistent store
//! - `forensic`: ForensicSink trait, bounded log, device metadata
//! - `audit`: JSONL decision audit with rotation
//! - `engine`: DecisionEngine
//!
//! ## Flow
//! ```text
//! FusionResult -> DecisionEngine::decide
//!   LOW    -> log
//!   MEDIUM -> ReauthRequested event
//!   HIGH   -> lock flag, sessions, caches, forensics, AccountLocked event
//!         -> DecisionRecord (history + audit)
//! ```

pub mod types;
pub mod store;
pub mod sqlite_store;
pub mod forensic;
pub mod audit;
pub mod engine;

#[cfg(test)]
mod tests;

pub use types::{
    DecisionAction, DecisionRecord, DecisionStats, DeviceMetadata, ForensicRecord, LockState,
    ReauthMethod,
};
pub use store::{MemoryStateStore, SecureStateStore, StoreError};
pub use sqlite_store::SqliteStateStore;
pub use forensic::{collect_device_metadata, ForensicLog, ForensicSink};
pub use audit::{read_records, AuditWriter};
pub use engine::{select_reauth_method, DecisionEngine};
