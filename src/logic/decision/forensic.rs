//! Forensic Capture
//!
//! Evidence dump written when an account is locked, plus the device
//! metadata that goes with it.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sysinfo::System;

use super::store::StoreError;
use super::types::{DeviceMetadata, ForensicRecord};
use crate::constants::{APP_NAME, APP_VERSION};

pub trait ForensicSink: Send + Sync {
    fn capture(&self, record: &ForensicRecord) -> Result<(), StoreError>;
}

// ============================================================================
// BOUNDED IN-MEMORY LOG
// ============================================================================

/// Forensic records ordered by capture timestamp, oldest evicted first.
/// The record id breaks ties so same-instant captures coexist.
pub struct ForensicLog {
    records: RwLock<BTreeMap<(DateTime<Utc>, String), ForensicRecord>>,
    capacity: usize,
}

impl ForensicLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// First record captured at `timestamp`
    pub fn get(&self, timestamp: &DateTime<Utc>) -> Option<ForensicRecord> {
        self.records
            .read()
            .range((*timestamp, String::new())..)
            .next()
            .filter(|((ts, _), _)| ts == timestamp)
            .map(|(_, record)| record.clone())
    }

    /// All records captured at `timestamp`
    pub fn at(&self, timestamp: &DateTime<Utc>) -> Vec<ForensicRecord> {
        self.records
            .read()
            .range((*timestamp, String::new())..)
            .take_while(|((ts, _), _)| ts == timestamp)
            .map(|(_, record)| record.clone())
            .collect()
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<ForensicRecord> {
        self.records.read().values().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl ForensicSink for ForensicLog {
    fn capture(&self, record: &ForensicRecord) -> Result<(), StoreError> {
        let mut records = self.records.write();
        records.insert((record.timestamp, record.id.clone()), record.clone());

        while records.len() > self.capacity {
            records.pop_first();
        }

        log::info!(
            "[Forensics] Captured {} ({} agents, score {:.2})",
            record.id,
            record.agent_scores.len(),
            record.overall_score
        );
        Ok(())
    }
}

// ============================================================================
// DEVICE METADATA
// ============================================================================

/// Collect host/app metadata. `engine_started` is when the engine came up.
pub fn collect_device_metadata(engine_started: Instant) -> DeviceMetadata {
    DeviceMetadata {
        host_name: hostname::get().ok().map(|h| h.to_string_lossy().to_string()),
        os_name: System::name(),
        os_version: System::long_os_version(),
        kernel_version: System::kernel_version(),
        system_uptime_secs: System::uptime(),
        app_name: APP_NAME.to_string(),
        app_version: APP_VERSION.to_string(),
        engine_uptime_secs: engine_started.elapsed().as_secs(),
    }
}
