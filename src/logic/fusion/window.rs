//! Result Window
//!
//! Latest AnomalyResult per agent, bounded by a time-to-live.
//! Each ingest replaces the whole entry under the write lock, so readers
//! never observe a half-written result.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::logic::agents::AnomalyResult;

pub struct ResultWindow {
    entries: RwLock<HashMap<String, AnomalyResult>>,
    time_window_ms: AtomicU64,
}

impl ResultWindow {
    pub fn new(time_window_ms: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            time_window_ms: AtomicU64::new(time_window_ms),
        }
    }

    /// Overwrite the entry for `result.agent_id`
    pub fn ingest(&self, result: AnomalyResult) {
        self.entries.write().insert(result.agent_id.clone(), result);
    }

    /// Fresh entries, ordered by agent id. Stale entries are purged.
    pub fn snapshot(&self) -> BTreeMap<String, AnomalyResult> {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> BTreeMap<String, AnomalyResult> {
        self.purge_at(now);
        self.entries
            .read()
            .iter()
            .map(|(id, r)| (id.clone(), r.clone()))
            .collect()
    }

    /// Post-purge entry count
    pub fn size(&self) -> usize {
        self.size_at(Utc::now())
    }

    pub fn size_at(&self, now: DateTime<Utc>) -> usize {
        self.purge_at(now);
        self.entries.read().len()
    }

    pub fn time_window_ms(&self) -> u64 {
        self.time_window_ms.load(Ordering::Relaxed)
    }

    /// Follow a reconfigured time window
    pub fn set_time_window(&self, time_window_ms: u64) {
        self.time_window_ms.store(time_window_ms, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn purge_at(&self, now: DateTime<Utc>) {
        let ttl = self.time_window_ms();
        let mut entries = self.entries.write();
        let before = entries.len();
        // Distance in either direction: a future-stamped result is no fresher
        // than the clock skew allows
        entries.retain(|_, r| {
            now.signed_duration_since(r.timestamp)
                .num_milliseconds()
                .unsigned_abs()
                <= ttl
        });

        let purged = before - entries.len();
        if purged > 0 {
            log::debug!("[Window] Purged {} stale results", purged);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    #[test]
    fn test_ingest_overwrites_same_agent() {
        let window = ResultWindow::new(10_000);
        window.ingest(AnomalyResult::new("touch", 0.2, 1.0));
        window.ingest(AnomalyResult::new("touch", 0.8, 1.0));

        let snap = window.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap["touch"].score, 0.8);
    }

    #[test]
    fn test_stale_entries_are_purged() {
        let now = Utc::now();
        let window = ResultWindow::new(5_000);
        window.ingest(AnomalyResult::at("touch", 0.5, 1.0, now - Duration::milliseconds(6_000)));
        window.ingest(AnomalyResult::at("typing", 0.5, 1.0, now - Duration::milliseconds(5_000)));
        window.ingest(AnomalyResult::at("usage", 0.5, 1.0, now));

        assert_eq!(window.size_at(now), 2);
        let snap = window.snapshot_at(now);
        assert!(!snap.contains_key("touch"));
        assert!(snap.contains_key("typing"));

        // Purge is a real side effect, not just a filtered view
        assert_eq!(window.entries.read().len(), 2);
    }

    #[test]
    fn test_future_stamped_entries_expire() {
        let now = Utc::now();
        let window = ResultWindow::new(30_000);
        window.ingest(AnomalyResult::at("honeypot", 1.0, 1.0, now + Duration::days(365)));
        window.ingest(AnomalyResult::at("typing", 0.4, 1.0, now + Duration::seconds(10)));

        // Small skew is tolerated, a bad clock is not
        let snap = window.snapshot_at(now);
        assert!(!snap.contains_key("honeypot"));
        assert!(snap.contains_key("typing"));

        assert_eq!(window.size_at(now + Duration::hours(1)), 0);
    }

    #[test]
    fn test_shrinking_window_purges_on_next_read() {
        let now = Utc::now();
        let window = ResultWindow::new(60_000);
        window.ingest(AnomalyResult::at("movement", 0.4, 0.9, now - Duration::seconds(20)));
        assert_eq!(window.size_at(now), 1);

        window.set_time_window(10_000);
        assert_eq!(window.size_at(now), 0);
    }

    #[test]
    fn test_concurrent_ingest() {
        let window = Arc::new(ResultWindow::new(60_000));
        let handles: Vec<_> = ["touch", "typing", "usage", "movement", "honeypot"]
            .into_iter()
            .map(|id| {
                let window = window.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        window.ingest(AnomalyResult::new(id, (i % 10) as f64 / 10.0, 1.0));
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let snap = window.snapshot();
        assert_eq!(snap.len(), 5);
        for (id, result) in &snap {
            assert_eq!(&result.agent_id, id);
            assert_eq!(result.score, 0.9);
        }
    }
}
