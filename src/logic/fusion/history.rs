//! Fusion History
//!
//! Bounded FIFO of recent FusionResults. Single writer (the evaluation
//! pipeline), oldest evicted first.

use std::collections::VecDeque;

use serde::Serialize;

use super::types::{FusionResult, ThreatLevel};

pub struct FusionHistory {
    results: VecDeque<FusionResult>,
    capacity: usize,
}

impl FusionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            results: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, result: FusionResult) {
        if self.results.len() == self.capacity {
            self.results.pop_front();
        }
        self.results.push_back(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn latest(&self) -> Option<&FusionResult> {
        self.results.back()
    }

    /// Last `limit` results, oldest first
    pub fn recent(&self, limit: usize) -> Vec<FusionResult> {
        let start = self.results.len().saturating_sub(limit);
        self.results.iter().skip(start).cloned().collect()
    }

    /// Threat levels of the last `n` results, oldest first
    pub fn last_levels(&self, n: usize) -> Vec<ThreatLevel> {
        let start = self.results.len().saturating_sub(n);
        self.results.iter().skip(start).map(|r| r.threat_level).collect()
    }

    pub fn clear(&mut self) {
        self.results.clear();
    }

    pub fn stats(&self) -> FusionStats {
        let mut stats = FusionStats {
            evaluations: self.results.len(),
            ..Default::default()
        };

        for r in &self.results {
            match r.threat_level {
                ThreatLevel::Low => stats.low_count += 1,
                ThreatLevel::Medium => stats.medium_count += 1,
                ThreatLevel::High => stats.high_count += 1,
            }
        }
        if !self.results.is_empty() {
            let sum: f64 = self.results.iter().map(|r| r.overall_score).sum();
            stats.mean_score = sum / self.results.len() as f64;
        }

        stats
    }
}

/// Level distribution over the retained history
#[derive(Debug, Clone, Default, Serialize)]
pub struct FusionStats {
    pub evaluations: usize,
    pub low_count: usize,
    pub medium_count: usize,
    pub high_count: usize,
    pub mean_score: f64,
}
