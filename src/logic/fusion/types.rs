//! Fusion Types
//!
//! Core types for multi-agent fusion.
//! No logic here - only data structures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::agents::AnomalyResult;

// ============================================================================
// THREAT LEVEL
// ============================================================================

/// Discrete classification of the fused score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    /// Log only
    Low,
    /// Step-up re-authentication
    Medium,
    /// Lock the account
    High,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// SCORE BREAKDOWN
// ============================================================================

/// Intermediate values of one evaluation (for explainability)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base_score: f64,
    pub temporal_score: f64,
    pub blended_score: f64,
    pub avg_confidence: f64,
    pub final_score: f64,
}

// ============================================================================
// FUSION RESULT
// ============================================================================

/// Outcome of one fusion evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionResult {
    pub overall_score: f64,
    pub threat_level: ThreatLevel,
    /// Window snapshot the score was computed from
    pub agent_scores: BTreeMap<String, AnomalyResult>,
    pub timestamp: DateTime<Utc>,
    pub recommended_action: String,
    pub breakdown: ScoreBreakdown,
}

impl FusionResult {
    /// Agents whose score is strictly above `cutoff`
    pub fn agents_above(&self, cutoff: f64) -> Vec<&AnomalyResult> {
        self.agent_scores
            .values()
            .filter(|r| r.score > cutoff)
            .collect()
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = &String> {
        self.agent_scores.keys()
    }
}
