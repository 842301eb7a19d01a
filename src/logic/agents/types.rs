//! Agent Types
//!
//! Core types for signal agents.
//! No fusion logic here - only the producer contract and its data.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

// ============================================================================
// ANOMALY RESULT
// ============================================================================

/// One piece of anomaly evidence produced by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyResult {
    /// Stable id of the producing agent
    pub agent_id: String,
    /// Anomaly score (0.0 - 1.0)
    pub score: f64,
    /// Confidence in the score (0.0 - 1.0)
    pub confidence: f64,
    /// When the evidence was produced
    pub timestamp: DateTime<Utc>,
    /// Agent specific detail values
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl AnomalyResult {
    /// New result stamped with the current time
    pub fn new(agent_id: &str, score: f64, confidence: f64) -> Self {
        Self::at(agent_id, score, confidence, Utc::now())
    }

    /// New result with an explicit timestamp
    pub fn at(agent_id: &str, score: f64, confidence: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            score: clamp_unit(score),
            confidence: clamp_unit(confidence),
            timestamp,
            details: BTreeMap::new(),
        }
    }

    /// Attach a detail value
    pub fn with_detail(mut self, key: &str, value: serde_json::Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }

    /// Re-apply the [0,1] bounds (for results that arrived through serde)
    pub fn normalized(mut self) -> Self {
        self.score = clamp_unit(self.score);
        self.confidence = clamp_unit(self.confidence);
        self
    }

    /// Age relative to `now` in milliseconds (future timestamps count as 0)
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        now.signed_duration_since(self.timestamp)
            .num_milliseconds()
            .max(0)
    }

    pub fn kind(&self) -> Option<AgentKind> {
        AgentKind::from_agent_id(&self.agent_id)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ============================================================================
// AGENT KIND
// ============================================================================

/// Signal classes known to the response logic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgentKind {
    /// Touch dynamics (pressure, swipe geometry)
    Touch,
    /// Keystroke dynamics
    Typing,
    /// App usage patterns
    Usage,
    /// Device movement and location
    Movement,
    /// Network trap hits
    Honeypot,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Touch,
        AgentKind::Typing,
        AgentKind::Usage,
        AgentKind::Movement,
        AgentKind::Honeypot,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Touch => "touch",
            AgentKind::Typing => "typing",
            AgentKind::Usage => "usage",
            AgentKind::Movement => "movement",
            AgentKind::Honeypot => "honeypot",
        }
    }

    /// Default fusion weight for agents of this kind
    pub fn default_weight(&self) -> f64 {
        match self {
            AgentKind::Touch => 0.25,
            AgentKind::Typing => 0.20,
            AgentKind::Usage => 0.15,
            AgentKind::Movement => 0.20,
            AgentKind::Honeypot => 0.20,
        }
    }

    /// Resolve the kind from an agent id ("Touch", "touch_agent", "HoneypotAgent", ...)
    pub fn from_agent_id(agent_id: &str) -> Option<Self> {
        let id = agent_id.to_lowercase();
        AgentKind::ALL
            .into_iter()
            .find(|kind| id.contains(kind.as_str()))
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// AGENT CONTRACT
// ============================================================================

/// Producer failure, isolated to one agent
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("agent {0} is not initialized")]
    NotInitialized(String),
    #[error("agent {0} has no score yet")]
    NoScore(String),
    #[error("agent {agent_id} unavailable: {reason}")]
    Unavailable { agent_id: String, reason: String },
    #[error("agent {0} is already registered")]
    AlreadyRegistered(String),
    #[error("agent {agent_id} has invalid weight {weight}")]
    InvalidWeight { agent_id: String, weight: f64 },
}

/// Push side of the agent -> monitor funnel
pub type ResultSender = mpsc::Sender<AnomalyResult>;

/// Contract every signal agent exposes to the fusion core
pub trait SignalAgent: Send + Sync {
    /// Stable identity used as the window key
    fn agent_id(&self) -> &str;

    /// Static fusion weight
    fn weight(&self) -> f64;

    /// Prepare the agent (load baseline etc.). `false` excludes it.
    fn initialize(&self) -> bool;

    /// Begin pushing results into `sink`
    fn start(&self, sink: ResultSender);

    /// Stop pushing results
    fn stop(&self);

    /// Latest score on demand
    fn current_score(&self) -> Result<AnomalyResult, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_is_clamped() {
        let r = AnomalyResult::new("touch", 1.7, -0.2);
        assert_eq!(r.score, 1.0);
        assert_eq!(r.confidence, 0.0);

        let nan = AnomalyResult::new("touch", f64::NAN, 0.5);
        assert_eq!(nan.score, 0.0);
    }

    #[test]
    fn test_kind_from_agent_id() {
        assert_eq!(AgentKind::from_agent_id("Touch"), Some(AgentKind::Touch));
        assert_eq!(AgentKind::from_agent_id("typing_agent"), Some(AgentKind::Typing));
        assert_eq!(AgentKind::from_agent_id("HoneypotAgent"), Some(AgentKind::Honeypot));
        assert_eq!(AgentKind::from_agent_id("gps"), None);
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let sum: f64 = AgentKind::ALL.iter().map(|k| k.default_weight()).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_future_timestamp_has_zero_age() {
        let now = Utc::now();
        let r = AnomalyResult::at("usage", 0.5, 0.5, now + chrono::Duration::seconds(3));
        assert_eq!(r.age_ms(now), 0);
    }
}
