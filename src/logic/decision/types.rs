//! Decision Types
//!
//! Records, lock state and forensic payloads.
//! No decision logic here.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::agents::AnomalyResult;
use crate::logic::fusion::{ScoreBreakdown, ThreatLevel};

// ============================================================================
// ACTIONS
// ============================================================================

/// Action taken for one fusion evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    Logged,
    ReauthRequired,
    AccountLocked,
    /// The primary step of the action failed
    Error,
}

impl DecisionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::Logged => "LOGGED",
            DecisionAction::ReauthRequired => "REAUTH_REQUIRED",
            DecisionAction::AccountLocked => "ACCOUNT_LOCKED",
            DecisionAction::Error => "ERROR",
        }
    }

    /// Action normally selected for a threat level
    pub fn for_level(level: ThreatLevel) -> Self {
        match level {
            ThreatLevel::Low => DecisionAction::Logged,
            ThreatLevel::Medium => DecisionAction::ReauthRequired,
            ThreatLevel::High => DecisionAction::AccountLocked,
        }
    }
}

impl std::fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Re-authentication modality for MEDIUM decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReauthMethod {
    Biometric,
    LocationVerification,
    ChallengeAndPassword,
    Standard,
}

impl ReauthMethod {
    pub fn prompt(&self) -> &'static str {
        match self {
            ReauthMethod::Biometric => "Please confirm your identity with biometrics",
            ReauthMethod::LocationVerification => "Please verify your current location",
            ReauthMethod::ChallengeAndPassword => "Please answer the security challenge and enter your password",
            ReauthMethod::Standard => "Please sign in again",
        }
    }
}

// ============================================================================
// DECISION RECORD
// ============================================================================

/// Audit entry for one executed decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub threat_level: ThreatLevel,
    pub overall_score: f64,
    pub action: DecisionAction,
    pub agents_involved: BTreeSet<String>,
    pub success: bool,
    pub error_message: Option<String>,
    /// Set for REAUTH_REQUIRED
    pub reauth_method: Option<ReauthMethod>,
}

impl DecisionRecord {
    pub fn new(
        threat_level: ThreatLevel,
        overall_score: f64,
        action: DecisionAction,
        agents_involved: BTreeSet<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            threat_level,
            overall_score,
            action,
            agents_involved,
            success: true,
            error_message: None,
            reauth_method: None,
        }
    }

    pub fn with_reauth_method(mut self, method: ReauthMethod) -> Self {
        self.reauth_method = Some(method);
        self
    }

    /// Mark failed with the collected sub-step errors
    pub fn with_failures(mut self, failures: &[String]) -> Self {
        if !failures.is_empty() {
            self.success = false;
            self.error_message = Some(failures.join("; "));
        }
        self
    }
}

// ============================================================================
// LOCK STATE
// ============================================================================

/// Persistent lock flag kept in the secure state store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockState {
    pub locked: bool,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub score: f64,
}

impl LockState {
    pub fn locked(reason: &str, score: f64) -> Self {
        Self {
            locked: true,
            timestamp: Utc::now(),
            reason: reason.to_string(),
            score,
        }
    }
}

// ============================================================================
// FORENSICS
// ============================================================================

/// Host and app information captured with each forensic record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub host_name: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub system_uptime_secs: u64,
    pub app_name: String,
    pub app_version: String,
    pub engine_uptime_secs: u64,
}

/// Full evidence dump for an account lock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForensicRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub threat_level: ThreatLevel,
    pub overall_score: f64,
    pub reason: String,
    pub recommended_action: String,
    pub agent_scores: BTreeMap<String, AnomalyResult>,
    pub breakdown: ScoreBreakdown,
    pub device: DeviceMetadata,
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct DecisionStats {
    pub total_decisions: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub by_action: HashMap<String, usize>,
    pub account_locked: bool,
}
