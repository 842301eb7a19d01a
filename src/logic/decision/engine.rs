//! Decision Engine
//!
//! Turns a FusionResult into an executed, audited action.
//! LOW -> log, MEDIUM -> re-authentication request, HIGH -> lock + forensics.
//!
//! Every side effect is isolated: a failing sub-step is recorded on the
//! DecisionRecord and the remaining sub-steps still run.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use super::audit::AuditWriter;
use super::forensic::{collect_device_metadata, ForensicSink};
use super::store::{SecureStateStore, StoreError};
use super::types::{
    DecisionAction, DecisionRecord, DecisionStats, ForensicRecord, LockState, ReauthMethod,
};
use crate::constants::{DECISION_HISTORY_CAPACITY, DEFAULT_SENSITIVE_CACHES};
use crate::logic::agents::AgentKind;
use crate::logic::events::{EventBus, MonitorEvent};
use crate::logic::fusion::{FusionResult, ThreatLevel, REAUTH_CUTOFF};

pub struct DecisionEngine {
    store: Arc<dyn SecureStateStore>,
    forensics: Arc<dyn ForensicSink>,
    events: EventBus,
    audit: Option<Mutex<AuditWriter>>,
    sensitive_caches: Vec<String>,
    history: RwLock<VecDeque<DecisionRecord>>,
    capacity: usize,
    started_at: Instant,
}

impl DecisionEngine {
    pub fn new(
        store: Arc<dyn SecureStateStore>,
        forensics: Arc<dyn ForensicSink>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            forensics,
            events,
            audit: None,
            sensitive_caches: DEFAULT_SENSITIVE_CACHES.iter().map(|s| s.to_string()).collect(),
            history: RwLock::new(VecDeque::new()),
            capacity: DECISION_HISTORY_CAPACITY,
            started_at: Instant::now(),
        }
    }

    pub fn with_sensitive_caches(mut self, caches: Vec<String>) -> Self {
        self.sensitive_caches = caches;
        self
    }

    pub fn with_audit_writer(mut self, writer: AuditWriter) -> Self {
        self.audit = Some(Mutex::new(writer));
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    // ========================================================================
    // MAIN DECISION FUNCTION
    // ========================================================================

    /// Execute the action for `result` and record it
    pub fn decide(&self, result: &FusionResult) -> DecisionRecord {
        let record = match result.threat_level {
            ThreatLevel::Low => self.log_only(result),
            ThreatLevel::Medium => self.require_reauth(result),
            ThreatLevel::High => self.lock_account(result),
        };

        self.record(record.clone());
        record
    }

    fn log_only(&self, result: &FusionResult) -> DecisionRecord {
        log::info!(
            "[Decision] LOGGED score {:.3} ({} agents)",
            result.overall_score,
            result.agent_scores.len()
        );
        base_record(result, DecisionAction::Logged)
    }

    fn require_reauth(&self, result: &FusionResult) -> DecisionRecord {
        let method = select_reauth_method(result);
        let message = format!(
            "Unusual activity detected (risk {:.0}%). {}",
            result.overall_score * 100.0,
            method.prompt()
        );

        log::warn!(
            "[Decision] REAUTH_REQUIRED via {:?}, score {:.3}",
            method,
            result.overall_score
        );

        self.events.publish(MonitorEvent::ReauthRequested {
            threat_level: result.threat_level,
            message,
            method,
        });

        base_record(result, DecisionAction::ReauthRequired).with_reauth_method(method)
    }

    fn lock_account(&self, result: &FusionResult) -> DecisionRecord {
        let reason = lock_reason(result);
        let mut failures = Vec::new();

        log::warn!("[Decision] ACCOUNT_LOCKED: {}", reason);

        // 1. Lock flag (primary)
        let locked = match self.store.set_lock(&LockState::locked(&reason, result.overall_score)) {
            Ok(()) => true,
            Err(e) => {
                log::error!("[Decision] Failed to set lock flag: {}", e);
                failures.push(format!("lock flag: {}", e));
                false
            }
        };

        // 2. Sessions
        match self.store.invalidate_sessions() {
            Ok(count) => log::info!("[Decision] Invalidated {} sessions", count),
            Err(e) => {
                log::error!("[Decision] Failed to invalidate sessions: {}", e);
                failures.push(format!("sessions: {}", e));
            }
        }

        // 3. Sensitive caches
        for cache in &self.sensitive_caches {
            if let Err(e) = self.store.clear_cache(cache) {
                log::error!("[Decision] Failed to clear cache '{}': {}", cache, e);
                failures.push(format!("cache {}: {}", cache, e));
            }
        }

        // 4. Forensics
        if let Err(e) = self.forensics.capture(&self.forensic_record(result, &reason)) {
            log::error!("[Decision] Forensic capture failed: {}", e);
            failures.push(format!("forensics: {}", e));
        }

        // 5. Notify
        self.events.publish(MonitorEvent::AccountLocked { reason });

        let action = if locked {
            DecisionAction::AccountLocked
        } else {
            DecisionAction::Error
        };
        base_record(result, action).with_failures(&failures)
    }

    fn forensic_record(&self, result: &FusionResult, reason: &str) -> ForensicRecord {
        ForensicRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            threat_level: result.threat_level,
            overall_score: result.overall_score,
            reason: reason.to_string(),
            recommended_action: result.recommended_action.clone(),
            agent_scores: result.agent_scores.clone(),
            breakdown: result.breakdown.clone(),
            device: collect_device_metadata(self.started_at),
        }
    }

    fn record(&self, record: DecisionRecord) {
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.lock().record(&record) {
                log::error!("[Decision] Failed to write decision audit: {}", e);
            }
        }

        let mut history = self.history.write();
        history.push_back(record);
        while history.len() > self.capacity {
            history.pop_front();
        }
    }

    // ========================================================================
    // LOCK STATE
    // ========================================================================

    pub fn is_locked(&self) -> bool {
        matches!(self.store.lock_state(), Ok(Some(state)) if state.locked)
    }

    pub fn lock_state(&self) -> Result<Option<LockState>, StoreError> {
        self.store.lock_state()
    }

    /// Explicit unlock (after out-of-band verification)
    pub fn unlock_account(&self) -> Result<(), StoreError> {
        self.store.clear_lock()?;
        log::info!("[Decision] Account unlocked");
        Ok(())
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    /// Last `limit` decisions, oldest first
    pub fn recent(&self, limit: usize) -> Vec<DecisionRecord> {
        let history = self.history.read();
        let start = history.len().saturating_sub(limit);
        history.iter().skip(start).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    pub fn clear_history(&self) {
        self.history.write().clear();
    }

    pub fn stats(&self) -> DecisionStats {
        let history = self.history.read();
        let mut by_action: HashMap<String, usize> = HashMap::new();
        let mut success = 0;

        for record in history.iter() {
            *by_action.entry(record.action.as_str().to_string()).or_insert(0) += 1;
            if record.success {
                success += 1;
            }
        }

        DecisionStats {
            total_decisions: history.len(),
            success_count: success,
            failed_count: history.len() - success,
            by_action,
            account_locked: self.is_locked(),
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn base_record(result: &FusionResult, action: DecisionAction) -> DecisionRecord {
    let agents: BTreeSet<String> = result.agent_ids().cloned().collect();
    DecisionRecord::new(result.threat_level, result.overall_score, action, agents)
}

/// Modality from the agents above the re-auth cutoff:
/// touch/typing > movement > honeypot > standard
pub fn select_reauth_method(result: &FusionResult) -> ReauthMethod {
    let kinds: BTreeSet<AgentKind> = result
        .agents_above(REAUTH_CUTOFF)
        .into_iter()
        .filter_map(|r| r.kind())
        .collect();

    if kinds.contains(&AgentKind::Touch) || kinds.contains(&AgentKind::Typing) {
        ReauthMethod::Biometric
    } else if kinds.contains(&AgentKind::Movement) {
        ReauthMethod::LocationVerification
    } else if kinds.contains(&AgentKind::Honeypot) {
        ReauthMethod::ChallengeAndPassword
    } else {
        ReauthMethod::Standard
    }
}

fn lock_reason(result: &FusionResult) -> String {
    let implicated: Vec<&str> = result
        .agents_above(REAUTH_CUTOFF)
        .into_iter()
        .map(|r| r.agent_id.as_str())
        .collect();

    if implicated.is_empty() {
        format!("High risk score {:.2}: {}", result.overall_score, result.recommended_action)
    } else {
        format!(
            "High risk score {:.2} from [{}]: {}",
            result.overall_score,
            implicated.join(", "),
            result.recommended_action
        )
    }
}
