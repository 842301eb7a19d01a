use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use super::engine::{select_reauth_method, DecisionEngine};
use super::forensic::{ForensicLog, ForensicSink};
use super::store::{MemoryStateStore, SecureStateStore, StoreError};
use super::types::{DecisionAction, ForensicRecord, LockState, ReauthMethod};
use super::audit::{read_records, AuditWriter};
use crate::logic::agents::AnomalyResult;
use crate::logic::events::{EventBus, MonitorEvent};
use crate::logic::fusion::{FusionResult, ScoreBreakdown, ThreatLevel};

// ============================================================================
// FIXTURES
// ============================================================================

fn fusion(level: ThreatLevel, score: f64, agents: &[(&str, f64)]) -> FusionResult {
    let agent_scores: BTreeMap<String, AnomalyResult> = agents
        .iter()
        .map(|(id, s)| (id.to_string(), AnomalyResult::new(id, *s, 0.9)))
        .collect();

    FusionResult {
        overall_score: score,
        threat_level: level,
        agent_scores,
        timestamp: Utc::now(),
        recommended_action: "test action".to_string(),
        breakdown: ScoreBreakdown::default(),
    }
}

struct FailingForensics;

impl ForensicSink for FailingForensics {
    fn capture(&self, _record: &ForensicRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("disk full".to_string()))
    }
}

/// Store whose lock write always fails; everything else works
#[derive(Default)]
struct BrokenLockStore {
    inner: MemoryStateStore,
}

impl SecureStateStore for BrokenLockStore {
    fn set_lock(&self, _state: &LockState) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("keystore locked".to_string()))
    }

    fn lock_state(&self) -> Result<Option<LockState>, StoreError> {
        self.inner.lock_state()
    }

    fn clear_lock(&self) -> Result<(), StoreError> {
        self.inner.clear_lock()
    }

    fn invalidate_sessions(&self) -> Result<usize, StoreError> {
        self.inner.invalidate_sessions()
    }

    fn clear_cache(&self, name: &str) -> Result<(), StoreError> {
        self.inner.clear_cache(name)
    }
}

fn engine_with(store: Arc<MemoryStateStore>, forensics: Arc<dyn ForensicSink>) -> DecisionEngine {
    DecisionEngine::new(store, forensics, EventBus::new(8))
}

// ============================================================================
// LEVEL -> ACTION
// ============================================================================

#[test]
fn test_low_is_logged_only() {
    let store = Arc::new(MemoryStateStore::new());
    let engine = engine_with(store.clone(), Arc::new(ForensicLog::new(4)));

    let record = engine.decide(&fusion(ThreatLevel::Low, 0.2, &[("Touch", 0.2)]));

    assert_eq!(record.action, DecisionAction::Logged);
    assert!(record.success);
    assert!(record.reauth_method.is_none());
    assert!(!engine.is_locked());
    assert!(record.agents_involved.contains("Touch"));
}

#[tokio::test]
async fn test_medium_requests_reauth() {
    let store = Arc::new(MemoryStateStore::new());
    let events = EventBus::new(8);
    let mut rx = events.subscribe();
    let engine = DecisionEngine::new(store, Arc::new(ForensicLog::new(4)), events);

    let record = engine.decide(&fusion(
        ThreatLevel::Medium,
        0.7,
        &[("Touch", 0.8), ("Typing", 0.75)],
    ));

    assert_eq!(record.action, DecisionAction::ReauthRequired);
    assert_eq!(record.reauth_method, Some(ReauthMethod::Biometric));
    assert!(!engine.is_locked());

    match rx.recv().await.unwrap() {
        MonitorEvent::ReauthRequested { threat_level, method, message } => {
            assert_eq!(threat_level, ThreatLevel::Medium);
            assert_eq!(method, ReauthMethod::Biometric);
            assert!(message.contains("70%"));
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_reauth_method_priority() {
    let movement = fusion(ThreatLevel::Medium, 0.65, &[("Movement", 0.9), ("Honeypot", 0.9)]);
    assert_eq!(select_reauth_method(&movement), ReauthMethod::LocationVerification);

    let trap = fusion(ThreatLevel::Medium, 0.65, &[("Honeypot", 0.9), ("Usage", 0.9)]);
    assert_eq!(select_reauth_method(&trap), ReauthMethod::ChallengeAndPassword);

    // Touch at exactly the cutoff does not count
    let weak = fusion(ThreatLevel::Medium, 0.65, &[("Touch", 0.6), ("Usage", 0.9)]);
    assert_eq!(select_reauth_method(&weak), ReauthMethod::Standard);
}

#[test]
fn test_high_locks_and_wipes() {
    let store = Arc::new(MemoryStateStore::new());
    let forensics = Arc::new(ForensicLog::new(4));
    store.add_session("s1");
    store.add_session("s2");
    store.put_cache("credentials", "pin", vec![1]);
    store.put_cache("payment_tokens", "card", vec![2]);
    store.put_cache("unrelated", "k", vec![3]);

    let engine = engine_with(store.clone(), forensics.clone());
    let mut result = fusion(ThreatLevel::High, 0.97, &[("Honeypot", 0.99)]);
    let trap_hit = AnomalyResult::new("Honeypot", 0.99, 0.9)
        .with_detail("trap", serde_json::json!("fake_admin_endpoint"))
        .with_detail("hits", serde_json::json!(4));
    result.agent_scores.insert("Honeypot".to_string(), trap_hit);
    let record = engine.decide(&result);

    assert_eq!(record.action, DecisionAction::AccountLocked);
    assert!(record.success);
    assert!(engine.is_locked());
    assert_eq!(store.session_count(), 0);
    assert_eq!(store.cache_len("credentials"), 0);
    assert_eq!(store.cache_len("payment_tokens"), 0);
    assert_eq!(store.cache_len("unrelated"), 1);

    assert_eq!(forensics.len(), 1);
    let captured = &forensics.recent(1)[0];
    assert_eq!(captured.overall_score, 0.97);
    let dumped = &captured.agent_scores["Honeypot"];
    assert_eq!(dumped.details["trap"], serde_json::json!("fake_admin_endpoint"));
    assert_eq!(dumped.details["hits"], serde_json::json!(4));
    assert!(captured.reason.contains("Honeypot"));
}

// ============================================================================
// FAILURE ISOLATION
// ============================================================================

#[test]
fn test_forensic_failure_does_not_prevent_lock() {
    let store = Arc::new(MemoryStateStore::new());
    let engine = engine_with(store.clone(), Arc::new(FailingForensics));

    let record = engine.decide(&fusion(ThreatLevel::High, 0.95, &[("Touch", 0.95)]));

    assert_eq!(record.action, DecisionAction::AccountLocked);
    assert!(!record.success);
    assert!(record.error_message.as_deref().unwrap_or("").contains("disk full"));
    assert!(engine.is_locked());
}

#[test]
fn test_lock_write_failure_is_error() {
    let store = Arc::new(BrokenLockStore::default());
    store.inner.add_session("s1");
    let engine = DecisionEngine::new(store.clone(), Arc::new(ForensicLog::new(4)), EventBus::new(4));

    let record = engine.decide(&fusion(ThreatLevel::High, 0.95, &[("Touch", 0.95)]));

    assert_eq!(record.action, DecisionAction::Error);
    assert!(!record.success);
    assert!(record.error_message.as_deref().unwrap_or("").contains("keystore locked"));
    // Remaining sub-steps still ran
    assert_eq!(store.inner.session_count(), 0);
    assert!(!engine.is_locked());
}

#[test]
fn test_relock_refreshes_reason_and_unlock_clears() {
    let store = Arc::new(MemoryStateStore::new());
    let engine = engine_with(store, Arc::new(ForensicLog::new(4)));

    engine.decide(&fusion(ThreatLevel::High, 0.95, &[("Touch", 0.95)]));
    engine.decide(&fusion(ThreatLevel::High, 0.99, &[("Movement", 0.99)]));

    let state = engine.lock_state().unwrap().unwrap();
    assert!(state.locked);
    assert_eq!(state.score, 0.99);
    assert!(state.reason.contains("Movement"));

    engine.unlock_account().unwrap();
    assert!(!engine.is_locked());
}

// ============================================================================
// HISTORY / STATS / AUDIT
// ============================================================================

#[test]
fn test_history_is_bounded() {
    let store = Arc::new(MemoryStateStore::new());
    let engine = engine_with(store, Arc::new(ForensicLog::new(4))).with_history_capacity(3);

    for i in 0..5 {
        engine.decide(&fusion(ThreatLevel::Low, i as f64 / 10.0, &[]));
    }

    assert_eq!(engine.history_len(), 3);
    let recent = engine.recent(10);
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].overall_score, 0.2);
    assert_eq!(recent[2].overall_score, 0.4);

    engine.clear_history();
    assert_eq!(engine.history_len(), 0);
}

#[test]
fn test_stats_count_actions_and_failures() {
    let store = Arc::new(MemoryStateStore::new());
    let engine = engine_with(store, Arc::new(FailingForensics));

    engine.decide(&fusion(ThreatLevel::Low, 0.1, &[]));
    engine.decide(&fusion(ThreatLevel::Low, 0.2, &[]));
    engine.decide(&fusion(ThreatLevel::Medium, 0.7, &[("Usage", 0.7)]));
    engine.decide(&fusion(ThreatLevel::High, 0.95, &[("Touch", 0.95)]));

    let stats = engine.stats();
    assert_eq!(stats.total_decisions, 4);
    assert_eq!(stats.success_count, 3);
    assert_eq!(stats.failed_count, 1);
    assert_eq!(stats.by_action.get("LOGGED"), Some(&2));
    assert_eq!(stats.by_action.get("REAUTH_REQUIRED"), Some(&1));
    assert_eq!(stats.by_action.get("ACCOUNT_LOCKED"), Some(&1));
    assert!(stats.account_locked);
}

#[test]
fn test_decisions_are_audited() {
    let dir = tempfile::tempdir().unwrap();
    let writer = AuditWriter::new(dir.path().to_path_buf()).unwrap();
    let path = writer.current_file().to_path_buf();

    let store = Arc::new(MemoryStateStore::new());
    let engine = engine_with(store, Arc::new(ForensicLog::new(4))).with_audit_writer(writer);

    engine.decide(&fusion(ThreatLevel::Low, 0.1, &[]));
    engine.decide(&fusion(ThreatLevel::Medium, 0.7, &[("Typing", 0.8)]));

    let records = read_records(&path).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].action, DecisionAction::ReauthRequired);
    assert_eq!(records[1].reauth_method, Some(ReauthMethod::Biometric));
}

#[test]
fn test_custom_sensitive_caches() {
    let store = Arc::new(MemoryStateStore::new());
    store.put_cache("credentials", "pin", vec![1]);
    store.put_cache("biometric_templates", "t", vec![2]);

    let engine = engine_with(store.clone(), Arc::new(ForensicLog::new(4)))
        .with_sensitive_caches(vec!["biometric_templates".to_string()]);
    engine.decide(&fusion(ThreatLevel::High, 0.95, &[]));

    assert_eq!(store.cache_len("biometric_templates"), 0);
    assert_eq!(store.cache_len("credentials"), 1);
}
