//! Fusion Monitor - Orchestration
//!
//! Owns the agent registry, result window, config snapshot, fusion history
//! and decision engine. Runs two loops that feed one evaluation pipeline:
//! - event loop: every result pushed by an agent triggers an evaluation
//! - periodic loop: re-evaluates every `eval_interval_secs` so evidence
//!   ageing out of the window is reflected without new input
//!
//! Evaluations are serialized by the pipeline lock. Config changes swap an
//! `Arc<FusionConfig>`, so an evaluation always sees one consistent config.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::constants::{
    env_flag, env_or, env_string, DEFAULT_EVAL_INTERVAL_SECS, DEFAULT_SENSITIVE_CACHES,
    EVENT_BUS_CAPACITY, FUSION_HISTORY_CAPACITY, RESULT_CHANNEL_CAPACITY,
};
use crate::logic::agents::{AgentRegistry, AnomalyResult};
use crate::logic::decision::{
    AuditWriter, DecisionEngine, DecisionRecord, ForensicSink, SecureStateStore, StoreError,
};
use crate::logic::events::{EventBus, MonitorEvent};
use crate::logic::fusion::{
    evaluate_at, tune, FusionConfig, FusionError, FusionHistory, FusionResult, FusionStats,
    ResultWindow, ThreatLevel,
};

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub fusion: FusionConfig,
    pub eval_interval_secs: u64,
    /// JSONL decision audit directory (disabled when unset).
    /// `FUSION_AUDIT_DIR`, or `FUSION_AUDIT=true` for the default data dir.
    pub audit_dir: Option<PathBuf>,
    /// SQLite state store path (in-memory store when unset)
    pub state_db: Option<PathBuf>,
    pub sensitive_caches: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            fusion: FusionConfig::default(),
            eval_interval_secs: DEFAULT_EVAL_INTERVAL_SECS,
            audit_dir: None,
            state_db: None,
            sensitive_caches: DEFAULT_SENSITIVE_CACHES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl MonitorConfig {
    /// Load from environment (FUSION_*), falling back to defaults
    pub fn from_env() -> Result<Self, FusionError> {
        Ok(Self {
            fusion: FusionConfig::from_env()?,
            eval_interval_secs: env_or("FUSION_EVAL_INTERVAL_SECS", DEFAULT_EVAL_INTERVAL_SECS).max(1),
            audit_dir: audit_dir_from(
                env_string("FUSION_AUDIT_DIR"),
                env_flag("FUSION_AUDIT", false),
            ),
            state_db: env_string("FUSION_STATE_DB").map(PathBuf::from),
            ..Default::default()
        })
    }
}

/// An explicit directory wins; `enabled` alone falls back to the default
/// data dir.
fn audit_dir_from(explicit: Option<String>, enabled: bool) -> Option<PathBuf> {
    match explicit {
        Some(dir) => Some(PathBuf::from(dir)),
        None if enabled => Some(AuditWriter::default_dir()),
        None => None,
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid fusion config: {0}")]
    Config(#[from] FusionError),
    #[error("state store: {0}")]
    Store(#[from] StoreError),
}

// ============================================================================
// STATUS
// ============================================================================

/// One completed pass through the pipeline
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub result: FusionResult,
    pub decision: DecisionRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub agents: Vec<String>,
    pub window_size: usize,
    pub low_threshold: f64,
    pub medium_threshold: f64,
    pub high_threshold: f64,
    pub adaptive_learning: bool,
    pub evaluations: usize,
    pub last_score: Option<f64>,
    pub last_level: Option<ThreatLevel>,
    pub last_evaluated: Option<DateTime<Utc>>,
    pub account_locked: bool,
}

// ============================================================================
// MONITOR
// ============================================================================

struct Pipeline {
    registry: AgentRegistry,
    window: ResultWindow,
    config: RwLock<Arc<FusionConfig>>,
    history: Mutex<FusionHistory>,
    decisions: DecisionEngine,
    events: EventBus,
    running: AtomicBool,
    /// Serializes evaluations and start/stop transitions
    gate: Mutex<()>,
}

pub struct FusionMonitor {
    pipeline: Arc<Pipeline>,
    eval_interval: Duration,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl FusionMonitor {
    pub fn new(
        config: MonitorConfig,
        registry: AgentRegistry,
        store: Arc<dyn SecureStateStore>,
        forensics: Arc<dyn ForensicSink>,
    ) -> Result<Self, MonitorError> {
        config.fusion.validate()?;

        let events = EventBus::new(EVENT_BUS_CAPACITY);
        let mut decisions = DecisionEngine::new(store, forensics, events.clone())
            .with_sensitive_caches(config.sensitive_caches.clone());
        if let Some(dir) = &config.audit_dir {
            decisions = decisions.with_audit_writer(AuditWriter::new(dir.clone())?);
        }

        log::info!(
            "[Monitor] {} agents, thresholds {:.2}/{:.2}/{:.2}, window {} ms",
            registry.len(),
            config.fusion.thresholds.low(),
            config.fusion.thresholds.medium(),
            config.fusion.thresholds.high(),
            config.fusion.time_window_ms
        );

        Ok(Self {
            pipeline: Arc::new(Pipeline {
                registry,
                window: ResultWindow::new(config.fusion.time_window_ms),
                config: RwLock::new(Arc::new(config.fusion)),
                history: Mutex::new(FusionHistory::new(FUSION_HISTORY_CAPACITY)),
                decisions,
                events,
                running: AtomicBool::new(false),
                gate: Mutex::new(()),
            }),
            eval_interval: Duration::from_secs(config.eval_interval_secs.max(1)),
            shutdown: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        })
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Start agents and both loops. Must run inside a tokio runtime.
    /// Returns the ids of the agents that started.
    pub fn start(&self) -> Vec<String> {
        let mut shutdown = self.shutdown.lock();
        if shutdown.is_some() {
            log::warn!("[Monitor] Already running");
            return Vec::new();
        }

        let (result_tx, result_rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);

        let started = self.pipeline.registry.start_all(&result_tx);
        // Agents hold the only senders; the channel closes once they all stop
        drop(result_tx);

        {
            let _gate = self.pipeline.gate.lock();
            self.pipeline.running.store(true, Ordering::SeqCst);
        }
        self.collect_now();

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(event_loop(
            self.pipeline.clone(),
            result_rx,
            stop_rx.clone(),
        )));
        tasks.push(tokio::spawn(periodic_loop(
            self.pipeline.clone(),
            self.eval_interval,
            stop_rx,
        )));
        *shutdown = Some(stop_tx);

        log::info!(
            "[Monitor] Started with {}/{} agents, periodic every {:?}",
            started.len(),
            self.pipeline.registry.len(),
            self.eval_interval
        );
        started
    }

    /// Stop loops and agents, then clear the window and fusion history.
    /// No evaluation runs after this returns.
    pub async fn stop(&self) {
        {
            let _gate = self.pipeline.gate.lock();
            self.pipeline.running.store(false, Ordering::SeqCst);
        }

        if let Some(stop_tx) = self.shutdown.lock().take() {
            let _ = stop_tx.send(true);
        }

        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                log::warn!("[Monitor] Loop ended abnormally: {}", e);
            }
        }

        self.pipeline.registry.stop_all();
        self.pipeline.window.clear();
        self.pipeline.history.lock().clear();
        log::info!("[Monitor] Stopped");
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.running.load(Ordering::SeqCst)
    }

    // ========================================================================
    // EVALUATION
    // ========================================================================

    /// Pull the current score of every agent into the window
    pub fn collect_now(&self) -> usize {
        let results = self.pipeline.registry.collect_current();
        let count = results.len();
        for result in results {
            self.pipeline.window.ingest(result);
        }
        count
    }

    /// Run one evaluation immediately (skipped when stopped or gated).
    /// Blocking: from async code wrap it in `block_in_place`/`spawn_blocking`.
    pub fn evaluate_now(&self) -> Option<Evaluation> {
        self.pipeline.evaluate()
    }

    /// Replace the fusion config. Applies from the next evaluation.
    pub fn reconfigure(&self, config: FusionConfig) -> Result<(), FusionError> {
        config.validate()?;

        let _gate = self.pipeline.gate.lock();
        self.pipeline.window.set_time_window(config.time_window_ms);
        *self.pipeline.config.write() = Arc::new(config);
        log::info!("[Monitor] Config replaced");
        Ok(())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn config(&self) -> Arc<FusionConfig> {
        self.pipeline.config.read().clone()
    }

    pub fn window_size(&self) -> usize {
        self.pipeline.window.size()
    }

    /// Last `limit` fusion results, oldest first
    pub fn recent_fusions(&self, limit: usize) -> Vec<FusionResult> {
        self.pipeline.history.lock().recent(limit)
    }

    pub fn fusion_stats(&self) -> FusionStats {
        self.pipeline.history.lock().stats()
    }

    pub fn decisions(&self) -> &DecisionEngine {
        &self.pipeline.decisions
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.pipeline.events.subscribe()
    }

    pub fn status(&self) -> MonitorStatus {
        let config = self.config();
        let history = self.pipeline.history.lock();
        let latest = history.latest();

        MonitorStatus {
            running: self.is_running(),
            agents: self.pipeline.registry.agent_ids(),
            window_size: self.pipeline.window.size(),
            low_threshold: config.thresholds.low(),
            medium_threshold: config.thresholds.medium(),
            high_threshold: config.thresholds.high(),
            adaptive_learning: config.adaptive_learning,
            evaluations: history.len(),
            last_score: latest.map(|r| r.overall_score),
            last_level: latest.map(|r| r.threat_level),
            last_evaluated: latest.map(|r| r.timestamp),
            account_locked: self.pipeline.decisions.is_locked(),
        }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

impl Pipeline {
    fn evaluate(&self) -> Option<Evaluation> {
        let _gate = self.gate.lock();
        if !self.running.load(Ordering::SeqCst) {
            return None;
        }

        let config = self.config.read().clone();
        let now = Utc::now();
        let snapshot = self.window.snapshot_at(now);

        if snapshot.len() < config.min_agents_required {
            log::debug!(
                "[Monitor] {} active agents, {} required - skipping",
                snapshot.len(),
                config.min_agents_required
            );
            return None;
        }

        let result = evaluate_at(&snapshot, &config, self.registry.weights(), now);
        self.events.publish(MonitorEvent::FusionEvaluated {
            overall_score: result.overall_score,
            threat_level: result.threat_level,
            timestamp: result.timestamp,
        });

        let decision = self.decisions.decide(&result);

        let tuned = {
            let mut history = self.history.lock();
            history.push(result.clone());
            tune(&history, &config)
        };
        if tuned != *config {
            *self.config.write() = Arc::new(tuned);
        }

        Some(Evaluation { result, decision })
    }

    fn ingest(&self, result: AnomalyResult) {
        self.window.ingest(result.normalized());
    }
}

/// One pipeline pass on the blocking pool. Decisions may hit SQLite and the
/// audit file, which must not stall a runtime worker.
async fn evaluate_off_runtime(pipeline: &Arc<Pipeline>) {
    let pipeline = pipeline.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || pipeline.evaluate()).await {
        log::error!("[Monitor] Evaluation task failed: {}", e);
    }
}

async fn event_loop(
    pipeline: Arc<Pipeline>,
    mut results: mpsc::Receiver<AnomalyResult>,
    mut stop: watch::Receiver<bool>,
) {
    log::info!("[Monitor] Event loop started");
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            received = results.recv() => match received {
                Some(result) => {
                    pipeline.ingest(result);
                    evaluate_off_runtime(&pipeline).await;
                }
                None => {
                    log::info!("[Monitor] All agents disconnected");
                    break;
                }
            },
        }
    }
    log::info!("[Monitor] Event loop stopped");
}

async fn periodic_loop(pipeline: Arc<Pipeline>, every: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    log::info!("[Monitor] Periodic loop started");
    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = ticker.tick() => {
                evaluate_off_runtime(&pipeline).await;
            }
        }
    }
    log::info!("[Monitor] Periodic loop stopped");
}
