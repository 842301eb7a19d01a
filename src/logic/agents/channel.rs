//! Channel Agent
//!
//! Adapter for signal producers living outside the fusion core (platform
//! capture code, replay files, tests). The producer calls `publish`/`push`
//! and the agent forwards into the monitor's result funnel.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::error::TrySendError;

use super::types::{AgentError, AnomalyResult, ResultSender, SignalAgent};

pub struct ChannelAgent {
    agent_id: String,
    weight: f64,
    available: AtomicBool,
    initialized: AtomicBool,
    sink: Mutex<Option<ResultSender>>,
    latest: RwLock<Option<AnomalyResult>>,
}

impl ChannelAgent {
    pub fn new(agent_id: &str, weight: f64) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            weight,
            available: AtomicBool::new(true),
            initialized: AtomicBool::new(false),
            sink: Mutex::new(None),
            latest: RwLock::new(None),
        }
    }

    /// Simulate the underlying sensor going away (or coming back)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.sink.lock().is_some()
    }

    /// Record a result and forward it without waiting. Returns whether it
    /// reached the monitor.
    pub fn publish(&self, result: AnomalyResult) -> bool {
        let result = self.stamp(result);
        *self.latest.write() = Some(result.clone());

        let guard = self.sink.lock();
        let Some(sink) = guard.as_ref() else {
            return false;
        };

        match sink.try_send(result) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("[Agent {}] Result channel full, result dropped", self.agent_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("[Agent {}] Monitor gone, result dropped", self.agent_id);
                false
            }
        }
    }

    /// Record a result and wait for channel capacity
    pub async fn push(&self, result: AnomalyResult) -> bool {
        let result = self.stamp(result);
        *self.latest.write() = Some(result.clone());

        let sink = self.sink.lock().clone();
        match sink {
            Some(sink) => sink.send(result).await.is_ok(),
            None => false,
        }
    }

    fn stamp(&self, mut result: AnomalyResult) -> AnomalyResult {
        if result.agent_id != self.agent_id {
            result.agent_id = self.agent_id.clone();
        }
        result.normalized()
    }
}

impl SignalAgent for ChannelAgent {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn initialize(&self) -> bool {
        let ok = self.available.load(Ordering::SeqCst);
        self.initialized.store(ok, Ordering::SeqCst);
        ok
    }

    fn start(&self, sink: ResultSender) {
        *self.sink.lock() = Some(sink);
        log::debug!("[Agent {}] started", self.agent_id);
    }

    fn stop(&self) {
        self.sink.lock().take();
        log::debug!("[Agent {}] stopped", self.agent_id);
    }

    fn current_score(&self) -> Result<AnomalyResult, AgentError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(AgentError::Unavailable {
                agent_id: self.agent_id.clone(),
                reason: "signal source offline".to_string(),
            });
        }
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(AgentError::NotInitialized(self.agent_id.clone()));
        }

        self.latest
            .read()
            .clone()
            .ok_or_else(|| AgentError::NoScore(self.agent_id.clone()))
    }
}
