//! Agent Registry
//!
//! Holds the registered agents and their static fusion weights.

use std::collections::HashMap;
use std::sync::Arc;

use super::types::{AgentError, AnomalyResult, ResultSender, SignalAgent};

/// Registered agents keyed by id, in registration order
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<dyn SignalAgent>>,
    weights: HashMap<String, f64>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. Ids must be unique and weights finite and >= 0.
    pub fn register(&mut self, agent: Arc<dyn SignalAgent>) -> Result<(), AgentError> {
        let agent_id = agent.agent_id().to_string();
        let weight = agent.weight();

        if self.weights.contains_key(&agent_id) {
            return Err(AgentError::AlreadyRegistered(agent_id));
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(AgentError::InvalidWeight { agent_id, weight });
        }

        log::debug!("[Registry] Registered agent {} (weight {:.2})", agent_id, weight);
        self.weights.insert(agent_id, weight);
        self.agents.push(agent);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.weights.contains_key(agent_id)
    }

    /// Static weight table consumed by the fusion engine
    pub fn weights(&self) -> &HashMap<String, f64> {
        &self.weights
    }

    pub fn agent_ids(&self) -> Vec<String> {
        self.agents.iter().map(|a| a.agent_id().to_string()).collect()
    }

    /// Initialize and start every agent. Agents failing `initialize()` are
    /// skipped. Returns the ids that were started.
    pub fn start_all(&self, sink: &ResultSender) -> Vec<String> {
        let mut started = Vec::new();

        for agent in &self.agents {
            if agent.initialize() {
                agent.start(sink.clone());
                started.push(agent.agent_id().to_string());
            } else {
                log::warn!("[Registry] Agent {} failed to initialize - excluded", agent.agent_id());
            }
        }

        log::info!("[Registry] Started {}/{} agents", started.len(), self.agents.len());
        started
    }

    pub fn stop_all(&self) {
        for agent in &self.agents {
            agent.stop();
        }
    }

    /// Poll every agent on demand. Failing agents are logged and skipped.
    pub fn collect_current(&self) -> Vec<AnomalyResult> {
        let mut results = Vec::with_capacity(self.agents.len());

        for agent in &self.agents {
            match agent.current_score() {
                Ok(result) => results.push(result.normalized()),
                Err(e) => log::warn!("[Registry] Skipping agent {}: {}", agent.agent_id(), e),
            }
        }

        results
    }
}
