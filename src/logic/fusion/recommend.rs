//! Recommended Action Text
//!
//! Human readable action proposal attached to each FusionResult.
//! The DecisionEngine decides for itself; this text is for audit and UI.

use std::collections::{BTreeMap, BTreeSet};

use super::rules::{MULTI_AGENT_IMPLICATION, RECOMMENDATION_CUTOFF};
use super::types::ThreatLevel;
use crate::logic::agents::{AgentKind, AnomalyResult};

pub const NO_AGENTS_ACTION: &str = "No agents active - monitoring disabled";
pub const CONTINUE_MONITORING: &str = "Continue monitoring";

/// Build the action text from the level and the agents scoring above the cutoff
pub fn recommend_action(level: ThreatLevel, agents: &BTreeMap<String, AnomalyResult>) -> String {
    let implicated: Vec<&AnomalyResult> = agents
        .values()
        .filter(|r| r.score > RECOMMENDATION_CUTOFF)
        .collect();
    let kinds: BTreeSet<AgentKind> = implicated.iter().filter_map(|r| r.kind()).collect();

    match level {
        ThreatLevel::Low => CONTINUE_MONITORING.to_string(),
        ThreatLevel::Medium => medium_action(&kinds),
        ThreatLevel::High => high_action(&kinds, implicated.len()),
    }
}

fn medium_action(kinds: &BTreeSet<AgentKind>) -> String {
    if kinds.contains(&AgentKind::Touch) || kinds.contains(&AgentKind::Typing) {
        "Require biometric re-authentication (touch/typing pattern anomaly)".to_string()
    } else if kinds.contains(&AgentKind::Movement) {
        "Require location verification (unusual movement pattern)".to_string()
    } else if kinds.contains(&AgentKind::Honeypot) {
        "Network trap response: challenge user and require password".to_string()
    } else {
        "Require re-authentication (elevated risk)".to_string()
    }
}

fn high_action(kinds: &BTreeSet<AgentKind>, implicated: usize) -> String {
    let reason = if kinds.contains(&AgentKind::Honeypot) {
        "network trap triggered".to_string()
    } else if kinds.contains(&AgentKind::Movement) {
        "suspicious location change".to_string()
    } else if implicated >= MULTI_AGENT_IMPLICATION {
        format!("{} agents implicated", implicated)
    } else {
        "high fused risk score".to_string()
    };

    format!("Lock account and capture forensics: {}", reason)
}
