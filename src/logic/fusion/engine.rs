//! Fusion Engine
//!
//! Scoring logic only - no types, no policy.
//! Input: window snapshot, FusionConfig, agent weights
//! Output: FusionResult
//!
//! Deterministic given a snapshot and `now`. Sums run in agent-id order
//! (BTreeMap), so arrival order never changes the result.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use super::recommend::{recommend_action, NO_AGENTS_ACTION};
use super::rules::{FusionConfig, Thresholds};
use super::types::{FusionResult, ScoreBreakdown, ThreatLevel};
use crate::logic::agents::AnomalyResult;

// ============================================================================
// MAIN EVALUATION FUNCTION
// ============================================================================

/// Evaluate a window snapshot against the wall clock
pub fn evaluate(
    window: &BTreeMap<String, AnomalyResult>,
    config: &FusionConfig,
    agent_weights: &HashMap<String, f64>,
) -> FusionResult {
    evaluate_at(window, config, agent_weights, Utc::now())
}

/// Evaluate a window snapshot at a fixed instant
pub fn evaluate_at(
    window: &BTreeMap<String, AnomalyResult>,
    config: &FusionConfig,
    agent_weights: &HashMap<String, f64>,
    now: DateTime<Utc>,
) -> FusionResult {
    if window.is_empty() {
        return FusionResult {
            overall_score: 0.0,
            threat_level: ThreatLevel::Low,
            agent_scores: BTreeMap::new(),
            timestamp: now,
            recommended_action: NO_AGENTS_ACTION.to_string(),
            breakdown: ScoreBreakdown::default(),
        };
    }

    let breakdown = compute_breakdown(window, config, agent_weights, now);
    let threat_level = classify(breakdown.final_score, &config.thresholds);
    let recommended_action = recommend_action(threat_level, window);

    log::debug!(
        "[Fusion] {} agents: base {:.3}, temporal {:.3}, conf {:.3} -> {:.3} ({})",
        window.len(),
        breakdown.base_score,
        breakdown.temporal_score,
        breakdown.avg_confidence,
        breakdown.final_score,
        threat_level
    );

    FusionResult {
        overall_score: breakdown.final_score,
        threat_level,
        agent_scores: window.clone(),
        timestamp: now,
        recommended_action,
        breakdown,
    }
}

/// Thresholds are inclusive lower bounds, checked high to low.
/// `low` does not split the LOW band.
pub fn classify(score: f64, thresholds: &Thresholds) -> ThreatLevel {
    if score >= thresholds.high() {
        ThreatLevel::High
    } else if score >= thresholds.medium() {
        ThreatLevel::Medium
    } else {
        ThreatLevel::Low
    }
}

// ============================================================================
// SCORING STEPS
// ============================================================================

fn compute_breakdown(
    window: &BTreeMap<String, AnomalyResult>,
    config: &FusionConfig,
    agent_weights: &HashMap<String, f64>,
    now: DateTime<Utc>,
) -> ScoreBreakdown {
    let weight_of = |agent_id: &str| agent_weights.get(agent_id).copied().unwrap_or(0.0);

    // 1. Confidence-weighted base score
    let (mut num, mut den) = (0.0, 0.0);
    for r in window.values() {
        let w = weight_of(&r.agent_id) * r.confidence;
        num += r.score * w;
        den += w;
    }
    let base_score = if den > 0.0 { num / den } else { 0.0 };

    // 2. Recency-weighted score, blended in by temporal_weight
    let window_ms = config.time_window_ms as f64;
    let (mut num, mut den) = (0.0, 0.0);
    for r in window.values() {
        let factor = (1.0 - r.age_ms(now) as f64 / window_ms).max(0.0);
        let w = weight_of(&r.agent_id) * factor;
        num += r.score * w;
        den += w;
    }
    let temporal_score = if den > 0.0 { num / den } else { base_score };
    let blended_score =
        base_score * (1.0 - config.temporal_weight) + temporal_score * config.temporal_weight;

    // 3. Confidence re-weighting
    let (mut num, mut den) = (0.0, 0.0);
    for r in window.values() {
        let w = weight_of(&r.agent_id);
        num += r.confidence * w;
        den += w;
    }
    let avg_confidence = if den > 0.0 { num / den } else { 0.0 };

    let final_score = (blended_score * (1.0 - config.confidence_weight)
        + blended_score * avg_confidence * config.confidence_weight)
        .clamp(0.0, 1.0);

    ScoreBreakdown {
        base_score,
        temporal_score,
        blended_score,
        avg_confidence,
        final_score,
    }
}
