//! Adaptive Threshold Tuner
//!
//! Slow negative-feedback controller on the HIGH rate: too many HIGH
//! results raise the thresholds, none at all lowers them.

use super::history::FusionHistory;
use super::rules::{FusionConfig, Thresholds};
use super::types::ThreatLevel;

/// Evaluations inspected per tuning step
pub const TUNING_WINDOW: usize = 10;

/// More HIGH results than this in the window raises thresholds
pub const HIGH_RATE_CEILING: usize = 7;

/// Fewer HIGH results than this in the window lowers thresholds
pub const HIGH_RATE_FLOOR: usize = 1;

const HIGH_RAISE_STEP: f64 = 0.05;
const MEDIUM_RAISE_STEP: f64 = 0.03;
/// Raised medium stays at least this far below high
const MIN_THRESHOLD_GAP: f64 = 0.1;

const HIGH_LOWER_STEP: f64 = 0.02;
const MEDIUM_LOWER_STEP: f64 = 0.01;
const HIGH_FLOOR: f64 = 0.7;
const MEDIUM_FLOOR: f64 = 0.4;

/// Direction of one tuning step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneOutcome {
    Raised,
    Lowered,
    Unchanged,
}

/// Return the (possibly adjusted) config for the given history
pub fn tune(history: &FusionHistory, config: &FusionConfig) -> FusionConfig {
    tune_with_outcome(history, config).0
}

pub fn tune_with_outcome(history: &FusionHistory, config: &FusionConfig) -> (FusionConfig, TuneOutcome) {
    if !config.adaptive_learning || history.len() < TUNING_WINDOW {
        return (config.clone(), TuneOutcome::Unchanged);
    }

    let high_count = history
        .last_levels(TUNING_WINDOW)
        .into_iter()
        .filter(|level| *level == ThreatLevel::High)
        .count();

    let t = config.thresholds;
    let (candidate, outcome) = if high_count > HIGH_RATE_CEILING {
        let high = (t.high() + HIGH_RAISE_STEP).min(1.0);
        let medium = (t.medium() + MEDIUM_RAISE_STEP).min(high - MIN_THRESHOLD_GAP);
        (Thresholds::new(t.low(), medium, high), TuneOutcome::Raised)
    } else if high_count < HIGH_RATE_FLOOR {
        // Each threshold moves on its own; one that would break the
        // ordering stays put while the other still drops
        let mut medium = (t.medium() - MEDIUM_LOWER_STEP).max(MEDIUM_FLOOR);
        if medium <= t.low() {
            medium = t.medium();
        }
        let mut high = (t.high() - HIGH_LOWER_STEP).max(HIGH_FLOOR);
        if high <= medium {
            high = t.high();
        }
        (Thresholds::new(t.low(), medium, high), TuneOutcome::Lowered)
    } else {
        return (config.clone(), TuneOutcome::Unchanged);
    };

    match candidate {
        Ok(thresholds) if thresholds != t => {
            log::info!(
                "[Tuner] {} HIGH in last {}: thresholds medium {:.2} -> {:.2}, high {:.2} -> {:.2}",
                high_count,
                TUNING_WINDOW,
                t.medium(),
                thresholds.medium(),
                t.high(),
                thresholds.high()
            );
            (config.clone().with_thresholds(thresholds), outcome)
        }
        Ok(_) => (config.clone(), TuneOutcome::Unchanged),
        Err(e) => {
            log::debug!("[Tuner] Adjustment discarded: {}", e);
            (config.clone(), TuneOutcome::Unchanged)
        }
    }
}
