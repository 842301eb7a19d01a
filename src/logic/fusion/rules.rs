//! Fusion Rules & Configuration
//!
//! Thresholds, cutoffs and the validated FusionConfig.
//! No scoring logic here - only constants and config.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    env_flag, env_or, DEFAULT_CONFIDENCE_WEIGHT, DEFAULT_HIGH_THRESHOLD, DEFAULT_LOW_THRESHOLD,
    DEFAULT_MEDIUM_THRESHOLD, DEFAULT_MIN_AGENTS, DEFAULT_TEMPORAL_WEIGHT, DEFAULT_TIME_WINDOW_MS,
    MAX_TIME_WINDOW_MS,
};

// ============================================================================
// CUTOFFS (Constants - not tuned at runtime)
// ============================================================================

/// Agents scoring above this are "implicated" in the recommended action text
pub const RECOMMENDATION_CUTOFF: f64 = 0.7;

/// Agents scoring above this drive the re-authentication modality
pub const REAUTH_CUTOFF: f64 = 0.6;

/// Number of implicated agents that makes a HIGH result "coordinated"
pub const MULTI_AGENT_IMPLICATION: usize = 3;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FusionError {
    #[error("threshold {name} = {value} is outside [0, 1]")]
    ThresholdOutOfRange { name: &'static str, value: f64 },
    #[error("thresholds must be strictly increasing (low {low} < medium {medium} < high {high})")]
    ThresholdOrder { low: f64, medium: f64, high: f64 },
    #[error("{name} = {value} is outside [0, 1]")]
    WeightOutOfRange { name: &'static str, value: f64 },
    #[error("time window must be > 0 ms")]
    EmptyTimeWindow,
    #[error("time window {0} ms is longer than one day")]
    TimeWindowTooLong(u64),
    #[error("min_agents_required must be >= 1")]
    NoAgentsRequired,
}

// ============================================================================
// THRESHOLDS
// ============================================================================

/// Classification thresholds. Only constructible with `low < medium < high`,
/// each inside [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds", into = "RawThresholds")]
pub struct Thresholds {
    low: f64,
    medium: f64,
    high: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawThresholds {
    low: f64,
    medium: f64,
    high: f64,
}

impl TryFrom<RawThresholds> for Thresholds {
    type Error = FusionError;

    fn try_from(raw: RawThresholds) -> Result<Self, Self::Error> {
        Thresholds::new(raw.low, raw.medium, raw.high)
    }
}

impl From<Thresholds> for RawThresholds {
    fn from(t: Thresholds) -> Self {
        RawThresholds { low: t.low, medium: t.medium, high: t.high }
    }
}

impl Thresholds {
    pub fn new(low: f64, medium: f64, high: f64) -> Result<Self, FusionError> {
        for (name, value) in [("low", low), ("medium", medium), ("high", high)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(FusionError::ThresholdOutOfRange { name, value });
            }
        }
        if !(low < medium && medium < high) {
            return Err(FusionError::ThresholdOrder { low, medium, high });
        }
        Ok(Self { low, medium, high })
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn medium(&self) -> f64 {
        self.medium
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW_THRESHOLD,
            medium: DEFAULT_MEDIUM_THRESHOLD,
            high: DEFAULT_HIGH_THRESHOLD,
        }
    }
}

// ============================================================================
// FUSION CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    pub thresholds: Thresholds,
    /// Evidence time-to-live (ms)
    pub time_window_ms: u64,
    /// Evaluations are skipped below this many active agents
    pub min_agents_required: usize,
    pub confidence_weight: f64,
    pub temporal_weight: f64,
    /// Let the adaptive tuner move the thresholds
    pub adaptive_learning: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            time_window_ms: DEFAULT_TIME_WINDOW_MS,
            min_agents_required: DEFAULT_MIN_AGENTS,
            confidence_weight: DEFAULT_CONFIDENCE_WEIGHT,
            temporal_weight: DEFAULT_TEMPORAL_WEIGHT,
            adaptive_learning: true,
        }
    }
}

impl FusionConfig {
    /// Load from environment (FUSION_*), falling back to defaults
    pub fn from_env() -> Result<Self, FusionError> {
        let config = Self {
            thresholds: Thresholds::new(
                env_or("FUSION_LOW_THRESHOLD", DEFAULT_LOW_THRESHOLD),
                env_or("FUSION_MEDIUM_THRESHOLD", DEFAULT_MEDIUM_THRESHOLD),
                env_or("FUSION_HIGH_THRESHOLD", DEFAULT_HIGH_THRESHOLD),
            )?,
            time_window_ms: env_or("FUSION_TIME_WINDOW_MS", DEFAULT_TIME_WINDOW_MS),
            min_agents_required: env_or("FUSION_MIN_AGENTS", DEFAULT_MIN_AGENTS),
            confidence_weight: env_or("FUSION_CONFIDENCE_WEIGHT", DEFAULT_CONFIDENCE_WEIGHT),
            temporal_weight: env_or("FUSION_TEMPORAL_WEIGHT", DEFAULT_TEMPORAL_WEIGHT),
            adaptive_learning: env_flag("FUSION_ADAPTIVE_LEARNING", true),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant that the thresholds type cannot enforce itself
    pub fn validate(&self) -> Result<(), FusionError> {
        if self.time_window_ms == 0 {
            return Err(FusionError::EmptyTimeWindow);
        }
        if self.time_window_ms > MAX_TIME_WINDOW_MS {
            return Err(FusionError::TimeWindowTooLong(self.time_window_ms));
        }
        if self.min_agents_required == 0 {
            return Err(FusionError::NoAgentsRequired);
        }
        for (name, value) in [
            ("confidence_weight", self.confidence_weight),
            ("temporal_weight", self.temporal_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(FusionError::WeightOutOfRange { name, value });
            }
        }
        Ok(())
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_weights(mut self, confidence_weight: f64, temporal_weight: f64) -> Self {
        self.confidence_weight = confidence_weight;
        self.temporal_weight = temporal_weight;
        self
    }

    pub fn with_adaptive_learning(mut self, enabled: bool) -> Self {
        self.adaptive_learning = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FusionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_thresholds_reject_bad_order() {
        assert!(matches!(
            Thresholds::new(0.6, 0.3, 0.9),
            Err(FusionError::ThresholdOrder { .. })
        ));
        assert!(matches!(
            Thresholds::new(0.3, 0.6, 0.6),
            Err(FusionError::ThresholdOrder { .. })
        ));
    }

    #[test]
    fn test_thresholds_reject_out_of_range() {
        assert!(matches!(
            Thresholds::new(-0.1, 0.5, 0.8),
            Err(FusionError::ThresholdOutOfRange { name: "low", .. })
        ));
        assert!(matches!(
            Thresholds::new(0.3, 0.6, 1.2),
            Err(FusionError::ThresholdOutOfRange { name: "high", .. })
        ));
        assert!(Thresholds::new(0.3, 0.6, f64::NAN).is_err());
    }

    #[test]
    fn test_deserialize_validates_thresholds() {
        let bad = r#"{"low":0.5,"medium":0.4,"high":0.9}"#;
        assert!(serde_json::from_str::<Thresholds>(bad).is_err());

        let good = r#"{"low":0.2,"medium":0.4,"high":0.9}"#;
        let t: Thresholds = serde_json::from_str(good).unwrap();
        assert_eq!(t.medium(), 0.4);
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let config = FusionConfig::default().with_weights(1.5, 0.0);
        assert!(matches!(
            config.validate(),
            Err(FusionError::WeightOutOfRange { name: "confidence_weight", .. })
        ));

        let config = FusionConfig { min_agents_required: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(FusionError::NoAgentsRequired));

        let config = FusionConfig { time_window_ms: 0, ..Default::default() };
        assert_eq!(config.validate(), Err(FusionError::EmptyTimeWindow));

        let config = FusionConfig { time_window_ms: u64::MAX, ..Default::default() };
        assert_eq!(config.validate(), Err(FusionError::TimeWindowTooLong(u64::MAX)));

        let config = FusionConfig { time_window_ms: MAX_TIME_WINDOW_MS, ..Default::default() };
        assert!(config.validate().is_ok());
    }
}
