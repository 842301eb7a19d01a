//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.
//! Every default can be overridden through the environment.

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Risk Fusion Core";

// ============================================
// Fusion defaults
// ============================================

/// Scores below this are "no signal" territory (currently inert in classification)
pub const DEFAULT_LOW_THRESHOLD: f64 = 0.3;

/// At or above this score = MEDIUM
pub const DEFAULT_MEDIUM_THRESHOLD: f64 = 0.6;

/// At or above this score = HIGH
pub const DEFAULT_HIGH_THRESHOLD: f64 = 1.0;

/// Evidence older than this is dropped from the window (ms)
pub const DEFAULT_TIME_WINDOW_MS: u64 = 30_000;

/// Longest accepted evidence window (one day, ms)
pub const MAX_TIME_WINDOW_MS: u64 = 24 * 60 * 60 * 1000;

/// Minimum number of active agents before an evaluation runs
pub const DEFAULT_MIN_AGENTS: usize = 1;

/// Share of the score re-weighted by average confidence
pub const DEFAULT_CONFIDENCE_WEIGHT: f64 = 0.2;

/// Share of the score taken from recency-weighted evidence
pub const DEFAULT_TEMPORAL_WEIGHT: f64 = 0.3;

/// Periodic re-evaluation interval (seconds)
pub const DEFAULT_EVAL_INTERVAL_SECS: u64 = 5;

/// Fusion history ring capacity
pub const FUSION_HISTORY_CAPACITY: usize = 100;

/// Decision history capacity
pub const DECISION_HISTORY_CAPACITY: usize = 500;

/// Forensic log capacity
pub const FORENSIC_LOG_CAPACITY: usize = 50;

/// Capacity of the agent -> monitor result channel
pub const RESULT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the UI event bus
pub const EVENT_BUS_CAPACITY: usize = 64;

/// Sensitive cache regions wiped on account lock
pub const DEFAULT_SENSITIVE_CACHES: &[&str] = &["credentials", "payment_tokens", "session_keys"];

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Read a parseable value from the environment or use the default
pub fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a boolean flag from the environment ("false"/"0" disable)
pub fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|s| s.to_lowercase() != "false" && s != "0")
        .unwrap_or(default)
}

/// Read an optional string from the environment (empty = unset)
pub fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds_are_ordered() {
        assert!(DEFAULT_LOW_THRESHOLD < DEFAULT_MEDIUM_THRESHOLD);
        assert!(DEFAULT_MEDIUM_THRESHOLD < DEFAULT_HIGH_THRESHOLD);
    }

    #[test]
    fn test_env_fallback() {
        assert_eq!(env_or("RISK_FUSION_TEST_UNSET_KEY", 42u64), 42);
        assert!(env_flag("RISK_FUSION_TEST_UNSET_FLAG", true));
        assert!(env_string("RISK_FUSION_TEST_UNSET_STR").is_none());
    }
}
