//! Fusion Module
//!
//! Combines per-agent anomaly evidence into one risk score and threat level.
//! This is the CORE STEP - everything downstream acts on its output.
//!
//! ## Structure
//! - `types`: ThreatLevel, FusionResult, ScoreBreakdown
//! - `rules`: cutoffs, Thresholds, FusionConfig
//! - `window`: time-bounded latest-result-per-agent map
//! - `engine`: scoring and classification
//! - `recommend`: action text
//! - `history`: bounded FusionResult ring
//! - `tuner`: adaptive threshold adjustment
//!
//! ## Usage
//! ```ignore
//! use crate::logic::fusion::{evaluate, FusionConfig, ResultWindow};
//!
//! let result = evaluate(&window.snapshot(), &config, registry.weights());
//! match result.threat_level {
//!     ThreatLevel::Low => println!("Log"),
//!     ThreatLevel::Medium => println!("Re-authenticate"),
//!     ThreatLevel::High => println!("Lock"),
//! }
//! ```

pub mod types;
pub mod rules;
pub mod window;
pub mod engine;
pub mod recommend;
pub mod history;
pub mod tuner;


pub use types::{FusionResult, ScoreBreakdown, ThreatLevel};
pub use rules::{FusionConfig, FusionError, Thresholds, REAUTH_CUTOFF, RECOMMENDATION_CUTOFF};
pub use window::ResultWindow;
pub use engine::{classify, evaluate, evaluate_at};
pub use history::{FusionHistory, FusionStats};
pub use tuner::{tune, tune_with_outcome, TuneOutcome};
