//! Risk Fusion Core
//!
//! Fuses anomaly scores from independent signal agents into one risk
//! level and executes the matching response (log, re-auth, lock).

pub mod constants;
pub mod logic;

pub use logic::monitor::{FusionMonitor, MonitorConfig, MonitorError, MonitorStatus};
