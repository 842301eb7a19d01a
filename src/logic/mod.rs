//! Logic Module - Fusion & Decision Engines
//!
//! ## Architecture
//! - `agents/` - Signal producer contract, registry, channel adapter
//! - `fusion/` - Result window, scoring, classification, adaptive tuning
//! - `decision/` - Action execution, state store, forensics, audit
//! - `events` - UI notification bus
//! - `monitor` - Event-driven + periodic evaluation loops

pub mod agents;
pub mod fusion;
pub mod decision;
pub mod events;
pub mod monitor;
