//! Agents Module
//!
//! Contract between signal producers and the fusion core.
//!
//! ## Structure
//! - `types`: AnomalyResult, AgentKind, the SignalAgent trait
//! - `registry`: registered agents + static weights
//! - `channel`: adapter agent for externally captured signals

pub mod types;
pub mod registry;
pub mod channel;

pub use types::{AgentError, AgentKind, AnomalyResult, ResultSender, SignalAgent};
pub use registry::AgentRegistry;
pub use channel::ChannelAgent;
