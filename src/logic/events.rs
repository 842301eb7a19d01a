//! Event Bus - UI / Notification Channel
//!
//! The core publishes; the UI collaborator subscribes. Publishing never
//! blocks and never waits for a listener.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::logic::decision::ReauthMethod;
use crate::logic::fusion::ThreatLevel;

/// Event names
pub mod names {
    pub const REAUTH_REQUESTED: &str = "decision:reauth-requested";
    pub const ACCOUNT_LOCKED: &str = "decision:account-locked";
    pub const FUSION_EVALUATED: &str = "fusion:evaluated";
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// Ask the user to re-authenticate
    ReauthRequested {
        threat_level: ThreatLevel,
        message: String,
        method: ReauthMethod,
    },
    /// The account was locked
    AccountLocked { reason: String },
    /// A fusion evaluation completed
    FusionEvaluated {
        overall_score: f64,
        threat_level: ThreatLevel,
        timestamp: DateTime<Utc>,
    },
}

impl MonitorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MonitorEvent::ReauthRequested { .. } => names::REAUTH_REQUESTED,
            MonitorEvent::AccountLocked { .. } => names::ACCOUNT_LOCKED,
            MonitorEvent::FusionEvaluated { .. } => names::FUSION_EVALUATED,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Emit to all listeners. Returns how many received it.
    pub fn publish(&self, event: MonitorEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                // Silent fail - no UI attached is a normal state
                log::debug!("[Events] No listeners, event '{}' dropped", name);
                0
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_listeners_is_silent() {
        let bus = EventBus::new(4);
        let delivered = bus.publish(MonitorEvent::AccountLocked { reason: "test".to_string() });
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        assert_eq!(bus.listener_count(), 1);

        bus.publish(MonitorEvent::ReauthRequested {
            threat_level: ThreatLevel::Medium,
            message: "verify".to_string(),
            method: ReauthMethod::Biometric,
        });

        match rx.recv().await.unwrap() {
            MonitorEvent::ReauthRequested { method, .. } => assert_eq!(method, ReauthMethod::Biometric),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let json = serde_json::to_value(MonitorEvent::AccountLocked { reason: "r".to_string() }).unwrap();
        assert_eq!(json["event"], "account_locked");
        assert_eq!(json["reason"], "r");
    }
}
