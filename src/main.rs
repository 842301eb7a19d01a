//! Risk Fusion Core - Main Entry Point
//!
//! Replays AnomalyResult JSON lines from stdin through the fusion monitor.
//! Each line is routed to the channel agent matching its agent id
//! (touch, typing, usage, movement, honeypot). On EOF the monitor runs a
//! final evaluation, stops, and prints a JSON summary to stdout.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use risk_fusion_core::constants::{APP_NAME, APP_VERSION, FORENSIC_LOG_CAPACITY};
use risk_fusion_core::logic::agents::{AgentKind, AgentRegistry, AnomalyResult, ChannelAgent};
use risk_fusion_core::logic::decision::{
    ForensicLog, MemoryStateStore, SecureStateStore, SqliteStateStore,
};
use risk_fusion_core::{FusionMonitor, MonitorConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting {} v{}...", APP_NAME, APP_VERSION);

    let config = MonitorConfig::from_env().context("invalid FUSION_* configuration")?;

    // Agents
    let mut registry = AgentRegistry::new();
    let mut agents: HashMap<AgentKind, Arc<ChannelAgent>> = HashMap::new();
    for kind in AgentKind::ALL {
        let agent = Arc::new(ChannelAgent::new(kind.as_str(), kind.default_weight()));
        registry.register(agent.clone())?;
        agents.insert(kind, agent);
    }

    // State store
    let store: Arc<dyn SecureStateStore> = match &config.state_db {
        Some(path) => Arc::new(
            SqliteStateStore::open(path).with_context(|| format!("opening state db {:?}", path))?,
        ),
        None => Arc::new(MemoryStateStore::new()),
    };
    let forensics = Arc::new(ForensicLog::new(FORENSIC_LOG_CAPACITY));

    let monitor = FusionMonitor::new(config, registry, store, forensics)?;

    // UI stand-in: log every event
    let mut events = monitor.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => log::info!("[Event] {}", json),
                    Err(e) => log::warn!("[Event] Unserializable event: {}", e),
                },
                Err(RecvError::Lagged(skipped)) => log::warn!("[Event] Listener lagged, {} events skipped", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    if monitor.decisions().is_locked() {
        log::warn!("[Replay] Account is locked from a previous run");
    }

    monitor.start();

    // Replay
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut accepted = 0usize;
    let mut rejected = 0usize;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result: AnomalyResult = match serde_json::from_str(line) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("[Replay] Skipping malformed line: {}", e);
                rejected += 1;
                continue;
            }
        };

        let Some(agent) = result.kind().and_then(|kind| agents.get(&kind)) else {
            log::warn!("[Replay] No agent for id '{}', skipping", result.agent_id);
            rejected += 1;
            continue;
        };

        if agent.push(result).await {
            accepted += 1;
        } else {
            rejected += 1;
        }
    }

    log::info!("[Replay] Input finished: {} accepted, {} rejected", accepted, rejected);

    // Final pass over the latest score of every agent
    monitor.collect_now();
    let last = tokio::task::block_in_place(|| monitor.evaluate_now());
    let status = monitor.status();
    let fusion_stats = monitor.fusion_stats();

    monitor.stop().await;
    let decision_stats = monitor.decisions().stats();

    drop(monitor);
    listener.abort();

    let summary = serde_json::json!({
        "accepted": accepted,
        "rejected": rejected,
        "final_score": last.as_ref().map(|e| e.result.overall_score),
        "final_level": last.as_ref().map(|e| e.result.threat_level),
        "final_action": last.as_ref().map(|e| e.decision.action),
        "status": status,
        "fusion": fusion_stats,
        "decisions": decision_stats,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
