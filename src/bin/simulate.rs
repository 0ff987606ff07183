//! meshwarden simulation binary.
//!
//! Runs the warden against an in-memory fleet: a five-node star whose hub
//! is overloaded and flaky. Watch the controller spot the bottleneck,
//! spawn redundancy, redistribute load, and report a healthier topology.
//!
//! # Environment Variables
//!
//! - `SIM_CYCLES` — control-loop cycles to run (default: 5)
//! - `RUST_LOG` — log filter (default: "info")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin simulate
//! RUST_LOG=debug SIM_CYCLES=10 cargo run --bin simulate
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use meshwarden::fleet::{InMemoryFleetRegistry, InMemoryLifecycle, NodeHealthMetrics, NodeId};
use meshwarden::persistence::InMemoryPersistence;
use meshwarden::warden::Warden;
use meshwarden::WardenConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cycles: u64 = std::env::var("SIM_CYCLES")
        .unwrap_or_else(|_| "5".to_string())
        .parse()
        .context("SIM_CYCLES must be an integer")?;

    // A star fleet with a hub that is both overloaded and flaky — the
    // worst node to depend on is the one everything depends on.
    let registry = Arc::new(InMemoryFleetRegistry::new());
    {
        let state = registry.state();
        let mut state = state.write();
        let hub_health = NodeHealthMetrics::new(0.4, 0.7, 0.95, 4)
            .context("hub health")?;
        state.add_node(NodeId::new("hub"), hub_health);
        for worker in ["worker-1", "worker-2", "worker-3", "worker-4"] {
            state.add_node(NodeId::new(worker), NodeHealthMetrics::healthy());
            state.add_edge(&NodeId::new("hub"), &NodeId::new(worker), 1.0);
        }
    }
    let lifecycle = Arc::new(InMemoryLifecycle::new(registry.state()));
    let persistence = Arc::new(InMemoryPersistence::new());

    let config = WardenConfig {
        loop_interval_ms: 1000,
        ..WardenConfig::default()
    };
    let mut warden = Warden::new(config, registry, lifecycle, persistence.clone())
        .context("building warden")?;
    let handle = warden.handle();

    log::info!("running {} cycles against the simulated fleet", cycles);
    let runner = tokio::spawn(async move {
        warden.run().await;
        warden
    });

    // Let the loop work until it has persisted the requested cycles.
    while (persistence.len() as u64) < cycles {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    handle.stop();
    let warden = runner.await.context("warden task panicked")?;

    // Final report: what happened, and what the fleet looks like now.
    let stats = warden.stats();
    let view = warden.model_view();
    println!("\n=== warden stats ===");
    println!("{}", serde_json::to_string_pretty(&stats)?);
    if let Some(metrics) = &view.latest_metrics {
        println!("\n=== final connectivity ===");
        println!("{}", serde_json::to_string_pretty(metrics)?);
    }
    println!("\n=== action audit log ===");
    for record in warden.action_log() {
        println!(
            "[{}] {} target={} success={} ({}ms): {}",
            record.started_at.format("%H:%M:%S"),
            record.action.action_type,
            record
                .action
                .target
                .as_ref()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            record.result.success,
            record.result.duration_ms,
            record.result.message,
        );
    }

    let diagnosis = warden.self_diagnose(&NodeId::new("hub")).await?;
    println!("\n=== self-diagnosis of 'hub' ===");
    println!("{}", serde_json::to_string_pretty(&diagnosis)?);

    Ok(())
}
