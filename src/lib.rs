//! # meshwarden
//!
//! A self-observing, self-healing controller for dynamic multi-agent
//! fleet topologies. A fleet of cooperating worker nodes forms a
//! communication graph that shifts as nodes join, fail, and overload;
//! the warden samples that graph, computes structural-resilience metrics
//! (global min-cut, bottleneck nodes, clustering, path length),
//! extrapolates degradation trends, and autonomously dispatches
//! corrective actions — closing an Observe → Model → Decide → Act loop
//! without human intervention.
//!
//! ```text
//! FleetRegistry ──► TopologyObserver ──► TopologySnapshot
//!                                              │
//!                                              ▼
//!                                     ConnectivityAnalyzer
//!                                              │
//!                                              ▼
//!                     SelfModel (history, deltas, trend prediction)
//!                                              │
//!                                              ▼
//!                                       DecisionEngine
//!                                              │
//!                                              ▼
//!                      ActionExecutor ──► AgentLifecycle backend
//!                                              │
//!                                              └──► CyclePersistence
//! ```
//!
//! The [`warden::Warden`] drives the loop on a fixed interval with
//! per-cycle failure containment: a registry outage or a failing action
//! is logged, recorded, and retried on the next tick — the controller
//! itself keeps running. The warden can also turn its instruments on the
//! node hosting it ([`warden::Warden::self_diagnose`]): the self-model
//! includes the controller, so the controller can discover that it is
//! itself the fleet's weak point.
//!
//! All collaborators — registry, lifecycle backend, persistence, clock —
//! are injected traits; in-memory implementations back the tests and the
//! bundled `simulate` binary.

pub mod analysis;
pub mod config;
pub mod errors;
pub mod fleet;
pub mod healing;
pub mod model;
pub mod persistence;
pub mod warden;

pub use analysis::{BottleneckInfo, ConnectivityAnalyzer, ConnectivityMetrics};
pub use config::WardenConfig;
pub use fleet::{
    AgentLifecycle, FleetRegistry, NodeHealthMetrics, NodeId, TopologyObserver, TopologySnapshot,
    TopologyType,
};
pub use healing::{
    ActionPriority, ActionResult, DecisionEngine, HealingAction, HealingActionType,
};
pub use model::{PredictedVulnerability, Predictor, SelfModel, VulnerabilityKind};
pub use persistence::{CyclePersistence, CycleRecord, InMemoryPersistence};
pub use warden::{SelfDiagnosis, Warden, WardenHandle, WardenState, WardenStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
