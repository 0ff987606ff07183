//! Fleet-facing types and collaborators.
//!
//! Everything the warden knows about the outside world enters through this
//! module: topology/health snapshots ([`types`]), the read-side registry
//! ([`registry`]), the write-side lifecycle backend ([`lifecycle`]), and
//! the observer that folds registry answers into snapshots ([`observer`]).

pub mod lifecycle;
pub mod observer;
pub mod registry;
pub mod types;

pub use lifecycle::{AgentLifecycle, AgentSpec, InMemoryLifecycle};
pub use observer::TopologyObserver;
pub use registry::{FleetRegistry, FleetState, InMemoryFleetRegistry};
pub use types::{NodeHealthMetrics, NodeId, TopologyEdge, TopologySnapshot, TopologyType};
