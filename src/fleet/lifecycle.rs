//! Agent lifecycle collaborator — how corrective actions reach the fleet.
//!
//! The executor dispatches every healing action through this trait. The
//! warden never assumes anything about how an agent is actually spawned,
//! restarted, or migrated; that is the backend's business. The in-memory
//! backend applies each operation to the shared [`FleetState`] so the next
//! observation sees the repaired topology.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::LifecycleError;
use crate::fleet::registry::FleetState;
use crate::fleet::types::{NodeHealthMetrics, NodeId};

// ---------------------------------------------------------------------------
// Spawn specification
// ---------------------------------------------------------------------------

/// What to spawn, and where to wire it in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Role label for the new agent (e.g. "worker", "relay").
    pub role: String,
    /// Node whose connectivity the new agent should mirror. The backend
    /// connects the new node to this node and to each of its neighbors,
    /// which is what makes the mirrored node stop being a single point of
    /// failure.
    pub mirror_of: Option<NodeId>,
    /// Explicit peers to connect to, in addition to any mirror wiring.
    #[serde(default)]
    pub connect_to: Vec<NodeId>,
}

impl AgentSpec {
    /// Spec for a redundant twin of `node`.
    pub fn mirror(node: NodeId) -> Self {
        Self {
            role: "redundant-worker".to_string(),
            mirror_of: Some(node),
            connect_to: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Write-side collaborator: carries out corrective actions on the fleet.
#[async_trait]
pub trait AgentLifecycle: Send + Sync {
    /// Spawn a new agent and return its node id.
    async fn spawn_agent(&self, spec: &AgentSpec) -> Result<NodeId, LifecycleError>;

    /// Add a communication link between two nodes.
    async fn connect_nodes(&self, a: &NodeId, b: &NodeId) -> Result<(), LifecycleError>;

    /// Move load off `from`. With `to = None` the backend picks the
    /// destination.
    async fn migrate_load(&self, from: &NodeId, to: Option<&NodeId>)
        -> Result<(), LifecycleError>;

    /// Restart an agent in place.
    async fn restart_agent(&self, id: &NodeId) -> Result<(), LifecycleError>;

    /// Cut an agent off from the fleet without terminating it.
    async fn isolate_agent(&self, id: &NodeId) -> Result<(), LifecycleError>;

    /// Promote an agent to coordinator duty.
    async fn promote(&self, id: &NodeId) -> Result<(), LifecycleError>;

    /// Relieve an agent of coordinator duty.
    async fn demote(&self, id: &NodeId) -> Result<(), LifecycleError>;

    /// Remove a failing agent and reroute its links around the hole.
    async fn failover(&self, id: &NodeId) -> Result<(), LifecycleError>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// In-memory [`AgentLifecycle`] over the same [`FleetState`] the registry
/// reads, so every action is visible in the next snapshot. Supports
/// failure injection for exercising the executor's containment paths.
pub struct InMemoryLifecycle {
    state: Arc<RwLock<FleetState>>,
    failure: RwLock<Option<String>>,
}

impl InMemoryLifecycle {
    /// Create a backend over shared fleet state (typically obtained from
    /// [`InMemoryFleetRegistry::state`](crate::fleet::InMemoryFleetRegistry::state)).
    pub fn new(state: Arc<RwLock<FleetState>>) -> Self {
        Self {
            state,
            failure: RwLock::new(None),
        }
    }

    /// Make every subsequent call fail with `message` until cleared.
    pub fn inject_failure(&self, message: impl Into<String>) {
        *self.failure.write() = Some(message.into());
    }

    /// Clear an injected failure.
    pub fn clear_failure(&self) {
        *self.failure.write() = None;
    }

    fn check_failure(&self) -> Result<(), LifecycleError> {
        if let Some(message) = self.failure.read().clone() {
            return Err(LifecycleError::Failed(message));
        }
        Ok(())
    }

    fn require_node(state: &FleetState, id: &NodeId) -> Result<(), LifecycleError> {
        if state.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(LifecycleError::UnknownNode(id.to_string()))
        }
    }
}

#[async_trait]
impl AgentLifecycle for InMemoryLifecycle {
    async fn spawn_agent(&self, spec: &AgentSpec) -> Result<NodeId, LifecycleError> {
        self.check_failure()?;
        let mut state = self.state.write();
        let id = state.next_spawn_id();
        state.add_node(id.clone(), NodeHealthMetrics::healthy());

        if let Some(mirror) = &spec.mirror_of {
            Self::require_node(&state, mirror)?;
            for neighbor in state.neighbors(mirror) {
                state.add_edge(&id, &neighbor, 1.0);
            }
            state.add_edge(&id, mirror, 1.0);
        }
        for peer in &spec.connect_to {
            Self::require_node(&state, peer)?;
            state.add_edge(&id, peer, 1.0);
        }

        log::info!("spawned {} (role: {})", id, spec.role);
        Ok(id)
    }

    async fn connect_nodes(&self, a: &NodeId, b: &NodeId) -> Result<(), LifecycleError> {
        self.check_failure()?;
        let mut state = self.state.write();
        Self::require_node(&state, a)?;
        Self::require_node(&state, b)?;
        state.add_edge(a, b, 1.0);
        log::info!("connected {} and {}", a, b);
        Ok(())
    }

    async fn migrate_load(
        &self,
        from: &NodeId,
        to: Option<&NodeId>,
    ) -> Result<(), LifecycleError> {
        self.check_failure()?;
        let mut state = self.state.write();
        Self::require_node(&state, from)?;

        // Backend picks the least-loaded peer when no destination is given.
        let destination = match to {
            Some(to) => {
                Self::require_node(&state, to)?;
                to.clone()
            }
            None => state
                .nodes
                .iter()
                .filter(|(id, _)| *id != from)
                .min_by(|(_, a), (_, b)| a.memory_utilization.total_cmp(&b.memory_utilization))
                .map(|(id, _)| id.clone())
                .ok_or_else(|| LifecycleError::Failed("no destination for migration".into()))?,
        };

        let moved = match state.nodes.get_mut(from) {
            Some(source) => {
                let moved = source.memory_utilization / 2.0;
                source.memory_utilization -= moved;
                moved
            }
            None => return Err(LifecycleError::UnknownNode(from.to_string())),
        };
        if let Some(dest) = state.nodes.get_mut(&destination) {
            dest.memory_utilization = (dest.memory_utilization + moved).min(1.0);
        }
        log::info!("migrated load from {} to {}", from, destination);
        Ok(())
    }

    async fn restart_agent(&self, id: &NodeId) -> Result<(), LifecycleError> {
        self.check_failure()?;
        let mut state = self.state.write();
        Self::require_node(&state, id)?;
        state.set_health(id, NodeHealthMetrics::healthy());
        log::info!("restarted {}", id);
        Ok(())
    }

    async fn isolate_agent(&self, id: &NodeId) -> Result<(), LifecycleError> {
        self.check_failure()?;
        let mut state = self.state.write();
        Self::require_node(&state, id)?;
        state.disconnect(id);
        state.isolated.insert(id.clone());
        log::info!("isolated {}", id);
        Ok(())
    }

    async fn promote(&self, id: &NodeId) -> Result<(), LifecycleError> {
        self.check_failure()?;
        let mut state = self.state.write();
        Self::require_node(&state, id)?;
        state.coordinators.insert(id.clone());
        log::info!("promoted {} to coordinator", id);
        Ok(())
    }

    async fn demote(&self, id: &NodeId) -> Result<(), LifecycleError> {
        self.check_failure()?;
        let mut state = self.state.write();
        Self::require_node(&state, id)?;
        state.coordinators.remove(id);
        log::info!("demoted {}", id);
        Ok(())
    }

    async fn failover(&self, id: &NodeId) -> Result<(), LifecycleError> {
        self.check_failure()?;
        let mut state = self.state.write();
        Self::require_node(&state, id)?;

        // Remove the failing node and close ranks: its former neighbors
        // get direct links so its component does not fall apart.
        let neighbors = state.neighbors(id);
        state.remove_node(id);
        for i in 0..neighbors.len() {
            for j in (i + 1)..neighbors.len() {
                state.add_edge(&neighbors[i], &neighbors[j], 1.0);
            }
        }
        log::info!("failed over {}, rerouted {} neighbors", id, neighbors.len());
        Ok(())
    }
}
