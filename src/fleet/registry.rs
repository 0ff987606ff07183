//! Fleet registry collaborator — where topology and health come from.
//!
//! The warden never talks to fleet nodes directly; it reads membership,
//! edges, and health through this trait. Production deployments back it
//! with whatever discovery plane the fleet runs on. The in-memory
//! implementation here backs simulations and tests, and doubles as the
//! mutable world that [`InMemoryLifecycle`](crate::fleet::InMemoryLifecycle)
//! applies corrective actions to.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::RegistryError;
use crate::fleet::types::{NodeHealthMetrics, NodeId, TopologyType};

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Read-side collaborator: the source of truth for fleet membership,
/// connectivity, and per-node health.
#[async_trait]
pub trait FleetRegistry: Send + Sync {
    /// All nodes currently registered.
    async fn list_nodes(&self) -> Result<Vec<NodeId>, RegistryError>;

    /// All communication links, as `(a, b, weight)` triples.
    async fn list_edges(&self) -> Result<Vec<(NodeId, NodeId, f64)>, RegistryError>;

    /// Health of one node. Callers bound this with their own timeout; a
    /// slow or failing answer degrades that node, not the observation.
    async fn node_health(&self, node: &NodeId) -> Result<NodeHealthMetrics, RegistryError>;

    /// Informational topology label.
    fn topology_type(&self) -> TopologyType {
        TopologyType::Hybrid
    }
}

// ---------------------------------------------------------------------------
// Shared simulated fleet state
// ---------------------------------------------------------------------------

/// Mutable fleet state shared between the in-memory registry and the
/// in-memory lifecycle backend, so corrective actions are visible in the
/// very next observation.
#[derive(Debug, Default)]
pub struct FleetState {
    pub(crate) nodes: BTreeMap<NodeId, NodeHealthMetrics>,
    pub(crate) edges: BTreeMap<(NodeId, NodeId), f64>,
    pub(crate) topology_type: TopologyType,
    pub(crate) coordinators: BTreeSet<NodeId>,
    pub(crate) isolated: BTreeSet<NodeId>,
    pub(crate) spawn_counter: u64,
}

impl FleetState {
    fn edge_key(a: &NodeId, b: &NodeId) -> (NodeId, NodeId) {
        if a <= b {
            (a.clone(), b.clone())
        } else {
            (b.clone(), a.clone())
        }
    }

    /// Add a node with the given health, replacing any existing entry.
    pub fn add_node(&mut self, id: NodeId, health: NodeHealthMetrics) {
        self.nodes.insert(id, health);
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&mut self, id: &NodeId) {
        self.nodes.remove(id);
        self.edges.retain(|(a, b), _| a != id && b != id);
        self.coordinators.remove(id);
        self.isolated.remove(id);
    }

    /// Add or replace an undirected edge.
    pub fn add_edge(&mut self, a: &NodeId, b: &NodeId, weight: f64) {
        if a == b {
            return;
        }
        self.edges.insert(Self::edge_key(a, b), weight);
    }

    /// Remove every edge incident to `id`, keeping the node registered.
    pub fn disconnect(&mut self, id: &NodeId) {
        self.edges.retain(|(a, b), _| a != id && b != id);
    }

    /// Neighbors of `id`, sorted.
    pub fn neighbors(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .edges
            .keys()
            .filter_map(|(a, b)| {
                if a == id {
                    Some(b.clone())
                } else if b == id {
                    Some(a.clone())
                } else {
                    None
                }
            })
            .collect();
        out.sort();
        out
    }

    /// Overwrite one node's health.
    pub fn set_health(&mut self, id: &NodeId, health: NodeHealthMetrics) {
        if let Some(entry) = self.nodes.get_mut(id) {
            *entry = health;
        }
    }

    /// Next deterministic name for a spawned node.
    pub(crate) fn next_spawn_id(&mut self) -> NodeId {
        self.spawn_counter += 1;
        NodeId::new(format!("spawn-{}", self.spawn_counter))
    }
}

// ---------------------------------------------------------------------------
// In-memory registry
// ---------------------------------------------------------------------------

/// In-memory [`FleetRegistry`] over a shared [`FleetState`].
///
/// Supports the failure and latency injection the tests and the simulation
/// binary need: the whole registry can be marked unreachable, and
/// individual health probes can be delayed past the observer's timeout.
pub struct InMemoryFleetRegistry {
    state: Arc<RwLock<FleetState>>,
    unreachable: AtomicBool,
    health_delays: RwLock<BTreeMap<NodeId, Duration>>,
}

impl InMemoryFleetRegistry {
    /// Create an empty fleet.
    pub fn new() -> Self {
        Self::with_state(Arc::new(RwLock::new(FleetState::default())))
    }

    /// Create a registry over existing shared state.
    pub fn with_state(state: Arc<RwLock<FleetState>>) -> Self {
        Self {
            state,
            unreachable: AtomicBool::new(false),
            health_delays: RwLock::new(BTreeMap::new()),
        }
    }

    /// Handle to the shared fleet state, for wiring up a lifecycle backend
    /// or mutating the fleet mid-test.
    pub fn state(&self) -> Arc<RwLock<FleetState>> {
        Arc::clone(&self.state)
    }

    /// Make every listing call fail until re-enabled.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delay health answers for `node` by `delay`, to simulate a node that
    /// is alive in the registry but too slow to answer probes.
    pub fn delay_health(&self, node: NodeId, delay: Duration) {
        self.health_delays.write().insert(node, delay);
    }

    fn check_reachable(&self) -> Result<(), RegistryError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("registry marked unreachable".into()));
        }
        Ok(())
    }
}

impl Default for InMemoryFleetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FleetRegistry for InMemoryFleetRegistry {
    async fn list_nodes(&self) -> Result<Vec<NodeId>, RegistryError> {
        self.check_reachable()?;
        Ok(self.state.read().nodes.keys().cloned().collect())
    }

    async fn list_edges(&self) -> Result<Vec<(NodeId, NodeId, f64)>, RegistryError> {
        self.check_reachable()?;
        Ok(self
            .state
            .read()
            .edges
            .iter()
            .map(|((a, b), w)| (a.clone(), b.clone(), *w))
            .collect())
    }

    async fn node_health(&self, node: &NodeId) -> Result<NodeHealthMetrics, RegistryError> {
        self.check_reachable()?;
        let delay = self.health_delays.read().get(node).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state
            .read()
            .nodes
            .get(node)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownNode(node.to_string()))
    }

    fn topology_type(&self) -> TopologyType {
        self.state.read().topology_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_registry() -> InMemoryFleetRegistry {
        let registry = InMemoryFleetRegistry::new();
        {
            let state = registry.state();
            let mut state = state.write();
            state.add_node(NodeId::from("a"), NodeHealthMetrics::healthy());
            state.add_node(NodeId::from("b"), NodeHealthMetrics::healthy());
            state.add_edge(&NodeId::from("a"), &NodeId::from("b"), 1.0);
        }
        registry
    }

    #[tokio::test]
    async fn test_listing_and_health() {
        let registry = seeded_registry();
        assert_eq!(registry.list_nodes().await.unwrap().len(), 2);
        assert_eq!(registry.list_edges().await.unwrap().len(), 1);
        let health = registry.node_health(&NodeId::from("a")).await.unwrap();
        assert_eq!(health.responsiveness, 1.0);
    }

    #[tokio::test]
    async fn test_unknown_node_health_is_an_error() {
        let registry = seeded_registry();
        let err = registry.node_health(&NodeId::from("ghost")).await;
        assert!(matches!(err, Err(RegistryError::UnknownNode(_))));
    }

    #[tokio::test]
    async fn test_unreachable_registry_fails_listings() {
        let registry = seeded_registry();
        registry.set_unreachable(true);
        assert!(registry.list_nodes().await.is_err());
        assert!(registry.list_edges().await.is_err());
        registry.set_unreachable(false);
        assert!(registry.list_nodes().await.is_ok());
    }

    #[test]
    fn test_remove_node_drops_incident_edges() {
        let registry = seeded_registry();
        let state = registry.state();
        state.write().remove_node(&NodeId::from("a"));
        assert!(state.read().edges.is_empty());
        assert_eq!(state.read().nodes.len(), 1);
    }

    #[test]
    fn test_edge_key_is_order_insensitive() {
        let registry = InMemoryFleetRegistry::new();
        let state = registry.state();
        let mut state = state.write();
        state.add_node(NodeId::from("a"), NodeHealthMetrics::healthy());
        state.add_node(NodeId::from("b"), NodeHealthMetrics::healthy());
        state.add_edge(&NodeId::from("b"), &NodeId::from("a"), 1.0);
        state.add_edge(&NodeId::from("a"), &NodeId::from("b"), 2.0);
        assert_eq!(state.edges.len(), 1);
    }
}
