//! Topology observer — the Observe stage of the control loop.
//!
//! Pulls the node list, edge list, and per-node health from the fleet
//! registry and folds them into one immutable [`TopologySnapshot`]. The
//! failure model is deliberately asymmetric: a registry that cannot list
//! its fleet fails the whole observation, while a single node that cannot
//! answer a health probe only degrades itself.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use crate::errors::ObservationError;
use crate::fleet::registry::FleetRegistry;
use crate::fleet::types::{NodeHealthMetrics, NodeId, TopologyEdge, TopologySnapshot};
use crate::warden::clock::Clock;

/// Samples the fleet registry into immutable snapshots.
pub struct TopologyObserver {
    registry: Arc<dyn FleetRegistry>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
}

impl TopologyObserver {
    /// Create an observer. `call_timeout` bounds every individual registry
    /// call — listings and each per-node health probe.
    pub fn new(
        registry: Arc<dyn FleetRegistry>,
        clock: Arc<dyn Clock>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            clock,
            call_timeout,
        }
    }

    /// Take one snapshot of the fleet.
    ///
    /// Fails only when the registry itself is unreachable or the topology
    /// listing times out. Health probe failures and timeouts are recorded
    /// as [`NodeHealthMetrics::unresponsive`] for that node.
    pub async fn observe(&self) -> Result<TopologySnapshot, ObservationError> {
        let timeout_ms = self.call_timeout.as_millis() as u64;

        let nodes = timeout(self.call_timeout, self.registry.list_nodes())
            .await
            .map_err(|_| ObservationError::Timeout(timeout_ms))?
            .map_err(|e| ObservationError::RegistryUnreachable(e.to_string()))?;

        let raw_edges = timeout(self.call_timeout, self.registry.list_edges())
            .await
            .map_err(|_| ObservationError::Timeout(timeout_ms))?
            .map_err(|e| ObservationError::RegistryUnreachable(e.to_string()))?;

        let mut edges = Vec::with_capacity(raw_edges.len());
        for (a, b, weight) in raw_edges {
            match TopologyEdge::new(a, b, weight) {
                Ok(edge) => edges.push(edge),
                Err(e) => log::debug!("dropping malformed edge: {}", e),
            }
        }

        let mut health = std::collections::BTreeMap::new();
        for node in &nodes {
            let metrics = match timeout(self.call_timeout, self.registry.node_health(node)).await
            {
                Ok(Ok(metrics)) => metrics,
                Ok(Err(e)) => {
                    log::debug!("health probe for {} failed: {}", node, e);
                    NodeHealthMetrics::unresponsive()
                }
                Err(_) => {
                    log::debug!("health probe for {} timed out after {}ms", node, timeout_ms);
                    NodeHealthMetrics::unresponsive()
                }
            };
            health.insert(node.clone(), metrics);
        }

        let snapshot = TopologySnapshot::new(
            self.clock.now(),
            self.registry.topology_type(),
            nodes,
            edges,
            health,
        );
        log::debug!(
            "observed {} nodes, {} edges",
            snapshot.node_count(),
            snapshot.edge_count()
        );
        Ok(snapshot)
    }

    /// Observe, but degrade a missing node instead of the caller having to
    /// special-case it: convenience used by self-diagnosis.
    pub(crate) async fn observe_containing(
        &self,
        node: &NodeId,
    ) -> Result<TopologySnapshot, ObservationError> {
        let snapshot = self.observe().await?;
        if !snapshot.contains(node) {
            log::warn!("self-diagnosing node {} is absent from the observed fleet", node);
        }
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::registry::InMemoryFleetRegistry;
    use crate::warden::clock::ManualClock;

    fn observer_over(registry: InMemoryFleetRegistry) -> TopologyObserver {
        TopologyObserver::new(
            Arc::new(registry),
            Arc::new(ManualClock::default()),
            Duration::from_millis(100),
        )
    }

    fn seeded_registry() -> InMemoryFleetRegistry {
        let registry = InMemoryFleetRegistry::new();
        {
            let state = registry.state();
            let mut state = state.write();
            for name in ["a", "b", "c"] {
                state.add_node(NodeId::from(name), NodeHealthMetrics::healthy());
            }
            state.add_edge(&NodeId::from("a"), &NodeId::from("b"), 1.0);
            state.add_edge(&NodeId::from("b"), &NodeId::from("c"), 1.0);
        }
        registry
    }

    #[tokio::test]
    async fn test_observe_builds_full_snapshot() {
        let observer = observer_over(seeded_registry());
        let snapshot = observer.observe().await.unwrap();
        assert_eq!(snapshot.node_count(), 3);
        assert_eq!(snapshot.edge_count(), 2);
        assert_eq!(
            snapshot.node_health(&NodeId::from("a")).unwrap().responsiveness,
            1.0
        );
    }

    #[tokio::test]
    async fn test_unreachable_registry_fails_observation() {
        let registry = seeded_registry();
        registry.set_unreachable(true);
        let observer = observer_over(registry);
        let err = observer.observe().await;
        assert!(matches!(err, Err(ObservationError::RegistryUnreachable(_))));
    }

    #[tokio::test]
    async fn test_slow_health_probe_degrades_only_that_node() {
        let registry = seeded_registry();
        registry.delay_health(NodeId::from("b"), Duration::from_secs(5));
        let observer = observer_over(registry);

        let snapshot = observer.observe().await.unwrap();
        assert_eq!(
            snapshot.node_health(&NodeId::from("b")).unwrap().responsiveness,
            0.0
        );
        // The others answered normally.
        assert_eq!(
            snapshot.node_health(&NodeId::from("a")).unwrap().responsiveness,
            1.0
        );
    }
}
