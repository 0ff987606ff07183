//! Fleet topology types: nodes, edges, health, snapshots.
//!
//! A [`TopologySnapshot`] is the immutable picture of the fleet taken once
//! per cycle. Everything downstream — analysis, modeling, decisions — is a
//! pure function of snapshots, so construction is the single place where
//! input is normalized and validated.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

// ---------------------------------------------------------------------------
// Node identity
// ---------------------------------------------------------------------------

/// Identifier of a fleet node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Topology shape
// ---------------------------------------------------------------------------

/// Shape of the fleet's communication graph. Informational only: the
/// analyzer works from the actual edge set, never from this label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopologyType {
    /// Every node may talk to every node.
    Mesh,
    /// Coordinator layers above worker layers.
    Hierarchical,
    /// Each node talks to two neighbors.
    Ring,
    /// All traffic passes a single hub.
    Star,
    /// Anything else, including fleets mid-reconfiguration.
    #[default]
    Hybrid,
}

impl fmt::Display for TopologyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TopologyType::Mesh => "mesh",
            TopologyType::Hierarchical => "hierarchical",
            TopologyType::Ring => "ring",
            TopologyType::Star => "star",
            TopologyType::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// Undirected weighted edge between two fleet nodes.
///
/// Endpoints are stored in sorted order so `(a, b)` and `(b, a)` are the
/// same edge. Weight expresses link capacity and must be non-negative and
/// finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyEdge {
    /// Smaller endpoint.
    pub a: NodeId,
    /// Larger endpoint.
    pub b: NodeId,
    /// Link capacity.
    pub weight: f64,
}

impl TopologyEdge {
    /// Create a normalized edge. Rejects self-loops by collapsing them at
    /// snapshot construction; here only the weight is validated.
    pub fn new(a: NodeId, b: NodeId, weight: f64) -> Result<Self, ValidationError> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(ValidationError::BadEdgeWeight(weight));
        }
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        Ok(Self { a, b, weight })
    }

    /// Whether this edge is incident to `node`.
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.a == node || &self.b == node
    }

    /// The endpoint opposite `node`, if `node` is an endpoint.
    pub fn other(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.a == node {
            Some(&self.b)
        } else if &self.b == node {
            Some(&self.a)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Node health
// ---------------------------------------------------------------------------

/// Per-node health as reported by the fleet registry.
///
/// Ratio fields are validated into `[0, 1]` at construction. Out-of-range
/// input is a [`ValidationError`], never a silent clamp — a registry
/// reporting a responsiveness of 1.3 is lying, and lies get rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeHealthMetrics {
    /// Fraction of health probes answered in time.
    pub responsiveness: f64,
    /// Fraction of assigned tasks completed successfully.
    pub task_completion_rate: f64,
    /// Fraction of the node's memory budget in use.
    pub memory_utilization: f64,
    /// Open connections to peers.
    pub active_connections: u32,
    /// Degree in the observed topology. Filled in at snapshot construction.
    pub degree: u32,
    /// Whether the node was flagged as a bottleneck on a previous cycle.
    pub is_bottleneck: bool,
}

impl NodeHealthMetrics {
    /// Create validated health metrics.
    pub fn new(
        responsiveness: f64,
        task_completion_rate: f64,
        memory_utilization: f64,
        active_connections: u32,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            responsiveness: check_ratio("responsiveness", responsiveness)?,
            task_completion_rate: check_ratio("task_completion_rate", task_completion_rate)?,
            memory_utilization: check_ratio("memory_utilization", memory_utilization)?,
            active_connections,
            degree: 0,
            is_bottleneck: false,
        })
    }

    /// The sentinel recorded when a node fails or times out its health
    /// probe: zero responsiveness, everything else unknown-as-zero.
    pub fn unresponsive() -> Self {
        Self {
            responsiveness: 0.0,
            task_completion_rate: 0.0,
            memory_utilization: 0.0,
            active_connections: 0,
            degree: 0,
            is_bottleneck: false,
        }
    }

    /// A fully healthy node. Convenience for simulations and tests.
    pub fn healthy() -> Self {
        Self {
            responsiveness: 1.0,
            task_completion_rate: 1.0,
            memory_utilization: 0.3,
            active_connections: 0,
            degree: 0,
            is_bottleneck: false,
        }
    }

    /// Builder: set responsiveness (validated).
    pub fn with_responsiveness(mut self, value: f64) -> Result<Self, ValidationError> {
        self.responsiveness = check_ratio("responsiveness", value)?;
        Ok(self)
    }

    /// Builder: set memory utilization (validated).
    pub fn with_memory_utilization(mut self, value: f64) -> Result<Self, ValidationError> {
        self.memory_utilization = check_ratio("memory_utilization", value)?;
        Ok(self)
    }
}

fn check_ratio(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(ValidationError::RatioOutOfRange { field, value });
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Immutable picture of the fleet at one instant.
///
/// Construction normalizes the raw registry output: edges touching unknown
/// nodes are dropped, self-loops are dropped, parallel links between the
/// same pair are merged by summing their weights (equivalent for every cut
/// computation), and each node's `degree` is written into its health entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    /// When the observation was taken.
    pub timestamp: DateTime<Utc>,
    /// Informational topology label from the registry.
    pub topology_type: TopologyType,
    nodes: BTreeSet<NodeId>,
    edges: Vec<TopologyEdge>,
    health: BTreeMap<NodeId, NodeHealthMetrics>,
}

impl TopologySnapshot {
    /// Build a snapshot from raw registry output.
    pub fn new(
        timestamp: DateTime<Utc>,
        topology_type: TopologyType,
        nodes: impl IntoIterator<Item = NodeId>,
        edges: impl IntoIterator<Item = TopologyEdge>,
        mut health: BTreeMap<NodeId, NodeHealthMetrics>,
    ) -> Self {
        let nodes: BTreeSet<NodeId> = nodes.into_iter().collect();

        // Merge parallel links, drop self-loops and edges into the void.
        let mut merged: BTreeMap<(NodeId, NodeId), f64> = BTreeMap::new();
        for edge in edges {
            if edge.a == edge.b {
                log::debug!("dropping self-loop on {}", edge.a);
                continue;
            }
            if !nodes.contains(&edge.a) || !nodes.contains(&edge.b) {
                log::debug!("dropping edge {}–{} with unknown endpoint", edge.a, edge.b);
                continue;
            }
            *merged.entry((edge.a, edge.b)).or_insert(0.0) += edge.weight;
        }
        let edges: Vec<TopologyEdge> = merged
            .into_iter()
            .map(|((a, b), weight)| TopologyEdge { a, b, weight })
            .collect();

        // Health entries for nodes the registry listed but never probed
        // default to unresponsive; entries for unknown nodes are dropped.
        health.retain(|id, _| nodes.contains(id));
        for node in &nodes {
            health
                .entry(node.clone())
                .or_insert_with(NodeHealthMetrics::unresponsive);
        }

        let mut snapshot = Self {
            timestamp,
            topology_type,
            nodes,
            edges,
            health,
        };
        for node in snapshot.nodes.clone() {
            let degree = snapshot.degree(&node) as u32;
            if let Some(h) = snapshot.health.get_mut(&node) {
                h.degree = degree;
            }
        }
        snapshot
    }

    /// The node set.
    pub fn nodes(&self) -> &BTreeSet<NodeId> {
        &self.nodes
    }

    /// The normalized edge list.
    pub fn edges(&self) -> &[TopologyEdge] {
        &self.edges
    }

    /// Health for all nodes, keyed by id.
    pub fn health(&self) -> &BTreeMap<NodeId, NodeHealthMetrics> {
        &self.health
    }

    /// Health for one node.
    pub fn node_health(&self, node: &NodeId) -> Option<&NodeHealthMetrics> {
        self.health.get(node)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of (merged) edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether `node` is part of this snapshot.
    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.contains(node)
    }

    /// Degree of `node` in the observed topology.
    pub fn degree(&self, node: &NodeId) -> usize {
        self.edges.iter().filter(|e| e.touches(node)).count()
    }

    /// Neighbors of `node`, sorted.
    pub fn neighbors(&self, node: &NodeId) -> Vec<&NodeId> {
        let mut out: Vec<&NodeId> = self
            .edges
            .iter()
            .filter_map(|e| e.other(node))
            .collect();
        out.sort();
        out
    }

    /// Adjacency with weights, for the analyzer.
    pub fn adjacency(&self) -> BTreeMap<&NodeId, Vec<(&NodeId, f64)>> {
        let mut adj: BTreeMap<&NodeId, Vec<(&NodeId, f64)>> =
            self.nodes.iter().map(|n| (n, Vec::new())).collect();
        for edge in &self.edges {
            if let Some(v) = adj.get_mut(&edge.a) {
                v.push((&edge.b, edge.weight));
            }
            if let Some(v) = adj.get_mut(&edge.b) {
                v.push((&edge.a, edge.weight));
            }
        }
        adj
    }

    /// Mean responsiveness across all nodes, `None` for an empty fleet.
    pub fn mean_responsiveness(&self) -> Option<f64> {
        if self.health.is_empty() {
            return None;
        }
        let sum: f64 = self.health.values().map(|h| h.responsiveness).sum();
        Some(sum / self.health.len() as f64)
    }
}
