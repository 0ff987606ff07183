//! Structural-resilience metrics derived from a snapshot.

use serde::{Deserialize, Serialize};

use crate::fleet::types::NodeId;

/// Connectivity picture of one snapshot.
///
/// Recomputed from scratch every cycle and never mutated in place. `None`
/// marks a metric that is undefined for the input — a graph with fewer
/// than two nodes has no cut, a graph with no reachable pair has no mean
/// path length — so degenerate fleets never surface as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityMetrics {
    /// Total weight of the global minimum cut. `Some(0.0)` means the
    /// fleet is already partitioned; `None` means fewer than two nodes.
    pub min_cut: Option<f64>,
    /// Number of connected components (0 only for the empty graph).
    pub components: usize,
    /// Bottleneck nodes, most critical first.
    pub bottlenecks: Vec<BottleneckInfo>,
    /// Mean shortest-path hop count over reachable ordered pairs.
    pub avg_path_length: Option<f64>,
    /// Mean local clustering over nodes of degree ≥ 2.
    pub clustering_coefficient: Option<f64>,
}

impl ConnectivityMetrics {
    /// Metrics for a graph too small to have any.
    pub fn undefined(components: usize) -> Self {
        Self {
            min_cut: None,
            components,
            bottlenecks: Vec::new(),
            avg_path_length: None,
            clustering_coefficient: None,
        }
    }

    /// Whether the snapshot held a connected, non-degenerate fleet.
    pub fn is_connected(&self) -> bool {
        self.components == 1
    }
}

/// One node whose removal would split the fleet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleneckInfo {
    /// The articulation node.
    pub node_id: NodeId,
    /// Heuristic severity in `[0, 1]`.
    pub criticality: f64,
    /// Nodes that would be cut off from the largest surviving component.
    pub affected_node_count: usize,
    /// Operator-facing mitigation hint from the fixed band table.
    pub recommendation: String,
}

/// Fixed rule table mapping a criticality band to a mitigation hint.
pub fn recommendation_for(criticality: f64) -> String {
    if criticality > 0.8 {
        "spawn a redundant agent mirroring this node".to_string()
    } else if criticality > 0.5 {
        "add a bypass connection around this node".to_string()
    } else {
        "monitor; no structural action needed yet".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_metrics_have_no_values() {
        let metrics = ConnectivityMetrics::undefined(1);
        assert!(metrics.min_cut.is_none());
        assert!(metrics.avg_path_length.is_none());
        assert!(metrics.clustering_coefficient.is_none());
        assert!(metrics.bottlenecks.is_empty());
    }

    #[test]
    fn test_recommendation_bands() {
        assert!(recommendation_for(0.9).contains("redundant"));
        assert!(recommendation_for(0.6).contains("bypass"));
        assert!(recommendation_for(0.3).contains("monitor"));
    }
}
