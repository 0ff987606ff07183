//! Criticality scoring strategy.
//!
//! How severe a bottleneck is depends on structure (how much of the fleet
//! it cuts off), connectivity share (its degree), and observed load. The
//! exact blend is a judgment call, so it lives behind a strategy trait
//! with a documented default instead of being baked into the analyzer.

use serde::{Deserialize, Serialize};

/// Inputs to a criticality score, all normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalityInput {
    /// Fraction of the remaining fleet cut off if the node disappears.
    pub affected_fraction: f64,
    /// Node degree over the maximum possible degree.
    pub degree_fraction: f64,
    /// The node's memory utilization.
    pub load: f64,
}

/// Strategy for scoring how critical a bottleneck node is.
pub trait CriticalityScorer: Send + Sync {
    /// Score in `[0, 1]`; implementations must clamp.
    fn score(&self, input: &CriticalityInput) -> f64;
}

/// Default scorer: weighted blend of the three inputs, normalized by the
/// weight sum. Structure dominates — a node that strands half the fleet
/// is critical regardless of how idle it is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedCriticalityScorer {
    /// Weight on the stranded-fleet fraction.
    pub affected_weight: f64,
    /// Weight on the degree share.
    pub degree_weight: f64,
    /// Weight on observed load.
    pub load_weight: f64,
}

impl Default for WeightedCriticalityScorer {
    fn default() -> Self {
        Self {
            affected_weight: 0.5,
            degree_weight: 0.3,
            load_weight: 0.2,
        }
    }
}

impl CriticalityScorer for WeightedCriticalityScorer {
    fn score(&self, input: &CriticalityInput) -> f64 {
        let total = self.affected_weight + self.degree_weight + self.load_weight;
        if total <= 0.0 {
            return 0.0;
        }
        let raw = (self.affected_weight * input.affected_fraction
            + self.degree_weight * input.degree_fraction
            + self.load_weight * input.load)
            / total;
        raw.clamp(0.0, 1.0)
    }
}
