//! The warden's self-model — the Model stage of the control loop.
//!
//! Retains a bounded window of observations, reports cycle-over-cycle
//! deltas, and runs the configured predictor over the window. Single
//! writer: only the owning warden cycle calls [`SelfModel::update`];
//! anything outside reads cloned views.

use serde::{Deserialize, Serialize};

use crate::analysis::connectivity::ConnectivityAnalyzer;
use crate::analysis::metrics::{BottleneckInfo, ConnectivityMetrics};
use crate::fleet::types::TopologySnapshot;
use crate::model::history::{ObservationEntry, ObservationHistory};
use crate::model::predictor::{PredictedVulnerability, Predictor};

/// Cycle-over-cycle movement of the tracked metrics. All fields are
/// `None` on the first observation — there is nothing to diff against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationDelta {
    /// Change in global min-cut.
    pub min_cut_delta: Option<f64>,
    /// Change in component count.
    pub components_delta: Option<i64>,
    /// Change in fleet size.
    pub node_count_delta: Option<i64>,
    /// Change in fleet-wide mean responsiveness.
    pub avg_responsiveness_delta: Option<f64>,
}

/// Bounded memory plus trend extrapolation over it.
pub struct SelfModel {
    history: ObservationHistory,
    predictor: Box<dyn Predictor>,
}

impl SelfModel {
    /// Model retaining `capacity` observations and predicting with the
    /// given strategy.
    pub fn new(capacity: usize, predictor: Box<dyn Predictor>) -> Self {
        Self {
            history: ObservationHistory::new(capacity),
            predictor,
        }
    }

    /// Fold one observation into the model and report the delta against
    /// the previous one.
    pub fn update(
        &mut self,
        snapshot: TopologySnapshot,
        metrics: ConnectivityMetrics,
    ) -> ObservationDelta {
        let delta = match self.history.latest() {
            Some(prev) => ObservationDelta {
                min_cut_delta: match (prev.metrics.min_cut, metrics.min_cut) {
                    (Some(a), Some(b)) => Some(b - a),
                    _ => None,
                },
                components_delta: Some(
                    metrics.components as i64 - prev.metrics.components as i64,
                ),
                node_count_delta: Some(
                    snapshot.node_count() as i64 - prev.snapshot.node_count() as i64,
                ),
                avg_responsiveness_delta: match (
                    prev.snapshot.mean_responsiveness(),
                    snapshot.mean_responsiveness(),
                ) {
                    (Some(a), Some(b)) => Some(b - a),
                    _ => None,
                },
            },
            None => ObservationDelta::default(),
        };

        self.history.push(ObservationEntry { snapshot, metrics });
        delta
    }

    /// Bottlenecks in the latest observation, with mitigation hints from
    /// the fixed band table. Empty before the first observation.
    pub fn find_bottlenecks(&self, analyzer: &ConnectivityAnalyzer) -> Vec<BottleneckInfo> {
        match self.history.latest() {
            Some(entry) => analyzer.find_bottlenecks(&entry.snapshot),
            None => Vec::new(),
        }
    }

    /// Run the predictor over the retained window.
    pub fn predict(&self) -> Vec<PredictedVulnerability> {
        self.predictor.predict(&self.history)
    }

    /// The most recent retained observation.
    pub fn latest(&self) -> Option<&ObservationEntry> {
        self.history.latest()
    }

    /// Read access to the window.
    pub fn history(&self) -> &ObservationHistory {
        &self.history
    }
}
