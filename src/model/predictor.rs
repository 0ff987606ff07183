//! Trend-based vulnerability prediction.
//!
//! Deliberately a heuristic, not a statistical model: fit a least-squares
//! line through each tracked series, and if it is falling fast enough,
//! report a vulnerability with a probability proportional to the decline
//! rate and a time-to-threshold from linear extrapolation. The contract —
//! probability plus time-to-threshold — lives in the [`Predictor`] trait
//! so a rigorous model can replace the arithmetic without touching the
//! decision engine.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::config::WardenConfig;
use crate::fleet::types::NodeId;
use crate::healing::action::HealingActionType;
use crate::model::history::ObservationHistory;

// ---------------------------------------------------------------------------
// Prediction types
// ---------------------------------------------------------------------------

/// What kind of degradation is coming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnerabilityKind {
    /// The fleet's global min-cut is trending toward partition.
    ConnectivityDegradation,
    /// One node's responsiveness is trending toward unusable.
    AgentDegradation,
}

/// One predicted vulnerability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedVulnerability {
    /// What is degrading.
    pub kind: VulnerabilityKind,
    /// The degrading node, for per-node kinds.
    pub node_id: Option<NodeId>,
    /// Estimated probability, capped at 0.95 — extrapolation never gets
    /// to claim certainty.
    pub probability: f64,
    /// Extrapolated time until the danger threshold is crossed, in
    /// milliseconds of wall time.
    pub time_to_occurrence_ms: i64,
    /// The intervention the fixed lookup suggests for this kind.
    pub suggested_action: HealingActionType,
}

impl PredictedVulnerability {
    /// Time to occurrence as a [`TimeDelta`].
    pub fn time_to_occurrence(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.time_to_occurrence_ms)
    }
}

// ---------------------------------------------------------------------------
// Predictor trait
// ---------------------------------------------------------------------------

/// Extracts predicted vulnerabilities from the observation history.
pub trait Predictor: Send + Sync {
    /// Predict from the retained window. Implementations return an empty
    /// vector rather than an error when history is too short.
    fn predict(&self, history: &ObservationHistory) -> Vec<PredictedVulnerability>;
}

// ---------------------------------------------------------------------------
// Linear trend predictor
// ---------------------------------------------------------------------------

/// The default heuristic: least-squares slope per series, thresholded.
///
/// Tracked series: the global min-cut (danger threshold 1.0 — one more
/// lost link partitions the fleet) and each node's responsiveness (danger
/// threshold 0.5 — below that the node misses more probes than it
/// answers).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearTrendPredictor {
    /// Observations required before predicting anything.
    pub min_history: usize,
    /// Decline per observation beyond which a trend counts as degradation.
    pub rate_threshold: f64,
    /// Multiplier mapping decline rate onto probability.
    pub probability_scale: f64,
    /// Min-cut level treated as imminent partition.
    pub min_cut_floor: f64,
    /// Responsiveness level treated as effectively down.
    pub responsiveness_floor: f64,
}

impl LinearTrendPredictor {
    /// Probability is capped here; extrapolation is never certainty.
    pub const MAX_PROBABILITY: f64 = 0.95;

    /// Build from the warden configuration.
    pub fn from_config(config: &WardenConfig) -> Self {
        Self {
            min_history: config.prediction_min_history,
            rate_threshold: config.prediction_rate_threshold,
            probability_scale: config.prediction_probability_scale,
            min_cut_floor: 1.0,
            responsiveness_floor: 0.5,
        }
    }

    /// Probability for a decline rate (per observation).
    fn probability(&self, rate: f64) -> f64 {
        (rate * self.probability_scale).clamp(0.0, Self::MAX_PROBABILITY)
    }

    /// Wall time until `current` declines to `floor` at `rate` per
    /// observation, given the observed spacing between observations.
    fn time_to_floor(&self, current: f64, floor: f64, rate: f64, spacing: TimeDelta) -> i64 {
        if rate <= 0.0 {
            return i64::MAX;
        }
        let observations = ((current - floor) / rate).max(0.0);
        let ms = spacing.num_milliseconds() as f64 * observations;
        ms.min(i64::MAX as f64 / 2.0) as i64
    }
}

impl Default for LinearTrendPredictor {
    fn default() -> Self {
        Self::from_config(&WardenConfig::default())
    }
}

impl Predictor for LinearTrendPredictor {
    fn predict(&self, history: &ObservationHistory) -> Vec<PredictedVulnerability> {
        if history.len() < self.min_history {
            log::debug!(
                "prediction skipped: {} of {} required observations",
                history.len(),
                self.min_history
            );
            return Vec::new();
        }
        let spacing = match history.mean_spacing() {
            Some(spacing) => spacing,
            None => return Vec::new(),
        };

        let mut predictions = Vec::new();

        // Global connectivity trend.
        let min_cuts = history.min_cut_series();
        if min_cuts.len() >= self.min_history {
            let slope = least_squares_slope(&min_cuts);
            if slope <= -self.rate_threshold {
                let rate = -slope;
                if let Some(&current) = min_cuts.last() {
                    predictions.push(PredictedVulnerability {
                        kind: VulnerabilityKind::ConnectivityDegradation,
                        node_id: None,
                        probability: self.probability(rate),
                        time_to_occurrence_ms: self.time_to_floor(
                            current,
                            self.min_cut_floor,
                            rate,
                            spacing,
                        ),
                        suggested_action: HealingActionType::AddConnection,
                    });
                }
            }
        }

        // Per-node responsiveness trends. Only nodes present across the
        // whole window have a comparable series; the latest snapshot's
        // node set bounds the candidates.
        if let Some(latest) = history.latest() {
            for node in latest.snapshot.nodes() {
                let series = match history.responsiveness_series(node) {
                    Some(series) => series,
                    None => continue,
                };
                let slope = least_squares_slope(&series);
                if slope <= -self.rate_threshold {
                    let rate = -slope;
                    if let Some(&current) = series.last() {
                        predictions.push(PredictedVulnerability {
                            kind: VulnerabilityKind::AgentDegradation,
                            node_id: Some(node.clone()),
                            probability: self.probability(rate),
                            time_to_occurrence_ms: self.time_to_floor(
                                current,
                                self.responsiveness_floor,
                                rate,
                                spacing,
                            ),
                            suggested_action: HealingActionType::RestartAgent,
                        });
                    }
                }
            }
        }

        predictions
    }
}

/// Least-squares slope of `values` against their indices.
fn least_squares_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let n_f = n as f64;
    let mean_x = (n_f - 1.0) / 2.0;
    let mean_y: f64 = values.iter().sum::<f64>() / n_f;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, Utc};

    use crate::analysis::metrics::ConnectivityMetrics;
    use crate::fleet::types::{NodeHealthMetrics, TopologySnapshot, TopologyType};
    use crate::model::history::ObservationEntry;

    fn entry(offset_secs: i64, min_cut: f64, responsiveness: f64) -> ObservationEntry {
        let mut health = std::collections::BTreeMap::new();
        let metrics = NodeHealthMetrics::healthy()
            .with_responsiveness(responsiveness)
            .unwrap();
        health.insert(NodeId::from("n1"), metrics);
        let snapshot = TopologySnapshot::new(
            Utc::now() + Duration::seconds(offset_secs),
            TopologyType::Hybrid,
            [NodeId::from("n1")],
            Vec::new(),
            health,
        );
        let mut m = ConnectivityMetrics::undefined(1);
        m.min_cut = Some(min_cut);
        ObservationEntry {
            snapshot,
            metrics: m,
        }
    }

    fn history_of(entries: Vec<ObservationEntry>) -> ObservationHistory {
        let mut history = ObservationHistory::new(10);
        for e in entries {
            history.push(e);
        }
        history
    }

    #[test]
    fn test_slope_of_linear_series() {
        assert_relative_eq!(least_squares_slope(&[5.0, 4.0, 3.0]), -1.0);
        assert_relative_eq!(least_squares_slope(&[1.0, 1.0, 1.0]), 0.0);
        assert_relative_eq!(least_squares_slope(&[0.0, 2.0, 4.0]), 2.0);
    }

    #[test]
    fn test_too_little_history_predicts_nothing() {
        let predictor = LinearTrendPredictor::default();
        for len in 0..3 {
            let entries = (0..len).map(|i| entry(i * 10, 5.0, 1.0)).collect();
            assert!(
                predictor.predict(&history_of(entries)).is_empty(),
                "history of {} must predict nothing",
                len
            );
        }
    }

    #[test]
    fn test_declining_min_cut_yields_connectivity_prediction() {
        let predictor = LinearTrendPredictor::default();
        let history = history_of(vec![
            entry(0, 5.0, 1.0),
            entry(10, 4.0, 1.0),
            entry(20, 3.0, 1.0),
        ]);
        let predictions = predictor.predict(&history);
        let conn: Vec<_> = predictions
            .iter()
            .filter(|p| p.kind == VulnerabilityKind::ConnectivityDegradation)
            .collect();
        assert_eq!(conn.len(), 1);
        assert!(conn[0].probability > 0.0 && conn[0].probability <= 0.95);
        assert_eq!(conn[0].suggested_action, HealingActionType::AddConnection);
        // Falling 1.0/observation from 3.0 toward 1.0 at 10s spacing.
        assert_eq!(conn[0].time_to_occurrence_ms, 20_000);
    }

    #[test]
    fn test_stable_series_predicts_nothing() {
        let predictor = LinearTrendPredictor::default();
        let history = history_of(vec![
            entry(0, 4.0, 1.0),
            entry(10, 4.0, 1.0),
            entry(20, 4.0, 1.0),
        ]);
        assert!(predictor.predict(&history).is_empty());
    }

    #[test]
    fn test_probability_is_capped() {
        let predictor = LinearTrendPredictor::default();
        let history = history_of(vec![
            entry(0, 100.0, 1.0),
            entry(10, 50.0, 1.0),
            entry(20, 0.0, 1.0),
        ]);
        let predictions = predictor.predict(&history);
        assert!(!predictions.is_empty());
        for p in predictions {
            assert!(p.probability <= 0.95);
        }
    }

    #[test]
    fn test_degrading_node_yields_agent_prediction() {
        let predictor = LinearTrendPredictor::default();
        let history = history_of(vec![
            entry(0, 4.0, 0.9),
            entry(10, 4.0, 0.6),
            entry(20, 4.0, 0.3),
        ]);
        let predictions = predictor.predict(&history);
        let agent: Vec<_> = predictions
            .iter()
            .filter(|p| p.kind == VulnerabilityKind::AgentDegradation)
            .collect();
        assert_eq!(agent.len(), 1);
        assert_eq!(agent[0].node_id, Some(NodeId::from("n1")));
        assert_eq!(agent[0].suggested_action, HealingActionType::RestartAgent);
        // Already below the 0.5 floor: occurrence is imminent.
        assert_eq!(agent[0].time_to_occurrence_ms, 0);
    }

    #[test]
    fn test_gentle_decline_below_rate_threshold_is_ignored() {
        let predictor = LinearTrendPredictor::default();
        let history = history_of(vec![
            entry(0, 4.00, 1.0),
            entry(10, 3.98, 1.0),
            entry(20, 3.96, 1.0),
        ]);
        assert!(predictor.predict(&history).is_empty());
    }
}
