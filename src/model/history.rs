//! Bounded observation history.
//!
//! The self-model's memory: a ring of `(snapshot, metrics)` pairs ordered
//! by cycle. Capacity-bounded so a long-running warden never grows without
//! limit; trend extraction reads series out of the window.

use std::collections::VecDeque;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::analysis::metrics::ConnectivityMetrics;
use crate::fleet::types::{NodeId, TopologySnapshot};

/// One retained observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationEntry {
    /// The snapshot taken that cycle.
    pub snapshot: TopologySnapshot,
    /// The metrics derived from it.
    pub metrics: ConnectivityMetrics,
}

/// Ring buffer of observations, oldest evicted first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationHistory {
    entries: VecDeque<ObservationEntry>,
    capacity: usize,
}

impl ObservationHistory {
    /// History holding at most `capacity` entries. Capacity is validated
    /// upstream by the configuration; a zero here is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Append an observation, evicting the oldest if full.
    pub fn push(&mut self, entry: ObservationEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Number of retained observations.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether anything has been observed yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent observation.
    pub fn latest(&self) -> Option<&ObservationEntry> {
        self.entries.back()
    }

    /// Observation before the most recent one.
    pub fn previous(&self) -> Option<&ObservationEntry> {
        let len = self.entries.len();
        if len < 2 {
            None
        } else {
            self.entries.get(len - 2)
        }
    }

    /// Iterate oldest → newest.
    pub fn iter(&self) -> impl Iterator<Item = &ObservationEntry> {
        self.entries.iter()
    }

    /// The global min-cut series, oldest → newest. Entries whose min-cut
    /// is undefined (degenerate fleets) are skipped.
    pub fn min_cut_series(&self) -> Vec<f64> {
        self.entries
            .iter()
            .filter_map(|e| e.metrics.min_cut)
            .collect()
    }

    /// One node's responsiveness series, oldest → newest. `None` unless
    /// the node appears in every retained observation — a partial series
    /// would make trends incomparable across nodes.
    pub fn responsiveness_series(&self, node: &NodeId) -> Option<Vec<f64>> {
        let mut series = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            series.push(entry.snapshot.node_health(node)?.responsiveness);
        }
        Some(series)
    }

    /// Mean spacing between consecutive observations, for converting
    /// per-observation rates into wall time. `None` with fewer than two
    /// entries.
    pub fn mean_spacing(&self) -> Option<TimeDelta> {
        if self.entries.len() < 2 {
            return None;
        }
        let first = self.entries.front()?.snapshot.timestamp;
        let last = self.entries.back()?.snapshot.timestamp;
        let span = last - first;
        if span <= TimeDelta::zero() {
            return None;
        }
        Some(span / (self.entries.len() as i32 - 1))
    }
}
