//! Structural-resilience analysis of fleet topologies.
//!
//! The analyzer is a pure function from a snapshot to metrics:
//!
//! ```text
//! TopologySnapshot ──► ConnectivityAnalyzer ──► ConnectivityMetrics
//!                        │ global min-cut (Stoer–Wagner)
//!                        │ component census
//!                        │ bottleneck scan + criticality scoring
//!                        │ clustering coefficient
//!                        └ average path length
//! ```

pub mod connectivity;
pub mod metrics;
pub mod mincut;
pub mod scoring;

pub use connectivity::{component_groups, eccentric_pair, ConnectivityAnalyzer};
pub use metrics::{recommendation_for, BottleneckInfo, ConnectivityMetrics};
pub use scoring::{CriticalityInput, CriticalityScorer, WeightedCriticalityScorer};
