//! Self-model: bounded memory, deltas, and trend prediction.

pub mod history;
pub mod predictor;
pub mod self_model;

pub use history::{ObservationEntry, ObservationHistory};
pub use predictor::{
    LinearTrendPredictor, PredictedVulnerability, Predictor, VulnerabilityKind,
};
pub use self_model::{ObservationDelta, SelfModel};
