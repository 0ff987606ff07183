//! Error taxonomy for the warden core.
//!
//! Only [`ConfigError`] is fatal: everything else is contained at the
//! boundary it crosses. An [`ObservationError`] fails one cycle and is
//! retried on the next tick, an [`ExecutionError`] fails one action and is
//! recorded in the audit log, and a [`ValidationError`] rejects one input.

use thiserror::Error;

/// Construction-time configuration errors.
///
/// These are the only errors in the crate that abort anything: a warden
/// with an invalid configuration is never built.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The control-loop interval is below the supported minimum.
    #[error("loop interval must be at least {min}ms, got {got}ms")]
    IntervalTooShort { min: u64, got: u64 },

    /// A criticality or pressure threshold left the open unit interval.
    #[error("threshold `{name}` must be within (0, 1), got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    /// The add-connection band must sit strictly below the spawn band.
    #[error("connect threshold {connect} must be below spawn threshold {spawn}")]
    ThresholdOrder { connect: f64, spawn: f64 },

    /// The observation ring buffer cannot hold zero entries.
    #[error("history capacity must be non-zero")]
    ZeroHistoryCapacity,

    /// Trend extrapolation needs at least two points to draw a line.
    #[error("prediction window must span at least 2 observations, got {0}")]
    PredictionWindowTooSmall(usize),
}

/// The fleet registry could not be observed this cycle.
///
/// Never fatal: the warden logs it, counts the cycle as failed, and
/// observes again on the next tick.
#[derive(Debug, Error)]
pub enum ObservationError {
    /// The registry rejected or failed the topology listing.
    #[error("fleet registry unreachable: {0}")]
    RegistryUnreachable(String),

    /// The topology listing did not answer within the configured bound.
    #[error("topology listing timed out after {0}ms")]
    Timeout(u64),
}

/// Malformed input or a violated safety invariant.
///
/// Rejected at the point of construction; nothing downstream ever sees a
/// silently-corrected value.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A ratio metric fell outside the closed unit interval.
    #[error("{field} must be within [0, 1], got {value}")]
    RatioOutOfRange { field: &'static str, value: f64 },

    /// A metric was NaN or infinite.
    #[error("{field} must be finite")]
    NotFinite { field: &'static str },

    /// An edge carried a negative or non-finite weight.
    #[error("edge weight must be non-negative and finite, got {0}")]
    BadEdgeWeight(f64),
}

/// A registry call failed.
///
/// Surfaced to the observer, which converts listing failures into
/// [`ObservationError`] and per-node health failures into an
/// unresponsive-health sentinel.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry backend is down or refusing connections.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// Health was requested for a node the registry does not know.
    #[error("unknown node: {0}")]
    UnknownNode(String),
}

/// A lifecycle backend call failed.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The operation referenced a node the backend does not know.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// The backend attempted the operation and it failed.
    #[error("lifecycle operation failed: {0}")]
    Failed(String),
}

/// One corrective action could not be carried out.
///
/// Scoped to that single action: the executor records the failure in the
/// audit log and moves on to the next action.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The action variant needs a target node and none was supplied.
    #[error("action `{action}` requires a target node")]
    MissingTarget { action: String },

    /// The action variant needs a peer node and none was supplied.
    #[error("action `{action}` requires a peer node")]
    MissingPeer { action: String },

    /// The lifecycle backend reported a failure.
    #[error("lifecycle call failed: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// The lifecycle call did not answer within the configured bound.
    #[error("action timed out after {0}ms")]
    Timeout(u64),
}

/// The persistence collaborator could not append a cycle record.
///
/// Logged and dropped; audit continuity is the collaborator's problem to
/// restore, not a reason to stop the control loop.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The backing store is unavailable.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}
