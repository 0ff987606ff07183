//! Warden configuration.
//!
//! All tunables for the control loop live here, with serde defaults so a
//! partial JSON/YAML document deserializes into a runnable configuration.
//! [`WardenConfig::validate`] runs at warden construction and is the only
//! place in the crate where an error is fatal.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::healing::ActionPriority;

/// Smallest loop interval the warden accepts.
///
/// Below this the observe/analyze/act pipeline starts overlapping its own
/// I/O budget on realistic fleets.
pub const MIN_LOOP_INTERVAL_MS: u64 = 1000;

/// Configuration for a [`Warden`](crate::warden::Warden) instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Control-loop tick interval in milliseconds (minimum 1000).
    #[serde(default = "default_loop_interval_ms")]
    pub loop_interval_ms: u64,

    /// Criticality above which a bottleneck warrants spawning redundancy.
    #[serde(default = "default_spawn_threshold")]
    pub spawn_criticality_threshold: f64,

    /// Criticality above which a bottleneck warrants a bypass connection.
    #[serde(default = "default_connect_threshold")]
    pub connect_criticality_threshold: f64,

    /// Observations required before trend prediction produces anything.
    #[serde(default = "default_prediction_min_history")]
    pub prediction_min_history: usize,

    /// Priorities that are executed automatically each cycle. Anything
    /// below this set is recorded in the cycle record but left for an
    /// operator to approve.
    #[serde(default = "default_auto_execute")]
    pub auto_execute_priorities: BTreeSet<ActionPriority>,

    /// Upper bound on each registry call during observation, per call.
    #[serde(default = "default_observe_timeout_ms")]
    pub observe_timeout_ms: u64,

    /// Upper bound on each lifecycle call during action execution.
    #[serde(default = "default_action_timeout_ms")]
    pub action_timeout_ms: u64,

    /// Capacity of the observation ring buffer.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Per-observation decline rate beyond which a trend counts as
    /// degradation (in metric units per observation).
    #[serde(default = "default_prediction_rate_threshold")]
    pub prediction_rate_threshold: f64,

    /// Multiplier mapping a decline rate onto a probability estimate.
    #[serde(default = "default_prediction_probability_scale")]
    pub prediction_probability_scale: f64,

    /// Predicted probability above which the decision engine acts.
    #[serde(default = "default_prediction_probability_floor")]
    pub prediction_probability_floor: f64,

    /// Memory utilization above which load is redistributed off a node.
    #[serde(default = "default_memory_pressure_threshold")]
    pub memory_pressure_threshold: f64,

    /// Responsiveness below which a node is restarted outright, trend or
    /// no trend.
    #[serde(default = "default_responsiveness_restart_threshold")]
    pub responsiveness_restart_threshold: f64,
}

fn default_loop_interval_ms() -> u64 { 5000 }
fn default_spawn_threshold() -> f64 { 0.8 }
fn default_connect_threshold() -> f64 { 0.5 }
fn default_prediction_min_history() -> usize { 3 }
fn default_observe_timeout_ms() -> u64 { 2000 }
fn default_action_timeout_ms() -> u64 { 10_000 }
fn default_history_capacity() -> usize { 60 }
fn default_prediction_rate_threshold() -> f64 { 0.1 }
fn default_prediction_probability_scale() -> f64 { 2.0 }
fn default_prediction_probability_floor() -> f64 { 0.7 }
fn default_memory_pressure_threshold() -> f64 { 0.9 }
fn default_responsiveness_restart_threshold() -> f64 { 0.5 }

fn default_auto_execute() -> BTreeSet<ActionPriority> {
    [ActionPriority::Critical, ActionPriority::High]
        .into_iter()
        .collect()
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            loop_interval_ms: default_loop_interval_ms(),
            spawn_criticality_threshold: default_spawn_threshold(),
            connect_criticality_threshold: default_connect_threshold(),
            prediction_min_history: default_prediction_min_history(),
            auto_execute_priorities: default_auto_execute(),
            observe_timeout_ms: default_observe_timeout_ms(),
            action_timeout_ms: default_action_timeout_ms(),
            history_capacity: default_history_capacity(),
            prediction_rate_threshold: default_prediction_rate_threshold(),
            prediction_probability_scale: default_prediction_probability_scale(),
            prediction_probability_floor: default_prediction_probability_floor(),
            memory_pressure_threshold: default_memory_pressure_threshold(),
            responsiveness_restart_threshold: default_responsiveness_restart_threshold(),
        }
    }
}

impl WardenConfig {
    /// Validate the configuration.
    ///
    /// Called by the warden constructor; an `Err` here means no warden is
    /// built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.loop_interval_ms < MIN_LOOP_INTERVAL_MS {
            return Err(ConfigError::IntervalTooShort {
                min: MIN_LOOP_INTERVAL_MS,
                got: self.loop_interval_ms,
            });
        }

        for (name, value) in [
            ("spawn_criticality_threshold", self.spawn_criticality_threshold),
            ("connect_criticality_threshold", self.connect_criticality_threshold),
            ("prediction_probability_floor", self.prediction_probability_floor),
            ("memory_pressure_threshold", self.memory_pressure_threshold),
            (
                "responsiveness_restart_threshold",
                self.responsiveness_restart_threshold,
            ),
        ] {
            if !value.is_finite() || value <= 0.0 || value >= 1.0 {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        if self.connect_criticality_threshold >= self.spawn_criticality_threshold {
            return Err(ConfigError::ThresholdOrder {
                connect: self.connect_criticality_threshold,
                spawn: self.spawn_criticality_threshold,
            });
        }

        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }

        if self.prediction_min_history < 2 {
            return Err(ConfigError::PredictionWindowTooSmall(
                self.prediction_min_history,
            ));
        }

        Ok(())
    }

    /// Tick interval as a [`Duration`].
    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }

    /// Per-call observation timeout as a [`Duration`].
    pub fn observe_timeout(&self) -> Duration {
        Duration::from_millis(self.observe_timeout_ms)
    }

    /// Per-call action timeout as a [`Duration`].
    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    /// Whether an action of the given priority is auto-executed.
    pub fn auto_executes(&self, priority: ActionPriority) -> bool {
        self.auto_execute_priorities.contains(&priority)
    }
}
