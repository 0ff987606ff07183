//! The warden: the control loop that closes Observe → Model → Decide → Act.
//!
//! One warden owns one fleet's controller state — model, histories,
//! counters — and runs cycles strictly sequentially, so observation
//! ordering is total and there is never a second writer. Collaborators
//! (registry, lifecycle, persistence, clock) are injected at construction;
//! there are no ambient singletons to reach for.
//!
//! ```text
//! Idle ──► Observing ──► Modeling ──► Deciding ──► Acting ──► Sleeping ─┐
//!            ▲                                                          │
//!            └──────────────────────────────────────────────────────────┘
//!                              (stop() ──► Stopped)
//! ```
//!
//! Failure containment: a cycle that fails — registry down, persistence
//! refusing writes — is logged and counted, and the loop keeps going.
//! Only an invalid configuration is fatal, and that happens before the
//! loop ever starts.

pub mod clock;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::TimeDelta;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;

use crate::analysis::connectivity::ConnectivityAnalyzer;
use crate::analysis::metrics::ConnectivityMetrics;
use crate::config::WardenConfig;
use crate::errors::{ConfigError, ObservationError, PersistenceError};
use crate::fleet::lifecycle::AgentLifecycle;
use crate::fleet::observer::TopologyObserver;
use crate::fleet::registry::FleetRegistry;
use crate::fleet::types::{NodeId, TopologySnapshot};
use crate::healing::action::ActionRecord;
use crate::healing::decision::DecisionEngine;
use crate::healing::executor::ActionExecutor;
use crate::model::predictor::{LinearTrendPredictor, Predictor};
use crate::model::self_model::SelfModel;
use crate::persistence::{CyclePersistence, CycleRecord, ExecutedAction};
use crate::warden::clock::{Clock, SystemClock};

// ---------------------------------------------------------------------------
// States, stats, views
// ---------------------------------------------------------------------------

/// Where the control loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WardenState {
    /// Constructed, not yet running.
    Idle,
    /// Sampling the fleet registry.
    Observing,
    /// Folding the observation into the self-model.
    Modeling,
    /// Producing this cycle's actions.
    Deciding,
    /// Executing approved actions.
    Acting,
    /// Waiting for the next tick.
    Sleeping,
    /// Stopped by explicit request; terminal.
    Stopped,
}

impl fmt::Display for WardenState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WardenState::Idle => "idle",
            WardenState::Observing => "observing",
            WardenState::Modeling => "modeling",
            WardenState::Deciding => "deciding",
            WardenState::Acting => "acting",
            WardenState::Sleeping => "sleeping",
            WardenState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Liveness counters, observable independently of the fleet's health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardenStats {
    /// Cycles that ran to completion.
    pub cycles_completed: u64,
    /// Cycles aborted by a contained failure.
    pub cycles_failed: u64,
    /// Actions dispatched, successful or not.
    pub actions_executed: u64,
    /// Dispatched actions that failed.
    pub actions_failed: u64,
    /// Current loop state.
    pub state: WardenState,
}

#[derive(Debug, Default, Clone, Copy)]
struct StatsInner {
    cycles_completed: u64,
    cycles_failed: u64,
    actions_executed: u64,
    actions_failed: u64,
}

/// Copy-on-read view of the self-model for external readers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelView {
    /// Latest retained snapshot.
    pub latest_snapshot: Option<TopologySnapshot>,
    /// Metrics derived from it.
    pub latest_metrics: Option<ConnectivityMetrics>,
    /// Observations currently retained.
    pub history_len: usize,
    /// Retention capacity.
    pub history_capacity: usize,
}

/// Answer to "am I the weak point of the fleet I am managing?".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfDiagnosis {
    /// The node that asked.
    pub node: NodeId,
    /// Whether the node appeared in the observation at all.
    pub observed: bool,
    /// Whether its removal would split the fleet.
    pub is_bottleneck: bool,
    /// Its criticality, when it is a bottleneck.
    pub criticality: Option<f64>,
    /// Component count of the observed fleet.
    pub components: usize,
    /// Global min-cut of the observed fleet.
    pub min_cut: Option<f64>,
    /// Targeted mitigation hints.
    pub recommendations: Vec<String>,
}

/// One cycle's failure, contained at the loop boundary.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The fleet could not be observed.
    #[error(transparent)]
    Observation(#[from] ObservationError),
    /// The cycle record could not be persisted.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

// ---------------------------------------------------------------------------
// Warden
// ---------------------------------------------------------------------------

/// The self-healing controller for one fleet.
pub struct Warden {
    config: WardenConfig,
    observer: TopologyObserver,
    analyzer: ConnectivityAnalyzer,
    engine: DecisionEngine,
    executor: Arc<ActionExecutor>,
    model: Arc<RwLock<SelfModel>>,
    persistence: Arc<dyn CyclePersistence>,
    clock: Arc<dyn Clock>,
    state: Arc<RwLock<WardenState>>,
    stats: Arc<RwLock<StatsInner>>,
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    cycle: u64,
}

impl Warden {
    /// Build a warden over the given collaborators, on the system clock.
    ///
    /// Fails if and only if the configuration is invalid.
    pub fn new(
        config: WardenConfig,
        registry: Arc<dyn FleetRegistry>,
        lifecycle: Arc<dyn AgentLifecycle>,
        persistence: Arc<dyn CyclePersistence>,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, registry, lifecycle, persistence, Arc::new(SystemClock))
    }

    /// Build a warden with an injected clock, for simulated time.
    pub fn with_clock(
        config: WardenConfig,
        registry: Arc<dyn FleetRegistry>,
        lifecycle: Arc<dyn AgentLifecycle>,
        persistence: Arc<dyn CyclePersistence>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let observer =
            TopologyObserver::new(registry, Arc::clone(&clock), config.observe_timeout());
        let executor = Arc::new(ActionExecutor::new(
            lifecycle,
            Arc::clone(&clock),
            config.action_timeout(),
        ));
        let model = SelfModel::new(
            config.history_capacity,
            Box::new(LinearTrendPredictor::from_config(&config)),
        );

        Ok(Self {
            engine: DecisionEngine::from_config(&config),
            observer,
            analyzer: ConnectivityAnalyzer::default(),
            executor,
            model: Arc::new(RwLock::new(model)),
            persistence,
            clock,
            state: Arc::new(RwLock::new(WardenState::Idle)),
            stats: Arc::new(RwLock::new(StatsInner::default())),
            stop: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            cycle: 0,
            config,
        })
    }

    /// Builder: replace the connectivity analyzer (custom criticality
    /// scoring).
    pub fn with_analyzer(mut self, analyzer: ConnectivityAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Builder: replace the predictor. Intended before the first cycle;
    /// the retained history is reset.
    pub fn with_predictor(self, predictor: Box<dyn Predictor>) -> Self {
        *self.model.write() = SelfModel::new(self.config.history_capacity, predictor);
        self
    }

    /// Handle for stopping and observing the warden from outside the
    /// loop task.
    pub fn handle(&self) -> WardenHandle {
        WardenHandle {
            stop: Arc::clone(&self.stop),
            wake: Arc::clone(&self.wake),
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
            model: Arc::clone(&self.model),
            executor: Arc::clone(&self.executor),
        }
    }

    /// Run the control loop until stopped.
    pub async fn run(&mut self) {
        log::info!(
            "warden starting: interval {}ms, history capacity {}",
            self.config.loop_interval_ms,
            self.config.history_capacity
        );

        loop {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            match self.tick().await {
                Ok(()) => {
                    self.stats.write().cycles_completed += 1;
                }
                Err(error) => {
                    // Contained: a bad cycle never stops the controller.
                    log::warn!("cycle {} failed: {}", self.cycle, error);
                    self.stats.write().cycles_failed += 1;
                }
            }

            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            self.set_state(WardenState::Sleeping);
            let sleep = self.clock.sleep(self.config.loop_interval());
            tokio::select! {
                _ = sleep => {}
                _ = self.wake.notified() => {}
            }
        }

        self.set_state(WardenState::Stopped);
        let stats = self.stats();
        log::info!(
            "warden stopped: {} cycles completed, {} failed, {} actions executed",
            stats.cycles_completed,
            stats.cycles_failed,
            stats.actions_executed
        );
    }

    /// Run exactly one Observe → Model → Decide → Act → persist cycle.
    ///
    /// Public so tests and embedders can drive cycles without the timer.
    pub async fn tick(&mut self) -> Result<(), CycleError> {
        self.set_state(WardenState::Observing);
        let snapshot = self.observer.observe().await?;
        // Actions from the previous cycle get this observation as their
        // verification reference.
        self.executor.link_post_snapshots(snapshot.timestamp);
        let observation = snapshot.clone();

        self.set_state(WardenState::Modeling);
        let metrics = self.analyzer.analyze(&snapshot);
        log::debug!(
            "cycle {}: {} nodes, components={}, min_cut={:?}, {} bottlenecks",
            self.cycle,
            snapshot.node_count(),
            metrics.components,
            metrics.min_cut,
            metrics.bottlenecks.len()
        );
        let (delta, predictions, actions) = {
            let mut model = self.model.write();
            let delta = model.update(snapshot, metrics.clone());
            let predictions = model.predict();

            self.set_state(WardenState::Deciding);
            let actions = match model.latest() {
                Some(entry) => self.engine.decide(&entry.snapshot, &metrics, &predictions),
                None => Vec::new(),
            };
            (delta, predictions, actions)
        };
        if !predictions.is_empty() {
            log::info!("cycle {}: {} predicted vulnerabilities", self.cycle, predictions.len());
        }

        self.set_state(WardenState::Acting);
        let mut executed = Vec::new();
        for action in &actions {
            if !self.config.auto_executes(action.priority) {
                log::debug!(
                    "recording {} ({}) without auto-execution",
                    action.action_type,
                    action.priority
                );
                continue;
            }
            let result = self.executor.act(action).await;
            {
                let mut stats = self.stats.write();
                stats.actions_executed += 1;
                if !result.success {
                    stats.actions_failed += 1;
                }
            }
            executed.push(ExecutedAction {
                action: action.clone(),
                result,
            });
        }

        let record = CycleRecord {
            cycle: self.cycle,
            observation,
            delta,
            actions,
            executed,
        };
        self.persistence.append_cycle_record(&record).await?;
        self.cycle += 1;
        Ok(())
    }

    /// Request a stop. The flag is honored at the top of the next
    /// iteration and the inter-tick sleep is interrupted; an in-flight
    /// action always runs to completion.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    /// Am I — the node running this warden — a bottleneck of my own fleet?
    ///
    /// Reuses the latest observation when it is at most one loop interval
    /// old, otherwise takes a fresh one. Read-only: the retained history
    /// is not touched.
    pub async fn self_diagnose(&self, node: &NodeId) -> Result<SelfDiagnosis, ObservationError> {
        let max_age = TimeDelta::milliseconds(self.config.loop_interval_ms as i64);
        let cached = {
            let model = self.model.read();
            model
                .latest()
                .filter(|entry| self.clock.now() - entry.snapshot.timestamp <= max_age)
                .map(|entry| entry.snapshot.clone())
        };
        let snapshot = match cached {
            Some(snapshot) => snapshot,
            None => self.observer.observe_containing(node).await?,
        };

        let metrics = self.analyzer.analyze(&snapshot);
        let observed = snapshot.contains(node);
        let bottleneck = metrics.bottlenecks.iter().find(|b| &b.node_id == node);

        let mut recommendations = Vec::new();
        if !observed {
            recommendations.push("node is not part of the observed fleet".to_string());
        }
        if let Some(info) = bottleneck {
            recommendations.push(info.recommendation.clone());
        }
        if let Some(health) = snapshot.node_health(node) {
            if health.responsiveness < 0.5 {
                recommendations.push(format!(
                    "responsiveness {:.2}: restart or hand off coordination",
                    health.responsiveness
                ));
            }
            if health.memory_utilization > self.config.memory_pressure_threshold {
                recommendations.push(format!(
                    "memory utilization {:.2}: redistribute load before acting as a hub",
                    health.memory_utilization
                ));
            }
        }
        if recommendations.is_empty() {
            recommendations.push("no structural or health concerns".to_string());
        }

        Ok(SelfDiagnosis {
            node: node.clone(),
            observed,
            is_bottleneck: bottleneck.is_some(),
            criticality: bottleneck.map(|b| b.criticality),
            components: metrics.components,
            min_cut: metrics.min_cut,
            recommendations,
        })
    }

    /// Current loop state.
    pub fn state(&self) -> WardenState {
        *self.state.read()
    }

    /// Liveness counters.
    pub fn stats(&self) -> WardenStats {
        let inner = *self.stats.read();
        WardenStats {
            cycles_completed: inner.cycles_completed,
            cycles_failed: inner.cycles_failed,
            actions_executed: inner.actions_executed,
            actions_failed: inner.actions_failed,
            state: self.state(),
        }
    }

    /// Copy-on-read view of the self-model.
    pub fn model_view(&self) -> ModelView {
        model_view_of(&self.model)
    }

    /// Copy-on-read view of the action audit log.
    pub fn action_log(&self) -> Vec<ActionRecord> {
        self.executor.history()
    }

    fn set_state(&self, state: WardenState) {
        *self.state.write() = state;
    }
}

/// Cloneable handle for observing and stopping a running warden.
#[derive(Clone)]
pub struct WardenHandle {
    stop: Arc<AtomicBool>,
    wake: Arc<Notify>,
    state: Arc<RwLock<WardenState>>,
    stats: Arc<RwLock<StatsInner>>,
    model: Arc<RwLock<SelfModel>>,
    executor: Arc<ActionExecutor>,
}

impl WardenHandle {
    /// Request a stop; see [`Warden::stop`].
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();
    }

    /// Current loop state.
    pub fn state(&self) -> WardenState {
        *self.state.read()
    }

    /// Liveness counters.
    pub fn stats(&self) -> WardenStats {
        let inner = *self.stats.read();
        WardenStats {
            cycles_completed: inner.cycles_completed,
            cycles_failed: inner.cycles_failed,
            actions_executed: inner.actions_executed,
            actions_failed: inner.actions_failed,
            state: self.state(),
        }
    }

    /// Copy-on-read view of the self-model.
    pub fn model_view(&self) -> ModelView {
        model_view_of(&self.model)
    }

    /// Copy-on-read view of the action audit log.
    pub fn action_log(&self) -> Vec<ActionRecord> {
        self.executor.history()
    }
}

fn model_view_of(model: &Arc<RwLock<SelfModel>>) -> ModelView {
    let model = model.read();
    ModelView {
        latest_snapshot: model.latest().map(|e| e.snapshot.clone()),
        latest_metrics: model.latest().map(|e| e.metrics.clone()),
        history_len: model.history().len(),
        history_capacity: model.history().capacity(),
    }
}
