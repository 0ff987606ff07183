//! Cycle-record persistence collaborator.
//!
//! Once per cycle the warden hands the persistence backend one
//! [`CycleRecord`]: what it saw, how the picture moved, what it decided,
//! and what it actually did. Retention, compaction, and querying are the
//! backend's business — the warden only appends.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::errors::PersistenceError;
use crate::fleet::types::TopologySnapshot;
use crate::healing::action::{ActionResult, HealingAction};
use crate::model::self_model::ObservationDelta;

/// One executed action with its outcome, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedAction {
    /// The action as dispatched.
    pub action: HealingAction,
    /// What happened.
    pub result: ActionResult,
}

/// Everything one control-loop cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Monotonic cycle counter for this warden instance.
    pub cycle: u64,
    /// The cycle's observation.
    pub observation: TopologySnapshot,
    /// Metric movement against the previous cycle.
    pub delta: ObservationDelta,
    /// Every action the engine decided, executed or not.
    pub actions: Vec<HealingAction>,
    /// The subset that was auto-executed, with outcomes.
    pub executed: Vec<ExecutedAction>,
}

/// Write-side collaborator for the audit stream.
#[async_trait]
pub trait CyclePersistence: Send + Sync {
    /// Append one cycle record.
    async fn append_cycle_record(&self, record: &CycleRecord) -> Result<(), PersistenceError>;
}

/// In-memory persistence for tests and simulations.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    records: RwLock<Vec<CycleRecord>>,
}

impl InMemoryPersistence {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy-on-read view of everything appended so far.
    pub fn records(&self) -> Vec<CycleRecord> {
        self.records.read().clone()
    }

    /// Number of records appended.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether anything has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl CyclePersistence for InMemoryPersistence {
    async fn append_cycle_record(&self, record: &CycleRecord) -> Result<(), PersistenceError> {
        self.records.write().push(record.clone());
        Ok(())
    }
}
