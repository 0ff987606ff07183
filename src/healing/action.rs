//! Healing actions: the closed vocabulary of corrective interventions.
//!
//! Eight action kinds, a four-level priority ladder, and the audit types
//! that record what was actually done. The kind is a closed enum so the
//! executor's dispatch is exhaustive by construction — there is no
//! "unknown action type" at runtime, the compiler refuses it first.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fleet::types::NodeId;

// ---------------------------------------------------------------------------
// Action kind
// ---------------------------------------------------------------------------

/// The eight corrective interventions the warden can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingActionType {
    /// Spawn a twin wired into the target's neighborhood.
    SpawnRedundantAgent,
    /// Add a communication link (target and peer are the endpoints).
    AddConnection,
    /// Move load off the target node.
    RedistributeLoad,
    /// Restart the target agent in place.
    RestartAgent,
    /// Cut the target off from the fleet without terminating it.
    IsolateAgent,
    /// Promote the target to coordinator duty.
    PromoteToCoordinator,
    /// Relieve the target of coordinator duty.
    DemoteCoordinator,
    /// Remove the target and reroute around it.
    TriggerFailover,
}

impl HealingActionType {
    /// Whether the effects of this kind can be fully undone.
    ///
    /// A restart loses in-flight state and a failover tears the node out
    /// of the fleet; everything else can be reverted.
    pub fn default_reversible(self) -> bool {
        !matches!(
            self,
            HealingActionType::RestartAgent | HealingActionType::TriggerFailover
        )
    }

    /// Kinds that cannot sensibly be aimed at the same node in the same
    /// cycle (restarting a node while failing it over is nonsense).
    pub fn is_exclusive(self) -> bool {
        matches!(
            self,
            HealingActionType::RestartAgent
                | HealingActionType::IsolateAgent
                | HealingActionType::TriggerFailover
                | HealingActionType::DemoteCoordinator
        )
    }
}

impl fmt::Display for HealingActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealingActionType::SpawnRedundantAgent => "spawn_redundant_agent",
            HealingActionType::AddConnection => "add_connection",
            HealingActionType::RedistributeLoad => "redistribute_load",
            HealingActionType::RestartAgent => "restart_agent",
            HealingActionType::IsolateAgent => "isolate_agent",
            HealingActionType::PromoteToCoordinator => "promote_to_coordinator",
            HealingActionType::DemoteCoordinator => "demote_coordinator",
            HealingActionType::TriggerFailover => "trigger_failover",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Urgency ladder. Derived `Ord` follows declaration order, so
/// `Critical > High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionPriority {
    /// Worth noting, not worth acting on yet.
    Low,
    /// Act when convenient.
    Medium,
    /// Act this cycle.
    High,
    /// Act this cycle, ahead of everything else.
    Critical,
}

impl fmt::Display for ActionPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionPriority::Low => "low",
            ActionPriority::Medium => "medium",
            ActionPriority::High => "high",
            ActionPriority::Critical => "critical",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One proposed corrective intervention.
///
/// Safety invariant: a `Critical` action must be reversible. The decision
/// engine demotes violations to `High` before they ever reach the
/// executor; [`HealingAction::is_safe`] is the check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingAction {
    /// What to do.
    pub action_type: HealingActionType,
    /// Primary node the action is about, if any.
    pub target: Option<NodeId>,
    /// Second endpoint for link actions, destination for migrations.
    #[serde(default)]
    pub peer: Option<NodeId>,
    /// Urgency.
    pub priority: ActionPriority,
    /// Expected improvement, `[0, 1]`.
    pub estimated_impact: f64,
    /// Whether the effects can be fully undone.
    pub reversible: bool,
    /// Why the engine proposed this.
    pub reason: String,
}

impl HealingAction {
    /// New action with kind-default reversibility, `Medium` priority and
    /// zero impact; refine with the builder methods.
    pub fn new(action_type: HealingActionType, target: Option<NodeId>) -> Self {
        Self {
            action_type,
            target,
            peer: None,
            priority: ActionPriority::Medium,
            estimated_impact: 0.0,
            reversible: action_type.default_reversible(),
            reason: String::new(),
        }
    }

    /// Builder: set priority.
    pub fn with_priority(mut self, priority: ActionPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Builder: set estimated impact (clamped to `[0, 1]`).
    pub fn with_impact(mut self, impact: f64) -> Self {
        self.estimated_impact = if impact.is_finite() {
            impact.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Builder: set the peer endpoint.
    pub fn with_peer(mut self, peer: NodeId) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Builder: set the reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Identity for deduplication: one action per `(kind, target)`.
    pub fn dedup_key(&self) -> (HealingActionType, Option<NodeId>) {
        (self.action_type, self.target.clone())
    }

    /// The safety invariant: critical implies reversible.
    pub fn is_safe(&self) -> bool {
        self.priority != ActionPriority::Critical || self.reversible
    }
}

// ---------------------------------------------------------------------------
// Outcome & audit
// ---------------------------------------------------------------------------

/// Outcome of one executed action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the lifecycle backend carried it out.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Timestamp of the snapshot that verified the action, filled in on
    /// the following observation.
    pub post_action_snapshot: Option<DateTime<Utc>>,
    /// Wall time spent executing.
    pub duration_ms: u64,
}

impl ActionResult {
    /// Successful outcome.
    pub fn ok(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: true,
            message: message.into(),
            post_action_snapshot: None,
            duration_ms,
        }
    }

    /// Failed outcome.
    pub fn failed(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            message: message.into(),
            post_action_snapshot: None,
            duration_ms,
        }
    }
}

/// One audit-log entry: what was attempted, when, and how it went.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Unique record id.
    pub id: Uuid,
    /// The action as executed.
    pub action: HealingAction,
    /// Its outcome.
    pub result: ActionResult,
    /// When execution started.
    pub started_at: DateTime<Utc>,
}

/// Append-only audit log. Never pruned here — retention belongs to the
/// persistence collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionHistory {
    records: Vec<ActionRecord>,
}

impl ActionHistory {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record.
    pub fn append(&mut self, record: ActionRecord) {
        self.records.push(record);
    }

    /// All records, oldest first.
    pub fn records(&self) -> &[ActionRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether anything has been executed yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Fill `post_action_snapshot` on records that were still waiting for
    /// a verifying observation taken at `timestamp`.
    pub fn link_post_snapshots(&mut self, timestamp: DateTime<Utc>) {
        for record in &mut self.records {
            if record.result.post_action_snapshot.is_none() && record.started_at < timestamp {
                record.result.post_action_snapshot = Some(timestamp);
            }
        }
    }
}
