//! Action executor — the Act stage of the control loop.
//!
//! Dispatches each action to the lifecycle backend with an exhaustive
//! match over the closed action vocabulary, bounded by a timeout, and
//! appends exactly one audit record per attempt on every exit path:
//! success, backend failure, timeout, or an action that is structurally
//! unusable. Failures never propagate to the caller — the next action in
//! the batch always gets its chance.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::time::timeout;
use uuid::Uuid;

use crate::errors::ExecutionError;
use crate::fleet::lifecycle::{AgentLifecycle, AgentSpec};
use crate::fleet::types::NodeId;
use crate::healing::action::{
    ActionHistory, ActionRecord, ActionResult, HealingAction, HealingActionType,
};
use crate::warden::clock::Clock;

/// Carries out healing actions and keeps the audit log.
pub struct ActionExecutor {
    lifecycle: Arc<dyn AgentLifecycle>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
    history: RwLock<ActionHistory>,
}

impl ActionExecutor {
    /// Executor over the given backend. `call_timeout` bounds each
    /// lifecycle call.
    pub fn new(
        lifecycle: Arc<dyn AgentLifecycle>,
        clock: Arc<dyn Clock>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            lifecycle,
            clock,
            call_timeout,
            history: RwLock::new(ActionHistory::new()),
        }
    }

    /// Execute one action.
    ///
    /// Always returns a result and always appends exactly one audit
    /// record; the returned result mirrors what was recorded.
    pub async fn act(&self, action: &HealingAction) -> ActionResult {
        let started_at = self.clock.now();
        let outcome = self.dispatch(action).await;
        let duration_ms = elapsed_ms(started_at, self.clock.now());

        let result = match outcome {
            Ok(message) => {
                log::info!("{} succeeded: {}", action.action_type, message);
                ActionResult::ok(message, duration_ms)
            }
            Err(error) => {
                log::warn!("{} failed: {}", action.action_type, error);
                ActionResult::failed(error.to_string(), duration_ms)
            }
        };

        self.history.write().append(ActionRecord {
            id: Uuid::new_v4(),
            action: action.clone(),
            result: result.clone(),
            started_at,
        });
        result
    }

    /// Exhaustive dispatch over the action vocabulary. Adding a ninth
    /// action kind will not compile until it is handled here.
    async fn dispatch(&self, action: &HealingAction) -> Result<String, ExecutionError> {
        let target = || {
            action.target.clone().ok_or(ExecutionError::MissingTarget {
                action: action.action_type.to_string(),
            })
        };
        let peer = || {
            action.peer.clone().ok_or(ExecutionError::MissingPeer {
                action: action.action_type.to_string(),
            })
        };

        match action.action_type {
            HealingActionType::SpawnRedundantAgent => {
                let mirror = target()?;
                let spec = AgentSpec::mirror(mirror.clone());
                let spawned = self.bounded(self.lifecycle.spawn_agent(&spec)).await?;
                Ok(format!("spawned {} mirroring {}", spawned, mirror))
            }
            HealingActionType::AddConnection => {
                let a = target()?;
                let b = peer()?;
                self.bounded(self.lifecycle.connect_nodes(&a, &b)).await?;
                Ok(format!("connected {} and {}", a, b))
            }
            HealingActionType::RedistributeLoad => {
                let from = target()?;
                self.bounded(self.lifecycle.migrate_load(&from, action.peer.as_ref()))
                    .await?;
                Ok(format!("redistributed load off {}", from))
            }
            HealingActionType::RestartAgent => {
                let node = target()?;
                self.bounded(self.lifecycle.restart_agent(&node)).await?;
                Ok(format!("restarted {}", node))
            }
            HealingActionType::IsolateAgent => {
                let node = target()?;
                self.bounded(self.lifecycle.isolate_agent(&node)).await?;
                Ok(format!("isolated {}", node))
            }
            HealingActionType::PromoteToCoordinator => {
                let node = target()?;
                self.bounded(self.lifecycle.promote(&node)).await?;
                Ok(format!("promoted {}", node))
            }
            HealingActionType::DemoteCoordinator => {
                let node = target()?;
                self.bounded(self.lifecycle.demote(&node)).await?;
                Ok(format!("demoted {}", node))
            }
            HealingActionType::TriggerFailover => {
                let node = target()?;
                self.bounded(self.lifecycle.failover(&node)).await?;
                Ok(format!("failed over {}", node))
            }
        }
    }

    /// Bound a lifecycle call by the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, crate::errors::LifecycleError>>,
    ) -> Result<T, ExecutionError> {
        match timeout(self.call_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ExecutionError::Timeout(self.call_timeout.as_millis() as u64)),
        }
    }

    /// Copy-on-read view of the audit log.
    pub fn history(&self) -> Vec<ActionRecord> {
        self.history.read().records().to_vec()
    }

    /// Number of audit records.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }

    /// Link pending audit records to the observation taken at `timestamp`.
    pub fn link_post_snapshots(&self, timestamp: DateTime<Utc>) {
        self.history.write().link_post_snapshots(timestamp);
    }
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}
