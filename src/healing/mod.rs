//! Healing: the action vocabulary, the decision engine, and the executor.
//!
//! ```text
//! (snapshot, metrics, predictions)
//!        │
//!        ▼
//!   DecisionEngine ──► ordered Vec<HealingAction>
//!        │                  (deduplicated, safety-checked)
//!        ▼
//!   ActionExecutor ──► AgentLifecycle backend
//!        │
//!        └──► ActionHistory (one audit record per attempt, no exceptions)
//! ```

pub mod action;
pub mod decision;
pub mod executor;

pub use action::{
    ActionHistory, ActionPriority, ActionRecord, ActionResult, HealingAction, HealingActionType,
};
pub use decision::DecisionEngine;
pub use executor::ActionExecutor;
