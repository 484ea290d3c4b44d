//! Fulfillment workflow: Pending → Prescription Issued → Completed.
//!
//! Pending is implicit (no status entry). Writes are full overwrites of
//! the status entry, so repeating an action is a no-op on stored state.
//! By default any action may replace any state; `ForwardOnly` refuses to
//! move a completed prescription back to issued.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::joiner::StatusJoiner;
use crate::models::{FulfillmentAction, FulfillmentStatus, StatusEntry};
use crate::store::{StatusStore, StoreError};

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Any action overwrites any prior state.
    #[default]
    Permissive,
    /// Status may only stay put or move forward.
    ForwardOnly,
}

impl std::str::FromStr for TransitionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permissive" => Ok(Self::Permissive),
            "forward_only" => Ok(Self::ForwardOnly),
            other => Err(format!("unknown transition policy {other:?}")),
        }
    }
}

impl TransitionPolicy {
    /// Validate a transition from `from` to `to`.
    pub fn check(&self, from: FulfillmentStatus, to: FulfillmentAction) -> Result<(), WorkflowError> {
        let target = FulfillmentStatus::from(to);
        match self {
            Self::Permissive => Ok(()),
            Self::ForwardOnly if target.rank() >= from.rank() => Ok(()),
            Self::ForwardOnly => Err(WorkflowError::IllegalTransition { from, to: target }),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Transition from {from} to {to} is not allowed")]
    IllegalTransition {
        from: FulfillmentStatus,
        to: FulfillmentStatus,
    },

    #[error("Could not read current status: {0}")]
    StatusRead(StoreError),

    #[error("Status write failed: {0}")]
    StatusWrite(StoreError),
}

/// Outcome of an applied transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: FulfillmentStatus,
    pub to: FulfillmentStatus,
}

impl Transition {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// Applies fulfillment actions to the status store.
pub struct FulfillmentStateMachine {
    store: Arc<dyn StatusStore>,
    joiner: StatusJoiner,
    policy: TransitionPolicy,
    write_timeout: Duration,
}

impl FulfillmentStateMachine {
    pub fn new(
        store: Arc<dyn StatusStore>,
        joiner: StatusJoiner,
        policy: TransitionPolicy,
        write_timeout: Duration,
    ) -> Self {
        Self {
            store,
            joiner,
            policy,
            write_timeout,
        }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    /// Persist `action` for `id` (last write wins).
    ///
    /// The current status is read first for validation and the returned
    /// [`Transition`]. Under the permissive policy a failed read is treated
    /// as Pending; under `ForwardOnly` it aborts the write.
    pub async fn set_status(&self, id: &str, action: FulfillmentAction) -> Result<Transition, WorkflowError> {
        let from = match self.joiner.try_lookup(id).await {
            Ok(entry) => FulfillmentStatus::from(entry),
            Err(e) if self.policy == TransitionPolicy::Permissive => {
                tracing::warn!(prescription_id = %id, error = %e, "Current status unreadable, writing anyway");
                FulfillmentStatus::Pending
            }
            Err(e) => return Err(WorkflowError::StatusRead(e)),
        };

        self.policy.check(from, action)?;

        let write = self.store.set_status(id, StatusEntry::new(action));
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(WorkflowError::StatusWrite(e)),
            Err(_) => {
                return Err(WorkflowError::StatusWrite(StoreError::Timeout(self.write_timeout)))
            }
        }

        let transition = Transition {
            from,
            to: action.into(),
        };
        if from == FulfillmentStatus::Completed && !transition.is_noop() {
            tracing::info!(prescription_id = %id, to = %transition.to, "Completed prescription reopened");
        } else {
            tracing::info!(prescription_id = %id, from = %from, to = %transition.to, "Fulfillment status updated");
        }
        Ok(transition)
    }
}
