use thiserror::Error;

use crate::models::{GoalId, UserId};
use crate::timer::state::{SessionAction, SessionPhase};

/// Preconditions rejected before any request reaches the session service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("goal {goal_id} has sub-tasks; pick one before starting")]
    SubTaskRequired { goal_id: GoalId },
    #[error("sub-task {sub_task_id} does not belong to goal {goal_id}")]
    UnknownSubTask {
        goal_id: GoalId,
        sub_task_id: String,
    },
    #[error("user {actor} cannot act on a session owned by {owner}")]
    NotOwner { actor: UserId, owner: UserId },
    #[error("cannot {action} a session that is {from}")]
    IllegalTransition {
        action: SessionAction,
        from: SessionPhase,
    },
    #[error("no sub-task is being timed")]
    NoSubTask,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service responded {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("session service unavailable: {0}")]
    Network(#[from] ServiceError),
    #[error("inconsistent session state for {user_id}: {reason}")]
    InconsistentState { user_id: UserId, reason: String },
}

impl SessionError {
    /// Validation failures are shown as-is; everything else degrades to a reload.
    pub fn is_validation(&self) -> bool {
        matches!(self, SessionError::Validation(_))
    }

    pub fn illegal(action: SessionAction, from: SessionPhase) -> Self {
        ValidationError::IllegalTransition { action, from }.into()
    }
}
