use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    models::{GoalId, SessionId, SessionStatus, UserId},
    timer::state::SessionAction,
};

/// What the UI shows for one user's timer.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub session_id: Option<SessionId>,
    pub goal_id: GoalId,
    pub sub_task_id: Option<String>,
    pub status: SessionStatus,
    pub elapsed_seconds: u64,
    pub target_seconds: Option<u64>,
    pub remaining_seconds: Option<u64>,
    pub target_reached: bool,
    /// False while the view reflects an action the server has not answered yet.
    pub confirmed: bool,
}

/// Every tracked user's timer, keyed by user id.
pub type TimerBoard = BTreeMap<UserId, TimerView>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NoticeKind {
    Confirmed,
    Failed,
}

/// User-visible outcome of a background request.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub action_id: Uuid,
    pub user_id: UserId,
    pub action: SessionAction,
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn confirmed(action_id: Uuid, user_id: &str, action: SessionAction) -> Self {
        let message = match action {
            SessionAction::Start => "Timer started",
            SessionAction::Pause => "Timer paused",
            SessionAction::Resume => "Timer resumed",
            SessionAction::Stop => "Session ended",
            SessionAction::CompleteSubTask => "Sub-task completed",
        };
        Self {
            action_id,
            user_id: user_id.to_string(),
            action,
            kind: NoticeKind::Confirmed,
            message: message.to_string(),
        }
    }

    pub fn failed(action_id: Uuid, user_id: &str, action: SessionAction, reason: &str) -> Self {
        Self {
            action_id,
            user_id: user_id.to_string(),
            action,
            kind: NoticeKind::Failed,
            message: format!("Could not {action} the timer: {reason}"),
        }
    }
}
