use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::{SessionError, ValidationError},
    models::{Goal, SessionStatus},
};

/// Where a user's session for a goal stands on a given day. `Idle` means no
/// session exists yet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    Idle,
    InProgress,
    Paused,
    Done,
    Missed,
}

impl Default for SessionPhase {
    fn default() -> Self {
        SessionPhase::Idle
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::InProgress => "in progress",
            SessionPhase::Paused => "paused",
            SessionPhase::Done => "done",
            SessionPhase::Missed => "missed",
        };
        f.write_str(label)
    }
}

impl From<SessionStatus> for SessionPhase {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::InProgress => SessionPhase::InProgress,
            SessionStatus::Paused => SessionPhase::Paused,
            SessionStatus::Done => SessionPhase::Done,
            SessionStatus::Missed => SessionPhase::Missed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SessionAction {
    Start,
    Pause,
    Resume,
    Stop,
    CompleteSubTask,
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionAction::Start => "start",
            SessionAction::Pause => "pause",
            SessionAction::Resume => "resume",
            SessionAction::Stop => "stop",
            SessionAction::CompleteSubTask => "complete the sub-task of",
        };
        f.write_str(label)
    }
}

/// Legal transitions. `Done` and `Missed` accept nothing for the rest of the day.
pub fn transition(from: SessionPhase, action: SessionAction) -> Result<SessionPhase, SessionError> {
    use SessionAction::*;
    use SessionPhase::*;

    match (from, action) {
        (Idle, Start) => Ok(InProgress),
        (InProgress, Pause) => Ok(Paused),
        (Paused, Resume) => Ok(InProgress),
        (InProgress | Paused, Stop) => Ok(Done),
        (InProgress, CompleteSubTask) => Ok(InProgress),
        _ => Err(SessionError::illegal(action, from)),
    }
}

/// Single ownership check run once per dispatched action, before any
/// request is built.
pub fn authorize(actor: &str, owner: &str) -> Result<(), SessionError> {
    if actor == owner {
        Ok(())
    } else {
        Err(ValidationError::NotOwner {
            actor: actor.to_string(),
            owner: owner.to_string(),
        }
        .into())
    }
}

/// Goals with sub-tasks can only be timed one sub-task at a time.
pub fn validate_start(goal: &Goal, sub_task_id: Option<&str>) -> Result<(), SessionError> {
    match sub_task_id {
        None if goal.has_sub_tasks() => Err(ValidationError::SubTaskRequired {
            goal_id: goal.id.clone(),
        }
        .into()),
        Some(id) if goal.sub_task(id).is_none() => Err(ValidationError::UnknownSubTask {
            goal_id: goal.id.clone(),
            sub_task_id: id.to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}
