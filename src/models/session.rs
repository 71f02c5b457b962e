use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = String;
pub type GoalId = String;
pub type SessionId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Paused,
    Done,
    Missed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Paused => "PAUSED",
            SessionStatus::Done => "DONE",
            SessionStatus::Missed => "MISSED",
        }
    }

    /// `DONE` and `MISSED` close the day for a session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Done | SessionStatus::Missed)
    }

    pub fn is_live(&self) -> bool {
        !self.is_terminal()
    }
}

/// Authoritative session record as returned by the session service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SessionId>,
    pub user_id: UserId,
    pub goal_id: GoalId,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_task_id: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_paused_seconds: u64,
    pub status: SessionStatus,
}

impl Session {
    /// True when this record describes the same day of work as `other`.
    pub fn same_slot(&self, other: &Session) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            _ => {
                self.user_id == other.user_id
                    && self.goal_id == other.goal_id
                    && self.date == other.date
            }
        }
    }
}

/// Filter accepted by `list_sessions`. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<GoalId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

impl SessionQuery {
    pub fn date_range(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        if start_date == end_date {
            return Self {
                date: Some(start_date),
                ..Self::default()
            };
        }
        Self {
            start_date: Some(start_date),
            end_date: Some(end_date),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub user_id: UserId,
    pub goal_id: GoalId,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_task_id: Option<String>,
}

/// Result of the server-side sweep that closes stale prior-day sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub cleaned_up: u32,
    pub sessions: Vec<Session>,
}
