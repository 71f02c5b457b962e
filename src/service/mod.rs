//! The remote session service owns every durable record; the timer only
//! consumes what it returns.

use async_trait::async_trait;

use crate::{
    error::ServiceError,
    models::{CleanupReport, Goal, Session, SessionQuery, StartSessionRequest},
};

mod http;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpSessionService;

#[async_trait]
pub trait SessionService: Send + Sync {
    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>, ServiceError>;

    async fn start_session(&self, request: &StartSessionRequest) -> Result<Session, ServiceError>;

    async fn pause_session(&self, session_id: &str) -> Result<Session, ServiceError>;

    async fn resume_session(&self, session_id: &str) -> Result<Session, ServiceError>;

    async fn stop_session(&self, session_id: &str) -> Result<Session, ServiceError>;

    async fn complete_sub_task(&self, session_id: &str) -> Result<Session, ServiceError>;

    /// Marks stale prior-day sessions missed and returns today's sessions.
    async fn check_and_cleanup(&self) -> Result<CleanupReport, ServiceError>;
}

/// Goal definitions, needed to validate sub-task selection before a start.
#[async_trait]
pub trait GoalDirectory: Send + Sync {
    async fn fetch_goal(&self, goal_id: &str) -> Result<Goal, ServiceError>;
}
