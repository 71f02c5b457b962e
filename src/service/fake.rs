use std::{
    collections::{BTreeMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::ServiceError,
    models::{CleanupReport, Goal, Session, SessionQuery, SessionStatus, StartSessionRequest},
    timer::clock::{Clock, ManualClock},
};

use super::{GoalDirectory, SessionService};

/// In-memory stand-in for the session service. Computes pause totals the way
/// the server does and can be told to fail selected operations.
pub(crate) struct FakeSessionService {
    clock: Arc<ManualClock>,
    sessions: Mutex<BTreeMap<String, Session>>,
    goals: Mutex<BTreeMap<String, Goal>>,
    failing: Mutex<HashSet<&'static str>>,
    calls: AtomicUsize,
}

impl FakeSessionService {
    pub(crate) fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            sessions: Mutex::new(BTreeMap::new()),
            goals: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn insert(&self, session: Session) {
        let id = session.id.clone().expect("seeded sessions carry ids");
        self.sessions.lock().unwrap().insert(id, session);
    }

    pub(crate) fn insert_goal(&self, goal: Goal) {
        self.goals.lock().unwrap().insert(goal.id.clone(), goal);
    }

    pub(crate) fn session(&self, id: &str) -> Option<Session> {
        self.sessions.lock().unwrap().get(id).cloned()
    }

    pub(crate) fn only_session(&self) -> Session {
        let sessions = self.sessions.lock().unwrap();
        assert_eq!(sessions.len(), 1, "expected exactly one stored session");
        sessions.values().next().cloned().unwrap()
    }

    /// Operation names: list, start, pause, resume, stop, complete, cleanup.
    pub(crate) fn fail(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self, operation: &'static str) -> Result<(), ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(operation) {
            return Err(ServiceError::Status {
                status: 503,
                body: format!("{operation} unavailable"),
            });
        }
        Ok(())
    }

    fn mutate(
        &self,
        session_id: &str,
        apply: impl FnOnce(&mut Session, chrono::DateTime<chrono::Utc>) -> Result<(), ServiceError>,
    ) -> Result<Session, ServiceError> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(session_id).ok_or(ServiceError::Status {
            status: 404,
            body: format!("session {session_id} not found"),
        })?;
        apply(session, now)?;
        Ok(session.clone())
    }
}

fn end_pause(session: &mut Session, now: chrono::DateTime<chrono::Utc>) {
    if let Some(paused_at) = session.paused_at.take() {
        session.total_paused_seconds += (now - paused_at).num_seconds().max(0) as u64;
    }
}

fn conflict(message: &str) -> ServiceError {
    ServiceError::Status {
        status: 409,
        body: message.to_string(),
    }
}

#[async_trait]
impl SessionService for FakeSessionService {
    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>, ServiceError> {
        self.enter("list")?;
        let sessions = self.sessions.lock().unwrap();
        Ok(sessions
            .values()
            .filter(|s| query.user_id.as_ref().map_or(true, |u| &s.user_id == u))
            .filter(|s| query.goal_id.as_ref().map_or(true, |g| &s.goal_id == g))
            .filter(|s| query.date.map_or(true, |d| s.date == d))
            .filter(|s| query.start_date.map_or(true, |d| s.date >= d))
            .filter(|s| query.end_date.map_or(true, |d| s.date <= d))
            .cloned()
            .collect())
    }

    async fn start_session(&self, request: &StartSessionRequest) -> Result<Session, ServiceError> {
        self.enter("start")?;
        let id = Uuid::new_v4().to_string();
        let session = Session {
            id: Some(id.clone()),
            user_id: request.user_id.clone(),
            goal_id: request.goal_id.clone(),
            date: request.date,
            sub_task_id: request.sub_task_id.clone(),
            started_at: self.clock.now(),
            paused_at: None,
            total_paused_seconds: 0,
            status: SessionStatus::InProgress,
        };
        self.sessions.lock().unwrap().insert(id, session.clone());
        Ok(session)
    }

    async fn pause_session(&self, session_id: &str) -> Result<Session, ServiceError> {
        self.enter("pause")?;
        self.mutate(session_id, |session, now| {
            if session.status != SessionStatus::InProgress {
                return Err(conflict("session is not in progress"));
            }
            session.paused_at = Some(now);
            session.status = SessionStatus::Paused;
            Ok(())
        })
    }

    async fn resume_session(&self, session_id: &str) -> Result<Session, ServiceError> {
        self.enter("resume")?;
        self.mutate(session_id, |session, now| {
            if session.status != SessionStatus::Paused {
                return Err(conflict("session is not paused"));
            }
            end_pause(session, now);
            session.status = SessionStatus::InProgress;
            Ok(())
        })
    }

    async fn stop_session(&self, session_id: &str) -> Result<Session, ServiceError> {
        self.enter("stop")?;
        self.mutate(session_id, |session, now| {
            if session.status.is_terminal() {
                return Err(conflict("session already closed"));
            }
            end_pause(session, now);
            session.status = SessionStatus::Done;
            Ok(())
        })
    }

    async fn complete_sub_task(&self, session_id: &str) -> Result<Session, ServiceError> {
        self.enter("complete")?;
        self.mutate(session_id, |session, _| {
            if session.status != SessionStatus::InProgress {
                return Err(conflict("session is not in progress"));
            }
            Ok(())
        })
    }

    async fn check_and_cleanup(&self) -> Result<CleanupReport, ServiceError> {
        self.enter("cleanup")?;
        let today = self.clock.today();
        let mut sessions = self.sessions.lock().unwrap();
        let mut cleaned_up = 0;
        for session in sessions.values_mut() {
            if session.date < today && session.status.is_live() {
                session.status = SessionStatus::Missed;
                session.paused_at = None;
                cleaned_up += 1;
            }
        }
        let current = sessions
            .values()
            .filter(|session| session.date == today)
            .cloned()
            .collect();
        Ok(CleanupReport {
            cleaned_up,
            sessions: current,
        })
    }
}

#[async_trait]
impl GoalDirectory for FakeSessionService {
    async fn fetch_goal(&self, goal_id: &str) -> Result<Goal, ServiceError> {
        self.goals
            .lock()
            .unwrap()
            .get(goal_id)
            .cloned()
            .ok_or(ServiceError::Status {
                status: 404,
                body: format!("goal {goal_id} not found"),
            })
    }
}
