use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    error::{ServiceError, SessionError, ValidationError},
    events::Notice,
    models::{Goal, Session, StartSessionRequest, UserId},
    service::SessionService,
    sync::reconcile_once,
    timer::{
        state::{authorize, transition, validate_start, SessionAction},
        store::TrackedSession,
        TimerController,
    },
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Request sent in the background once the local view has moved.
#[derive(Debug, Clone)]
enum Request {
    Start(StartSessionRequest),
    Pause(String),
    Resume(String),
    Stop(String),
    CompleteSubTask { session_id: String, lap_seconds: u64 },
}

impl Request {
    async fn send(&self, service: &dyn SessionService) -> Result<Session, ServiceError> {
        match self {
            Request::Start(request) => service.start_session(request).await,
            Request::Pause(id) => service.pause_session(id).await,
            Request::Resume(id) => service.resume_session(id).await,
            Request::Stop(id) => service.stop_session(id).await,
            Request::CompleteSubTask { session_id, .. } => service.complete_sub_task(session_id).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Applied(Session),
    Failed(String),
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied(_))
    }
}

/// An action already reflected locally whose request is still in flight.
/// Dropping it leaves the request running.
pub struct PendingAction {
    pub id: Uuid,
    pub action: SessionAction,
    handle: JoinHandle<ActionOutcome>,
}

impl PendingAction {
    /// Wait for the request and the reload that follows it.
    pub async fn outcome(self) -> ActionOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => ActionOutcome::Failed(format!("action task ended early: {err}")),
        }
    }
}

/// Applies every state-changing action locally first, then sends it.
///
/// Whatever the server answers, a full reload follows. A failure is never
/// rolled back by hand: the reload's authoritative state replaces the
/// optimistic one. Callers must treat actions as eventually consistent.
#[derive(Clone)]
pub struct ActionManager {
    controller: TimerController,
    confirm_actions: bool,
}

impl ActionManager {
    pub fn new(controller: TimerController, confirm_actions: bool) -> Self {
        Self {
            controller,
            confirm_actions,
        }
    }

    pub fn controller(&self) -> &TimerController {
        &self.controller
    }

    pub async fn start(
        &self,
        actor: &str,
        goal: &Goal,
        sub_task_id: Option<String>,
    ) -> Result<PendingAction, SessionError> {
        authorize(actor, &goal.user_id)?;
        validate_start(goal, sub_task_id.as_deref())?;

        let today = self.controller.today();
        let user_id = goal.user_id.clone();
        let request = self
            .controller
            .update(|store, now| -> Result<Request, SessionError> {
                transition(
                    store.phase_for_goal(&user_id, &goal.id, today),
                    SessionAction::Start,
                )?;
                store.track(TrackedSession::optimistic_start(
                    &user_id,
                    goal,
                    sub_task_id.clone(),
                    today,
                    now,
                ));
                Ok(Request::Start(StartSessionRequest {
                    user_id: user_id.clone(),
                    goal_id: goal.id.clone(),
                    date: today,
                    sub_task_id,
                }))
            })
            .await?;

        Ok(self.dispatch(SessionAction::Start, user_id, request))
    }

    pub async fn pause(&self, actor: &str, user_id: &str) -> Result<PendingAction, SessionError> {
        self.act(actor, user_id, SessionAction::Pause).await
    }

    pub async fn resume(&self, actor: &str, user_id: &str) -> Result<PendingAction, SessionError> {
        self.act(actor, user_id, SessionAction::Resume).await
    }

    /// Ends today's session for good; nothing can resume it afterwards.
    pub async fn stop(&self, actor: &str, user_id: &str) -> Result<PendingAction, SessionError> {
        self.act(actor, user_id, SessionAction::Stop).await
    }

    /// Close the current sub-task lap and restart the display at zero while
    /// the server-side session keeps running.
    pub async fn complete_sub_task(
        &self,
        actor: &str,
        user_id: &str,
    ) -> Result<PendingAction, SessionError> {
        self.act(actor, user_id, SessionAction::CompleteSubTask).await
    }

    async fn act(
        &self,
        actor: &str,
        user_id: &str,
        action: SessionAction,
    ) -> Result<PendingAction, SessionError> {
        authorize(actor, user_id)?;

        let today = self.controller.today();
        let request = self
            .controller
            .update(|store, now| -> Result<Request, SessionError> {
                let phase = store.phase_of(user_id, today);
                transition(phase, action)?;

                let tracked = store
                    .get_mut(user_id)
                    .ok_or_else(|| SessionError::illegal(action, phase))?;
                if action == SessionAction::CompleteSubTask && tracked.record.sub_task_id.is_none() {
                    return Err(ValidationError::NoSubTask.into());
                }
                let session_id = tracked.record.id.clone().ok_or_else(|| {
                    SessionError::InconsistentState {
                        user_id: user_id.to_string(),
                        reason: "the server has not confirmed this session yet".into(),
                    }
                })?;

                tracked.apply_local(action, now);
                let request = match action {
                    SessionAction::Pause => Request::Pause(session_id),
                    SessionAction::Resume => Request::Resume(session_id),
                    SessionAction::Stop => Request::Stop(session_id),
                    SessionAction::CompleteSubTask => Request::CompleteSubTask {
                        session_id,
                        lap_seconds: tracked.pending_lap().unwrap_or_default(),
                    },
                    SessionAction::Start => return Err(SessionError::illegal(action, phase)),
                };
                if action == SessionAction::Stop {
                    store.close(user_id, false);
                }
                Ok(request)
            })
            .await?;

        Ok(self.dispatch(action, user_id.to_string(), request))
    }

    fn dispatch(&self, action: SessionAction, user_id: UserId, request: Request) -> PendingAction {
        let id = Uuid::new_v4();
        let controller = self.controller.clone();
        let confirm_actions = self.confirm_actions;

        let handle = tokio::spawn(async move {
            let service = controller.service();
            let outcome = match request.send(service.as_ref()).await {
                Ok(record) => {
                    log_info!("{action} for {user_id} accepted by server [{id}]");
                    if let Request::CompleteSubTask { lap_seconds, .. } = &request {
                        let lap = *lap_seconds;
                        controller
                            .update(|store, _| {
                                if let Some(tracked) = store.get_mut(&user_id) {
                                    tracked.commit_lap(lap);
                                }
                            })
                            .await;
                    }
                    if let Err(err) = controller.apply_authoritative(vec![record.clone()]).await {
                        log_warn!("server record for {user_id} needed correction: {err}");
                    }
                    if confirm_actions {
                        controller.notify(Notice::confirmed(id, &user_id, action));
                    }
                    ActionOutcome::Applied(record)
                }
                Err(err) => {
                    log_error!("{action} for {user_id} failed [{id}]: {err}");
                    let reason = err.to_string();
                    controller.notify(Notice::failed(id, &user_id, action, &reason));
                    ActionOutcome::Failed(reason)
                }
            };

            if let Err(err) = reconcile_once(&controller).await {
                log_warn!("reload after {action} failed, keeping local state: {err}");
            }
            outcome
        });

        PendingAction { id, action, handle }
    }
}
