use async_trait::async_trait;
use log::debug;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

use crate::{
    error::ServiceError,
    models::{CleanupReport, Goal, Session, SessionQuery, StartSessionRequest},
};

use super::{GoalDirectory, SessionService};

/// JSON-over-HTTP client for the session service. Requests carry no timeout
/// of their own; the transport's limits apply.
#[derive(Clone)]
pub struct HttpSessionService {
    client: Client,
    base_url: String,
}

impl HttpSessionService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn session_action(&self, session_id: &str, action: &str) -> Result<Session, ServiceError> {
        let url = self.url(&format!("sessions/{session_id}/{action}"));
        debug!("POST {url}");
        let response = self.client.post(&url).send().await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ServiceError::Decode(err.to_string()))
}

#[async_trait]
impl SessionService for HttpSessionService {
    async fn list_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>, ServiceError> {
        let url = self.url("sessions");
        debug!("GET {url} {query:?}");
        let response = self.client.get(&url).query(query).send().await?;
        decode(response).await
    }

    async fn start_session(&self, request: &StartSessionRequest) -> Result<Session, ServiceError> {
        let url = self.url("sessions/start");
        debug!("POST {url} goal={}", request.goal_id);
        let response = self.client.post(&url).json(request).send().await?;
        decode(response).await
    }

    async fn pause_session(&self, session_id: &str) -> Result<Session, ServiceError> {
        self.session_action(session_id, "pause").await
    }

    async fn resume_session(&self, session_id: &str) -> Result<Session, ServiceError> {
        self.session_action(session_id, "resume").await
    }

    async fn stop_session(&self, session_id: &str) -> Result<Session, ServiceError> {
        self.session_action(session_id, "stop").await
    }

    async fn complete_sub_task(&self, session_id: &str) -> Result<Session, ServiceError> {
        self.session_action(session_id, "complete-subtask").await
    }

    async fn check_and_cleanup(&self) -> Result<CleanupReport, ServiceError> {
        let url = self.url("sessions/check-and-cleanup");
        debug!("POST {url}");
        let response = self.client.post(&url).send().await?;
        decode(response).await
    }
}

#[async_trait]
impl GoalDirectory for HttpSessionService {
    async fn fetch_goal(&self, goal_id: &str) -> Result<Goal, ServiceError> {
        let url = self.url(&format!("goals/{goal_id}"));
        debug!("GET {url}");
        let response = self.client.get(&url).send().await?;
        decode(response).await
    }
}
