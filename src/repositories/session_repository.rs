use super::client::{acknowledged, ApiClient};
use crate::error::{AppError, AppResult};
use crate::models::{EntityId, NewSession, Session, SessionPayload};
use async_trait::async_trait;

/// Remote operations backing the Sessions page
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn list_sessions(&self) -> AppResult<Vec<Session>>;

    async fn create_session(&self, session: &NewSession) -> AppResult<Session>;

    async fn join_session(&self, id: &EntityId) -> AppResult<Option<Session>>;

    async fn leave_session(&self, id: &EntityId) -> AppResult<Option<Session>>;

    async fn cancel_session(&self, id: &EntityId) -> AppResult<Option<Session>>;

    async fn delete_session(&self, id: &EntityId) -> AppResult<()>;
}

/// Repository for study session data access
pub struct SessionRepository {
    client: ApiClient,
}

impl SessionRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn normalize(&self, payload: SessionPayload) -> AppResult<Session> {
        Session::from_payload(payload, self.client.viewer().as_ref())
    }

    async fn action(&self, id: &EntityId, action: &str) -> AppResult<Option<Session>> {
        let path = format!("sessions/{}/{}", id, action);
        let body = self.client.post_action(&path).await?;
        Ok(body.and_then(|body| acknowledged(&body, |p: SessionPayload| self.normalize(p))))
    }
}

#[async_trait]
impl SessionApi for SessionRepository {
    async fn list_sessions(&self) -> AppResult<Vec<Session>> {
        let payloads: Vec<SessionPayload> = self.client.get_list("sessions").await?;
        let viewer = self.client.viewer();
        payloads
            .into_iter()
            .map(|p| Session::from_payload(p, viewer.as_ref()))
            .collect()
    }

    async fn create_session(&self, session: &NewSession) -> AppResult<Session> {
        let payload: Option<SessionPayload> = self.client.post("sessions", Some(session)).await?;
        match payload {
            Some(payload) => self.normalize(payload),
            None => Err(AppError::MalformedPayload(
                "create session returned an empty body".to_string(),
            )),
        }
    }

    async fn join_session(&self, id: &EntityId) -> AppResult<Option<Session>> {
        self.action(id, "join").await
    }

    async fn leave_session(&self, id: &EntityId) -> AppResult<Option<Session>> {
        self.action(id, "leave").await
    }

    /// Mark a session cancelled (creator only)
    async fn cancel_session(&self, id: &EntityId) -> AppResult<Option<Session>> {
        self.action(id, "cancel").await
    }

    async fn delete_session(&self, id: &EntityId) -> AppResult<()> {
        self.client.delete_discard(&format!("sessions/{}", id)).await
    }
}
