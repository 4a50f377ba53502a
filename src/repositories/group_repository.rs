use super::client::{acknowledged, ApiClient};
use crate::error::{AppError, AppResult};
use crate::models::{EntityId, Group, GroupPayload, NewGroup};
use async_trait::async_trait;

/// Remote operations backing the Groups page
#[async_trait]
pub trait GroupApi: Send + Sync {
    async fn list_groups(&self) -> AppResult<Vec<Group>>;

    async fn create_group(&self, group: &NewGroup) -> AppResult<Group>;

    /// `None` when the server acknowledged without a body
    async fn join_group(&self, id: &EntityId) -> AppResult<Option<Group>>;

    async fn leave_group(&self, id: &EntityId) -> AppResult<Option<Group>>;

    async fn delete_group(&self, id: &EntityId) -> AppResult<()>;
}

/// Repository for study group data access
pub struct GroupRepository {
    client: ApiClient,
}

impl GroupRepository {
    /// Create a new GroupRepository
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn normalize(&self, payload: GroupPayload) -> AppResult<Group> {
        Group::from_payload(payload, self.client.viewer().as_ref())
    }

    async fn action(&self, id: &EntityId, action: &str) -> AppResult<Option<Group>> {
        let path = format!("groups/{}/{}", id, action);
        let body = self.client.post_action(&path).await?;
        Ok(body.and_then(|body| acknowledged(&body, |p: GroupPayload| self.normalize(p))))
    }
}

#[async_trait]
impl GroupApi for GroupRepository {
    /// List every group visible to the current user
    async fn list_groups(&self) -> AppResult<Vec<Group>> {
        let payloads: Vec<GroupPayload> = self.client.get_list("groups").await?;
        let viewer = self.client.viewer();
        payloads
            .into_iter()
            .map(|p| Group::from_payload(p, viewer.as_ref()))
            .collect()
    }

    /// Create a group owned by the current user
    async fn create_group(&self, group: &NewGroup) -> AppResult<Group> {
        let payload: Option<GroupPayload> = self.client.post("groups", Some(group)).await?;
        match payload {
            Some(payload) => self.normalize(payload),
            None => Err(AppError::MalformedPayload(
                "create group returned an empty body".to_string(),
            )),
        }
    }

    async fn join_group(&self, id: &EntityId) -> AppResult<Option<Group>> {
        self.action(id, "join").await
    }

    async fn leave_group(&self, id: &EntityId) -> AppResult<Option<Group>> {
        self.action(id, "leave").await
    }

    /// Delete a group (owner only)
    async fn delete_group(&self, id: &EntityId) -> AppResult<()> {
        self.client.delete_discard(&format!("groups/{}", id)).await
    }
}
