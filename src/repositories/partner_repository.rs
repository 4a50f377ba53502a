use super::client::{acknowledged, ApiClient};
use crate::error::AppResult;
use crate::models::{EntityId, Partner, PartnerPayload};
use async_trait::async_trait;

/// Remote operations backing the Partners page
#[async_trait]
pub trait PartnerApi: Send + Sync {
    /// Suggested study partners ranked by the backend
    async fn list_suggestions(&self) -> AppResult<Vec<Partner>>;

    /// Accepted connections
    async fn list_buddies(&self) -> AppResult<Vec<Partner>>;

    async fn send_request(&self, id: &EntityId) -> AppResult<Option<Partner>>;

    async fn accept_request(&self, id: &EntityId) -> AppResult<Option<Partner>>;
}

/// Repository for partner matching data access
pub struct PartnerRepository {
    client: ApiClient,
}

impl PartnerRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    async fn list(&self, path: &str) -> AppResult<Vec<Partner>> {
        let payloads: Vec<PartnerPayload> = self.client.get_list(path).await?;
        payloads.into_iter().map(Partner::from_payload).collect()
    }

    async fn action(&self, id: &EntityId, action: &str) -> AppResult<Option<Partner>> {
        let path = format!("partners/{}/{}", id, action);
        let body = self.client.post_action(&path).await?;
        Ok(body.and_then(|body| acknowledged(&body, Partner::from_payload)))
    }
}

#[async_trait]
impl PartnerApi for PartnerRepository {
    async fn list_suggestions(&self) -> AppResult<Vec<Partner>> {
        self.list("partners/suggestions").await
    }

    async fn list_buddies(&self) -> AppResult<Vec<Partner>> {
        self.list("partners/buddies").await
    }

    async fn send_request(&self, id: &EntityId) -> AppResult<Option<Partner>> {
        self.action(id, "request").await
    }

    async fn accept_request(&self, id: &EntityId) -> AppResult<Option<Partner>> {
        self.action(id, "accept").await
    }
}
