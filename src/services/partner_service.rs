use super::page::{DataSource, MutationOutcome, Page};
use crate::error::{AppError, AppResult};
use crate::fallback;
use crate::filter::{self, search_partners, PartnerQuery, PartnerSearch};
use crate::models::{ConnectionStatus, EntityId, Partner};
use crate::notifier::{EventBus, Topic};
use crate::reconciler::{dedupe_by_id, FailurePolicy, FnPatch, Mutation};
use crate::repositories::PartnerApi;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Service behind the Partners page: suggestions and buddies in one list
pub struct PartnerService {
    api: Arc<dyn PartnerApi>,
    page: Page<Partner>,
}

impl PartnerService {
    /// Enrollment changes shift shared-course counts
    pub const INVALIDATED_BY: &'static [Topic] = &[
        Topic::PartnersInvalidated,
        Topic::BuddyConnected,
        Topic::CourseEnrollmentChanged,
    ];

    pub fn new(api: Arc<dyn PartnerApi>, bus: EventBus, use_fallback: bool) -> Self {
        Self {
            api,
            page: Page::new("partners", bus, Topic::PartnersInvalidated, use_fallback),
        }
    }

    pub fn page(&self) -> &Page<Partner> {
        &self.page
    }

    /// Buddies first so they win over a stale suggestion with the same id
    async fn fetch(&self) -> AppResult<Vec<Partner>> {
        let (suggestions, buddies) =
            futures::try_join!(self.api.list_suggestions(), self.api.list_buddies())?;
        debug!(
            "Fetched {} suggestions and {} buddies",
            suggestions.len(),
            buddies.len()
        );

        let buddies = buddies.into_iter().map(|mut partner| {
            partner.connection_status = ConnectionStatus::Accepted;
            partner
        });
        Ok(dedupe_by_id(buddies.chain(suggestions).collect()))
    }

    pub async fn load(&self) -> DataSource {
        self.page.load(self.fetch(), fallback::demo_partners).await
    }

    pub async fn refetch(&self) -> DataSource {
        self.page.refetch(self.fetch()).await
    }

    pub async fn partners(&self) -> Vec<Partner> {
        self.page.items().await
    }

    pub async fn search(&self, query: &PartnerQuery) -> PartnerSearch {
        search_partners(&self.page.items().await, query)
    }

    pub async fn buddies(&self) -> Vec<Partner> {
        filter::buddies(&self.page.items().await)
    }

    /// Send a study-buddy request; the card shows "pending" right away
    pub async fn send_request(&self, id: &EntityId) -> AppResult<MutationOutcome<Partner>> {
        let partner = self.page.require(id).await?;
        if partner.connection_status != ConnectionStatus::None {
            return Err(AppError::Message(format!(
                "Already {} with {}",
                partner.connection_status.as_str(),
                partner.name
            )));
        }

        info!("Sending buddy request to {}", id);
        let pending = FnPatch(|p: &mut Partner| p.connection_status = ConnectionStatus::Pending);
        self.page
            .mutate(
                Mutation::update(id.clone(), pending),
                FailurePolicy::ByClass,
                self.api.send_request(id),
            )
            .await
    }

    pub async fn accept_request(&self, id: &EntityId) -> AppResult<MutationOutcome<Partner>> {
        let partner = self.page.require(id).await?;
        if partner.connection_status != ConnectionStatus::Pending {
            return Err(AppError::Message(format!(
                "No pending request with {}",
                partner.name
            )));
        }

        info!("Accepting buddy request from {}", id);
        let accepted = FnPatch(|p: &mut Partner| p.connection_status = ConnectionStatus::Accepted);
        let outcome = self
            .page
            .mutate(
                Mutation::update(id.clone(), accepted),
                FailurePolicy::ByClass,
                self.api.accept_request(id),
            )
            .await?;

        if outcome.is_committed() {
            self.page.bus().publish(
                Topic::BuddyConnected,
                json!({ "partner_id": id, "name": partner.name }),
            );
        }
        Ok(outcome)
    }
}
