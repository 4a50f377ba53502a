use super::page::{DataSource, MutationOutcome, Page};
use crate::auth::AuthProvider;
use crate::error::{AppError, AppResult};
use crate::fallback;
use crate::filter::{filter_groups, GroupQuery};
use crate::models::{EntityId, Group, NewGroup};
use crate::notifier::{EventBus, Topic};
use crate::reconciler::{FailurePolicy, MembershipChange, Mutation};
use crate::repositories::GroupApi;
use crate::validation::validate_new_group;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// Service behind the Groups page
pub struct GroupService {
    api: Arc<dyn GroupApi>,
    auth: AuthProvider,
    page: Page<Group>,
}

impl GroupService {
    /// Topics that make the Groups page refetch
    pub const INVALIDATED_BY: &'static [Topic] = &[
        Topic::GroupsInvalidated,
        Topic::GroupCreated,
        Topic::GroupDeleted,
    ];

    pub fn new(api: Arc<dyn GroupApi>, auth: AuthProvider, bus: EventBus, use_fallback: bool) -> Self {
        Self {
            api,
            auth,
            page: Page::new("groups", bus, Topic::GroupsInvalidated, use_fallback),
        }
    }

    pub fn page(&self) -> &Page<Group> {
        &self.page
    }

    pub async fn load(&self) -> DataSource {
        self.page.load(self.api.list_groups(), fallback::demo_groups).await
    }

    pub async fn refetch(&self) -> DataSource {
        self.page.refetch(self.api.list_groups()).await
    }

    pub async fn groups(&self) -> Vec<Group> {
        self.page.items().await
    }

    pub async fn filtered(&self, query: &GroupQuery) -> Vec<Group> {
        filter_groups(&self.page.items().await, query)
    }

    /// Groups the current user belongs to
    pub async fn my_groups(&self) -> Vec<Group> {
        let query = GroupQuery {
            joined_only: true,
            ..GroupQuery::default()
        };
        self.filtered(&query).await
    }

    /// Create a group; the caller becomes its owner and first member.
    ///
    /// The card appears immediately. If the backend cannot be reached the
    /// card stays as a local-only entry; a rejected request removes it.
    pub async fn create_group(&self, new: NewGroup) -> AppResult<MutationOutcome<Group>> {
        validate_new_group(&new).map_err(AppError::Validation)?;

        let owner = self.auth.current_user();
        let placeholder = Group::placeholder(&new, &owner);
        info!("Creating group: name={}, owner={}", placeholder.name, owner.id);

        let outcome = self
            .page
            .mutate(Mutation::Insert(placeholder), FailurePolicy::ByClass, async {
                self.api.create_group(&new).await.map(Some)
            })
            .await?;

        if let Some(group) = outcome.entity.as_ref().filter(|_| outcome.is_committed()) {
            info!("Group created: {}", group.id);
            self.page.bus().publish(
                Topic::GroupCreated,
                json!({ "group_id": group.id, "name": group.name }),
            );
        }
        Ok(outcome)
    }

    pub async fn join_group(&self, id: &EntityId) -> AppResult<MutationOutcome<Group>> {
        let group = self.page.require(id).await?;
        if group.is_member {
            return Err(AppError::Message(format!("Already a member of {}", group.name)));
        }
        if group.is_full() {
            return Err(AppError::Message(format!("{} is full", group.name)));
        }

        info!("Joining group {}", id);
        let outcome = self
            .page
            .mutate(
                Mutation::update(id.clone(), MembershipChange::Join),
                FailurePolicy::ByClass,
                self.api.join_group(id),
            )
            .await?;
        self.announce_membership(id, true, &outcome);
        Ok(outcome)
    }

    pub async fn leave_group(&self, id: &EntityId) -> AppResult<MutationOutcome<Group>> {
        let group = self.page.require(id).await?;
        if !group.is_member {
            return Err(AppError::Message(format!("Not a member of {}", group.name)));
        }
        if group.is_owner {
            return Err(AppError::Unauthorized(
                "The owner cannot leave their own group".to_string(),
            ));
        }

        info!("Leaving group {}", id);
        let outcome = self
            .page
            .mutate(
                Mutation::update(id.clone(), MembershipChange::Leave),
                FailurePolicy::ByClass,
                self.api.leave_group(id),
            )
            .await?;
        self.announce_membership(id, false, &outcome);
        Ok(outcome)
    }

    /// Delete a group (owner only). Any failure restores the list exactly.
    pub async fn delete_group(&self, id: &EntityId) -> AppResult<MutationOutcome<Group>> {
        let group = self.page.require(id).await?;
        if !group.is_owner {
            return Err(AppError::Unauthorized(
                "Only the group owner can delete it".to_string(),
            ));
        }

        // Local-only cards never reached the server
        let remote = !group.is_local_only();
        info!("Deleting group {} (remote: {})", id, remote);
        let outcome = self
            .page
            .mutate(
                Mutation::Remove(id.clone()),
                FailurePolicy::AlwaysRollback,
                async {
                    if remote {
                        self.api.delete_group(id).await?;
                    }
                    Ok::<_, AppError>(None)
                },
            )
            .await?;

        if outcome.is_committed() && remote {
            self.page
                .bus()
                .publish(Topic::GroupDeleted, json!({ "group_id": id }));
        } else if let Some(err) = &outcome.error {
            warn!("Delete of group {} failed: {}", id, err);
        }
        Ok(outcome)
    }

    fn announce_membership(&self, id: &EntityId, joined: bool, outcome: &MutationOutcome<Group>) {
        if outcome.is_committed() {
            self.page.bus().publish(
                Topic::GroupMembershipChanged,
                json!({ "group_id": id, "joined": joined }),
            );
        }
    }
}
