use super::page::{DataSource, MutationOutcome, Page};
use crate::auth::AuthProvider;
use crate::error::{AppError, AppResult};
use crate::fallback;
use crate::filter::{filter_sessions, status_tabs, SessionQuery, StatusTab};
use crate::models::{EntityId, NewSession, Session, SessionStatus};
use crate::notifier::{EventBus, Topic};
use crate::reconciler::{FailurePolicy, FnPatch, MembershipChange, Mutation};
use crate::repositories::SessionApi;
use crate::validation::validate_new_session;
use chrono::{Local, NaiveDate};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Service behind the Sessions page
pub struct SessionService {
    api: Arc<dyn SessionApi>,
    auth: AuthProvider,
    page: Page<Session>,
}

impl SessionService {
    /// Group changes can add or remove sessions the viewer sees
    pub const INVALIDATED_BY: &'static [Topic] = &[
        Topic::SessionsInvalidated,
        Topic::SessionCreated,
        Topic::GroupMembershipChanged,
        Topic::GroupDeleted,
    ];

    pub fn new(api: Arc<dyn SessionApi>, auth: AuthProvider, bus: EventBus, use_fallback: bool) -> Self {
        Self {
            api,
            auth,
            page: Page::new("sessions", bus, Topic::SessionsInvalidated, use_fallback),
        }
    }

    pub fn page(&self) -> &Page<Session> {
        &self.page
    }

    pub async fn load(&self) -> DataSource {
        self.page
            .load(self.api.list_sessions(), fallback::demo_sessions_today)
            .await
    }

    pub async fn refetch(&self) -> DataSource {
        self.page.refetch(self.api.list_sessions()).await
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.page.items().await
    }

    pub async fn filtered(&self, query: &SessionQuery) -> Vec<Session> {
        filter_sessions(&self.page.items().await, query)
    }

    /// Upcoming, Ongoing, Completed, Cancelled and All, with counts
    pub async fn tabs(&self) -> Vec<StatusTab> {
        status_tabs(&self.page.items().await)
    }

    pub async fn create_session(&self, new: NewSession) -> AppResult<MutationOutcome<Session>> {
        self.create_session_on(new, Local::now().date_naive()).await
    }

    /// Create with an explicit "today" for the past-date check
    pub async fn create_session_on(
        &self,
        new: NewSession,
        today: NaiveDate,
    ) -> AppResult<MutationOutcome<Session>> {
        validate_new_session(&new, today).map_err(AppError::Validation)?;

        let creator = self.auth.current_user();
        let placeholder = Session::placeholder(&new, &creator);
        info!("Scheduling session: title={}, date={}", placeholder.title, placeholder.date);

        let outcome = self
            .page
            .mutate(Mutation::Insert(placeholder), FailurePolicy::ByClass, async {
                self.api.create_session(&new).await.map(Some)
            })
            .await?;

        if let Some(session) = outcome.entity.as_ref().filter(|_| outcome.is_committed()) {
            self.page.bus().publish(
                Topic::SessionCreated,
                json!({ "session_id": session.id, "title": session.title }),
            );
        }
        Ok(outcome)
    }

    pub async fn join_session(&self, id: &EntityId) -> AppResult<MutationOutcome<Session>> {
        let session = self.page.require(id).await?;
        if !session.status.is_open() {
            return Err(AppError::Message(format!(
                "{} is {}",
                session.title,
                session.status.label().to_lowercase()
            )));
        }
        if session.is_attending {
            return Err(AppError::Message(format!("Already attending {}", session.title)));
        }
        if session.is_full() {
            return Err(AppError::Message(format!("{} is full", session.title)));
        }

        info!("Joining session {}", id);
        self.page
            .mutate(
                Mutation::update(id.clone(), MembershipChange::Join),
                FailurePolicy::ByClass,
                self.api.join_session(id),
            )
            .await
    }

    pub async fn leave_session(&self, id: &EntityId) -> AppResult<MutationOutcome<Session>> {
        let session = self.page.require(id).await?;
        if !session.is_attending {
            return Err(AppError::Message(format!("Not attending {}", session.title)));
        }
        if session.is_creator {
            return Err(AppError::Unauthorized(
                "The organizer cannot leave; cancel the session instead".to_string(),
            ));
        }

        info!("Leaving session {}", id);
        self.page
            .mutate(
                Mutation::update(id.clone(), MembershipChange::Leave),
                FailurePolicy::ByClass,
                self.api.leave_session(id),
            )
            .await
    }

    /// Mark a session cancelled (organizer only)
    pub async fn cancel_session(&self, id: &EntityId) -> AppResult<MutationOutcome<Session>> {
        let session = self.page.require(id).await?;
        if !session.is_creator {
            return Err(AppError::Unauthorized(
                "Only the organizer can cancel a session".to_string(),
            ));
        }
        if !session.status.is_open() {
            return Err(AppError::Message(format!(
                "{} is already {}",
                session.title,
                session.status.label().to_lowercase()
            )));
        }

        info!("Cancelling session {}", id);
        let cancel = FnPatch(|s: &mut Session| s.status = SessionStatus::Cancelled);
        self.page
            .mutate(
                Mutation::update(id.clone(), cancel),
                FailurePolicy::ByClass,
                self.api.cancel_session(id),
            )
            .await
    }

    /// Delete a session (organizer only). Any failure restores the list exactly.
    pub async fn delete_session(&self, id: &EntityId) -> AppResult<MutationOutcome<Session>> {
        let session = self.page.require(id).await?;
        if !session.is_creator {
            return Err(AppError::Unauthorized(
                "Only the organizer can delete a session".to_string(),
            ));
        }

        let remote = !session.is_local_only();
        info!("Deleting session {} (remote: {})", id, remote);
        self.page
            .mutate(
                Mutation::Remove(id.clone()),
                FailurePolicy::AlwaysRollback,
                async {
                    if remote {
                        self.api.delete_session(id).await?;
                    }
                    Ok::<_, AppError>(None)
                },
            )
            .await
    }
}
