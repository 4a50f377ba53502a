use super::page::{DataSource, MutationOutcome, Page};
use crate::error::{AppError, AppResult};
use crate::fallback;
use crate::models::{Course, EntityId};
use crate::notifier::{EventBus, Topic};
use crate::reconciler::{FailurePolicy, MembershipChange, Mutation};
use crate::repositories::CourseApi;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Service behind the Courses page
pub struct CourseService {
    api: Arc<dyn CourseApi>,
    page: Page<Course>,
}

impl CourseService {
    pub const INVALIDATED_BY: &'static [Topic] = &[Topic::CoursesInvalidated];

    pub fn new(api: Arc<dyn CourseApi>, bus: EventBus, use_fallback: bool) -> Self {
        Self {
            api,
            page: Page::new("courses", bus, Topic::CoursesInvalidated, use_fallback),
        }
    }

    pub fn page(&self) -> &Page<Course> {
        &self.page
    }

    pub async fn load(&self) -> DataSource {
        self.page.load(self.api.list_courses(), fallback::demo_courses).await
    }

    pub async fn refetch(&self) -> DataSource {
        self.page.refetch(self.api.list_courses()).await
    }

    pub async fn courses(&self) -> Vec<Course> {
        self.page.items().await
    }

    pub async fn enrolled(&self) -> Vec<Course> {
        self.page
            .items()
            .await
            .into_iter()
            .filter(|c| c.is_enrolled)
            .collect()
    }

    pub async fn enroll(&self, id: &EntityId) -> AppResult<MutationOutcome<Course>> {
        let course = self.page.require(id).await?;
        if course.is_enrolled {
            return Err(AppError::Message(format!("Already enrolled in {}", course.code)));
        }

        info!("Enrolling in course {}", course.code);
        let outcome = self
            .page
            .mutate(
                Mutation::update(id.clone(), MembershipChange::Join),
                FailurePolicy::ByClass,
                self.api.enroll(id),
            )
            .await?;
        self.announce(id, true, &outcome);
        Ok(outcome)
    }

    pub async fn unenroll(&self, id: &EntityId) -> AppResult<MutationOutcome<Course>> {
        let course = self.page.require(id).await?;
        if !course.is_enrolled {
            return Err(AppError::Message(format!("Not enrolled in {}", course.code)));
        }

        info!("Dropping course {}", course.code);
        let outcome = self
            .page
            .mutate(
                Mutation::update(id.clone(), MembershipChange::Leave),
                FailurePolicy::ByClass,
                self.api.unenroll(id),
            )
            .await?;
        self.announce(id, false, &outcome);
        Ok(outcome)
    }

    fn announce(&self, id: &EntityId, enrolled: bool, outcome: &MutationOutcome<Course>) {
        if outcome.is_committed() {
            self.page.bus().publish(
                Topic::CourseEnrollmentChanged,
                json!({ "course_id": id, "enrolled": enrolled }),
            );
        }
    }
}
