use super::client::{acknowledged, ApiClient};
use crate::error::AppResult;
use crate::models::{Course, CoursePayload, EntityId};
use async_trait::async_trait;

/// Remote operations backing the Courses page
#[async_trait]
pub trait CourseApi: Send + Sync {
    async fn list_courses(&self) -> AppResult<Vec<Course>>;

    async fn enroll(&self, id: &EntityId) -> AppResult<Option<Course>>;

    async fn unenroll(&self, id: &EntityId) -> AppResult<Option<Course>>;
}

/// Repository for course catalog and enrollment
pub struct CourseRepository {
    client: ApiClient,
}

impl CourseRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn path(id: &EntityId) -> String {
        format!("courses/{}/enroll", id)
    }
}

#[async_trait]
impl CourseApi for CourseRepository {
    async fn list_courses(&self) -> AppResult<Vec<Course>> {
        let payloads: Vec<CoursePayload> = self.client.get_list("courses").await?;
        payloads.into_iter().map(Course::from_payload).collect()
    }

    async fn enroll(&self, id: &EntityId) -> AppResult<Option<Course>> {
        let body = self.client.post_action(&Self::path(id)).await?;
        Ok(body.and_then(|body| acknowledged(&body, Course::from_payload)))
    }

    async fn unenroll(&self, id: &EntityId) -> AppResult<Option<Course>> {
        let body = self.client.delete_action(&Self::path(id)).await?;
        Ok(body.and_then(|body| acknowledged::<CoursePayload, _>(&body, Course::from_payload)))
    }
}
