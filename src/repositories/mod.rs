pub mod client;
pub mod group_repository;
pub mod session_repository;
pub mod partner_repository;
pub mod course_repository;

// Re-export all repositories for convenient access
pub use client::ApiClient;
pub use group_repository::{GroupApi, GroupRepository};
pub use session_repository::{SessionApi, SessionRepository};
pub use partner_repository::{PartnerApi, PartnerRepository};
pub use course_repository::{CourseApi, CourseRepository};
