pub mod page;
pub mod group_service;
pub mod session_service;
pub mod partner_service;
pub mod course_service;

pub use page::{DataSource, MutationOutcome, Page, PageState};
pub use group_service::GroupService;
pub use session_service::SessionService;
pub use partner_service::PartnerService;
pub use course_service::CourseService;
