use super::EntityId;
use serde::{Deserialize, Serialize};

/// The signed-in student, read from stored credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(alias = "user_id", alias = "userId")]
    pub id: EntityId,
    #[serde(alias = "full_name", alias = "fullName", alias = "username")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl CurrentUser {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
        }
    }

    /// Used when no credentials are stored; owns nothing on the server
    pub fn guest() -> Self {
        Self::new("guest", "Guest")
    }
}
