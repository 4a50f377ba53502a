use super::{EntityId, WireFields};
use serde::{Deserialize, Serialize};

/// Member role in a study group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    #[serde(alias = "admin", alias = "creator")]
    Owner,
    #[default]
    Member,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Member => "member",
        }
    }
}

/// Membership entry; the backend sends either a bare user id or an object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MemberRef {
    Id(EntityId),
    Object(MemberEntry),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "WireFields")]
pub struct MemberEntry {
    pub id: EntityId,
    pub name: Option<String>,
    pub role: Option<MemberRole>,
}

impl TryFrom<WireFields> for MemberEntry {
    type Error = serde_json::Error;

    fn try_from(mut f: WireFields) -> Result<Self, Self::Error> {
        let id = f
            .take(&["id", "user_id", "userId"])?
            .ok_or_else(|| <serde_json::Error as serde::de::Error>::missing_field("id"))?;
        Ok(Self {
            id,
            name: f.take(&["name", "username", "full_name"])?,
            role: f.take(&["role"])?,
        })
    }
}

/// A member of a study group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: EntityId,
    pub name: Option<String>,
    pub role: MemberRole,
}

impl GroupMember {
    pub fn new(user_id: EntityId, name: Option<String>, role: MemberRole) -> Self {
        Self {
            user_id,
            name,
            role,
        }
    }

    pub fn is_owner(&self) -> bool {
        self.role == MemberRole::Owner
    }
}

impl From<MemberRef> for GroupMember {
    fn from(member: MemberRef) -> Self {
        match member {
            MemberRef::Id(user_id) => GroupMember::new(user_id, None, MemberRole::Member),
            MemberRef::Object(entry) => {
                GroupMember::new(entry.id, entry.name, entry.role.unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_member_refs() {
        let refs: Vec<MemberRef> = serde_json::from_value(json!([
            "u1",
            {"id": "u2", "user_id": "u2", "name": "Sam", "role": "admin"},
            {"userId": 3}
        ]))
        .unwrap();
        let members: Vec<GroupMember> = refs.into_iter().map(GroupMember::from).collect();
        assert_eq!(members[0].role, MemberRole::Member);
        assert!(members[1].is_owner());
        assert_eq!(members[1].name.as_deref(), Some("Sam"));
        assert_eq!(members[2].user_id, EntityId::new("3"));
    }

    #[test]
    fn test_member_object_needs_id() {
        assert!(serde_json::from_value::<MemberRef>(json!({"name": "Nobody"})).is_err());
    }
}
