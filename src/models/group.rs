use super::{
    required, required_text, CurrentUser, EntityId, GroupMember, MemberRef, MemberRole, WireFields,
};
use crate::error::AppResult;
use crate::reconciler::{Entity, Membership};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default capacity when the backend omits `max_members`
pub const DEFAULT_MAX_MEMBERS: u32 = 10;

/// Group type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    #[default]
    Study,
    Project,
    #[serde(alias = "exam-prep", alias = "examPrep")]
    ExamPrep,
    Discussion,
}

impl GroupKind {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "study" => Ok(GroupKind::Study),
            "project" => Ok(GroupKind::Project),
            "exam_prep" | "examprep" => Ok(GroupKind::ExamPrep),
            "discussion" => Ok(GroupKind::Discussion),
            _ => Err(format!("Invalid group type: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Study => "study",
            GroupKind::Project => "project",
            GroupKind::ExamPrep => "exam_prep",
            GroupKind::Discussion => "discussion",
        }
    }
}

/// Group visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

/// Study group as rendered on the Groups page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    pub course: Option<String>,
    pub creator_id: EntityId,
    pub max_members: u32,
    pub member_count: u32,
    pub members: Option<Vec<GroupMember>>,
    pub kind: GroupKind,
    pub visibility: Visibility,
    pub is_member: bool,
    pub is_owner: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Group as the backend sends it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "WireFields")]
pub struct GroupPayload {
    pub id: Option<EntityId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub course: Option<String>,
    pub creator_id: Option<EntityId>,
    pub max_members: Option<u32>,
    pub member_count: Option<u32>,
    pub members: Option<Vec<MemberRef>>,
    pub kind: Option<GroupKind>,
    pub visibility: Option<Visibility>,
    pub is_public: Option<bool>,
    pub is_member: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<WireFields> for GroupPayload {
    type Error = serde_json::Error;

    fn try_from(mut f: WireFields) -> Result<Self, Self::Error> {
        Ok(Self {
            id: f.take(&["id", "group_id", "groupId", "_id"])?,
            name: f.take(&["name", "group_name", "groupName"])?,
            description: f.take(&["description"])?,
            course: f.take(&["course", "course_code", "courseCode", "subject"])?,
            creator_id: f.take(&[
                "creator_id",
                "creatorId",
                "created_by",
                "createdBy",
                "owner_id",
                "ownerId",
            ])?,
            max_members: f.take(&["max_members", "maxMembers", "capacity"])?,
            member_count: f.take(&["member_count", "memberCount", "members_count", "current_members"])?,
            members: f.take(&["members"])?,
            kind: f.take(&["type", "kind", "group_type", "groupType"])?,
            visibility: f.take(&["visibility"])?,
            is_public: f.take(&["is_public", "isPublic"])?,
            is_member: f.take(&["is_member", "isMember", "joined"])?,
            created_at: f.take(&["created_at", "createdAt"])?,
            updated_at: f.take(&["updated_at", "updatedAt"])?,
        })
    }
}

/// Form input for creating a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub description: Option<String>,
    pub course: Option<String>,
    pub max_members: u32,
    #[serde(rename = "group_type")]
    pub kind: GroupKind,
    pub visibility: Visibility,
}

impl NewGroup {
    pub fn new(name: impl Into<String>, max_members: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            course: None,
            max_members,
            kind: GroupKind::Study,
            visibility: Visibility::Public,
        }
    }
}

impl Group {
    /// Normalize a payload; `viewer` decides ownership and membership flags
    pub fn from_payload(payload: GroupPayload, viewer: Option<&EntityId>) -> AppResult<Self> {
        let id = required(payload.id, "group", "id")?;
        let name = required_text(payload.name, "group", "name")?;

        let members: Option<Vec<GroupMember>> = payload
            .members
            .map(|list| list.into_iter().map(GroupMember::from).collect());

        // Fall back to the owner entry in the member list
        let creator_id = match payload.creator_id {
            Some(creator) => creator,
            None => members
                .as_ref()
                .and_then(|list| list.iter().find(|m| m.is_owner()))
                .map(|m| m.user_id.clone())
                .ok_or_else(|| {
                    crate::error::AppError::MalformedPayload(format!(
                        "group {} is missing `creator_id`",
                        id
                    ))
                })?,
        };

        let is_owner = viewer.is_some_and(|v| *v == creator_id);
        let listed = viewer.and_then(|v| {
            members
                .as_ref()
                .map(|list| list.iter().any(|m| &m.user_id == v))
        });
        let is_member = payload.is_member.or(listed).unwrap_or(is_owner);

        let member_count = payload
            .member_count
            .or_else(|| members.as_ref().map(|list| list.len() as u32))
            .unwrap_or(0);

        let visibility = payload.visibility.unwrap_or(match payload.is_public {
            Some(false) => Visibility::Private,
            _ => Visibility::Public,
        });

        Ok(Self {
            id,
            name,
            description: payload.description,
            course: payload.course,
            creator_id,
            max_members: payload.max_members.unwrap_or(DEFAULT_MAX_MEMBERS),
            member_count,
            members,
            kind: payload.kind.unwrap_or_default(),
            visibility,
            is_member,
            is_owner,
            created_at: payload.created_at,
            updated_at: payload.updated_at,
        })
    }

    /// Local card shown while the create request is in flight
    pub fn placeholder(new: &NewGroup, owner: &CurrentUser) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::provisional(),
            name: new.name.trim().to_string(),
            description: new.description.clone(),
            course: new.course.clone(),
            creator_id: owner.id.clone(),
            max_members: new.max_members,
            member_count: 1,
            members: Some(vec![GroupMember::new(
                owner.id.clone(),
                Some(owner.name.clone()),
                MemberRole::Owner,
            )]),
            kind: new.kind,
            visibility: new.visibility,
            is_member: true,
            is_owner: true,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn is_full(&self) -> bool {
        self.member_count >= self.max_members
    }

    /// Created locally and never confirmed by the server
    pub fn is_local_only(&self) -> bool {
        self.id.is_provisional()
    }
}

impl Entity for Group {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

impl Membership for Group {
    fn headcount(&self) -> u32 {
        self.member_count
    }

    fn is_joined(&self) -> bool {
        self.is_member
    }

    fn set_membership(&mut self, headcount: u32, joined: bool) {
        self.member_count = headcount;
        self.is_member = joined;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value, viewer: &str) -> AppResult<Group> {
        let payload: GroupPayload = serde_json::from_value(value).unwrap();
        Group::from_payload(payload, Some(&EntityId::new(viewer)))
    }

    #[test]
    fn test_snake_case_payload() {
        let group = parse(
            json!({
                "id": 7,
                "name": "Graph Theory",
                "creator_id": "u1",
                "max_members": 6,
                "member_count": 3,
                "type": "exam_prep",
                "visibility": "private"
            }),
            "u1",
        )
        .unwrap();
        assert_eq!(group.id, EntityId::new("7"));
        assert_eq!(group.kind, GroupKind::ExamPrep);
        assert_eq!(group.visibility, Visibility::Private);
        assert!(group.is_owner);
        assert!(group.is_member);
    }

    #[test]
    fn test_alternate_field_names() {
        let group = parse(
            json!({
                "group_id": "g-9",
                "group_name": "Compilers",
                "createdBy": "u2",
                "maxMembers": 4,
                "members": ["u2", {"user_id": "u3", "name": "Sam"}],
                "isPublic": false
            }),
            "u3",
        )
        .unwrap();
        assert_eq!(group.name, "Compilers");
        assert_eq!(group.member_count, 2);
        assert!(group.is_member);
        assert!(!group.is_owner);
        assert_eq!(group.visibility, Visibility::Private);
    }

    #[test]
    fn test_both_spellings_present() {
        let group = parse(
            json!({
                "id": 1,
                "group_id": 1,
                "name": "Algorithms Crew",
                "group_name": "Algorithms Crew",
                "course": "CS201",
                "course_code": "CS201",
                "creator_id": "u1",
                "creatorId": "u1",
                "max_members": 8,
                "maxMembers": 8
            }),
            "u1",
        )
        .unwrap();
        assert_eq!(group.id, EntityId::new("1"));
        assert_eq!(group.name, "Algorithms Crew");
        assert_eq!(group.course.as_deref(), Some("CS201"));
        assert_eq!(group.max_members, 8);
        assert!(group.is_owner);
    }

    #[test]
    fn test_null_spelling_falls_through() {
        let group = parse(
            json!({"id": "g2", "name": null, "group_name": "Calculus Crew", "created_by": "u2"}),
            "u1",
        )
        .unwrap();
        assert_eq!(group.name, "Calculus Crew");
        assert!(!group.is_member);
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let err = parse(json!({"id": 1, "creator_id": "u1"}), "u1").unwrap_err();
        assert!(matches!(err, crate::error::AppError::MalformedPayload(_)));
    }

    #[test]
    fn test_placeholder() {
        let owner = CurrentUser::new("u1", "Ada");
        let group = Group::placeholder(&NewGroup::new("Algorithms Crew", 8), &owner);
        assert!(group.is_local_only());
        assert_eq!(group.member_count, 1);
        assert!(group.is_owner && group.is_member);
        assert!(!group.is_full());
    }
}
