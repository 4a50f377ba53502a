use super::{required, required_text, EntityId, WireFields};
use crate::error::AppResult;
use crate::reconciler::{Entity, Membership};
use serde::{Deserialize, Serialize};

/// Course a student can enroll in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: EntityId,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_enrolled: bool,
    pub enrolled_count: u32,
}

/// Course as the backend sends it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "WireFields")]
pub struct CoursePayload {
    pub id: Option<EntityId>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_enrolled: Option<bool>,
    pub enrolled_count: Option<u32>,
}

impl TryFrom<WireFields> for CoursePayload {
    type Error = serde_json::Error;

    fn try_from(mut f: WireFields) -> Result<Self, Self::Error> {
        Ok(Self {
            id: f.take(&["id", "course_id", "courseId", "_id"])?,
            code: f.take(&["code", "course_code", "courseCode"])?,
            name: f.take(&["name", "title", "course_name", "courseName"])?,
            description: f.take(&["description"])?,
            is_enrolled: f.take(&["is_enrolled", "enrolled", "isEnrolled"])?,
            enrolled_count: f.take(&[
                "enrolled_count",
                "enrolledCount",
                "enrollment_count",
                "student_count",
                "studentCount",
            ])?,
        })
    }
}

impl Course {
    pub fn from_payload(payload: CoursePayload) -> AppResult<Self> {
        let id = required(payload.id, "course", "id")?;
        let name = required_text(payload.name, "course", "name")?;
        Ok(Self {
            code: payload.code.unwrap_or_else(|| id.to_string()),
            id,
            name,
            description: payload.description,
            is_enrolled: payload.is_enrolled.unwrap_or(false),
            enrolled_count: payload.enrolled_count.unwrap_or(0),
        })
    }
}

impl Entity for Course {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

impl Membership for Course {
    fn headcount(&self) -> u32 {
        self.enrolled_count
    }

    fn is_joined(&self) -> bool {
        self.is_enrolled
    }

    fn set_membership(&mut self, headcount: u32, joined: bool) {
        self.enrolled_count = headcount;
        self.is_enrolled = joined;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_code_and_course_code_together() {
        let payload: CoursePayload = serde_json::from_value(json!({
            "id": 3,
            "course_id": 3,
            "code": "CS201",
            "course_code": "CS201",
            "name": "Data Structures",
            "title": "Data Structures",
            "enrolled": true
        }))
        .unwrap();
        let course = Course::from_payload(payload).unwrap();
        assert_eq!(course.code, "CS201");
        assert!(course.is_enrolled);
    }

    #[test]
    fn test_code_defaults_to_id() {
        let payload: CoursePayload =
            serde_json::from_value(json!({"courseId": "math-101", "courseName": "Calculus I"})).unwrap();
        assert_eq!(Course::from_payload(payload).unwrap().code, "math-101");
    }
}
