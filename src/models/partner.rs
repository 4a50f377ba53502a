use super::{required, required_text, EntityId, WireFields};
use crate::error::AppResult;
use crate::reconciler::Entity;
use serde::{Deserialize, Serialize};

/// Connection status between the viewer and a partner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    #[serde(alias = "not_connected")]
    None,
    #[serde(alias = "requested", alias = "sent")]
    Pending,
    #[serde(alias = "connected", alias = "buddy")]
    Accepted,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::None => "none",
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
        }
    }
}

/// When and how a partner likes to study
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireFields")]
pub struct StudyPreferences {
    pub preferred_times: Vec<String>,
    pub environment: Option<String>,
    pub style: Option<String>,
}

impl TryFrom<WireFields> for StudyPreferences {
    type Error = serde_json::Error;

    fn try_from(mut f: WireFields) -> Result<Self, Self::Error> {
        Ok(Self {
            preferred_times: f
                .take(&["preferred_times", "times", "preferredTimes", "study_times"])?
                .unwrap_or_default(),
            environment: f.take(&["environment", "studyEnvironment", "study_environment"])?,
            style: f.take(&["style", "studyStyle", "study_style"])?,
        })
    }
}

/// Suggested study partner or connected buddy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partner {
    pub id: EntityId,
    pub name: String,
    pub course: Option<String>,
    pub university: Option<String>,
    pub year: Option<String>,
    pub shared_courses: Vec<String>,
    pub all_courses: Vec<String>,
    pub preferences: StudyPreferences,
    /// 0 to 100
    pub compatibility_score: f32,
    pub connection_status: ConnectionStatus,
    pub bio: Option<String>,
}

/// Partner as the backend sends it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "WireFields")]
pub struct PartnerPayload {
    pub id: Option<EntityId>,
    pub name: Option<String>,
    pub course: Option<String>,
    pub university: Option<String>,
    pub year: Option<String>,
    pub shared_courses: Option<Vec<String>>,
    pub all_courses: Option<Vec<String>>,
    pub preferences: Option<StudyPreferences>,
    pub compatibility_score: Option<f32>,
    pub connection_status: Option<ConnectionStatus>,
    pub bio: Option<String>,
}

impl TryFrom<WireFields> for PartnerPayload {
    type Error = serde_json::Error;

    fn try_from(mut f: WireFields) -> Result<Self, Self::Error> {
        Ok(Self {
            id: f.take(&["id", "user_id", "userId", "partner_id", "_id"])?,
            name: f.take(&["name", "full_name", "fullName", "username"])?,
            course: f.take(&["course", "major", "program"])?,
            university: f.take(&["university", "school"])?,
            year: f.take(&["year", "year_of_study", "yearOfStudy"])?,
            shared_courses: f.take(&["shared_courses", "sharedCourses", "mutual_courses"])?,
            all_courses: f.take(&["all_courses", "allCourses", "courses", "enrolled_courses"])?,
            preferences: f.take(&["preferences", "studyPreferences", "study_preferences"])?,
            compatibility_score: f.take(&[
                "compatibility_score",
                "compatibilityScore",
                "match_score",
                "matchScore",
            ])?,
            connection_status: f.take(&["connection_status", "connectionStatus", "status"])?,
            bio: f.take(&["bio"])?,
        })
    }
}

impl Partner {
    pub fn from_payload(payload: PartnerPayload) -> AppResult<Self> {
        let id = required(payload.id, "partner", "id")?;
        let name = required_text(payload.name, "partner", "name")?;

        let shared_courses = payload.shared_courses.unwrap_or_default();
        let mut all_courses = payload.all_courses.unwrap_or_default();
        // Shared courses are always part of the full course list
        for course in &shared_courses {
            if !all_courses.contains(course) {
                all_courses.push(course.clone());
            }
        }

        Ok(Self {
            id,
            name,
            course: payload.course,
            university: payload.university,
            year: payload.year,
            shared_courses,
            all_courses,
            preferences: payload.preferences.unwrap_or_default(),
            compatibility_score: payload.compatibility_score.unwrap_or(0.0).clamp(0.0, 100.0),
            connection_status: payload.connection_status.unwrap_or_default(),
            bio: payload.bio,
        })
    }

    /// Accepted connections are buddies
    pub fn is_buddy(&self) -> bool {
        self.connection_status == ConnectionStatus::Accepted
    }

    pub fn shared_course_count(&self) -> usize {
        self.shared_courses.len()
    }
}

impl Entity for Partner {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}
