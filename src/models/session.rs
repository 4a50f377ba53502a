use super::{required, required_text, CurrentUser, EntityId, WireFields};
use crate::error::{AppError, AppResult};
use crate::reconciler::{Entity, Membership};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Upcoming,
    #[serde(alias = "in_progress", alias = "active")]
    Ongoing,
    Completed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl SessionStatus {
    /// Tab order on the Sessions page
    pub const ALL: [SessionStatus; 4] = [
        SessionStatus::Upcoming,
        SessionStatus::Ongoing,
        SessionStatus::Completed,
        SessionStatus::Cancelled,
    ];

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "upcoming" => Ok(SessionStatus::Upcoming),
            "ongoing" | "in_progress" | "active" => Ok(SessionStatus::Ongoing),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" | "canceled" => Ok(SessionStatus::Cancelled),
            _ => Err(format!("Invalid status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Upcoming => "upcoming",
            SessionStatus::Ongoing => "ongoing",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
        }
    }

    /// Display label used by the status tabs
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Upcoming => "Upcoming",
            SessionStatus::Ongoing => "Ongoing",
            SessionStatus::Completed => "Completed",
            SessionStatus::Cancelled => "Cancelled",
        }
    }

    /// Whether students can still join or leave
    pub fn is_open(&self) -> bool {
        matches!(self, SessionStatus::Upcoming | SessionStatus::Ongoing)
    }
}

/// Study session as rendered on the Sessions page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: EntityId,
    pub title: String,
    pub course: Option<String>,
    pub course_code: Option<String>,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: String,
    pub max_participants: u32,
    pub participant_count: u32,
    pub status: SessionStatus,
    pub is_creator: bool,
    pub is_attending: bool,
    pub group_id: Option<EntityId>,
}

/// Session as the backend sends it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "WireFields")]
pub struct SessionPayload {
    pub id: Option<EntityId>,
    pub title: Option<String>,
    pub course: Option<String>,
    pub course_code: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub max_participants: Option<u32>,
    pub participant_count: Option<u32>,
    pub status: Option<SessionStatus>,
    pub is_creator: Option<bool>,
    pub is_attending: Option<bool>,
    pub creator_id: Option<EntityId>,
    pub group_id: Option<EntityId>,
}

impl TryFrom<WireFields> for SessionPayload {
    type Error = serde_json::Error;

    fn try_from(mut f: WireFields) -> Result<Self, Self::Error> {
        Ok(Self {
            id: f.take(&["id", "session_id", "sessionId", "_id"])?,
            title: f.take(&["title", "name", "session_title"])?,
            course: f.take(&["course", "course_name", "courseName"])?,
            course_code: f.take(&["course_code", "courseCode"])?,
            description: f.take(&["description"])?,
            date: f.take(&["date", "session_date", "sessionDate"])?,
            start_time: f.take(&["start_time", "startTime"])?,
            end_time: f.take(&["end_time", "endTime"])?,
            scheduled_start: f.take(&["scheduled_start", "scheduledStart", "starts_at"])?,
            scheduled_end: f.take(&["scheduled_end", "scheduledEnd", "ends_at"])?,
            location: f.take(&["location", "venue"])?,
            max_participants: f.take(&["max_participants", "maxParticipants", "capacity"])?,
            participant_count: f.take(&[
                "participant_count",
                "participantCount",
                "participants_count",
                "attendee_count",
            ])?,
            status: f.take(&["status"])?,
            is_creator: f.take(&["is_creator", "isCreator", "is_organizer"])?,
            is_attending: f.take(&["is_attending", "isAttending", "attending"])?,
            creator_id: f.take(&["creator_id", "creatorId", "organizer_id"])?,
            group_id: f.take(&["group_id", "groupId"])?,
        })
    }
}

/// Form input for scheduling a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub title: String,
    pub course: Option<String>,
    pub course_code: Option<String>,
    pub description: Option<String>,
    pub date: NaiveDate,
    #[serde(with = "hh_mm")]
    pub start_time: NaiveTime,
    #[serde(with = "hh_mm")]
    pub end_time: NaiveTime,
    pub location: String,
    pub max_participants: u32,
    pub group_id: Option<EntityId>,
}

fn parse_date(value: &str) -> AppResult<NaiveDate> {
    // Accept a bare date or the date part of a timestamp
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| AppError::MalformedPayload(format!("invalid session date {:?}: {}", value, e)))
}

fn parse_time(value: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| AppError::MalformedPayload(format!("invalid session time {:?}: {}", value, e)))
}

impl Session {
    pub fn from_payload(payload: SessionPayload, viewer: Option<&EntityId>) -> AppResult<Self> {
        let id = required(payload.id, "session", "id")?;
        let title = required_text(payload.title, "session", "title")?;

        let date = match (&payload.date, &payload.scheduled_start) {
            (Some(date), _) => parse_date(date)?,
            (None, Some(start)) => start.date_naive(),
            (None, None) => return Err(AppError::MalformedPayload(format!("session {} is missing `date`", id))),
        };
        let start_time = match (&payload.start_time, &payload.scheduled_start) {
            (Some(time), _) => parse_time(time)?,
            (None, Some(start)) => start.time(),
            (None, None) => return Err(AppError::MalformedPayload(format!("session {} is missing `start_time`", id))),
        };
        let end_time = match (&payload.end_time, &payload.scheduled_end) {
            (Some(time), _) => parse_time(time)?,
            (None, Some(end)) => end.time(),
            (None, None) => return Err(AppError::MalformedPayload(format!("session {} is missing `end_time`", id))),
        };

        let is_creator = payload.is_creator.unwrap_or_else(|| {
            matches!((viewer, &payload.creator_id), (Some(v), Some(c)) if v == c)
        });

        Ok(Self {
            id,
            title,
            course: payload.course,
            course_code: payload.course_code,
            description: payload.description,
            date,
            start_time,
            end_time,
            location: payload.location.unwrap_or_default(),
            max_participants: payload.max_participants.unwrap_or(0),
            participant_count: payload.participant_count.unwrap_or(0),
            status: payload.status.unwrap_or_default(),
            is_creator,
            is_attending: payload.is_attending.unwrap_or(is_creator),
            group_id: payload.group_id,
        })
    }

    /// Local entry shown while the create request is in flight
    pub fn placeholder(new: &NewSession, _creator: &CurrentUser) -> Self {
        Self {
            id: EntityId::provisional(),
            title: new.title.trim().to_string(),
            course: new.course.clone(),
            course_code: new.course_code.clone(),
            description: new.description.clone(),
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            location: new.location.trim().to_string(),
            max_participants: new.max_participants,
            participant_count: 1,
            status: SessionStatus::Upcoming,
            is_creator: true,
            is_attending: true,
            group_id: new.group_id.clone(),
        }
    }

    /// Zero capacity means unlimited
    pub fn is_full(&self) -> bool {
        self.max_participants > 0 && self.participant_count >= self.max_participants
    }

    pub fn is_local_only(&self) -> bool {
        self.id.is_provisional()
    }
}

impl Entity for Session {
    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

impl Membership for Session {
    fn headcount(&self) -> u32 {
        self.participant_count
    }

    fn is_joined(&self) -> bool {
        self.is_attending
    }

    fn set_membership(&mut self, headcount: u32, joined: bool) {
        self.participant_count = headcount;
        self.is_attending = joined;
    }
}

/// `HH:MM` on the wire
mod hh_mm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_time(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> AppResult<Session> {
        let payload: SessionPayload = serde_json::from_value(value).unwrap();
        Session::from_payload(payload, Some(&EntityId::new("u1")))
    }

    #[test]
    fn test_split_date_and_time_fields() {
        let session = parse(json!({
            "id": "s1",
            "title": "Linear Algebra review",
            "courseCode": "MATH221",
            "date": "2026-10-20",
            "startTime": "14:00",
            "endTime": "15:30:00",
            "location": "Library",
            "maxParticipants": 6,
            "participantCount": 2,
            "status": "in_progress",
            "isAttending": true
        }))
        .unwrap();
        assert_eq!(session.status, SessionStatus::Ongoing);
        assert_eq!(session.start_time, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert_eq!(session.end_time, NaiveTime::from_hms_opt(15, 30, 0).unwrap());
        assert!(session.is_attending);
        assert!(!session.is_creator);
    }

    #[test]
    fn test_timestamp_fields() {
        let session = parse(json!({
            "session_id": 12,
            "name": "Physics lab prep",
            "scheduled_start": "2026-11-02T09:00:00Z",
            "scheduled_end": "2026-11-02T10:00:00Z",
            "creator_id": "u1",
            "status": "canceled"
        }))
        .unwrap();
        assert_eq!(session.date, NaiveDate::from_ymd_opt(2026, 11, 2).unwrap());
        assert_eq!(session.status, SessionStatus::Cancelled);
        assert!(session.is_creator);
        assert!(session.is_attending);
    }

    #[test]
    fn test_duplicate_spellings() {
        let session = parse(json!({
            "id": "s7",
            "session_id": "s7",
            "title": "Heap Practice",
            "name": "Heap Practice",
            "date": "2026-10-21",
            "start_time": "09:00",
            "startTime": "09:00",
            "end_time": "10:00",
            "course": "Data Structures",
            "course_code": "CS201",
            "courseCode": "CS201",
            "participant_count": 2,
            "participantCount": 2
        }))
        .unwrap();
        assert_eq!(session.id, EntityId::new("s7"));
        assert_eq!(session.course.as_deref(), Some("Data Structures"));
        assert_eq!(session.course_code.as_deref(), Some("CS201"));
        assert_eq!(session.participant_count, 2);
    }

    #[test]
    fn test_missing_times_rejected() {
        let err = parse(json!({"id": "s1", "title": "x", "date": "2026-10-20"})).unwrap_err();
        assert!(matches!(err, AppError::MalformedPayload(_)));
    }

    #[test]
    fn test_new_session_wire_format() {
        let new = NewSession {
            title: "Review".into(),
            course: None,
            course_code: None,
            description: None,
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 5, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            location: "Room 1".into(),
            max_participants: 4,
            group_id: None,
        };
        let value = serde_json::to_value(&new).unwrap();
        assert_eq!(value["start_time"], "09:05");
        assert_eq!(value["date"], "2026-10-20");
    }
}
