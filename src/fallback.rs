//! Demo entities shown when the backend is unreachable at first load.
//!
//! Ids use a `demo-` prefix so they never collide with server ids.

use crate::models::{
    ConnectionStatus, Course, EntityId, Group, GroupKind, Partner, Session, SessionStatus,
    StudyPreferences, Visibility,
};
use chrono::{Duration, Local, NaiveDate, NaiveTime};

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn demo_groups() -> Vec<Group> {
    let group = |id: &str, name: &str, course: &str, kind, max_members, member_count| Group {
        id: EntityId::new(id),
        name: name.to_string(),
        description: Some(format!("Weekly {} study group", course)),
        course: Some(course.to_string()),
        creator_id: EntityId::new("demo-organizer"),
        max_members,
        member_count,
        members: None,
        kind,
        visibility: Visibility::Public,
        is_member: false,
        is_owner: false,
        created_at: None,
        updated_at: None,
    };

    vec![
        group("demo-group-1", "Data Structures Study Circle", "CS201", GroupKind::Study, 8, 5),
        group("demo-group-2", "Calculus Exam Prep", "MATH101", GroupKind::ExamPrep, 10, 7),
        group("demo-group-3", "Software Engineering Project Team", "CS350", GroupKind::Project, 5, 3),
    ]
}

/// Dates are relative to `today` so demo sessions stay upcoming
pub fn demo_sessions(today: NaiveDate) -> Vec<Session> {
    let session = |id: &str, title: &str, code: &str, days: i64, start, end, status, count| Session {
        id: EntityId::new(id),
        title: title.to_string(),
        course: None,
        course_code: Some(code.to_string()),
        description: None,
        date: today + Duration::days(days),
        start_time: start,
        end_time: end,
        location: "Main Library, Room 204".to_string(),
        max_participants: 8,
        participant_count: count,
        status,
        is_creator: false,
        is_attending: false,
        group_id: None,
    };

    vec![
        session("demo-session-1", "Binary Trees Workshop", "CS201", 1, time(14, 0), time(16, 0), SessionStatus::Upcoming, 4),
        session("demo-session-2", "Integration Techniques Review", "MATH101", 3, time(10, 0), time(11, 30), SessionStatus::Upcoming, 6),
        session("demo-session-3", "Sprint Planning", "CS350", 0, time(9, 0), time(10, 0), SessionStatus::Ongoing, 3),
    ]
}

pub fn demo_sessions_today() -> Vec<Session> {
    demo_sessions(Local::now().date_naive())
}

pub fn demo_partners() -> Vec<Partner> {
    let partner = |id: &str, name: &str, shared: &[&str], all: &[&str], score, times: &[&str]| Partner {
        id: EntityId::new(id),
        name: name.to_string(),
        course: Some("Computer Science".to_string()),
        university: Some("State University".to_string()),
        year: Some("2nd year".to_string()),
        shared_courses: strings(shared),
        all_courses: strings(all),
        preferences: StudyPreferences {
            preferred_times: strings(times),
            environment: Some("Library".to_string()),
            style: Some("Collaborative".to_string()),
        },
        compatibility_score: score,
        connection_status: ConnectionStatus::None,
        bio: None,
    };

    vec![
        partner("demo-partner-1", "Emma Wilson", &["Data Structures"], &["Data Structures", "Linear Algebra"], 92.0, &["Evening"]),
        partner("demo-partner-2", "James Chen", &["Calculus I"], &["Calculus I", "Physics I"], 85.0, &["Morning"]),
        partner("demo-partner-3", "Sofia Garcia", &[], &["Organic Chemistry"], 64.0, &["Afternoon"]),
    ]
}

pub fn demo_courses() -> Vec<Course> {
    let course = |id: &str, code: &str, name: &str, count| Course {
        id: EntityId::new(id),
        code: code.to_string(),
        name: name.to_string(),
        description: None,
        is_enrolled: false,
        enrolled_count: count,
    };

    vec![
        course("demo-course-1", "CS201", "Data Structures", 120),
        course("demo-course-2", "MATH101", "Calculus I", 240),
        course("demo-course-3", "CS350", "Software Engineering", 80),
    ]
}
