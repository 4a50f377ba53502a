#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as Days, NaiveDate, NaiveTime};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use study_buddy::auth::{AuthProvider, Credentials, MemoryCredentialStore};
use study_buddy::models::*;
use study_buddy::notifier::EventBus;
use study_buddy::repositories::{CourseApi, GroupApi, PartnerApi, SessionApi};
use study_buddy::{AppConfig, AppError, AppResult, AppState, Backends};

pub const VIEWER_ID: &str = "u1";
pub const VIEWER_NAME: &str = "Alex Kim";

/// Failure injected into one backend operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Http(u16),
    Timeout,
    Transport,
}

impl Fault {
    fn to_error(self) -> AppError {
        match self {
            Fault::Http(status) => AppError::Http {
                status,
                message: format!("injected {}", status),
            },
            Fault::Timeout => AppError::Timeout,
            Fault::Transport => AppError::Transport("connection refused".to_string()),
        }
    }
}

/// In-memory backend implementing every data-access trait
pub struct FakeBackend {
    pub groups: Mutex<Vec<Group>>,
    pub sessions: Mutex<Vec<Session>>,
    pub suggestions: Mutex<Vec<Partner>>,
    pub buddies: Mutex<Vec<Partner>>,
    pub courses: Mutex<Vec<Course>>,
    faults: Mutex<HashMap<&'static str, Fault>>,
    calls: Mutex<Vec<String>>,
    latency: Mutex<Option<Duration>>,
    next_id: AtomicU64,
}

impl FakeBackend {
    /// Backend seeded with the standard fixtures
    pub fn new() -> Self {
        let backend = Self::empty();
        *backend.groups.lock().unwrap() = fixture_groups();
        *backend.sessions.lock().unwrap() = fixture_sessions();
        *backend.suggestions.lock().unwrap() = fixture_suggestions();
        *backend.buddies.lock().unwrap() = fixture_buddies();
        *backend.courses.lock().unwrap() = fixture_courses();
        backend
    }

    pub fn empty() -> Self {
        Self {
            groups: Mutex::new(Vec::new()),
            sessions: Mutex::new(Vec::new()),
            suggestions: Mutex::new(Vec::new()),
            buddies: Mutex::new(Vec::new()),
            courses: Mutex::new(Vec::new()),
            faults: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: Mutex::new(None),
            next_id: AtomicU64::new(100),
        }
    }

    /// Make `op` fail until healed
    pub fn fail(&self, op: &'static str, fault: Fault) {
        self.faults.lock().unwrap().insert(op, fault);
    }

    pub fn heal(&self, op: &'static str) {
        self.faults.lock().unwrap().remove(op);
    }

    pub fn heal_all(&self) {
        self.faults.lock().unwrap().clear();
    }

    /// Every operation fails with `fault`
    pub fn go_offline(&self, fault: Fault) {
        let mut faults = self.faults.lock().unwrap();
        for op in ALL_OPS {
            faults.insert(op, fault);
        }
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == op)
            .count()
    }

    async fn enter(&self, op: &'static str) -> AppResult<()> {
        self.calls.lock().unwrap().push(op.to_string());
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let fault = self.faults.lock().unwrap().get(op).copied();
        match fault {
            Some(fault) => Err(fault.to_error()),
            None => Ok(()),
        }
    }

    fn server_id(&self) -> EntityId {
        EntityId::from(self.next_id.fetch_add(1, Ordering::SeqCst) as i64)
    }
}

const ALL_OPS: [&str; 18] = [
    "list_groups",
    "create_group",
    "join_group",
    "leave_group",
    "delete_group",
    "list_sessions",
    "create_session",
    "join_session",
    "leave_session",
    "cancel_session",
    "delete_session",
    "list_suggestions",
    "list_buddies",
    "send_request",
    "accept_request",
    "list_courses",
    "enroll",
    "unenroll",
];

fn not_found(id: &EntityId) -> AppError {
    AppError::Http {
        status: 404,
        message: format!("{} not found", id),
    }
}

fn update<E: Clone, F: FnOnce(&mut E)>(
    items: &Mutex<Vec<E>>,
    id: &EntityId,
    key: impl Fn(&E) -> &EntityId,
    change: F,
) -> AppResult<E> {
    let mut items = items.lock().unwrap();
    let entity = items
        .iter_mut()
        .find(|e| key(&**e) == id)
        .ok_or_else(|| not_found(id))?;
    change(entity);
    Ok(entity.clone())
}

#[async_trait]
impl GroupApi for FakeBackend {
    async fn list_groups(&self) -> AppResult<Vec<Group>> {
        self.enter("list_groups").await?;
        Ok(self.groups.lock().unwrap().clone())
    }

    async fn create_group(&self, new: &NewGroup) -> AppResult<Group> {
        self.enter("create_group").await?;
        let owner = CurrentUser::new(VIEWER_ID, VIEWER_NAME);
        let mut group = Group::placeholder(new, &owner);
        group.id = self.server_id();
        self.groups.lock().unwrap().insert(0, group.clone());
        Ok(group)
    }

    async fn join_group(&self, id: &EntityId) -> AppResult<Option<Group>> {
        self.enter("join_group").await?;
        update(&self.groups, id, |g| &g.id, |g| {
            g.member_count += 1;
            g.is_member = true;
        })
        .map(Some)
    }

    async fn leave_group(&self, id: &EntityId) -> AppResult<Option<Group>> {
        self.enter("leave_group").await?;
        update(&self.groups, id, |g| &g.id, |g| {
            g.member_count = g.member_count.saturating_sub(1);
            g.is_member = false;
        })
        .map(Some)
    }

    async fn delete_group(&self, id: &EntityId) -> AppResult<()> {
        self.enter("delete_group").await?;
        let mut groups = self.groups.lock().unwrap();
        let before = groups.len();
        groups.retain(|g| &g.id != id);
        if groups.len() == before {
            return Err(not_found(id));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionApi for FakeBackend {
    async fn list_sessions(&self) -> AppResult<Vec<Session>> {
        self.enter("list_sessions").await?;
        Ok(self.sessions.lock().unwrap().clone())
    }

    async fn create_session(&self, new: &NewSession) -> AppResult<Session> {
        self.enter("create_session").await?;
        let creator = CurrentUser::new(VIEWER_ID, VIEWER_NAME);
        let mut session = Session::placeholder(new, &creator);
        session.id = self.server_id();
        self.sessions.lock().unwrap().insert(0, session.clone());
        Ok(session)
    }

    async fn join_session(&self, id: &EntityId) -> AppResult<Option<Session>> {
        self.enter("join_session").await?;
        update(&self.sessions, id, |s| &s.id, |s| {
            s.participant_count += 1;
            s.is_attending = true;
        })
        .map(Some)
    }

    async fn leave_session(&self, id: &EntityId) -> AppResult<Option<Session>> {
        self.enter("leave_session").await?;
        update(&self.sessions, id, |s| &s.id, |s| {
            s.participant_count = s.participant_count.saturating_sub(1);
            s.is_attending = false;
        })
        .map(Some)
    }

    async fn cancel_session(&self, id: &EntityId) -> AppResult<Option<Session>> {
        self.enter("cancel_session").await?;
        update(&self.sessions, id, |s| &s.id, |s| {
            s.status = SessionStatus::Cancelled;
        })
        .map(Some)
    }

    async fn delete_session(&self, id: &EntityId) -> AppResult<()> {
        self.enter("delete_session").await?;
        self.sessions.lock().unwrap().retain(|s| &s.id != id);
        Ok(())
    }
}

#[async_trait]
impl PartnerApi for FakeBackend {
    async fn list_suggestions(&self) -> AppResult<Vec<Partner>> {
        self.enter("list_suggestions").await?;
        Ok(self.suggestions.lock().unwrap().clone())
    }

    async fn list_buddies(&self) -> AppResult<Vec<Partner>> {
        self.enter("list_buddies").await?;
        Ok(self.buddies.lock().unwrap().clone())
    }

    async fn send_request(&self, id: &EntityId) -> AppResult<Option<Partner>> {
        self.enter("send_request").await?;
        // Acknowledged without a body
        update(&self.suggestions, id, |p| &p.id, |p| {
            p.connection_status = ConnectionStatus::Pending;
        })?;
        Ok(None)
    }

    async fn accept_request(&self, id: &EntityId) -> AppResult<Option<Partner>> {
        self.enter("accept_request").await?;
        let partner = update(&self.suggestions, id, |p| &p.id, |p| {
            p.connection_status = ConnectionStatus::Accepted;
        })?;
        self.suggestions.lock().unwrap().retain(|p| &p.id != id);
        self.buddies.lock().unwrap().push(partner.clone());
        Ok(Some(partner))
    }
}

#[async_trait]
impl CourseApi for FakeBackend {
    async fn list_courses(&self) -> AppResult<Vec<Course>> {
        self.enter("list_courses").await?;
        Ok(self.courses.lock().unwrap().clone())
    }

    async fn enroll(&self, id: &EntityId) -> AppResult<Option<Course>> {
        self.enter("enroll").await?;
        update(&self.courses, id, |c| &c.id, |c| {
            c.enrolled_count += 1;
            c.is_enrolled = true;
        })
        .map(Some)
    }

    async fn unenroll(&self, id: &EntityId) -> AppResult<Option<Course>> {
        self.enter("unenroll").await?;
        update(&self.courses, id, |c| &c.id, |c| {
            c.enrolled_count = c.enrolled_count.saturating_sub(1);
            c.is_enrolled = false;
        })
        .map(Some)
    }
}

/// Auth provider signed in as the fixture viewer
pub fn viewer_auth() -> AuthProvider {
    let credentials = Credentials::bearer("test-token", Some(CurrentUser::new(VIEWER_ID, VIEWER_NAME)));
    AuthProvider::new(Arc::new(MemoryCredentialStore::new(Some(credentials))))
}

pub fn backends(backend: &Arc<FakeBackend>) -> Backends {
    Backends {
        groups: backend.clone(),
        sessions: backend.clone(),
        partners: backend.clone(),
        courses: backend.clone(),
    }
}

/// App state over `backend` on its own bus
pub fn test_state(backend: &Arc<FakeBackend>) -> AppState {
    test_state_on(backend, EventBus::new(64))
}

pub fn test_state_on(backend: &Arc<FakeBackend>, bus: EventBus) -> AppState {
    AppState::with_backends(AppConfig::default(), viewer_auth(), bus, backends(backend))
}

pub fn id(value: &str) -> EntityId {
    EntityId::new(value)
}

pub fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

pub fn group(id: &str, name: &str, creator: &str, max_members: u32, member_count: u32) -> Group {
    let is_owner = creator == VIEWER_ID;
    Group {
        id: EntityId::new(id),
        name: name.to_string(),
        description: None,
        course: Some("CS201".to_string()),
        creator_id: EntityId::new(creator),
        max_members,
        member_count,
        members: None,
        kind: GroupKind::Study,
        visibility: Visibility::Public,
        is_member: is_owner,
        is_owner,
        created_at: None,
        updated_at: None,
    }
}

pub fn fixture_groups() -> Vec<Group> {
    let mut calculus = group("g2", "Calculus Crew", "u2", 10, 3);
    calculus.is_member = true;
    calculus.course = Some("MATH101".to_string());
    calculus.kind = GroupKind::ExamPrep;
    vec![
        group("g1", "Data Structures Study Circle", "u2", 8, 5),
        calculus,
        group("g3", "Compilers Reading Group", VIEWER_ID, 6, 2),
        group("g4", "Full House", "u3", 4, 4),
    ]
}

pub fn session(id: &str, title: &str, status: SessionStatus, creator: bool) -> Session {
    Session {
        id: EntityId::new(id),
        title: title.to_string(),
        course: Some("Data Structures".to_string()),
        course_code: Some("CS201".to_string()),
        description: None,
        date: today() + Days::days(1),
        start_time: time(14, 0),
        end_time: time(16, 0),
        location: "Main Library".to_string(),
        max_participants: 6,
        participant_count: if creator { 1 } else { 3 },
        status,
        is_creator: creator,
        is_attending: creator,
        group_id: None,
    }
}

/// Two upcoming, one ongoing, one cancelled
pub fn fixture_sessions() -> Vec<Session> {
    vec![
        session("s1", "Binary Trees Workshop", SessionStatus::Upcoming, false),
        session("s2", "Graph Algorithms Review", SessionStatus::Upcoming, true),
        session("s3", "Sprint Planning", SessionStatus::Ongoing, false),
        session("s4", "Midterm Cram", SessionStatus::Cancelled, false),
    ]
}

pub fn partner(id: &str, name: &str, shared: &[&str], all: &[&str], score: f32) -> Partner {
    Partner {
        id: EntityId::new(id),
        name: name.to_string(),
        course: Some("Computer Science".to_string()),
        university: Some("State University".to_string()),
        year: Some("2nd year".to_string()),
        shared_courses: shared.iter().map(|s| s.to_string()).collect(),
        all_courses: all.iter().map(|s| s.to_string()).collect(),
        preferences: StudyPreferences::default(),
        compatibility_score: score,
        connection_status: ConnectionStatus::None,
        bio: None,
    }
}

pub fn fixture_suggestions() -> Vec<Partner> {
    let mut pending = partner("p3", "Noah Brown", &["Physics I"], &["Physics I"], 70.0);
    pending.connection_status = ConnectionStatus::Pending;
    vec![
        partner(
            "p1",
            "Emma Wilson",
            &["Data Structures"],
            &["Data Structures", "Linear Algebra"],
            92.0,
        ),
        partner("p2", "James Chen", &["Calculus I"], &["Calculus I", "Physics I"], 85.0),
        pending,
    ]
}

/// Buddy list as the backend sends it: no connection status
pub fn fixture_buddies() -> Vec<Partner> {
    vec![partner(
        "p9",
        "Priya Patel",
        &["Linear Algebra"],
        &["Linear Algebra"],
        88.0,
    )]
}

pub fn course(id: &str, code: &str, name: &str, enrolled: bool, count: u32) -> Course {
    Course {
        id: EntityId::new(id),
        code: code.to_string(),
        name: name.to_string(),
        description: None,
        is_enrolled: enrolled,
        enrolled_count: count,
    }
}

pub fn fixture_courses() -> Vec<Course> {
    vec![
        course("c1", "CS201", "Data Structures", false, 120),
        course("c2", "MATH101", "Calculus I", true, 240),
    ]
}

/// Canned HTTP answer: method, path suffix, status, JSON body
pub type Route = (&'static str, &'static str, u16, &'static str);

/// Local HTTP server answering `routes`; returns its API base URL.
/// Unknown requests get a 404.
pub async fn stub_server(routes: &[Route]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes: Arc<Vec<Route>> = Arc::new(routes.to_vec());

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut chunk = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&chunk[..n]),
                    }
                }
                let head = String::from_utf8_lossy(&request).to_string();
                let mut line = head.split_whitespace();
                let method = line.next().unwrap_or_default();
                let path = line.next().unwrap_or_default();

                let (status, body) = routes
                    .iter()
                    .find(|(m, suffix, _, _)| *m == method && path.ends_with(suffix))
                    .map(|(_, _, status, body)| (*status, *body))
                    .unwrap_or((404, r#"{"detail": "no such route"}"#));
                let response = format!(
                    "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}/api/v1", addr)
}
