//! Client-side search and facet filtering.
//!
//! Collections are small page caches, so every query is recomputed from
//! scratch. Nothing here mutates its input.

use crate::models::{Group, GroupKind, Partner, Session, SessionStatus, Visibility};
use std::fmt;

pub const NO_PARTNERS_FOUND: &str = "No partners found";
pub const NO_SESSIONS_FOUND: &str = "No sessions found";
pub const NO_GROUPS_FOUND: &str = "No groups found";

/// Entity with free-text fields and tag-like fields
pub trait Searchable {
    /// Fields concatenated for free-text matching
    fn search_fields(&self) -> Vec<&str>;

    /// Candidates a selected tag may match
    fn tag_fields(&self) -> Vec<&str> {
        Vec::new()
    }
}

/// Case-insensitive substring match over the concatenated fields
pub fn matches_text<T: Searchable + ?Sized>(item: &T, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    item.search_fields().join(" ").to_lowercase().contains(&needle)
}

/// Every tag must match at least one tag field
pub fn matches_tags<T: Searchable + ?Sized>(item: &T, tags: &[String]) -> bool {
    let fields: Vec<String> = item.tag_fields().iter().map(|f| f.to_lowercase()).collect();
    tags.iter().all(|tag| {
        let tag = tag.trim().to_lowercase();
        tag.is_empty() || fields.iter().any(|field| field.contains(&tag))
    })
}

impl Searchable for Partner {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.course.as_deref());
        fields.extend(self.university.as_deref());
        fields.extend(self.bio.as_deref());
        fields.extend(self.all_courses.iter().map(String::as_str));
        fields
    }

    fn tag_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.all_courses.iter().map(String::as_str).collect();
        fields.extend(self.preferences.preferred_times.iter().map(String::as_str));
        fields.extend(self.preferences.environment.as_deref());
        fields.extend(self.preferences.style.as_deref());
        fields
    }
}

impl Searchable for Session {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.title.as_str(), self.location.as_str()];
        fields.extend(self.course.as_deref());
        fields.extend(self.course_code.as_deref());
        fields.extend(self.description.as_deref());
        fields
    }

    fn tag_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.status.as_str()];
        fields.extend(self.course_code.as_deref());
        fields
    }
}

impl Searchable for Group {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.name.as_str()];
        fields.extend(self.description.as_deref());
        fields.extend(self.course.as_deref());
        fields
    }

    fn tag_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.kind.as_str(), self.visibility.as_str()];
        fields.extend(self.course.as_deref());
        fields
    }
}

/// Partner search parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartnerQuery {
    pub text: String,
    pub tags: Vec<String>,
    /// Inclusive
    pub min_shared_courses: Option<usize>,
    /// Inclusive, 0 to 100
    pub min_compatibility: Option<f32>,
}

impl PartnerQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_min_shared_courses(mut self, min: usize) -> Self {
        self.min_shared_courses = Some(min);
        self
    }

    pub fn matches(&self, partner: &Partner) -> bool {
        !partner.is_buddy()
            && matches_text(partner, &self.text)
            && matches_tags(partner, &self.tags)
            && self
                .min_shared_courses
                .map_or(true, |min| partner.shared_course_count() >= min)
            && self
                .min_compatibility
                .map_or(true, |min| partner.compatibility_score >= min)
    }
}

/// Result of a partner search, with its empty state
#[derive(Debug, Clone, PartialEq)]
pub struct PartnerSearch {
    pub results: Vec<Partner>,
}

impl PartnerSearch {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Message shown instead of the result list
    pub fn empty_state(&self) -> Option<&'static str> {
        self.is_empty().then_some(NO_PARTNERS_FOUND)
    }
}

/// Buddies are never part of the results; best matches first
pub fn search_partners(partners: &[Partner], query: &PartnerQuery) -> PartnerSearch {
    let mut results: Vec<Partner> = partners.iter().filter(|p| query.matches(p)).cloned().collect();
    results.sort_by(|a, b| {
        b.compatibility_score
            .partial_cmp(&a.compatibility_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    PartnerSearch { results }
}

/// Accepted connections only
pub fn buddies(partners: &[Partner]) -> Vec<Partner> {
    partners.iter().filter(|p| p.is_buddy()).cloned().collect()
}

/// Session search parameters; `status: None` is the "All" tab
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionQuery {
    pub text: String,
    pub status: Option<SessionStatus>,
    pub attending_only: bool,
}

impl SessionQuery {
    pub fn matches(&self, session: &Session) -> bool {
        self.status.map_or(true, |status| session.status == status)
            && (!self.attending_only || session.is_attending)
            && matches_text(session, &self.text)
    }
}

pub fn filter_sessions(sessions: &[Session], query: &SessionQuery) -> Vec<Session> {
    sessions.iter().filter(|s| query.matches(s)).cloned().collect()
}

/// Group search parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupQuery {
    pub text: String,
    pub kind: Option<GroupKind>,
    pub visibility: Option<Visibility>,
    pub joined_only: bool,
}

impl GroupQuery {
    pub fn matches(&self, group: &Group) -> bool {
        self.kind.map_or(true, |kind| group.kind == kind)
            && self.visibility.map_or(true, |v| group.visibility == v)
            && (!self.joined_only || group.is_member)
            && matches_text(group, &self.text)
    }
}

pub fn filter_groups(groups: &[Group], query: &GroupQuery) -> Vec<Group> {
    groups.iter().filter(|g| query.matches(g)).cloned().collect()
}

/// One filter tab on the Sessions page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTab {
    /// `None` is "All"
    pub status: Option<SessionStatus>,
    pub count: usize,
}

impl fmt::Display for StatusTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.status.map_or("All", |s| s.label());
        write!(f, "{} ({})", label, self.count)
    }
}

/// Upcoming, Ongoing, Completed, Cancelled, then All
pub fn status_tabs(sessions: &[Session]) -> Vec<StatusTab> {
    let mut tabs: Vec<StatusTab> = SessionStatus::ALL
        .iter()
        .map(|status| StatusTab {
            status: Some(*status),
            count: sessions.iter().filter(|s| s.status == *status).count(),
        })
        .collect();
    tabs.push(StatusTab {
        status: None,
        count: sessions.len(),
    });
    tabs
}
