//! Form validation run before any network call.
//!
//! Errors are collected per field so each can be shown next to its input.

use crate::models::{NewGroup, NewSession};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;

pub const GROUP_NAME_MAX_LEN: usize = 100;
pub const GROUP_DESCRIPTION_MAX_LEN: usize = 500;
pub const GROUP_MIN_MEMBERS: u32 = 2;
pub const GROUP_MAX_MEMBERS: u32 = 50;
pub const SESSION_MIN_PARTICIPANTS: u32 = 2;
pub const SESSION_MAX_PARTICIPANTS: u32 = 100;

/// Field name -> message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        // First error per field wins
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    /// `Ok(())` when no field failed
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

pub fn validate_new_group(group: &NewGroup) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();

    let name = group.name.trim();
    if name.is_empty() {
        errors.add("name", "Group name is required");
    } else if name.chars().count() > GROUP_NAME_MAX_LEN {
        errors.add(
            "name",
            format!("Group name must be at most {} characters", GROUP_NAME_MAX_LEN),
        );
    }

    if let Some(description) = &group.description {
        if description.chars().count() > GROUP_DESCRIPTION_MAX_LEN {
            errors.add(
                "description",
                format!(
                    "Description must be at most {} characters",
                    GROUP_DESCRIPTION_MAX_LEN
                ),
            );
        }
    }

    if !(GROUP_MIN_MEMBERS..=GROUP_MAX_MEMBERS).contains(&group.max_members) {
        errors.add(
            "max_members",
            format!(
                "Max members must be between {} and {}",
                GROUP_MIN_MEMBERS, GROUP_MAX_MEMBERS
            ),
        );
    }

    errors.into_result()
}

/// `today` is passed in so the check stays deterministic.
pub fn validate_new_session(session: &NewSession, today: NaiveDate) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::default();

    if session.title.trim().is_empty() {
        errors.add("title", "Title is required");
    }
    if session.location.trim().is_empty() {
        errors.add("location", "Location is required");
    }
    if session.date < today {
        errors.add("date", "Date cannot be in the past");
    }
    if session.end_time <= session.start_time {
        errors.add("end_time", "End time must be after start time");
    }
    if !(SESSION_MIN_PARTICIPANTS..=SESSION_MAX_PARTICIPANTS).contains(&session.max_participants) {
        errors.add(
            "max_participants",
            format!(
                "Max participants must be between {} and {}",
                SESSION_MIN_PARTICIPANTS, SESSION_MAX_PARTICIPANTS
            ),
        );
    }

    errors.into_result()
}
