//! Domain models for the Study Buddy client.
//!
//! Each entity has a canonical shape used by the rest of the crate and a
//! `*Payload` wire shape that accepts the field spellings the backend emits.
//! Conversion from payload to entity fails fast on missing identity.

pub mod course;
pub mod group;
pub mod group_member;
pub mod partner;
pub mod session;
pub mod user;

// Re-export all models for convenient access
pub use course::{Course, CoursePayload};
pub use group::{Group, GroupKind, GroupPayload, NewGroup, Visibility};
pub use group_member::{GroupMember, MemberEntry, MemberRef, MemberRole};
pub use partner::{ConnectionStatus, Partner, PartnerPayload, StudyPreferences};
pub use session::{NewSession, Session, SessionPayload, SessionStatus};
pub use user::CurrentUser;

use crate::error::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

const PROVISIONAL_PREFIX: &str = "tmp-";

/// Identity of any entity. Server ids may be strings or integers on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Client-generated id for a placeholder awaiting server confirmation
    pub fn provisional() -> Self {
        Self(format!("{}{}", PROVISIONAL_PREFIX, Uuid::new_v4()))
    }

    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Str(String),
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawId::deserialize(deserializer)? {
            RawId::Int(n) => Ok(EntityId::from(n)),
            RawId::Str(s) if s.trim().is_empty() => {
                Err(serde::de::Error::custom("entity id must not be empty"))
            }
            RawId::Str(s) => Ok(EntityId(s)),
        }
    }
}

/// A JSON object whose fields may arrive under several spellings.
///
/// Payloads read each field through [`WireFields::take`] with every spelling
/// the backend uses, so an object carrying both `id` and `group_id` decodes
/// instead of failing as a duplicate field. The first non-null spelling wins.
#[derive(Debug, Default)]
pub struct WireFields(Map<String, Value>);

impl<'de> Deserialize<'de> for WireFields {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Map::deserialize(deserializer).map(WireFields)
    }
}

impl WireFields {
    pub fn take<T: DeserializeOwned>(&mut self, keys: &[&str]) -> Result<Option<T>, serde_json::Error> {
        for key in keys {
            match self.0.remove(*key) {
                None | Some(Value::Null) => continue,
                Some(value) => {
                    return serde_json::from_value(value).map(Some).map_err(|e| {
                        <serde_json::Error as serde::de::Error>::custom(format!("`{}`: {}", key, e))
                    })
                }
            }
        }
        Ok(None)
    }
}

/// Require a field that the canonical shape cannot do without
pub(crate) fn required<T>(value: Option<T>, entity: &str, field: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::MalformedPayload(format!("{} is missing `{}`", entity, field)))
}

/// Require a non-blank string field
pub(crate) fn required_text(value: Option<String>, entity: &str, field: &str) -> AppResult<String> {
    let text = required(value, entity, field)?;
    if text.trim().is_empty() {
        return Err(AppError::MalformedPayload(format!(
            "{} has an empty `{}`",
            entity, field
        )));
    }
    Ok(text)
}
