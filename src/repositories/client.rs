use crate::auth::AuthProvider;
use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};
use crate::models::EntityId;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// List bodies arrive bare or wrapped in an object
#[derive(Deserialize)]
#[serde(untagged)]
enum ListEnvelope<P> {
    Bare(Vec<P>),
    Wrapped {
        #[serde(
            alias = "items",
            alias = "results",
            alias = "groups",
            alias = "sessions",
            alias = "partners",
            alias = "suggestions",
            alias = "buddies",
            alias = "courses"
        )]
        data: Vec<P>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemEnvelope<P> {
    Wrapped {
        #[serde(alias = "item", alias = "result")]
        data: P,
    },
    Bare(P),
}

/// Decode a list response body
pub fn decode_list<P: DeserializeOwned>(body: &[u8]) -> AppResult<Vec<P>> {
    match serde_json::from_slice::<ListEnvelope<P>>(body) {
        Ok(ListEnvelope::Bare(items)) | Ok(ListEnvelope::Wrapped { data: items }) => Ok(items),
        Err(e) => Err(AppError::MalformedPayload(format!(
            "expected a list response: {}",
            e
        ))),
    }
}

/// Decode a single-entity response body
pub fn decode_item<P: DeserializeOwned>(body: &[u8]) -> AppResult<P> {
    match serde_json::from_slice::<ItemEnvelope<P>>(body) {
        Ok(ItemEnvelope::Wrapped { data }) | Ok(ItemEnvelope::Bare(data)) => Ok(data),
        Err(e) => Err(AppError::MalformedPayload(format!(
            "expected an entity response: {}",
            e
        ))),
    }
}

/// Entity carried by the success body of a mutation endpoint, if any.
///
/// The server has already applied the change, so a body that is not a
/// well-formed entity (`{"message": "Joined group"}`, plain text) is a bare
/// acknowledgement and the optimistic state stands.
pub fn acknowledged<P, E>(body: &[u8], normalize: impl FnOnce(P) -> AppResult<E>) -> Option<E>
where
    P: DeserializeOwned,
{
    match decode_item::<P>(body).and_then(normalize) {
        Ok(entity) => Some(entity),
        Err(e) => {
            debug!("Treating mutation response as a bare acknowledgement: {}", e);
            None
        }
    }
}

/// Human-readable message from an error body
pub fn error_message(status: StatusCode, body: &[u8]) -> String {
    let from_json = serde_json::from_slice::<Value>(body).ok().and_then(|value| {
        ["message", "detail", "error"].iter().find_map(|key| match value.get(*key) {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
    });
    from_json.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    })
}

/// HTTP client bound to the REST backend
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    auth: AuthProvider,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, auth: AuthProvider) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn auth(&self) -> &AuthProvider {
        &self.auth
    }

    /// Id of the signed-in user, if any
    pub fn viewer(&self) -> Option<EntityId> {
        self.auth.viewer_id()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send with auth headers. `None` for an empty success body.
    async fn send(&self, request: RequestBuilder, label: &str) -> AppResult<Option<Vec<u8>>> {
        let headers = self.auth.headers()?;
        let response = request.headers(headers).send().await.map_err(|e| {
            warn!("{} failed before a response: {}", label, e);
            AppError::from(e)
        })?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!("{} -> {} ({} bytes)", label, status, body.len());

        if !status.is_success() {
            return Err(AppError::Http {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            Ok(None)
        } else {
            Ok(Some(body.to_vec()))
        }
    }

    pub async fn get_list<P: DeserializeOwned>(&self, path: &str) -> AppResult<Vec<P>> {
        let label = format!("GET {}", path);
        match self.send(self.http.get(self.url(path)), &label).await? {
            Some(body) => decode_list(&body),
            None => Ok(Vec::new()),
        }
    }

    /// POST with an optional JSON body; `None` when the server sent nothing back
    pub async fn post<B: Serialize + ?Sized, P: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> AppResult<Option<P>> {
        let label = format!("POST {}", path);
        let mut request = self.http.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        match self.send(request, &label).await? {
            Some(bytes) => decode_item(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// POST to a mutation endpoint; the raw success body, if any
    pub async fn post_action(&self, path: &str) -> AppResult<Option<Vec<u8>>> {
        let label = format!("POST {}", path);
        self.send(self.http.post(self.url(path)), &label).await
    }

    /// DELETE on a mutation endpoint; the raw success body, if any
    pub async fn delete_action(&self, path: &str) -> AppResult<Option<Vec<u8>>> {
        let label = format!("DELETE {}", path);
        self.send(self.http.delete(self.url(path)), &label).await
    }

    /// DELETE where the body is ignored
    pub async fn delete_discard(&self, path: &str) -> AppResult<()> {
        let label = format!("DELETE {}", path);
        self.send(self.http.delete(self.url(path)), &label).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use crate::models::{Group, GroupPayload};
    use std::sync::Arc;

    #[test]
    fn test_decode_bare_and_wrapped_lists() {
        let bare: Vec<GroupPayload> = decode_list(br#"[{"id": 1, "name": "A"}]"#).unwrap();
        let wrapped: Vec<GroupPayload> =
            decode_list(br#"{"groups": [{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]}"#).unwrap();
        assert_eq!(bare.len(), 1);
        assert_eq!(wrapped.len(), 2);
    }

    #[test]
    fn test_decode_list_rejects_objects() {
        let result: AppResult<Vec<GroupPayload>> = decode_list(br#"{"unexpected": true}"#);
        assert!(matches!(result, Err(AppError::MalformedPayload(_))));
    }

    #[test]
    fn test_decode_item_wrapped() {
        let item: GroupPayload = decode_item(br#"{"data": {"id": "g1", "name": "A"}}"#).unwrap();
        assert_eq!(item.name.as_deref(), Some("A"));
        let bare: GroupPayload = decode_item(br#"{"id": "g1", "group_name": "B"}"#).unwrap();
        assert_eq!(bare.name.as_deref(), Some("B"));
    }

    #[test]
    fn test_acknowledgement_without_entity() {
        let viewer = EntityId::new("u1");
        let normalize = |p: GroupPayload| Group::from_payload(p, Some(&viewer));

        assert!(acknowledged(br#"{"message": "Joined group"}"#, normalize).is_none());
        assert!(acknowledged(b"OK", normalize).is_none());

        let group = acknowledged(
            br#"{"data": {"id": "g1", "name": "Calculus Crew", "creator_id": "u2", "member_count": 4}}"#,
            normalize,
        )
        .unwrap();
        assert_eq!(group.member_count, 4);
        assert!(!group.is_owner);
    }

    #[test]
    fn test_error_message_sources() {
        assert_eq!(
            error_message(StatusCode::CONFLICT, br#"{"detail": "Already a member"}"#),
            "Already a member"
        );
        assert_eq!(error_message(StatusCode::NOT_FOUND, b"<html>"), "Not Found");
    }

    #[test]
    fn test_url_joining() {
        let config = ApiConfig {
            base_url: "http://localhost:8000/api/v1/".to_string(),
            ..ApiConfig::default()
        };
        let auth = AuthProvider::new(Arc::new(MemoryCredentialStore::default()));
        let client = ApiClient::new(&config, auth).unwrap();
        assert_eq!(client.url("/groups"), "http://localhost:8000/api/v1/groups");
    }
}
