use crate::error::{AppError, AppResult};
use crate::models::{CurrentUser, EntityId};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Stored login result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(alias = "accessToken", alias = "token")]
    pub access_token: String,
    #[serde(default, alias = "tokenType")]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<CurrentUser>,
}

impl Credentials {
    pub fn bearer(token: impl Into<String>, user: Option<CurrentUser>) -> Self {
        Self {
            access_token: token.into(),
            token_type: Some("Bearer".to_string()),
            user,
        }
    }
}

/// Where credentials live between runs
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> AppResult<Option<Credentials>>;
    fn save(&self, credentials: &Credentials) -> AppResult<()>;
    fn clear(&self) -> AppResult<()>;
}

/// In-process store, used by tests and guest sessions
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Option<Credentials>>,
}

impl MemoryCredentialStore {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            inner: RwLock::new(credentials),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> AppResult<Option<Credentials>> {
        self.inner
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| AppError::Message("credential store poisoned".into()))
    }

    fn save(&self, credentials: &Credentials) -> AppResult<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| AppError::Message("credential store poisoned".into()))?;
        *guard = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| AppError::Message("credential store poisoned".into()))?;
        *guard = None;
        Ok(())
    }
}

/// JSON file on disk
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> AppResult<Option<Credentials>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No credentials at {}", self.path.display());
                Ok(None)
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }

    fn save(&self, credentials: &Credentials) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(credentials)?)?;
        Ok(())
    }

    fn clear(&self) -> AppResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

/// Builds request headers from stored credentials
#[derive(Clone)]
pub struct AuthProvider {
    store: Arc<dyn CredentialStore>,
}

impl AuthProvider {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// `Authorization: Bearer <token>`, or an empty map when signed out
    pub fn headers(&self) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let Some(credentials) = self.store.load()? else {
            return Ok(headers);
        };
        if credentials.access_token.trim().is_empty() {
            warn!("Stored access token is empty; sending request unauthenticated");
            return Ok(headers);
        }
        let scheme = credentials.token_type.as_deref().unwrap_or("Bearer");
        let value = HeaderValue::from_str(&format!("{} {}", scheme, credentials.access_token))
            .map_err(|e| AppError::Unauthorized(format!("Invalid access token: {}", e)))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// Signed-in user, or guest
    pub fn current_user(&self) -> CurrentUser {
        match self.store.load() {
            Ok(Some(Credentials { user: Some(user), .. })) => user,
            Ok(_) => CurrentUser::guest(),
            Err(e) => {
                warn!("Failed to read credentials: {}", e);
                CurrentUser::guest()
            }
        }
    }

    /// Viewer id used when normalizing payloads
    pub fn viewer_id(&self) -> Option<EntityId> {
        match self.store.load() {
            Ok(Some(credentials)) => credentials.user.map(|u| u.id),
            _ => None,
        }
    }
}
