//! Study Buddy client core
//!
//! Page state for study groups, sessions, partners and courses, kept in step
//! with the REST backend through optimistic mutations and an invalidation bus.

pub mod auth;
pub mod banner;
pub mod config;
pub mod error;
pub mod fallback;
pub mod filter;
pub mod models;
pub mod notifier;
pub mod reconciler;
pub mod repositories;
pub mod services;
pub mod validation;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use auth::{AuthProvider, CredentialStore, FileCredentialStore};
use notifier::{spawn_listener, EventBus, Notification, Topic};
use reconciler::MountGuard;
use repositories::*;
use services::{CourseService, DataSource, GroupService, PartnerService, SessionService};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Data-access implementations behind each page
#[derive(Clone)]
pub struct Backends {
    pub groups: Arc<dyn GroupApi>,
    pub sessions: Arc<dyn SessionApi>,
    pub partners: Arc<dyn PartnerApi>,
    pub courses: Arc<dyn CourseApi>,
}

impl Backends {
    /// HTTP repositories sharing one client
    pub fn http(client: ApiClient) -> Self {
        Self {
            groups: Arc::new(GroupRepository::new(client.clone())),
            sessions: Arc::new(SessionRepository::new(client.clone())),
            partners: Arc::new(PartnerRepository::new(client.clone())),
            courses: Arc::new(CourseRepository::new(client)),
        }
    }
}

/// Where each page's items came from after `load_all`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub groups: DataSource,
    pub sessions: DataSource,
    pub partners: DataSource,
    pub courses: DataSource,
}

/// Application state containing every page service
pub struct AppState {
    pub config: AppConfig,
    pub bus: EventBus,
    pub auth: AuthProvider,
    pub groups: Arc<GroupService>,
    pub sessions: Arc<SessionService>,
    pub partners: Arc<PartnerService>,
    pub courses: Arc<CourseService>,
    mount: MountGuard,
}

impl AppState {
    /// Create AppState talking to the configured backend
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let store: Arc<dyn CredentialStore> =
            Arc::new(FileCredentialStore::new(&config.credentials_path));
        let auth = AuthProvider::new(store);
        let client = ApiClient::new(&config.api, auth.clone())?;
        let bus = EventBus::new(config.event_bus_capacity);
        Ok(Self::with_backends(config, auth, bus, Backends::http(client)))
    }

    pub fn with_backends(config: AppConfig, auth: AuthProvider, bus: EventBus, backends: Backends) -> Self {
        let fallback = config.use_demo_fallback;
        Self {
            groups: Arc::new(GroupService::new(backends.groups, auth.clone(), bus.clone(), fallback)),
            sessions: Arc::new(SessionService::new(backends.sessions, auth.clone(), bus.clone(), fallback)),
            partners: Arc::new(PartnerService::new(backends.partners, bus.clone(), fallback)),
            courses: Arc::new(CourseService::new(backends.courses, bus.clone(), fallback)),
            config,
            bus,
            auth,
            mount: MountGuard::new(),
        }
    }

    /// Initial load of every page, concurrently
    pub async fn load_all(&self) -> LoadSummary {
        let (groups, sessions, partners, courses) = futures::join!(
            self.groups.load(),
            self.sessions.load(),
            self.partners.load(),
            self.courses.load()
        );
        info!(
            "Pages loaded: groups={:?}, sessions={:?}, partners={:?}, courses={:?}",
            groups, sessions, partners, courses
        );
        LoadSummary {
            groups,
            sessions,
            partners,
            courses,
        }
    }

    /// Refetch every page the notification's topic invalidates.
    /// Returns the names of the pages that refetched.
    pub async fn handle_notification(&self, notification: &Notification) -> Vec<&'static str> {
        let topic = notification.topic;
        let hit = |topics: &[Topic]| topics.contains(&topic);
        debug!("Routing {} notification {}", topic.as_str(), notification.id);

        let (groups, sessions, partners, courses) = futures::join!(
            async {
                if hit(GroupService::INVALIDATED_BY) {
                    self.groups.refetch().await;
                    Some(self.groups.page().name())
                } else {
                    None
                }
            },
            async {
                if hit(SessionService::INVALIDATED_BY) {
                    self.sessions.refetch().await;
                    Some(self.sessions.page().name())
                } else {
                    None
                }
            },
            async {
                if hit(PartnerService::INVALIDATED_BY) {
                    self.partners.refetch().await;
                    Some(self.partners.page().name())
                } else {
                    None
                }
            },
            async {
                if hit(CourseService::INVALIDATED_BY) {
                    self.courses.refetch().await;
                    Some(self.courses.page().name())
                } else {
                    None
                }
            }
        );
        [groups, sessions, partners, courses].into_iter().flatten().collect()
    }

    /// Background task that refetches pages as invalidations arrive
    pub fn spawn_invalidation_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let subscription = self.bus.subscribe(&[]);
        let state = Arc::clone(self);
        spawn_listener(subscription, self.mount.clone(), move |notification| {
            let state = Arc::clone(&state);
            async move {
                let refetched = state.handle_notification(&notification).await;
                debug!("{} refetched {:?}", notification.topic.as_str(), refetched);
            }
        })
    }

    /// Unmount every page; in-flight results are dropped
    pub fn shutdown(&self) {
        self.mount.unmount();
        self.groups.page().unmount();
        self.sessions.page().unmount();
        self.partners.page().unmount();
        self.courses.page().unmount();
    }
}
