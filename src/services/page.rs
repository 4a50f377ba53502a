use crate::banner::Banner;
use crate::error::{AppError, AppResult};
use crate::models::EntityId;
use crate::notifier::{EventBus, Topic};
use crate::reconciler::{Entity, FailurePolicy, MountGuard, Mutation, OptimisticList, Resolution};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Where the items currently on a page came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataSource {
    #[default]
    Empty,
    Server,
    /// Demo entities after a failed first load
    Fallback,
}

#[derive(Debug)]
pub struct PageState<E: Entity> {
    pub list: OptimisticList<E>,
    pub banner: Option<Banner>,
    pub source: DataSource,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl<E: Entity> Default for PageState<E> {
    fn default() -> Self {
        Self {
            list: OptimisticList::default(),
            banner: None,
            source: DataSource::Empty,
            loaded_at: None,
        }
    }
}

/// Result of a page mutation once the server answered
#[derive(Debug)]
pub struct MutationOutcome<E> {
    pub resolution: Resolution,
    /// Server-confirmed entity, when the response carried one
    pub entity: Option<E>,
    pub error: Option<AppError>,
}

impl<E> MutationOutcome<E> {
    pub fn is_committed(&self) -> bool {
        self.resolution == Resolution::Committed
    }
}

/// One mounted page: its collection, error banner and lifetime flag.
///
/// The state lock is never held while a request is in flight, so mutations
/// on different entities of the same page overlap freely.
pub struct Page<E: Entity> {
    name: &'static str,
    state: Arc<RwLock<PageState<E>>>,
    bus: EventBus,
    mount: MountGuard,
    retry_topic: Topic,
    use_fallback: bool,
}

impl<E: Entity> Page<E> {
    pub fn new(name: &'static str, bus: EventBus, retry_topic: Topic, use_fallback: bool) -> Self {
        Self {
            name,
            state: Arc::new(RwLock::new(PageState::default())),
            bus,
            mount: MountGuard::new(),
            retry_topic,
            use_fallback,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn mount_guard(&self) -> MountGuard {
        self.mount.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.mount.is_mounted()
    }

    /// Late results are ignored from now on
    pub fn unmount(&self) {
        info!("Unmounting {} page", self.name);
        self.mount.unmount();
    }

    /// First load; demo data stands in when it fails on an empty page
    pub async fn load<Fut>(&self, fetch: Fut, fallback: fn() -> Vec<E>) -> DataSource
    where
        Fut: Future<Output = AppResult<Vec<E>>>,
    {
        self.install(fetch, Some(fallback)).await
    }

    /// Reload after an invalidation; failures keep the current items
    pub async fn refetch<Fut>(&self, fetch: Fut) -> DataSource
    where
        Fut: Future<Output = AppResult<Vec<E>>>,
    {
        self.install(fetch, None).await
    }

    async fn install<Fut>(&self, fetch: Fut, fallback: Option<fn() -> Vec<E>>) -> DataSource
    where
        Fut: Future<Output = AppResult<Vec<E>>>,
    {
        let result = fetch.await;
        if !self.mount.is_mounted() {
            debug!("Dropping {} fetch result after unmount", self.name);
            return self.state.read().await.source;
        }

        let mut state = self.state.write().await;
        match result {
            Ok(items) => {
                debug!("Loaded {} {} items", items.len(), self.name);
                state.list.replace_all(items);
                state.source = DataSource::Server;
                state.banner = None;
                state.loaded_at = Some(Utc::now());
            }
            Err(err) => {
                warn!("Failed to load {}: {}", self.name, err);
                let first_load = state.source != DataSource::Server && state.list.is_empty();
                match fallback {
                    Some(fallback) if first_load && self.use_fallback => {
                        info!("Showing demo {} while the backend is unreachable", self.name);
                        state.list.replace_all(fallback());
                        state.source = DataSource::Fallback;
                    }
                    _ => {}
                }
                state.banner = Some(Banner::from_error(&err, self.retry_topic));
            }
        }
        state.source
    }

    /// Apply `mutation` now, await `request`, then reconcile under `policy`.
    ///
    /// `Err` means the mutation never started (busy or missing entity);
    /// request failures come back inside the outcome.
    pub async fn mutate<Fut>(
        &self,
        mutation: Mutation<E>,
        policy: FailurePolicy,
        request: Fut,
    ) -> AppResult<MutationOutcome<E>>
    where
        Fut: Future<Output = AppResult<Option<E>>>,
    {
        let ticket = {
            let mut state = self.state.write().await;
            state.list.begin(mutation)?
        };

        let result = request.await;

        if !self.mount.is_mounted() {
            debug!("Discarding {:?} result for {} after unmount", ticket.kind, ticket.id);
            self.state.write().await.list.abandon(&ticket);
            return Ok(MutationOutcome {
                resolution: Resolution::Discarded,
                entity: None,
                error: result.err(),
            });
        }

        let mut state = self.state.write().await;
        let resolution = state.list.settle(&ticket, &result, policy);
        let (entity, error) = match result {
            Ok(entity) => (entity, None),
            Err(err) => {
                state.banner = Some(Banner::from_error(&err, self.retry_topic));
                (None, Some(err))
            }
        };

        Ok(MutationOutcome {
            resolution,
            entity,
            error,
        })
    }

    pub async fn items(&self) -> Vec<E> {
        self.state.read().await.list.items().to_vec()
    }

    pub async fn get(&self, id: &EntityId) -> Option<E> {
        self.state.read().await.list.get(id).cloned()
    }

    /// Look up an entity that a mutation is about to target
    pub async fn require(&self, id: &EntityId) -> AppResult<E> {
        self.get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("{} {}", self.name, id)))
    }

    pub async fn is_pending(&self, id: &EntityId) -> bool {
        self.state.read().await.list.is_pending(id)
    }

    pub async fn source(&self) -> DataSource {
        self.state.read().await.source
    }

    pub async fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.loaded_at
    }

    pub async fn banner(&self) -> Option<Banner> {
        self.state.read().await.banner.clone()
    }

    pub async fn dismiss_banner(&self) {
        self.state.write().await.banner = None;
    }

    /// Retry by invalidation: the banner goes away and listeners refetch
    pub async fn retry(&self) -> usize {
        let banner = self
            .state
            .write()
            .await
            .banner
            .take()
            .unwrap_or_else(|| Banner::new(String::new(), self.retry_topic));
        banner.retry(&self.bus)
    }
}
