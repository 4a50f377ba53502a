//! Cross-component invalidation bus.
//!
//! Pages publish typed topics when shared data changes; other pages subscribe
//! and refetch. Each bus stands for one tab. Buses attached to the same
//! [`CrossTabChannel`] also see each other's notifications.

use crate::error::{AppError, AppResult};
use crate::reconciler::MountGuard;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Notification topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    GroupCreated,
    GroupDeleted,
    GroupMembershipChanged,
    GroupsInvalidated,
    SessionCreated,
    SessionsInvalidated,
    BuddyConnected,
    PartnersInvalidated,
    CourseEnrollmentChanged,
    CoursesInvalidated,
}

impl Topic {
    pub const ALL: [Topic; 10] = [
        Topic::GroupCreated,
        Topic::GroupDeleted,
        Topic::GroupMembershipChanged,
        Topic::GroupsInvalidated,
        Topic::SessionCreated,
        Topic::SessionsInvalidated,
        Topic::BuddyConnected,
        Topic::PartnersInvalidated,
        Topic::CourseEnrollmentChanged,
        Topic::CoursesInvalidated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::GroupCreated => "group_created",
            Topic::GroupDeleted => "group_deleted",
            Topic::GroupMembershipChanged => "group_membership_changed",
            Topic::GroupsInvalidated => "groups_invalidated",
            Topic::SessionCreated => "session_created",
            Topic::SessionsInvalidated => "sessions_invalidated",
            Topic::BuddyConnected => "buddy_connected",
            Topic::PartnersInvalidated => "partners_invalidated",
            Topic::CourseEnrollmentChanged => "course_enrollment_changed",
            Topic::CoursesInvalidated => "courses_invalidated",
        }
    }
}

/// A published event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub topic: Topic,
    pub payload: Value,
    /// Bus (tab) that published it
    pub tab_id: Uuid,
    pub sent_at: DateTime<Utc>,
}

impl Notification {
    pub fn payload_as<T: DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(AppError::from)
    }
}

/// Same-origin channel shared by several buses
#[derive(Debug, Clone)]
pub struct CrossTabChannel {
    tx: broadcast::Sender<String>,
}

impl CrossTabChannel {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }
}

/// Process-wide publish/subscribe bus for one tab
#[derive(Debug, Clone)]
pub struct EventBus {
    tab_id: Uuid,
    /// Broadcast sender for local subscribers
    tx: broadcast::Sender<Notification>,
    /// Secondary channel, JSON encoded
    bridge: Option<broadcast::Sender<String>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tab_id: Uuid::new_v4(),
            tx,
            bridge: None,
        }
    }

    /// Bus that also mirrors notifications over `channel`
    pub fn with_cross_tab(capacity: usize, channel: &CrossTabChannel) -> Self {
        let mut bus = Self::new(capacity);
        bus.bridge = Some(channel.tx.clone());
        bus
    }

    pub fn tab_id(&self) -> Uuid {
        self.tab_id
    }

    /// Fire-and-forget. Returns how many local subscribers received it.
    pub fn publish(&self, topic: Topic, payload: Value) -> usize {
        let notification = Notification {
            id: Uuid::new_v4(),
            topic,
            payload,
            tab_id: self.tab_id,
            sent_at: Utc::now(),
        };

        let delivered = match self.tx.send(notification.clone()) {
            Ok(count) => count,
            Err(_) => {
                debug!("No local subscribers for {}", topic.as_str());
                0
            }
        };

        if let Some(bridge) = &self.bridge {
            match serde_json::to_string(&notification) {
                Ok(json) => {
                    if bridge.send(json).is_err() {
                        debug!("No other tabs listening for {}", topic.as_str());
                    }
                }
                Err(e) => warn!("Failed to encode {} for other tabs: {}", topic.as_str(), e),
            }
        }

        debug!("Published {} to {} local subscribers", topic.as_str(), delivered);
        delivered
    }

    /// Publish with a serializable payload; encoding failures send `null`
    pub fn publish_event<T: Serialize>(&self, topic: Topic, payload: &T) -> usize {
        let value = serde_json::to_value(payload).unwrap_or_else(|e| {
            warn!("Failed to encode payload for {}: {}", topic.as_str(), e);
            Value::Null
        });
        self.publish(topic, value)
    }

    /// Subscribe to `topics`; an empty slice means every topic.
    /// Dropping the subscription unregisters it.
    pub fn subscribe(&self, topics: &[Topic]) -> Subscription {
        let subscription = Subscription {
            topics: topics.iter().copied().collect(),
            tab_id: self.tab_id,
            local: Some(self.tx.subscribe()),
            remote: self.bridge.as_ref().map(|bridge| bridge.subscribe()),
        };
        info!(
            "Tab {} subscribed to {} topic(s)",
            self.tab_id,
            if topics.is_empty() { Topic::ALL.len() } else { topics.len() }
        );
        subscription
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of a subscription
#[derive(Debug)]
pub struct Subscription {
    topics: HashSet<Topic>,
    tab_id: Uuid,
    local: Option<broadcast::Receiver<Notification>>,
    remote: Option<broadcast::Receiver<String>>,
}

enum Incoming {
    Local(Result<Notification, RecvError>),
    Remote(Result<String, RecvError>),
}

async fn next_from<T: Clone>(rx: &mut Option<broadcast::Receiver<T>>) -> Result<T, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl Subscription {
    fn accepts(&self, notification: &Notification) -> bool {
        self.topics.is_empty() || self.topics.contains(&notification.topic)
    }

    fn decode_remote(&self, text: &str) -> Option<Notification> {
        match serde_json::from_str::<Notification>(text) {
            // Own echoes already arrived locally
            Ok(n) if n.tab_id == self.tab_id => None,
            Ok(n) if self.accepts(&n) => Some(n),
            Ok(_) => None,
            Err(e) => {
                warn!("Dropping undecodable cross-tab message: {}", e);
                None
            }
        }
    }

    /// Next matching notification; `None` once every channel is closed
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            if self.local.is_none() && self.remote.is_none() {
                return None;
            }
            let local_open = self.local.is_some();
            let remote_open = self.remote.is_some();

            let incoming = tokio::select! {
                result = next_from(&mut self.local), if local_open => Incoming::Local(result),
                result = next_from(&mut self.remote), if remote_open => Incoming::Remote(result),
            };

            match incoming {
                Incoming::Local(Ok(n)) if self.accepts(&n) => return Some(n),
                Incoming::Local(Ok(_)) => {}
                Incoming::Local(Err(RecvError::Lagged(skipped))) => {
                    warn!("Subscriber lagged, skipped {} notifications", skipped);
                }
                Incoming::Local(Err(RecvError::Closed)) => self.local = None,
                Incoming::Remote(Ok(text)) => {
                    if let Some(n) = self.decode_remote(&text) {
                        return Some(n);
                    }
                }
                Incoming::Remote(Err(RecvError::Lagged(skipped))) => {
                    warn!("Cross-tab subscriber lagged, skipped {} messages", skipped);
                }
                Incoming::Remote(Err(RecvError::Closed)) => self.remote = None,
            }
        }
    }

    /// Non-blocking: next matching notification already queued
    pub fn try_recv(&mut self) -> Option<Notification> {
        while let Some(rx) = self.local.as_mut() {
            match rx.try_recv() {
                Ok(n) => {
                    if self.accepts(&n) {
                        return Some(n);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, skipped {} notifications", skipped);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => self.local = None,
            }
        }
        while let Some(rx) = self.remote.as_mut() {
            match rx.try_recv() {
                Ok(text) => {
                    if let Some(n) = self.decode_remote(&text) {
                        return Some(n);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Cross-tab subscriber lagged, skipped {} messages", skipped);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Closed) => self.remote = None,
            }
        }
        None
    }

    /// Drain everything queued right now
    pub fn drain(&mut self) -> Vec<Notification> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Run `handler` for each notification until the guard unmounts or the bus closes
pub fn spawn_listener<F, Fut>(
    mut subscription: Subscription,
    guard: MountGuard,
    mut handler: F,
) -> JoinHandle<()>
where
    F: FnMut(Notification) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        loop {
            let notification = tokio::select! {
                _ = guard.unmounted() => break,
                next = subscription.recv() => match next {
                    Some(notification) => notification,
                    None => break,
                },
            };
            if !guard.is_mounted() {
                break;
            }
            handler(notification).await;
        }
        debug!("Listener stopped");
    })
}
