use crate::error::AppError;
use crate::notifier::{EventBus, Topic};
use serde_json::json;
use tracing::info;

/// Dismissible error banner shown above a page's list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub message: String,
    /// Invalidation re-published by the retry action
    pub retry_topic: Topic,
}

impl Banner {
    pub fn new(message: impl Into<String>, retry_topic: Topic) -> Self {
        Self {
            message: message.into(),
            retry_topic,
        }
    }

    pub fn from_error(err: &AppError, retry_topic: Topic) -> Self {
        Self::new(err.user_message(), retry_topic)
    }

    /// Re-publish the invalidation rather than replaying the failed request
    pub fn retry(&self, bus: &EventBus) -> usize {
        info!("Retry requested, publishing {}", self.retry_topic.as_str());
        bus.publish(self.retry_topic, json!({ "reason": "retry" }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_publishes_invalidation() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe(&[Topic::SessionsInvalidated]);
        let banner = Banner::from_error(&AppError::Timeout, Topic::SessionsInvalidated);
        assert!(banner.message.contains("Could not reach the server"));
        assert_eq!(banner.retry(&bus), 1);
        assert_eq!(sub.try_recv().unwrap().payload["reason"], "retry");
    }
}
