//! # Topic Subscription Store
//!
//! Maps (topic, pull subscription) to its [`PullQueue`]. Push subscriptions
//! are resolved straight from configuration and never appear here.

use crate::pull_queue::PullQueue;
use dashmap::DashMap;
use shared_types::CloudEvent;
use std::sync::Arc;
use tracing::{debug, info};

/// Pull queues of every topic, created on first use.
#[derive(Debug, Default)]
pub struct TopicSubscriptions {
    queues: DashMap<(String, String), Arc<PullQueue>>,
}

impl TopicSubscriptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the queue of a subscription, creating it if needed.
    pub fn queue(&self, topic: &str, subscription: &str) -> Arc<PullQueue> {
        let queue = self
            .queues
            .entry((topic.to_string(), subscription.to_string()))
            .or_insert_with(|| {
                debug!(topic = topic, subscription = subscription, "Created pull queue");
                Arc::new(PullQueue::new())
            });
        Arc::clone(queue.value())
    }

    /// Get the queue of a subscription without creating it.
    pub fn existing_queue(&self, topic: &str, subscription: &str) -> Option<Arc<PullQueue>> {
        self.queues
            .get(&(topic.to_string(), subscription.to_string()))
            .map(|queue| Arc::clone(queue.value()))
    }

    /// Append an event to a subscription's queue.
    pub fn enqueue(&self, topic: &str, subscription: &str, event: Arc<CloudEvent>) {
        self.queue(topic, subscription).enqueue(event);
    }

    /// Delete the event locked under `token`; `false` if the queue or the
    /// lock does not exist.
    pub fn try_delete(&self, topic: &str, subscription: &str, token: &str) -> bool {
        self.existing_queue(topic, subscription)
            .is_some_and(|queue| queue.try_delete(token))
    }

    /// Release the event locked under `token`; `false` if the queue or the
    /// lock does not exist.
    pub fn try_release(&self, topic: &str, subscription: &str, token: &str) -> bool {
        self.existing_queue(topic, subscription)
            .is_some_and(|queue| queue.try_release(token))
    }

    /// Drop a subscription's queue and everything still in it.
    ///
    /// Receivers already waiting on the queue keep their handle and simply
    /// time out.
    pub fn remove(&self, topic: &str, subscription: &str) -> bool {
        let removed = self
            .queues
            .remove(&(topic.to_string(), subscription.to_string()));
        if let Some((_, queue)) = &removed {
            info!(
                topic = topic,
                subscription = subscription,
                discarded = queue.available_len() + queue.locked_len(),
                "Removed pull queue"
            );
        }
        removed.is_some()
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }
}
