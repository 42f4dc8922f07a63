//! # Topic Configuration
//!
//! The topic -> subscriber mapping consumed by the engine. It is loaded and
//! reloaded outside the engine; requests read it through
//! [`TopicConfigSource::snapshot`] and keep that snapshot for their whole
//! duration.
//!
//! ## Subscriber Entries
//!
//! ```json
//! "orders": [
//!   "https://localhost:7071/api/orders",
//!   "pull://orders-queue",
//!   { "endpoint": "https://localhost:7071/api/paid",
//!     "filter": { "includedEventTypes": ["Order.Paid"] } }
//! ]
//! ```
//!
//! An endpoint using the `pull://` scheme names a pull subscription; anything
//! else is a push webhook URL.

use crate::filter::EventFilter;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Scheme marking a subscriber entry as a pull subscription.
pub const PULL_SCHEME: &str = "pull://";

/// One configured subscriber of a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubscriberEntry {
    /// Bare endpoint, no filter.
    Endpoint(String),
    /// Endpoint with an optional filter.
    Detailed {
        endpoint: String,
        #[serde(default)]
        filter: Option<EventFilter>,
    },
}

/// How a subscriber receives its events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberKind<'a> {
    /// Webhook URL the engine POSTs to.
    Push(&'a str),
    /// Name of a pull subscription backed by a queue.
    Pull(&'a str),
}

impl SubscriberEntry {
    /// A push subscriber without filter.
    pub fn push(url: impl Into<String>) -> Self {
        SubscriberEntry::Endpoint(url.into())
    }

    /// A pull subscriber without filter.
    pub fn pull(name: &str) -> Self {
        SubscriberEntry::Endpoint(format!("{PULL_SCHEME}{name}"))
    }

    /// Attach a filter to this entry.
    #[must_use]
    pub fn with_filter(self, filter: EventFilter) -> Self {
        SubscriberEntry::Detailed {
            endpoint: self.endpoint().to_string(),
            filter: Some(filter),
        }
    }

    /// The raw configured endpoint.
    pub fn endpoint(&self) -> &str {
        match self {
            SubscriberEntry::Endpoint(endpoint) => endpoint,
            SubscriberEntry::Detailed { endpoint, .. } => endpoint,
        }
    }

    /// The filter, `None` meaning no filtering.
    pub fn filter(&self) -> Option<&EventFilter> {
        match self {
            SubscriberEntry::Endpoint(_) => None,
            SubscriberEntry::Detailed { filter, .. } => filter.as_ref(),
        }
    }

    /// Classify the entry as push or pull.
    pub fn kind(&self) -> SubscriberKind<'_> {
        let endpoint = self.endpoint();
        match endpoint.strip_prefix(PULL_SCHEME) {
            Some(name) => SubscriberKind::Pull(name),
            None => SubscriberKind::Push(endpoint),
        }
    }
}

/// Subscribers that disappeared between two configuration snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicsDiff {
    /// (topic, endpoint) push subscribers removed or whose filter changed.
    pub revoked_push: Vec<(String, String)>,
    /// (topic, subscription) pull subscriptions removed.
    pub removed_pull: Vec<(String, String)>,
}

impl TopicsDiff {
    pub fn is_empty(&self) -> bool {
        self.revoked_push.is_empty() && self.removed_pull.is_empty()
    }
}

/// Immutable snapshot of the topic -> subscribers mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicsConfig {
    topics: BTreeMap<String, Vec<SubscriberEntry>>,
}

impl TopicsConfig {
    /// Builder-style helper, mostly for tests and embedding.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>, subscribers: Vec<SubscriberEntry>) -> Self {
        self.topics.insert(topic.into(), subscribers);
        self
    }

    pub fn contains_topic(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    pub fn topic_names(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    /// All subscribers of a topic, `None` for an unconfigured topic.
    pub fn subscribers(&self, topic: &str) -> Option<&[SubscriberEntry]> {
        self.topics.get(topic).map(Vec::as_slice)
    }

    /// Push endpoints of a topic with their filters.
    pub fn push_subscribers<'a>(
        &'a self,
        topic: &str,
    ) -> impl Iterator<Item = (&'a str, Option<&'a EventFilter>)> + 'a {
        self.subscribers(topic)
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| match entry.kind() {
                SubscriberKind::Push(url) => Some((url, entry.filter())),
                SubscriberKind::Pull(_) => None,
            })
    }

    /// Pull subscription names of a topic with their filters.
    pub fn pull_subscriptions<'a>(
        &'a self,
        topic: &str,
    ) -> impl Iterator<Item = (&'a str, Option<&'a EventFilter>)> + 'a {
        self.subscribers(topic)
            .unwrap_or_default()
            .iter()
            .filter_map(|entry| match entry.kind() {
                SubscriberKind::Pull(name) => Some((name, entry.filter())),
                SubscriberKind::Push(_) => None,
            })
    }

    /// Check that `subscription` is configured as a pull subscription of `topic`.
    pub fn has_pull_subscription(&self, topic: &str, subscription: &str) -> bool {
        self.pull_subscriptions(topic).any(|(name, _)| name == subscription)
    }

    /// Compute what a switch from `self` to `newer` takes away.
    pub fn diff(&self, newer: &TopicsConfig) -> TopicsDiff {
        let mut diff = TopicsDiff::default();

        for (topic, entries) in &self.topics {
            let newer_entries = newer.subscribers(topic).unwrap_or_default();

            for entry in entries {
                match entry.kind() {
                    SubscriberKind::Push(url) => {
                        // Same endpoint with a new filter counts as a replacement.
                        let kept = newer_entries
                            .iter()
                            .any(|e| e.endpoint() == url && e.filter() == entry.filter());
                        if !kept {
                            diff.revoked_push.push((topic.clone(), url.to_string()));
                        }
                    }
                    SubscriberKind::Pull(name) => {
                        if !newer.has_pull_subscription(topic, name) {
                            diff.removed_pull.push((topic.clone(), name.to_string()));
                        }
                    }
                }
            }
        }

        diff.revoked_push.dedup();
        diff.removed_pull.dedup();
        diff
    }
}

/// Read access to the current configuration snapshot.
pub trait TopicConfigSource: Send + Sync {
    /// The snapshot a request works against from start to finish.
    fn snapshot(&self) -> Arc<TopicsConfig>;
}

impl TopicConfigSource for Arc<TopicsConfig> {
    fn snapshot(&self) -> Arc<TopicsConfig> {
        Arc::clone(self)
    }
}

/// Hot-swappable configuration holder.
///
/// Readers clone the inner `Arc` under a short read lock; a reload swaps the
/// whole snapshot, so a request never sees a half-applied change.
#[derive(Debug, Default)]
pub struct SharedTopics {
    current: RwLock<Arc<TopicsConfig>>,
}

impl SharedTopics {
    pub fn new(config: TopicsConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Install a new snapshot and return the previous one.
    pub fn replace(&self, config: TopicsConfig) -> Arc<TopicsConfig> {
        let next = Arc::new(config);
        let previous = std::mem::replace(&mut *self.current.write(), next);
        debug!(topics = previous.topic_count(), "Replaced topic configuration snapshot");
        previous
    }
}

impl TopicConfigSource for SharedTopics {
    fn snapshot(&self) -> Arc<TopicsConfig> {
        Arc::clone(&self.current.read())
    }
}
