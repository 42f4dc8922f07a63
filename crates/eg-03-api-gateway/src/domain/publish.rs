//! # Publish Pipeline
//!
//! ```text
//! body ──► snapshot has topic? ──no──► Ok (nothing happens)
//!               │ yes
//!               ▼
//!         deserialize ──err──► FormatError (nothing happens)
//!               │
//!               ▼
//!         default source
//!               │
//!       ┌───────┴────────┐
//!       ▼                ▼
//!  push dispatch     pull enqueue
//!  (per endpoint,    (per subscription,
//!   filtered)         filtered)
//! ```
//!
//! Returns as soon as deliveries are started; it never waits on a
//! subscriber.

use eg_01_push_delivery::PushDispatcher;
use shared_bus::TopicSubscriptions;
use shared_types::{apply_defaults, deserialize_events, CloudEvent, FormatError, TopicsConfig};
use std::sync::Arc;
use tracing::debug;

/// What a publish set in motion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub events: usize,
    pub push_deliveries: usize,
    pub pull_enqueued: usize,
}

/// Routes published events to push and pull subscribers.
pub struct PublishService {
    dispatcher: Arc<PushDispatcher>,
    subscriptions: Arc<TopicSubscriptions>,
}

impl PublishService {
    pub fn new(dispatcher: Arc<PushDispatcher>, subscriptions: Arc<TopicSubscriptions>) -> Self {
        Self {
            dispatcher,
            subscriptions,
        }
    }

    /// Publish a raw request body to `topic` under one config snapshot.
    ///
    /// # Errors
    ///
    /// [`FormatError`] when the body is not an event or array of events.
    /// Nothing is dispatched or enqueued in that case.
    pub fn publish(
        &self,
        topic: &str,
        body: &[u8],
        config: &TopicsConfig,
    ) -> Result<PublishOutcome, FormatError> {
        if !config.contains_topic(topic) {
            debug!(topic = topic, "Publish to unconfigured topic ignored");
            return Ok(PublishOutcome::default());
        }

        let mut events = deserialize_events(body)?;
        apply_defaults(&mut events, topic);

        let push_deliveries = self.dispatcher.dispatch(topic, &events, config);
        let pull_enqueued = self.enqueue_pull(topic, events.iter(), config);

        debug!(
            topic = topic,
            events = events.len(),
            push_deliveries = push_deliveries,
            pull_enqueued = pull_enqueued,
            "Published events"
        );

        Ok(PublishOutcome {
            events: events.len(),
            push_deliveries,
            pull_enqueued,
        })
    }

    fn enqueue_pull<'a>(
        &self,
        topic: &str,
        events: impl Iterator<Item = &'a CloudEvent>,
        config: &TopicsConfig,
    ) -> usize {
        let shared: Vec<Arc<CloudEvent>> = events.cloned().map(Arc::new).collect();
        let mut enqueued = 0;

        for (subscription, filter) in config.pull_subscriptions(topic) {
            let queue = self.subscriptions.queue(topic, subscription);
            for event in &shared {
                if filter.map_or(true, |f| f.matches(event)) {
                    queue.enqueue(Arc::clone(event));
                    enqueued += 1;
                }
            }
        }

        enqueued
    }
}
