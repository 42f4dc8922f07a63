//! # Push Dispatcher
//!
//! Fans a published batch out to every push subscriber of a topic. One task
//! per subscriber, tracked so shutdown can cancel and drain them.
//!
//! ```text
//! dispatch(topic, events, snapshot)
//!     │
//!     ├── subscriber A (no filter)      ──► filter ──► [E1, E2] ──► spawn
//!     ├── subscriber B (types: ["A"])   ──► filter ──► [E1]     ──► spawn
//!     └── subscriber C (types: ["Z"])   ──► filter ──► []       ──► skip
//! ```
//!
//! Each task captures its subscriber's signal from the
//! [`CancellationRegistry`] before it starts, so a revoke issued later still
//! reaches it.

use crate::client::{DeliveryRequest, SendError, SubscriberClient};
use crate::stats::{PushStats, PushStatsSnapshot};
use bytes::Bytes;
use shared_bus::CancellationRegistry;
use shared_types::{filter_events, CloudEvent, TopicsConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Starts and tracks push deliveries.
pub struct PushDispatcher {
    client: Arc<dyn SubscriberClient>,
    registry: Arc<CancellationRegistry>,
    tracker: TaskTracker,
    stats: Arc<PushStats>,
}

impl PushDispatcher {
    pub fn new(client: Arc<dyn SubscriberClient>, registry: Arc<CancellationRegistry>) -> Self {
        Self {
            client,
            registry,
            tracker: TaskTracker::new(),
            stats: Arc::new(PushStats::default()),
        }
    }

    pub fn registry(&self) -> &Arc<CancellationRegistry> {
        &self.registry
    }

    /// Start one delivery per push subscriber with a non-empty filtered
    /// batch. Returns without waiting; the result is the number of tasks
    /// started.
    pub fn dispatch(&self, topic: &str, events: &[CloudEvent], config: &TopicsConfig) -> usize {
        let mut started = 0;

        for (endpoint, filter) in config.push_subscribers(topic) {
            let batch = filter_events(events, filter);
            if batch.is_empty() {
                debug!(topic = topic, subscriber = endpoint, "No events pass filter, skipping");
                continue;
            }

            let body = match serde_json::to_vec(&batch) {
                Ok(body) => Bytes::from(body),
                Err(e) => {
                    error!(topic = topic, subscriber = endpoint, error = %e, "Failed to serialize push batch");
                    continue;
                }
            };

            let request = DeliveryRequest {
                topic: topic.to_string(),
                endpoint: endpoint.to_string(),
                body,
                event_count: batch.len(),
            };
            let cancel = self.registry.get(topic, endpoint);
            self.spawn_delivery(request, cancel);
            started += 1;
        }

        started
    }

    fn spawn_delivery(&self, request: DeliveryRequest, cancel: CancellationToken) {
        let client = Arc::clone(&self.client);
        let stats = Arc::clone(&self.stats);
        PushStats::bump(&stats.dispatched);

        self.tracker.spawn(async move {
            match client.send(&request, &cancel).await {
                Ok(response) => {
                    PushStats::bump(&stats.succeeded);
                    debug!(
                        topic = %request.topic,
                        subscriber = %request.endpoint,
                        status = response.status,
                        attempts = response.attempts,
                        "Push delivery completed"
                    );
                }
                Err(SendError::Cancelled) if cancel.is_cancelled() => {
                    PushStats::bump(&stats.cancelled);
                    info!(
                        topic = %request.topic,
                        subscriber = %request.endpoint,
                        "Push request was intentionally cancelled"
                    );
                }
                Err(SendError::RetriesExhausted { .. }) => {
                    // Already logged by the client.
                    PushStats::bump(&stats.exhausted);
                }
                Err(e) => {
                    PushStats::bump(&stats.failed);
                    error!(
                        topic = %request.topic,
                        subscriber = %request.endpoint,
                        error = %e,
                        "Push delivery failed"
                    );
                }
            }
        });
    }

    /// Deliveries still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn stats(&self) -> PushStatsSnapshot {
        self.stats.snapshot(self.in_flight())
    }

    /// Cancel every delivery and wait up to `grace` for them to finish.
    ///
    /// Returns `true` if all deliveries drained in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.registry.revoke_all();
        self.tracker.close();

        let pending = self.tracker.len();
        info!(pending = pending, "Draining push deliveries");

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            info!("Push deliveries drained");
            true
        } else {
            warn!(
                remaining = self.tracker.len(),
                grace_ms = grace.as_millis() as u64,
                "Push deliveries did not drain within grace period"
            );
            false
        }
    }
}
