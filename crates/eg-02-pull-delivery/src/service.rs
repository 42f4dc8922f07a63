//! # Pull Delivery Service
//!
//! Long-poll receive and per-token settlement on top of
//! [`TopicSubscriptions`].
//!
//! ## Receive deadlines
//!
//! ```text
//!  caller cancel ─────────────────────────────┐
//!                                             ▼
//!  now ──── wait for Available / expiry ──── min(external, now + max_wait)
//!                 │                                   │
//!                 ▼                                   ▼
//!           Ok(one event)                      Ok(empty) or Err(Cancelled)
//! ```
//!
//! An internal timeout is a successful empty result. Only the caller's own
//! cancellation produces [`ReceiveError::Cancelled`].

use crate::wire::{FailedLockToken, LockTokensRequest, LockTokensResult, ReceiveResults};
use shared_bus::{deadline_after, TopicSubscriptions, DEFAULT_LOCK_DURATION_SECS};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default internal cap on one receive.
pub const DEFAULT_MAX_WAIT_SECS: u64 = 50;

/// Errors from [`PullDeliveryService::receive`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    /// The caller's cancellation fired before an event became available.
    #[error("receive cancelled by caller")]
    Cancelled,
}

/// Timing knobs of pull delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSettings {
    pub lock_duration: Duration,
    pub max_wait: Duration,
}

impl Default for PullSettings {
    fn default() -> Self {
        Self {
            lock_duration: Duration::from_secs(DEFAULT_LOCK_DURATION_SECS),
            max_wait: Duration::from_secs(DEFAULT_MAX_WAIT_SECS),
        }
    }
}

/// Which queue operation a settlement applies per token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Delete,
    Release,
}

/// Pull delivery entry points.
pub struct PullDeliveryService {
    store: Arc<TopicSubscriptions>,
    settings: PullSettings,
}

impl PullDeliveryService {
    pub fn new(store: Arc<TopicSubscriptions>, settings: PullSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &Arc<TopicSubscriptions> {
        &self.store
    }

    pub fn settings(&self) -> &PullSettings {
        &self.settings
    }

    /// Lock the oldest available event, waiting up to the internal cap.
    ///
    /// # Errors
    ///
    /// [`ReceiveError::Cancelled`] if `cancel` fires first.
    pub async fn receive(
        &self,
        topic: &str,
        subscription: &str,
        cancel: &CancellationToken,
    ) -> Result<ReceiveResults, ReceiveError> {
        let queue = self.store.queue(topic, subscription);
        let deadline = deadline_after(Instant::now(), self.settings.max_wait);

        let delivery = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ReceiveError::Cancelled),
            delivery = queue.lock_next_until(self.settings.lock_duration, deadline) => delivery,
        };

        let Some(delivery) = delivery else {
            debug!(topic = topic, subscription = subscription, "Receive timed out with no event");
            return Ok(ReceiveResults::empty());
        };

        info!(
            topic = topic,
            subscription = subscription,
            lock_token = %delivery.lock_token,
            delivery_count = delivery.delivery_count,
            payload = %serde_json::to_string(&*delivery.event).unwrap_or_default(),
            "Event pulled"
        );
        Ok(ReceiveResults::from(delivery))
    }

    /// Permanently remove the events locked under the given tokens.
    pub fn acknowledge(&self, topic: &str, subscription: &str, request: &LockTokensRequest) -> LockTokensResult {
        self.settle(topic, subscription, request, Settlement::Delete)
    }

    /// Same as [`acknowledge`](Self::acknowledge): rejected events are dropped,
    /// not dead-lettered.
    pub fn reject(&self, topic: &str, subscription: &str, request: &LockTokensRequest) -> LockTokensResult {
        self.settle(topic, subscription, request, Settlement::Delete)
    }

    /// Return the events locked under the given tokens to the queue.
    pub fn release(&self, topic: &str, subscription: &str, request: &LockTokensRequest) -> LockTokensResult {
        self.settle(topic, subscription, request, Settlement::Release)
    }

    fn settle(
        &self,
        topic: &str,
        subscription: &str,
        request: &LockTokensRequest,
        settlement: Settlement,
    ) -> LockTokensResult {
        let mut result = LockTokensResult::default();

        for token in request.tokens() {
            let settled = match settlement {
                Settlement::Delete => self.store.try_delete(topic, subscription, token),
                Settlement::Release => self.store.try_release(topic, subscription, token),
            };
            if settled {
                result.succeeded_lock_tokens.push(token.to_string());
            } else {
                result.failed_lock_tokens.push(FailedLockToken::invalid(token));
            }
        }

        debug!(
            topic = topic,
            subscription = subscription,
            operation = ?settlement,
            succeeded = result.succeeded_lock_tokens.len(),
            failed = result.failed_lock_tokens.len(),
            "Settled lock tokens"
        );
        result
    }
}
