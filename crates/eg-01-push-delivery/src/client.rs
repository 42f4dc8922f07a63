//! # Outbound Subscriber Client
//!
//! Sends one filtered batch to one webhook, applying the retry policy and
//! honoring the subscriber's cancellation signal at every await point.
//!
//! ## Outcomes
//!
//! | Result | Meaning | Logged here |
//! |---|---|---|
//! | `Ok(DeliveryResponse)` | response headers received, any status, including a final 5xx | no |
//! | `SendError::Cancelled` | the signal fired | no |
//! | `SendError::RetriesExhausted` | the final attempt timed out | yes, once |
//! | `SendError::Failed` | non-transient transport failure | no |

use crate::policy::RetryPolicy;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Header telling the subscriber what kind of request this is.
pub const EVENT_TYPE_HEADER: &str = "aeg-event-type";

/// Header carrying the zero-based retry number of this attempt.
pub const DELIVERY_COUNT_HEADER: &str = "aeg-delivery-count";

/// One batch bound for one subscriber.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub topic: String,
    pub endpoint: String,
    /// Serialized JSON array of the filtered events.
    pub body: Bytes,
    pub event_count: usize,
}

/// What the subscriber answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryResponse {
    pub status: u16,
    pub attempts: u32,
}

/// Errors from [`SubscriberClient::send`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The cancellation signal fired before the delivery completed.
    #[error("delivery cancelled")]
    Cancelled,

    /// Every attempt timed out or got a transient answer.
    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Any other failure.
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Outbound HTTP capability consumed by the push engine.
#[async_trait]
pub trait SubscriberClient: Send + Sync {
    /// Deliver a batch, retrying per policy, until done or cancelled.
    async fn send(
        &self,
        request: &DeliveryRequest,
        cancel: &CancellationToken,
    ) -> Result<DeliveryResponse, SendError>;
}

/// Result of a single HTTP attempt.
enum AttemptOutcome {
    Response(StatusCode),
    TimedOut,
    Transport(reqwest::Error),
}

/// `reqwest`-backed subscriber client.
pub struct HttpSubscriberClient {
    http: Client,
    policy: RetryPolicy,
}

impl HttpSubscriberClient {
    /// Build a client with the given retry policy.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized.
    pub fn new(policy: RetryPolicy) -> reqwest::Result<Self> {
        let http = Client::builder()
            .connect_timeout(policy.attempt_timeout)
            .build()?;
        Ok(Self { http, policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt(&self, request: &DeliveryRequest, attempt: u32) -> AttemptOutcome {
        let send = self
            .http
            .post(&request.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(EVENT_TYPE_HEADER, "Notification")
            .header(DELIVERY_COUNT_HEADER, (attempt - 1).to_string())
            .body(request.body.clone())
            .send();

        // `send` resolves once headers are in; the body is never read.
        match tokio::time::timeout(self.policy.attempt_timeout, send).await {
            Ok(Ok(response)) => AttemptOutcome::Response(response.status()),
            Ok(Err(e)) if e.is_timeout() => AttemptOutcome::TimedOut,
            Ok(Err(e)) => AttemptOutcome::Transport(e),
            Err(_) => AttemptOutcome::TimedOut,
        }
    }
}

#[async_trait]
impl SubscriberClient for HttpSubscriberClient {
    async fn send(
        &self,
        request: &DeliveryRequest,
        cancel: &CancellationToken,
    ) -> Result<DeliveryResponse, SendError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let last = attempt >= max_attempts;

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SendError::Cancelled),
                outcome = self.attempt(request, attempt) => outcome,
            };

            match outcome {
                AttemptOutcome::Response(status) if last || !is_transient(status) => {
                    debug!(
                        topic = %request.topic,
                        subscriber = %request.endpoint,
                        status = status.as_u16(),
                        attempts = attempt,
                        events = request.event_count,
                        "Subscriber responded"
                    );
                    return Ok(DeliveryResponse {
                        status: status.as_u16(),
                        attempts: attempt,
                    });
                }
                AttemptOutcome::Response(status) => {
                    debug!(
                        topic = %request.topic,
                        subscriber = %request.endpoint,
                        status = status.as_u16(),
                        attempt = attempt,
                        "Transient subscriber status, retrying"
                    );
                }
                AttemptOutcome::TimedOut if last => {
                    warn!(
                        topic = %request.topic,
                        subscriber = %request.endpoint,
                        attempts = attempt,
                        timeout_ms = self.policy.attempt_timeout.as_millis() as u64,
                        "Retries exhausted, every attempt to reach the subscriber timed out"
                    );
                    return Err(SendError::RetriesExhausted { attempts: attempt });
                }
                AttemptOutcome::TimedOut => {
                    debug!(
                        topic = %request.topic,
                        subscriber = %request.endpoint,
                        attempt = attempt,
                        "Subscriber attempt timed out, retrying"
                    );
                }
                AttemptOutcome::Transport(e) if last => {
                    return Err(SendError::Failed(e.to_string()));
                }
                AttemptOutcome::Transport(e) => {
                    debug!(
                        topic = %request.topic,
                        subscriber = %request.endpoint,
                        attempt = attempt,
                        error = %e,
                        "Subscriber attempt failed, retrying"
                    );
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SendError::Cancelled),
                () = tokio::time::sleep(self.policy.backoff(attempt)) => {}
            }
        }
    }
}

/// Statuses worth another attempt.
fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}
