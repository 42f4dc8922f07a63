//! HTTP routes.
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | POST | `/topics/{topic}:publish` | [`publish_action`] |
//! | POST | `/topics/{topic}/api/events` | [`publish_events`] |
//! | POST | `/topics/{topic}/eventsubscriptions/{subscription}:{action}` | [`subscription_action`] |
//! | GET | `/health` | [`health`] |
//!
//! The router matches whole path segments only, so `{topic}:publish` and
//! `{subscription}:{action}` arrive as one parameter and are split on the
//! last `:`.

use crate::domain::{ApiError, ApiResult, PublishService};
use crate::middleware::TracingLayer;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use eg_01_push_delivery::PushDispatcher;
use eg_02_pull_delivery::{LockTokensRequest, PullDeliveryService};
use shared_types::TopicConfigSource;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::warn;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub topics: Arc<dyn TopicConfigSource>,
    pub publisher: Arc<PublishService>,
    pub dispatcher: Arc<PushDispatcher>,
    pub pull: Arc<PullDeliveryService>,
    /// Fires when the gateway begins shutting down.
    pub shutdown: CancellationToken,
}

/// Build the full router with its middleware stack.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TracingLayer::new())
        .layer(DefaultBodyLimit::max(max_body_bytes));

    Router::new()
        .route("/topics/:topic", post(publish_action))
        .route("/topics/:topic/api/events", post(publish_events))
        .route(
            "/topics/:topic/eventsubscriptions/:subscription",
            post(subscription_action),
        )
        .route("/health", get(health))
        .fallback(not_found)
        .layer(middleware)
        .with_state(state)
}

/// Split `name:action` on the last colon. Both halves must be non-empty.
pub fn split_action(segment: &str) -> Option<(&str, &str)> {
    segment
        .rsplit_once(':')
        .filter(|(name, action)| !name.is_empty() && !action.is_empty())
}

/// `POST /topics/{topic}:publish`
pub async fn publish_action(
    State(state): State<AppState>,
    Path(topic_action): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    match split_action(&topic_action) {
        Some((topic, "publish")) => publish(&state, topic, &body),
        _ => Err(ApiError::not_found(format!("topics/{topic_action}"))),
    }
}

/// `POST /topics/{topic}/api/events`
pub async fn publish_events(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    publish(&state, &topic, &body)
}

fn publish(state: &AppState, topic: &str, body: &[u8]) -> ApiResult<StatusCode> {
    let config = state.topics.snapshot();
    state.publisher.publish(topic, body, &config).map_err(|e| {
        warn!(topic = topic, error = %e, "Rejected malformed publish body");
        ApiError::from(e)
    })?;
    Ok(StatusCode::OK)
}

/// `POST /topics/{topic}/eventsubscriptions/{subscription}:{action}`
pub async fn subscription_action(
    State(state): State<AppState>,
    Path((topic, subscription_action)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Response> {
    let Some((subscription, action)) = split_action(&subscription_action) else {
        return Err(ApiError::not_found(format!(
            "topics/{topic}/eventsubscriptions/{subscription_action}"
        )));
    };

    if !state.topics.snapshot().has_pull_subscription(&topic, subscription) {
        return Err(ApiError::not_found(format!(
            "topics/{topic}/eventsubscriptions/{subscription}"
        )));
    }

    let response = match action {
        "receive" => {
            let results = state
                .pull
                .receive(&topic, subscription, &state.shutdown)
                .await?;
            Json(results).into_response()
        }
        "acknowledge" => {
            let request = lock_tokens(&body)?;
            Json(state.pull.acknowledge(&topic, subscription, &request)).into_response()
        }
        "release" => {
            let request = lock_tokens(&body)?;
            Json(state.pull.release(&topic, subscription, &request)).into_response()
        }
        "reject" => {
            let request = lock_tokens(&body)?;
            Json(state.pull.reject(&topic, subscription, &request)).into_response()
        }
        other => {
            return Err(ApiError::not_found(format!(
                "action '{other}' on topics/{topic}/eventsubscriptions/{subscription}"
            )))
        }
    };

    Ok(response)
}

/// Parse a lock-token body. Empty and `null` bodies mean no tokens.
fn lock_tokens(body: &[u8]) -> ApiResult<LockTokensRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(LockTokensRequest::default());
    }
    serde_json::from_slice::<Option<LockTokensRequest>>(body)
        .map(Option::unwrap_or_default)
        .map_err(|e| ApiError::bad_request(format!("invalid lock token body: {e}")))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = if state.shutdown.is_cancelled() {
        "shuttingDown"
    } else {
        "ok"
    };
    Json(serde_json::json!({
        "status": status,
        "topics": state.topics.snapshot().topic_count(),
        "pushStats": state.dispatcher.stats(),
    }))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(uri.path().trim_start_matches('/').to_string())
}
