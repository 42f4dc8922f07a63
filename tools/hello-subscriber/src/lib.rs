//! Hello Subscriber: webhook endpoints with fixed answers.
//!
//! Point a push subscription at one of these to see how the emulator
//! behaves against a healthy, failing or slow subscriber.
//!
//! | Route | Answer |
//! |---|---|
//! | `POST /webhook-200` | 200 |
//! | `POST /webhook-400` | 400 |
//! | `POST /webhook-401` | 401 |
//! | `POST /webhook-404` | 404 |
//! | `POST /webhook-slow-200` | 200 after [`SLOW_DELAY`] |
//!
//! The slow hook simply stops if the caller hangs up, since the server
//! drops the handler future with the connection.

use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

/// How long `/webhook-slow-200` takes to answer.
pub const SLOW_DELAY: Duration = Duration::from_secs(60);

/// Build the webhook router.
pub fn router() -> Router {
    Router::new()
        .route("/webhook-200", post(|body: String| respond("webhook-200", body, StatusCode::OK)))
        .route(
            "/webhook-400",
            post(|body: String| respond("webhook-400", body, StatusCode::BAD_REQUEST)),
        )
        .route(
            "/webhook-401",
            post(|body: String| respond("webhook-401", body, StatusCode::UNAUTHORIZED)),
        )
        .route(
            "/webhook-404",
            post(|body: String| respond("webhook-404", body, StatusCode::NOT_FOUND)),
        )
        .route("/webhook-slow-200", post(slow))
}

async fn respond(hook: &'static str, body: String, status: StatusCode) -> StatusCode {
    info!(
        hook = hook,
        events = event_count(&body),
        status = status.as_u16(),
        body = %body,
        "Webhook called"
    );
    status
}

async fn slow(body: String) -> StatusCode {
    info!(events = event_count(&body), delay_secs = SLOW_DELAY.as_secs(), "Slow webhook called");
    tokio::time::sleep(SLOW_DELAY).await;
    info!("Slow webhook answering");
    StatusCode::OK
}

/// Number of events in a delivery body, 0 if it is not JSON.
fn event_count(body: &str) -> usize {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(events)) => events.len(),
        Ok(Value::Object(_)) => 1,
        _ => 0,
    }
}
