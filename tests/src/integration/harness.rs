//! Test fixtures: a gateway on an ephemeral port and a recording webhook.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use eg_01_push_delivery::{PushStatsSnapshot, DELIVERY_COUNT_HEADER, EVENT_TYPE_HEADER};
use eg_03_api_gateway::{ApiGatewayService, DeliveryConfig, GatewayConfig, GatewayError};
use parking_lot::Mutex;
use serde_json::Value;
use shared_types::TopicsConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// How long any single wait in these tests may take.
pub const WAIT: Duration = Duration::from_secs(5);

/// Gateway configuration tuned for tests: quick retries, short long-polls.
pub fn test_config(topics: TopicsConfig) -> GatewayConfig {
    let mut config = GatewayConfig {
        topics,
        delivery: DeliveryConfig {
            max_attempts: 2,
            attempt_timeout_ms: 20_000,
            initial_backoff_ms: 10,
            max_backoff_ms: 20,
        },
        ..GatewayConfig::default()
    };
    config.pull.max_wait_secs = 1;
    config.pull.lock_duration_secs = 60;
    config.reload_interval_ms = 0;
    config
}

/// A running gateway.
pub struct Gateway {
    pub service: Arc<ApiGatewayService>,
    pub base: String,
    pub http: reqwest::Client,
    server: JoinHandle<Result<(), GatewayError>>,
}

impl Gateway {
    pub async fn start(topics: TopicsConfig) -> Self {
        Self::start_with(test_config(topics)).await
    }

    pub async fn start_with(config: GatewayConfig) -> Self {
        let service = Arc::new(ApiGatewayService::new(config).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.serve(listener).await })
        };

        Self {
            service,
            base: format!("http://{addr}"),
            http: reqwest::Client::new(),
            server,
        }
    }

    /// `POST /topics/{topic}:publish`
    pub async fn publish(&self, topic: &str, body: &Value) -> reqwest::Response {
        self.http
            .post(format!("{}/topics/{topic}:publish", self.base))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// `POST /topics/{topic}/eventsubscriptions/{subscription}:{action}`
    pub async fn action(
        &self,
        topic: &str,
        subscription: &str,
        action: &str,
        body: Option<&Value>,
    ) -> reqwest::Response {
        let request = self.http.post(format!(
            "{}/topics/{topic}/eventsubscriptions/{subscription}:{action}",
            self.base
        ));
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        request.send().await.unwrap()
    }

    pub async fn receive(&self, topic: &str, subscription: &str) -> Value {
        let response = self.action(topic, subscription, "receive", None).await;
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    pub async fn settle(
        &self,
        topic: &str,
        subscription: &str,
        action: &str,
        tokens: &[&str],
    ) -> Value {
        let body = serde_json::json!({ "lockTokens": tokens });
        let response = self.action(topic, subscription, action, Some(&body)).await;
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }

    /// Poll push statistics until `done` holds.
    pub async fn wait_for_stats(
        &self,
        done: impl Fn(&PushStatsSnapshot) -> bool,
    ) -> PushStatsSnapshot {
        tokio::time::timeout(WAIT, async {
            loop {
                let stats = self.service.push_stats();
                if done(&stats) {
                    return stats;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("push statistics did not settle")
    }

    /// Trigger shutdown and wait for the server to finish draining.
    pub async fn stop(self) {
        self.service.shutdown();
        tokio::time::timeout(WAIT, self.server)
            .await
            .expect("gateway did not stop")
            .unwrap()
            .unwrap();
    }
}

/// One delivery seen by the webhook.
#[derive(Debug, Clone)]
pub struct Received {
    pub hook: String,
    pub event_type_header: Option<String>,
    pub delivery_count: Option<String>,
    pub events: Vec<Value>,
}

#[derive(Default)]
struct HookState {
    received: Mutex<Vec<Received>>,
    arrived: Notify,
}

/// In-process push subscriber.
///
/// `POST /{hook}` records the delivery, then answers by name: hooks starting
/// with `slow` never answer in test time, hooks starting with `fail` return
/// 500, every other hook returns 200.
pub struct Webhook {
    addr: SocketAddr,
    state: Arc<HookState>,
    server: JoinHandle<()>,
}

impl Webhook {
    pub async fn start() -> Self {
        let state = Arc::new(HookState::default());
        let app = Router::new()
            .route("/:hook", post(record))
            .with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            state,
            server,
        }
    }

    pub fn url(&self, hook: &str) -> String {
        format!("http://{}/{hook}", self.addr)
    }

    pub fn received(&self) -> Vec<Received> {
        self.state.received.lock().clone()
    }

    pub fn received_by(&self, hook: &str) -> Vec<Received> {
        self.received()
            .into_iter()
            .filter(|r| r.hook == hook)
            .collect()
    }

    /// Wait until at least `count` deliveries arrived in total.
    pub async fn wait_for(&self, count: usize) -> Vec<Received> {
        tokio::time::timeout(WAIT, async {
            loop {
                let arrived = self.state.arrived.notified();
                let received = self.received();
                if received.len() >= count {
                    return received;
                }
                arrived.await;
            }
        })
        .await
        .expect("webhook deliveries did not arrive")
    }
}

impl Drop for Webhook {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn record(
    State(state): State<Arc<HookState>>,
    Path(hook): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let events = match serde_json::from_slice(&body) {
        Ok(Value::Array(events)) => events,
        Ok(other) => vec![other],
        Err(_) => Vec::new(),
    };

    state.received.lock().push(Received {
        hook: hook.clone(),
        event_type_header: header(EVENT_TYPE_HEADER),
        delivery_count: header(DELIVERY_COUNT_HEADER),
        events,
    });
    state.arrived.notify_waiters();

    if hook.starts_with("slow") {
        tokio::time::sleep(Duration::from_secs(60)).await;
        StatusCode::OK
    } else if hook.starts_with("fail") {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}
