//! API Gateway service - wires the engine together and serves HTTP.

use crate::domain::{GatewayConfig, GatewayError, PublishService};
use crate::routes::{build_router, AppState};
use axum::Router;
use eg_01_push_delivery::{HttpSubscriberClient, PushDispatcher, PushStatsSnapshot};
use eg_02_pull_delivery::PullDeliveryService;
use shared_bus::{CancellationRegistry, TopicSubscriptions};
use shared_types::{SharedTopics, TopicConfigSource};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Gateway service state
pub struct ApiGatewayService {
    config: GatewayConfig,
    topics: Arc<SharedTopics>,
    registry: Arc<CancellationRegistry>,
    subscriptions: Arc<TopicSubscriptions>,
    dispatcher: Arc<PushDispatcher>,
    pull: Arc<PullDeliveryService>,
    shutdown: CancellationToken,
}

impl ApiGatewayService {
    /// Create the service and every engine component behind it.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        let client = HttpSubscriberClient::new(config.delivery.retry_policy())
            .map_err(|e| GatewayError::Internal(format!("http client: {e}")))?;
        let registry = Arc::new(CancellationRegistry::new());
        let dispatcher = Arc::new(PushDispatcher::new(Arc::new(client), Arc::clone(&registry)));
        let subscriptions = Arc::new(TopicSubscriptions::new());
        let pull = Arc::new(PullDeliveryService::new(
            Arc::clone(&subscriptions),
            config.pull.settings(),
        ));
        let topics = Arc::new(SharedTopics::new(config.topics.clone()));

        Ok(Self {
            config,
            topics,
            registry,
            subscriptions,
            dispatcher,
            pull,
            shutdown: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Live topic configuration; replace it to hot reload.
    pub fn topics(&self) -> Arc<SharedTopics> {
        Arc::clone(&self.topics)
    }

    pub fn registry(&self) -> Arc<CancellationRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn subscriptions(&self) -> Arc<TopicSubscriptions> {
        Arc::clone(&self.subscriptions)
    }

    pub fn push_stats(&self) -> PushStatsSnapshot {
        self.dispatcher.stats()
    }

    /// Build the HTTP router over this service's state.
    pub fn router(&self) -> Router {
        let state = AppState {
            topics: self.topics.clone(),
            publisher: Arc::new(PublishService::new(
                Arc::clone(&self.dispatcher),
                Arc::clone(&self.subscriptions),
            )),
            dispatcher: Arc::clone(&self.dispatcher),
            pull: Arc::clone(&self.pull),
            shutdown: self.shutdown.clone(),
        };
        build_router(state, self.config.server.max_body_bytes)
    }

    /// Bind the configured address and serve until [`shutdown`](Self::shutdown).
    pub async fn start(&self) -> Result<(), GatewayError> {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until [`shutdown`](Self::shutdown).
    ///
    /// Once the signal fires, open long-polls return and the server stops
    /// after in-flight requests finish. Push deliveries are then cancelled
    /// and drained for up to the configured grace period.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GatewayError> {
        let addr: Option<SocketAddr> = listener.local_addr().ok();
        info!(
            addr = ?addr,
            topics = self.topics.snapshot().topic_count(),
            "Starting API Gateway"
        );

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        info!("HTTP server stopped");
        self.dispatcher
            .shutdown(self.config.server.shutdown_grace())
            .await;
        info!("API Gateway stopped");
        Ok(())
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
