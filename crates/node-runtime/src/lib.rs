//! # Node Runtime Library
//!
//! Process bootstrap for the EventGrid emulator. The binary in `main.rs` is
//! a thin wrapper around [`NodeRuntime`].
//!
//! ## Startup Sequence
//!
//! 1. Resolve and load configuration (file, then environment overrides)
//! 2. Build the gateway and every engine component behind it
//! 3. Start the configuration watcher (if `reloadIntervalMs > 0`)
//! 4. Serve HTTP until the shutdown signal
//!
//! ## Shutdown Sequence
//!
//! 1. Stop accepting requests; open long-polls return 503
//! 2. Revoke every push subscriber signal
//! 3. Wait up to the grace period for push deliveries to drain

pub mod config;
pub mod reload;

use anyhow::{Context, Result};
use eg_03_api_gateway::{ApiGatewayService, GatewayConfig};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use config::{apply_env_overrides, config_path, load_config};
pub use reload::{ReloadError, TopicReloader};

/// The running emulator: gateway plus configuration watcher.
pub struct NodeRuntime {
    service: Arc<ApiGatewayService>,
    config_path: PathBuf,
    watcher: CancellationToken,
}

impl NodeRuntime {
    /// Build every component from a loaded configuration.
    pub fn new(config: GatewayConfig, config_path: PathBuf) -> Result<Self> {
        let service = ApiGatewayService::new(config).context("initializing API gateway")?;
        Ok(Self {
            service: Arc::new(service),
            config_path,
            watcher: CancellationToken::new(),
        })
    }

    pub fn service(&self) -> &Arc<ApiGatewayService> {
        &self.service
    }

    /// Bind the configured address and run until `signal` resolves.
    pub async fn run(self, signal: impl Future<Output = ()>) -> Result<()> {
        let addr = self.service.config().http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        self.run_on(listener, signal).await
    }

    /// Run on an already bound listener until `signal` resolves.
    pub async fn run_on(self, listener: TcpListener, signal: impl Future<Output = ()>) -> Result<()> {
        info!("===========================================");
        info!("  EventGrid Emulator v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        let watcher = self.start_watcher();

        let server = {
            let service = Arc::clone(&self.service);
            tokio::spawn(async move { service.serve(listener).await })
        };
        tokio::pin!(server);

        tokio::select! {
            () = signal => {
                info!("Shutdown signal received");
            }
            result = &mut server => {
                // Server ended on its own; report why.
                self.watcher.cancel();
                return match result {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e).context("API gateway failed"),
                    Err(e) => Err(e).context("API gateway task panicked"),
                };
            }
        }

        self.watcher.cancel();
        self.service.shutdown();

        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "API gateway stopped with error"),
            Err(e) => error!(error = %e, "API gateway task panicked"),
        }
        if let Some(watcher) = watcher {
            let _ = watcher.await;
        }

        info!("Emulator stopped");
        Ok(())
    }

    fn start_watcher(&self) -> Option<tokio::task::JoinHandle<()>> {
        let interval = self.service.config().reload_interval()?;
        let reloader = TopicReloader::new(self.config_path.clone(), &self.service);
        let shutdown = self.watcher.clone();
        Some(tokio::spawn(reloader.run(interval, shutdown)))
    }
}
