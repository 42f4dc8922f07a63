//! # EventGrid Emulator
//!
//! Entry point of the `eventgrid-emulator` binary.
//!
//! ```text
//! eventgrid-emulator [CONFIG_FILE]
//!
//!   CONFIG_FILE   defaults to $EG_CONFIG, then ./appsettings.json
//!   EG_HOST       overrides server.host
//!   EG_PORT       overrides server.port
//!   RUST_LOG      log filter (default: info)
//! ```

use anyhow::Result;
use node_runtime::{config_path, load_config, NodeRuntime};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .init();

    // Load configuration
    let lookup = |key: &str| std::env::var(key).ok();
    let path = config_path(std::env::args().skip(1), lookup);
    let config = load_config(&path, lookup)?;

    let runtime = NodeRuntime::new(config, path)?;

    info!("Emulator is running. Press Ctrl+C to stop.");
    runtime
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Cannot listen for Ctrl+C, shutting down");
            }
        })
        .await
}
