//! Hello Subscriber binary.

use std::net::SocketAddr;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Fixed-response webhooks for manual push testing
#[derive(Parser, Debug)]
#[command(name = "hello-subscriber")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "HELLO_PORT", default_value_t = 7071)]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: std::net::IpAddr,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Hello subscriber listening");

    axum::serve(listener, hello_subscriber::router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
