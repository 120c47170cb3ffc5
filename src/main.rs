//! switchyard server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::Listener ──▶ http::server (task per connection)
//!                                      │
//!                                      ▼
//!                              http::HttpConnection ──▶ routing::Router ──▶ app routes
//!                                      │
//!                                      ▼ 101 Switching Protocols
//!                              websocket::MessageAdapter ⇄ EchoMessages
//! ```

use std::path::PathBuf;

use clap::Parser;

use switchyard::app;
use switchyard::config::{load_config, ServerConfig};
use switchyard::lifecycle::{signals, Shutdown};
use switchyard::net::Listener;
use switchyard::observability::init_logging;
use switchyard::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "switchyard")]
#[command(about = "HTTP/1.1 server with WebSocket upgrade", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override observability.log_level.
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "switchyard starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        idle_secs = config.timeouts.idle_secs,
        "Configuration loaded"
    );

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let router = app::router(&config);
    let server = HttpServer::new(config, router);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
