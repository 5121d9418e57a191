//! Secret-gated forwarding proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                     SECRET GATE                      │
//!                     │                                                      │
//!   POST /proxy       │  ┌─────────┐   ┌───────────┐   ┌─────────────────┐   │
//!   ──────────────────┼─▶│  http   │──▶│ forward:: │──▶│ security::      │   │
//!                     │  │ server  │   │ pipeline  │   │ blacklist       │   │
//!                     │  └─────────┘   └─────┬─────┘   │ secret          │   │
//!                     │                      │         │ failures        │   │
//!                     │                      │         │ target, headers │   │
//!                     │                      ▼         └─────────────────┘   │
//!   response          │  ┌─────────┐   ┌───────────┐                         │
//!   ◀─────────────────┼──│response │◀──│ upstream  │◀──────────────────────┼──── Destination
//!                     │  └─────────┘   │ (reqwest) │                         │
//!                     │                └───────────┘                         │
//!                     │                                                      │
//!                     │  config · observability · lifecycle                  │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use secret_gate::config::load_config;
use secret_gate::http::HttpServer;
use secret_gate::lifecycle::{signals, startup, Shutdown};
use secret_gate::observability::logging;

#[derive(Parser)]
#[command(name = "secret-gate", version, about = "Secret-gated HTTP forwarding proxy")]
struct Args {
    /// Optional TOML config file. Environment variables override it.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Misconfiguration (including a secret that is not 128 characters) is fatal.
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability)?;
    tracing::info!("secret-gate v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        blacklist_path = %config.security.blacklist_path,
        "Configuration loaded"
    );

    startup::start_metrics(&config)?;

    let server = HttpServer::from_config(config)?;
    let listener = TcpListener::bind(&server.config().listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
