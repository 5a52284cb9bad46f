//! GenAI Gateway
//!
//! Holds the upstream credential so browsers never see it.
//!
//! # Architecture Overview
//!
//! ```text
//!     Browser ──▶ admission ──▶ /api/generate ──▶ upstream client ──▶ Generative API
//!                 (origin,       (strict limit,    (deadline,
//!                  coarse         validate)         credential header)
//!                  limit)
//!     Browser ◀── envelope  ◀── normalize  ◀───────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use genai_gateway::config::load_config;
use genai_gateway::lifecycle::signals::spawn_signal_handler;
use genai_gateway::observability::{logging, metrics};
use genai_gateway::{GatewayServer, Shutdown};

/// Environment variable naming the config file when `--config` is absent.
const CONFIG_ENV: &str = "GATEWAY_CONFIG";

#[derive(Parser, Debug)]
#[command(name = "genai-gateway", version, about = "Credential-holding gateway for a generative API")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let path = cli
        .config
        .or_else(|| std::env::var(CONFIG_ENV).ok().filter(|v| !v.is_empty()).map(PathBuf::from));

    // Logging is not up yet, so configuration errors go straight to stderr.
    let config = match load_config(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("genai-gateway: {e}");
            return Err(e.into());
        }
    };

    logging::init(&config.observability, config.mode);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?config.mode,
        bind_address = %config.listener.bind_address,
        model = %config.upstream.model,
        allowed_origins = config.cors.allowed_origins.len(),
        "genai-gateway starting"
    );

    if config.upstream.api_key.is_none() {
        tracing::warn!("No upstream credential configured; generation requests will fail");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let _signals = spawn_signal_handler(&shutdown);

    let server = GatewayServer::new(config)?;
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
