//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Mode, ObservabilityConfig};

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(config: &ObservabilityConfig) -> String {
    format!("genai_gateway={level},tower_http={level}", level = config.log_level)
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init(config: &ObservabilityConfig, mode: Mode) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let registry = tracing_subscriber::registry().with(filter);
    match mode {
        Mode::Production => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        Mode::Development => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Access log line for one inbound request.
pub fn log_access(method: &str, path: &str, client_ip: &str, origin: Option<&str>, request_id: &str) {
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        client_ip = %client_ip,
        origin = origin.unwrap_or("-"),
        "Request received"
    );
}
