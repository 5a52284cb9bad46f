//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Name reported by the health endpoint.
    pub service_name: String,

    /// Controls whether diagnostic detail reaches clients.
    pub mode: Mode,

    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Generative-content API settings.
    pub upstream: UpstreamConfig,

    /// Origin whitelist.
    pub cors: CorsConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            service_name: "genai-gateway".to_string(),
            mode: Mode::default(),
            listener: ListenerConfig::default(),
            upstream: UpstreamConfig::default(),
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Runtime mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Error envelopes carry no diagnostics.
    #[default]
    Production,
    /// Error envelopes include `raw`/`details`.
    Development,
}

impl Mode {
    pub fn is_production(self) -> bool {
        self == Mode::Production
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Mode::Production),
            "development" | "dev" => Ok(Mode::Development),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,

    /// Time allowed for a client to finish sending its body.
    pub body_timeout_ms: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            body_timeout_ms: 30_000,
        }
    }
}

/// Server-held upstream credential.
///
/// Never printed and never serialized.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

/// Upstream API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the generative-content API.
    pub base_url: String,

    /// Model addressed by the generate call.
    pub model: String,

    /// Credential attached to every upstream call.
    #[serde(skip_serializing)]
    pub api_key: Option<ApiKey>,

    /// Hard deadline for one upstream call in milliseconds.
    pub timeout_ms: u64,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: None,
            timeout_ms: 10 * 60 * 1000,
            connect_timeout_ms: 10_000,
        }
    }
}

/// Origin admission configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins allowed, or `"*"`.
    pub allowed_origins: Vec<String>,

    /// Preflight cache lifetime reported to browsers.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            max_age_secs: 600,
        }
    }
}

/// Window and ceiling for one rate-limit tier.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TierConfig {
    pub enabled: bool,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Requests admitted per window.
    pub max_requests: u32,
}

/// A tier table as written in the config file. Missing keys keep the
/// tier's own defaults.
#[derive(Debug, Deserialize)]
struct TierTable {
    enabled: Option<bool>,
    window_secs: Option<u64>,
    max_requests: Option<u32>,
}

impl TierTable {
    fn over(self, base: TierConfig) -> TierConfig {
        TierConfig {
            enabled: self.enabled.unwrap_or(base.enabled),
            window_secs: self.window_secs.unwrap_or(base.window_secs),
            max_requests: self.max_requests.unwrap_or(base.max_requests),
        }
    }
}

fn coarse_tier<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TierConfig, D::Error> {
    TierTable::deserialize(deserializer).map(|table| table.over(TierConfig::coarse()))
}

fn strict_tier<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TierConfig, D::Error> {
    TierTable::deserialize(deserializer).map(|table| table.over(TierConfig::strict()))
}

impl TierConfig {
    /// 300 requests per 15 minutes.
    pub fn coarse() -> Self {
        Self {
            enabled: true,
            window_secs: 15 * 60,
            max_requests: 300,
        }
    }

    /// 20 requests per minute.
    pub fn strict() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            max_requests: 20,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Applies to every route under `/api`.
    #[serde(deserialize_with = "coarse_tier")]
    pub coarse: TierConfig,

    /// Applies to the generation route only.
    #[serde(deserialize_with = "strict_tier")]
    pub strict: TierConfig,

    /// Key clients by the leftmost `X-Forwarded-For` entry.
    pub trust_forwarded_for: bool,

    /// Interval between sweeps of expired windows.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            coarse: TierConfig::coarse(),
            strict: TierConfig::strict(),
            trust_forwarded_for: false,
            sweep_interval_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
