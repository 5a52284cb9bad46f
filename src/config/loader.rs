//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::schema::{ApiKey, GatewayConfig, Mode};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())
        .map_err(ConfigError::Validation)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply environment overrides through `lookup`.
///
/// Empty values are ignored. Values that fail to parse are reported together.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), Vec<ValidationError>>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let mut errors = Vec::new();

    if let Some(key) = get("GEMINI_API_KEY") {
        config.upstream.api_key = Some(ApiKey::new(key));
    }

    if let Some(origins) = get("ALLOWED_ORIGINS") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }

    if let Some(port) = parse_override::<u16>(&get, "PORT", &mut errors) {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }

    if let Some(mode) = parse_override::<Mode>(&get, "GATEWAY_MODE", &mut errors) {
        config.mode = mode;
    }

    if let Some(v) = parse_override(&get, "RATE_LIMIT_WINDOW_SECS", &mut errors) {
        config.rate_limit.coarse.window_secs = v;
    }
    if let Some(v) = parse_override(&get, "RATE_LIMIT_MAX", &mut errors) {
        config.rate_limit.coarse.max_requests = v;
    }
    if let Some(v) = parse_override(&get, "GENERATE_LIMIT_WINDOW_SECS", &mut errors) {
        config.rate_limit.strict.window_secs = v;
    }
    if let Some(v) = parse_override(&get, "GENERATE_LIMIT_MAX", &mut errors) {
        config.rate_limit.strict.max_requests = v;
    }

    if let Some(url) = get("UPSTREAM_BASE_URL") {
        config.upstream.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(model) = get("UPSTREAM_MODEL") {
        config.upstream.model = model;
    }
    if let Some(v) = parse_override(&get, "UPSTREAM_TIMEOUT_MS", &mut errors) {
        config.upstream.timeout_ms = v;
    }
    if let Some(level) = get("LOG_LEVEL") {
        config.observability.log_level = level;
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn parse_override<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    errors: &mut Vec<ValidationError>,
) -> Option<T> {
    let value = get(key)?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(ValidationError::Override { key, value });
            None
        }
    }
}
