//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - A missing upstream credential is not an error; the gateway still
//!   serves `/health` and refuses generation requests at runtime

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, TierConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid upstream base url '{0}'")]
    BaseUrl(String),

    #[error("upstream model must not be empty")]
    EmptyModel,

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("invalid origin '{0}'")]
    Origin(String),

    #[error("invalid value '{value}' for {key}")]
    Override { key: &'static str, value: String },
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("listener.max_body_bytes"));
    }
    if config.listener.body_timeout_ms == 0 {
        errors.push(ValidationError::Zero("listener.body_timeout_ms"));
    }

    match url::Url::parse(&config.upstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::BaseUrl(config.upstream.base_url.clone())),
    }
    if config.upstream.model.trim().is_empty() {
        errors.push(ValidationError::EmptyModel);
    }
    if config.upstream.timeout_ms == 0 {
        errors.push(ValidationError::Zero("upstream.timeout_ms"));
    }
    if config.upstream.connect_timeout_ms == 0 {
        errors.push(ValidationError::Zero("upstream.connect_timeout_ms"));
    }

    for origin in &config.cors.allowed_origins {
        if origin.trim().is_empty() || origin.ends_with('/') {
            errors.push(ValidationError::Origin(origin.clone()));
        }
    }

    check_tier(
        &config.rate_limit.coarse,
        ("rate_limit.coarse.window_secs", "rate_limit.coarse.max_requests"),
        &mut errors,
    );
    check_tier(
        &config.rate_limit.strict,
        ("rate_limit.strict.window_secs", "rate_limit.strict.max_requests"),
        &mut errors,
    );
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::Zero("rate_limit.sweep_interval_secs"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_tier(
    tier: &TierConfig,
    fields: (&'static str, &'static str),
    errors: &mut Vec<ValidationError>,
) {
    if !tier.enabled {
        return;
    }
    if tier.window_secs == 0 {
        errors.push(ValidationError::Zero(fields.0));
    }
    if tier.max_requests == 0 {
        errors.push(ValidationError::Zero(fields.1));
    }
}
