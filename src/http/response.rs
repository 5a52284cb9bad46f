//! Response normalization.
//!
//! # Responsibilities
//! - Map `UpstreamOutcome` onto success text or a `GatewayError`
//! - Render every `GatewayError` as the stable JSON envelope
//! - Strip diagnostic fields in production mode
//!
//! # Design Decisions
//! - Clients always get a JSON body with `error` and `code` on failure
//! - `raw` is bounded by the upstream client before it gets here
//! - Rate-limit rejections carry `Retry-After` as a header and in the body

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::Mode;
use crate::error::GatewayError;
use crate::upstream::UpstreamOutcome;

/// Body of a successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuccessBody {
    pub success: bool,
    pub text: String,
}

/// Stable error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorEnvelope {
    pub fn from_error(err: &GatewayError, mode: Mode) -> Self {
        let (retry_after, raw, details) = match err {
            GatewayError::RateLimited { retry_after_secs, .. } => (Some(*retry_after_secs), None, None),
            GatewayError::UnexpectedFormat { raw } => (None, Some(raw.clone()), None),
            GatewayError::Upstream { raw, .. } => (None, raw.clone(), None),
            GatewayError::Transport(kind) => (None, None, Some(kind.as_str().to_string())),
            _ => (None, None, None),
        };

        let diagnostics = !mode.is_production();
        Self {
            error: err.to_string(),
            code: err.status().as_u16(),
            retry_after,
            raw: raw.filter(|_| diagnostics),
            details: details.filter(|_| diagnostics),
        }
    }
}

/// Map an upstream outcome to the text returned to the client.
pub fn normalize(outcome: UpstreamOutcome) -> Result<String, GatewayError> {
    match outcome {
        UpstreamOutcome::Success(text) => Ok(text),
        UpstreamOutcome::Malformed { raw } => Err(GatewayError::UnexpectedFormat { raw }),
        UpstreamOutcome::UpstreamError { code, message, raw } => {
            Err(GatewayError::Upstream { code, message, raw })
        }
        UpstreamOutcome::TransportError(kind) => Err(GatewayError::Transport(kind)),
        UpstreamOutcome::Timeout => Err(GatewayError::Timeout),
    }
}

pub fn success_response(text: String) -> Response {
    (StatusCode::OK, Json(SuccessBody { success: true, text })).into_response()
}

pub fn error_response(err: &GatewayError, mode: Mode) -> Response {
    let envelope = ErrorEnvelope::from_error(err, mode);
    let mut response = (err.status(), Json(envelope)).into_response();
    if let GatewayError::RateLimited { retry_after_secs, .. } = err {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportKind;
    use crate::security::Tier;

    #[test]
    fn test_normalize_table() {
        assert_eq!(normalize(UpstreamOutcome::Success("ok".into())).unwrap(), "ok");

        let err = normalize(UpstreamOutcome::Malformed { raw: "{}".into() }).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "unexpected response format");

        let err = normalize(UpstreamOutcome::UpstreamError {
            code: 429,
            message: "quota".into(),
            raw: None,
        })
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);

        let err = normalize(UpstreamOutcome::UpstreamError {
            code: 99,
            message: "weird".into(),
            raw: None,
        })
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = normalize(UpstreamOutcome::TransportError(TransportKind::ConnectionRefused)).unwrap_err();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = normalize(UpstreamOutcome::Timeout).unwrap_err();
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_envelope_hides_diagnostics_in_production() {
        let err = GatewayError::UnexpectedFormat { raw: "{\"weird\":1}".into() };

        let prod = ErrorEnvelope::from_error(&err, Mode::Production);
        assert_eq!(prod.raw, None);
        assert_eq!(
            serde_json::to_value(&prod).unwrap(),
            serde_json::json!({"error": "unexpected response format", "code": 502})
        );

        let dev = ErrorEnvelope::from_error(&err, Mode::Development);
        assert_eq!(dev.raw.as_deref(), Some("{\"weird\":1}"));
    }

    #[test]
    fn test_timeout_envelope() {
        let envelope = ErrorEnvelope::from_error(&GatewayError::Timeout, Mode::Development);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            serde_json::json!({"error": "timeout", "code": 504})
        );
    }

    #[test]
    fn test_rate_limited_response() {
        let err = GatewayError::RateLimited { tier: Tier::Coarse, retry_after_secs: 30 };
        let response = error_response(&err, Mode::Production);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");

        let envelope = ErrorEnvelope::from_error(&err, Mode::Production);
        assert_eq!(envelope.retry_after, Some(30));
        assert_eq!(envelope.code, 429);
    }

    #[test]
    fn test_configuration_error_is_generic() {
        let envelope = ErrorEnvelope::from_error(&GatewayError::Configuration, Mode::Development);
        assert_eq!(envelope.error, "server configuration error");
        assert_eq!(envelope.code, 500);
        assert!(envelope.details.is_none());
    }
}
