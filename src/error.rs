//! Gateway error taxonomy.
//!
//! Every failure on the request path is one of these variants. Conversion
//! to the client-facing JSON envelope happens in `http::response`.

use axum::http::StatusCode;
use thiserror::Error;

use crate::security::rate_limit::Tier;

/// Cause of a transport-level failure talking to the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The upstream host actively refused the connection.
    ConnectionRefused,
    /// The upstream host name could not be resolved.
    Resolution,
    /// Any other failure before a complete response was read.
    Other,
}

impl TransportKind {
    pub fn status(self) -> StatusCode {
        match self {
            TransportKind::ConnectionRefused => StatusCode::SERVICE_UNAVAILABLE,
            TransportKind::Resolution | TransportKind::Other => StatusCode::BAD_GATEWAY,
        }
    }

    /// Label used in metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            TransportKind::ConnectionRefused => "connection_refused",
            TransportKind::Resolution => "resolution",
            TransportKind::Other => "other",
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::ConnectionRefused => write!(f, "service unavailable"),
            TransportKind::Resolution => write!(f, "cannot connect to upstream"),
            TransportKind::Other => write!(f, "upstream request failed"),
        }
    }
}

/// Errors surfaced to clients.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Required server configuration (the upstream credential) is missing.
    #[error("server configuration error")]
    Configuration,

    #[error("{0}")]
    Validation(String),

    #[error("request body too large")]
    PayloadTooLarge,

    /// The client did not finish sending its body in time.
    #[error("request timeout")]
    RequestTimeout,

    #[error("{0}")]
    Origin(String),

    #[error("too many requests, retry after {retry_after_secs} seconds")]
    RateLimited { tier: Tier, retry_after_secs: u64 },

    /// The upstream answered with an error of its own.
    #[error("{message}")]
    Upstream {
        code: u16,
        message: String,
        raw: Option<String>,
    },

    /// The upstream answered successfully but without the expected fields.
    #[error("unexpected response format")]
    UnexpectedFormat { raw: String },

    #[error("{0}")]
    Transport(TransportKind),

    #[error("timeout")]
    Timeout,

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            GatewayError::Origin(_) => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Upstream { code, .. } => passthrough_status(*code),
            GatewayError::UnexpectedFormat { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Transport(kind) => kind.status(),
            GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }
}

/// Upstream codes inside 400..=599 pass through, anything else becomes 500.
fn passthrough_status(code: u16) -> StatusCode {
    if (400..=599).contains(&code) {
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}
