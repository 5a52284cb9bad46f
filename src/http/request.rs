//! Request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4)
//! - Extract admission-relevant information (client IP, origin)
//! - Validate the shape of generation requests before forwarding
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Validation fails fast; nothing invalid reaches the upstream
//! - `contents` entries are forwarded verbatim, only their container is checked

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::ConnectInfo,
    http::{header, HeaderMap, HeaderValue, Request},
};
use serde_json::Value;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::upstream::{baseline_generation_config, GenerationRequest};

pub const X_REQUEST_ID: &str = "x-request-id";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Issues a UUID v4 for every request lacking an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// What the admission stages need to know about a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMeta {
    pub method: String,
    pub path: String,
    pub client_ip: IpAddr,
    pub origin: Option<String>,
    pub request_id: String,
}

impl RequestMeta {
    pub fn from_request<B>(request: &Request<B>, trust_forwarded_for: bool) -> Self {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let headers = request.headers();

        Self {
            method: request.method().to_string(),
            path: request.uri().path().to_string(),
            client_ip: client_ip(headers, peer, trust_forwarded_for),
            // Undecodable bytes are kept as replacement characters so the
            // value can never match an allowed origin.
            origin: headers
                .get(header::ORIGIN)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
            request_id: headers
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string(),
        }
    }

    /// Whether the coarse tier covers this path.
    pub fn is_api(&self) -> bool {
        self.path == "/api" || self.path.starts_with("/api/")
    }
}

/// Resolve the client address used as the rate-limit key.
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded_for: bool) -> IpAddr {
    if trust_forwarded_for {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }
    peer.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Read the whole body, bounded in size and in time.
///
/// Any read failure other than the deadline is reported as too large, which
/// is the only way `to_bytes` fails on an intact connection.
pub async fn read_body(body: Body, limit: usize, within: Duration) -> Result<Bytes, GatewayError> {
    match tokio::time::timeout(within, axum::body::to_bytes(body, limit)).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(_)) => Err(GatewayError::PayloadTooLarge),
        Err(_) => {
            tracing::warn!(timeout_ms = within.as_millis() as u64, "Request body not received in time");
            Err(GatewayError::RequestTimeout)
        }
    }
}

/// Check a raw generation body and fill in defaults.
pub fn validate_generation(body: &[u8]) -> Result<GenerationRequest, GatewayError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|_| GatewayError::Validation("request body must be valid JSON".to_string()))?;

    let Value::Object(mut object) = value else {
        return Err(GatewayError::Validation("request body must be a JSON object".to_string()));
    };

    let contents = match object.remove("contents") {
        None | Some(Value::Null) => {
            return Err(GatewayError::Validation("contents is required".to_string()));
        }
        Some(Value::Array(items)) if !items.is_empty() => items,
        Some(_) => {
            return Err(GatewayError::Validation(
                "contents must be a non-empty array".to_string(),
            ));
        }
    };

    let generation_config = match object.remove("generationConfig") {
        None | Some(Value::Null) => baseline_generation_config(),
        Some(config @ Value::Object(_)) => config,
        Some(_) => {
            return Err(GatewayError::Validation(
                "generationConfig must be an object".to_string(),
            ));
        }
    };

    Ok(GenerationRequest { contents, generation_config })
}
