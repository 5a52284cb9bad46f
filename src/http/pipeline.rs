//! Request pipeline.
//!
//! Each stage is a plain function of the request metadata and the shared
//! services. `Ok` means "continue with the next stage", `Err` is the response.
//! The axum layer in `server.rs` only adapts these to middleware and
//! handlers, so every stage can be exercised without a running server.
//!
//! ```text
//! admission:  AccessLog → OriginCheck → CoarseLimit → route
//! generate:   StrictLimit → Validate → Proxy → Normalize
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::{read_body, validate_generation, RequestMeta};
use crate::http::response;
use crate::observability::logging;
use crate::security::headers::preflight_headers;
use crate::security::{Decision, OriginDecision, OriginPolicy, RateLimiter, Tier};
use crate::upstream::{GenerationRequest, UpstreamClient, UpstreamOutcome};

/// Named pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AccessLog,
    OriginCheck,
    CoarseLimit,
    StrictLimit,
    Validate,
    Proxy,
    Normalize,
}

/// Stages every request passes before routing.
pub const ADMISSION: [Stage; 3] = [Stage::AccessLog, Stage::OriginCheck, Stage::CoarseLimit];

/// Stages of `POST /api/generate` after admission.
pub const GENERATE: [Stage; 4] = [Stage::StrictLimit, Stage::Validate, Stage::Proxy, Stage::Normalize];

/// Process-lifetime state shared by all requests.
pub struct Services {
    pub config: Arc<GatewayConfig>,
    pub origins: OriginPolicy,
    pub limiter: RateLimiter,
    pub upstream: UpstreamClient,
}

impl Services {
    pub fn new(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        let limiter = RateLimiter::new(&config.rate_limit);
        Self::with_limiter(config, limiter)
    }

    /// Build with a caller-supplied limiter (e.g. one driven by a manual clock).
    pub fn with_limiter(config: GatewayConfig, limiter: RateLimiter) -> Result<Self, reqwest::Error> {
        Ok(Self {
            origins: OriginPolicy::from_config(&config.cors),
            upstream: UpstreamClient::new(&config.upstream)?,
            limiter,
            config: Arc::new(config),
        })
    }
}

pub fn log_access(meta: &RequestMeta) {
    logging::log_access(
        &meta.method,
        &meta.path,
        &meta.client_ip.to_string(),
        meta.origin.as_deref(),
        &meta.request_id,
    );
}

pub fn check_origin(meta: &RequestMeta, services: &Services) -> Result<OriginDecision, GatewayError> {
    services.origins.check(meta.origin.as_deref())
}

/// Answer a CORS preflight. Never touches the limiter or the upstream.
pub fn preflight(meta: &RequestMeta, services: &Services) -> Response {
    match check_origin(meta, services) {
        Ok(decision) => {
            let headers = preflight_headers(&decision, &services.origins, services.config.cors.max_age_secs);
            (StatusCode::NO_CONTENT, headers).into_response()
        }
        Err(e) => response::error_response(&e, services.config.mode),
    }
}

/// Count the request against `tier`.
///
/// The coarse tier only covers `/api` paths; the strict tier is applied by
/// the generate handler alone.
pub fn limit(meta: &RequestMeta, services: &Services, tier: Tier) -> Result<(), GatewayError> {
    if tier == Tier::Coarse && !meta.is_api() {
        return Ok(());
    }
    match services.limiter.check(meta.client_ip, tier) {
        Decision::Admitted { .. } => Ok(()),
        Decision::Rejected { retry_after_secs } => {
            Err(GatewayError::RateLimited { tier, retry_after_secs })
        }
    }
}

pub fn validate(body: &[u8]) -> Result<GenerationRequest, GatewayError> {
    validate_generation(body)
}

/// Forward to the upstream under a fresh cancellation token.
///
/// Refuses with a configuration error when no credential is held.
pub async fn proxy(
    request: &GenerationRequest,
    services: &Services,
    cancel: CancellationToken,
) -> Result<UpstreamOutcome, GatewayError> {
    if !services.upstream.has_credential() {
        tracing::error!("Upstream credential is not configured");
        return Err(GatewayError::Configuration);
    }
    services.upstream.generate(request, cancel).await
}

pub fn normalize(outcome: UpstreamOutcome) -> Result<String, GatewayError> {
    response::normalize(outcome)
}

/// Validate → Proxy → Normalize for a body that already passed the strict tier.
pub async fn forward(
    body: &[u8],
    services: &Services,
    cancel: CancellationToken,
) -> Result<String, GatewayError> {
    let request = validate(body)?;
    let outcome = proxy(&request, services, cancel).await?;
    normalize(outcome)
}

/// Run all generate stages in order.
///
/// The strict slot is taken before the body is read or validated: an
/// oversized, stalled or malformed request still consumes it.
pub async fn generate(
    meta: &RequestMeta,
    body: Body,
    services: &Services,
    cancel: CancellationToken,
) -> Result<String, GatewayError> {
    limit(meta, services, Tier::Strict)?;

    let listener = &services.config.listener;
    let body = read_body(
        body,
        listener.max_body_bytes,
        Duration::from_millis(listener.body_timeout_ms),
    )
    .await?;

    forward(&body, services, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiKey;
    use crate::security::ManualClock;
    use std::net::IpAddr;

    fn services(origins: &[&str], strict_max: u32) -> Services {
        let mut config = GatewayConfig::default();
        config.cors.allowed_origins = origins.iter().map(|s| s.to_string()).collect();
        config.rate_limit.strict.max_requests = strict_max;
        config.rate_limit.coarse.max_requests = 100;
        config.upstream.base_url = "http://127.0.0.1:9".into();
        config.upstream.api_key = Some(ApiKey::new("test-key"));
        let limiter = RateLimiter::with_clock(&config.rate_limit, Arc::new(ManualClock::new()));
        Services::with_limiter(config, limiter).unwrap()
    }

    fn meta(path: &str, origin: Option<&str>) -> RequestMeta {
        RequestMeta {
            method: "POST".into(),
            path: path.into(),
            client_ip: "198.51.100.4".parse::<IpAddr>().unwrap(),
            origin: origin.map(String::from),
            request_id: "test".into(),
        }
    }

    #[test]
    fn test_stage_order() {
        assert_eq!(ADMISSION[0], Stage::AccessLog);
        assert_eq!(GENERATE, [Stage::StrictLimit, Stage::Validate, Stage::Proxy, Stage::Normalize]);
    }

    #[test]
    fn test_origin_stage() {
        let services = services(&["https://app.example.com"], 5);
        assert!(check_origin(&meta("/api/generate", None), &services).is_ok());
        assert!(check_origin(&meta("/api/generate", Some("https://app.example.com")), &services).is_ok());

        let err = check_origin(&meta("/api/generate", Some("https://evil.example")), &services).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_rejected_preflight_leaves_limiter_untouched() {
        let services = services(&["https://app.example.com"], 5);
        let response = preflight(&meta("/api/generate", Some("https://evil.example")), &services);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = preflight(&meta("/api/generate", Some("https://app.example.com")), &services);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(services.limiter.tracked(), 0);
    }

    #[test]
    fn test_coarse_limit_skips_non_api_paths() {
        let services = services(&["*"], 5);
        assert!(limit(&meta("/health", None), &services, Tier::Coarse).is_ok());
        assert_eq!(services.limiter.tracked(), 0);

        assert!(limit(&meta("/api/generate", None), &services, Tier::Coarse).is_ok());
        assert_eq!(services.limiter.tracked(), 1);
    }

    #[tokio::test]
    async fn test_invalid_body_consumes_strict_slot() {
        let services = services(&["*"], 1);
        let m = meta("/api/generate", None);

        let err = generate(&m, Body::from(r#"{"contents":[]}"#), &services, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = generate(&m, Body::from(r#"{"contents":[]}"#), &services, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_oversized_body_consumes_strict_slot() {
        let mut services = services(&["*"], 1);
        Arc::make_mut(&mut services.config).listener.max_body_bytes = 8;
        let m = meta("/api/generate", None);

        let err = generate(&m, Body::from("x".repeat(64)), &services, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let err = generate(&m, Body::from("{}"), &services, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_missing_credential_after_validation() {
        let mut config = GatewayConfig::default();
        config.upstream.api_key = None;
        let services = Services::new(config).unwrap();
        let m = meta("/api/generate", None);

        let err = generate(&m, Body::from(r#"{"contents":[]}"#), &services, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = generate(
            &m,
            Body::from(r#"{"contents":[{"parts":[{"text":"x"}]}]}"#),
            &services,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GatewayError::Configuration));
    }
}
