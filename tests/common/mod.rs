//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use genai_gateway::config::{ApiKey, GatewayConfig, Mode};
use genai_gateway::http::{build_router, Services};
use genai_gateway::security::{ManualClock, RateLimiter};

pub const TEST_KEY: &str = "test-key";
pub const APP_ORIGIN: &str = "https://app.example.com";
pub const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

/// Config pointing at `upstream`, with a credential and one allowed origin.
pub fn test_config(upstream: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.mode = Mode::Development;
    config.upstream.base_url = upstream.to_string();
    config.upstream.api_key = Some(ApiKey::new(TEST_KEY));
    config.upstream.timeout_ms = 5_000;
    config.cors.allowed_origins = vec![APP_ORIGIN.to_string()];
    config
}

/// Router plus the clock driving its limiter.
pub struct TestGateway {
    pub router: Router,
    pub services: Arc<Services>,
    pub clock: Arc<ManualClock>,
}

pub fn gateway(config: GatewayConfig) -> TestGateway {
    let clock = Arc::new(ManualClock::new());
    let limiter = RateLimiter::with_clock(&config.rate_limit, clock.clone());
    let services = Arc::new(Services::with_limiter(config, limiter).unwrap());
    TestGateway {
        router: build_router(services.clone()),
        services,
        clock,
    }
}

/// Mock upstream answering generate calls with `body`.
pub async fn upstream_returning(status: u16, body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", TEST_KEY))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

/// Successful upstream body carrying `text`.
pub fn candidate(text: &str) -> Value {
    serde_json::json!({
        "candidates": [{"content": {"parts": [{"text": text}]}}]
    })
}

pub fn generate_body(prompt: &str) -> String {
    serde_json::json!({"contents": [{"parts": [{"text": prompt}]}]}).to_string()
}

/// Build a request as if it arrived from `peer`.
pub fn request(method: &str, uri: &str, origin: Option<&str>, body: Option<String>, peer: &str) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(origin) = origin {
        builder = builder.header("origin", origin);
    }
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let mut request = builder
        .body(body.map(Body::from).unwrap_or_else(Body::empty))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
    request
}

pub fn generate_request(origin: Option<&str>, prompt: &str, peer: &str) -> Request<Body> {
    request("POST", "/api/generate", origin, Some(generate_body(prompt)), peer)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
