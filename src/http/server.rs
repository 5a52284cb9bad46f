//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, admission)
//! - Bind server to listener
//! - Sweep expired rate-limit windows in the background
//! - Stop on the shutdown broadcast

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::pipeline::{self, Services};
use crate::http::request::{RequestMeta, UuidRequestId};
use crate::http::response::{error_response, success_response};
use crate::observability::metrics;
use crate::security::headers::apply_cors;
use crate::security::{RateLimiter, Tier};

/// Extra time the outer request timeout grants beyond the body and upstream
/// deadlines, so those always produce the JSON envelope first.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(5);

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    services: Arc<Services>,
}

impl GatewayServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::from_services(Arc::new(Services::new(config)?)))
    }

    pub fn from_services(services: Arc<Services>) -> Self {
        let router = build_router(services.clone());
        Self { router, services }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweep_every = Duration::from_secs(self.services.config.rate_limit.sweep_interval_secs);
        let sweeper = tokio::spawn(sweep_windows(
            self.services.clone(),
            sweep_every,
            shutdown.resubscribe(),
        ));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        sweeper.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(services: Arc<Services>) -> Router {
    let request_timeout = Duration::from_millis(services.config.listener.body_timeout_ms)
        + services.upstream.timeout()
        + REQUEST_TIMEOUT_SLACK;

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/generate",
            post(generate_handler).fallback(method_not_allowed_handler),
        )
        .route("/api", any(not_found_handler))
        .route("/api/{*rest}", any(not_found_handler))
        .fallback(not_found_handler)
        .layer(middleware::from_fn_with_state(services.clone(), admission))
        .with_state(services)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
}

/// Admission stages shared by every route: access log, origin check,
/// coarse rate limit. Also answers preflights and attaches CORS headers.
async fn admission(
    State(services): State<Arc<Services>>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let mode = services.config.mode;
    let meta = RequestMeta::from_request(&request, services.config.rate_limit.trust_forwarded_for);

    pipeline::log_access(&meta);

    if request.method() == Method::OPTIONS {
        let response = pipeline::preflight(&meta, &services);
        metrics::record_request(route_label(&meta), response.status().as_u16(), start);
        return response;
    }

    let decision = match pipeline::check_origin(&meta, &services) {
        Ok(decision) => decision,
        Err(e) => {
            let response = error_response(&e, mode);
            metrics::record_request(route_label(&meta), response.status().as_u16(), start);
            return response;
        }
    };

    let mut response = match pipeline::limit(&meta, &services, Tier::Coarse) {
        Ok(()) => {
            request.extensions_mut().insert(meta.clone());
            next.run(request).await
        }
        Err(e) => error_response(&e, mode),
    };

    apply_cors(response.headers_mut(), &decision);
    metrics::record_request(route_label(&meta), response.status().as_u16(), start);
    response
}

fn route_label(meta: &RequestMeta) -> &'static str {
    match meta.path.as_str() {
        "/health" => "health",
        "/api/generate" => "generate",
        _ => "other",
    }
}

async fn health_handler(State(services): State<Arc<Services>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": services.config.service_name,
    }))
}

/// `POST /api/generate`.
///
/// Dropping this future (client gone, outer timeout) drops the upstream call
/// and its deadline timer with it.
async fn generate_handler(State(services): State<Arc<Services>>, request: Request) -> Response {
    let mode = services.config.mode;
    let meta = match request.extensions().get::<RequestMeta>() {
        Some(meta) => meta.clone(),
        None => RequestMeta::from_request(&request, services.config.rate_limit.trust_forwarded_for),
    };

    let result = pipeline::generate(&meta, request.into_body(), &services, CancellationToken::new()).await;

    match result {
        Ok(text) => success_response(text),
        Err(e) => {
            tracing::warn!(
                request_id = %meta.request_id,
                status = e.status().as_u16(),
                error = %e,
                "Generation failed"
            );
            error_response(&e, mode)
        }
    }
}

async fn not_found_handler(State(services): State<Arc<Services>>) -> Response {
    error_response(&GatewayError::NotFound, services.config.mode)
}

async fn method_not_allowed_handler(State(services): State<Arc<Services>>) -> Response {
    error_response(&GatewayError::MethodNotAllowed, services.config.mode)
}

async fn sweep_windows(
    services: Arc<Services>,
    every: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let limiter: &RateLimiter = &services.limiter;
    let mut ticker = tokio::time::interval(every);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                limiter.sweep();
            }
            _ = shutdown.recv() => {
                tracing::debug!("Rate-limit sweeper exiting");
                break;
            }
        }
    }
}
