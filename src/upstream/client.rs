//! Upstream client for the generative-content API.
//!
//! # Responsibilities
//! - Attach the server-held credential
//! - Forward `{contents, generationConfig}` in a single attempt
//! - Abort the call when its deadline passes
//! - Classify every result into an `UpstreamOutcome`

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::config::{ApiKey, UpstreamConfig};
use crate::error::{GatewayError, TransportKind};
use crate::observability::metrics;
use crate::resilience::{Deadline, Deadlined};
use crate::upstream::types::{truncate_raw, GenerateResponse, GenerationRequest, UpstreamOutcome};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Credential-holding client for the generate endpoint.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<ApiKey>,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .user_agent(concat!("genai-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/v1beta/models/{}:generateContent",
                config.base_url.trim_end_matches('/'),
                config.model
            ),
            api_key: config.api_key.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Forward `request` once, bounded by the configured deadline.
    ///
    /// The deadline is armed on `cancel`; cancelling it from outside aborts
    /// the call the same way. The timer is released before this returns.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<UpstreamOutcome, GatewayError> {
        let key = self.api_key.as_ref().ok_or(GatewayError::Configuration)?;
        let start = Instant::now();

        let deadline = Deadline::arm(cancel, self.timeout);
        let outcome = match deadline.run(self.send(key, request)).await {
            Deadlined::Completed(outcome) => outcome,
            Deadlined::Cancelled => {
                tracing::warn!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Upstream call aborted at deadline"
                );
                UpstreamOutcome::Timeout
            }
        };
        drop(deadline);

        tracing::debug!(
            outcome = outcome.label(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Upstream call finished"
        );
        metrics::record_upstream(outcome.label(), start);
        Ok(outcome)
    }

    async fn send(&self, key: &ApiKey, request: &GenerationRequest) -> UpstreamOutcome {
        let response = match self
            .http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, key.expose())
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return transport_failure(e),
        };

        let status = response.status();
        match response.text().await {
            Ok(body) => interpret(status, &body),
            Err(e) => transport_failure(e),
        }
    }
}

/// Classify a complete upstream response.
pub(crate) fn interpret(status: StatusCode, body: &str) -> UpstreamOutcome {
    let parsed = match serde_json::from_str::<GenerateResponse>(body) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(status = status.as_u16(), error = %e, "Upstream body is not the expected JSON");
            let raw = truncate_raw(body);
            return if status.is_success() {
                UpstreamOutcome::Malformed { raw }
            } else {
                UpstreamOutcome::UpstreamError {
                    code: status.as_u16(),
                    message: reason(status),
                    raw: Some(raw),
                }
            };
        }
    };

    if let Some(error) = parsed.error {
        return UpstreamOutcome::UpstreamError {
            code: error.code.unwrap_or(status.as_u16()),
            message: error.message.unwrap_or_else(|| reason(status)),
            raw: None,
        };
    }

    if !status.is_success() {
        return UpstreamOutcome::UpstreamError {
            code: status.as_u16(),
            message: reason(status),
            raw: Some(truncate_raw(body)),
        };
    }

    match parsed.text() {
        Some(text) => UpstreamOutcome::Success(text),
        None => UpstreamOutcome::Malformed { raw: truncate_raw(body) },
    }
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(|r| r.to_ascii_lowercase())
        .unwrap_or_else(|| "upstream error".to_string())
}

fn transport_failure(e: reqwest::Error) -> UpstreamOutcome {
    if e.is_timeout() {
        tracing::warn!("Upstream connect timed out");
        return UpstreamOutcome::Timeout;
    }
    let e = e.without_url();
    let kind = transport_kind(&e);
    tracing::error!(kind = kind.as_str(), error = %e, "Upstream transport failure");
    UpstreamOutcome::TransportError(kind)
}

/// Walk the error chain looking for the root cause.
fn transport_kind(e: &(dyn std::error::Error + 'static)) -> TransportKind {
    let mut current = Some(e);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return TransportKind::ConnectionRefused;
            }
        }
        let message = err.to_string().to_ascii_lowercase();
        if message.contains("dns error")
            || message.contains("failed to lookup address")
            || message.contains("name or service not known")
        {
            return TransportKind::Resolution;
        }
        current = err.source();
    }
    TransportKind::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapped(std::io::Error);

    impl std::fmt::Display for Wrapped {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "client error (Connect)")
        }
    }

    impl std::error::Error for Wrapped {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_interpret_success() {
        let outcome = interpret(
            StatusCode::OK,
            r#"{"candidates":[{"content":{"parts":[{"text":"Score: 7/10"}]}}]}"#,
        );
        assert_eq!(outcome, UpstreamOutcome::Success("Score: 7/10".into()));
    }

    #[test]
    fn test_interpret_missing_candidates() {
        let outcome = interpret(StatusCode::OK, r#"{"usageMetadata":{}}"#);
        assert_eq!(outcome, UpstreamOutcome::Malformed { raw: r#"{"usageMetadata":{}}"#.into() });
    }

    #[test]
    fn test_interpret_non_json_success() {
        let body = "<html>".repeat(500);
        match interpret(StatusCode::OK, &body) {
            UpstreamOutcome::Malformed { raw } => assert_eq!(raw.chars().count(), 1000),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_interpret_error_body() {
        let outcome = interpret(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#,
        );
        assert_eq!(
            outcome,
            UpstreamOutcome::UpstreamError {
                code: 429,
                message: "Resource has been exhausted".into(),
                raw: None,
            }
        );
    }

    #[test]
    fn test_interpret_bare_error_status() {
        match interpret(StatusCode::BAD_GATEWAY, "upstream proxy failure") {
            UpstreamOutcome::UpstreamError { code, message, raw } => {
                assert_eq!(code, 502);
                assert_eq!(message, "bad gateway");
                assert_eq!(raw.as_deref(), Some("upstream proxy failure"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_transport_kind_from_chain() {
        let refused = Wrapped(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert_eq!(transport_kind(&refused), TransportKind::ConnectionRefused);

        let dns = Wrapped(std::io::Error::new(
            std::io::ErrorKind::Other,
            "dns error: failed to lookup address information",
        ));
        assert_eq!(transport_kind(&dns), TransportKind::Resolution);

        let reset = Wrapped(std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert_eq!(transport_kind(&reset), TransportKind::Other);
    }

    #[test]
    fn test_endpoint_and_credential() {
        let mut config = UpstreamConfig {
            base_url: "http://127.0.0.1:9/".into(),
            ..Default::default()
        };
        let client = UpstreamClient::new(&config).unwrap();
        assert!(!client.has_credential());
        assert_eq!(
            client.endpoint,
            "http://127.0.0.1:9/v1beta/models/gemini-2.0-flash:generateContent"
        );

        config.api_key = Some(ApiKey::new("k"));
        assert!(UpstreamClient::new(&config).unwrap().has_credential());
    }

    #[tokio::test]
    async fn test_missing_credential_is_configuration_error() {
        let client = UpstreamClient::new(&UpstreamConfig::default()).unwrap();
        let request = GenerationRequest {
            contents: vec![serde_json::json!({"parts": [{"text": "x"}]})],
            generation_config: crate::upstream::types::baseline_generation_config(),
        };
        let err = client.generate(&request, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::Configuration));
    }
}
