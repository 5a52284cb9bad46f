//! Wire types for the generative-content API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TransportKind;

/// Upper bound, in characters, for diagnostic text kept from upstream bodies.
pub const RAW_LIMIT: usize = 1000;

/// A validated generation request, forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Ordered, non-empty content parts.
    pub contents: Vec<Value>,
    pub generation_config: Value,
}

/// Generation config used when the client sends none: structured JSON output.
pub fn baseline_generation_config() -> Value {
    serde_json::json!({ "responseMimeType": "application/json" })
}

/// Result of one upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamOutcome {
    /// Candidate text.
    Success(String),
    /// A 2xx response without the expected candidate fields.
    Malformed { raw: String },
    /// The upstream reported an error.
    UpstreamError {
        code: u16,
        message: String,
        raw: Option<String>,
    },
    TransportError(TransportKind),
    Timeout,
}

impl UpstreamOutcome {
    /// Label used in metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            UpstreamOutcome::Success(_) => "success",
            UpstreamOutcome::Malformed { .. } => "malformed",
            UpstreamOutcome::UpstreamError { .. } => "upstream_error",
            UpstreamOutcome::TransportError(_) => "transport_error",
            UpstreamOutcome::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let parts = &self.candidates.as_ref()?.first()?.content.as_ref()?.parts;
        let texts: Vec<&str> = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.concat())
        }
    }
}

/// Truncate `s` to at most `RAW_LIMIT` characters.
pub fn truncate_raw(s: &str) -> String {
    match s.char_indices().nth(RAW_LIMIT) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
