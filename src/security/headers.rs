//! CORS response headers.
//!
//! Headers reflect the decision made by `security::origin`; nothing here
//! decides admission.

use axum::http::{header, HeaderMap, HeaderValue};

use crate::security::origin::{OriginDecision, OriginPolicy};

const ALLOWED_METHODS: &str = "GET, POST, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type";

/// Headers attached to every response for an admitted request.
pub fn apply_cors(headers: &mut HeaderMap, decision: &OriginDecision) {
    if let OriginDecision::Allowed(origin) = decision {
        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

/// Headers for a successful preflight.
pub fn preflight_headers(decision: &OriginDecision, policy: &OriginPolicy, max_age_secs: u64) -> HeaderMap {
    let mut headers = HeaderMap::new();
    match decision {
        OriginDecision::Allowed(_) => apply_cors(&mut headers, decision),
        OriginDecision::NoOrigin if policy.allows_any() => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        }
        OriginDecision::NoOrigin => {}
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age_secs));
    headers
}
