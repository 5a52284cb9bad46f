//! Origin admission.
//!
//! The whitelist is built once from configuration and never mutated.

use std::collections::HashSet;

use crate::config::CorsConfig;
use crate::error::GatewayError;

/// Token that admits every origin.
pub const WILDCARD: &str = "*";

/// Admission decision for a declared origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginDecision {
    /// No `Origin` header: same-process or server-to-server call.
    NoOrigin,
    /// Origin admitted; the value is echoed back in CORS headers.
    Allowed(String),
}

/// Read-only origin whitelist.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    origins: HashSet<String>,
    wildcard: bool,
}

impl OriginPolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let origins: HashSet<String> = origins.into_iter().map(Into::into).collect();
        let wildcard = origins.contains(WILDCARD);
        Self { origins, wildcard }
    }

    pub fn from_config(config: &CorsConfig) -> Self {
        Self::new(config.allowed_origins.iter().cloned())
    }

    pub fn allows_any(&self) -> bool {
        self.wildcard
    }

    /// Decide whether `origin` may use the gateway.
    ///
    /// Matching is exact: scheme, host and port must all agree.
    pub fn check(&self, origin: Option<&str>) -> Result<OriginDecision, GatewayError> {
        let Some(origin) = origin else {
            return Ok(OriginDecision::NoOrigin);
        };

        if self.wildcard || self.origins.contains(origin) {
            Ok(OriginDecision::Allowed(origin.to_string()))
        } else {
            tracing::warn!(origin = %origin, "Origin not allowed");
            Err(GatewayError::Origin("origin not allowed".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_origin_always_allowed() {
        let policy = OriginPolicy::new(Vec::<String>::new());
        assert_eq!(policy.check(None).unwrap(), OriginDecision::NoOrigin);
    }

    #[test]
    fn test_exact_match_only() {
        let policy = OriginPolicy::new(["https://grants.example.org"]);

        assert_eq!(
            policy.check(Some("https://grants.example.org")).unwrap(),
            OriginDecision::Allowed("https://grants.example.org".into())
        );
        for origin in [
            "https://grants.example.org/",
            "http://grants.example.org",
            "https://grants.example.org:8443",
            "https://evil.grants.example.org",
            "",
        ] {
            let err = policy.check(Some(origin)).unwrap_err();
            assert!(matches!(err, GatewayError::Origin(_)), "{origin} should be rejected");
        }
    }

    #[test]
    fn test_wildcard_allows_everything() {
        let policy = OriginPolicy::new(["https://a.example.com", "*"]);
        assert!(policy.allows_any());
        assert!(policy.check(Some("https://anything.test")).is_ok());
    }
}
