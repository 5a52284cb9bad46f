//! Credential-holding gateway in front of a generative-content API.
//!
//! Browsers call the gateway; the gateway admits them by origin, rate limits
//! them per IP, and forwards generation requests upstream with a server-held
//! key and a hard deadline.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod upstream;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
