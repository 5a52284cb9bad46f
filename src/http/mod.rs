//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → pipeline.rs admission (access log, origin, coarse limit)
//!     → server.rs route dispatch
//!     → pipeline.rs generate (strict limit, validate, proxy, normalize)
//!     → response.rs (envelope, CORS headers applied on the way out)
//!     → Send to client
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use pipeline::Services;
pub use request::{RequestMeta, X_REQUEST_ID};
pub use response::{ErrorEnvelope, SuccessBody};
pub use server::{build_router, GatewayServer};
