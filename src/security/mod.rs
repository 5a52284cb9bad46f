//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → origin.rs (whitelist check, preflight decision)
//!     → rate_limit.rs (coarse tier, then strict tier on /api/generate)
//!     → headers.rs (CORS headers on the way out)
//!     → Pass to handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any admission failure
//! - No trust in client input; `X-Forwarded-For` only when configured

pub mod headers;
pub mod origin;
pub mod rate_limit;

pub use origin::{OriginDecision, OriginPolicy};
pub use rate_limit::{Clock, Decision, ManualClock, RateLimiter, SystemClock, Tier};
