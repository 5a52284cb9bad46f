//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! GenerationRequest
//!     → client.rs (credential, deadline, single attempt)
//!     → types.rs (parse candidates / error body, bound raw text)
//!     → UpstreamOutcome
//! ```

pub mod client;
pub mod types;

pub use client::UpstreamClient;
pub use types::{baseline_generation_config, truncate_raw, GenerationRequest, UpstreamOutcome, RAW_LIMIT};
