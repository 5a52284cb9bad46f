//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → timeouts.rs (arm deadline, cancel on expiry)
//!     → single attempt, no retries
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No internal retries: the upstream is metered, retry policy belongs
//!   to the client

pub mod timeouts;

pub use timeouts::{Deadline, Deadlined};
