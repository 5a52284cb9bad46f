//! Timeout enforcement.
//!
//! # Responsibilities
//! - Arm a timer-backed cancellation token for one upstream call
//! - Cancel the in-flight operation cleanly when the deadline passes
//! - Release the timer on every exit path
//!
//! # Design Decisions
//! - Uses Tokio's timer plus a `CancellationToken` the caller can observe
//! - Timeout is a distinct outcome, never folded into transport errors
//! - Timed-out requests return 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Outcome of running a future under a `Deadline`.
#[derive(Debug, PartialEq, Eq)]
pub enum Deadlined<T> {
    Completed(T),
    /// The token fired first; the future was dropped.
    Cancelled,
}

/// A cancellation token that fires after a fixed duration.
///
/// Dropping the deadline aborts the timer task, so nothing outlives the call
/// it guards. The token itself may be cancelled early by the owner.
pub struct Deadline {
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl Deadline {
    /// Arm a new deadline on `token`.
    pub fn arm(token: CancellationToken, after: Duration) -> Self {
        let fire = token.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            fire.cancel();
        });
        Self { token, timer }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Drive `fut` until it completes or the token is cancelled.
    ///
    /// On cancellation `fut` is dropped before this returns, which aborts any
    /// socket it owns.
    pub async fn run<F: Future>(&self, fut: F) -> Deadlined<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Deadlined::Cancelled,
            out = fut => Deadlined::Completed(out),
        }
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
