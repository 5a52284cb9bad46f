//! Fixed-window rate limiting with two independent tiers.
//!
//! Counters live in a `DashMap` keyed by `(client IP, tier)`. The entry guard
//! holds the shard lock for the whole check-and-increment, so two concurrent
//! requests from one IP can never both observe `count == max - 1` and both be
//! admitted.

use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::{RateLimitConfig, TierConfig};
use crate::observability::metrics;

/// Rate-limit scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Every route under `/api`.
    Coarse,
    /// The generation route only, layered on top of `Coarse`.
    Strict,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Coarse => "coarse",
            Tier::Strict => "strict",
        }
    }
}

/// Time source for window bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-driven clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|p| p.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|p| p.into_inner());
        self.base + offset
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admitted {
        /// Requests left in the current window.
        remaining: u32,
    },
    Rejected {
        /// Whole seconds until the window resets, at least 1.
        retry_after_secs: u64,
    },
}

impl Decision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Decision::Admitted { .. })
    }
}

#[derive(Debug)]
struct Window {
    count: u32,
    started: Instant,
}

#[derive(Debug, Clone, Copy)]
struct TierLimit {
    enabled: bool,
    window: Duration,
    max: u32,
}

impl From<&TierConfig> for TierLimit {
    fn from(config: &TierConfig) -> Self {
        Self {
            enabled: config.enabled,
            window: Duration::from_secs(config.window_secs),
            max: config.max_requests,
        }
    }
}

/// Per-IP, per-tier request counters.
pub struct RateLimiter {
    windows: DashMap<(IpAddr, Tier), Window>,
    coarse: TierLimit,
    strict: TierLimit,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            coarse: TierLimit::from(&config.coarse),
            strict: TierLimit::from(&config.strict),
            clock,
        }
    }

    fn limit(&self, tier: Tier) -> TierLimit {
        match tier {
            Tier::Coarse => self.coarse,
            Tier::Strict => self.strict,
        }
    }

    /// Count one request from `ip` against `tier`.
    ///
    /// A rejected request is not counted, so a window's count never exceeds
    /// the tier maximum.
    pub fn check(&self, ip: IpAddr, tier: Tier) -> Decision {
        let limit = self.limit(tier);
        if !limit.enabled {
            return Decision::Admitted { remaining: u32::MAX };
        }

        let now = self.clock.now();
        let mut window = self.windows.entry((ip, tier)).or_insert_with(|| Window {
            count: 0,
            started: now,
        });

        let elapsed = now.saturating_duration_since(window.started);
        if elapsed >= limit.window {
            window.count = 0;
            window.started = now;
        }

        if window.count < limit.max {
            window.count += 1;
            return Decision::Admitted {
                remaining: limit.max - window.count,
            };
        }

        let remaining = limit.window.saturating_sub(now.saturating_duration_since(window.started));
        drop(window);

        let retry_after_secs = ceil_secs(remaining).max(1);
        tracing::warn!(client = %ip, tier = tier.as_str(), retry_after_secs, "Rate limit exceeded");
        metrics::record_rate_limited(tier.as_str());
        Decision::Rejected { retry_after_secs }
    }

    /// Drop windows that have already expired. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|(_, tier), window| {
            now.saturating_duration_since(window.started) < self.limit(*tier).window
        });
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            tracing::debug!(removed, tracked = self.windows.len(), "Swept expired rate-limit windows");
        }
        removed
    }

    /// Number of live `(ip, tier)` windows.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 { secs + 1 } else { secs }
}
