//! Per-site rate limiting: token bucket + sliding window + cooldown (C2).
//!
//! Admission (`canMakeRequest`) is non-blocking: it reports whether a
//! request may proceed and, if not, how long the caller should wait.
//! Higher layers (the adapter template, the safety crawler) decide whether
//! to actually sleep that long or fail fast.

mod token_bucket;

pub use token_bucket::SiteRateLimiter;

use async_trait::async_trait;
use std::time::Duration;

/// Per-site rate limit configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst_limit: u32,
    pub cooldown_period: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1.0,
            burst_limit: 5,
            cooldown_period: Duration::from_secs(60),
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Denied { wait: Duration, reason: DenyReason },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    pub fn wait(&self) -> Duration {
        match self {
            Decision::Allowed { .. } => Duration::ZERO,
            Decision::Denied { wait, .. } => *wait,
        }
    }
}

/// Why an admission check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Token bucket exhausted; caller may retry after `wait`.
    BucketEmpty,
    /// The sliding one-minute window cap was reached.
    WindowExceeded,
    /// The site is in a post-rate-limit-failure cooldown.
    Cooldown,
}

/// Interface used by the adapter template and safety crawler to gate and
/// report on outbound requests to a given site.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Non-blocking admission check for `site`.
    async fn can_make_request(&self, site: &str) -> Decision;

    /// Report the outcome of a request already made against `site`.
    /// `success = false` with `rate_limited = true` starts the cooldown
    /// window and feeds the circuit breaker's rate-limiter scope.
    async fn record_request(&self, site: &str, duration: Duration, success: bool, rate_limited: bool);

    /// Register or replace per-site configuration.
    fn configure(&self, site: &str, config: RateLimitConfig);
}
