//! Recovery-strategy table (§4.4).
//!
//! Grounded on the teacher's `RetryPolicy`/`RetryPolicyBuilder`: each
//! strategy pairs a category match with a `Backoff` the same way the
//! teacher pairs a retry policy with its backoff curve. Selection and
//! success-rate ranking live here; the actual attempt loop lives in
//! [`super::ErrorHandler::handle`], which bounds `context.retry_count`
//! against the selected strategy's `max_attempts` itself rather than
//! delegating to a higher-order runner.

use crate::backoff::Backoff;
use crate::taxonomy::ErrorCategory;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One of the five built-in strategies from the §4.4 table.
#[derive(Debug, Clone)]
pub struct RecoveryStrategy {
    pub id: &'static str,
    pub applicable_categories: &'static [ErrorCategory],
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    success_count: Arc<AtomicU64>,
    attempt_count: Arc<AtomicU64>,
}

impl RecoveryStrategy {
    fn new(id: &'static str, applicable_categories: &'static [ErrorCategory], max_attempts: u32, base_delay: Duration, backoff: Backoff) -> Self {
        Self { id, applicable_categories, max_attempts, base_delay, backoff, success_count: Arc::new(AtomicU64::new(0)), attempt_count: Arc::new(AtomicU64::new(0)) }
    }

    pub fn applies_to(&self, category: ErrorCategory) -> bool {
        self.applicable_categories.contains(&category)
    }

    /// Historical success rate in `[0.0, 1.0]`, used to rank strategies that
    /// both apply to a category (§4.4 step 6). Strategies with no history
    /// default to 1.0 so they get a fair first trial.
    pub fn success_rate(&self) -> f64 {
        let attempts = self.attempt_count.load(Ordering::Relaxed);
        if attempts == 0 {
            return 1.0;
        }
        self.success_count.load(Ordering::Relaxed) as f64 / attempts as f64
    }

    #[cfg(test)]
    fn record_outcome(&self, succeeded: bool) {
        self.attempt_count.fetch_add(1, Ordering::Relaxed);
        if succeeded {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

const NETWORK_TIMEOUT: &[ErrorCategory] = &[ErrorCategory::Network, ErrorCategory::Timeout];
const BROWSER_NAVIGATION: &[ErrorCategory] = &[ErrorCategory::Browser, ErrorCategory::Navigation];
const BROWSER_RESOURCE: &[ErrorCategory] = &[ErrorCategory::Browser, ErrorCategory::Resource];
const AUTH_CAPTCHA: &[ErrorCategory] = &[ErrorCategory::Authentication, ErrorCategory::Captcha];
const PARSING_VALIDATION: &[ErrorCategory] = &[ErrorCategory::Parsing, ErrorCategory::Validation];

/// The five built-in recovery strategies (§4.4 table).
pub struct RecoveryTable {
    strategies: Vec<RecoveryStrategy>,
}

impl RecoveryTable {
    pub fn builtin() -> Self {
        Self {
            strategies: vec![
                RecoveryStrategy::new("retry-with-backoff", NETWORK_TIMEOUT, 3, Duration::from_secs(1), Backoff::exponential(Duration::from_secs(1))),
                RecoveryStrategy::new("refresh-page", BROWSER_NAVIGATION, 2, Duration::from_secs(2), Backoff::constant(Duration::from_secs(2))),
                RecoveryStrategy::new("clear-cache", BROWSER_RESOURCE, 1, Duration::from_secs(5), Backoff::constant(Duration::from_secs(5))),
                RecoveryStrategy::new("change-user-agent", AUTH_CAPTCHA, 2, Duration::from_secs(3), Backoff::constant(Duration::from_secs(3))),
                RecoveryStrategy::new("fallback-extraction", PARSING_VALIDATION, 1, Duration::from_millis(500), Backoff::constant(Duration::from_millis(500))),
            ],
        }
    }

    /// Strategies applicable to `category`, most successful first (§4.4 step 6).
    pub fn applicable(&self, category: ErrorCategory) -> Vec<&RecoveryStrategy> {
        let mut candidates: Vec<&RecoveryStrategy> = self.strategies.iter().filter(|s| s.applies_to(category)).collect();
        candidates.sort_by(|a, b| b.success_rate().partial_cmp(&a.success_rate()).unwrap_or(std::cmp::Ordering::Equal));
        candidates
    }

    /// Highest-ranked applicable strategy, if any category matches.
    pub fn select(&self, category: ErrorCategory) -> Option<&RecoveryStrategy> {
        self.applicable(category).into_iter().next()
    }
}
