//! Multi-scope circuit breaker composition, keyed per `(site, scope)` (§4.3).

use super::{CircuitBreakerConfig, CircuitBreakerPolicy, CircuitState};
use super::scope::{IntegrationFailure, Scope};
use crate::adaptive::Adaptive;
use crate::clock::{Clock, MonotonicClock};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Overall recommendation derived from a site's health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Snapshot returned by `CircuitBreakerManager::status`.
#[derive(Debug, Clone)]
pub struct CircuitStatus {
    pub per_scope: HashMap<Scope, CircuitState>,
    pub health_score: u32,
    pub recommendation: Recommendation,
}

struct SiteBreakers {
    by_scope: HashMap<Scope, CircuitBreakerPolicy>,
    adaptive_threshold: Adaptive<u32>,
}

/// Composes the four per-site breakers (`rate_limiter`, `error_handler`,
/// `adapter`, `global`), routes weighted failures to the scope that
/// produced them (and to `global` when the weight is high enough), and
/// answers admission and health-score queries.
pub struct CircuitBreakerManager {
    sites: Mutex<HashMap<String, SiteBreakers>>,
    base_config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerManager {
    pub fn new(base_config: CircuitBreakerConfig) -> Self {
        Self { sites: Mutex::new(HashMap::new()), base_config, clock: Arc::new(MonotonicClock::default()) }
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn new_site(&self) -> SiteBreakers {
        let mut by_scope = HashMap::new();
        for scope in Scope::ALL {
            by_scope.insert(scope, self.new_scope_breaker());
        }
        SiteBreakers { by_scope, adaptive_threshold: Adaptive::new(self.base_config.failure_threshold as u32) }
    }

    fn new_scope_breaker(&self) -> CircuitBreakerPolicy {
        CircuitBreakerPolicy::new(self.base_config).with_clock(ClonedClock(self.clock.clone()))
    }

    fn with_site<R>(&self, site: &str, f: impl FnOnce(&SiteBreakers) -> R) -> R {
        let mut sites = self.sites.lock().expect("circuit breaker manager mutex poisoned");
        let entry = sites.entry(site.to_string()).or_insert_with(|| self.new_site());
        f(entry)
    }

    /// Admission per §4.3/§8 property 6: permitted iff both `global` and
    /// the scope-specific breaker for `scope` permit it.
    pub fn is_call_permitted(&self, site: &str, scope: Scope) -> bool {
        self.with_site(site, |s| {
            let global_ok = s.by_scope[&Scope::Global].is_call_permitted();
            if scope == Scope::Global {
                return global_ok;
            }
            let scope_ok = s.by_scope[&scope].is_call_permitted();
            global_ok && scope_ok
        })
    }

    /// Route a weighted failure to its origin scope, and to `global` when
    /// the failure's weight is ≥ 0.8. Admission is decided against the
    /// site's adaptive threshold (§4.3), not the static config threshold.
    pub fn report_failure(&self, site: &str, failure: IntegrationFailure) {
        self.with_site(site, |s| {
            let threshold = *s.adaptive_threshold.get() as usize;
            s.by_scope[&failure.origin_scope()].report_with_threshold(false, threshold);
            if failure.propagates_to_global() {
                s.by_scope[&Scope::Global].report_with_threshold(false, threshold);
            }
        });
    }

    /// Report success for a scope (and `global`, mirroring the failure path).
    pub fn report_success(&self, site: &str, scope: Scope) {
        self.with_site(site, |s| {
            s.by_scope[&scope].report(true);
            if scope != Scope::Global {
                s.by_scope[&Scope::Global].report(true);
            }
        });
    }

    /// Current effective adaptive threshold for a site, clamped to
    /// `[1, 10 * base]` (§4.3, open question §9.3).
    pub fn adaptive_threshold(&self, site: &str) -> u32 {
        self.with_site(site, |s| *s.adaptive_threshold.get())
    }

    /// Adjust the adaptive threshold linearly against an observed
    /// requests-per-minute rate relative to a configured baseline rate.
    /// Clamped to `[1, 10 * base]` per §4.3.
    pub fn adjust_adaptive_threshold(&self, site: &str, observed_rpm: f64, baseline_rpm: f64) {
        let base = self.base_config.failure_threshold as u32;
        let min = 1u32;
        let max = base.saturating_mul(10);
        self.with_site(site, |s| {
            s.adaptive_threshold.update(|_| {
                if baseline_rpm <= 0.0 {
                    return base;
                }
                let ratio = (observed_rpm / baseline_rpm).clamp(0.1, 10.0);
                let scaled = (base as f64 * ratio).round() as u32;
                scaled.clamp(min, max)
            });
        });
    }

    /// Health score `100 − 25·open − 10·half_open` across the four scopes (§4.3).
    pub fn status(&self, site: &str) -> CircuitStatus {
        self.with_site(site, |s| {
            let mut per_scope = HashMap::new();
            let mut open = 0u32;
            let mut half_open = 0u32;
            for scope in Scope::ALL {
                let state = s.by_scope[&scope].current_state();
                match state {
                    CircuitState::Open => open += 1,
                    CircuitState::HalfOpen => half_open += 1,
                    CircuitState::Closed => {}
                }
                per_scope.insert(scope, state);
            }
            let health_score = 100u32.saturating_sub(25 * open).saturating_sub(10 * half_open);
            let recommendation = if open > 0 {
                Recommendation::Unhealthy
            } else if half_open > 0 {
                Recommendation::Degraded
            } else {
                Recommendation::Healthy
            };
            CircuitStatus { per_scope, health_score, recommendation }
        })
    }
}

/// Thin `Clock` forwarder so each per-scope breaker can hold its own
/// `Arc<dyn Clock>` while all sharing the manager's clock instance.
#[derive(Debug)]
struct ClonedClock(Arc<dyn Clock>);

impl Clock for ClonedClock {
    fn now_millis(&self) -> u64 {
        self.0.now_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    fn manager(clock: ManualClock) -> CircuitBreakerManager {
        CircuitBreakerManager::new(CircuitBreakerConfig {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(5),
            half_open_max_calls: 2,
        })
        .with_clock(clock)
    }

    #[test]
    fn admission_requires_both_global_and_scope() {
        let clock = ManualClock::new();
        let mgr = manager(clock);
        assert!(mgr.is_call_permitted("alibaba", Scope::Adapter));

        for _ in 0..3 {
            mgr.report_failure("alibaba", IntegrationFailure::RateLimitExceeded);
        }
        // RateLimitExceeded (weight 0.5) only opens the rate_limiter scope.
        assert!(!mgr.is_call_permitted("alibaba", Scope::RateLimiter));
        assert!(mgr.is_call_permitted("alibaba", Scope::Adapter));
    }

    #[test]
    fn high_weight_failure_also_opens_global() {
        let clock = ManualClock::new();
        let mgr = manager(clock);
        for _ in 0..3 {
            mgr.report_failure("flytoday", IntegrationFailure::NetworkError);
        }
        assert!(!mgr.is_call_permitted("flytoday", Scope::Global));
        assert!(!mgr.is_call_permitted("flytoday", Scope::Adapter));
    }

    #[test]
    fn health_score_reflects_open_scopes() {
        let clock = ManualClock::new();
        let mgr = manager(clock);
        assert_eq!(mgr.status("site").health_score, 100);

        for _ in 0..3 {
            mgr.report_failure("site", IntegrationFailure::AdapterFailure);
        }
        let status = mgr.status("site");
        assert!(status.health_score <= 100 - 25);
        assert_eq!(status.recommendation, Recommendation::Unhealthy);
    }

    #[test]
    fn adaptive_threshold_stays_within_bounds() {
        let clock = ManualClock::new();
        let mgr = manager(clock);
        mgr.adjust_adaptive_threshold("site", 1000.0, 10.0);
        assert_eq!(mgr.adaptive_threshold("site"), 30); // 10 * base(3)

        mgr.adjust_adaptive_threshold("site", 0.1, 100.0);
        assert_eq!(mgr.adaptive_threshold("site"), 1);
    }

    #[test]
    fn adaptive_threshold_raises_the_bar_before_opening() {
        let clock = ManualClock::new();
        let mgr = manager(clock);
        // Raise the threshold to 6 (double the base of 3) before any failures land.
        mgr.adjust_adaptive_threshold("site", 20.0, 10.0);
        assert_eq!(mgr.adaptive_threshold("site"), 6);

        for _ in 0..3 {
            mgr.report_failure("site", IntegrationFailure::AdapterFailure);
        }
        // Three failures no longer trip the breaker once the threshold is raised.
        assert!(mgr.is_call_permitted("site", Scope::Adapter));

        for _ in 0..3 {
            mgr.report_failure("site", IntegrationFailure::AdapterFailure);
        }
        assert!(!mgr.is_call_permitted("site", Scope::Adapter));
    }

    #[test]
    fn sites_are_independent() {
        let clock = ManualClock::new();
        let mgr = manager(clock);
        for _ in 0..3 {
            mgr.report_failure("a", IntegrationFailure::AdapterFailure);
        }
        assert!(!mgr.is_call_permitted("a", Scope::Adapter));
        assert!(mgr.is_call_permitted("b", Scope::Adapter));
    }
}
