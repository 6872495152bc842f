//! Safety crawler (§4.7): wraps one `(adapter, searchParams)` attempt with
//! pre-flight checks, timing, and per-site health accounting.

use crate::adapter::{AdapterTemplate, CrawlError, SiteSession};
use crate::flight::{FlightRecord, SearchParams};
use crate::rate_limit::RateLimiter;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const LATENCY_HISTORY: usize = 100;

/// Validates that an adapter's configured URLs are well-formed before a
/// crawl attempt (§4.7 step 2). A stand-in for the external URL validator
/// collaborator named out of this crate's scope.
pub trait UrlValidator: Send + Sync {
    fn validate(&self, url: &str) -> bool;
}

/// Accepts any URL beginning with `http://` or `https://`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicUrlValidator;

impl UrlValidator for BasicUrlValidator {
    fn validate(&self, url: &str) -> bool {
        url.starts_with("http://") || url.starts_with("https://")
    }
}

#[derive(Debug, Clone, Default)]
struct SiteHealth {
    consecutive_failures: u32,
    last_failure_millis: Option<u64>,
    blocked_until_millis: Option<u64>,
    total_attempts: u64,
    total_successes: u64,
    recent_latencies: std::collections::VecDeque<Duration>,
}

impl SiteHealth {
    fn record_latency(&mut self, latency: Duration) {
        if self.recent_latencies.len() >= LATENCY_HISTORY {
            self.recent_latencies.pop_front();
        }
        self.recent_latencies.push_back(latency);
    }
}

/// Snapshot exposed to external observers for mean/percentile computation.
#[derive(Debug, Clone)]
pub struct SiteHealthSnapshot {
    pub consecutive_failures: u32,
    pub total_attempts: u64,
    pub total_successes: u64,
    pub recent_latencies: Vec<Duration>,
    pub blocked: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct SafetyCrawlerConfig {
    pub max_retries: u32,
    pub cooldown_period: Duration,
    pub admission_wait_cap: Duration,
}

impl Default for SafetyCrawlerConfig {
    fn default() -> Self {
        Self { max_retries: 3, cooldown_period: Duration::from_secs(300), admission_wait_cap: Duration::from_secs(5) }
    }
}

/// Reason a `safe_crawl` attempt was refused before the adapter ran.
#[derive(Debug, Clone, PartialEq)]
pub enum SafetyRefusal {
    SiteBlocked { retry_after: Duration },
    InvalidUrl(String),
    CooldownActive { retry_after: Duration },
    RateLimited { wait: Duration },
}

impl std::fmt::Display for SafetyRefusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SafetyRefusal::SiteBlocked { retry_after } => write!(f, "site blocked for another {:?}", retry_after),
            SafetyRefusal::InvalidUrl(url) => write!(f, "invalid target url '{}'", url),
            SafetyRefusal::CooldownActive { retry_after } => write!(f, "cooldown active for another {:?}", retry_after),
            SafetyRefusal::RateLimited { wait } => write!(f, "rate limiter wait {:?} exceeds cap", wait),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SafetyCrawlError {
    Refused(SafetyRefusal),
    Adapter(String),
}

impl std::fmt::Display for SafetyCrawlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SafetyCrawlError::Refused(r) => write!(f, "{}", r),
            SafetyCrawlError::Adapter(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SafetyCrawlError {}

impl From<CrawlError> for SafetyCrawlError {
    fn from(e: CrawlError) -> Self {
        SafetyCrawlError::Adapter(e.to_string())
    }
}

/// Wraps adapter crawl attempts with blocked-site tracking, cooldowns, and
/// a rolling latency history per site (§4.7).
pub struct SafetyCrawler {
    config: SafetyCrawlerConfig,
    health: Mutex<HashMap<String, SiteHealth>>,
    url_validator: Arc<dyn UrlValidator>,
    clock: Arc<dyn crate::clock::Clock>,
}

impl SafetyCrawler {
    pub fn new() -> Self {
        Self {
            config: SafetyCrawlerConfig::default(),
            health: Mutex::new(HashMap::new()),
            url_validator: Arc::new(BasicUrlValidator),
            clock: Arc::new(crate::clock::MonotonicClock::default()),
        }
    }

    pub fn with_config(mut self, config: SafetyCrawlerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_url_validator(mut self, validator: Arc<dyn UrlValidator>) -> Self {
        self.url_validator = validator;
        self
    }

    pub fn with_clock<C: crate::clock::Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    fn now(&self) -> u64 {
        self.clock.now_millis()
    }

    /// §4.7 steps 1-4: pre-flight checks plus a rate-limiter-gated sleep.
    async fn preflight(&self, site: &str, target_url: &str, rate_limiter: &dyn RateLimiter) -> Result<(), SafetyRefusal> {
        let now = self.now();
        {
            let mut health = self.health.lock().unwrap_or_else(|p| p.into_inner());
            let entry = health.entry(site.to_string()).or_default();
            if let Some(blocked_until) = entry.blocked_until_millis {
                if now < blocked_until {
                    return Err(SafetyRefusal::SiteBlocked { retry_after: Duration::from_millis(blocked_until - now) });
                }
                entry.blocked_until_millis = None;
            }
        }

        if !self.url_validator.validate(target_url) {
            return Err(SafetyRefusal::InvalidUrl(target_url.to_string()));
        }

        {
            let health = self.health.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(entry) = health.get(site) {
                if entry.consecutive_failures >= self.config.max_retries {
                    if let Some(last_failure) = entry.last_failure_millis {
                        if now.saturating_sub(last_failure) < self.config.cooldown_period.as_millis() as u64 {
                            let elapsed = now.saturating_sub(last_failure);
                            let remaining = self.config.cooldown_period.as_millis() as u64 - elapsed;
                            return Err(SafetyRefusal::CooldownActive { retry_after: Duration::from_millis(remaining) });
                        }
                    }
                }
            }
        }

        let decision = rate_limiter.can_make_request(site).await;
        if !decision.is_allowed() {
            let wait = decision.wait();
            if wait > self.config.admission_wait_cap {
                return Err(SafetyRefusal::RateLimited { wait });
            }
            tokio::time::sleep(wait).await;
        }

        Ok(())
    }

    fn record_success(&self, site: &str, latency: Duration) {
        let mut health = self.health.lock().unwrap_or_else(|p| p.into_inner());
        let entry = health.entry(site.to_string()).or_default();
        entry.consecutive_failures = 0;
        entry.total_attempts += 1;
        entry.total_successes += 1;
        entry.record_latency(latency);
    }

    fn record_failure(&self, site: &str) {
        let now = self.now();
        let mut health = self.health.lock().unwrap_or_else(|p| p.into_inner());
        let entry = health.entry(site.to_string()).or_default();
        entry.consecutive_failures += 1;
        entry.total_attempts += 1;
        entry.last_failure_millis = Some(now);
        if entry.consecutive_failures >= self.config.max_retries {
            entry.blocked_until_millis = Some(now + self.config.cooldown_period.as_millis() as u64);
            tracing::warn!(site, "safety_crawler: site blocked after repeated failures");
        }
    }

    /// Runs `adapter.crawl` under the pre-flight checks and health
    /// accounting (§4.7). An empty result set counts as a site-health
    /// failure ("no flights" is a crawl success but a health-signal
    /// failure, per §9 open-question decision) while still being returned
    /// to the caller as `Ok(vec![])`.
    pub async fn safe_crawl(
        &self,
        adapter: &AdapterTemplate,
        session: Arc<dyn SiteSession>,
        target_url: &str,
        params: &SearchParams,
        rate_limiter: &dyn RateLimiter,
    ) -> Result<Vec<FlightRecord>, SafetyCrawlError> {
        self.preflight(&adapter.name, target_url, rate_limiter).await.map_err(SafetyCrawlError::Refused)?;

        let start = self.now();
        match adapter.crawl(session, params).await {
            Ok(records) => {
                let latency = Duration::from_millis(self.now().saturating_sub(start));
                if records.is_empty() {
                    self.record_failure(&adapter.name);
                } else {
                    self.record_success(&adapter.name, latency);
                }
                Ok(records)
            }
            Err(e) => {
                self.record_failure(&adapter.name);
                Err(e.into())
            }
        }
    }

    pub fn health_snapshot(&self, site: &str) -> Option<SiteHealthSnapshot> {
        let health = self.health.lock().unwrap_or_else(|p| p.into_inner());
        health.get(site).map(|entry| SiteHealthSnapshot {
            consecutive_failures: entry.consecutive_failures,
            total_attempts: entry.total_attempts,
            total_successes: entry.total_successes,
            recent_latencies: entry.recent_latencies.iter().copied().collect(),
            blocked: entry.blocked_until_millis.map(|until| self.now() < until).unwrap_or(false),
        })
    }
}

impl Default for SafetyCrawler {
    fn default() -> Self {
        Self::new()
    }
}
