//! Per-adapter scheduling loop and aggregate health reporting (§4.8).
//!
//! One task per registered adapter, looping over its route list on a fixed
//! interval. Each iteration drives the adapter through `SafetyCrawler::safe_crawl`
//! (§4.7) rather than calling `AdapterTemplate::crawl` directly, so pre-flight
//! checks, blocking, and health accounting run on every scheduled attempt.
//! Cooperative cancellation uses an `Arc<AtomicBool>` flag plus a `Notify` so
//! a cancelled task wakes immediately instead of riding out its current sleep.

use crate::adapter::{AdapterTemplate, SiteSession};
use crate::circuit_breaker::{CircuitBreakerManager, Scope};
use crate::flight::SearchParams;
use crate::safety_crawler::SafetyCrawler;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Samples host-level resource usage between crawl intervals. The default
/// implementation reports nothing; a real deployment supplies one backed by
/// `/proc` or a platform API, kept out of this crate's dependency surface.
pub trait HostMetricsSampler: Send + Sync {
    fn sample(&self) -> Option<f64>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullHostMetricsSampler;

impl HostMetricsSampler for NullHostMetricsSampler {
    fn sample(&self) -> Option<f64> {
        None
    }
}

/// One adapter's route list and polling interval.
#[derive(Debug, Clone)]
pub struct ScheduledRoute {
    pub params: SearchParams,
}

#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    pub interval: Duration,
}

#[derive(Debug, Default)]
struct DomainCounters {
    total: u64,
    successes: u64,
    failures: u64,
    total_duration: Duration,
    min_duration: Option<Duration>,
    max_duration: Option<Duration>,
    last_request_millis: Option<u64>,
    flights_extracted: u64,
}

impl DomainCounters {
    fn record(&mut self, now_millis: u64, duration: Duration, extracted: usize, success: bool) {
        self.total += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration += duration;
        self.min_duration = Some(self.min_duration.map_or(duration, |m| m.min(duration)));
        self.max_duration = Some(self.max_duration.map_or(duration, |m| m.max(duration)));
        self.last_request_millis = Some(now_millis);
        self.flights_extracted += extracted as u64;
    }

    fn success_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.successes as f64 / self.total as f64
        }
    }
}

/// Aggregate health bucket (§4.8): `healthy` when the success rate clears
/// 0.8 and no breaker scope is open; `degraded` below that rate with all
/// scopes still closed; `unhealthy` whenever any scope is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone)]
pub struct AdapterHealth {
    pub status: HealthStatus,
    pub success_rate: f64,
    pub total_requests: u64,
    pub flights_extracted: u64,
    pub average_duration: Option<Duration>,
}

/// Cooperative stop signal shared between a scheduler handle and its task.
#[derive(Clone)]
struct CancelToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
}

impl CancelToken {
    fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)), notify: Arc::new(tokio::sync::Notify::new()) }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn sleep_or_cancel(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.notify.notified() => {}
        }
    }
}

/// Runs per-adapter crawl loops and aggregates per-site metrics (§4.8).
pub struct Scheduler {
    circuit: Arc<CircuitBreakerManager>,
    safety_crawler: Arc<SafetyCrawler>,
    host_sampler: Arc<dyn HostMetricsSampler>,
    counters: Mutex<HashMap<String, DomainCounters>>,
    clock_millis: AtomicU64,
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl Scheduler {
    pub fn new(circuit: Arc<CircuitBreakerManager>) -> Self {
        Self {
            circuit,
            safety_crawler: Arc::new(SafetyCrawler::new()),
            host_sampler: Arc::new(NullHostMetricsSampler),
            counters: Mutex::new(HashMap::new()),
            clock_millis: AtomicU64::new(0),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_host_sampler(mut self, sampler: Arc<dyn HostMetricsSampler>) -> Self {
        self.host_sampler = sampler;
        self
    }

    fn tick_millis(&self) -> u64 {
        self.clock_millis.fetch_add(1, Ordering::SeqCst)
    }

    fn record(&self, adapter: &str, duration: Duration, extracted: usize, success: bool) {
        let now = self.tick_millis();
        let mut counters = self.counters.lock().unwrap_or_else(|p| p.into_inner());
        counters.entry(adapter.to_string()).or_default().record(now, duration, extracted, success);
        let _ = self.host_sampler.sample();
    }

    /// Spawns the long-running loop for one adapter over its route list.
    /// Returns a handle whose `cancel()` stops the loop at the next
    /// interval boundary (or immediately, if currently sleeping).
    pub fn spawn(
        self: &Arc<Self>,
        adapter: Arc<AdapterTemplate>,
        session_factory: Arc<dyn Fn() -> Arc<dyn SiteSession> + Send + Sync>,
        routes: Vec<ScheduledRoute>,
        config: ScheduleConfig,
    ) -> SchedulerHandle {
        let token = CancelToken::new();
        {
            let mut tokens = self.tokens.lock().unwrap_or_else(|p| p.into_inner());
            tokens.insert(adapter.name.clone(), token.clone());
        }

        let scheduler = self.clone();
        let adapter_name = adapter.name.clone();
        let task_token = token.clone();

        let join = tokio::spawn(async move {
            'outer: loop {
                for route in &routes {
                    if task_token.is_cancelled() {
                        break 'outer;
                    }
                    let session = session_factory();
                    let start = std::time::Instant::now();
                    let result = scheduler
                        .safety_crawler
                        .safe_crawl(&adapter, session, &adapter.search_url, &route.params, adapter.rate_limiter.as_ref())
                        .await;
                    let elapsed = start.elapsed();
                    match result {
                        Ok(records) => scheduler.record(&adapter_name, elapsed, records.len(), true),
                        Err(e) => {
                            tracing::warn!(adapter = %adapter_name, error = %e, "scheduler: crawl failed");
                            scheduler.record(&adapter_name, elapsed, 0, false);
                        }
                    }
                }
                if task_token.is_cancelled() {
                    break;
                }
                task_token.sleep_or_cancel(config.interval).await;
                if task_token.is_cancelled() {
                    break;
                }
            }
        });

        SchedulerHandle { token, join }
    }

    pub fn health(&self, adapter: &str) -> AdapterHealth {
        let counters = self.counters.lock().unwrap_or_else(|p| p.into_inner());
        let entry = counters.get(adapter);
        let success_rate = entry.map(DomainCounters::success_rate).unwrap_or(1.0);
        let any_open = Scope::ALL.iter().any(|&scope| !self.circuit.is_call_permitted(adapter, scope));

        let status = if any_open {
            HealthStatus::Unhealthy
        } else if success_rate >= 0.8 {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        AdapterHealth {
            status,
            success_rate,
            total_requests: entry.map(|c| c.total).unwrap_or(0),
            flights_extracted: entry.map(|c| c.flights_extracted).unwrap_or(0),
            average_duration: entry.filter(|c| c.total > 0).map(|c| c.total_duration / c.total as u32),
        }
    }
}

/// Handle to a running per-adapter loop.
pub struct SchedulerHandle {
    token: CancelToken,
    join: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn join(self) {
        let _ = self.join.await;
    }
}
