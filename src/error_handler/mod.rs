//! Central error sink (§4.4): builds records, maintains the bounded ring
//! and pattern table, correlates recent failures, drives the circuit
//! breaker, and decides whether the caller should retry.

pub mod alerts;
pub mod correlation;
pub mod pattern;
pub mod recovery;

use crate::circuit_breaker::{CircuitBreakerManager, IntegrationFailure, Scope};
use crate::clock::{Clock, MonotonicClock};
use crate::taxonomy::{ErrorAction, ErrorCategory, ErrorContext, ErrorRecord, ErrorSeverity, Resolution};
use alerts::{emit_best_effort, AlertSink, NullSink};
use pattern::PatternTable;
use recovery::RecoveryTable;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DEFAULT_RING_CAPACITY: usize = 10_000;
const HEALTH_WINDOW_MILLIS: u64 = 5 * 60 * 1000;
const HEALTH_MAX_RECORDS: usize = 20;
const HEALTH_MAX_CRITICAL: usize = 3;

#[derive(Debug, Clone)]
pub struct ErrorHandlerConfig {
    pub ring_capacity: usize,
    pub correlation_threshold: f64,
    pub correlation_window_millis: u64,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            ring_capacity: DEFAULT_RING_CAPACITY,
            correlation_threshold: correlation::DEFAULT_THRESHOLD,
            correlation_window_millis: correlation::DEFAULT_WINDOW_MILLIS,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ErrorMetrics {
    pub total_errors: u64,
    pub by_severity: std::collections::HashMap<ErrorSeverity, u64>,
    pub by_category: std::collections::HashMap<ErrorCategory, u64>,
    pub by_adapter: std::collections::HashMap<String, u64>,
}

impl ErrorMetrics {
    fn record(&mut self, record: &ErrorRecord) {
        self.total_errors += 1;
        *self.by_severity.entry(record.severity).or_insert(0) += 1;
        *self.by_category.entry(record.category).or_insert(0) += 1;
        *self.by_adapter.entry(record.context.adapter.clone()).or_insert(0) += 1;
    }
}

/// Decision returned by [`ErrorHandler::handle`] (§4.4 steps 6-7).
#[derive(Debug, Clone, PartialEq)]
pub struct HandleOutcome {
    pub should_retry: bool,
    pub strategy_id: Option<String>,
    pub delay: Option<Duration>,
}

fn failure_for(category: ErrorCategory) -> IntegrationFailure {
    match category {
        ErrorCategory::RateLimit => IntegrationFailure::RateLimitExceeded,
        ErrorCategory::Timeout => IntegrationFailure::Timeout,
        ErrorCategory::Network => IntegrationFailure::NetworkError,
        ErrorCategory::Validation => IntegrationFailure::ValidationError,
        _ => IntegrationFailure::AdapterFailure,
    }
}

fn action_for(category: ErrorCategory, has_strategy: bool) -> ErrorAction {
    if !has_strategy {
        return ErrorAction::Skip;
    }
    match category {
        ErrorCategory::Authentication | ErrorCategory::Captcha => ErrorAction::Escalate,
        _ => ErrorAction::Retry,
    }
}

pub struct ErrorHandler {
    config: ErrorHandlerConfig,
    ring: Mutex<VecDeque<ErrorRecord>>,
    metrics: Mutex<ErrorMetrics>,
    patterns: Mutex<PatternTable>,
    recovery: RecoveryTable,
    circuit: Arc<CircuitBreakerManager>,
    sinks: Vec<Box<dyn AlertSink>>,
    clock: Arc<dyn Clock>,
    started_at_millis: AtomicU64,
}

impl ErrorHandler {
    pub fn new(circuit: Arc<CircuitBreakerManager>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::default());
        let started_at_millis = clock.now_millis();
        Self {
            config: ErrorHandlerConfig::default(),
            ring: Mutex::new(VecDeque::new()),
            metrics: Mutex::new(ErrorMetrics::default()),
            patterns: Mutex::new(PatternTable::new()),
            recovery: RecoveryTable::builtin(),
            circuit,
            sinks: vec![Box::new(NullSink)],
            clock,
            started_at_millis: AtomicU64::new(started_at_millis),
        }
    }

    pub fn with_config(mut self, config: ErrorHandlerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(clock);
        self.started_at_millis.store(clock.now_millis(), Ordering::Relaxed);
        self.clock = clock;
        self
    }

    pub fn with_sinks(mut self, sinks: Vec<Box<dyn AlertSink>>) -> Self {
        self.sinks = sinks;
        self
    }

    /// §4.4 steps 1-8: build, store, correlate, update the breaker, choose
    /// a recovery strategy, and alert if severe enough.
    pub async fn handle(&self, context: &ErrorContext, message: impl Into<String>, category: ErrorCategory, severity: ErrorSeverity, scope: Scope) -> HandleOutcome {
        let message = message.into();
        let now_millis = self.clock.now_millis();
        let elapsed_since_start = Duration::from_millis(now_millis.saturating_sub(self.started_at_millis.load(Ordering::Relaxed)));

        let hash = pattern::pattern_hash(error_type_label(category), &context.adapter, &context.operation, &message);

        let mut record = ErrorRecord {
            context: context.clone(),
            message,
            category,
            severity,
            action: ErrorAction::Skip,
            resolution: Resolution::Unresolved,
            related_errors: Vec::new(),
            pattern_hash: hash,
            recorded_at_millis: now_millis,
            elapsed_since_start,
        };

        let related = self.correlate(&record, now_millis);
        record.related_errors = related;

        {
            let mut patterns = self.patterns.lock().unwrap_or_else(|p| p.into_inner());
            patterns.record(&record, now_millis);
        }

        self.circuit.report_failure(&context.adapter, failure_for(category));

        let strategy = self.recovery.select(category);
        let admits = self.circuit.is_call_permitted(&context.adapter, scope);
        let attempt_cap = strategy.map(|s| s.max_attempts).unwrap_or(u32::MAX);
        let should_retry = context.retry_count < context.max_retries.min(attempt_cap) && admits && strategy.is_some();
        record.action = action_for(category, strategy.is_some());

        let delay = if should_retry { strategy.map(|s| s.backoff.delay((context.retry_count + 1) as usize)) } else { None };
        let strategy_id = if should_retry { strategy.map(|s| s.id.to_string()) } else { None };

        {
            let mut metrics = self.metrics.lock().unwrap_or_else(|p| p.into_inner());
            metrics.record(&record);
        }
        {
            let mut ring = self.ring.lock().unwrap_or_else(|p| p.into_inner());
            if ring.len() >= self.config.ring_capacity {
                ring.pop_front();
            }
            ring.push_back(record.clone());
        }

        if severity.triggers_alert() {
            for sink in &self.sinks {
                emit_best_effort(sink.as_ref(), &record).await;
            }
        }

        HandleOutcome { should_retry, strategy_id, delay }
    }

    fn correlate(&self, record: &ErrorRecord, now_millis: u64) -> Vec<uuid::Uuid> {
        let ring = self.ring.lock().unwrap_or_else(|p| p.into_inner());
        ring.iter()
            .rev()
            .take_while(|r| now_millis.saturating_sub(r.recorded_at_millis) <= self.config.correlation_window_millis)
            .filter(|r| correlation::correlates(record, r, self.config.correlation_threshold, self.config.correlation_window_millis))
            .map(|r| r.context.error_id)
            .collect()
    }

    pub fn metrics(&self) -> ErrorMetrics {
        self.metrics.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn ring_len(&self) -> usize {
        self.ring.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// §4.4 health check: unhealthy if more than 20 records in the last
    /// 5 min, or more than 3 records of severity ≥ critical in that window.
    pub fn is_healthy(&self) -> bool {
        let now_millis = self.clock.now_millis();
        let ring = self.ring.lock().unwrap_or_else(|p| p.into_inner());
        let recent: Vec<&ErrorRecord> = ring.iter().filter(|r| now_millis.saturating_sub(r.recorded_at_millis) <= HEALTH_WINDOW_MILLIS).collect();
        if recent.len() > HEALTH_MAX_RECORDS {
            return false;
        }
        let critical = recent.iter().filter(|r| r.severity >= ErrorSeverity::Critical).count();
        critical <= HEALTH_MAX_CRITICAL
    }

    /// Spawns the background pattern-resolution scan (§4.4 step 5): every
    /// [`pattern::SCAN_INTERVAL`], sweep patterns that have gone silent so the
    /// table doesn't hold onto sites that simply stopped erroring. Cancellable
    /// the same way `Scheduler`'s per-adapter tasks are (§4.8).
    pub fn spawn_pattern_scanner(self: &Arc<Self>) -> PatternScannerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(tokio::sync::Notify::new());
        let handler = self.clone();
        let task_cancelled = cancelled.clone();
        let task_notify = notify.clone();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(pattern::SCAN_INTERVAL) => {}
                    _ = task_notify.notified() => {}
                }
                if task_cancelled.load(Ordering::SeqCst) {
                    break;
                }
                let now_millis = handler.clock.now_millis();
                let mut patterns = handler.patterns.lock().unwrap_or_else(|p| p.into_inner());
                patterns.sweep_stale(now_millis);
            }
        });

        PatternScannerHandle { cancelled, notify, join }
    }
}

/// Handle to the running pattern-scan task; dropping it leaves the task
/// running, same as `SchedulerHandle` — call `cancel()` to stop it.
pub struct PatternScannerHandle {
    cancelled: Arc<AtomicBool>,
    notify: Arc<tokio::sync::Notify>,
    join: tokio::task::JoinHandle<()>,
}

impl PatternScannerHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub async fn join(self) {
        let _ = self.join.await;
    }
}

fn error_type_label(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Network => "NetworkError",
        ErrorCategory::Parsing => "ParsingError",
        ErrorCategory::Validation => "ValidationError",
        ErrorCategory::Timeout => "TimeoutError",
        ErrorCategory::Authentication => "AuthenticationError",
        ErrorCategory::RateLimit => "RateLimitError",
        ErrorCategory::Resource => "ResourceError",
        ErrorCategory::Browser => "BrowserError",
        ErrorCategory::FormFilling => "FormFillingError",
        ErrorCategory::Navigation => "NavigationError",
        ErrorCategory::Captcha => "CaptchaError",
        ErrorCategory::Unknown => "UnknownError",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::clock::ManualClock;
    use alerts::MemorySink;

    fn handler() -> ErrorHandler {
        let circuit = Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default()));
        ErrorHandler::new(circuit)
    }

    #[tokio::test]
    async fn handle_admits_retry_for_retriable_category() {
        let handler = handler();
        let context = ErrorContext::new("flytoday", "navigate", "sess-1");
        let outcome = handler.handle(&context, "connection reset", ErrorCategory::Network, ErrorSeverity::Medium, Scope::Adapter).await;
        assert!(outcome.should_retry);
        assert_eq!(outcome.strategy_id.as_deref(), Some("retry-with-backoff"));
        assert!(outcome.delay.is_some());
    }

    #[tokio::test]
    async fn handle_denies_retry_when_retry_budget_exhausted() {
        let handler = handler();
        let context = ErrorContext::new("flytoday", "navigate", "sess-1").with_max_retries(1);
        let mut context = context;
        context.bump_retry();
        let outcome = handler.handle(&context, "connection reset", ErrorCategory::Network, ErrorSeverity::Medium, Scope::Adapter).await;
        assert!(!outcome.should_retry);
    }

    #[tokio::test]
    async fn handle_denies_retry_once_strategy_attempt_cap_is_reached() {
        // `refresh-page` (Navigation) caps at 2 attempts even though the
        // context itself would allow up to 5 retries.
        let handler = handler();
        let context = ErrorContext::new("flytoday", "navigate", "sess-1").with_max_retries(5);
        let mut context = context;
        context.retry_count = 2;
        let outcome = handler.handle(&context, "stale element", ErrorCategory::Navigation, ErrorSeverity::Medium, Scope::Adapter).await;
        assert!(!outcome.should_retry, "strategy's own max_attempts should bind tighter than context.max_retries");
    }

    #[tokio::test]
    async fn handle_denies_retry_for_uncategorized_failures() {
        let handler = handler();
        let context = ErrorContext::new("flytoday", "navigate", "sess-1");
        let outcome = handler.handle(&context, "mystery", ErrorCategory::Unknown, ErrorSeverity::Low, Scope::Adapter).await;
        assert!(!outcome.should_retry);
        assert!(outcome.strategy_id.is_none());
    }

    #[tokio::test]
    async fn ring_and_metrics_update_on_handle() {
        let handler = handler();
        let context = ErrorContext::new("flytoday", "navigate", "sess-1");
        handler.handle(&context, "connection reset", ErrorCategory::Network, ErrorSeverity::Medium, Scope::Adapter).await;
        assert_eq!(handler.ring_len(), 1);
        assert_eq!(handler.metrics().total_errors, 1);
        assert_eq!(handler.pattern_count(), 1);
    }

    #[tokio::test]
    async fn critical_severity_fires_alert_sink() {
        let sink = Arc::new(MemorySink::new());
        let circuit = Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default()));
        let handler = ErrorHandler::new(circuit).with_sinks(vec![Box::new(ForwardingSink(sink.clone()))]);
        let context = ErrorContext::new("flytoday", "navigate", "sess-1");
        handler.handle(&context, "circuit opened", ErrorCategory::Network, ErrorSeverity::Critical, Scope::Adapter).await;
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn health_check_flags_excess_critical_errors() {
        let handler = handler();
        let context = ErrorContext::new("flytoday", "navigate", "sess-1");
        for _ in 0..4 {
            handler.handle(&context, "down", ErrorCategory::Network, ErrorSeverity::Critical, Scope::Adapter).await;
        }
        assert!(!handler.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn pattern_scanner_sweeps_stale_patterns_on_its_own_schedule() {
        let clock = ManualClock::new();
        let circuit = Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default()));
        let handler = Arc::new(ErrorHandler::new(circuit).with_clock(clock.clone()));
        let context = ErrorContext::new("flytoday", "navigate", "sess-1");
        handler.handle(&context, "connection reset", ErrorCategory::Network, ErrorSeverity::Medium, Scope::Adapter).await;
        assert_eq!(handler.pattern_count(), 1);

        let scan = handler.spawn_pattern_scanner();
        // Push the handler's own clock past the pattern's 24h TTL before the
        // scan's sleep resolves, so the sweep it runs actually evicts
        // something — proof the scan runs unattended, not just on `handle()`.
        clock.advance(25 * 60 * 60 * 1000);
        tokio::time::advance(pattern::SCAN_INTERVAL + Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        scan.cancel();
        scan.join().await;

        assert_eq!(handler.pattern_count(), 0, "background scan should evict the stale pattern without a new handle() call");
    }

    #[derive(Debug)]
    struct ForwardingSink(Arc<MemorySink>);

    #[async_trait::async_trait]
    impl AlertSink for ForwardingSink {
        async fn send(&self, record: &crate::taxonomy::ErrorRecord) -> Result<(), String> {
            self.0.send(record).await
        }
    }
}
