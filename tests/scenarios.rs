//! End-to-end scenarios wiring the full coordination core together:
//! rate limiter, circuit breaker, error handler, adapter template, safety
//! crawler, and scheduler, rather than any one module in isolation.

use async_trait::async_trait;
use skywarden::adapter::{AdapterConfig, AdapterTemplate, SiteSession};
use skywarden::circuit_breaker::CircuitBreakerManager;
use skywarden::config::{AdapterConfigDocument, CircuitBreakerSection, DataValidationSection, ErrorHandlingSection, ExtractionConfigSection, MonitoringSection, RateLimitingSection};
use skywarden::error_handler::ErrorHandler;
use skywarden::flight::{SearchParams, SeatClass};
use skywarden::parsing::RawFields;
use skywarden::rate_limit::{RateLimitConfig, RateLimiter, SiteRateLimiter};
use skywarden::registry::RegistryError;
use skywarden::scheduler::{HealthStatus, ScheduleConfig, Scheduler, ScheduledRoute};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
struct FixedSession {
    elements: Vec<RawFields>,
}

#[async_trait]
impl SiteSession for FixedSession {
    async fn navigate(&self, _url: &str) -> Result<(), String> {
        Ok(())
    }
    async fn submit(&self) -> Result<(), String> {
        Ok(())
    }
    async fn extract_elements(&self) -> Result<Vec<RawFields>, String> {
        Ok(self.elements.clone())
    }
}

#[derive(Debug)]
struct AlwaysFailingSession;

#[async_trait]
impl SiteSession for AlwaysFailingSession {
    async fn navigate(&self, _url: &str) -> Result<(), String> {
        Err("connection reset".to_string())
    }
    async fn submit(&self) -> Result<(), String> {
        Ok(())
    }
    async fn extract_elements(&self) -> Result<Vec<RawFields>, String> {
        Ok(vec![])
    }
}

fn alibaba_field(airline: &str, price: &str, duration: &str, dep: &str, arr: &str) -> RawFields {
    let mut fields = RawFields::new();
    fields.insert("airline".to_string(), airline.to_string());
    fields.insert("price".to_string(), price.to_string());
    fields.insert("duration".to_string(), duration.to_string());
    fields.insert("departure_time".to_string(), dep.to_string());
    fields.insert("arrival_time".to_string(), arr.to_string());
    fields
}

fn search_params() -> SearchParams {
    SearchParams {
        origin: "THR".to_string(),
        destination: "MHD".to_string(),
        departure_date: "2025-06-10".to_string(),
        seat_class: SeatClass::Economy,
        ..Default::default()
    }
}

/// S1 — happy path against a Persian aggregator: records carry IRR prices
/// in the Persian range, English airline names mapped from the locale
/// table, and a source/scrape stamp attached by the template's normalize
/// step.
#[tokio::test]
async fn s1_persian_happy_path() {
    let rate_limiter: Arc<dyn RateLimiter> = Arc::new(SiteRateLimiter::new(RateLimitConfig::default()));
    let circuit = Arc::new(CircuitBreakerManager::new(Default::default()));
    let error_handler = Arc::new(ErrorHandler::new(circuit.clone()));

    let config = AdapterConfig {
        is_persian_locale: true,
        is_aggregator: true,
        configured_currency: Some("IRR".to_string()),
        price_range: (1_000_000.0, 50_000_000.0),
        duration_range_minutes: (30, 1_440),
        ..Default::default()
    };

    let adapter = AdapterTemplate::new("alibaba", "https://alibaba.ir/search", rate_limiter, error_handler, circuit).with_config(config);

    let elements = vec![
        alibaba_field("ایران ایر", "۲,۵۰۰,۰۰۰", "۱ ساعت ۳۰ دقیقه", "۰۸:۰۰", "۰۹:۳۰"),
        alibaba_field("ماهان", "۳,۱۰۰,۰۰۰", "۲ ساعت", "۱۰:۰۰", "۱۲:۰۰"),
    ];
    let session: Arc<dyn SiteSession> = Arc::new(FixedSession { elements });

    let records = adapter.crawl(session, &search_params()).await.expect("crawl succeeds");

    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.currency, "IRR");
        assert_eq!(record.source_site, "alibaba");
        assert!(record.price >= 1_000_000.0 && record.price <= 50_000_000.0);
        assert!(record.duration_minutes >= 30 && record.duration_minutes <= 1_440);
        assert!(record.arrival_time > record.departure_time);
    }
    assert_eq!(records[0].airline_english.as_deref(), Some("Iran Air"));
}

/// S5 — correlated errors: five failures sharing adapter/operation/error
/// type within the correlation window collapse into one pattern, and
/// records after the first cross-link back to it.
#[tokio::test]
async fn s5_correlated_errors_form_one_pattern() {
    let circuit = Arc::new(CircuitBreakerManager::new(Default::default()));
    let handler = ErrorHandler::new(circuit);

    for _ in 0..5 {
        let context = skywarden::taxonomy::ErrorContext::new("flytoday", "navigate", "sess-1");
        handler
            .handle(&context, "TimeoutError: slow response", skywarden::taxonomy::ErrorCategory::Timeout, skywarden::taxonomy::ErrorSeverity::Medium, skywarden::circuit_breaker::Scope::Adapter)
            .await;
    }

    assert_eq!(handler.pattern_count(), 1, "five identical failures should dedupe into a single pattern");
    assert_eq!(handler.ring_len(), 5);
}

/// S6 — factory cache hit plus fuzzy suggestion on a near-miss name; lives
/// here as an end-to-end sanity check alongside the other scenarios (the
/// exhaustive per-branch coverage is in `registry.rs`'s own unit tests).
#[tokio::test]
async fn s6_registry_cache_and_suggestion_wired_through_full_stack() {
    let circuit = Arc::new(CircuitBreakerManager::new(Default::default()));
    let registry = skywarden::registry::Registry::new(circuit.clone());
    registry.register(skywarden::registry::AdapterMetadata {
        name: "alibaba".to_string(),
        kind: "aggregator".to_string(),
        base_url: "https://alibaba.ir".to_string(),
        search_url: "https://alibaba.ir/search".to_string(),
        currency: "IRR".to_string(),
        feature_tags: vec![],
        strategy: skywarden::registry::CreationStrategy::Direct,
        default_rate_limit: RateLimitConfig::default(),
        active: true,
        config: AdapterConfigDocument {
            name: "alibaba".to_string(),
            base_url: "https://alibaba.ir".to_string(),
            search_url: "https://alibaba.ir/search".to_string(),
            rate_limiting: RateLimitingSection { requests_per_second: 1.0, burst_limit: 5, cooldown_period: Duration::from_secs(60) },
            error_handling: ErrorHandlingSection {
                max_retries: 3,
                retry_delay: Duration::from_secs(1),
                circuit_breaker: CircuitBreakerSection { failure_threshold: 5, recovery_timeout: Duration::from_secs(60), half_open_max_calls: 2 },
            },
            monitoring: MonitoringSection { enabled: true },
            extraction_config: ExtractionConfigSection { required_fields: vec![], currency: Some("IRR".to_string()) },
            data_validation: DataValidationSection { price_range: Some((1_000_000.0, 50_000_000.0)), duration_range_minutes: Some((30, 1_440)) },
        },
    });

    let error_handler = Arc::new(ErrorHandler::new(circuit));
    let first = registry.create_adapter("alibaba", None, false, error_handler.clone()).unwrap();
    let second = registry.create_adapter("alibaba", None, false, error_handler.clone()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let err = registry.create_adapter("alibabaa", None, false, error_handler).unwrap_err();
    match err {
        RegistryError::NotFound(not_found) => assert!(not_found.suggestions.iter().any(|s| s == "alibaba")),
        other => panic!("expected NotFound, got {:?}", other),
    }
}

/// Property 7 — scheduler isolation: a persistently-failing adapter never
/// affects another adapter's success metrics, even after several full
/// intervals of both running concurrently.
#[tokio::test(start_paused = true)]
async fn scheduler_isolates_a_persistently_failing_adapter() {
    let circuit = Arc::new(CircuitBreakerManager::new(Default::default()));
    let scheduler = Arc::new(Scheduler::new(circuit.clone()));

    // Generous per-site budgets so admission never sleeps, and zero retries
    // on the failing adapter so its navigate failure surfaces immediately
    // rather than riding out the recovery strategy's own backoff delay —
    // isolating the property under test (one adapter's failures never slow
    // or skew another's metrics) from unrelated backoff timing.
    let generous_rate_limit = RateLimitConfig { requests_per_second: 1_000.0, burst_limit: 1_000, cooldown_period: Duration::from_secs(60) };
    let no_retry_config = AdapterConfig { max_retries: 0, ..Default::default() };

    let failing_rate_limiter: Arc<dyn RateLimiter> = Arc::new(SiteRateLimiter::new(generous_rate_limit));
    let failing_error_handler = Arc::new(ErrorHandler::new(circuit.clone()));
    let failing_adapter = Arc::new(
        AdapterTemplate::new("broken_site", "https://broken.example/search", failing_rate_limiter, failing_error_handler, circuit.clone()).with_config(no_retry_config),
    );

    let healthy_rate_limiter: Arc<dyn RateLimiter> = Arc::new(SiteRateLimiter::new(generous_rate_limit));
    let healthy_error_handler = Arc::new(ErrorHandler::new(circuit.clone()));
    let healthy_adapter = Arc::new(AdapterTemplate::new("good_site", "https://good.example/search", healthy_rate_limiter, healthy_error_handler, circuit));

    let failing_factory: Arc<dyn Fn() -> Arc<dyn SiteSession> + Send + Sync> = Arc::new(|| Arc::new(AlwaysFailingSession) as Arc<dyn SiteSession>);
    let healthy_factory: Arc<dyn Fn() -> Arc<dyn SiteSession> + Send + Sync> = Arc::new(|| {
        Arc::new(FixedSession { elements: vec![alibaba_field("Lufthansa", "$450", "3h 15m", "08:00", "11:00")] }) as Arc<dyn SiteSession>
    });

    let route = ScheduledRoute { params: search_params() };
    let interval = Duration::from_millis(50);

    let failing_handle = scheduler.spawn(failing_adapter, failing_factory, vec![route.clone()], ScheduleConfig { interval });
    let healthy_handle = scheduler.spawn(healthy_adapter, healthy_factory, vec![route], ScheduleConfig { interval });

    // Let both loops run for a few full intervals.
    tokio::time::sleep(interval * 6).await;

    failing_handle.cancel();
    healthy_handle.cancel();
    failing_handle.join().await;
    healthy_handle.join().await;

    let failing_health = scheduler.health("broken_site");
    let healthy_health = scheduler.health("good_site");

    assert!(failing_health.total_requests >= 3);
    assert_eq!(failing_health.success_rate, 0.0);

    assert!(healthy_health.total_requests >= 3);
    assert_eq!(healthy_health.success_rate, 1.0);
    assert_eq!(healthy_health.status, HealthStatus::Healthy);
}
