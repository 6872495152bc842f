//! Adapter template (§4.5): enforces the ten-step crawl lifecycle around
//! two overridable capabilities, `FormFiller` and `ElementParser`, matching
//! the teacher's preference for named trait seams over bare closures.

pub mod form_strategy;

use crate::circuit_breaker::{CircuitBreakerManager, Scope};
use crate::error_handler::ErrorHandler;
use crate::flight::{Extensions, FlightRecord, SearchParams};
use crate::parsing::{self, ParseOutcome, ParsingContext, RawFields};
use crate::rate_limit::RateLimiter;
use crate::taxonomy::{ErrorCategory, ErrorContext, ErrorSeverity};
use crate::timeout::TimeoutPolicy;
use crate::ResilienceError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Nested configuration per §4.5/§6. Fields an adapter doesn't use stay at
/// their defaults; `config.rs` validates a deserialized form of this shape.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub required_fields: Vec<String>,
    pub price_range: (f64, f64),
    pub duration_range_minutes: (u32, u32),
    pub max_retries: u32,
    pub admission_wait_cap: Duration,
    pub is_persian_locale: bool,
    pub configured_currency: Option<String>,
    pub is_aggregator: bool,
    pub form_timeout: Duration,
    /// Registry `kind` this adapter was constructed under (§4.5 step 9's
    /// `adapter_type` source metadata); `"generic"` when built outside the
    /// registry.
    pub kind: String,
    /// Step 6 settle delay after submission, before the loading-indicator wait.
    pub settle_delay: Duration,
    /// Step 6 upper bound on how long to wait for a loading indicator to clear.
    pub loading_wait_cap: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            required_fields: vec!["origin".to_string(), "destination".to_string(), "departure_date".to_string()],
            price_range: (0.0, f64::MAX),
            duration_range_minutes: (0, u32::MAX),
            max_retries: 3,
            admission_wait_cap: Duration::from_secs(5),
            is_persian_locale: false,
            configured_currency: None,
            is_aggregator: false,
            form_timeout: Duration::from_secs(30),
            kind: "generic".to_string(),
            settle_delay: Duration::from_millis(500),
            loading_wait_cap: Duration::from_secs(3),
        }
    }
}

/// Wraps a plain `String` failure so it can travel through
/// [`TimeoutPolicy::execute`], which requires `std::error::Error`.
#[derive(Debug, Clone)]
struct FillFailure(String);

impl std::fmt::Display for FillFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for FillFailure {}

/// The site/browser handle an adapter navigates, submits, and extracts
/// from. Concrete adapters supply this; the template never reaches past
/// the trait into transport details.
#[async_trait]
pub trait SiteSession: Send + Sync + std::fmt::Debug {
    async fn navigate(&self, url: &str) -> Result<(), String>;

    /// Step 3: language/currency localization and dismissal of known
    /// popups. Default no-op; sessions that need this override it.
    /// Failures are swallowed as warnings by the template, never surfaced
    /// as a crawl error.
    async fn localize(&self) -> Result<(), String> {
        Ok(())
    }

    /// Fields available for [`form_strategy::run_automated_strategy`]
    /// (§4.5.1). Default reports none, which still runs the automated
    /// strategy but leaves every sub-strategy to fall through to a plain
    /// submit.
    async fn detect_fields(&self) -> Result<Vec<form_strategy::DetectedField>, String> {
        Ok(Vec::new())
    }

    async fn submit(&self) -> Result<(), String>;

    /// Step 6: whether results are still materializing after submission.
    /// Default reports settled immediately.
    async fn is_loading(&self) -> Result<bool, String> {
        Ok(false)
    }

    async fn extract_elements(&self) -> Result<Vec<RawFields>, String>;
    async fn close(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Fills the search form (§4.5 step 5). Adapters may implement this
/// directly or delegate to [`form_strategy::run_automated_strategy`].
#[async_trait]
pub trait FormFiller: Send + Sync + std::fmt::Debug {
    async fn fill_search_form(&self, session: &dyn SiteSession, params: &SearchParams) -> Result<(), String>;
}

/// Default filler: detects whatever fields the session reports and runs
/// them through the automated sub-strategy ladder (§4.5.1), falling
/// through to a bare submit when the session has nothing to report.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFormFiller;

struct SubmitOnlyExecutor<'a>(&'a dyn SiteSession);

#[async_trait]
impl<'a> form_strategy::SubStrategyExecutor for SubmitOnlyExecutor<'a> {
    async fn attempt(&self, _strategy: form_strategy::SubStrategy, _fields: &[form_strategy::DetectedField], _params: &SearchParams) -> Result<(), String> {
        self.0.submit().await
    }
}

#[async_trait]
impl FormFiller for DefaultFormFiller {
    async fn fill_search_form(&self, session: &dyn SiteSession, params: &SearchParams) -> Result<(), String> {
        let fields = session.detect_fields().await.unwrap_or_default();
        let result = form_strategy::run_automated_strategy(&SubmitOnlyExecutor(session), &fields, params).await;
        if result.success {
            Ok(())
        } else {
            Err(result.error_message.unwrap_or_else(|| "automated form strategy exhausted".to_string()))
        }
    }
}

/// Parses one extracted element (§4.5 step 7, dispatching to §4.6).
pub trait ElementParser: Send + Sync + std::fmt::Debug {
    fn parse_flight_element(&self, fields: &RawFields, context: &ParsingContext) -> ParseOutcome;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultElementParser;

impl ElementParser for DefaultElementParser {
    fn parse_flight_element(&self, fields: &RawFields, context: &ParsingContext) -> ParseOutcome {
        let strategy = parsing::auto_detect(context, context.is_persian_locale);
        strategy.parse(fields, context)
    }
}

/// Session bookkeeping supplementing the distillation (original_source's
/// `session_manager.py`): closes the underlying session on every exit path,
/// including early returns and panics that unwind through it.
#[derive(Debug)]
pub struct AdapterSession {
    session: Arc<dyn SiteSession>,
    released: AtomicBool,
}

impl AdapterSession {
    pub fn acquire(session: Arc<dyn SiteSession>) -> Self {
        Self { session, released: AtomicBool::new(false) }
    }

    pub async fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            let _ = self.session.close().await;
        }
    }

    fn handle(&self) -> &dyn SiteSession {
        self.session.as_ref()
    }
}

impl Drop for AdapterSession {
    fn drop(&mut self) {
        if !self.released.load(Ordering::SeqCst) {
            tracing::warn!("adapter session dropped without explicit release");
        }
    }
}

/// Failure surfaced by `crawl`, always carrying a closed-set category.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{category}: {message}")]
pub struct CrawlError {
    pub category: ErrorCategory,
    pub message: String,
}

/// Concrete template value (§9 design note: collapse the source's
/// multi-level adapter hierarchy into one configuration-driven type plus
/// two function hooks).
pub struct AdapterTemplate {
    pub name: String,
    pub search_url: String,
    pub config: AdapterConfig,
    pub form_filler: Arc<dyn FormFiller>,
    pub element_parser: Arc<dyn ElementParser>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub error_handler: Arc<ErrorHandler>,
    pub circuit: Arc<CircuitBreakerManager>,
}

impl std::fmt::Debug for AdapterTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterTemplate")
            .field("name", &self.name)
            .field("search_url", &self.search_url)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AdapterTemplate {
    pub fn new(
        name: impl Into<String>,
        search_url: impl Into<String>,
        rate_limiter: Arc<dyn RateLimiter>,
        error_handler: Arc<ErrorHandler>,
        circuit: Arc<CircuitBreakerManager>,
    ) -> Self {
        Self {
            name: name.into(),
            search_url: search_url.into(),
            config: AdapterConfig::default(),
            form_filler: Arc::new(DefaultFormFiller),
            element_parser: Arc::new(DefaultElementParser),
            rate_limiter,
            error_handler,
            circuit,
        }
    }

    pub fn with_config(mut self, config: AdapterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_form_filler(mut self, filler: Arc<dyn FormFiller>) -> Self {
        self.form_filler = filler;
        self
    }

    pub fn with_element_parser(mut self, parser: Arc<dyn ElementParser>) -> Self {
        self.element_parser = parser;
        self
    }

    fn fail(&self, category: ErrorCategory, message: impl Into<String>) -> CrawlError {
        CrawlError { category, message: message.into() }
    }

    /// Step 1: required-field presence check against `params`.
    fn validate_params(&self, params: &SearchParams) -> Result<(), CrawlError> {
        for field in &self.config.required_fields {
            let present = match field.as_str() {
                "origin" => !params.origin.trim().is_empty(),
                "destination" => !params.destination.trim().is_empty(),
                "departure_date" => !params.departure_date.trim().is_empty(),
                "return_date" => params.return_date.as_deref().is_some_and(|v| !v.trim().is_empty()),
                other => {
                    tracing::debug!(field = other, "unrecognized required field name, skipping");
                    true
                }
            };
            if !present {
                return Err(self.fail(ErrorCategory::Validation, format!("missing required field '{}'", field)));
            }
        }
        Ok(())
    }

    /// Step 2: admission from the rate limiter, sleeping up to the
    /// configured cap; failing fast past it (§5 rate-limit waits).
    async fn acquire_admission(&self) -> Result<(), CrawlError> {
        let decision = self.rate_limiter.can_make_request(&self.name).await;
        if decision.is_allowed() {
            return Ok(());
        }
        let wait = decision.wait();
        if wait > self.config.admission_wait_cap {
            return Err(self.fail(ErrorCategory::RateLimit, format!("rate limiter wait {:?} exceeds cap {:?}", wait, self.config.admission_wait_cap)));
        }
        tokio::time::sleep(wait).await;
        Ok(())
    }

    fn validate_record(&self, record: &FlightRecord) -> bool {
        if record.validate().is_err() {
            return false;
        }
        let (min_price, max_price) = self.config.price_range;
        if record.price < min_price || record.price > max_price {
            return false;
        }
        let (min_dur, max_dur) = self.config.duration_range_minutes;
        record.duration_minutes >= min_dur && record.duration_minutes <= max_dur
    }

    fn normalize_record(&self, mut record: FlightRecord, extensions: Extensions) -> FlightRecord {
        record.source_site = self.name.clone();
        record.scraped_at = SystemTime::now();
        record.extensions.extend(extensions);
        record.extensions.insert("adapter_type".to_string(), self.config.kind.clone());
        record.normalize()
    }

    /// Step 3: best-effort locale/popup handling; failures are logged and
    /// swallowed rather than failing the crawl.
    async fn initialize_session(&self, session: &dyn SiteSession) {
        if let Err(e) = session.localize().await {
            tracing::warn!(adapter = %self.name, error = %e, "adapter.crawl: localization/popup handling failed, continuing");
        }
    }

    /// Step 6: settle delay plus a bounded wait on the loading indicator
    /// before extraction is attempted.
    async fn wait_for_results_to_settle(&self, session: &dyn SiteSession) {
        tokio::time::sleep(self.config.settle_delay).await;
        let deadline = tokio::time::Instant::now() + self.config.loading_wait_cap;
        loop {
            match session.is_loading().await {
                Ok(true) if tokio::time::Instant::now() < deadline => tokio::time::sleep(Duration::from_millis(200)).await,
                _ => break,
            }
        }
    }

    /// Runs the full ten-step lifecycle (§4.5) for one search.
    pub async fn crawl(&self, session: Arc<dyn SiteSession>, params: &SearchParams) -> Result<Vec<FlightRecord>, CrawlError> {
        self.validate_params(params)?;
        self.acquire_admission().await?;

        let adapter_session = AdapterSession::acquire(session);
        let result = self.crawl_with_session(&adapter_session, params).await;
        adapter_session.release().await;
        result
    }

    /// Outer timing/telemetry wrapper: every exit path of [`Self::run_crawl_steps`]
    /// reports its real outcome to the rate limiter (§4.2's S2 cooldown trigger
    /// depends on failure reports actually reaching it) rather than only the
    /// full-success tail.
    async fn crawl_with_session(&self, adapter_session: &AdapterSession, params: &SearchParams) -> Result<Vec<FlightRecord>, CrawlError> {
        let start = std::time::Instant::now();
        let result = self.run_crawl_steps(adapter_session, params).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => {
                self.rate_limiter.record_request(&self.name, elapsed, true, false).await;
                self.circuit.report_success(&self.name, Scope::Adapter);
            }
            Err(e) => {
                let rate_limited = e.category == ErrorCategory::RateLimit;
                self.rate_limiter.record_request(&self.name, elapsed, false, rate_limited).await;
            }
        }

        result
    }

    async fn run_crawl_steps(&self, adapter_session: &AdapterSession, params: &SearchParams) -> Result<Vec<FlightRecord>, CrawlError> {
        let context = ErrorContext::new(self.name.clone(), "crawl", uuid::Uuid::new_v4().to_string()).with_max_retries(self.config.max_retries);

        if !self.circuit.is_call_permitted(&self.name, Scope::Adapter) {
            return Err(self.fail(ErrorCategory::Resource, "adapter circuit is open"));
        }

        let session = adapter_session.handle();

        self.navigate_with_retry(session, &context).await?;
        self.initialize_session(session).await;

        if let Err(e) = self.fill_search_form_with_timeout(session, params).await {
            self.report_and_map(&context, ErrorCategory::FormFilling, e).await?;
        }
        self.wait_for_results_to_settle(session).await;

        let elements = match session.extract_elements().await {
            Ok(elements) => elements,
            Err(e) => return Err(self.report_and_map(&context, ErrorCategory::Parsing, e).await.unwrap_err()),
        };

        let parsing_context = ParsingContext {
            adapter: self.name.clone(),
            is_aggregator_metadata: self.config.is_aggregator,
            is_persian_locale: self.config.is_persian_locale,
            configured_currency: self.config.configured_currency.clone(),
        };

        let mut records = Vec::new();
        let mut dropped = 0usize;
        for fields in &elements {
            let outcome = self.element_parser.parse_flight_element(fields, &parsing_context);
            let Some(data) = outcome.data else {
                dropped += 1;
                continue;
            };
            let record = FlightRecord {
                airline: data.airline,
                airline_english: data.airline_english,
                flight_number: data.flight_number,
                origin: params.origin.clone(),
                destination: params.destination.clone(),
                departure_time: parse_timestamp(&data.departure_time),
                arrival_time: parse_timestamp(&data.arrival_time),
                duration_minutes: data.duration_minutes,
                price: data.price,
                currency: data.currency,
                seat_class: params.seat_class,
                aircraft_type: None,
                stops: data.stops.unwrap_or(0),
                source_site: self.name.clone(),
                scraped_at: SystemTime::now(),
                extensions: Extensions::new(),
            };

            if !self.validate_record(&record) {
                dropped += 1;
                continue;
            }

            let mut extensions = Extensions::new();
            if let Some(booking_source) = data.booking_source {
                extensions.insert("booking_source".to_string(), booking_source);
            }
            if let Some(source_airline) = data.source_airline {
                extensions.insert("source_airline".to_string(), source_airline);
            }
            records.push(self.normalize_record(record, extensions));
        }

        if dropped > 0 {
            tracing::debug!(adapter = %self.name, dropped, "adapter.crawl: dropped invalid records");
        }

        Ok(records)
    }

    /// Step 5: fill the search form, bounded by `form_timeout` (§5's
    /// `form_timeout_seconds`). Falls back to an untimed call if the
    /// configured duration is degenerate rather than failing the crawl.
    async fn fill_search_form_with_timeout(&self, session: &dyn SiteSession, params: &SearchParams) -> Result<(), String> {
        match TimeoutPolicy::new(self.config.form_timeout) {
            Ok(policy) => policy
                .execute(|| async { self.form_filler.fill_search_form(session, params).await.map_err(|e| ResilienceError::Inner(FillFailure(e))) })
                .await
                .map_err(|e| match e {
                    ResilienceError::Timeout { timeout, .. } => format!("form fill exceeded {:?}", timeout),
                    ResilienceError::Inner(FillFailure(msg)) => msg,
                    other => other.to_string(),
                }),
            Err(_) => self.form_filler.fill_search_form(session, params).await,
        }
    }

    /// Step 4: navigate, tolerating transient timeouts via the error
    /// handler's retry decision (§4.5 step 4). Retries are sequential,
    /// never concurrent (§5).
    async fn navigate_with_retry(&self, session: &dyn SiteSession, context: &ErrorContext) -> Result<(), CrawlError> {
        let mut context = context.child("navigate");
        loop {
            match session.navigate(&self.search_url).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    let outcome = self.error_handler.handle(&context, e.clone(), ErrorCategory::Navigation, severity_for(ErrorCategory::Navigation), Scope::Adapter).await;
                    if !outcome.should_retry {
                        return Err(self.fail(ErrorCategory::Navigation, e));
                    }
                    if let Some(delay) = outcome.delay {
                        tokio::time::sleep(delay).await;
                    }
                    context.bump_retry();
                }
            }
        }
    }

    /// Reports a step failure through the error handler and returns the
    /// mapped `CrawlError`. Used by steps with no internal retry loop of
    /// their own.
    async fn report_and_map(&self, context: &ErrorContext, category: ErrorCategory, message: String) -> Result<(), CrawlError> {
        self.error_handler.handle(context, message.clone(), category, severity_for(category), Scope::Adapter).await;
        Err(self.fail(category, message))
    }
}

fn severity_for(category: ErrorCategory) -> ErrorSeverity {
    match category {
        ErrorCategory::Authentication | ErrorCategory::Captcha => ErrorSeverity::High,
        ErrorCategory::Validation => ErrorSeverity::Low,
        _ => ErrorSeverity::Medium,
    }
}

/// Best-effort timestamp parse for the HH:MM strings the parsing layer
/// produces; falls back to "now" for forms the template doesn't recognize,
/// leaving `validate()`'s duration check to reject genuinely bad data.
fn parse_timestamp(raw: &str) -> SystemTime {
    let parts: Vec<&str> = raw.splitn(2, ':').collect();
    if let [h, m] = parts[..] {
        if let (Ok(h), Ok(m)) = (h.parse::<u64>(), m.parse::<u64>()) {
            return SystemTime::UNIX_EPOCH + Duration::from_secs(h * 3600 + m * 60);
        }
    }
    SystemTime::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::rate_limit::{RateLimitConfig, SiteRateLimiter};
    use std::sync::Mutex;

    #[derive(Debug)]
    struct FakeSession {
        elements: Vec<RawFields>,
        navigate_fails: bool,
    }

    #[async_trait]
    impl SiteSession for FakeSession {
        async fn navigate(&self, _url: &str) -> Result<(), String> {
            if self.navigate_fails {
                Err("connection reset".to_string())
            } else {
                Ok(())
            }
        }

        async fn submit(&self) -> Result<(), String> {
            Ok(())
        }

        async fn extract_elements(&self) -> Result<Vec<RawFields>, String> {
            Ok(self.elements.clone())
        }
    }

    fn international_fields(airline: &str, price: &str, duration: &str) -> RawFields {
        let mut fields = RawFields::new();
        fields.insert("airline".to_string(), airline.to_string());
        fields.insert("price".to_string(), price.to_string());
        fields.insert("duration".to_string(), duration.to_string());
        fields.insert("departure_time".to_string(), "08:00".to_string());
        fields.insert("arrival_time".to_string(), "11:00".to_string());
        fields
    }

    fn template() -> AdapterTemplate {
        let rate_limiter: Arc<dyn RateLimiter> = Arc::new(SiteRateLimiter::new(RateLimitConfig::default()));
        let circuit = Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default()));
        let error_handler = Arc::new(ErrorHandler::new(circuit.clone()));
        AdapterTemplate::new("flytoday", "https://flytoday.example/search", rate_limiter, error_handler, circuit)
    }

    fn params() -> SearchParams {
        SearchParams { origin: "THR".to_string(), destination: "MHD".to_string(), departure_date: "2025-06-10".to_string(), ..Default::default() }
    }

    #[tokio::test]
    async fn crawl_rejects_missing_required_field() {
        let template = template();
        let mut bad_params = params();
        bad_params.origin = "".to_string();
        let session: Arc<dyn SiteSession> = Arc::new(FakeSession { elements: vec![], navigate_fails: false });
        let err = template.crawl(session, &bad_params).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Validation);
    }

    #[tokio::test]
    async fn crawl_returns_parsed_and_validated_records() {
        let template = template();
        let elements = vec![international_fields("Lufthansa", "€450", "3h 15m")];
        let session: Arc<dyn SiteSession> = Arc::new(FakeSession { elements, navigate_fails: false });
        let records = template.crawl(session, &params()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].currency, "EUR");
        assert_eq!(records[0].source_site, "flytoday");
        assert_eq!(records[0].extensions.get("adapter_type").map(String::as_str), Some("generic"));
    }

    #[tokio::test]
    async fn crawl_drops_records_that_fail_invariants_without_erroring() {
        let template = template();
        let mut bad = international_fields("Lufthansa", "€450", "3h 15m");
        bad.insert("arrival_time".to_string(), "07:00".to_string());
        bad.insert("departure_time".to_string(), "08:00".to_string());
        let good = international_fields("Emirates", "€500", "2h 00m");
        let session: Arc<dyn SiteSession> = Arc::new(FakeSession { elements: vec![bad, good], navigate_fails: false });
        let records = template.crawl(session, &params()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].airline, "Emirates");
    }

    #[tokio::test(start_paused = true)]
    async fn crawl_surfaces_navigation_failure_as_navigation_category() {
        let template = template();
        let session: Arc<dyn SiteSession> = Arc::new(FakeSession { elements: vec![], navigate_fails: true });
        let err = template.crawl(session, &params()).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::Navigation);
    }

    #[tokio::test]
    async fn adapter_session_release_is_idempotent() {
        let session: Arc<dyn SiteSession> = Arc::new(FakeSession { elements: vec![], navigate_fails: false });
        let adapter_session = AdapterSession::acquire(session);
        adapter_session.release().await;
        adapter_session.release().await;
    }

    #[derive(Debug)]
    struct RecordingFormFiller(Mutex<u32>);

    #[async_trait]
    impl FormFiller for RecordingFormFiller {
        async fn fill_search_form(&self, session: &dyn SiteSession, _params: &SearchParams) -> Result<(), String> {
            *self.0.lock().unwrap() += 1;
            session.submit().await
        }
    }

    #[tokio::test]
    async fn custom_form_filler_is_invoked() {
        let filler = Arc::new(RecordingFormFiller(Mutex::new(0)));
        let template = template().with_form_filler(filler.clone());
        let session: Arc<dyn SiteSession> = Arc::new(FakeSession { elements: vec![], navigate_fails: false });
        template.crawl(session, &params()).await.unwrap();
        assert_eq!(*filler.0.lock().unwrap(), 1);
    }

    #[derive(Debug)]
    struct FieldReportingSession {
        fields: Vec<form_strategy::DetectedField>,
    }

    #[async_trait]
    impl SiteSession for FieldReportingSession {
        async fn navigate(&self, _url: &str) -> Result<(), String> {
            Ok(())
        }

        async fn detect_fields(&self) -> Result<Vec<form_strategy::DetectedField>, String> {
            Ok(self.fields.clone())
        }

        async fn submit(&self) -> Result<(), String> {
            Ok(())
        }

        async fn extract_elements(&self) -> Result<Vec<RawFields>, String> {
            Ok(vec![])
        }
    }

    fn captcha_field() -> form_strategy::DetectedField {
        form_strategy::DetectedField {
            name: "challenge".to_string(),
            tag_name: "div".to_string(),
            input_type: None,
            class_hint: Some("g-recaptcha".to_string()),
            placeholder: None,
            aria_label: None,
        }
    }

    #[tokio::test]
    async fn default_form_filler_aborts_on_captcha_via_detected_fields() {
        let template = template();
        let session: Arc<dyn SiteSession> = Arc::new(FieldReportingSession { fields: vec![captcha_field()] });
        let err = template.crawl(session, &params()).await.unwrap_err();
        assert_eq!(err.category, ErrorCategory::FormFilling);
    }

    #[tokio::test]
    async fn default_form_filler_submits_when_no_fields_reported() {
        let template = template();
        let session: Arc<dyn SiteSession> = Arc::new(FieldReportingSession { fields: vec![] });
        template.crawl(session, &params()).await.unwrap();
    }
}
