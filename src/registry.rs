//! Adapter factory and registry (§4.9): metadata-driven construction with
//! a creation cache, config TTL cache, and fuzzy name suggestion on miss.

use crate::adapter::{AdapterConfig, AdapterTemplate, DefaultElementParser, DefaultFormFiller};
use crate::circuit_breaker::CircuitBreakerManager;
use crate::config::{self, AdapterConfigDocument};
use crate::error_handler::ErrorHandler;
use crate::rate_limit::{RateLimitConfig, RateLimiter, SiteRateLimiter};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CONFIG_CACHE_TTL: Duration = Duration::from_secs(300);
const MAX_RECENT_ERRORS: usize = 50;

/// How a named adapter is constructed (§4.9).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreationStrategy {
    /// The generic configuration-driven template, built entirely from metadata.
    Direct,
    /// A custom constructor registered out-of-band, keyed by module/class name.
    Module { module: String, class: String },
}

/// A registry entry (§3).
#[derive(Debug, Clone)]
pub struct AdapterMetadata {
    pub name: String,
    pub kind: String,
    pub base_url: String,
    pub search_url: String,
    pub currency: String,
    pub feature_tags: Vec<String>,
    pub strategy: CreationStrategy,
    pub default_rate_limit: RateLimitConfig,
    pub active: bool,
    pub config: AdapterConfigDocument,
}

/// Normalizes a requested adapter name: lowercased, non-alphanumerics
/// collapsed to underscore (§4.9).
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for c in name.to_ascii_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

/// Levenshtein edit distance, used for fuzzy name suggestion (§4.9). No
/// external crate: the source's own factory hand-rolls the same check.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for i in 1..=a.len() {
        let mut prev_diag = row[0];
        row[0] = i;
        for j in 1..=b.len() {
            let temp = row[j];
            row[j] = if a[i - 1] == b[j - 1] {
                prev_diag
            } else {
                1 + prev_diag.min(row[j]).min(row[j - 1])
            };
            prev_diag = temp;
        }
    }
    row[b.len()]
}

fn suggest(requested: &str, known: &[String]) -> Vec<String> {
    known
        .iter()
        .filter(|candidate| candidate.contains(requested) || requested.contains(candidate.as_str()) || edit_distance(requested, candidate) <= 2)
        .cloned()
        .collect()
}

/// Error returned when a name can't be resolved to a registered adapter.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", self.render())]
pub struct NotFound {
    pub requested: String,
    pub suggestions: Vec<String>,
}

impl NotFound {
    fn render(&self) -> String {
        if self.suggestions.is_empty() {
            format!("no adapter registered under '{}'", self.requested)
        } else {
            format!("no adapter registered under '{}'; did you mean: {}?", self.requested, self.suggestions.join(", "))
        }
    }
}

/// Error returned by [`Registry::create_adapter`] (§4.9 step 2: validate at
/// load time, never silently accept a malformed configuration).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error("adapter '{name}' has invalid configuration: {errors:?}")]
    InvalidConfig { name: String, errors: Vec<config::ConfigError> },
}

/// Factory metrics per §4.9 step 3.
#[derive(Debug, Default, Clone)]
pub struct FactoryMetrics {
    pub total_created: u64,
    pub successful_creations: u64,
    pub failed_creations: u64,
    pub average_creation_time: Duration,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub most_requested_adapters: HashMap<String, u64>,
    pub recent_errors: VecDeque<String>,
}

impl FactoryMetrics {
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    fn record_request(&mut self, name: &str) {
        *self.most_requested_adapters.entry(name.to_string()).or_insert(0) += 1;
    }

    fn record_error(&mut self, message: String) {
        self.failed_creations += 1;
        if self.recent_errors.len() >= MAX_RECENT_ERRORS {
            self.recent_errors.pop_front();
        }
        self.recent_errors.push_back(message);
    }

    fn record_success(&mut self, elapsed: Duration) {
        self.total_created += 1;
        self.successful_creations += 1;
        let n = self.total_created;
        self.average_creation_time = (self.average_creation_time * (n.saturating_sub(1) as u32) + elapsed) / n as u32;
    }
}

struct CachedConfig {
    config: AdapterConfig,
    cached_at_millis: u64,
}

/// Thread-safe adapter metadata registry plus construction cache (§4.9).
pub struct Registry {
    metadata: Mutex<HashMap<String, AdapterMetadata>>,
    instances: Mutex<HashMap<String, Arc<AdapterTemplate>>>,
    config_cache: Mutex<HashMap<String, CachedConfig>>,
    metrics: Mutex<FactoryMetrics>,
    circuit: Arc<CircuitBreakerManager>,
    clock_millis: AtomicU64,
}

impl Registry {
    pub fn new(circuit: Arc<CircuitBreakerManager>) -> Self {
        Self {
            metadata: Mutex::new(HashMap::new()),
            instances: Mutex::new(HashMap::new()),
            config_cache: Mutex::new(HashMap::new()),
            metrics: Mutex::new(FactoryMetrics::default()),
            circuit,
            clock_millis: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock_millis.fetch_add(1, Ordering::SeqCst)
    }

    pub fn register(&self, metadata: AdapterMetadata) {
        let key = normalize_name(&metadata.name);
        self.metadata.lock().unwrap_or_else(|p| p.into_inner()).insert(key, metadata);
    }

    fn known_names(&self) -> Vec<String> {
        self.metadata.lock().unwrap_or_else(|p| p.into_inner()).keys().cloned().collect()
    }

    fn deep_merge(base: &AdapterConfig, over: &AdapterConfig) -> AdapterConfig {
        AdapterConfig {
            required_fields: if over.required_fields.is_empty() { base.required_fields.clone() } else { over.required_fields.clone() },
            price_range: over.price_range,
            duration_range_minutes: over.duration_range_minutes,
            max_retries: over.max_retries,
            admission_wait_cap: over.admission_wait_cap,
            is_persian_locale: over.is_persian_locale || base.is_persian_locale,
            configured_currency: over.configured_currency.clone().or_else(|| base.configured_currency.clone()),
            is_aggregator: over.is_aggregator || base.is_aggregator,
            form_timeout: over.form_timeout,
            kind: over.kind.clone(),
            settle_delay: over.settle_delay,
            loading_wait_cap: over.loading_wait_cap,
        }
    }

    /// §4.9 step 2: validates `doc` against §6's schema before converting
    /// it, on every cache miss, so a malformed config is never silently
    /// accepted into the instance cache.
    fn load_config(&self, key: &str, doc: &AdapterConfigDocument) -> Result<AdapterConfig, Vec<config::ConfigError>> {
        let now = self.tick();
        {
            let cache = self.config_cache.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(cached) = cache.get(key) {
                if now.saturating_sub(cached.cached_at_millis) < CONFIG_CACHE_TTL.as_millis() as u64 {
                    return Ok(cached.config.clone());
                }
            }
        }
        config::validate(doc)?;
        let converted = config::to_adapter_config(doc);
        let mut cache = self.config_cache.lock().unwrap_or_else(|p| p.into_inner());
        cache.insert(key.to_string(), CachedConfig { config: converted.clone(), cached_at_millis: now });
        Ok(converted)
    }

    /// §4.9 step 1-2: returns a cached instance unless `force_new`,
    /// otherwise constructs, caches, and returns a fresh one.
    pub fn create_adapter(
        &self,
        name: &str,
        override_config: Option<AdapterConfig>,
        force_new: bool,
        error_handler: Arc<ErrorHandler>,
    ) -> Result<Arc<AdapterTemplate>, RegistryError> {
        let key = normalize_name(name);
        self.metrics.lock().unwrap_or_else(|p| p.into_inner()).record_request(&key);

        if !force_new {
            let instances = self.instances.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(existing) = instances.get(&key) {
                self.metrics.lock().unwrap_or_else(|p| p.into_inner()).cache_hits += 1;
                return Ok(existing.clone());
            }
        }
        self.metrics.lock().unwrap_or_else(|p| p.into_inner()).cache_misses += 1;

        let metadata = {
            let metadata = self.metadata.lock().unwrap_or_else(|p| p.into_inner());
            match metadata.get(&key) {
                Some(m) => m.clone(),
                None => {
                    let suggestions = suggest(&key, &self.known_names());
                    let mut metrics = self.metrics.lock().unwrap_or_else(|p| p.into_inner());
                    metrics.record_error(format!("adapter '{}' not registered", key));
                    return Err(RegistryError::NotFound(NotFound { requested: name.to_string(), suggestions }));
                }
            }
        };

        let start = std::time::Instant::now();
        let base = match self.load_config(&key, &metadata.config) {
            Ok(base) => base,
            Err(errors) => {
                let mut metrics = self.metrics.lock().unwrap_or_else(|p| p.into_inner());
                metrics.record_error(format!("adapter '{}' has invalid configuration", key));
                return Err(RegistryError::InvalidConfig { name: key, errors });
            }
        };
        let mut config = match &override_config {
            Some(over) => Self::deep_merge(&base, over),
            None => base,
        };
        config.kind = metadata.kind.clone();

        let rate_limiter: Arc<dyn RateLimiter> = Arc::new(SiteRateLimiter::new(metadata.default_rate_limit));

        let template = match &metadata.strategy {
            CreationStrategy::Direct => AdapterTemplate::new(metadata.name.clone(), metadata.search_url.clone(), rate_limiter, error_handler, self.circuit.clone())
                .with_config(config)
                .with_form_filler(Arc::new(DefaultFormFiller))
                .with_element_parser(Arc::new(DefaultElementParser)),
            CreationStrategy::Module { module, class } => {
                tracing::debug!(module, class, "registry: module creation strategy falls back to the direct template shape");
                AdapterTemplate::new(metadata.name.clone(), metadata.search_url.clone(), rate_limiter, error_handler, self.circuit.clone()).with_config(config)
            }
        };

        let instance = Arc::new(template);
        self.instances.lock().unwrap_or_else(|p| p.into_inner()).insert(key, instance.clone());
        self.metrics.lock().unwrap_or_else(|p| p.into_inner()).record_success(start.elapsed());

        Ok(instance)
    }

    pub fn metrics(&self) -> FactoryMetrics {
        self.metrics.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::config::{CircuitBreakerSection, DataValidationSection, ErrorHandlingSection, ExtractionConfigSection, MonitoringSection, RateLimitingSection};
    use std::time::Duration;

    fn registry() -> Registry {
        Registry::new(Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default())))
    }

    fn error_handler(circuit: Arc<CircuitBreakerManager>) -> Arc<ErrorHandler> {
        Arc::new(ErrorHandler::new(circuit))
    }

    fn valid_config_doc() -> AdapterConfigDocument {
        AdapterConfigDocument {
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
        }
    }

    fn alibaba_metadata() -> AdapterMetadata {
        AdapterMetadata {
            name: "alibaba".to_string(),
            kind: "aggregator".to_string(),
            base_url: "https://alibaba.ir".to_string(),
            search_url: "https://alibaba.ir/search".to_string(),
            currency: "IRR".to_string(),
            feature_tags: vec![],
            strategy: CreationStrategy::Direct,
            default_rate_limit: RateLimitConfig::default(),
            active: true,
            config: valid_config_doc(),
        }
    }

    #[test]
    fn normalizes_names_consistently() {
        assert_eq!(normalize_name("Flytoday.com"), "flytoday_com");
        assert_eq!(normalize_name("  Alibaba  "), "alibaba");
    }

    #[test]
    fn second_call_is_a_cache_hit() {
        let registry = registry();
        registry.register(alibaba_metadata());
        let circuit = Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default()));

        registry.create_adapter("alibaba", None, false, error_handler(circuit.clone())).unwrap();
        registry.create_adapter("alibaba", None, false, error_handler(circuit)).unwrap();

        let metrics = registry.metrics();
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.cache_misses, 1);
    }

    #[test]
    fn unknown_name_suggests_near_miss() {
        let registry = registry();
        registry.register(alibaba_metadata());
        let circuit = Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default()));

        let err = registry.create_adapter("alibabaa", None, false, error_handler(circuit)).unwrap_err();
        match err {
            RegistryError::NotFound(not_found) => assert!(not_found.suggestions.contains(&"alibaba".to_string())),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_config_at_load_time() {
        let registry = registry();
        let mut metadata = alibaba_metadata();
        metadata.config.rate_limiting.requests_per_second = 0.0;
        registry.register(metadata);
        let circuit = Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default()));

        let err = registry.create_adapter("alibaba", None, false, error_handler(circuit)).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig { .. }));
    }

    #[test]
    fn force_new_bypasses_cache() {
        let registry = registry();
        registry.register(alibaba_metadata());
        let circuit = Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default()));

        let first = registry.create_adapter("alibaba", None, false, error_handler(circuit.clone())).unwrap();
        let second = registry.create_adapter("alibaba", None, true, error_handler(circuit)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn override_config_merges_over_base() {
        let registry = registry();
        registry.register(alibaba_metadata());
        let circuit = Arc::new(CircuitBreakerManager::new(CircuitBreakerConfig::default()));

        let over = AdapterConfig { max_retries: 9, ..AdapterConfig::default() };
        let instance = registry.create_adapter("alibaba", Some(over), false, error_handler(circuit)).unwrap();
        assert_eq!(instance.config.max_retries, 9);
    }
}
