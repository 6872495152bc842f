//! Nested adapter configuration schema and structural validation (§6).
//!
//! No schema-validation crate: `unified_adapter_factory.py`'s own factory
//! hand-validates required keys and shapes, and this module does the same.

use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RateLimitingSection {
    pub requests_per_second: f64,
    pub burst_limit: u32,
    pub cooldown_period: Duration,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerSection {
    pub failure_threshold: usize,
    pub recovery_timeout: Duration,
    pub half_open_max_calls: usize,
}

#[derive(Debug, Clone)]
pub struct ErrorHandlingSection {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub circuit_breaker: CircuitBreakerSection,
}

#[derive(Debug, Clone)]
pub struct MonitoringSection {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionConfigSection {
    pub required_fields: Vec<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DataValidationSection {
    pub price_range: Option<(f64, f64)>,
    pub duration_range_minutes: Option<(u32, u32)>,
}

/// Top-level per-adapter configuration document (§6).
#[derive(Debug, Clone)]
pub struct AdapterConfigDocument {
    pub name: String,
    pub base_url: String,
    pub search_url: String,
    pub rate_limiting: RateLimitingSection,
    pub error_handling: ErrorHandlingSection,
    pub monitoring: MonitoringSection,
    pub extraction_config: ExtractionConfigSection,
    pub data_validation: DataValidationSection,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' is not a valid url: '{value}'")]
    InvalidUrl { field: &'static str, value: String },
    #[error("field '{field}' must be a positive number")]
    NotPositive { field: &'static str },
    #[error("field '{field}' has an invalid range (min > max)")]
    InvalidRange { field: &'static str },
}

fn is_valid_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Validates the shape described in §6: required top-level keys, URL
/// shape, positive counters, and the rate-limiting sub-schema.
pub fn validate(doc: &AdapterConfigDocument) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if doc.name.trim().is_empty() {
        errors.push(ConfigError::MissingField("name"));
    }
    if doc.base_url.trim().is_empty() {
        errors.push(ConfigError::MissingField("base_url"));
    } else if !is_valid_url(&doc.base_url) {
        errors.push(ConfigError::InvalidUrl { field: "base_url", value: doc.base_url.clone() });
    }
    if doc.search_url.trim().is_empty() {
        errors.push(ConfigError::MissingField("search_url"));
    } else if !is_valid_url(&doc.search_url) {
        errors.push(ConfigError::InvalidUrl { field: "search_url", value: doc.search_url.clone() });
    }

    if doc.rate_limiting.requests_per_second <= 0.0 {
        errors.push(ConfigError::NotPositive { field: "rate_limiting.requests_per_second" });
    }
    if doc.rate_limiting.burst_limit == 0 {
        errors.push(ConfigError::NotPositive { field: "rate_limiting.burst_limit" });
    }

    if doc.error_handling.max_retries == 0 {
        errors.push(ConfigError::NotPositive { field: "error_handling.max_retries" });
    }
    if doc.error_handling.circuit_breaker.failure_threshold == 0 {
        errors.push(ConfigError::NotPositive { field: "error_handling.circuit_breaker.failure_threshold" });
    }
    if doc.error_handling.circuit_breaker.half_open_max_calls == 0 {
        errors.push(ConfigError::NotPositive { field: "error_handling.circuit_breaker.half_open_max_calls" });
    }

    if let Some((min, max)) = doc.data_validation.price_range {
        if min > max {
            errors.push(ConfigError::InvalidRange { field: "data_validation.price_range" });
        }
    }
    if let Some((min, max)) = doc.data_validation.duration_range_minutes {
        if min > max {
            errors.push(ConfigError::InvalidRange { field: "data_validation.duration_range_minutes" });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Converts a validated document into the adapter template's runtime
/// configuration shape.
pub fn to_adapter_config(doc: &AdapterConfigDocument) -> crate::adapter::AdapterConfig {
    let mut required_fields = doc.extraction_config.required_fields.clone();
    if required_fields.is_empty() {
        required_fields = vec!["origin".to_string(), "destination".to_string(), "departure_date".to_string()];
    }
    crate::adapter::AdapterConfig {
        required_fields,
        price_range: doc.data_validation.price_range.unwrap_or((0.0, f64::MAX)),
        duration_range_minutes: doc.data_validation.duration_range_minutes.unwrap_or((0, u32::MAX)),
        max_retries: doc.error_handling.max_retries,
        admission_wait_cap: Duration::from_secs(5),
        is_persian_locale: doc.extraction_config.currency.as_deref().is_some_and(|c| c.eq_ignore_ascii_case("IRR")),
        configured_currency: doc.extraction_config.currency.clone(),
        is_aggregator: false,
        form_timeout: Duration::from_secs(30),
        // `Registry::create_adapter` overwrites this with the metadata's own
        // `kind` right after merging; the document itself carries no kind.
        kind: "generic".to_string(),
        settle_delay: Duration::from_millis(500),
        loading_wait_cap: Duration::from_secs(3),
    }
}

/// Flat-map representation accepted from an external configuration loader
/// (JSON/YAML parsing stays with the outer shell; this only interprets an
/// already-decoded string map for required-field presence checks, matching
/// the "JSON-compatible nested map" framing in §6).
pub fn required_keys_present(flat: &HashMap<String, String>) -> Result<(), ConfigError> {
    const REQUIRED: &[&str] = &["name", "base_url", "search_url"];
    for key in REQUIRED {
        if !flat.contains_key(*key) {
            return Err(ConfigError::MissingField(key));
        }
    }
    Ok(())
}
