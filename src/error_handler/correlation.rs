//! Additive correlation scoring between two error records (§4.4, §8
//! property 3). Scores are symmetric and cross-linking happens when a
//! score clears the configured threshold within the configured window.

use crate::taxonomy::ErrorRecord;

pub const DEFAULT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_WINDOW_MILLIS: u64 = 10 * 60 * 1000;

const SAME_ADAPTER: f64 = 0.3;
const SAME_OPERATION: f64 = 0.2;
const SAME_ERROR_TYPE: f64 = 0.2;
const SAME_CATEGORY: f64 = 0.1;
const WITHIN_TIME_WINDOW: f64 = 0.2;

/// Score how related `a` and `b` are, in `[0.0, 1.0]`. Symmetric by
/// construction: every term compares a pair of fields without favoring
/// either argument's order.
pub fn score(a: &ErrorRecord, b: &ErrorRecord) -> f64 {
    let mut total = 0.0;

    if a.context.adapter == b.context.adapter {
        total += SAME_ADAPTER;
    }
    if a.context.operation == b.context.operation {
        total += SAME_OPERATION;
    }
    if error_type_of(a) == error_type_of(b) {
        total += SAME_ERROR_TYPE;
    }
    if a.category == b.category {
        total += SAME_CATEGORY;
    }
    let delta = a.recorded_at_millis.abs_diff(b.recorded_at_millis);
    if delta <= DEFAULT_WINDOW_MILLIS {
        total += WITHIN_TIME_WINDOW;
    }

    total.min(1.0)
}

/// The "error type" used for correlation is the first word of the message,
/// mirroring how exception class names head a formatted message elsewhere
/// in the pipeline.
fn error_type_of(record: &ErrorRecord) -> &str {
    record.message.split_whitespace().next().unwrap_or("")
}

/// Whether `a` and `b` should be cross-linked as related errors.
pub fn correlates(a: &ErrorRecord, b: &ErrorRecord, threshold: f64, window_millis: u64) -> bool {
    let delta = a.recorded_at_millis.abs_diff(b.recorded_at_millis);
    delta <= window_millis && score(a, b) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::{ErrorAction, ErrorCategory, ErrorContext, ErrorSeverity, Resolution};
    use std::time::Duration;

    fn record(adapter: &str, operation: &str, message: &str, category: ErrorCategory, at: u64) -> ErrorRecord {
        ErrorRecord {
            context: ErrorContext::new(adapter, operation, "sess"),
            message: message.to_string(),
            category,
            severity: ErrorSeverity::Medium,
            action: ErrorAction::Retry,
            resolution: Resolution::Unresolved,
            related_errors: Vec::new(),
            pattern_hash: 0,
            recorded_at_millis: at,
            elapsed_since_start: Duration::from_secs(0),
        }
    }

    #[test]
    fn identical_records_clamp_to_one() {
        let a = record("flytoday", "search", "TimeoutError: slow", ErrorCategory::Timeout, 1_000);
        let b = record("flytoday", "search", "TimeoutError: slow", ErrorCategory::Timeout, 1_000);
        assert_eq!(score(&a, &b), 1.0);
    }

    #[test]
    fn score_is_symmetric() {
        let a = record("flytoday", "search", "TimeoutError: slow", ErrorCategory::Timeout, 1_000);
        let b = record("alibaba", "fill_form", "NetworkError: dns", ErrorCategory::Network, 500_000);
        assert_eq!(score(&a, &b), score(&b, &a));
    }

    #[test]
    fn unrelated_records_score_low() {
        let a = record("flytoday", "search", "TimeoutError: slow", ErrorCategory::Timeout, 0);
        let b = record("alibaba", "fill_form", "NetworkError: dns", ErrorCategory::Network, 1_000_000);
        assert!(score(&a, &b) < DEFAULT_THRESHOLD);
    }

    #[test]
    fn same_adapter_and_operation_and_recent_crosses_threshold() {
        let a = record("flytoday", "search", "TimeoutError: slow", ErrorCategory::Timeout, 1_000);
        let b = record("flytoday", "search", "TimeoutError: slower", ErrorCategory::Timeout, 2_000);
        assert!(correlates(&a, &b, DEFAULT_THRESHOLD, DEFAULT_WINDOW_MILLIS));
    }

    #[test]
    fn outside_window_never_correlates_even_if_score_high() {
        let a = record("flytoday", "search", "TimeoutError: slow", ErrorCategory::Timeout, 0);
        let b = record("flytoday", "search", "TimeoutError: slow", ErrorCategory::Timeout, DEFAULT_WINDOW_MILLIS + 1);
        assert!(!correlates(&a, &b, DEFAULT_THRESHOLD, DEFAULT_WINDOW_MILLIS));
    }
}
