//! Error taxonomy and per-operation error context (C1).
//!
//! Every retriable operation creates one [`ErrorContext`] at entry and
//! threads it through child operations, which inherit `session_id`,
//! `correlation_id`, and `url` but carry their own `operation` name and
//! retry counter.

use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Closed set of failure categories. New categories are a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
pub enum ErrorCategory {
    Network,
    Parsing,
    Validation,
    Timeout,
    Authentication,
    RateLimit,
    Resource,
    Browser,
    FormFilling,
    Navigation,
    Captcha,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Parsing => "parsing",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Browser => "browser",
            ErrorCategory::FormFilling => "form_filling",
            ErrorCategory::Navigation => "navigation",
            ErrorCategory::Captcha => "captcha",
            ErrorCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Severity assigned to an error record, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
    Emergency,
}

impl ErrorSeverity {
    /// `true` for the two severities that trigger alert-sink fan-out (§4.4.8).
    pub fn triggers_alert(self) -> bool {
        matches!(self, ErrorSeverity::Critical | ErrorSeverity::Emergency)
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorSeverity::Low => "low",
            ErrorSeverity::Medium => "medium",
            ErrorSeverity::High => "high",
            ErrorSeverity::Critical => "critical",
            ErrorSeverity::Emergency => "emergency",
        };
        f.write_str(s)
    }
}

/// Action the error handler decided to take for a given failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
pub enum ErrorAction {
    Retry,
    Fallback,
    Skip,
    Abort,
    Escalate,
}

impl fmt::Display for ErrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorAction::Retry => "retry",
            ErrorAction::Fallback => "fallback",
            ErrorAction::Skip => "skip",
            ErrorAction::Abort => "abort",
            ErrorAction::Escalate => "escalate",
        };
        f.write_str(s)
    }
}

/// Redacted search parameters captured in an [`ErrorContext`].
///
/// Only field names relevant to correlation and debugging survive; raw
/// passenger/contact data never enters the error pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RedactedParams {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<String>,
}

/// Host metrics sampled at context-capture time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct HostMetrics {
    pub cpu_percent: f32,
    pub ram_percent: f32,
}

/// Context threaded through a retriable operation and its children.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorContext {
    pub error_id: Uuid,
    pub correlation_id: Uuid,
    pub session_id: String,
    pub adapter: String,
    pub operation: String,
    pub url: Option<String>,
    pub retry_count: u32,
    pub max_retries: u32,
    pub params: RedactedParams,
    pub host_metrics: HostMetrics,
    pub stack_location: Option<String>,
}

impl ErrorContext {
    /// Start a new root context for `adapter`/`operation`.
    pub fn new(adapter: impl Into<String>, operation: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            error_id: Uuid::new_v4(),
            correlation_id: Uuid::new_v4(),
            session_id: session_id.into(),
            adapter: adapter.into(),
            operation: operation.into(),
            url: None,
            retry_count: 0,
            max_retries: 3,
            params: RedactedParams::default(),
            host_metrics: HostMetrics::default(),
            stack_location: None,
        }
    }

    /// Derive a child context for a nested operation, inheriting session,
    /// correlation id, and url but starting its own retry counter.
    pub fn child(&self, operation: impl Into<String>) -> Self {
        Self {
            error_id: Uuid::new_v4(),
            correlation_id: self.correlation_id,
            session_id: self.session_id.clone(),
            adapter: self.adapter.clone(),
            operation: operation.into(),
            url: self.url.clone(),
            retry_count: 0,
            max_retries: self.max_retries,
            params: self.params.clone(),
            host_metrics: self.host_metrics,
            stack_location: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    pub fn bump_retry(&mut self) {
        self.retry_count += 1;
    }
}

/// Resolution state attached to an error record after recovery runs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Resolution {
    Unresolved,
    Resolved { method: String },
}

/// One reported failure, fully classified and ready for the bounded ring (§4.4).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorRecord {
    pub context: ErrorContext,
    pub message: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub action: ErrorAction,
    pub resolution: Resolution,
    pub related_errors: Vec<Uuid>,
    pub pattern_hash: u64,
    pub recorded_at_millis: u64,
    pub elapsed_since_start: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_inherits_session_and_correlation() {
        let root = ErrorContext::new("alibaba", "crawl", "sess-1").with_url("https://alibaba.ir");
        let child = root.child("navigate");

        assert_eq!(child.session_id, root.session_id);
        assert_eq!(child.correlation_id, root.correlation_id);
        assert_eq!(child.url, root.url);
        assert_eq!(child.operation, "navigate");
        assert_ne!(child.error_id, root.error_id);
        assert_eq!(child.retry_count, 0);
    }

    #[test]
    fn exhausted_respects_max_retries() {
        let mut ctx = ErrorContext::new("flytoday", "navigate", "sess-2").with_max_retries(2);
        assert!(!ctx.exhausted());
        ctx.bump_retry();
        assert!(!ctx.exhausted());
        ctx.bump_retry();
        assert!(ctx.exhausted());
    }

    #[test]
    fn severity_alert_gating() {
        assert!(!ErrorSeverity::Low.triggers_alert());
        assert!(!ErrorSeverity::High.triggers_alert());
        assert!(ErrorSeverity::Critical.triggers_alert());
        assert!(ErrorSeverity::Emergency.triggers_alert());
    }

    #[test]
    fn category_display_matches_wire_names() {
        assert_eq!(ErrorCategory::RateLimit.to_string(), "rate_limit");
        assert_eq!(ErrorCategory::FormFilling.to_string(), "form_filling");
    }
}
