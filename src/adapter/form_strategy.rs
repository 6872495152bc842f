//! Automated form strategy (§4.5.1): the optional delegate a `FormFiller`
//! reaches for when a site has no custom fill logic of its own.
//!
//! Operates on an abstract field/filler pair so it stays testable without a
//! real browser session: the caller supplies a list of detected fields and
//! something that can fill one, and this module owns only the strategy
//! ordering, CAPTCHA gate, and field-type classification.

use crate::flight::SearchParams;
use async_trait::async_trait;
use std::time::Instant;

/// A form field as detected on the results page, before classification.
#[derive(Debug, Clone)]
pub struct DetectedField {
    pub name: String,
    pub tag_name: String,
    pub input_type: Option<String>,
    pub class_hint: Option<String>,
    pub placeholder: Option<String>,
    pub aria_label: Option<String>,
}

/// The classified shape of a field, used to pick a filling tactic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    TextInput,
    SelectDropdown,
    Autocomplete,
    DatePicker,
    Checkbox,
    Radio,
    Button,
}

/// Classify a field from tag name, input type, and class hints (§4.5.1).
pub fn classify_field(field: &DetectedField) -> FieldKind {
    let tag = field.tag_name.to_ascii_lowercase();
    let input_type = field.input_type.as_deref().unwrap_or("").to_ascii_lowercase();
    let class_hint = field.class_hint.as_deref().unwrap_or("").to_ascii_lowercase();

    if tag == "button" || input_type == "submit" {
        return FieldKind::Button;
    }
    if tag == "select" {
        return FieldKind::SelectDropdown;
    }
    if input_type == "checkbox" {
        return FieldKind::Checkbox;
    }
    if input_type == "radio" {
        return FieldKind::Radio;
    }
    if input_type == "date" || class_hint.contains("datepicker") || class_hint.contains("calendar") {
        return FieldKind::DatePicker;
    }
    if class_hint.contains("autocomplete") || class_hint.contains("typeahead") {
        return FieldKind::Autocomplete;
    }
    FieldKind::TextInput
}

/// `true` when the field's placeholder or aria-label carries Persian/Arabic
/// glyphs, signalling locale-specific text processing on fill.
pub fn needs_locale_processing(field: &DetectedField) -> bool {
    let text = format!("{} {}", field.placeholder.as_deref().unwrap_or(""), field.aria_label.as_deref().unwrap_or(""));
    crate::parsing::contains_locale_glyphs(&text)
}

/// Known CAPTCHA marker selectors/classes; presence aborts the fill attempt.
const CAPTCHA_MARKERS: &[&str] = &["g-recaptcha", "h-captcha", "captcha", "cf-turnstile"];

pub fn captcha_present(fields: &[DetectedField]) -> bool {
    fields.iter().any(|f| {
        let hint = f.class_hint.as_deref().unwrap_or("").to_ascii_lowercase();
        CAPTCHA_MARKERS.iter().any(|marker| hint.contains(marker))
    })
}

/// One of the three ordered sub-strategies (§4.5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubStrategy {
    DirectSubmit,
    MultiStep,
    AjaxSubmission,
}

impl SubStrategy {
    pub const ORDER: [SubStrategy; 3] = [SubStrategy::DirectSubmit, SubStrategy::MultiStep, SubStrategy::AjaxSubmission];

    fn label(self) -> &'static str {
        match self {
            SubStrategy::DirectSubmit => "direct_submit",
            SubStrategy::MultiStep => "multi_step",
            SubStrategy::AjaxSubmission => "ajax_submission",
        }
    }
}

/// Performs one sub-strategy's fill-and-submit attempt. Adapters provide a
/// concrete implementation bound to their session/browser handle.
#[async_trait]
pub trait SubStrategyExecutor: Send + Sync {
    async fn attempt(&self, strategy: SubStrategy, fields: &[DetectedField], params: &SearchParams) -> Result<(), String>;
}

/// Structured result of an automated form-fill attempt (§4.5.1).
#[derive(Debug, Clone, PartialEq)]
pub struct FormStrategyResult {
    pub success: bool,
    pub strategy_used: Option<&'static str>,
    pub execution_time_ms: u64,
    pub captcha_detected: bool,
    pub error_message: Option<String>,
}

/// Runs the ordered sub-strategies against `fields`, stopping at the first
/// success, aborting early if a CAPTCHA marker is detected.
pub async fn run_automated_strategy(executor: &dyn SubStrategyExecutor, fields: &[DetectedField], params: &SearchParams) -> FormStrategyResult {
    let start = Instant::now();

    if captcha_present(fields) {
        return FormStrategyResult {
            success: false,
            strategy_used: None,
            execution_time_ms: elapsed_ms(start),
            captcha_detected: true,
            error_message: Some("captcha detected before submission".to_string()),
        };
    }

    let mut last_error = None;
    for strategy in SubStrategy::ORDER {
        match executor.attempt(strategy, fields, params).await {
            Ok(()) => {
                return FormStrategyResult {
                    success: true,
                    strategy_used: Some(strategy.label()),
                    execution_time_ms: elapsed_ms(start),
                    captcha_detected: false,
                    error_message: None,
                };
            }
            Err(e) => last_error = Some(e),
        }
    }

    FormStrategyResult { success: false, strategy_used: None, execution_time_ms: elapsed_ms(start), captcha_detected: false, error_message: last_error }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
