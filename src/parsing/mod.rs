//! Parsing strategy dispatch (C6): `persian | international | aggregator`.
//!
//! Strategies are stateless beyond their configuration and never perform
//! I/O; the adapter template hands them already-extracted text fields
//! (selectors themselves are an adapter concern, out of scope here).

mod aggregator;
mod international;
mod persian;

pub use aggregator::AggregatorStrategy;
pub use international::InternationalStrategy;
pub use persian::PersianStrategy;

use std::collections::HashMap;

/// Raw text pulled from the results page for one flight element, keyed by
/// logical field name (`airline`, `flight_number`, `departure_time`,
/// `arrival_time`, `duration`, `price`, `seat_class`, `stops`,
/// `source_airline`, `booking_source`, ...).
pub type RawFields = HashMap<String, String>;

/// Context accompanying a single parse call.
#[derive(Debug, Clone, Default)]
pub struct ParsingContext {
    pub adapter: String,
    pub is_aggregator_metadata: bool,
    pub is_persian_locale: bool,
    pub configured_currency: Option<String>,
}

/// Minimally-typed output of a strategy's `parse`, before template-level
/// validation (step 8) and normalization (step 9).
#[derive(Debug, Clone, Default)]
pub struct ParsedFlightData {
    pub airline: String,
    pub airline_english: Option<String>,
    pub flight_number: String,
    pub departure_time: String,
    pub arrival_time: String,
    pub duration_minutes: u32,
    pub price: f64,
    pub currency: String,
    pub seat_class: Option<String>,
    pub stops: Option<u32>,
    pub source_airline: Option<String>,
    pub booking_source: Option<String>,
}

/// Result of parsing one element.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub success: bool,
    pub data: Option<ParsedFlightData>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ParseOutcome {
    fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, errors: vec![error.into()], warnings: Vec::new() }
    }

    fn ok(data: ParsedFlightData, warnings: Vec<String>) -> Self {
        Self { success: true, data: Some(data), errors: Vec::new(), warnings }
    }
}

/// Shared contract per §4.6.
pub trait ParsingStrategy: Send + Sync {
    fn parse(&self, fields: &RawFields, context: &ParsingContext) -> ParseOutcome;

    /// Parse a raw price string into `(amount, currency)`.
    fn extract_price(&self, raw: &str) -> Result<(f64, String), String>;

    /// Parse a raw duration string into whole minutes.
    fn extract_duration(&self, raw: &str) -> Result<u32, String>;

    /// Range-check an already-extracted price against this strategy's
    /// declared bounds.
    fn validate_price_range(&self, price: f64) -> bool;
}

/// Auto-detect the strategy per §4.6: `persian` when currency is IRR or the
/// site's locale is Persian; `aggregator` when adapter metadata flags it;
/// otherwise `international`.
pub fn auto_detect(context: &ParsingContext, is_persian_locale: bool) -> Box<dyn ParsingStrategy> {
    let is_irr = context.configured_currency.as_deref().map(|c| c.eq_ignore_ascii_case("IRR")).unwrap_or(false);
    if is_irr || is_persian_locale {
        Box::new(PersianStrategy::default())
    } else if context.is_aggregator_metadata {
        Box::new(AggregatorStrategy::default())
    } else {
        Box::new(InternationalStrategy::default())
    }
}

/// Converts Persian/Arabic-Indic digits to ASCII digits. Shared by `persian`
/// and `aggregator` (which applies it conditionally when locale digits are
/// present).
pub(crate) fn locale_digits_to_ascii(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '۰'..='۹' => char::from_digit(c as u32 - '۰' as u32, 10).unwrap_or(c),
            '٠'..='٩' => char::from_digit(c as u32 - '٠' as u32, 10).unwrap_or(c),
            other => other,
        })
        .collect()
}

pub(crate) fn contains_locale_digits(input: &str) -> bool {
    input.chars().any(|c| matches!(c, '۰'..='۹' | '٠'..='٩'))
}

/// `true` when `input` contains Persian/Arabic letters or digits, used by
/// the automated form strategy to decide whether a field needs
/// locale-specific text handling on fill.
pub(crate) fn contains_locale_glyphs(input: &str) -> bool {
    contains_locale_digits(input) || input.chars().any(|c| matches!(c as u32, 0x0600..=0x06FF | 0x0750..=0x077F))
}
