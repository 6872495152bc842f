//! Persian-site parsing strategy (§4.6).
//!
//! Converts locale digits, maps known airline names via a small local
//! table, and accepts the `X ساعت Y دقیقه` duration form alongside plain
//! `HH:MM`. The full canonical airline-name table and glyph corpus live
//! with the adapter/external collaborator per spec.md §1; this holds a
//! representative sample sufficient to exercise the mapping rule.

use super::{locale_digits_to_ascii, ParseOutcome, ParsedFlightData, ParsingContext, ParsingStrategy, RawFields};
use std::collections::HashMap;

const MIN_PRICE_IRR: f64 = 1_000.0;
const MAX_PRICE_IRR: f64 = 50_000_000.0;

fn airline_table() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("ایران ایر", "Iran Air"),
        ("ماهان", "Mahan Air"),
        ("آسمان", "Iran Aseman Airlines"),
        ("زاگرس", "Zagros Airlines"),
        ("کاسپین", "Caspian Airlines"),
    ])
}

#[derive(Debug, Default)]
pub struct PersianStrategy;

impl PersianStrategy {
    fn canonicalize_airline(&self, raw: &str) -> (String, Option<String>) {
        let trimmed = raw.trim();
        match airline_table().get(trimmed) {
            Some(english) => (trimmed.to_string(), Some(english.to_string())),
            None => (trimmed.to_string(), None),
        }
    }
}

impl ParsingStrategy for PersianStrategy {
    fn parse(&self, fields: &RawFields, _context: &ParsingContext) -> ParseOutcome {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let raw_airline = fields.get("airline").cloned().unwrap_or_default();
        let (airline, airline_english) = self.canonicalize_airline(&raw_airline);
        if airline.is_empty() {
            errors.push("missing airline".to_string());
        }

        let price = match fields.get("price") {
            Some(raw) => match self.extract_price(raw) {
                Ok((amount, _currency)) => amount,
                Err(e) => {
                    errors.push(e);
                    0.0
                }
            },
            None => {
                errors.push("missing price".to_string());
                0.0
            }
        };
        if errors.is_empty() && !self.validate_price_range(price) {
            errors.push(format!("price {} outside persian range [{}, {}]", price, MIN_PRICE_IRR, MAX_PRICE_IRR));
        }

        let duration_minutes = match fields.get("duration") {
            Some(raw) => match self.extract_duration(raw) {
                Ok(minutes) => minutes,
                Err(e) => {
                    errors.push(e);
                    0
                }
            },
            None => {
                errors.push("missing duration".to_string());
                0
            }
        };

        let departure_time = fields.get("departure_time").map(|v| locale_digits_to_ascii(v)).unwrap_or_default();
        let arrival_time = fields.get("arrival_time").map(|v| locale_digits_to_ascii(v)).unwrap_or_default();
        if !time_regex_ok(&departure_time) {
            warnings.push("departure_time does not match HH:MM after digit conversion".to_string());
        }
        if !time_regex_ok(&arrival_time) {
            warnings.push("arrival_time does not match HH:MM after digit conversion".to_string());
        }

        if airline_english.is_none() {
            warnings.push(format!("airline '{}' not found in locale table", airline));
        }

        if !errors.is_empty() {
            return ParseOutcome { success: false, data: None, errors, warnings };
        }

        ParseOutcome::ok(
            ParsedFlightData {
                airline,
                airline_english,
                flight_number: fields.get("flight_number").cloned().unwrap_or_default(),
                departure_time,
                arrival_time,
                duration_minutes,
                price,
                currency: "IRR".to_string(),
                seat_class: fields.get("seat_class").cloned(),
                stops: fields.get("stops").and_then(|s| s.parse().ok()),
                source_airline: None,
                booking_source: None,
            },
            warnings,
        )
    }

    fn extract_price(&self, raw: &str) -> Result<(f64, String), String> {
        let ascii = locale_digits_to_ascii(raw);
        let digits: String = ascii.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return Err(format!("could not extract a price from '{}'", raw));
        }
        digits.parse::<f64>().map(|amount| (amount, "IRR".to_string())).map_err(|_| format!("invalid price digits '{}'", digits))
    }

    fn extract_duration(&self, raw: &str) -> Result<u32, String> {
        let ascii = locale_digits_to_ascii(raw);
        if let Some(minutes) = parse_hours_minutes_fa(&ascii) {
            return Ok(minutes);
        }
        Err(format!("unrecognized persian duration form '{}'", raw))
    }

    fn validate_price_range(&self, price: f64) -> bool {
        (MIN_PRICE_IRR..=MAX_PRICE_IRR).contains(&price)
    }
}

fn time_regex_ok(value: &str) -> bool {
    let parts: Vec<&str> = value.splitn(2, ':').collect();
    parts.len() == 2
        && parts[0].len() <= 2
        && !parts[0].is_empty()
        && parts[0].chars().all(|c| c.is_ascii_digit())
        && parts[1].len() == 2
        && parts[1].chars().all(|c| c.is_ascii_digit())
}

/// Accepts `X ساعت Y دقیقه` (hours/minutes) after digit conversion.
fn parse_hours_minutes_fa(ascii: &str) -> Option<u32> {
    let has_hour_word = ascii.contains("ساعت");
    let has_minute_word = ascii.contains("دقیقه");
    if !has_hour_word && !has_minute_word {
        return None;
    }
    let digits: Vec<u32> = ascii.split(|c: char| !c.is_ascii_digit()).filter(|s| !s.is_empty()).filter_map(|s| s.parse().ok()).collect();
    match digits.len() {
        0 => None,
        1 => Some(digits[0] * if has_hour_word && !has_minute_word { 60 } else { 1 }),
        _ => Some(digits[0] * 60 + digits[1]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy() -> PersianStrategy {
        PersianStrategy
    }

    #[test]
    fn extracts_price_from_locale_digits() {
        let (amount, currency) = strategy().extract_price("۲,۵۰۰,۰۰۰ ریال").unwrap();
        assert_eq!(amount, 2_500_000.0);
        assert_eq!(currency, "IRR");
    }

    #[test]
    fn validates_price_range() {
        let s = strategy();
        assert!(s.validate_price_range(1_000_000.0));
        assert!(!s.validate_price_range(999.0));
        assert!(!s.validate_price_range(60_000_000.0));
    }

    #[test]
    fn parses_hours_minutes_duration_form() {
        let minutes = strategy().extract_duration("۲ ساعت و ۱۵ دقیقه").unwrap();
        assert_eq!(minutes, 2 * 60 + 15);
    }

    #[test]
    fn maps_known_airline_name() {
        let mut fields = RawFields::new();
        fields.insert("airline".to_string(), "ایران ایر".to_string());
        fields.insert("price".to_string(), "۲۰۰۰۰۰۰".to_string());
        fields.insert("duration".to_string(), "۱ ساعت ۳۰ دقیقه".to_string());
        fields.insert("departure_time".to_string(), "۰۸:۰۰".to_string());
        fields.insert("arrival_time".to_string(), "۰۹:۳۰".to_string());

        let outcome = strategy().parse(&fields, &ParsingContext::default());
        assert!(outcome.success, "errors: {:?}", outcome.errors);
        let data = outcome.data.unwrap();
        assert_eq!(data.airline, "ایران ایر");
        assert_eq!(data.airline_english.as_deref(), Some("Iran Air"));
        assert_eq!(data.duration_minutes, 90);
        assert_eq!(data.currency, "IRR");
    }

    #[test]
    fn rejects_out_of_range_price() {
        let mut fields = RawFields::new();
        fields.insert("airline".to_string(), "ماهان".to_string());
        fields.insert("price".to_string(), "۱۰۰".to_string());
        fields.insert("duration".to_string(), "۱ ساعت".to_string());

        let outcome = strategy().parse(&fields, &ParsingContext::default());
        assert!(!outcome.success);
        assert!(outcome.errors.iter().any(|e| e.contains("range")));
    }
}
