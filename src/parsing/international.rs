//! International-site parsing strategy (§4.6).
//!
//! Detects currency by a fixed symbol table, parses `Nh Mm` / `N min`
//! duration forms, and enforces a 0-10,000 price range in the detected
//! currency.

use super::{ParseOutcome, ParsedFlightData, ParsingContext, ParsingStrategy, RawFields};

const MAX_PRICE: f64 = 10_000.0;

const CURRENCY_SYMBOLS: &[(&str, &str)] =
    &[("$", "USD"), ("€", "EUR"), ("£", "GBP"), ("AED", "AED"), ("₺", "TRY"), ("QAR", "QAR"), ("CAD", "CAD"), ("AUD", "AUD"), ("¥", "JPY")];

const KNOWN_CURRENCIES: &[&str] = &["USD", "EUR", "GBP", "AED", "TRY", "QAR", "CAD", "AUD", "JPY"];

#[derive(Debug, Default)]
pub struct InternationalStrategy;

impl ParsingStrategy for InternationalStrategy {
    fn parse(&self, fields: &RawFields, _context: &ParsingContext) -> ParseOutcome {
        let mut errors = Vec::new();
        let warnings = Vec::new();

        let airline = fields.get("airline").cloned().unwrap_or_default();
        if airline.is_empty() {
            errors.push("missing airline".to_string());
        }

        let (price, currency) = match fields.get("price") {
            Some(raw) => match self.extract_price(raw) {
                Ok(pair) => pair,
                Err(e) => {
                    errors.push(e);
                    (0.0, String::new())
                }
            },
            None => {
                errors.push("missing price".to_string());
                (0.0, String::new())
            }
        };

        if errors.is_empty() {
            if !KNOWN_CURRENCIES.contains(&currency.as_str()) {
                errors.push(format!("unknown currency '{}'", currency));
            } else if !self.validate_price_range(price) {
                errors.push(format!("price {} outside international range [0, {}]", price, MAX_PRICE));
            }
        }

        let duration_minutes = match fields.get("duration") {
            Some(raw) => match self.extract_duration(raw) {
                Ok(m) => m,
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

        if !errors.is_empty() {
            return ParseOutcome { success: false, data: None, errors, warnings };
        }

        ParseOutcome::ok(
            ParsedFlightData {
                airline,
                airline_english: None,
                flight_number: fields.get("flight_number").cloned().unwrap_or_default(),
                departure_time: fields.get("departure_time").cloned().unwrap_or_default(),
                arrival_time: fields.get("arrival_time").cloned().unwrap_or_default(),
                duration_minutes,
                price,
                currency,
                seat_class: fields.get("seat_class").cloned(),
                stops: fields.get("stops").and_then(|s| s.parse().ok()),
                source_airline: None,
                booking_source: None,
            },
            warnings,
        )
    }

    fn extract_price(&self, raw: &str) -> Result<(f64, String), String> {
        let trimmed = raw.trim();
        let currency = CURRENCY_SYMBOLS
            .iter()
            .find(|(symbol, _)| trimmed.contains(symbol))
            .map(|(_, code)| code.to_string())
            .ok_or_else(|| format!("could not detect currency in '{}'", raw))?;

        let numeric: String = trimmed.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
        let amount = numeric.parse::<f64>().map_err(|_| format!("could not parse amount in '{}'", raw))?;
        Ok((amount, currency))
    }

    fn extract_duration(&self, raw: &str) -> Result<u32, String> {
        let trimmed = raw.trim().to_ascii_lowercase();
        if let Some(hm) = parse_h_m(&trimmed) {
            return Ok(hm);
        }
        if let Some(min) = parse_n_min(&trimmed) {
            return Ok(min);
        }
        Err(format!("unrecognized duration form '{}'", raw))
    }

    fn validate_price_range(&self, price: f64) -> bool {
        (0.0..=MAX_PRICE).contains(&price)
    }
}

fn parse_h_m(s: &str) -> Option<u32> {
    // "Nh Mm" e.g. "2h 30m" or "2h"
    let h_idx = s.find('h')?;
    let hours: u32 = s[..h_idx].trim().parse().ok()?;
    let rest = &s[h_idx + 1..];
    let minutes: u32 = if let Some(m_idx) = rest.find('m') {
        rest[..m_idx].trim().parse().unwrap_or(0)
    } else {
        0
    };
    Some(hours * 60 + minutes)
}

fn parse_n_min(s: &str) -> Option<u32> {
    // "N min"
    let s = s.trim().strip_suffix("min")?.trim();
    s.parse().ok()
}
