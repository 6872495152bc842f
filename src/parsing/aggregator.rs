//! Aggregator-site parsing strategy (§4.6): a hybrid of persian and
//! international conventions, broader price range, and a requirement to
//! preserve attribution to the underlying airline or booking source.

use super::{contains_locale_digits, locale_digits_to_ascii, international::InternationalStrategy};
use super::{ParseOutcome, ParsedFlightData, ParsingContext, ParsingStrategy, RawFields};

const MAX_PRICE: f64 = 100_000_000.0;

#[derive(Debug, Default)]
pub struct AggregatorStrategy {
    international: InternationalStrategy,
}

impl ParsingStrategy for AggregatorStrategy {
    fn parse(&self, fields: &RawFields, _context: &ParsingContext) -> ParseOutcome {
        let mut errors = Vec::new();
        let warnings = Vec::new();

        let source_airline = fields.get("source_airline").cloned();
        let booking_source = fields.get("booking_source").cloned();
        if source_airline.is_none() && booking_source.is_none() {
            errors.push("aggregator record must carry source_airline or booking_source".to_string());
        }

        let raw_price = fields.get("price").cloned().unwrap_or_default();
        let digit_converted = if contains_locale_digits(&raw_price) { locale_digits_to_ascii(&raw_price) } else { raw_price.clone() };

        let (price, currency) = match self.extract_price(&digit_converted) {
            Ok(pair) => pair,
            Err(e) => {
                errors.push(e);
                (0.0, String::new())
            }
        };

        if errors.is_empty() && !self.validate_price_range(price) {
            errors.push(format!("price {} outside aggregator range [0, {}]", price, MAX_PRICE));
        }

        let duration_minutes = match fields.get("duration") {
            Some(raw) => {
                let converted = if contains_locale_digits(raw) { locale_digits_to_ascii(raw) } else { raw.clone() };
                match self.extract_duration(&converted) {
                    Ok(m) => m,
                    Err(e) => {
                        errors.push(e);
                        0
                    }
                }
            }
            None => {
                errors.push("missing duration".to_string());
                0
            }
        };

        let airline = fields.get("airline").cloned().unwrap_or_default();
        if airline.is_empty() && source_airline.is_none() {
            errors.push("missing airline".to_string());
        }

        if !errors.is_empty() {
            return ParseOutcome { success: false, data: None, errors, warnings };
        }

        ParseOutcome::ok(
            ParsedFlightData {
                airline: if airline.is_empty() { source_airline.clone().unwrap_or_default() } else { airline },
                airline_english: None,
                flight_number: fields.get("flight_number").cloned().unwrap_or_default(),
                departure_time: fields.get("departure_time").cloned().unwrap_or_default(),
                arrival_time: fields.get("arrival_time").cloned().unwrap_or_default(),
                duration_minutes,
                price,
                currency,
                seat_class: fields.get("seat_class").cloned(),
                stops: fields.get("stops").and_then(|s| s.parse().ok()),
                source_airline,
                booking_source,
            },
            warnings,
        )
    }

    fn extract_price(&self, raw: &str) -> Result<(f64, String), String> {
        self.international.extract_price(raw).or_else(|_| {
            let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
            digits
                .parse::<f64>()
                .map(|amount| (amount, "IRR".to_string()))
                .map_err(|_| format!("could not extract an aggregator price from '{}'", raw))
        })
    }

    fn extract_duration(&self, raw: &str) -> Result<u32, String> {
        self.international.extract_duration(raw).or_else(|_| {
            let digits: Vec<u32> =
                raw.split(|c: char| !c.is_ascii_digit()).filter(|s| !s.is_empty()).filter_map(|s| s.parse().ok()).collect();
            match digits.len() {
                0 => Err(format!("unrecognized aggregator duration form '{}'", raw)),
                1 => Ok(digits[0]),
                _ => Ok(digits[0] * 60 + digits[1]),
            }
        })
    }

    fn validate_price_range(&self, price: f64) -> bool {
        (0.0..=MAX_PRICE).contains(&price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy() -> AggregatorStrategy {
        AggregatorStrategy::default()
    }

    #[test]
    fn requires_source_attribution() {
        let mut fields = RawFields::new();
        fields.insert("airline".to_string(), "Emirates".to_string());
        fields.insert("price".to_string(), "$500".to_string());
        fields.insert("duration".to_string(), "5h".to_string());

        let outcome = strategy().parse(&fields, &ParsingContext::default());
        assert!(!outcome.success);
        assert!(outcome.errors.iter().any(|e| e.contains("source_airline")));
    }

    #[test]
    fn accepts_booking_source_attribution() {
        let mut fields = RawFields::new();
        fields.insert("airline".to_string(), "Emirates".to_string());
        fields.insert("booking_source".to_string(), "skyscanner".to_string());
        fields.insert("price".to_string(), "$500".to_string());
        fields.insert("duration".to_string(), "5h".to_string());

        let outcome = strategy().parse(&fields, &ParsingContext::default());
        assert!(outcome.success, "errors: {:?}", outcome.errors);
    }

    #[test]
    fn converts_locale_digits_when_present() {
        let mut fields = RawFields::new();
        fields.insert("airline".to_string(), "Qatar Airways".to_string());
        fields.insert("source_airline".to_string(), "Qatar Airways".to_string());
        fields.insert("price".to_string(), "۵۰۰۰۰۰۰".to_string());
        fields.insert("duration".to_string(), "۳۰۰".to_string());

        let outcome = strategy().parse(&fields, &ParsingContext::default());
        assert!(outcome.success, "errors: {:?}", outcome.errors);
        let data = outcome.data.unwrap();
        assert_eq!(data.price, 5_000_000.0);
    }

    #[test]
    fn allows_broader_price_range() {
        assert!(strategy().validate_price_range(90_000_000.0));
        assert!(!strategy().validate_price_range(200_000_000.0));
    }
}
