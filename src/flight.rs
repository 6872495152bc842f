//! Normalized flight record, search parameters, and quality scoring (§3).

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

/// Cabin class as reported on the normalized record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
pub enum SeatClass {
    #[default]
    Economy,
    Business,
    First,
    PremiumEconomy,
}

/// Whether a search is one-way or round-trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "snake_case"))]
pub enum TripType {
    #[default]
    OneWay,
    RoundTrip,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Passengers {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

/// Caller-supplied search parameters (§3). Required fields beyond these are
/// declared per-adapter and validated by the adapter template's step 1.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchParams {
    pub origin: String,
    pub destination: String,
    pub departure_date: String,
    pub return_date: Option<String>,
    pub passengers: Passengers,
    pub seat_class: SeatClass,
    pub trip_type: TripType,
}

/// Error returned when a [`FlightRecord`] fails its structural invariants (§3, §8 property 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    ArrivalNotAfterDeparture,
    DurationMismatch,
    NegativePrice,
    NegativeStops,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            InvariantViolation::ArrivalNotAfterDeparture => "arrival_time must be after departure_time",
            InvariantViolation::DurationMismatch => "duration_minutes deviates from arrival - departure by > 60 min",
            InvariantViolation::NegativePrice => "price must be >= 0",
            InvariantViolation::NegativeStops => "stops must be >= 0",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for InvariantViolation {}

/// Extension fields not common to every source (baggage, fare rules, miles, refund policy, ...).
pub type Extensions = HashMap<String, String>;

/// A normalized flight offer (§3).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct FlightRecord {
    pub airline: String,
    pub airline_english: Option<String>,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: SystemTime,
    pub arrival_time: SystemTime,
    pub duration_minutes: u32,
    pub price: f64,
    pub currency: String,
    pub seat_class: SeatClass,
    pub aircraft_type: Option<String>,
    pub stops: u32,
    pub source_site: String,
    pub scraped_at: SystemTime,
    pub extensions: Extensions,
}

const DURATION_SLACK: Duration = Duration::from_secs(60 * 60);

impl FlightRecord {
    /// Validate the structural invariants shared by every source (§3).
    /// Per-adapter price/duration ranges are checked separately by the
    /// adapter template's step 8 against `data_validation` configuration.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.price < 0.0 {
            return Err(InvariantViolation::NegativePrice);
        }
        let elapsed = self
            .arrival_time
            .duration_since(self.departure_time)
            .map_err(|_| InvariantViolation::ArrivalNotAfterDeparture)?;
        let declared = Duration::from_secs(self.duration_minutes as u64 * 60);
        let diff = if elapsed > declared { elapsed - declared } else { declared - elapsed };
        if diff > DURATION_SLACK {
            return Err(InvariantViolation::DurationMismatch);
        }
        Ok(())
    }

    /// Canonicalize in place: uppercase IATA codes, uppercase currency, and
    /// drop leading/trailing whitespace from text fields. Idempotent (§8
    /// property 4): applying it twice yields the same record as applying it
    /// once.
    pub fn normalize(mut self) -> Self {
        self.origin = self.origin.trim().to_ascii_uppercase();
        self.destination = self.destination.trim().to_ascii_uppercase();
        self.currency = self.currency.trim().to_ascii_uppercase();
        self.airline = self.airline.trim().to_string();
        if let Some(english) = self.airline_english.as_mut() {
            *english = english.trim().to_string();
        }
        self.flight_number = self.flight_number.trim().to_ascii_uppercase();
        self
    }

    /// Heuristic completeness/consistency score in `[0.0, 1.0]`, supplementing
    /// the distilled spec from `original_source/quality_checker.py`: rewards
    /// presence of optional fields and penalizes suspiciously round prices
    /// that often indicate a parsing placeholder rather than a real fare.
    pub fn quality_score(&self) -> f64 {
        let mut score: f64 = 0.6;
        if self.airline_english.is_some() {
            score += 0.1;
        }
        if self.aircraft_type.is_some() {
            score += 0.1;
        }
        if !self.extensions.is_empty() {
            score += 0.1;
        }
        if self.price > 0.0 && self.price.fract() == 0.0 && self.price % 1000.0 == 0.0 {
            score -= 0.05;
        }
        if !self.flight_number.is_empty() {
            score += 0.1;
        }
        score.clamp(0.0, 1.0)
    }
}
