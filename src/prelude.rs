//! Convenient re-exports for common Skywarden types.
pub use crate::{
    adaptive::Adaptive,
    adapter::{AdapterConfig, AdapterSession, AdapterTemplate, CrawlError, ElementParser, FormFiller, SiteSession},
    backoff::Backoff,
    circuit_breaker::{CircuitBreakerConfig, CircuitBreakerManager, CircuitState, IntegrationFailure, Recommendation, Scope},
    clock::{Clock, ManualClock, MonotonicClock},
    error_handler::{ErrorHandler, ErrorHandlerConfig, HandleOutcome},
    flight::{FlightRecord, InvariantViolation, SearchParams, SeatClass, TripType},
    jitter::Jitter,
    parsing::{ParseOutcome, ParsingContext, ParsingStrategy, RawFields},
    rate_limit::{Decision, DenyReason, RateLimitConfig, RateLimiter, SiteRateLimiter},
    registry::{AdapterMetadata, CreationStrategy, NotFound, Registry, RegistryError},
    safety_crawler::{SafetyCrawlError, SafetyCrawler, SafetyRefusal},
    scheduler::{AdapterHealth, HealthStatus, Scheduler},
    sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper},
    taxonomy::{ErrorAction, ErrorCategory, ErrorContext, ErrorRecord, ErrorSeverity},
    timeout::TimeoutPolicy,
    ResilienceError,
};
