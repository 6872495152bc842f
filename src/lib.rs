#![forbid(unsafe_code)]

//! # Skywarden
//!
//! The resilience and coordination core behind a multi-source flight-data
//! aggregation crawler: a per-site rate limiter, a multi-scope circuit
//! breaker, a correlating error handler with pluggable recovery strategies,
//! an adapter lifecycle template, a safety-checked crawl wrapper, a
//! per-adapter scheduler, and a metadata-driven adapter registry.
//!
//! ## Quick Start
//!
//! ```rust
//! use skywarden::adapter::{AdapterTemplate, SiteSession};
//! use skywarden::circuit_breaker::CircuitBreakerManager;
//! use skywarden::error_handler::ErrorHandler;
//! use skywarden::flight::SearchParams;
//! use skywarden::parsing::RawFields;
//! use skywarden::rate_limit::{RateLimitConfig, RateLimiter, SiteRateLimiter};
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct NoopSession;
//!
//! #[async_trait::async_trait]
//! impl SiteSession for NoopSession {
//!     async fn navigate(&self, _url: &str) -> Result<(), String> {
//!         Ok(())
//!     }
//!     async fn submit(&self) -> Result<(), String> {
//!         Ok(())
//!     }
//!     async fn extract_elements(&self) -> Result<Vec<RawFields>, String> {
//!         Ok(vec![])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let rate_limiter: Arc<dyn RateLimiter> = Arc::new(SiteRateLimiter::new(RateLimitConfig::default()));
//!     let circuit = Arc::new(CircuitBreakerManager::new(Default::default()));
//!     let error_handler = Arc::new(ErrorHandler::new(circuit.clone()));
//!     let adapter = AdapterTemplate::new("flytoday", "https://flytoday.example/search", rate_limiter, error_handler, circuit);
//!
//!     let params = SearchParams { origin: "THR".into(), destination: "MHD".into(), departure_date: "2025-06-10".into(), ..Default::default() };
//!     let records = adapter.crawl(Arc::new(NoopSession), &params).await.expect("crawl");
//!     assert!(records.is_empty());
//! }
//! ```

pub mod adaptive;
pub mod adapter;
pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod error;
pub mod error_handler;
pub mod flight;
pub mod jitter;
pub mod parsing;
pub mod rate_limit;
pub mod registry;
pub mod safety_crawler;
pub mod scheduler;
pub mod sleeper;
pub mod store;
pub mod taxonomy;
pub mod timeout;

pub use adaptive::Adaptive;
pub use backoff::Backoff;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use error::ResilienceError;
pub use jitter::Jitter;
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use timeout::{TimeoutError, TimeoutPolicy, MAX_TIMEOUT};

pub mod prelude;
