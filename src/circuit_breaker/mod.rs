//! Single-scope circuit breaker state machine (C3).
//!
//! A lock-free `closed` → `open` → `half_open` machine backed by atomics,
//! composed four times per site by [`manager::CircuitBreakerManager`].

mod manager;
mod scope;

pub use manager::{CircuitBreakerManager, CircuitStatus, Recommendation};
pub use scope::{IntegrationFailure, Scope};

use crate::clock::{Clock, MonotonicClock};
use crate::error::ResilienceError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const STATE_CLOSED: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_HALF_OPEN: u8 = 2;

/// Observable state of a single-scope breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl From<u8> for CircuitState {
    fn from(raw: u8) -> Self {
        match raw {
            STATE_OPEN => CircuitState::Open,
            STATE_HALF_OPEN => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Configuration for a single-scope breaker (§4.3).
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: usize,
    pub recovery_timeout: Duration,
    pub half_open_max_calls: usize,
}

impl CircuitBreakerConfig {
    /// A breaker that never opens, used to disable a scope entirely.
    pub fn disabled() -> Self {
        Self {
            failure_threshold: usize::MAX,
            recovery_timeout: Duration::from_secs(0),
            half_open_max_calls: usize::MAX,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            half_open_max_calls: 2,
        }
    }
}

#[derive(Debug)]
struct CircuitBreakerState {
    state: AtomicU8,
    failure_count: AtomicUsize,
    half_open_successes: AtomicUsize,
    opened_at_millis: AtomicU64,
    half_open_calls: AtomicUsize,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(STATE_CLOSED),
            failure_count: AtomicUsize::new(0),
            half_open_successes: AtomicUsize::new(0),
            opened_at_millis: AtomicU64::new(0),
            half_open_calls: AtomicUsize::new(0),
        }
    }
}

/// Single-scope breaker admitting or rejecting calls for one (site, scope) pair.
#[derive(Clone)]
pub struct CircuitBreakerPolicy {
    state: Arc<CircuitBreakerState>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CircuitBreakerPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerPolicy")
            .field("state", &self.current_state())
            .field("config", &self.config)
            .finish()
    }
}

impl CircuitBreakerPolicy {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { state: Arc::new(CircuitBreakerState::default()), config, clock: Arc::new(MonotonicClock::default()) }
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn config(&self) -> CircuitBreakerConfig {
        self.config
    }

    /// Non-blocking admission check; transitions `open` → `half_open` if the
    /// recovery timeout has elapsed.
    pub fn is_call_permitted(&self) -> bool {
        match CircuitState::from(self.state.state.load(Ordering::Acquire)) {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                self.state.half_open_calls.fetch_add(1, Ordering::AcqRel) < self.config.half_open_max_calls
            }
            CircuitState::Open => {
                let opened_at = self.state.opened_at_millis.load(Ordering::Acquire);
                let now = self.clock.now_millis();
                if now.saturating_sub(opened_at) >= self.config.recovery_timeout.as_millis() as u64 {
                    self.try_transition_to_half_open();
                    self.is_call_permitted()
                } else {
                    false
                }
            }
        }
    }

    pub fn current_state(&self) -> CircuitState {
        CircuitState::from(self.state.state.load(Ordering::Acquire))
    }

    pub fn failure_count(&self) -> usize {
        self.state.failure_count.load(Ordering::Acquire)
    }

    fn try_transition_to_half_open(&self) {
        if self
            .state
            .state
            .compare_exchange(STATE_OPEN, STATE_HALF_OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.state.half_open_calls.store(0, Ordering::Release);
            self.state.half_open_successes.store(0, Ordering::Release);
        }
    }

    fn on_success(&self) {
        match self.current_state() {
            CircuitState::Closed => {
                self.state.failure_count.store(0, Ordering::Release);
            }
            CircuitState::HalfOpen => {
                let successes = self.state.half_open_successes.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.half_open_max_calls {
                    self.close();
                }
            }
            CircuitState::Open => {}
        }
    }

    fn on_failure(&self, threshold: usize) {
        match self.current_state() {
            CircuitState::Closed => {
                let failures = self.state.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= threshold {
                    self.open();
                }
            }
            CircuitState::HalfOpen => self.open(),
            CircuitState::Open => {}
        }
    }

    fn open(&self) {
        self.state.opened_at_millis.store(self.clock.now_millis(), Ordering::Release);
        self.state.state.store(STATE_OPEN, Ordering::Release);
    }

    fn close(&self) {
        self.state.failure_count.store(0, Ordering::Release);
        self.state.state.store(STATE_CLOSED, Ordering::Release);
    }

    /// Record the outcome of a call without routing it through `execute`.
    /// Used when admission and execution happen in separate places (safety crawler).
    pub fn report(&self, success: bool) {
        if success {
            self.on_success();
        } else {
            self.on_failure(self.config.failure_threshold);
        }
    }

    /// Like [`Self::report`], but a failure opens the breaker against
    /// `threshold` instead of `self.config.failure_threshold` — how
    /// [`manager::CircuitBreakerManager`] feeds in its adaptive threshold (§4.3).
    pub fn report_with_threshold(&self, success: bool, threshold: usize) {
        if success {
            self.on_success();
        } else {
            self.on_failure(threshold);
        }
    }

    pub async fn execute<T, E, Fut, Op>(&self, operation: Op) -> Result<T, ResilienceError<E>>
    where
        T: Send,
        E: std::error::Error + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        if !self.is_call_permitted() {
            return Err(ResilienceError::CircuitOpen {
                failure_count: self.failure_count(),
                open_duration: Duration::from_millis(
                    self.clock.now_millis().saturating_sub(self.state.opened_at_millis.load(Ordering::Acquire)),
                ),
            });
        }

        match operation().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(err) => {
                self.on_failure(self.config.failure_threshold);
                Err(err)
            }
        }
    }
}
