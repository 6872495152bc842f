//! Scope taxonomy and failure-weight table for the multi-scope breaker (§4.3).

/// One of the four independent breakers composed per site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    RateLimiter,
    ErrorHandler,
    Adapter,
    Global,
}

impl Scope {
    pub const ALL: [Scope; 4] = [Scope::RateLimiter, Scope::ErrorHandler, Scope::Adapter, Scope::Global];
}

/// Integration-failure types routed into the breaker, each with a fixed weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegrationFailure {
    RateLimitExceeded,
    ErrorHandlerFailure,
    AdapterFailure,
    Timeout,
    NetworkError,
    ValidationError,
}

impl IntegrationFailure {
    /// Weight used both to decide whether a failure also propagates to the
    /// `global` scope (≥ 0.8) and, in the future, for adaptive-threshold
    /// feedback.
    pub fn weight(self) -> f64 {
        match self {
            IntegrationFailure::RateLimitExceeded => 0.5,
            IntegrationFailure::ErrorHandlerFailure => 1.0,
            IntegrationFailure::AdapterFailure => 1.0,
            IntegrationFailure::Timeout => 0.8,
            IntegrationFailure::NetworkError => 0.9,
            IntegrationFailure::ValidationError => 0.3,
        }
    }

    /// `true` when this failure is severe enough to also count against the
    /// site's `global` breaker.
    pub fn propagates_to_global(self) -> bool {
        self.weight() >= 0.8
    }

    /// The scope that directly produced this kind of failure.
    pub fn origin_scope(self) -> Scope {
        match self {
            IntegrationFailure::RateLimitExceeded => Scope::RateLimiter,
            IntegrationFailure::ErrorHandlerFailure => Scope::ErrorHandler,
            IntegrationFailure::AdapterFailure => Scope::Adapter,
            IntegrationFailure::Timeout | IntegrationFailure::NetworkError | IntegrationFailure::ValidationError => {
                Scope::Adapter
            }
        }
    }
}
