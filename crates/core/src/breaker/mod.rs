//! Per-provider circuit breakers.
//!
//! A breaker counts consecutive failures of one upstream provider. Once the
//! threshold is reached it opens and the provider is skipped until the
//! recovery timeout elapses; the next request is let through as a half-open trial.

mod circuit_breaker;
mod registry;

pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use registry::{BreakerRegistry, BreakerStatus};
