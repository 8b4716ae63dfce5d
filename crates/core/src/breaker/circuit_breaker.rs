use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tokio::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::BreakerConfig;
use crate::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    failure_count: u32,
    next_attempt_at: Option<Instant>,
}

/// Consecutive-failure circuit breaker for a single provider.
///
/// All methods take `&self`; the state sits behind a short-lived mutex that
/// is never held across an await.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &BreakerConfig) -> Self {
        Self::with_settings(
            name,
            config.failure_threshold,
            Duration::from_secs(config.recovery_timeout_secs),
        )
    }

    pub fn with_settings(
        name: impl Into<String>,
        failure_threshold: u32,
        recovery_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                failure_count: 0,
                next_attempt_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a request may be sent now.
    ///
    /// An open breaker whose recovery window has elapsed moves to half-open
    /// and admits the caller as the trial request.
    pub fn can_request(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed | BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let due = inner
                    .next_attempt_at
                    .map(|at| Instant::now() >= at)
                    .unwrap_or(true);
                if due {
                    inner.state = BreakerState::HalfOpen;
                    self.record_transition(BreakerState::HalfOpen);
                    info!(provider = %self.name, "Circuit breaker half-open, probing provider");
                }
                due
            }
        }
    }

    pub fn on_success(&self) {
        let mut inner = self.lock();
        let previous = inner.state;
        inner.state = BreakerState::Closed;
        inner.failure_count = 0;
        inner.next_attempt_at = None;
        if previous != BreakerState::Closed {
            self.record_transition(BreakerState::Closed);
            info!(provider = %self.name, "Circuit breaker closed");
        }
    }

    pub fn on_failure(&self) {
        let mut inner = self.lock();
        inner.failure_count = inner.failure_count.saturating_add(1);

        let trip = inner.state == BreakerState::HalfOpen
            || (inner.state == BreakerState::Closed
                && inner.failure_count >= self.failure_threshold);

        if trip {
            inner.state = BreakerState::Open;
            inner.next_attempt_at = Some(Instant::now() + self.recovery_timeout);
            self.record_transition(BreakerState::Open);
            warn!(
                provider = %self.name,
                failures = inner.failure_count,
                retry_in_secs = self.recovery_timeout.as_secs(),
                "Circuit breaker opened"
            );
        }
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Time left before an open breaker admits a trial request.
    pub fn retry_in(&self) -> Option<Duration> {
        let inner = self.lock();
        match (inner.state, inner.next_attempt_at) {
            (BreakerState::Open, Some(at)) => Some(at.saturating_duration_since(Instant::now())),
            _ => None,
        }
    }

    fn record_transition(&self, state: BreakerState) {
        metrics::BREAKER_TRANSITIONS
            .with_label_values(&[&self.name, state.as_str()])
            .inc();
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Plain counters; a poisoned guard still holds usable state.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
