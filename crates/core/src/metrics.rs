//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Resolution outcomes and cache lookups
//! - Provider calls and circuit breaker transitions
//! - Background job runs and retries

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Resolver
// =============================================================================

/// Resolutions by final status.
pub static RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelcache_resolutions_total", "Total resolution requests"),
        &["status"], // "hit", "delivered", "queued", "not_found", "in_progress"
    )
    .unwrap()
});

/// Cache lookups by result.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelcache_cache_lookups_total", "Content cache lookups"),
        &["result"], // "hit", "miss", "expired"
    )
    .unwrap()
});

// =============================================================================
// Providers
// =============================================================================

/// Provider calls by provider and result.
pub static PROVIDER_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelcache_provider_calls_total", "Provider search calls"),
        &["provider", "result"], // result: "success", "empty", "error", "skipped"
    )
    .unwrap()
});

/// Circuit breaker state transitions.
pub static BREAKER_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "reelcache_breaker_transitions_total",
            "Circuit breaker state transitions",
        ),
        &["provider", "state"], // state entered: "closed", "open", "half_open"
    )
    .unwrap()
});

/// Aggregation fan-out duration in seconds.
pub static AGGREGATION_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "reelcache_aggregation_duration_seconds",
            "Duration of a provider fan-out",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .unwrap()
});

// =============================================================================
// Job queue
// =============================================================================

/// Job executions by result.
pub static JOB_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelcache_job_runs_total", "Background job executions"),
        &["result"], // "completed", "retry", "failed"
    )
    .unwrap()
});

/// Retries scheduled after a failed attempt.
pub static JOB_RETRIES_SCHEDULED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "reelcache_job_retries_scheduled_total",
        "Retries scheduled by the job queue",
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(RESOLUTIONS.clone()),
        Box::new(CACHE_LOOKUPS.clone()),
        Box::new(PROVIDER_CALLS.clone()),
        Box::new(BREAKER_TRANSITIONS.clone()),
        Box::new(AGGREGATION_DURATION.clone()),
        Box::new(JOB_RUNS.clone()),
        Box::new(JOB_RETRIES_SCHEDULED.clone()),
    ]
}
