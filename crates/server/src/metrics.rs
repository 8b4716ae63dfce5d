//! Prometheus metrics for the HTTP surface.
//!
//! Registers the server's HTTP metrics alongside the core resolution
//! metrics, and refreshes a few gauges from live state at scrape time.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use reelcache_core::BreakerState;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelcache_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelcache_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelcache_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// State gauges (collected at scrape time)
// =============================================================================

pub static CACHE_ENTRIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("reelcache_cache_entries", "Entries in the content cache index").unwrap()
});

pub static JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelcache_jobs_in_flight",
        "Background jobs currently scheduled or running",
    )
    .unwrap()
});

pub static BREAKERS_OPEN: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "reelcache_breakers_open",
        "Providers whose circuit breaker is open",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    registry.register(Box::new(CACHE_ENTRIES.clone())).unwrap();
    registry.register(Box::new(JOBS_IN_FLIGHT.clone())).unwrap();
    registry.register(Box::new(BREAKERS_OPEN.clone())).unwrap();

    // Core metrics (resolutions, cache, providers, breakers, jobs)
    for metric in reelcache_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh state gauges before a scrape.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Ok(stats) = state.cache().stats() {
        CACHE_ENTRIES.set(stats.total as i64);
    }
    JOBS_IN_FLIGHT.set(state.queue().in_flight_count() as i64);

    let open = state
        .aggregator()
        .breakers()
        .snapshot()
        .iter()
        .filter(|b| b.state == BreakerState::Open)
        .count();
    BREAKERS_OPEN.set(open as i64);
}

static UUID_RE: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
    )
    .unwrap()
});

/// Routes whose last segment is a free-form key.
static KEYED_RE: Lazy<regex_lite::Regex> =
    Lazy::new(|| regex_lite::Regex::new(r"^(/api/v1/(?:cache|jobs))/[^/]+$").unwrap());

/// Normalize a path for metric labels (replace keys and IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    if path == "/api/v1/cache/stats" || path == "/api/v1/cache/cleanup" {
        return path.to_string();
    }
    let result = KEYED_RE.replace(path, "$1/{key}");
    UUID_RE.replace_all(&result, "{id}").into_owned()
}
