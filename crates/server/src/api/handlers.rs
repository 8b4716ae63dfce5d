use axum::{extract::State, http::header, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use reelcache_core::{breaker::BreakerStatus, BreakerState, SanitizedConfig};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" while any provider breaker is open.
    pub status: String,
    pub providers: usize,
    pub jobs_in_flight: usize,
    pub breakers: Vec<BreakerStatus>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let breakers = state.aggregator().breakers().snapshot();
    let degraded = breakers.iter().any(|b| b.state == BreakerState::Open);

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "ok" }.to_string(),
        providers: state.aggregator().registry().len(),
        jobs_in_flight: state.queue().in_flight_count(),
        breakers,
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
