//! Provider registry API handlers.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use reelcache_core::{breaker::BreakerStatus, ProviderTier};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProviderResponse {
    pub name: String,
    pub tier: ProviderTier,
    pub priority: u32,
    pub enabled: bool,
    pub breaker: BreakerStatus,
}

#[derive(Debug, Serialize)]
pub struct ProviderListResponse {
    pub providers: Vec<ProviderResponse>,
}

/// GET /api/v1/providers
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<ProviderListResponse> {
    let aggregator = state.aggregator();
    let breakers = aggregator.breakers();

    let providers = aggregator
        .registry()
        .all()
        .iter()
        .map(|entry| {
            let breaker = breakers.get(entry.name());
            ProviderResponse {
                name: entry.name().to_string(),
                tier: entry.settings.tier,
                priority: entry.settings.priority,
                enabled: entry.settings.enabled,
                breaker: BreakerStatus::from(breaker.as_ref()),
            }
        })
        .collect();

    Json(ProviderListResponse { providers })
}
