use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{cache, handlers, jobs, middleware::metrics_middleware, providers, resolve};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Resolution
        .route("/resolve", post(resolve::resolve))
        .route("/resolve/season", post(resolve::resolve_season))
        // Cache
        .route("/cache", get(cache::list_cache))
        .route("/cache/stats", get(cache::get_stats))
        .route("/cache/cleanup", post(cache::cleanup))
        .route(
            "/cache/{key}",
            get(cache::get_entry).delete(cache::remove_entry),
        )
        // Jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{key}", get(jobs::get_job).delete(jobs::forget_job))
        // Providers
        .route("/providers", get(providers::list_providers))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
