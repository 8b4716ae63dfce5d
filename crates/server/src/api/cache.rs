//! Content cache API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use reelcache_core::{cache_key, CacheEntry, CacheStats};

use super::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CacheQueryParams {
    /// Substring of the key; all live entries when absent.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct CacheEntryResponse {
    pub key: String,
    pub expired: bool,
    #[serde(flatten)]
    pub entry: CacheEntry,
}

#[derive(Debug, Serialize)]
pub struct CacheListResponse {
    pub entries: Vec<CacheEntryResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

fn internal_error(e: impl ToString) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/cache/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CacheStats>, impl IntoResponse> {
    state.cache().stats().map(Json).map_err(internal_error)
}

/// GET /api/v1/cache?q=
///
/// Search live entries, newest first.
pub async fn list_cache(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CacheQueryParams>,
) -> Result<Json<CacheListResponse>, impl IntoResponse> {
    let fragment = params.q.unwrap_or_default();

    match state.cache().search(&fragment) {
        Ok(found) => {
            let total = found.len();
            let entries = found
                .into_iter()
                .take(params.limit)
                .map(|(key, entry)| CacheEntryResponse {
                    key,
                    expired: false,
                    entry,
                })
                .collect();
            Ok(Json(CacheListResponse { entries, total }))
        }
        Err(e) => Err(internal_error(e)),
    }
}

/// GET /api/v1/cache/{key}
///
/// Returns the entry even when expired; `expired` tells which.
pub async fn get_entry(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<CacheEntryResponse>, impl IntoResponse> {
    let cache = state.cache();
    let key = cache_key(&key);

    match cache.peek(&key) {
        Ok(Some(entry)) => Ok(Json(CacheEntryResponse {
            expired: entry.is_expired_at(cache.ttl(), Utc::now()),
            key,
            entry,
        })),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Cache entry not found: {}", key),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

/// DELETE /api/v1/cache/{key}
pub async fn remove_entry(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<SuccessResponse>, impl IntoResponse> {
    let key = cache_key(&key);

    match state.cache().remove(&key) {
        Ok(true) => Ok(Json(SuccessResponse {
            message: format!("Removed {} from cache", key),
        })),
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Cache entry not found: {}", key),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

/// POST /api/v1/cache/cleanup
///
/// Evict expired entries now.
pub async fn cleanup(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CleanupResponse>, impl IntoResponse> {
    state
        .cache()
        .cleanup_expired()
        .map(|removed| Json(CleanupResponse { removed }))
        .map_err(internal_error)
}
