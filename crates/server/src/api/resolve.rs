//! Resolution API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use std::sync::Arc;
use reelcache_core::{ResolveOutcome, SeasonOutcome, SeasonRequest};

use super::ErrorResponse;
use crate::state::AppState;

/// Most episodes accepted in one season request.
const MAX_EPISODES: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
    pub title: String,
    /// Where to deliver the file; resolution only warms the cache without one.
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResolveSeasonBody {
    pub title: String,
    pub season: u32,
    pub episodes: Vec<u32>,
    pub target: Option<String>,
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// POST /api/v1/resolve
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResolveBody>,
) -> Result<Json<ResolveOutcome>, impl IntoResponse> {
    if body.title.trim().is_empty() {
        return Err(bad_request("title must not be empty"));
    }

    match state
        .resolver()
        .resolve(&body.title, body.target.as_deref())
        .await
    {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

/// POST /api/v1/resolve/season
pub async fn resolve_season(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ResolveSeasonBody>,
) -> Result<Json<SeasonOutcome>, impl IntoResponse> {
    if body.title.trim().is_empty() {
        return Err(bad_request("title must not be empty"));
    }
    if body.episodes.is_empty() {
        return Err(bad_request("episodes must not be empty"));
    }
    if body.episodes.len() > MAX_EPISODES {
        return Err(bad_request(format!(
            "at most {} episodes per request",
            MAX_EPISODES
        )));
    }

    let request = SeasonRequest {
        title: body.title,
        season: body.season,
        episodes: body.episodes,
    };

    match state
        .resolver()
        .resolve_season(&request, body.target.as_deref())
        .await
    {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}
