//! Background job API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use reelcache_core::{cache_key, queue::QueueError, JobRecord};

use super::{ErrorResponse, SuccessResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub key: String,
    pub in_flight: bool,
    #[serde(flatten)]
    pub record: JobRecord,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    pub total: usize,
}

fn internal_error(e: impl ToString) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

/// GET /api/v1/jobs
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JobListResponse>, impl IntoResponse> {
    let queue = state.queue();

    match queue.list() {
        Ok(records) => {
            let jobs: Vec<JobResponse> = records
                .into_iter()
                .map(|(key, record)| JobResponse {
                    in_flight: queue.is_in_flight(&key),
                    key,
                    record,
                })
                .collect();
            let total = jobs.len();
            Ok(Json(JobListResponse { jobs, total }))
        }
        Err(e) => Err(internal_error(e)),
    }
}

/// GET /api/v1/jobs/{key}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<JobResponse>, impl IntoResponse> {
    let queue = state.queue();
    let key = cache_key(&key);

    match queue.get(&key) {
        Ok(Some(record)) => Ok(Json(JobResponse {
            in_flight: queue.is_in_flight(&key),
            key,
            record,
        })),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Job not found: {}", key),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}

/// DELETE /api/v1/jobs/{key}
///
/// Forget a finished or stranded job so the key can be enqueued again.
pub async fn forget_job(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<SuccessResponse>, impl IntoResponse> {
    let key = cache_key(&key);

    match state.queue().forget(&key) {
        Ok(true) => Ok(Json(SuccessResponse {
            message: format!("Forgot job {}", key),
        })),
        Ok(false) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Job not found: {}", key),
            }),
        )),
        Err(e @ QueueError::InFlight(_)) => Err((
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
        Err(e) => Err(internal_error(e)),
    }
}
