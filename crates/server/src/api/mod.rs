pub mod cache;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod providers;
pub mod resolve;
pub mod routes;

pub use routes::create_router;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub message: String,
}
