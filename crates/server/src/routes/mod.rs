//! API route handlers
//!
//! - `health`: liveness and readiness probes
//! - `search`: metadata search
//! - `correlate`: discover-and-correlate dispatch

pub mod correlate;
pub mod health;
pub mod search;

use crate::error::ServerError;
use axum::Json;
use sagar::SERVICE_NAME;
use serde::{Deserialize, Serialize};

/// Body of `GET /`
#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub status: String,
    pub message: String,
}

/// Root endpoint (GET /)
///
/// ```json
/// {"status": "ok", "message": "SAGAR Backend Service is running."}
/// ```
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "ok".to_string(),
        message: format!("{SERVICE_NAME} is running."),
    })
}

/// 404 Not Found handler
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
