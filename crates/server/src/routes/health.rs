use crate::state::ServerState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use std::sync::Arc;

/// Health check endpoint (liveness)
/// Returns 200 if server is running
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "sagar-server",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Readiness check endpoint
///
/// Ready once the metadata store answers. An unconfigured analysis service
/// is reported but does not fail readiness: search still works without it.
pub async fn readiness_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let (store_status, store_error) = match state.orchestrator.catalog().ping().await {
        Ok(()) => ("ready", None),
        Err(err) => {
            tracing::warn!(error = %err, "metadata store not ready");
            ("unavailable", Some(err.to_string()))
        }
    };
    let analysis_status = if state.orchestrator.analysis_configured() {
        "configured"
    } else {
        "not_configured"
    };

    let (status, readiness) = if store_error.is_none() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    let mut body = json!({
        "status": readiness,
        "service": "sagar-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
        "components": {
            "metadata_store": store_status,
            "analysis_service": analysis_status,
        }
    });
    if let Some(error) = store_error {
        body["error"] = json!(error);
    }

    (status, Json(body))
}
