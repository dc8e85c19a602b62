use crate::error::ServerResult;
use crate::extract::ValidJson;
use crate::state::ServerState;
use axum::Json;
use axum::extract::State;
use sagar::{CorrelationOutcome, OrchestrationRequest};
use std::sync::Arc;

/// Resolve two file ids and dispatch a geospatial correlation job
/// (POST /discover-and-correlate)
///
/// # Request
///
/// ```json
/// {
///   "file1_id": 18,
///   "file2_id": 15,
///   "column1": "individualCount",
///   "column2": "TO3"
/// }
/// ```
///
/// `file1_lat_col`, `file1_lon_col`, `file2_lat_col` and `file2_lon_col` are
/// optional and default to `decimalLatitude`, `decimalLongitude`, `lat`, `lon`.
///
/// # Response
///
/// ```json
/// {"message": "...", "ml_service_response": {}}
/// ```
///
/// Fails with 422 for a malformed body, 404 when either id is unknown, 503
/// when the analysis service is unreachable and 500 otherwise.
pub async fn discover_and_correlate(
    State(state): State<Arc<ServerState>>,
    ValidJson(request): ValidJson<OrchestrationRequest>,
) -> ServerResult<Json<CorrelationOutcome>> {
    tracing::info!(
        file1_id = request.file1_id,
        file2_id = request.file2_id,
        column1 = %request.column1,
        column2 = %request.column2,
        "correlation requested"
    );

    let outcome = state.orchestrator.discover_and_correlate(request).await?;
    Ok(Json(outcome))
}
