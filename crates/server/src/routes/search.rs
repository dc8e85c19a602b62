use crate::error::ServerResult;
use crate::extract::ValidQuery;
use crate::state::ServerState;
use axum::Json;
use axum::extract::State;
use sagar::Row;
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters for metadata search
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    /// Only return records of this type (`image`, `tabular`, ...)
    #[serde(default)]
    pub file_type: Option<String>,
}

/// Search the file metadata table (GET /search)
///
/// Returns the matching rows exactly as the store returned them.
pub async fn search_metadata(
    State(state): State<Arc<ServerState>>,
    ValidQuery(query): ValidQuery<SearchQuery>,
) -> ServerResult<Json<Vec<Row>>> {
    let rows = state
        .orchestrator
        .search(query.file_type.as_deref())
        .await?;
    Ok(Json(rows))
}
