//! Request handling shared by every transport: metadata search and the
//! discover-and-correlate flow.
//!
//! Correlation is strictly linear. Check the analysis service is configured,
//! resolve both file ids to processed locations, build the job payload, post
//! it once. The first failing step ends the request.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::{AnalysisJobPayload, AnalysisService};
use crate::error::OrchestrationError;
use crate::metadata::{FileCatalog, Row};

pub const DEFAULT_FILE1_LAT_COL: &str = "decimalLatitude";
pub const DEFAULT_FILE1_LON_COL: &str = "decimalLongitude";
pub const DEFAULT_FILE2_LAT_COL: &str = "lat";
pub const DEFAULT_FILE2_LON_COL: &str = "lon";

/// Confirmation sent back alongside the analysis service's reply.
pub const DISPATCHED_MESSAGE: &str = "Geospatial correlation job dispatched successfully.";

/// Which two files to correlate, and on which columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    pub file1_id: i64,
    pub file2_id: i64,
    pub column1: String,
    pub column2: String,
    #[serde(default = "default_file1_lat_col")]
    pub file1_lat_col: String,
    #[serde(default = "default_file1_lon_col")]
    pub file1_lon_col: String,
    #[serde(default = "default_file2_lat_col")]
    pub file2_lat_col: String,
    #[serde(default = "default_file2_lon_col")]
    pub file2_lon_col: String,
}

fn default_file1_lat_col() -> String {
    DEFAULT_FILE1_LAT_COL.to_string()
}

fn default_file1_lon_col() -> String {
    DEFAULT_FILE1_LON_COL.to_string()
}

fn default_file2_lat_col() -> String {
    DEFAULT_FILE2_LAT_COL.to_string()
}

fn default_file2_lon_col() -> String {
    DEFAULT_FILE2_LON_COL.to_string()
}

impl OrchestrationRequest {
    /// Request with the default coordinate column names.
    pub fn new(
        file1_id: i64,
        file2_id: i64,
        column1: impl Into<String>,
        column2: impl Into<String>,
    ) -> Self {
        Self {
            file1_id,
            file2_id,
            column1: column1.into(),
            column2: column2.into(),
            file1_lat_col: default_file1_lat_col(),
            file1_lon_col: default_file1_lon_col(),
            file2_lat_col: default_file2_lat_col(),
            file2_lon_col: default_file2_lon_col(),
        }
    }

    /// Combine the request with the resolved `id -> location` lookup.
    pub fn into_payload(
        self,
        locations: &HashMap<i64, String>,
    ) -> Result<AnalysisJobPayload, OrchestrationError> {
        let path_of = |id: i64| {
            locations.get(&id).cloned().ok_or_else(|| {
                OrchestrationError::NotFound(format!(
                    "File ID {id} has no processed file location"
                ))
            })
        };
        Ok(AnalysisJobPayload {
            file1_path: path_of(self.file1_id)?,
            file2_path: path_of(self.file2_id)?,
            column1: self.column1,
            column2: self.column2,
            file1_lat_col: self.file1_lat_col,
            file1_lon_col: self.file1_lon_col,
            file2_lat_col: self.file2_lat_col,
            file2_lon_col: self.file2_lon_col,
        })
    }
}

/// Successful correlation dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationOutcome {
    pub message: String,
    pub ml_service_response: Value,
}

/// Glue between the metadata catalog and the analysis service.
///
/// Holds only shared, read-only handles; clone freely.
#[derive(Clone)]
pub struct Orchestrator {
    catalog: FileCatalog,
    analysis: Option<Arc<dyn AnalysisService>>,
}

impl Orchestrator {
    /// `analysis` is `None` when no analysis service url is configured;
    /// correlation requests then fail with a configuration error.
    pub fn new(catalog: FileCatalog, analysis: Option<Arc<dyn AnalysisService>>) -> Self {
        Self { catalog, analysis }
    }

    pub fn catalog(&self) -> &FileCatalog {
        &self.catalog
    }

    pub fn analysis_configured(&self) -> bool {
        self.analysis.is_some()
    }

    pub async fn search(&self, file_type: Option<&str>) -> Result<Vec<Row>, OrchestrationError> {
        let rows = self.catalog.search(file_type).await?;
        tracing::debug!(file_type = ?file_type, count = rows.len(), "metadata search");
        Ok(rows)
    }

    pub async fn discover_and_correlate(
        &self,
        request: OrchestrationRequest,
    ) -> Result<CorrelationOutcome, OrchestrationError> {
        let analysis = self.analysis.as_ref().ok_or_else(|| {
            OrchestrationError::Configuration("ML service URL is not configured.".into())
        })?;

        let ids = [request.file1_id, request.file2_id];
        let records = self.catalog.locate(&ids).await?;
        if records.len() < 2 {
            let missing: Vec<String> = ids
                .iter()
                .filter(|id| !records.iter().any(|r| r.id == **id))
                .map(ToString::to_string)
                .collect();
            tracing::info!(file1_id = ids[0], file2_id = ids[1], found = records.len(), "file ids not resolved");
            let detail = if missing.is_empty() {
                // Both ids are the same record.
                format!("Expected two distinct files, got only ID {}", ids[0])
            } else {
                format!("File ID(s) not found: {}", missing.join(", "))
            };
            return Err(OrchestrationError::NotFound(detail));
        }

        let locations: HashMap<i64, String> = records
            .into_iter()
            .filter_map(|r| r.processed_file_location.map(|loc| (r.id, loc)))
            .collect();
        let payload = request.into_payload(&locations)?;

        let reply = analysis.geospatial_correlation(&payload).await?;
        tracing::info!(file1 = %payload.file1_path, file2 = %payload.file2_path, "correlation job dispatched");

        Ok(CorrelationOutcome {
            message: DISPATCHED_MESSAGE.to_string(),
            ml_service_response: reply,
        })
    }
}
