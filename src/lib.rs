//! SAGAR backend core.
//!
//! Looks up marine file records in a managed metadata store and forwards
//! correlation jobs to a separate analysis service. There is no state of our
//! own: every request reads the store, maybe posts one job, and returns.
//!
//! - [`metadata`]: the store query model, the PostgREST backend (plus an
//!   in-memory one behind the `test-util` feature), and the [`FileCatalog`]
//!   over the `file_metadata` table.
//! - [`analysis`]: the analysis service client.
//! - [`orchestrate`]: search and discover-and-correlate, independent of HTTP.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sagar::{FileCatalog, HttpAnalysisClient, OrchestrationRequest, Orchestrator, PostgrestStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PostgrestStore::new("https://abc.supabase.co", "service-key")?;
//! let catalog = FileCatalog::new(Arc::new(store), sagar::DEFAULT_METADATA_TABLE);
//! let analysis = HttpAnalysisClient::new("http://ml-service:8001")?;
//! let orchestrator = Orchestrator::new(catalog, Some(Arc::new(analysis)));
//!
//! let outcome = orchestrator
//!     .discover_and_correlate(OrchestrationRequest::new(18, 15, "individualCount", "TO3"))
//!     .await?;
//! println!("{}", outcome.ml_service_response);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod error;
pub mod metadata;
pub mod orchestrate;

pub use analysis::{
    ANALYSIS_TIMEOUT, AnalysisJobPayload, AnalysisService, GEOSPATIAL_CORRELATION_PATH,
    HttpAnalysisClient,
};
pub use error::{AnalysisError, OrchestrationError, StoreError};
pub use metadata::{
    DEFAULT_METADATA_TABLE, FileCatalog, FileMetadataRecord, Filter, MetadataStore,
    PostgrestStore, Row, SelectQuery,
};

#[cfg(any(test, feature = "test-util"))]
pub use analysis::StubAnalysis;
#[cfg(any(test, feature = "test-util"))]
pub use metadata::InMemoryStore;
pub use orchestrate::{CorrelationOutcome, DISPATCHED_MESSAGE, OrchestrationRequest, Orchestrator};

/// Name reported by the root and health endpoints.
pub const SERVICE_NAME: &str = "SAGAR Backend Service";
