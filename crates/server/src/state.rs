use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use sagar::{AnalysisService, FileCatalog, HttpAnalysisClient, MetadataStore, Orchestrator, PostgrestStore};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
///
/// Everything in here is read-only after startup, so handlers share it
/// behind an `Arc` without locking.
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Search and correlation logic over the configured collaborators
    pub orchestrator: Orchestrator,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl ServerState {
    /// Build state with the Supabase store and, when configured, the HTTP
    /// analysis client.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let (Some(url), Some(key)) = (config.supabase_url(), config.supabase_key()) else {
            return Err(ServerError::Config(
                "supabase_url and supabase_key must both be set".to_string(),
            ));
        };
        let store =
            PostgrestStore::new(url, key).map_err(|e| ServerError::Config(e.to_string()))?;

        let analysis = match config.ml_service_url() {
            Some(url) => {
                let client = HttpAnalysisClient::new(url)
                    .map_err(|e| ServerError::Config(e.to_string()))?;
                Some(Arc::new(client) as Arc<dyn AnalysisService>)
            }
            None => None,
        };

        Ok(Self::with_collaborators(config, Arc::new(store), analysis))
    }

    /// Build state around explicit collaborators.
    pub fn with_collaborators(
        config: ServerConfig,
        store: Arc<dyn MetadataStore>,
        analysis: Option<Arc<dyn AnalysisService>>,
    ) -> Self {
        let catalog = FileCatalog::new(store, config.metadata_table.clone());
        Self {
            config: Arc::new(config),
            orchestrator: Orchestrator::new(catalog, analysis),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
