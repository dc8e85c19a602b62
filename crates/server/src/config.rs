use sagar::DEFAULT_METADATA_TABLE;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Environment variable prefix, e.g. `SAGAR__ML_SERVICE_URL`.
pub const ENV_PREFIX: &str = "SAGAR";

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server bind address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Whole-request timeout in seconds. Must exceed the 30s analysis
    /// dispatch timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum request body size in MB
    #[serde(default = "default_max_body_size_mb")]
    pub max_body_size_mb: usize,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,

    /// Log filter directive (`info`, `sagar=debug,tower_http=info`, ...)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `json` or `text`
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Base url of the analysis service. Optional at startup; correlation
    /// requests fail without it.
    #[serde(default)]
    pub ml_service_url: Option<String>,

    /// Supabase project url
    #[serde(default)]
    pub supabase_url: Option<String>,

    /// Supabase API key
    #[serde(default)]
    pub supabase_key: Option<String>,

    /// Table holding the file records
    #[serde(default = "default_metadata_table")]
    pub metadata_table: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_body_size_mb: default_max_body_size_mb(),
            enable_cors: default_true(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            ml_service_url: None,
            supabase_url: None,
            supabase_key: None,
            metadata_table: default_metadata_table(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional `server.*` file and `SAGAR__*`
    /// environment variables, the latter taking precedence.
    pub fn load() -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::with_name("server").required(false))
            // Override with environment variables
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

        Self::from_builder(builder)
    }

    /// Deserialize and validate whatever sources the builder carries.
    pub fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> anyhow::Result<Self> {
        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        if config.ml_service_url().is_none() {
            tracing::warn!("ML service URL not configured; correlation requests will fail");
        }

        Ok(config)
    }

    /// Reject values that can never work. A missing analysis url is allowed.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(url) = self.ml_service_url() {
            sagar::analysis::validate_base_url(url)?;
        }
        if self.metadata_table.trim().is_empty() {
            anyhow::bail!("metadata_table must not be empty");
        }
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("log_format must be 'json' or 'text', got '{}'", self.log_format);
        }
        Ok(())
    }

    /// The analysis service url, treating a blank value as unset.
    pub fn ml_service_url(&self) -> Option<&str> {
        non_blank(self.ml_service_url.as_deref())
    }

    pub fn supabase_url(&self) -> Option<&str> {
        non_blank(self.supabase_url.as_deref())
    }

    pub fn supabase_key(&self) -> Option<&str> {
        non_blank(self.supabase_key.as_deref())
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.bind_addr, self.port);
        Ok(addr_str.parse()?)
    }

    /// Get request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get max body size in bytes
    pub fn max_body_size(&self) -> usize {
        self.max_body_size_mb * 1024 * 1024
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_body_size_mb() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_metadata_table() -> String {
    DEFAULT_METADATA_TABLE.to_string()
}
