//! Client for the downstream analysis service.
//!
//! The service runs the actual correlation; we hand it two file paths and the
//! column names to line up and relay whatever JSON it answers with. One POST,
//! bounded by [`ANALYSIS_TIMEOUT`], never retried.

#[cfg(any(test, feature = "test-util"))]
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AnalysisError, error_chain};

/// Upper bound on a single dispatch, connect time included.
pub const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(30);

/// Route of the correlation job, relative to the service base url.
pub const GEOSPATIAL_CORRELATION_PATH: &str = "/analyze/geospatial-correlation";

/// Body of a geospatial correlation job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisJobPayload {
    pub file1_path: String,
    pub file2_path: String,
    pub column1: String,
    pub column2: String,
    pub file1_lat_col: String,
    pub file1_lon_col: String,
    pub file2_lat_col: String,
    pub file2_lon_col: String,
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Submit a correlation job and return the service's JSON verbatim.
    async fn geospatial_correlation(
        &self,
        payload: &AnalysisJobPayload,
    ) -> Result<Value, AnalysisError>;
}

/// HTTP implementation of [`AnalysisService`].
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisClient {
    pub fn new(base_url: &str) -> Result<Self, AnalysisError> {
        Self::with_timeout(base_url, ANALYSIS_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, AnalysisError> {
        validate_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Request(error_chain(&e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, GEOSPATIAL_CORRELATION_PATH)
    }
}

/// The base url must be absolute http(s) with a host.
pub fn validate_base_url(base_url: &str) -> Result<(), AnalysisError> {
    let invalid = |reason: String| AnalysisError::InvalidUrl {
        url: base_url.to_string(),
        reason,
    };
    let url = reqwest::Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(())
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn geospatial_correlation(
        &self,
        payload: &AnalysisJobPayload,
    ) -> Result<Value, AnalysisError> {
        let endpoint = self.endpoint();
        tracing::info!(%endpoint, file1 = %payload.file1_path, file2 = %payload.file2_path, "dispatching correlation job");

        let response = self
            .client
            .post(&endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    AnalysisError::Request(error_chain(&e))
                } else {
                    AnalysisError::Unavailable(error_chain(&e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<unreadable body: {}>", error_chain(&e)));
            tracing::warn!(%endpoint, status = status.as_u16(), "analysis service returned an error");
            return Err(AnalysisError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // A body cut short is a transport failure, not a bad reply.
        let body = response
            .bytes()
            .await
            .map_err(|e| AnalysisError::Unavailable(error_chain(&e)))?;
        serde_json::from_slice::<Value>(&body).map_err(|e| AnalysisError::Decode(e.to_string()))
    }
}

/// Canned [`AnalysisService`] that records every payload it receives.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug)]
pub struct StubAnalysis {
    reply: Result<Value, StubFailure>,
    received: Mutex<Vec<AnalysisJobPayload>>,
}

#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone)]
enum StubFailure {
    Unavailable(String),
    Status(u16, String),
}

#[cfg(any(test, feature = "test-util"))]
impl StubAnalysis {
    pub fn replying(reply: Value) -> Self {
        Self {
            reply: Ok(reply),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self {
            reply: Err(StubFailure::Unavailable(detail.into())),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_with(status: u16, body: impl Into<String>) -> Self {
        Self {
            reply: Err(StubFailure::Status(status, body.into())),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<AnalysisJobPayload> {
        self.received
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.received.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl AnalysisService for StubAnalysis {
    async fn geospatial_correlation(
        &self,
        payload: &AnalysisJobPayload,
    ) -> Result<Value, AnalysisError> {
        if let Ok(mut received) = self.received.lock() {
            received.push(payload.clone());
        }
        match &self.reply {
            Ok(value) => Ok(value.clone()),
            Err(StubFailure::Unavailable(detail)) => Err(AnalysisError::Unavailable(detail.clone())),
            Err(StubFailure::Status(status, body)) => Err(AnalysisError::Status {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}
