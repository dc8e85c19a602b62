use thiserror::Error;

/// Failures talking to the metadata store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store client could not be built from the given settings.
    #[error("invalid metadata store config: {0}")]
    InvalidConfig(String),
    /// The request never produced a response (connect, DNS, timeout).
    #[error("metadata store unreachable: {0}")]
    Transport(String),
    /// The store answered with a non-success status.
    #[error("metadata store returned {status}: {body}")]
    Status { status: u16, body: String },
    /// The store answered but the rows could not be decoded.
    #[error("malformed metadata store response: {0}")]
    Decode(String),
}

/// Failures talking to the downstream analysis service.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid analysis service url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Transport-level failure: the service could not be reached or timed out.
    #[error("{0}")]
    Unavailable(String),
    /// The service answered with a non-2xx status.
    #[error("analysis service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed analysis service response: {0}")]
    Decode(String),
    #[error("failed to build analysis request: {0}")]
    Request(String),
}

/// Outcome taxonomy of the orchestration operations. Each variant maps to a
/// single HTTP status at the server boundary.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// A required setting is missing.
    #[error("{0}")]
    Configuration(String),
    /// Fewer records than requested could be resolved.
    #[error("{0}")]
    NotFound(String),
    /// The analysis service could not be reached.
    #[error("Could not connect to the analysis service: {0}")]
    DownstreamUnavailable(String),
    /// Store failures, downstream error statuses, anything else.
    #[error("An error occurred: {0}")]
    Unexpected(String),
}

impl From<StoreError> for OrchestrationError {
    fn from(err: StoreError) -> Self {
        OrchestrationError::Unexpected(err.to_string())
    }
}

impl From<AnalysisError> for OrchestrationError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::Unavailable(detail) => OrchestrationError::DownstreamUnavailable(detail),
            other => OrchestrationError::Unexpected(other.to_string()),
        }
    }
}

/// Render an error together with its `source()` chain, e.g.
/// `error sending request: client error (Connect): Connection refused`.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let inner_text = inner.to_string();
        if !text.contains(&inner_text) {
            text.push_str(": ");
            text.push_str(&inner_text);
        }
        source = inner.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] std::io::Error);

    #[test]
    fn store_errors_become_unexpected() {
        let err: OrchestrationError = StoreError::Status {
            status: 401,
            body: "Invalid API key".into(),
        }
        .into();
        assert!(matches!(err, OrchestrationError::Unexpected(_)));
        assert_eq!(
            err.to_string(),
            "An error occurred: metadata store returned 401: Invalid API key"
        );
    }

    #[test]
    fn unreachable_analysis_becomes_downstream_unavailable() {
        let err: OrchestrationError =
            AnalysisError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, OrchestrationError::DownstreamUnavailable(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn analysis_status_is_unexpected_not_unavailable() {
        let err: OrchestrationError = AnalysisError::Status {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert!(matches!(err, OrchestrationError::Unexpected(_)));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn chain_includes_sources() {
        let err = Outer(std::io::Error::other("Connection refused"));
        assert_eq!(error_chain(&err), "outer: Connection refused");
    }
}
