use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use sagar::OrchestrationError;
use serde::{Deserialize, Serialize};

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Request body or query string does not match the expected shape.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,

    /// Request refused before its content was looked at (too large, wrong
    /// content type). Keeps the status axum chose.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Orchestration(err) => match err {
                OrchestrationError::NotFound(_) => StatusCode::NOT_FOUND,
                OrchestrationError::DownstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                OrchestrationError::Configuration(_) | OrchestrationError::Unexpected(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Rejected { status, .. } => *status,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::Validation(_) => "VALIDATION_ERROR",
            ServerError::Orchestration(err) => match err {
                OrchestrationError::Configuration(_) => "CONFIG_ERROR",
                OrchestrationError::NotFound(_) => "NOT_FOUND",
                OrchestrationError::DownstreamUnavailable(_) => "SERVICE_UNAVAILABLE",
                OrchestrationError::Unexpected(_) => "INTERNAL_ERROR",
            },
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::NotFound => "NOT_FOUND",
            ServerError::Rejected { status, .. } => match *status {
                StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
                StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
                _ => "BAD_REQUEST",
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                ServerError::Validation(rejection.body_text())
            }
            other => ServerError::Rejected {
                status: other.status(),
                message: other.body_text(),
            },
        }
    }
}

impl From<QueryRejection> for ServerError {
    fn from(rejection: QueryRejection) -> Self {
        ServerError::Validation(rejection.body_text())
    }
}
