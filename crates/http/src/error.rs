//! Error handling for the Shelf HTTP layer

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use shelf_db::StoreError;
use thiserror::Error;

use crate::response::{Envelope, ErrorBody};

/// Closed set of failure kinds exposed to API callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ValidationFailed,
    StorageUnavailable,
    Unknown,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::ValidationFailed => "validation_failed",
            ErrorKind::StorageUnavailable => "storage_unavailable",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// Application error types that map to envelope responses
///
/// `message` is always safe to show to callers; underlying causes are only logged.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("validation failed: {message}")]
    ValidationFailed {
        message: String,
        details: Vec<serde_json::Value>,
        cause: Option<StoreError>,
    },

    #[error("storage unavailable: {message}")]
    StorageUnavailable {
        message: String,
        #[source]
        source: StoreError,
    },

    #[error("{message}")]
    Unknown {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
            details,
            cause: None,
        }
    }

    /// Classify a store failure; `message` is the caller-facing text for the failed operation.
    pub fn from_store(err: StoreError, message: impl Into<String>) -> Self {
        let message = message.into();
        match err {
            StoreError::InvalidId(raw) => Self::ValidationFailed {
                message: format!("invalid identifier '{}'", raw),
                details: vec![json!({"field": "id", "error": "malformed identifier"})],
                cause: Some(StoreError::InvalidId(raw)),
            },
            err @ (StoreError::Rejected(_) | StoreError::Serialization(_)) => {
                Self::ValidationFailed {
                    message,
                    details: vec![json!({"error": "document rejected by the database"})],
                    cause: Some(err),
                }
            }
            err @ StoreError::Unavailable(_) => Self::StorageUnavailable {
                message,
                source: err,
            },
            err @ StoreError::Other(_) => Self::Unknown {
                message,
                source: err.into(),
            },
        }
    }

    /// Failures raised by the store are server errors, including ones that reject the input.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::ValidationFailed { cause: None, .. } => StatusCode::BAD_REQUEST,
            ApiError::ValidationFailed { cause: Some(_), .. }
            | ApiError::StorageUnavailable { .. }
            | ApiError::Unknown { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::NotFound { .. } => ErrorKind::NotFound,
            ApiError::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            ApiError::StorageUnavailable { .. } => ErrorKind::StorageUnavailable,
            ApiError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::NotFound { message }
            | ApiError::ValidationFailed { message, .. }
            | ApiError::StorageUnavailable { message, .. }
            | ApiError::Unknown { message, .. } => message,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(
            vec![json!({"field": "body", "error": rejection.body_text()})],
            "request body must be a JSON object",
        )
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(
            vec![json!({"field": "query", "error": rejection.body_text()})],
            "malformed query string",
        )
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation(
            vec![json!({"field": "path", "error": rejection.body_text()})],
            "malformed path parameter",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = self.status();

        let error = match &self {
            // A miss is a normal outcome and carries no error body.
            ApiError::NotFound { message } => {
                tracing::debug!(status_code = %status.as_u16(), %message, "resource not found");
                None
            }
            ApiError::ValidationFailed { details, cause, .. } => {
                let body = ErrorBody::new(kind.code(), details.clone());
                if cause.is_some() {
                    tracing::error!(
                        error_id = %body.trace_id,
                        error_code = %body.code,
                        status_code = %status.as_u16(),
                        detail = ?self,
                        "Store rejected request"
                    );
                } else {
                    tracing::warn!(
                        error_id = %body.trace_id,
                        error_code = %body.code,
                        status_code = %status.as_u16(),
                        detail = ?self,
                        "Request rejected"
                    );
                }
                Some(body)
            }
            ApiError::StorageUnavailable { .. } | ApiError::Unknown { .. } => {
                let body = ErrorBody::new(kind.code(), Vec::new());
                tracing::error!(
                    error_id = %body.trace_id,
                    error_code = %body.code,
                    status_code = %status.as_u16(),
                    detail = ?self,
                    "Request error"
                );
                Some(body)
            }
        };

        Envelope::failure(status, self.message(), error).into_response()
    }
}
