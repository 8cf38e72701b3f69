//! Uniform JSON envelope returned by every resource endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Machine-readable failure detail attached to unsuccessful envelopes.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub details: Vec<serde_json::Value>,
    pub trace_id: String,
    pub timestamp: String,
}

impl ErrorBody {
    /// New body with a fresh trace id and the current UTC timestamp.
    pub fn new(code: impl Into<String>, details: Vec<serde_json::Value>) -> Self {
        Self {
            code: code.into(),
            details,
            trace_id: Uuid::new_v4().to_string(),
            timestamp: OffsetDateTime::now_utc().to_string(),
        }
    }
}

/// `{ success, message, data, error? }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    #[serde(skip)]
    status: StatusCode,
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: message.into(),
            data: Some(data),
            error: None,
        }
    }

    /// Successful outcome that carries no payload (`data: null`).
    pub fn ok_empty(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: message.into(),
            data: None,
            error: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl Envelope<()> {
    pub fn failure(status: StatusCode, message: impl Into<String>, error: Option<ErrorBody>) -> Self {
        Self {
            status,
            success: false,
            message: message.into(),
            data: None,
            error,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
