//! API error types with structured JSON responses.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::PipelineError;
use crate::store::StoreError;
use crate::workflow::WorkflowError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Request body rejected: {0}")]
    InvalidBody(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Store timed out after {0:?}")]
    Timeout(Duration),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            ApiError::InvalidBody(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_BODY",
                detail.clone(),
            ),
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "ILLEGAL_TRANSITION", detail.clone()),
            ApiError::StoreUnavailable(detail) => {
                tracing::warn!(detail, "Store unavailable");
                (
                    StatusCode::BAD_GATEWAY,
                    "STORE_UNAVAILABLE",
                    "The record store could not be reached".to_string(),
                )
            }
            ApiError::Timeout(after) => (
                StatusCode::GATEWAY_TIMEOUT,
                "STORE_TIMEOUT",
                format!("The record store did not answer within {after:?}"),
            ),
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout(after) => ApiError::Timeout(after),
            StoreError::InvalidId(_) => ApiError::BadRequest("Invalid prescription id".into()),
            other => ApiError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Store(e)
            | PipelineError::Workflow(WorkflowError::StatusRead(e) | WorkflowError::StatusWrite(e)) => e.into(),
            PipelineError::Workflow(e @ WorkflowError::IllegalTransition { .. }) => {
                ApiError::Conflict(e.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::UNPROCESSABLE_ENTITY => ApiError::InvalidBody(rejection.body_text()),
            _ => ApiError::BadRequest(rejection.body_text()),
        }
    }
}
