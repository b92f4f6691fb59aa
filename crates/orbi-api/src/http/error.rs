//! Application error type mapping to HTTP status codes.
//!
//! Every error renders as `{"error": ..., "details": ...}`. Internal errors
//! are logged with their cause and answered with a generic body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use orbi_infra::crypto::init_data::InitDataError;
use orbi_types::error::RepositoryError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Requested resource does not exist.
    NotFound { error: String, details: String },
    /// Missing or invalid identity.
    Unauthorized(String),
    /// Identity verified but unusable.
    BadRequest(String),
    /// Anything else; the message is logged, never returned.
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<InitDataError> for AppError {
    fn from(e: InitDataError) -> Self {
        match e {
            InitDataError::MissingHash | InitDataError::InvalidSignature => {
                AppError::Unauthorized("Invalid init data".to_string())
            }
            InitDataError::MissingUser | InitDataError::InvalidUser(_) => {
                AppError::BadRequest(format!("Could not identify user: {e}"))
            }
            InitDataError::InvalidKey(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            AppError::NotFound { error, details } => (StatusCode::NOT_FOUND, error, details),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string(), msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request".to_string(), msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                    "The request could not be completed".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": error, "details": details }))).into_response()
    }
}
