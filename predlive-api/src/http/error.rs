// HTTP error handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

/// Error response JSON structure
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

/// Convert predlive_core errors to HTTP errors
impl From<predlive_core::Error> for AppError {
    fn from(err: predlive_core::Error) -> Self {
        use predlive_core::Error;

        match err {
            Error::InvalidInput(msg) => AppError::bad_request(msg),
            Error::Serialization(e) => {
                tracing::error!("Serialization error: {}", e);
                AppError::internal_server_error("Internal server error")
            }
            Error::Configuration(msg) => {
                tracing::error!("Configuration error: {}", msg);
                AppError::internal_server_error("Internal server error")
            }
        }
    }
}

/// Convert hub errors to HTTP errors
impl From<predlive_hub::Error> for AppError {
    fn from(err: predlive_hub::Error) -> Self {
        match err {
            predlive_hub::Error::Serialization(e) => {
                tracing::error!("Failed to encode broadcast frame: {}", e);
                AppError::internal_server_error("Internal server error")
            }
        }
    }
}

/// Malformed or non-JSON request bodies are client errors
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}
