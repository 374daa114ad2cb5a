//! Server error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use oblivids_gdfa::GdfaError;
use oblivids_ot::OtError;

/// Server result type
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session expired: {0}")]
    SessionExpired(String),

    #[error("Max sessions reached")]
    SessionLimit,

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Garbled DFA not loaded")]
    GdfaNotLoaded,

    #[error("Garbled DFA error: {0}")]
    Gdfa(#[from] GdfaError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ServerError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            ServerError::SessionExpired(_) => (StatusCode::GONE, "SESSION_EXPIRED"),
            ServerError::SessionLimit => (StatusCode::TOO_MANY_REQUESTS, "SESSION_LIMIT"),
            ServerError::InvalidFrame(_) => (StatusCode::BAD_REQUEST, "INVALID_FRAME"),
            ServerError::GdfaNotLoaded => (StatusCode::SERVICE_UNAVAILABLE, "GDFA_NOT_LOADED"),
            ServerError::Gdfa(_) | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<OtError> for ServerError {
    fn from(err: OtError) -> Self {
        ServerError::InvalidFrame(err.to_string())
    }
}

impl From<oblivids_protocol::ProtocolError> for ServerError {
    fn from(err: oblivids_protocol::ProtocolError) -> Self {
        ServerError::InvalidFrame(err.to_string())
    }
}
