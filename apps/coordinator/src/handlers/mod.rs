pub mod agents;
pub mod clients;
pub mod control;
pub mod files;
pub mod hashlists;
pub mod jobs;
pub mod settings;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use krakenhashes_db::DbError;
use serde_json::json;

/// Uniform error response for every handler in this crate: a status code
/// plus a machine-readable message, matching the error kind taxonomy the
/// persistence layer already distinguishes.
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(error: DbError) -> Self {
        let status = match &error {
            DbError::HashlistNotFound
            | DbError::HashNotFound
            | DbError::JobExecutionNotFound
            | DbError::TaskNotFound
            | DbError::AgentNotFound
            | DbError::FileNotFound
            | DbError::ClientNotFound
            | DbError::HashTypeNotFound => StatusCode::NOT_FOUND,
            DbError::DuplicateName(_) | DbError::ChunkClaimConflict => StatusCode::CONFLICT,
            DbError::VoucherInvalid => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, error.to_string())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(error: std::io::Error) -> Self {
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
    }
}
