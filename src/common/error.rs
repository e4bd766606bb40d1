use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::common::response::ApiError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("action '{consumer}' requires an input file but '{producer}' does not produce one")]
    IncapableChaining { consumer: String, producer: String },

    #[error("remote sync failed: {0}")]
    RemoteSyncFailure(String),

    #[error("handler failed: {0}")]
    HandlerFailure(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("malformed stored JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("action queue is closed")]
    QueueClosed,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UnknownAction(_)
            | AppError::InvalidPayload(_)
            | AppError::IncapableChaining { .. } => StatusCode::BAD_REQUEST,
            AppError::RemoteSyncFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::HandlerFailure(_)
            | AppError::Database(_)
            | AppError::Serialization(_)
            | AppError::QueueClosed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidPayload(errors.to_string())
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            error!(error = %err, "Request failed");
        }
        ApiError(err.to_string(), status)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
