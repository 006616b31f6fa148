use crate::engine::EngineError;
use crate::orchestration::ServiceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal server error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let msg = err.to_string();
        match err {
            ServiceError::Engine(engine) => match engine {
                EngineError::NodeNotFound(_) => AppError::NotFound(msg),
                EngineError::AlreadyPlaced(_) | EngineError::DuplicatePayout(_) => {
                    AppError::Conflict(msg)
                }
                EngineError::NotADescendant { .. } | EngineError::InsufficientBalance { .. } => {
                    AppError::UnprocessableEntity(msg)
                }
                EngineError::InvalidAmount(_) => AppError::BadRequest(msg),
                EngineError::Integrity(_) => AppError::Internal(msg),
            },
            ServiceError::PayoutNotFound(_) => AppError::NotFound(msg),
            ServiceError::Conflict(_) | ServiceError::InvalidTransition { .. } => {
                AppError::Conflict(msg)
            }
            ServiceError::InvalidInput(_) => AppError::BadRequest(msg),
            ServiceError::Db(_) => AppError::Internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::UnprocessableEntity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
