use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::workflow::WorkflowError;

/// HTTP-boundary error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Workflow(e) => match e {
                WorkflowError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                WorkflowError::InvalidTrigger { .. } => {
                    (StatusCode::CONFLICT, "INVALID_TRIGGER", e.to_string())
                }
                WorkflowError::Persistence(msg) => {
                    tracing::error!("Persistence error: {msg}");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "PERSISTENCE_ERROR",
                        "A storage error occurred".to_string(),
                    )
                }
                WorkflowError::Generation(msg) => {
                    tracing::error!("Generation error: {msg}");
                    (
                        StatusCode::BAD_GATEWAY,
                        "GENERATION_ERROR",
                        "An AI processing error occurred".to_string(),
                    )
                }
                WorkflowError::Rendering(msg) => {
                    tracing::error!("Rendering error: {msg}");
                    (
                        StatusCode::BAD_GATEWAY,
                        "RENDERING_ERROR",
                        "Document rendering failed".to_string(),
                    )
                }
            },
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
