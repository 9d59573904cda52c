// src/error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::prompts::ASSISTANT_UNAVAILABLE_NOTICE;
use crate::services::completion::CompletionError;
use crate::services::persistence::PersistenceError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("completion failed: {source}")]
    TurnFailed {
        session_id: Uuid,
        #[source]
        source: CompletionError,
    },

    #[error("persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, Json(json!({ "error": message }))),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))),
            AppError::TurnFailed { session_id, .. } => (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": message,
                    "session_id": session_id,
                    "notice": ASSISTANT_UNAVAILABLE_NOTICE,
                })),
            ),
            AppError::Persistence(_) => (StatusCode::BAD_GATEWAY, Json(json!({ "error": message }))),
        }
        .into_response()
    }
}
