use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    message::{FeedbackRequest, FeedbackResponse, MessageView, SessionResponse},
    prompts::DISCLAIMER,
    services::session_manager::{MessageRole, SessionHandle},
    state::SharedState,
};

pub(crate) async fn find_session(state: &SharedState, session_id: Uuid) -> Result<SessionHandle, AppError> {
    state
        .sessions
        .get(session_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("session {} not found", session_id)))
}

pub async fn create_session_handler(State(state): State<SharedState>) -> Json<SessionResponse> {
    let (session_id, handle) = state.sessions.create_session().await;
    info!(%session_id, "session started");

    let session = handle.lock().await;
    Json(SessionResponse {
        session_id,
        messages: MessageView::visible(&session),
        disclaimer: Some(DISCLAIMER.to_string()),
    })
}

pub async fn get_messages_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let handle = find_session(&state, session_id).await?;
    let session = handle.lock().await;

    Ok(Json(SessionResponse {
        session_id,
        messages: MessageView::visible(&session),
        disclaimer: None,
    }))
}

pub async fn end_session_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove_session(session_id).await {
        info!(%session_id, "session ended");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("session {} not found", session_id)))
    }
}

pub async fn feedback_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let handle = find_session(&state, session_id).await?;
    let mut session = handle.lock().await;

    match session.message(payload.message_id).map(|m| m.role()) {
        Some(MessageRole::Assistant) => {}
        Some(_) => {
            return Err(AppError::BadRequest(
                "feedback is only accepted on assistant messages".to_string(),
            ));
        }
        None => {
            return Err(AppError::NotFound(format!(
                "message {} not found",
                payload.message_id
            )));
        }
    }

    let Some(record) = session.record_feedback_if_changed(payload.message_id, payload.value) else {
        return Ok(Json(FeedbackResponse {
            recorded: false,
            feedback_id: None,
        }));
    };
    state.metrics.increment_feedback(record.value).await;

    // Still holding the session lock, so upserts for one message stay ordered.
    if let Err(e) = state.sink.upsert_feedback(&record).await {
        warn!(%session_id, message_id = %record.message_id, error = %e, "failed to persist feedback");
        return Err(e.into());
    }
    info!(%session_id, message_id = %record.message_id, value = record.value.label(), "feedback recorded");

    Ok(Json(FeedbackResponse {
        recorded: true,
        feedback_id: Some(record.feedback_id),
    }))
}
