use std::convert::Infallible;

use axum::{
    Json,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use uuid::Uuid;

use crate::{
    error::AppError,
    message::{ChatRequest, ChatResponse, TurnFinished, TurnStarted},
    prompts::ASSISTANT_UNAVAILABLE_NOTICE,
    routes::sessions::find_session,
    services::{
        completion::{CompletionError, collect_reply},
        conversation::{begin_turn, finish_turn},
        metrics_manager::MetricsData,
        session_manager::{Session, SessionHandle},
    },
    state::SharedState,
};

type EventSender = mpsc::Sender<Result<Event, Infallible>>;

fn validate_message(message: &str) -> Result<(), AppError> {
    if message.trim().is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }
    Ok(())
}

async fn resolve_session(
    state: &SharedState,
    session_id: Option<Uuid>,
) -> Result<(Uuid, SessionHandle), AppError> {
    match session_id {
        Some(id) => Ok((id, find_session(state, id).await?)),
        None => Ok(state.sessions.create_session().await),
    }
}

async fn request_reply(state: &SharedState, session: &Session) -> Result<String, CompletionError> {
    let stream = state.completion.stream_completion(session.messages()).await?;
    collect_reply(stream).await
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    validate_message(&payload.message)?;
    let (session_id, handle) = resolve_session(&state, payload.session_id).await?;
    let mut session = handle.lock().await;

    let pending = begin_turn(&state, &mut session, &payload.message).await;

    let reply = match request_reply(&state, &session).await {
        Ok(reply) => reply,
        Err(source) => {
            warn!(%session_id, error = %source, "completion failed");
            return Err(AppError::TurnFailed { session_id, source });
        }
    };

    let outcome = finish_turn(&state, &mut session, pending, reply).await;
    let warnings = outcome.warnings();

    Ok(Json(ChatResponse {
        session_id,
        user_message_id: outcome.user_message_id,
        assistant_message_id: outcome.assistant_message_id,
        notice: outcome.escalation.notice().map(str::to_string),
        escalation: outcome.escalation,
        reply: outcome.reply,
        warnings,
    }))
}

/// Same turn as [`chat_handler`], answered as server-sent events:
/// `turn`, then one `delta` per fragment, then `done` or `error`.
pub async fn chat_stream_handler(
    State(state): State<SharedState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    validate_message(&payload.message)?;
    let (session_id, handle) = resolve_session(&state, payload.session_id).await?;

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(stream_turn(state, handle, session_id, payload.message, tx));

    Ok(Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default()))
}

async fn stream_turn(
    state: SharedState,
    handle: SessionHandle,
    session_id: Uuid,
    text: String,
    tx: EventSender,
) {
    let mut session = handle.lock_owned().await;
    let pending = begin_turn(&state, &mut session, &text).await;

    // The escalation notice goes out before the model is asked anything.
    send_json(
        &tx,
        "turn",
        &TurnStarted {
            session_id,
            user_message_id: pending.user_message_id,
            escalation: pending.escalation,
            notice: pending.escalation.notice().map(str::to_string),
        },
    )
    .await;

    let mut stream = match state.completion.stream_completion(session.messages()).await {
        Ok(stream) => stream,
        Err(e) => return send_failure(&tx, session_id, e).await,
    };

    // Keep reading after a client disconnect so the reply is still recorded.
    let mut reply = String::new();
    while let Some(fragment) = stream.next().await {
        match fragment {
            Ok(fragment) => {
                reply.push_str(&fragment);
                send_json(&tx, "delta", &json!({ "text": fragment })).await;
            }
            Err(e) => return send_failure(&tx, session_id, e).await,
        }
    }

    let outcome = finish_turn(&state, &mut session, pending, reply).await;
    send_json(
        &tx,
        "done",
        &TurnFinished {
            assistant_message_id: outcome.assistant_message_id,
            warnings: outcome.warnings(),
        },
    )
    .await;
}

async fn send_failure(tx: &EventSender, session_id: Uuid, error: CompletionError) {
    warn!(%session_id, error = %error, "completion failed");
    send_json(
        tx,
        "error",
        &json!({
            "error": error.to_string(),
            "notice": ASSISTANT_UNAVAILABLE_NOTICE,
        }),
    )
    .await;
}

async fn send_json<T: Serialize>(tx: &EventSender, name: &str, payload: &T) {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => {
            // A closed channel only means the client went away.
            let _ = tx.send(Ok(event)).await;
        }
        Err(e) => warn!(sse_event = name, error = %e, "failed to encode event"),
    }
}

// Admin: escalation and feedback counters
pub async fn get_metrics_handler(State(state): State<SharedState>) -> Json<MetricsData> {
    Json(state.metrics.get_metrics().await)
}
