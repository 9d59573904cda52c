// src/routes/mod.rs
pub mod chat;
pub mod sessions;

use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
};
use chat::{chat_handler, chat_stream_handler, get_metrics_handler};
use sessions::{create_session_handler, end_session_handler, feedback_handler, get_messages_handler};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

pub fn create_router(state: SharedState) -> Router {
    let admin_routes = Router::new()
        .route("/metrics", get(get_metrics_handler))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route("/sessions", post(create_session_handler))
        .route("/sessions/{session_id}", delete(end_session_handler))
        .route("/sessions/{session_id}/messages", get(get_messages_handler))
        .route("/sessions/{session_id}/feedback", post(feedback_handler))
        .nest("/admin", admin_routes)
        .route("/health", get(|| async { "OK" }))
        .fallback_service(ServeDir::new("public"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn auth_middleware(
    State(state): State<SharedState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Without a configured key the admin routes stay closed.
    let Some(expected) = state.admin_key.as_deref() else {
        return Err(AppError::Unauthorized);
    };
    match req.headers().get("x-admin-key") {
        Some(val) if val.as_bytes() == expected.as_bytes() => Ok(next.run(req).await),
        _ => Err(AppError::Unauthorized),
    }
}
