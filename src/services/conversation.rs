// src/services/conversation.rs
use tracing::{info, warn};
use uuid::Uuid;

use crate::services::classifier::Escalation;
use crate::services::persistence::{MessageRecord, PersistenceError};
use crate::services::session_manager::Session;
use crate::state::AppState;

/// A user message that has been classified, appended and logged, waiting for
/// the model's reply.
#[derive(Debug)]
pub struct PendingTurn {
    pub escalation: Escalation,
    pub user_message_id: Uuid,
    pub persistence_failures: Vec<PersistenceError>,
}

#[derive(Debug)]
pub struct TurnOutcome {
    pub escalation: Escalation,
    pub user_message_id: Uuid,
    pub assistant_message_id: Uuid,
    pub reply: String,
    pub persistence_failures: Vec<PersistenceError>,
}

impl TurnOutcome {
    pub fn warnings(&self) -> Vec<String> {
        self.persistence_failures.iter().map(|e| e.to_string()).collect()
    }
}

pub async fn begin_turn(state: &AppState, session: &mut Session, text: &str) -> PendingTurn {
    let escalation = state.classifier.classify(text);
    state.metrics.increment_escalation(&escalation).await;

    let user_message_id = session.append_user_message(text, escalation);
    info!(
        session_id = %session.id(),
        message_id = %user_message_id,
        is_emergency = escalation.is_emergency,
        needs_professional_consult = escalation.needs_professional_consult,
        "user message recorded"
    );

    let mut persistence_failures = Vec::new();
    if let Err(e) = log_message(state, session, user_message_id).await {
        persistence_failures.push(e);
    }

    PendingTurn {
        escalation,
        user_message_id,
        persistence_failures,
    }
}

/// Record the completed reply. The assistant message carries the same flags
/// as the user message it answers.
pub async fn finish_turn(
    state: &AppState,
    session: &mut Session,
    pending: PendingTurn,
    reply: String,
) -> TurnOutcome {
    let PendingTurn {
        escalation,
        user_message_id,
        mut persistence_failures,
    } = pending;

    let assistant_message_id = session.append_assistant_message(reply.as_str(), escalation);
    info!(
        session_id = %session.id(),
        message_id = %assistant_message_id,
        reply_len = reply.len(),
        "assistant reply recorded"
    );

    if let Err(e) = log_message(state, session, assistant_message_id).await {
        persistence_failures.push(e);
    }

    TurnOutcome {
        escalation,
        user_message_id,
        assistant_message_id,
        reply,
        persistence_failures,
    }
}

async fn log_message(
    state: &AppState,
    session: &Session,
    message_id: Uuid,
) -> Result<(), PersistenceError> {
    let Some(message) = session.message(message_id) else {
        return Ok(());
    };
    let record = MessageRecord::new(session.id(), message);

    state.sink.insert_message(&record).await.inspect_err(|e| {
        warn!(
            session_id = %session.id(),
            message_id = %message_id,
            error = %e,
            "failed to persist message"
        );
    })
}
