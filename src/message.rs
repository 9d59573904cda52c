// src/message.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::classifier::Escalation;
use crate::services::session_manager::{Message, MessageRole, Rating, Session};

#[derive(Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub user_message_id: Uuid,
    pub assistant_message_id: Uuid,
    pub reply: String,
    pub escalation: Escalation,
    pub notice: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

/// A message as the UI renders it.
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub is_emergency: bool,
    pub needs_professional_consult: bool,
    pub feedback: Option<Rating>,
}

impl MessageView {
    pub fn new(message: &Message, feedback: Option<Rating>) -> Self {
        let escalation = message.escalation();
        Self {
            id: message.id(),
            role: message.role(),
            content: message.content().to_string(),
            is_emergency: escalation.is_emergency,
            needs_professional_consult: escalation.needs_professional_consult,
            feedback,
        }
    }

    pub fn visible(session: &Session) -> Vec<Self> {
        session
            .visible_messages()
            .iter()
            .map(|m| Self::new(m, session.feedback_for(m.id())))
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub messages: Vec<MessageView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<String>,
}

#[derive(Deserialize)]
pub struct FeedbackRequest {
    pub message_id: Uuid,
    pub value: Option<Rating>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackResponse {
    pub recorded: bool,
    pub feedback_id: Option<Uuid>,
}

/// Payload of the first SSE event of a streamed turn.
#[derive(Debug, Serialize, Deserialize)]
pub struct TurnStarted {
    pub session_id: Uuid,
    pub user_message_id: Uuid,
    pub escalation: Escalation,
    pub notice: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TurnFinished {
    pub assistant_message_id: Uuid,
    pub warnings: Vec<String>,
}
