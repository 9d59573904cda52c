// src/services/session_manager.rs
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::prompts::Prompts;
use crate::services::classifier::Escalation;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded turn. Only a [`Session`] creates messages, and nothing
/// changes them afterwards.
#[derive(Clone, Debug)]
pub struct Message {
    id: Uuid,
    role: MessageRole,
    content: String,
    escalation: Escalation,
    created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>, escalation: Escalation) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            escalation,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn escalation(&self) -> Escalation {
        self.escalation
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Thumbs up or down. Travels as `1` / `-1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Rating {
    Up,
    Down,
}

impl Rating {
    pub fn label(&self) -> &'static str {
        match self {
            Rating::Up => "up",
            Rating::Down => "down",
        }
    }
}

impl TryFrom<i8> for Rating {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Up),
            -1 => Ok(Rating::Down),
            other => Err(format!("feedback value must be 1 or -1, got {}", other)),
        }
    }
}

impl From<Rating> for i8 {
    fn from(rating: Rating) -> Self {
        match rating {
            Rating::Up => 1,
            Rating::Down => -1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub feedback_id: Uuid,
    pub message_id: Uuid,
    pub session_id: Uuid,
    pub value: Rating,
    pub recorded_at: DateTime<Utc>,
}

/// The message log of one conversation.
///
/// A session always starts with the system persona, which is sent to the
/// model but never shown or classified.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    messages: Vec<Message>,
    feedback: HashMap<Uuid, Rating>,
}

impl Session {
    pub fn start(prompts: &Prompts) -> Self {
        let mut messages = vec![Message::new(
            MessageRole::System,
            prompts.persona.as_str(),
            Escalation::NONE,
        )];
        if let Some(intro) = &prompts.introduction {
            messages.push(Message::new(
                MessageRole::Assistant,
                intro.as_str(),
                Escalation::NONE,
            ));
        }

        Self {
            id: Uuid::new_v4(),
            messages,
            feedback: HashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Full history, system prompt first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Everything the user gets to see.
    pub fn visible_messages(&self) -> &[Message] {
        &self.messages[1..]
    }

    pub fn message(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn append_user_message(&mut self, text: impl Into<String>, escalation: Escalation) -> Uuid {
        self.push(Message::new(MessageRole::User, text, escalation))
    }

    /// `text` is the complete reply, never a single streamed fragment.
    pub fn append_assistant_message(
        &mut self,
        text: impl Into<String>,
        escalation: Escalation,
    ) -> Uuid {
        self.push(Message::new(MessageRole::Assistant, text, escalation))
    }

    fn push(&mut self, message: Message) -> Uuid {
        let id = message.id;
        self.messages.push(message);
        id
    }

    pub fn feedback_for(&self, message_id: Uuid) -> Option<Rating> {
        self.feedback.get(&message_id).copied()
    }

    /// Returns a record only when `value` differs from the last recorded one.
    ///
    /// `message_id` must name an assistant message of this session.
    pub fn record_feedback_if_changed(
        &mut self,
        message_id: Uuid,
        value: Option<Rating>,
    ) -> Option<FeedbackRecord> {
        assert!(
            self.message(message_id)
                .is_some_and(|m| m.role == MessageRole::Assistant),
            "feedback recorded for unknown or non-assistant message {}",
            message_id
        );

        let value = value?;
        if self.feedback.get(&message_id) == Some(&value) {
            return None;
        }
        self.feedback.insert(message_id, value);

        Some(FeedbackRecord {
            feedback_id: Uuid::new_v4(),
            message_id,
            session_id: self.id,
            value,
            recorded_at: Utc::now(),
        })
    }
}

pub type SessionHandle = Arc<Mutex<Session>>;

struct Entry {
    session: SessionHandle,
    last_active: Instant,
}

/// Registry of live sessions, keyed by session id.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<RwLock<HashMap<Uuid, Entry>>>,
    prompts: Arc<Prompts>,
    ttl: Duration,
}

impl Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionManager {
    pub fn new(ttl: Duration, prompts: Prompts) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            prompts: Arc::new(prompts),
            ttl,
        }
    }

    // Start a fresh session and register it.
    pub async fn create_session(&self) -> (Uuid, SessionHandle) {
        let session = Session::start(&self.prompts);
        let id = session.id();
        let handle = Arc::new(Mutex::new(session));

        let mut guard = self.inner.write().await;
        guard.insert(
            id,
            Entry {
                session: handle.clone(),
                last_active: Instant::now(),
            },
        );
        (id, handle)
    }

    // Look a session up and mark it active.
    pub async fn get(&self, session_id: Uuid) -> Option<SessionHandle> {
        let mut guard = self.inner.write().await;
        guard.get_mut(&session_id).map(|entry| {
            entry.last_active = Instant::now();
            entry.session.clone()
        })
    }

    /// Remove a session by id
    pub async fn remove_session(&self, session_id: Uuid) -> bool {
        let mut guard = self.inner.write().await;
        guard.remove(&session_id).is_some()
    }

    /// Remove sessions idle longer than ttl. Returns number removed.
    pub async fn purge_expired(&self) -> usize {
        let mut guard = self.inner.write().await;
        let now = Instant::now();
        let before = guard.len();
        guard.retain(|_, e| now.duration_since(e.last_active) < self.ttl);
        before - guard.len()
    }

    /// Number of sessions
    pub async fn len(&self) -> usize {
        let guard = self.inner.read().await;
        guard.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// List session ids
    pub async fn list_session_ids(&self) -> Vec<Uuid> {
        let guard = self.inner.read().await;
        guard.keys().copied().collect()
    }
}
