use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, header};
use serde::Serialize;
use thiserror::Error;
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::Mutex,
};
use uuid::Uuid;

use crate::services::session_manager::{FeedbackRecord, Message, MessageRole};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("store request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("store rejected write: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("chat log write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid store header: {0}")]
    Header(#[from] header::InvalidHeaderValue),
}

/// Row written for every user and assistant turn.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessageRecord {
    pub message_id: Uuid,
    pub session_id: Uuid,
    pub actor_type: MessageRole,
    pub content: String,
    pub is_emergency: bool,
    pub needs_professional_consult: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(session_id: Uuid, message: &Message) -> Self {
        let escalation = message.escalation();
        Self {
            message_id: message.id(),
            session_id,
            actor_type: message.role(),
            content: message.content().to_string(),
            is_emergency: escalation.is_emergency,
            needs_professional_consult: escalation.needs_professional_consult,
            created_at: message.created_at(),
        }
    }
}

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Append-only.
    async fn insert_message(&self, record: &MessageRecord) -> Result<(), PersistenceError>;

    /// Replace by (session_id, message_id).
    async fn upsert_feedback(&self, record: &FeedbackRecord) -> Result<(), PersistenceError>;
}

/// Writes to Supabase tables through the PostgREST API.
pub struct SupabaseSink {
    client: Client,
    rest_url: String,
}

impl SupabaseSink {
    pub fn new(url: &str, key: &str) -> Result<Self, PersistenceError> {
        let mut headers = header::HeaderMap::new();
        headers.insert("apikey", header::HeaderValue::from_str(key)?);
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", key))?,
        );

        let client = Client::builder().default_headers(headers).build()?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
        })
    }

    async fn post<T: Serialize + Sync>(
        &self,
        path: &str,
        prefer: &str,
        body: &T,
    ) -> Result<(), PersistenceError> {
        let response = self
            .client
            .post(format!("{}/{}", self.rest_url, path))
            .header("Prefer", prefer)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(PersistenceError::Rejected {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl PersistenceSink for SupabaseSink {
    async fn insert_message(&self, record: &MessageRecord) -> Result<(), PersistenceError> {
        self.post("messages", "return=minimal", record).await
    }

    async fn upsert_feedback(&self, record: &FeedbackRecord) -> Result<(), PersistenceError> {
        self.post(
            "feedback?on_conflict=session_id,message_id",
            "resolution=merge-duplicates,return=minimal",
            record,
        )
        .await
    }
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "lowercase")]
enum LogLine<'a> {
    Message(&'a MessageRecord),
    Feedback(&'a FeedbackRecord),
}

/// Local chat log, one JSON object per line.
///
/// The file is append-only, so for feedback the last line per
/// (session_id, message_id) is the current value.
pub struct JsonLinesSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, line: LogLine<'_>) -> Result<(), PersistenceError> {
        let mut json = serde_json::to_vec(&line)?;
        json.push(b'\n');

        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&json).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for JsonLinesSink {
    async fn insert_message(&self, record: &MessageRecord) -> Result<(), PersistenceError> {
        self.append(LogLine::Message(record)).await
    }

    async fn upsert_feedback(&self, record: &FeedbackRecord) -> Result<(), PersistenceError> {
        self.append(LogLine::Feedback(record)).await
    }
}
