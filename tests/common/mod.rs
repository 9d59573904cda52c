#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use milkwise_backend::routes::create_router;
use milkwise_backend::services::classifier::EscalationClassifier;
use milkwise_backend::services::completion::{CompletionError, CompletionService, CompletionStream};
use milkwise_backend::services::persistence::{MessageRecord, PersistenceError, PersistenceSink};
use milkwise_backend::services::session_manager::{FeedbackRecord, Message, MessageRole};
use milkwise_backend::state::{AppState, SharedState};
use serde_json::Value;
use tower::util::ServiceExt;

/// Replies with a fixed list of fragments. `fail` rejects the request up
/// front; `break_after_fragments` errors once the fragments are sent.
#[derive(Default)]
pub struct ScriptedCompletion {
    pub fragments: Vec<&'static str>,
    pub fail: bool,
    pub break_after_fragments: bool,
    pub seen: Mutex<Vec<Vec<MessageRole>>>,
}

impl ScriptedCompletion {
    pub fn replying(fragments: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            fragments,
            ..Default::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn breaking_after(fragments: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            fragments,
            break_after_fragments: true,
            ..Default::default()
        })
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn stream_completion(&self, history: &[Message]) -> Result<CompletionStream, CompletionError> {
        self.seen
            .lock()
            .unwrap()
            .push(history.iter().map(|m| m.role()).collect());
        if self.fail {
            return Err(CompletionError::RateLimited);
        }
        let mut items: Vec<Result<String, CompletionError>> =
            self.fragments.iter().map(|f| Ok(f.to_string())).collect();
        if self.break_after_fragments {
            items.push(Err(CompletionError::Incomplete));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub messages: Mutex<Vec<MessageRecord>>,
    pub feedback: Mutex<Vec<FeedbackRecord>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    fn check(&self) -> Result<(), PersistenceError> {
        if self.fail {
            return Err(PersistenceError::Rejected {
                status: 503,
                message: "store offline".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for RecordingSink {
    async fn insert_message(&self, record: &MessageRecord) -> Result<(), PersistenceError> {
        self.check()?;
        self.messages.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn upsert_feedback(&self, record: &FeedbackRecord) -> Result<(), PersistenceError> {
        self.check()?;
        self.feedback.lock().unwrap().push(record.clone());
        Ok(())
    }
}

pub fn test_state(completion: Arc<ScriptedCompletion>, sink: Arc<RecordingSink>) -> SharedState {
    Arc::new(
        AppState::new(
            Duration::from_secs(60),
            EscalationClassifier::default(),
            completion,
            sink,
        )
        .with_admin_key("test-admin"),
    )
}

pub fn app(state: SharedState) -> Router {
    create_router(state)
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

pub async fn post_stream(app: &Router, body: Value) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/chat/stream")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, String::from_utf8(bytes).unwrap())
}

/// Parse an SSE body into `(event, data)` pairs, skipping comment lines.
pub fn sse_events(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if line.starts_with(':') {
                    continue;
                }
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = Some(serde_json::from_str(v.trim()).unwrap());
                }
            }
            Some((name?, data.unwrap_or(Value::Null)))
        })
        .collect()
}
