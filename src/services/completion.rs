use std::{collections::VecDeque, pin::Pin, time::Duration};

use async_trait::async_trait;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::services::session_manager::Message;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("network error: {0}")]
    Network(String),

    #[error("completion request timed out")]
    Timeout,

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("rate limited by completion service")]
    RateLimited,

    #[error("completion stream ended before [DONE]")]
    Incomplete,

    #[error("api error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("malformed stream chunk: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CompletionError::Timeout
        } else {
            CompletionError::Network(e.to_string())
        }
    }
}

/// Finite, forward-only sequence of reply fragments.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, CompletionError>> + Send>>;

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Start a streamed reply for `history`, which begins with the system prompt.
    async fn stream_completion(&self, history: &[Message]) -> Result<CompletionStream, CompletionError>;
}

/// Concatenate every fragment into the final reply.
pub async fn collect_reply(mut stream: CompletionStream) -> Result<String, CompletionError> {
    let mut reply = String::new();
    while let Some(fragment) = stream.next().await {
        reply.push_str(&fragment?);
    }
    Ok(reply)
}

#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Longest silence tolerated between reads of the streamed body.
    pub timeout: Duration,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiCompletion {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiCompletion {
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        // A total deadline would cut long streamed replies short.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(config.timeout)
            .build()
            .map_err(|e| CompletionError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn request_body(&self, history: &[Message]) -> serde_json::Value {
        let messages: Vec<_> = history
            .iter()
            .map(|m| json!({ "role": m.role().as_str(), "content": m.content() }))
            .collect();

        json!({
            "model": self.config.model,
            "messages": messages,
            "stream": true,
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn stream_completion(&self, history: &[Message]) -> Result<CompletionStream, CompletionError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(history))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(status, message));
        }

        let bytes = response.bytes_stream().map_err(CompletionError::from);
        Ok(fragments(bytes))
    }
}

fn status_error(status: StatusCode, message: String) -> CompletionError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited,
        _ => CompletionError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

struct FragmentState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    ready: VecDeque<Result<String, CompletionError>>,
    finished: bool,
}

/// Turn a raw SSE byte stream into reply fragments. The stream fails unless
/// it is closed by `[DONE]`; errors are yielded after any earlier fragments.
fn fragments<S, B>(bytes: S) -> CompletionStream
where
    S: Stream<Item = Result<B, CompletionError>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = FragmentState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::default(),
        ready: VecDeque::new(),
        finished: false,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for event in state.decoder.push(chunk.as_ref()) {
                        match event {
                            SseData::Done => {
                                state.finished = true;
                                break;
                            }
                            SseData::Json(data) => match parse_delta(&data) {
                                Ok(Some(text)) => state.ready.push_back(Ok(text)),
                                Ok(None) => {}
                                Err(e) => {
                                    state.ready.push_back(Err(e));
                                    state.finished = true;
                                    break;
                                }
                            },
                        }
                    }
                }
                Some(Err(e)) => {
                    state.ready.push_back(Err(e));
                    state.finished = true;
                }
                None => {
                    state.ready.push_back(Err(CompletionError::Incomplete));
                    state.finished = true;
                }
            }
        }
    });

    Box::pin(stream)
}

#[derive(Debug, PartialEq)]
enum SseData {
    Json(String),
    Done,
}

/// Splits SSE bytes into complete `data:` payloads. Bytes are buffered until a
/// newline arrives so multi-byte characters split across chunks stay intact.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<SseData> {
        self.buffer.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);

            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if data == "[DONE]" {
                    out.push(SseData::Done);
                } else if !data.is_empty() {
                    out.push(SseData::Json(data.to_string()));
                }
            }
        }
        out
    }
}

#[derive(Deserialize)]
struct ChunkBody {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Default, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

fn parse_delta(data: &str) -> Result<Option<String>, CompletionError> {
    let body: ChunkBody = serde_json::from_str(data)?;
    Ok(body
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .filter(|text| !text.is_empty()))
}
