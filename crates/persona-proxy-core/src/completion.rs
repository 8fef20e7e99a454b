//! Completion Gateway: one chat-completion call per question against an OpenAI-compatible API.
//!
//! The request is always two messages: `system` = resolved persona, `user` = question.
//! No retries. Upstream HTTP errors keep their status and `error` payload; everything else
//! (transport failure, timeout, unparseable success body) is an internal failure.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Payload surfaced when an upstream error response carries no usable `error` field.
pub const API_ERROR_MARKER: &str = "API error";

/// One question to send upstream, persona already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub question: String,
    pub persona: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Answer, model and usage exactly as reported by the upstream API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub answer: String,
    pub model: String,
    /// Absent when the upstream body carries no `usage`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    /// Upstream answered with a non-success status.
    #[error("upstream API returned {status}: {payload}")]
    Upstream { status: u16, payload: Value },

    /// No response from upstream: connect failure, timeout, broken body stream.
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Success status but the body is not a usable completion.
    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl CompletionError {
    /// Status to relay to the caller, only for structured upstream errors.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            CompletionError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Seam between the HTTP surface and the model provider.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest)
        -> Result<CompletionResult, CompletionError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl From<&CompletionRequest> for ChatRequest {
    fn from(req: &CompletionRequest) -> Self {
        Self {
            model: req.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: req.persona.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: req.question.clone(),
                },
            ],
            temperature: req.temperature,
            max_tokens: req.max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

impl ChatResponse {
    fn into_result(self, requested_model: &str) -> Result<CompletionResult, CompletionError> {
        let answer = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::Malformed("no choices in response".to_string()))?
            .message
            .content
            .ok_or_else(|| CompletionError::Malformed("first choice has no content".to_string()))?;

        Ok(CompletionResult {
            answer,
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
            usage: self.usage,
        })
    }
}

/// Extracts the `error` field of an upstream error body. Missing, null, empty or
/// non-JSON bodies collapse to [`API_ERROR_MARKER`].
pub fn upstream_error_payload(body: &str) -> Value {
    let marker = || Value::String(API_ERROR_MARKER.to_string());
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return marker();
    };
    match parsed.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => marker(),
        Some(Value::String(s)) if s.is_empty() => marker(),
        Some(v) => v.clone(),
    }
}

/// reqwest-backed client for the chat-completions endpoint.
pub struct HttpCompletionClient {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl HttpCompletionClient {
    /// `endpoint` is the full chat-completions URL, e.g. `https://api.deepseek.com/v1/chat/completions`.
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Bound every upstream call. Without this the transport defaults apply.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, reqwest::Error> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResult, CompletionError> {
        let body = ChatRequest::from(&request);

        let res = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;

        if !status.is_success() {
            let payload = upstream_error_payload(&text);
            tracing::warn!(status = status.as_u16(), %payload, "[API] Upstream rejected request");
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                payload,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| CompletionError::Malformed(e.to_string()))?;
        let result = parsed.into_result(&request.model)?;

        if let Some(usage) = &result.usage {
            tracing::info!(%usage, "[API] Token usage");
        }
        tracing::info!(model = %result.model, "[API] Completion received");

        Ok(result)
    }
}
