//! Route handlers: question endpoint, health check, development root.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    Json,
};
use persona_proxy_core::{
    topics, CompletionRequest, CompletionResult, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;

/// Body of `POST /api/ask`. Only `question` is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default, rename = "conversationId", alias = "conversation_id")]
    pub conversation_id: Option<String>,
    /// Full persona (cached) or short hint (this request only).
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Value>,
}

impl From<CompletionResult> for AskResponse {
    fn from(r: CompletionResult) -> Self {
        Self {
            answer: r.answer,
            model: r.model,
            usage: r.usage,
        }
    }
}

/// Empty bodies and non-JSON content types read as a request with no fields.
/// Only a JSON body that fails to parse is rejected.
fn parse_ask_body(headers: &HeaderMap, bytes: &[u8]) -> Result<AskRequest, ApiError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false);

    if !is_json || bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(AskRequest::default());
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

/// POST /api/ask: validate, resolve persona, one upstream completion.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<Json<AskResponse>, ApiError> {
    let body = parse_ask_body(&headers, &payload)?;

    tracing::info!(question = ?body.question, "[API] Question received");

    let question = body
        .question
        .filter(|q| !q.is_empty())
        .ok_or(ApiError::QuestionRequired)?;
    let conversation_id = body.conversation_id.filter(|id| !id.is_empty());

    state.bus.publish(
        topics::ASK_RECEIVED,
        &json!({ "conversationId": conversation_id, "question": question }),
    );

    let resolution = state
        .resolver
        .resolve(conversation_id.as_deref(), body.persona.as_deref());

    if let Some((id, _)) = &resolution.cache_write {
        state
            .bus
            .publish(topics::PERSONA_CACHED, &json!({ "conversationId": id }));
    }

    tracing::info!(
        source = resolution.source.as_str(),
        persona = %resolution.persona,
        "[API] Persona resolved"
    );

    let request = CompletionRequest {
        question,
        persona: resolution.persona,
        model: body
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| state.config.default_model.clone()),
        temperature: body.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        max_tokens: body.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    };

    // Spawned so a client disconnect does not cancel the upstream call.
    let client = Arc::clone(&state.completion);
    let outcome = tokio::spawn(async move { client.complete(request).await })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    match outcome {
        Ok(result) => {
            tracing::info!("[API] Completion delivered");
            state.bus.publish(
                topics::ASK_ANSWERED,
                &json!({ "conversationId": conversation_id, "model": result.model, "usage": result.usage }),
            );
            Ok(Json(AskResponse::from(result)))
        }
        Err(e) => {
            state.bus.publish(
                topics::ASK_FAILED,
                &json!({ "conversationId": conversation_id, "status": e.upstream_status() }),
            );
            Err(ApiError::from(e))
        }
    }
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// GET / in development: the frontend is served by its own dev server.
pub async fn dev_root() -> &'static str {
    "Backend server is running. Start the frontend application to use the interface."
}
