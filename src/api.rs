//! HTTP handlers
//!
//! Every endpoint reads the boot-time readiness snapshot. Health endpoints
//! report degradation inside the body but never as a failure status, so a
//! platform probe does not restart a service that is merely waiting on a
//! large download.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{ChatMessage, Role};
use crate::state::AppState;

/// Fixed sampling temperature for chat completions
const CHAT_TEMPERATURE: f32 = 0.2;
/// Token budget used when the request does not specify one
const DEFAULT_MAX_TOKENS: i64 = 300;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub model_loaded: bool,
    pub model_path: String,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub model_loaded: bool,
    pub model_path: String,
    pub error: Option<String>,
    pub endpoints: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// System prompt, empty when not provided
    #[serde(default)]
    pub system: String,
    /// Opaque context object forwarded to the model as the user message
    #[serde(default = "empty_object")]
    pub context: Value,
    /// Token budget; defaulted and clamped to at least one
    pub max_tokens: Option<i64>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub content: String,
    pub timestamp: String,
    pub model: String,
    pub model_path: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
}

/// Liveness probe; answers 200 unconditionally.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        model_loaded: state.model_loaded,
        model_path: state.model_path.clone(),
        error: state.error.clone(),
    })
}

/// Service metadata plus the readiness snapshot. Always 200; degradation is
/// visible in the body.
pub async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        status: if state.model_loaded { "ok" } else { "degraded" },
        model_loaded: state.model_loaded,
        model_path: state.model_path.clone(),
        error: state.error.clone(),
        endpoints: vec!["GET /", "GET /health", "POST /chat"],
    })
}

/// Chat completion. 503 while degraded, 500 when the engine call fails.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let Some(engine) = state.engine.clone() else {
        let detail = state
            .error
            .clone()
            .unwrap_or_else(|| "model not loaded".to_string());
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: format!("Model unavailable: {}", detail),
                kind: None,
            }),
        ));
    };

    let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS).max(1) as u32;
    let context_json =
        serde_json::to_string(&request.context).unwrap_or_else(|_| "{}".to_string());

    let messages = vec![
        ChatMessage::new(Role::System, request.system),
        ChatMessage::new(Role::User, context_json),
    ];

    // One blocking worker per request for the full inference call
    let outcome =
        tokio::task::spawn_blocking(move || engine.chat(&messages, CHAT_TEMPERATURE, max_tokens))
            .await;

    match outcome {
        Ok(Ok(content)) => Ok(Json(ChatResponse {
            content,
            timestamp: Utc::now().to_rfc3339(),
            model: state.model_name.clone(),
            model_path: state.model_path.clone(),
        })),
        Ok(Err(e)) => {
            tracing::error!("Inference failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                    kind: Some(e.kind()),
                }),
            ))
        }
        Err(e) => {
            tracing::error!("Inference task panicked: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Inference task failed: {}", e),
                    kind: Some("panic"),
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_defaults() {
        let request: ChatRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.system, "");
        assert_eq!(request.context, empty_object());
        assert!(request.max_tokens.is_none());
    }

    #[test]
    fn test_chat_request_context_is_opaque() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"context":{"mensaje":"hola","n":3}}"#).unwrap();
        assert_eq!(request.context["mensaje"], "hola");
        assert_eq!(request.context["n"], 3);
    }

    #[test]
    fn test_error_response_omits_absent_kind() {
        let body = serde_json::to_value(ErrorResponse {
            error: "Model unavailable: boom".to_string(),
            kind: None,
        })
        .unwrap();
        assert!(body.get("kind").is_none());
    }
}
