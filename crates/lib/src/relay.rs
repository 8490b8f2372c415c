//! Relay HTTP server: /api/chat, health probe, and static app assets.
//!
//! The relay is stateless per request: it validates the posted history,
//! prepends the system instruction, makes one provider call, and returns the
//! completion text or an opaque error. The full history is resent by the
//! client on every call.

use crate::config::{self, Config};
use crate::conversation::WireMessage;
use crate::provider::AzureChatClient;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use include_dir::{include_dir, Dir};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

/// Prebuilt app assets served on all non-API routes (index.html fallback).
static APP_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

/// Persona and task instruction prepended to every provider request. Never
/// part of the user-facing transcript.
const SYSTEM_PROMPT: &str = "You are a helpful presentation creation assistant. Your role is to help users create professional presentations. \n\nWhen a user asks for help, ask clarifying questions to understand:\n- The type of presentation (sales, training, project update, etc.)\n- The target audience\n- Key topics or points to cover\n- Desired tone (formal, casual, engaging)\n- Any specific requirements\n\nBe concise and helpful. Use bullet points when listing options or suggestions.";

/// 400 body when the posted payload has no messages array.
const ERR_MESSAGES_REQUIRED: &str = "Messages array is required";

/// 500 body for any provider failure; the underlying error is only logged.
const ERR_PROVIDER_FAILURE: &str = "Failed to get response from AI";

/// Shared state for the relay (config and the reusable provider client).
#[derive(Clone)]
pub struct RelayState {
    pub config: Arc<Config>,
    pub provider: AzureChatClient,
}

/// Build the router for a given state. Exposed so tests can serve the relay
/// on a port of their choosing.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_http))
        .route("/healthz", get(health_http))
        .fallback(get(app_asset))
        .with_state(state)
}

/// Run the relay server until a shutdown signal. Refuses to start without a
/// configured provider endpoint and API key.
pub async fn run_relay(mut config: Config, config_path: &Path) -> Result<()> {
    let Some(endpoint) = config::resolve_endpoint(&config) else {
        anyhow::bail!(
            "provider endpoint not configured (set provider.endpoint in {} or AZURE_OPENAI_ENDPOINT)",
            config_path.display()
        );
    };
    let Some(api_key) = config::resolve_api_key(&config) else {
        anyhow::bail!(
            "provider API key not configured (set provider.apiKey in {} or AZURE_OPENAI_API_KEY)",
            config_path.display()
        );
    };
    let provider = AzureChatClient::new(
        endpoint,
        api_key,
        config::resolve_api_version(&config),
        config::resolve_deployment(&config),
    );
    log::info!("relay using deployment {}", provider.deployment());

    let port = config::resolve_port(&config);
    config.server.port = port;
    let bind = config.server.bind.trim().to_string();
    let state = RelayState {
        config: Arc::new(config),
        provider,
    };

    let bind_addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("relay listening on {}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server exited")?;
    log::info!("relay stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// POST /api/chat — body `{"messages": [{role, content}, ...]}`. The system
/// instruction is prepended here; provider failures come back as an opaque
/// 500 with the underlying error logged only.
async fn chat_http(
    State(state): State<RelayState>,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    let Some(messages) = parse_messages(&body) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": ERR_MESSAGES_REQUIRED })),
        );
    };

    let mut wire = Vec::with_capacity(messages.len() + 1);
    wire.push(WireMessage::system(SYSTEM_PROMPT));
    wire.extend(messages);

    match state.provider.complete(wire).await {
        Ok(content) => (StatusCode::OK, Json(json!({ "content": content }))),
        Err(e) => {
            log::error!("provider call failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": ERR_PROVIDER_FAILURE })),
            )
        }
    }
}

/// The posted history, when the body is JSON with a messages array of
/// {role, content} objects. None => 400, provider untouched.
fn parse_messages(body: &[u8]) -> Option<Vec<WireMessage>> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let items = value.get("messages")?.as_array()?;
    items
        .iter()
        .map(|item| serde_json::from_value(item.clone()).ok())
        .collect()
}

/// GET /healthz returns a simple health JSON (for probes).
async fn health_http(State(state): State<RelayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.server.port,
    }))
}

/// All non-API routes serve the embedded app: the asset at the request path
/// when one exists, index.html otherwise (single-page entry).
async fn app_asset(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');
    let file = if path.is_empty() {
        None
    } else {
        APP_ASSETS.get_file(path)
    };
    let Some(file) = file.or_else(|| APP_ASSETS.get_file("index.html")) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mime = mime_guess::from_path(file.path()).first_or_octet_stream();
    (
        [(header::CONTENT_TYPE, mime.as_ref().to_string())],
        file.contents(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_messages_accepts_role_content_pairs() {
        let body = br#"{"messages":[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]}"#;
        let messages = parse_messages(body).expect("valid payload");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[1].content, "hello");
    }

    #[test]
    fn parse_messages_rejects_non_array_payloads() {
        assert!(parse_messages(br#"{"messages":"not-an-array"}"#).is_none());
        assert!(parse_messages(br#"{}"#).is_none());
        assert!(parse_messages(b"not json").is_none());
        assert!(parse_messages(br#"{"messages":[{"role":"user"}]}"#).is_none());
    }
}
