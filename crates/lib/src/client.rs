//! HTTP client for the relay's /api/chat endpoint, used by the CLI and
//! desktop front ends.

use crate::conversation::WireMessage;
use serde::{Deserialize, Serialize};

/// Client for a running relay server.
#[derive(Clone)]
pub struct RelayClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayClientError {
    #[error("relay request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("relay error: {0}")]
    Api(String),
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: Option<String>,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Relay URL for a server config ("http://{bind}:{port}").
    pub fn for_server(bind: &str, port: u16) -> Self {
        Self::new(format!("http://{}:{}", bind, port))
    }

    /// POST /api/chat with the full history; returns the completion text.
    pub async fn send(&self, messages: Vec<WireMessage>) -> Result<String, RelayClientError> {
        let url = format!("{}/api/chat", self.base_url);
        let res = self
            .client
            .post(&url)
            .json(&ChatRequest { messages })
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let error = res
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error)
                .unwrap_or_else(|| "Failed to get response from AI".to_string());
            return Err(RelayClientError::Api(format!("{} {}", status, error)));
        }
        let data: ChatResponse = res.json().await?;
        Ok(data.content)
    }

    /// GET /healthz — true when the relay answers with a success status.
    pub async fn health(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(res) => res.status().is_success(),
            Err(_) => false,
        }
    }
}
