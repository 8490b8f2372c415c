//! Azure OpenAI chat-completion client.
//!
//! One non-streaming completion per call against
//! `{endpoint}/openai/deployments/{deployment}/chat/completions`. The client
//! is constructed once at startup and shared by the relay handlers.

use crate::conversation::WireMessage;
use serde::{Deserialize, Serialize};

/// Maximum completion length, fixed for every request.
pub const MAX_COMPLETION_TOKENS: u32 = 1000;

/// Sampling temperature, fixed for every request.
pub const COMPLETION_TEMPERATURE: f32 = 0.7;

/// Returned in place of the completion when the provider sends no content.
pub const NO_RESPONSE_FALLBACK: &str = "No response generated";

/// Client for an Azure OpenAI chat deployment.
#[derive(Clone)]
pub struct AzureChatClient {
    endpoint: String,
    api_key: String,
    api_version: String,
    deployment: String,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider api error: {0}")]
    Api(String),
}

impl AzureChatClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: api_version.into(),
            deployment: deployment.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }

    /// POST chat/completions — single completion with the fixed generation
    /// parameters. Returns the first choice's text, or NO_RESPONSE_FALLBACK
    /// when the response carries no content.
    pub async fn complete(&self, messages: Vec<WireMessage>) -> Result<String, ProviderError> {
        let url = self.completions_url();
        let body = ChatCompletionRequest {
            messages,
            max_tokens: MAX_COMPLETION_TOKENS,
            temperature: COMPLETION_TEMPERATURE,
        };
        let res = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Api(format!("{} {}", status, body)));
        }
        let data: ChatCompletionResponse = res.json().await?;
        Ok(first_choice_content(data).unwrap_or_else(|| NO_RESPONSE_FALLBACK.to_string()))
    }
}

/// Non-empty content of the first choice, if the response has one.
fn first_choice_content(data: ChatCompletionResponse) -> Option<String> {
    data.choices
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.is_empty())
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<CompletionChoice>>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completions_url_has_deployment_and_api_version() {
        let client = AzureChatClient::new(
            "https://r.openai.azure.com/",
            "key",
            "2024-08-01-preview",
            "gpt-4",
        );
        assert_eq!(
            client.completions_url(),
            "https://r.openai.azure.com/openai/deployments/gpt-4/chat/completions?api-version=2024-08-01-preview"
        );
    }

    #[test]
    fn first_choice_content_reads_the_completion_text() {
        let data: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Hello!"}},{"message":{"content":"ignored"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice_content(data).as_deref(), Some("Hello!"));
    }

    #[test]
    fn missing_or_empty_choices_yield_none() {
        for body in [r#"{}"#, r#"{"choices":[]}"#, r#"{"choices":[{"message":{"content":""}}]}"#] {
            let data: ChatCompletionResponse = serde_json::from_str(body).unwrap();
            assert_eq!(first_choice_content(data), None, "body: {}", body);
        }
    }
}
