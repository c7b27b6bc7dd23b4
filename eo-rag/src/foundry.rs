//! Azure AI Foundry chat-completions client.
//!
//! This module is only available when the `foundry` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{RagError, Result};
use crate::llm::{ChatMessage, LlmClient, build_messages};

const PROVIDER: &str = "AzureAIFoundry";

/// The default hosted model.
pub const DEFAULT_MODEL: &str = "Meta-Llama-3.1-8B-Instruct";

/// Settings for a [`FoundryLlmClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct FoundryConfig {
    /// Full chat-completions URL of the deployment.
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl FoundryConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 800,
            timeout: Duration::from_secs(60),
        }
    }

    /// Read `AZURE_AI_FOUNDRY_ENDPOINT`, `AZURE_AI_FOUNDRY_API_KEY` and the
    /// optional `AZURE_AI_FOUNDRY_MODEL_NAME`.
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var("AZURE_AI_FOUNDRY_ENDPOINT").map_err(|_| {
            RagError::ConfigError("AZURE_AI_FOUNDRY_ENDPOINT environment variable not set".into())
        })?;
        let api_key = std::env::var("AZURE_AI_FOUNDRY_API_KEY").map_err(|_| {
            RagError::ConfigError("AZURE_AI_FOUNDRY_API_KEY environment variable not set".into())
        })?;
        let mut config = Self::new(endpoint, api_key);
        if let Ok(model) = std::env::var("AZURE_AI_FOUNDRY_MODEL_NAME") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// An [`LlmClient`] that answers through an Azure AI Foundry deployment.
///
/// # Example
///
/// ```rust,ignore
/// use eo_rag::foundry::{FoundryConfig, FoundryLlmClient};
///
/// let llm = FoundryLlmClient::new(FoundryConfig::from_env()?)?;
/// let answer = llm.generate("What does EO 14110 require?", &context, &[]).await?;
/// ```
pub struct FoundryLlmClient {
    client: reqwest::Client,
    config: FoundryConfig,
}

impl FoundryLlmClient {
    pub fn new(config: FoundryConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() || config.api_key.is_empty() {
            return Err(RagError::ConfigError(
                "Azure AI Foundry endpoint and API key are required".into(),
            ));
        }
        let client = reqwest::Client::builder().timeout(config.timeout).build().map_err(|e| {
            RagError::LlmError { provider: PROVIDER.into(), message: format!("failed to build HTTP client: {e}") }
        })?;
        info!(endpoint = %config.endpoint, model = %config.model, "initialized Azure AI Foundry client");
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &FoundryConfig {
        &self.config
    }

    /// Map a transport failure, keeping deadline expiry distinct wherever it
    /// happens (connect, send or body read).
    fn transport_error(&self, e: reqwest::Error, what: &str) -> RagError {
        let timeout_secs = self.config.timeout.as_secs();
        if e.is_timeout() {
            error!(provider = PROVIDER, timeout_secs, stage = what, "request timed out");
            RagError::LlmTimeout { provider: PROVIDER.into(), timeout_secs }
        } else {
            error!(provider = PROVIDER, error = %e, stage = what, "request failed");
            RagError::LlmError { provider: PROVIDER.into(), message: format!("{what}: {e}") }
        }
    }
}

// ── Chat-completions request/response types ────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── LlmClient implementation ───────────────────────────────────────

#[async_trait]
impl LlmClient for FoundryLlmClient {
    async fn generate(
        &self,
        query: &str,
        context: &[String],
        chat_history: &[ChatMessage],
    ) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: build_messages(query, context, chat_history),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };
        debug!(
            provider = PROVIDER,
            model = %self.config.model,
            messages = body.messages.len(),
            "sending chat completion"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e, "request failed"))?;

        let status = response.status();
        info!(provider = PROVIDER, %status, "API response received");
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) if e.is_timeout() => return Err(self.transport_error(e, "reading error body")),
                Err(_) => String::new(),
            };
            error!(provider = PROVIDER, %status, body = %body, "API error");
            return Err(RagError::LlmError {
                provider: PROVIDER.into(),
                message: format!("API returned {status}: {body}"),
            });
        }

        // The client deadline also covers the body, so read it before parsing.
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e, "failed to read response"))?;
        let parsed: ChatResponse = serde_json::from_slice(&bytes).map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::LlmError { provider: PROVIDER.into(), message: format!("failed to parse response: {e}") }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RagError::LlmError {
                provider: PROVIDER.into(),
                message: "response contained no answer".into(),
            })
    }

    fn name(&self) -> &str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_hosted_deployment() {
        let config = FoundryConfig::new("https://example.inference.ai.azure.com/chat/completions", "key");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.max_tokens, 800);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = FoundryLlmClient::new(FoundryConfig::new("", "key")).err().unwrap();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn request_body_carries_grounded_transcript() {
        let body = ChatRequest {
            model: DEFAULT_MODEL,
            messages: build_messages("q", &["ctx".into()], &[]),
            temperature: 0.7,
            max_tokens: 800,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "q");
        assert_eq!(json["max_tokens"], 800);
    }

    #[test]
    fn answer_is_read_from_first_choice() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"EO 14110 ..."}}]}"#)
                .unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("EO 14110 ..."));
    }

    /// Accept one connection, send headers and part of the body, then stall.
    async fn stalling_server() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let head = "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 200\r\n\r\n{\"choices\":";
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });
        format!("http://{addr}/chat/completions")
    }

    #[tokio::test]
    async fn body_stalling_past_deadline_is_a_timeout() {
        let endpoint = stalling_server().await;
        let llm = FoundryLlmClient::new(
            FoundryConfig::new(endpoint, "key").with_timeout(Duration::from_secs(1)),
        )
        .unwrap();

        let err = llm.generate("q", &["ctx".into()], &[]).await.unwrap_err();
        assert!(
            matches!(err, RagError::LlmTimeout { timeout_secs: 1, .. }),
            "unexpected error: {err:?}"
        );
        assert!(err.is_upstream());
    }
}
