//! OpenAI-compatible chat-completion client.
//!
//! Works against OpenAI or any endpoint that follows the chat completions
//! request/response format. One request per call: no streaming, no retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ChatProvider;
use crate::config::LlmConfig;
use crate::credentials::CredentialResolver;
use crate::error::LlmError;
use crate::types::ChatMessage;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completion client with a per-call credential lookup.
pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    credentials: CredentialResolver,
}

impl std::fmt::Debug for OpenAiChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChatClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl OpenAiChatClient {
    /// Create a client from configuration and a key resolver.
    ///
    /// The key is not read here; every `complete` call resolves it again.
    pub fn new(config: &LlmConfig, credentials: CredentialResolver) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Client {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
            credentials,
        })
    }

    /// Full URL of the completions endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Pull the first choice's text out of a response body.
    fn parse_response(body: &str) -> Result<String, LlmError> {
        let parsed: ChatCompletionResponse =
            serde_json::from_str(body).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON: {e}"),
            })?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No choices in response".to_string(),
            })?;
        choice.message.content.ok_or_else(|| LlmError::ResponseParse {
            message: "First choice has no text content".to_string(),
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            LlmError::Transport {
                message: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_key = self
            .credentials
            .resolve()
            .ok_or_else(|| LlmError::MissingKey {
                env_var: self.credentials.env_var().to_string(),
            })?;

        let url = self.endpoint();
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(url = %url, model = %self.model, messages = messages.len(), "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if status != reqwest::StatusCode::OK {
            debug!(status = status.as_u16(), "Chat completion returned non-200 status");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: response_body,
            });
        }

        Self::parse_response(&response_body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
