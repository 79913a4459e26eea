//! `LlmClient` over the Anthropic Messages API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::llm::client::{LlmClient, LlmError};
use crate::llm::types::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Used when a 429 carries no usable `retry-after`.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// Model for requests that don't name one
    pub model: String,
    pub max_tokens: u32,
    /// Whole-request timeout, enforced by the HTTP client
    pub timeout: Duration,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(60),
            base_url: MESSAGES_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: [UserTurn<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct UserTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesReply {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl From<MessagesReply> for CompletionResponse {
    fn from(reply: MessagesReply) -> Self {
        let content = reply
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");
        let stop_reason = match reply.stop_reason.as_deref() {
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            _ => StopReason::EndTurn,
        };
        Self {
            content,
            stop_reason,
            usage: reply.usage,
        }
    }
}

pub struct AnthropicClient {
    http: Client,
    api_key: String,
    config: AnthropicConfig,
}

impl AnthropicClient {
    /// Reads the API key from `config.api_key_env`.
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| LlmError::MissingApiKey {
            env_var: config.api_key_env.clone(),
        })?;
        Self::with_api_key(api_key, config)
    }

    pub fn with_api_key(api_key: impl Into<String>, config: AnthropicConfig) -> Result<Self, LlmError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            config,
        })
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> MessagesBody<'a> {
        MessagesBody {
            model: request.model.as_deref().unwrap_or(&self.config.model),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            system: &request.system,
            messages: [UserTurn {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
        }
    }

    async fn error_for(response: Response, model: &str) -> LlmError {
        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            return LlmError::RateLimited { retry_after };
        }
        if status == StatusCode::NOT_FOUND {
            return LlmError::UnknownModel(model.to_string());
        }
        let message = response.text().await.unwrap_or_default();
        LlmError::ApiError {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = self.body(&request);
        log::debug!(
            "POST {} model={} max_tokens={} temperature={:?}",
            self.config.base_url,
            body.model,
            body.max_tokens,
            body.temperature
        );

        let response = self
            .http
            .post(&self.config.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout)
                } else {
                    LlmError::Network(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::error_for(response, body.model).await);
        }

        let bytes = response.bytes().await?;
        let reply: MessagesReply = serde_json::from_slice(&bytes)
            .map_err(|e| LlmError::InvalidResponse(format!("unexpected Messages API reply: {}", e)))?;
        let completion = CompletionResponse::from(reply);
        log::debug!(
            "Reply: {} input / {} output tokens, stop {:?}",
            completion.usage.input_tokens,
            completion.usage.output_tokens,
            completion.stop_reason
        );
        Ok(completion)
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("model", &self.config.model)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}
