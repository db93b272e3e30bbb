//! LLM Client implementations
//!
//! Provides the Mistral/OpenAI-compatible chat completions client and the
//! Ollama client. Transport failures, rate limiting and server errors are
//! retried with jittered exponential backoff.
//!
//! Author: hephaex@gmail.com

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use lexeval_core::{LexError, LlmClient, LlmConfig, LlmProvider, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

// ============================================================================
// Retry policy
// ============================================================================

/// Failure of a single request attempt
#[derive(Debug, thiserror::Error)]
enum AttemptError {
    /// Worth another attempt (transport, 429, 5xx)
    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Fatal(String),
}

impl AttemptError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() || e.is_request() {
            Self::Transient(format!("Request failed: {e}"))
        } else {
            Self::Fatal(format!("Request failed: {e}"))
        }
    }

    fn from_status(status: StatusCode, body: String) -> Self {
        let message = format!("HTTP {status}: {body}");
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::Transient(message)
        } else {
            Self::Fatal(message)
        }
    }
}

/// Run `attempt` until it succeeds, fails fatally, or retries run out
///
/// Delays grow 500ms, 1s, 2s... (capped at 10s), each scaled by jitter.
async fn with_retries<T, A, Fut>(max_retries: usize, attempt: A) -> Result<T>
where
    A: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, AttemptError>>,
{
    let strategy = ExponentialBackoff::from_millis(2)
        .factor(250)
        .max_delay(Duration::from_secs(10))
        .map(jitter)
        .take(max_retries);

    RetryIf::spawn(strategy, attempt, |e: &AttemptError| {
        if e.is_transient() {
            warn!(error = %e, "transient LLM failure");
        }
        e.is_transient()
    })
    .await
    .map_err(|e| LexError::LlmError(e.to_string()))
}

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LexError::LlmError(format!("Failed to build HTTP client: {e}")))
}

// ============================================================================
// Chat Completions Client (Mistral, OpenAI)
// ============================================================================

/// Client for `/chat/completions` endpoints (Mistral, OpenAI and compatibles)
pub struct ChatCompletionsClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
    temperature: f32,
    max_retries: usize,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsClient {
    /// Create a client with default timeout and retry settings
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            max_tokens: None,
            temperature: 0.0,
            max_retries: 3,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config.api_key.as_ref().ok_or_else(|| {
            LexError::LlmError(format!(
                "API key required for provider {} (set LLM_API_KEY or MISTRAL_API_KEY)",
                config.provider
            ))
        })?;

        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            api_key: api_key.clone(),
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn attempt(&self, request: &ChatRequest<'_>) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(AttemptError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AttemptError::from_status(status, error_text));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Fatal(format!("Failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AttemptError::Fatal("No response generated".to_string()))
    }
}

#[async_trait]
impl LlmClient for ChatCompletionsClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "chat completion request");
        with_retries(self.max_retries, || self.attempt(&request)).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_retries: usize,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            temperature: 0.0,
            max_retries: 3,
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }

    async fn attempt(&self, request: &OllamaRequest<'_>) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(AttemptError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AttemptError::from_status(status, error_text));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Fatal(format!("Failed to parse Ollama response: {e}")))?;

        Ok(result.response)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        with_retries(self.max_retries, || self.attempt(&request)).await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    match config.provider {
        LlmProvider::Mistral | LlmProvider::OpenAI => {
            Ok(Box::new(ChatCompletionsClient::from_config(config)?))
        }
        LlmProvider::Ollama => Ok(Box::new(OllamaClient::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================
