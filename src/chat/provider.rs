//! Language-model backends.
//!
//! Every backend answers one prompt through [`ChatBackend::submit`]. The
//! service never sees vendor SDK types: OpenAI, Gemini and Anthropic go
//! through `edgequake-llm`'s [`ProviderFactory`], DeepSeek through its
//! OpenAI-compatible REST endpoint.

use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// A concrete backend that can be priced and dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenAiGpt4oMini,
    GeminiFlash,
    DeepSeekChat,
    ClaudeHaiku,
    /// The fixed backend used for document summaries.
    Summary,
}

impl Provider {
    /// The label users select the provider by.
    pub fn label(&self) -> &'static str {
        match self {
            Provider::OpenAiGpt4oMini => "gpt-4o mini",
            Provider::GeminiFlash => "gemini flash free",
            Provider::DeepSeekChat => "deepseek chat",
            Provider::ClaudeHaiku => "claude-3.5 haiku",
            Provider::Summary => "summary",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A user's provider selection, parsed from free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderChoice {
    OpenAiGpt4oMini,
    GeminiFlash,
    DeepSeekChat,
    ClaudeHaiku,
    /// Anything else, kept in its normalised (trimmed, lower-cased) form.
    Unknown(String),
}

impl ProviderChoice {
    /// Parse a selection. Matching is trimmed and case-insensitive.
    pub fn parse(raw: &str) -> Self {
        let normalised = raw.trim().to_lowercase();
        match normalised.as_str() {
            "gpt-4o mini" => ProviderChoice::OpenAiGpt4oMini,
            "gemini flash free" => ProviderChoice::GeminiFlash,
            "deepseek chat" => ProviderChoice::DeepSeekChat,
            "claude-3.5 haiku" => ProviderChoice::ClaudeHaiku,
            _ => ProviderChoice::Unknown(normalised),
        }
    }

    pub fn provider(&self) -> Option<Provider> {
        match self {
            ProviderChoice::OpenAiGpt4oMini => Some(Provider::OpenAiGpt4oMini),
            ProviderChoice::GeminiFlash => Some(Provider::GeminiFlash),
            ProviderChoice::DeepSeekChat => Some(Provider::DeepSeekChat),
            ProviderChoice::ClaudeHaiku => Some(Provider::ClaudeHaiku),
            ProviderChoice::Unknown(_) => None,
        }
    }
}

/// Token counts reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Usage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    pub fn is_zero(&self) -> bool {
        self.total() == 0
    }
}

/// One backend response.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// `None` when the backend does not report usage.
    pub usage: Option<Usage>,
}

/// Failure of a single backend call.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// No backend registered, or its credentials are missing.
    #[error("Provider '{provider}' is not configured: {hint}")]
    NotConfigured { provider: String, hint: String },

    /// The provider answered with an error.
    #[error("{provider} API error: {detail}")]
    Api { provider: String, detail: String },

    /// The request never got an answer (connect, timeout, bad body).
    #[error("{provider} request failed: {detail}")]
    Http { provider: String, detail: String },
}

/// A language model that answers a single user prompt.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn submit(&self, prompt: &str) -> Result<Completion, ProviderError>;
}

// ── edgequake-llm backend ────────────────────────────────────────────────

/// Backend built on `edgequake-llm`.
///
/// The underlying provider is created per call, so a missing API key only
/// fails the requests that need it rather than the whole service.
#[derive(Debug, Clone)]
pub struct LlmBackend {
    provider_name: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl LlmBackend {
    pub fn new(
        provider_name: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
    ) -> Self {
        Self {
            provider_name: provider_name.into(),
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl ChatBackend for LlmBackend {
    async fn submit(&self, prompt: &str) -> Result<Completion, ProviderError> {
        let provider = ProviderFactory::create_llm_provider(&self.provider_name, &self.model)
            .map_err(|e| ProviderError::NotConfigured {
                provider: self.provider_name.clone(),
                hint: e.to_string(),
            })?;

        let messages = vec![ChatMessage::user(prompt)];
        let response = provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| ProviderError::Api {
                provider: self.provider_name.clone(),
                detail: e.to_string(),
            })?;

        debug!(
            "{}/{}: {} input tokens, {} output tokens",
            self.provider_name, self.model, response.prompt_tokens, response.completion_tokens
        );

        Ok(Completion {
            text: response.content,
            usage: Some(Usage {
                input_tokens: response.prompt_tokens as u64,
                output_tokens: response.completion_tokens as u64,
            }),
        })
    }
}

// ── DeepSeek backend ─────────────────────────────────────────────────────

/// DeepSeek through its OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct DeepSeekBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl DeepSeekBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: usize,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Http {
                provider: "deepseek".into(),
                detail: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            model: model.into(),
            temperature,
            max_tokens,
        })
    }
}

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: [OpenAiMessage<'a>; 1],
    temperature: f32,
    max_tokens: usize,
    stream: bool,
}

#[derive(Serialize)]
struct OpenAiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[async_trait]
impl ChatBackend for DeepSeekBackend {
    async fn submit(&self, prompt: &str) -> Result<Completion, ProviderError> {
        let provider = "deepseek".to_string();
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured {
                provider: provider.clone(),
                hint: "set DEEPSEEK_API_KEY".into(),
            })?;

        let body = OpenAiChatRequest {
            model: &self.model,
            messages: [OpenAiMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http {
                provider: provider.clone(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                provider,
                detail: format!("HTTP {status}: {detail}"),
            });
        }

        let parsed: OpenAiChatResponse =
            response.json().await.map_err(|e| ProviderError::Http {
                provider: provider.clone(),
                detail: format!("invalid response body: {e}"),
            })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Api {
                provider: provider.clone(),
                detail: "response contained no choices".into(),
            })?;

        Ok(Completion {
            text,
            usage: parsed.usage.map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            }),
        })
    }
}
