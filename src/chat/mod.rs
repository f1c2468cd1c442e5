//! Question answering and summaries over converted documents.
//!
//! [`ChatService::answer`] never fails: unknown providers, missing
//! credentials and backend errors all come back as a [`ChatAnswer`] whose
//! text explains what happened and whose usage is zero.
//!
//! ```text
//! summarize = true   →  select_excerpt → summary backend (gpt-4o)
//! summarize = false  →  ProviderChoice → build_chat_prompt → chosen backend
//!                                               ↓
//!                          usage (or word-count fallback) → PricingTable
//! ```

pub mod pricing;
pub mod provider;
pub mod summary;

pub use pricing::{PricingTable, TokenRate};
pub use provider::{
    ChatBackend, Completion, DeepSeekBackend, LlmBackend, Provider, ProviderChoice,
    ProviderError, Usage,
};

use crate::config::ChatConfig;
use crate::output::DocumentContent;
use crate::prompts;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// The outcome of one chat or summary request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    /// USD, priced against the producing provider's entry.
    pub cost: f64,
    /// Label of the backend that answered, `None` when no backend was called.
    pub provider: Option<String>,
}

impl ChatAnswer {
    /// An answer that did not reach any backend.
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            cost: 0.0,
            provider: None,
        }
    }
}

/// Dispatches prompts to the backend registered for each [`Provider`].
pub struct ChatService {
    backends: HashMap<Provider, Arc<dyn ChatBackend>>,
    pricing: PricingTable,
}

impl ChatService {
    pub fn new(backends: HashMap<Provider, Arc<dyn ChatBackend>>, pricing: PricingTable) -> Self {
        Self { backends, pricing }
    }

    /// Register the production backends described by `config`.
    pub fn from_config(config: &ChatConfig) -> Result<Self, ProviderError> {
        let llm = |name: &str, model: &str| -> Arc<dyn ChatBackend> {
            Arc::new(LlmBackend::new(
                name,
                model,
                config.temperature,
                config.max_tokens,
            ))
        };

        let mut backends: HashMap<Provider, Arc<dyn ChatBackend>> = HashMap::new();
        backends.insert(Provider::OpenAiGpt4oMini, llm("openai", &config.openai_model));
        backends.insert(Provider::GeminiFlash, llm("gemini", &config.gemini_model));
        backends.insert(Provider::ClaudeHaiku, llm("anthropic", &config.claude_model));
        backends.insert(Provider::Summary, llm("openai", &config.summary_model));
        backends.insert(
            Provider::DeepSeekChat,
            Arc::new(DeepSeekBackend::new(
                &config.deepseek_base_url,
                config.deepseek_api_key.clone(),
                &config.deepseek_model,
                config.temperature,
                config.max_tokens,
                Duration::from_secs(config.api_timeout_secs),
            )?),
        );

        Ok(Self::new(backends, config.pricing.clone()))
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Answer `question` about `content`, or summarise it.
    ///
    /// With `summarize` set the question and provider are ignored and the
    /// fixed summary backend is used.
    pub async fn answer(
        &self,
        content: &DocumentContent,
        question: &str,
        provider: Option<&str>,
        summarize: bool,
    ) -> ChatAnswer {
        if summarize {
            let excerpt = summary::select_excerpt(&content.pdf_content);
            let prompt = prompts::build_summary_prompt(&excerpt);
            let mut answer = self.run(Provider::Summary, &prompt).await;
            if answer.provider.is_some() {
                answer.text = prompts::format_summary(&answer.text);
            }
            return answer;
        }

        let Some(raw) = provider.filter(|p| !p.trim().is_empty()) else {
            return ChatAnswer::notice("⚠️ No valid LLM choice provided.");
        };

        let choice = ProviderChoice::parse(raw);
        let Some(target) = choice.provider() else {
            let name = match &choice {
                ProviderChoice::Unknown(name) => name.as_str(),
                _ => raw,
            };
            return ChatAnswer::notice(format!("⚠️ LLM choice '{name}' not recognized."));
        };

        let prompt =
            prompts::build_chat_prompt(&content.pdf_content, &content.render_tables(), question);
        self.run(target, &prompt).await
    }

    async fn run(&self, target: Provider, prompt: &str) -> ChatAnswer {
        let Some(backend) = self.backends.get(&target) else {
            let err = ProviderError::NotConfigured {
                provider: target.label().to_string(),
                hint: "no backend registered".into(),
            };
            error!("Error processing LLM request: {err}");
            return ChatAnswer::notice(format!("Error: {err}"));
        };

        match backend.submit(prompt).await {
            Ok(completion) => {
                let usage = completion
                    .usage
                    .filter(|u| !u.is_zero())
                    .unwrap_or_else(|| Usage {
                        input_tokens: word_count(prompt),
                        output_tokens: word_count(&completion.text),
                    });
                let cost = self
                    .pricing
                    .cost(target, usage.input_tokens, usage.output_tokens);

                info!(
                    "Model: {} | Tokens Used: {} | Cost: ${:.6}",
                    target.label(),
                    usage.total(),
                    cost
                );

                ChatAnswer {
                    text: completion.text,
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                    total_tokens: usage.total(),
                    cost,
                    provider: Some(target.label().to_string()),
                }
            }
            Err(e) => {
                error!("Error processing LLM request: {e}");
                ChatAnswer::notice(format!("Error: {e}"))
            }
        }
    }
}

fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}
