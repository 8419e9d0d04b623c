//! OpenAI-backed rewriter implementation.

use super::Rewriter;
use crate::config::PolishPrompts;
use crate::error::{Result, TolkError};
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Timeout for rewrite requests. Batches are small, but the model can be slow.
const REQUEST_TIMEOUT_SECS: u64 = 120;

fn create_client() -> async_openai::Client<OpenAIConfig> {
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .expect("Failed to create HTTP client");

    async_openai::Client::with_config(OpenAIConfig::default()).with_http_client(http_client)
}

/// Rewriter backed by an OpenAI chat model.
pub struct OpenAiRewriter {
    client: async_openai::Client<OpenAIConfig>,
    model: String,
    system_prompt: String,
}

impl OpenAiRewriter {
    /// Create a rewriter for the given model with the default system prompt.
    pub fn new(model: &str) -> Self {
        Self::with_system_prompt(model, &PolishPrompts::default().system)
    }

    /// Create a rewriter with a custom system prompt.
    pub fn with_system_prompt(model: &str, system_prompt: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
        }
    }
}

#[async_trait]
impl Rewriter for OpenAiRewriter {
    #[instrument(skip(self, prompt))]
    async fn rewrite(&self, prompt: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()
                .map_err(|e| TolkError::OpenAI(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| TolkError::OpenAI(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.2)
            .build()
            .map_err(|e| TolkError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(classify_error)?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| TolkError::OpenAI("Empty response from rewriting model".to_string()))?
            .clone();

        debug!("Rewriting model returned {} chars", content.len());
        Ok(content)
    }
}

/// Map API failures into the pipeline's error taxonomy.
fn classify_error(error: OpenAIError) -> TolkError {
    match error {
        OpenAIError::ApiError(api) => {
            let rate_limited = api.code.as_deref() == Some("rate_limit_exceeded")
                || api.message.to_lowercase().contains("rate limit");
            if rate_limited {
                TolkError::RateLimited(api.message)
            } else {
                TolkError::OpenAI(api.message)
            }
        }
        OpenAIError::Reqwest(e) => TolkError::Fetch(e.to_string()),
        other => TolkError::Fetch(other.to_string()),
    }
}
