use crate::error::ProviderError;
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use std::time::Duration;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Fixed sampling parameters applied to every generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 100,
        }
    }
}

/// A single text-generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Optional system message sent ahead of the prompt.
    pub system: Option<String>,
    pub prompt: String,
    pub sampling: SamplingParams,
}

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming generation call and returns the raw text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// The library's own rate-limit backoff is given a zero time budget so that
    /// rate-limit errors surface immediately and the provider adapter's failure
    /// policy stays the only policy in effect.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions.
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        let no_backoff = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();
        Self {
            client: Client::with_config(config).with_backoff(no_backoff),
            model,
        }
    }

    /// Client for the OpenAI chat completions API.
    pub fn openai(api_key: &str, model: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(OPENAI_API_BASE);
        Self::new(config, model)
    }

    /// Client for Gemini through its OpenAI-compatible endpoint.
    pub fn gemini(api_key: &str, model: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(GEMINI_API_BASE);
        Self::new(config, model)
    }

    #[allow(deprecated)]
    async fn create(
        &self,
        request: CompletionRequest,
    ) -> Result<CreateChatCompletionResponse, OpenAIError> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt)
                .build()?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(request.sampling.temperature)
            .max_tokens(request.sampling.max_tokens)
            .build()?;

        self.client.chat().create(request).await
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let response = self.create(request).await.map_err(classify)?;
        Ok(response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .unwrap_or_default())
    }
}

/// Sorts a remote failure into the provider error taxonomy.
///
/// Quota exhaustion is checked first because some services report it with a
/// 429 status as well.
pub fn classify(err: OpenAIError) -> ProviderError {
    let message = err.to_string();
    let signal = match &err {
        OpenAIError::ApiError(api) => {
            format!("{} {:?} {:?}", api.message, api.r#type, api.code)
        }
        other => other.to_string(),
    };
    classify_signal(&signal, message)
}

fn classify_signal(signal: &str, message: String) -> ProviderError {
    let signal = signal.to_lowercase();
    if signal.contains("insufficient_quota") || signal.contains("quota") {
        ProviderError::QuotaExceeded(message)
    } else if signal.contains("429")
        || signal.contains("rate_limit")
        || signal.contains("rate limit")
        || signal.contains("resource_exhausted")
    {
        ProviderError::RateLimited(message)
    } else {
        ProviderError::Remote(message)
    }
}
