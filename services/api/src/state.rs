//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the boundary adapter
//! and the loaded configuration, plus the wiring that builds the adapter.

use crate::config::Config;
use duologue_core::{
    Boundary, ProviderId,
    llm_client::{LLMClient, OpenAICompatibleClient},
    prompt::PromptBuilder,
    provider::ProviderAdapter,
};
use std::sync::Arc;
use tracing::{info, warn};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub boundary: Arc<Boundary>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            boundary: Arc::new(build_boundary(&config)),
            config: Arc::new(config),
        }
    }
}

/// Builds both provider adapters from the configuration. A provider whose
/// credential is absent gets an adapter that fails fast.
pub fn build_boundary(config: &Config) -> Boundary {
    let openai: Option<Arc<dyn LLMClient>> = config.openai_api_key.as_deref().map(|key| {
        Arc::new(OpenAICompatibleClient::openai(key, config.openai_model.clone()))
            as Arc<dyn LLMClient>
    });
    let gemini: Option<Arc<dyn LLMClient>> = config.gemini_api_key.as_deref().map(|key| {
        Arc::new(OpenAICompatibleClient::gemini(key, config.gemini_model.clone()))
            as Arc<dyn LLMClient>
    });

    for (provider, client) in [(ProviderId::ChatGpt, &openai), (ProviderId::Gemini, &gemini)] {
        if client.is_some() {
            info!(%provider, "Provider configured.");
        } else {
            warn!(%provider, env_var = provider.env_var(), "Provider credential missing; it will fail fast.");
        }
    }

    let prompts = PromptBuilder::with_window(config.scheduler.history_window);
    let adapter = |provider, client| {
        ProviderAdapter::new(provider, client)
            .with_sampling(config.sampling)
            .with_policy(config.failure_policy)
            .with_prompts(prompts)
    };

    Boundary::new(
        adapter(ProviderId::ChatGpt, openai),
        adapter(ProviderId::Gemini, gemini),
    )
}
