//! Provider Adapter
//!
//! Wraps one provider's remote call: builds the prompt, issues the request with
//! fixed sampling parameters and applies the configured failure policy.

use crate::{
    error::ProviderError,
    llm_client::{CompletionRequest, LLMClient, SamplingParams},
    prompt::{Persona, PromptBuilder},
    transcript::{HistoryEntry, ProviderId},
};
use std::{sync::Arc, time::Duration};
use tracing::{instrument, warn};

/// How an adapter reacts to remote failures. Exactly one policy is active per
/// adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Rate-limit and quota errors become a fixed apology text; everything else
    /// propagates. No retries.
    #[default]
    Apologize,
    /// Every remote error is retried with a linearly increasing delay
    /// (`step`, `2 * step`, ...). The last error propagates unchanged.
    Retry { max_attempts: u32, step: Duration },
}

impl FailurePolicy {
    /// Three attempts waiting 1s and then 2s between them.
    pub fn retry() -> Self {
        FailurePolicy::Retry {
            max_attempts: 3,
            step: Duration::from_secs(1),
        }
    }
}

/// The fixed, user-readable text returned instead of a rate-limit error.
pub fn rate_limit_apology(provider: ProviderId) -> String {
    format!(
        "Sorry, {} has hit its usage limit. Please try again after a while.",
        provider.display_name()
    )
}

/// The fixed, user-readable text returned instead of a quota error.
pub fn quota_apology(provider: ProviderId) -> String {
    format!(
        "{} has reached the limit of its free tier. Consider upgrading to a paid plan.",
        provider.display_name()
    )
}

/// One adapter per provider.
#[derive(Clone)]
pub struct ProviderAdapter {
    provider: ProviderId,
    client: Option<Arc<dyn LLMClient>>,
    prompts: PromptBuilder,
    sampling: SamplingParams,
    policy: FailurePolicy,
}

impl ProviderAdapter {
    /// Creates an adapter. A `None` client means the credential was absent.
    pub fn new(provider: ProviderId, client: Option<Arc<dyn LLMClient>>) -> Self {
        Self {
            provider,
            client,
            prompts: PromptBuilder::default(),
            sampling: SamplingParams::default(),
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_sampling(mut self, sampling: SamplingParams) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Generates this provider's next remark and returns it trimmed.
    #[instrument(skip(self, history), fields(provider = %self.provider, history_len = history.len()))]
    pub async fn generate(
        &self,
        theme: &str,
        history: &[HistoryEntry],
    ) -> Result<String, ProviderError> {
        let client = self.client.as_ref().ok_or(ProviderError::NotConfigured {
            provider: self.provider,
        })?;

        let persona = Persona::for_provider(self.provider);
        let request = CompletionRequest {
            system: persona.system_instruction.map(str::to_string),
            prompt: self.prompts.build(theme, history, self.provider),
            sampling: self.sampling,
        };

        let text = self.complete_with_policy(client.as_ref(), request).await?;
        if text.is_empty() {
            warn!("Provider returned no text.");
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text)
    }

    async fn complete_with_policy(
        &self,
        client: &dyn LLMClient,
        request: CompletionRequest,
    ) -> Result<String, ProviderError> {
        match self.policy {
            FailurePolicy::Apologize => match client.complete(request).await {
                Ok(text) => Ok(text.trim().to_string()),
                Err(ProviderError::RateLimited(reason)) => {
                    warn!(%reason, "Rate limit reached; returning apology.");
                    Ok(rate_limit_apology(self.provider))
                }
                Err(ProviderError::QuotaExceeded(reason)) => {
                    warn!(%reason, "Quota exhausted; returning apology.");
                    Ok(quota_apology(self.provider))
                }
                Err(e) => Err(e),
            },
            FailurePolicy::Retry { max_attempts, step } => {
                let attempts = max_attempts.max(1);
                let mut attempt = 1;
                loop {
                    match client.complete(request.clone()).await {
                        Ok(text) => return Ok(text.trim().to_string()),
                        Err(e) if e.is_retryable() && attempt < attempts => {
                            let delay = step * attempt;
                            warn!(attempt, ?delay, error = %e, "Provider call failed; retrying.");
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockLLMClient;
    use tokio::time::Instant;

    fn adapter(provider: ProviderId, mock: MockLLMClient) -> ProviderAdapter {
        ProviderAdapter::new(provider, Some(Arc::new(mock)))
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_fast() {
        let adapter = ProviderAdapter::new(ProviderId::Gemini, None);
        assert!(!adapter.is_configured());
        let err = adapter.generate("coffee", &[]).await.unwrap_err();
        assert_eq!(
            err,
            ProviderError::NotConfigured {
                provider: ProviderId::Gemini
            }
        );
        assert_eq!(err.to_string(), "GEMINI_API_KEY is not set (.env).");
    }

    #[tokio::test]
    async fn test_generate_trims_and_sends_persona() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .withf(|req| {
                req.system.is_some()
                    && req.prompt.contains("Current theme: coffee")
                    && req.sampling == SamplingParams::default()
            })
            .times(1)
            .returning(|_| Ok("  Freshly ground beans matter.\n".to_string()));

        let text = adapter(ProviderId::ChatGpt, mock)
            .generate("coffee", &[])
            .await
            .unwrap();
        assert_eq!(text, "Freshly ground beans matter.");
    }

    #[tokio::test]
    async fn test_gemini_has_no_system_message() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .withf(|req| req.system.is_none() && req.prompt.contains("Important:"))
            .times(1)
            .returning(|_| Ok("ok".to_string()));
        adapter(ProviderId::Gemini, mock)
            .generate("tea", &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_and_quota_become_apologies() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Err(ProviderError::RateLimited("429".into())));
        let text = adapter(ProviderId::Gemini, mock)
            .generate("coffee", &[])
            .await
            .unwrap();
        assert_eq!(text, rate_limit_apology(ProviderId::Gemini));

        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Err(ProviderError::QuotaExceeded("quota".into())));
        let text = adapter(ProviderId::ChatGpt, mock)
            .generate("coffee", &[])
            .await
            .unwrap();
        assert_eq!(text, quota_apology(ProviderId::ChatGpt));
    }

    #[tokio::test]
    async fn test_other_errors_propagate_without_retry() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Err(ProviderError::Remote("bad gateway".into())));
        let err = adapter(ProviderId::ChatGpt, mock)
            .generate("coffee", &[])
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Remote("bad gateway".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_policy_backs_off_linearly() {
        let mut mock = MockLLMClient::new();
        let mut seq = mockall::Sequence::new();
        mock.expect_complete()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(ProviderError::RateLimited("429".into())));
        mock.expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("third time lucky".to_string()));

        let started = Instant::now();
        let text = adapter(ProviderId::ChatGpt, mock)
            .with_policy(FailurePolicy::retry())
            .generate("coffee", &[])
            .await
            .unwrap();
        assert_eq!(text, "third time lucky");
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_policy_surfaces_last_error() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .times(3)
            .returning(|_| Err(ProviderError::RateLimited("429".into())));

        let err = adapter(ProviderId::Gemini, mock)
            .with_policy(FailurePolicy::retry())
            .generate("coffee", &[])
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::RateLimited("429".into()));
    }

    #[tokio::test]
    async fn test_blank_text_is_an_empty_response() {
        let mut mock = MockLLMClient::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Ok("  \n".to_string()));
        let err = adapter(ProviderId::Gemini, mock)
            .generate("coffee", &[])
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::EmptyResponse);
        assert_eq!(err.to_string(), "Unknown error");
    }
}
