//! Boundary Adapter
//!
//! The two request/response operations the presentation layer is allowed to
//! use. Remote execution stays behind this boundary; results always come back
//! as tagged values.

use crate::{
    provider::ProviderAdapter,
    scheduler::TurnExecutor,
    transcript::{HistoryEntry, ProviderId},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Which providers have credentials configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Capabilities {
    #[serde(rename = "hasOpenAI")]
    pub has_openai: bool,
    #[serde(rename = "hasGemini")]
    pub has_gemini: bool,
}

impl Capabilities {
    /// Credential variables that still need to be set.
    pub fn missing_env_vars(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.has_openai {
            missing.push(ProviderId::ChatGpt.env_var());
        }
        if !self.has_gemini {
            missing.push(ProviderId::Gemini.env_var());
        }
        missing
    }
}

/// Request for one provider turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AskTurnRequest {
    pub provider: ProviderId,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Tagged result of one provider turn. `text` is present iff `ok`, `error` iff not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AskTurnResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AskTurnResponse {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            ok: true,
            text: Some(text.into()),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            text: None,
            error: Some(error.into()),
        }
    }
}

/// Exposes both provider adapters to the presentation layer.
#[derive(Clone)]
pub struct Boundary {
    chatgpt: ProviderAdapter,
    gemini: ProviderAdapter,
}

impl Boundary {
    pub fn new(chatgpt: ProviderAdapter, gemini: ProviderAdapter) -> Self {
        Self { chatgpt, gemini }
    }

    fn adapter(&self, provider: ProviderId) -> &ProviderAdapter {
        match provider {
            ProviderId::ChatGpt => &self.chatgpt,
            ProviderId::Gemini => &self.gemini,
        }
    }

    /// Reports which providers are usable. Performs no remote call.
    pub fn check_capabilities(&self) -> Capabilities {
        Capabilities {
            has_openai: self.chatgpt.is_configured(),
            has_gemini: self.gemini.is_configured(),
        }
    }

    /// Runs one provider call and reports the outcome as a tagged value.
    pub async fn ask_turn(&self, request: AskTurnRequest) -> AskTurnResponse {
        let provider = request.provider;
        match self
            .adapter(provider)
            .generate(&request.theme, &request.history)
            .await
        {
            Ok(text) => {
                info!(%provider, chars = text.len(), "Provider turn completed.");
                AskTurnResponse::success(text)
            }
            Err(e) => {
                warn!(%provider, error = %e, "Provider turn failed.");
                AskTurnResponse::failure(e.to_string())
            }
        }
    }
}

#[async_trait]
impl TurnExecutor for Boundary {
    async fn ask_turn(&self, request: AskTurnRequest) -> AskTurnResponse {
        Boundary::ask_turn(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ProviderError, llm_client::MockLLMClient, provider::rate_limit_apology,
        transcript::Speaker,
    };
    use std::sync::Arc;

    fn boundary(chatgpt: Option<MockLLMClient>, gemini: Option<MockLLMClient>) -> Boundary {
        let wrap = |mock: Option<MockLLMClient>| {
            mock.map(|m| Arc::new(m) as Arc<dyn crate::llm_client::LLMClient>)
        };
        Boundary::new(
            ProviderAdapter::new(ProviderId::ChatGpt, wrap(chatgpt)),
            ProviderAdapter::new(ProviderId::Gemini, wrap(gemini)),
        )
    }

    #[test]
    fn test_check_capabilities() {
        let caps = boundary(Some(MockLLMClient::new()), None).check_capabilities();
        assert_eq!(
            caps,
            Capabilities {
                has_openai: true,
                has_gemini: false
            }
        );
        assert_eq!(caps.missing_env_vars(), vec!["GEMINI_API_KEY"]);
        let json = serde_json::to_value(caps).unwrap();
        assert_eq!(json, serde_json::json!({"hasOpenAI": true, "hasGemini": false}));
    }

    #[tokio::test]
    async fn test_ask_turn_routes_to_the_requested_provider() {
        let mut gemini = MockLLMClient::new();
        gemini
            .expect_complete()
            .withf(|req| req.prompt.contains("Partner: hello"))
            .times(1)
            .returning(|_| Ok("Gemini here".to_string()));
        let boundary = boundary(Some(MockLLMClient::new()), Some(gemini));

        let response = boundary
            .ask_turn(AskTurnRequest {
                provider: ProviderId::Gemini,
                theme: "coffee".into(),
                history: vec![HistoryEntry::new(Speaker::ChatGpt, "hello")],
            })
            .await;
        assert_eq!(response, AskTurnResponse::success("Gemini here"));
    }

    #[tokio::test]
    async fn test_ask_turn_never_fails() {
        let boundary = boundary(None, None);
        let response = boundary
            .ask_turn(AskTurnRequest {
                provider: ProviderId::ChatGpt,
                theme: "coffee".into(),
                history: vec![],
            })
            .await;
        assert!(!response.ok);
        assert!(response.text.is_none());
        assert_eq!(response.error.as_deref(), Some("OPENAI_API_KEY is not set (.env)."));

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("text").is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_yields_apology_text() {
        let mut chatgpt = MockLLMClient::new();
        chatgpt
            .expect_complete()
            .returning(|_| Err(ProviderError::RateLimited("429".into())));
        let response = boundary(Some(chatgpt), None)
            .ask_turn(AskTurnRequest {
                provider: ProviderId::ChatGpt,
                theme: "coffee".into(),
                history: vec![],
            })
            .await;
        assert_eq!(
            response,
            AskTurnResponse::success(rate_limit_apology(ProviderId::ChatGpt))
        );
    }

    #[tokio::test]
    async fn test_blank_reply_is_reported_as_failure() {
        let mut gemini = MockLLMClient::new();
        gemini
            .expect_complete()
            .times(1)
            .returning(|_| Ok("   ".to_string()));
        let response = boundary(None, Some(gemini))
            .ask_turn(AskTurnRequest {
                provider: ProviderId::Gemini,
                theme: "coffee".into(),
                history: vec![],
            })
            .await;
        assert_eq!(response, AskTurnResponse::failure("Unknown error"));
    }
}
