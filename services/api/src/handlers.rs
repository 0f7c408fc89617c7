//! Axum Handlers for the Boundary API
//!
//! The two request/response operations of the boundary adapter, exposed over
//! HTTP. It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{State, rejection::JsonRejection},
    response::Json,
};
use duologue_core::{AskTurnRequest, AskTurnResponse, Capabilities};
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

/// Report which providers have credentials configured.
#[utoipa::path(
    get,
    path = "/capabilities",
    responses(
        (status = 200, description = "Provider availability", body = Capabilities)
    )
)]
pub async fn check_capabilities(State(state): State<Arc<AppState>>) -> Json<Capabilities> {
    Json(state.boundary.check_capabilities())
}

/// Ask one provider for its next turn.
///
/// Always answers with a tagged result, including for malformed requests.
#[utoipa::path(
    post,
    path = "/turns",
    request_body = AskTurnRequest,
    responses(
        (status = 200, description = "Tagged turn result", body = AskTurnResponse)
    )
)]
pub async fn ask_turn(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AskTurnRequest>, JsonRejection>,
) -> Json<AskTurnResponse> {
    match payload {
        Ok(Json(request)) => Json(state.boundary.ask_turn(request).await),
        Err(rejection) => {
            warn!(error = %rejection, "Rejected malformed turn request.");
            Json(AskTurnResponse::failure(rejection.body_text()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::{Body, to_bytes},
        extract::FromRequest,
        http::{Request, StatusCode, header},
        response::IntoResponse,
    };
    use duologue_core::ProviderId;

    fn state_without_credentials() -> Arc<AppState> {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            openai_api_key: None,
            gemini_api_key: Some("test-gemini-key".to_string()),
            openai_model: "gpt-3.5-turbo".to_string(),
            gemini_model: "gemini-1.5-flash".to_string(),
            sampling: Default::default(),
            failure_policy: Default::default(),
            scheduler: Default::default(),
            log_level: tracing::Level::INFO,
        };
        Arc::new(AppState::new(config))
    }

    #[tokio::test]
    async fn test_check_capabilities_reflects_credentials() {
        let Json(caps) = check_capabilities(State(state_without_credentials())).await;
        assert!(!caps.has_openai);
        assert!(caps.has_gemini);
    }

    #[tokio::test]
    async fn test_ask_turn_without_credentials_is_tagged_failure() {
        let request = AskTurnRequest {
            provider: ProviderId::ChatGpt,
            theme: "coffee".to_string(),
            history: vec![],
        };
        let Json(response) = ask_turn(State(state_without_credentials()), Ok(Json(request))).await;
        assert!(!response.ok);
        assert_eq!(
            response.error.as_deref(),
            Some("OPENAI_API_KEY is not set (.env).")
        );
    }

    async fn post_turn(body: &'static str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/turns")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let payload = Json::<AskTurnRequest>::from_request(request, &()).await;
        let response = ask_turn(State(state_without_credentials()), payload)
            .await
            .into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_unknown_provider_is_tagged_failure_with_ok_status() {
        let (status, body) = post_turn(r#"{"provider":"claude"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
        assert!(body.get("text").is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_is_tagged_failure_with_ok_status() {
        let (status, body) = post_turn("{not json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert!(body["error"].is_string());
    }
}
