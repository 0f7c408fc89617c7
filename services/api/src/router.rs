//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the boundary API, WebSocket endpoint, and OpenAPI documentation.

use crate::{handlers, state::AppState, ws::ws_handler};

use axum::{
    Router,
    routing::{get, post},
};
use duologue_core::{AskTurnRequest, AskTurnResponse, Capabilities, HistoryEntry, ProviderId, Speaker, Turn};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::check_capabilities, handlers::ask_turn),
    components(
        schemas(Capabilities, AskTurnRequest, AskTurnResponse, HistoryEntry, ProviderId, Speaker, Turn)
    ),
    tags(
        (name = "Duologue API", description = "Boundary operations for the two-provider conversation")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route("/capabilities", get(handlers::check_capabilities))
        .route("/turns", post(handlers::ask_turn))
        .route("/ws", get(ws_handler))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
