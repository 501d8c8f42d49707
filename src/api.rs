//! HTTP status endpoints.
//!
//! Served on their own port so browser dashboards can discover where the
//! relay is reachable. Read-only: never mutates the registry.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::tunnel::to_ws_scheme;

/// Response body for `/ngrok-url`
#[derive(Debug, Clone, Serialize)]
pub struct AddressResponse {
    #[serde(rename = "ngrok-url")]
    pub public_url: String,
    #[serde(rename = "local-url")]
    pub local_url: String,
}

/// Response body for `/status`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub control_connected: bool,
    pub display_connected: bool,
    pub controls: usize,
    pub displays: usize,
}

/// Build the status API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ngrok-url", get(public_address))
        .route("/status", get(status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Report where the relay can be reached.
///
/// GET /ngrok-url
///
/// Returns 503 until the public address has been provisioned.
pub async fn public_address(State(state): State<Arc<AppState>>) -> Response {
    match state.public_url() {
        Some(url) => Json(AddressResponse {
            public_url: to_ws_scheme(&url),
            local_url: state.config.local_ws_url(),
        })
        .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "url": "ngrok not started yet" })),
        )
            .into_response(),
    }
}

/// GET /status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let counts = state.registry.counts().await;
    let liveness = counts.liveness();
    Json(StatusResponse {
        control_connected: liveness.control_connected,
        display_connected: liveness.display_connected,
        controls: counts.controls,
        displays: counts.displays,
    })
}
