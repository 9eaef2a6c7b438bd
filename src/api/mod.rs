// HTTP API routes: game state, map info, metrics, and the WebSocket session endpoint.

pub mod ws;

use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::engine::server::GameServer;
use crate::engine::world::MapDefinition;
use crate::metrics;

/// Metadata about the map the server is playing on.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapInfo {
    pub name: String,
    pub territory_count: usize,
    pub land_territory_count: usize,
    pub ai_factions: Vec<String>,
}

impl MapInfo {
    pub fn from_definition(map: &MapDefinition) -> Self {
        MapInfo {
            name: map.name.clone(),
            territory_count: map.territories.len(),
            land_territory_count: map.territories.iter().filter(|t| !t.water).count(),
            ai_factions: map.ai_factions.iter().map(|f| f.name.clone()).collect(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub game_server: Arc<GameServer>,
    pub map: Arc<MapInfo>,
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(game_server: Arc<GameServer>, map: MapInfo) -> Router {
    let state = AppState {
        game_server,
        map: Arc::new(map),
    };

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/api/state", get(get_state))
        .route("/api/maps", get(list_maps))
        .route("/ws", get(ws::ws_game))
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

async fn get_state(State(state): State<AppState>) -> impl IntoResponse {
    match state.game_server.state().await {
        Ok(snapshot) => (StatusCode::OK, Json(json!(snapshot))).into_response(),
        Err(e) => {
            tracing::error!("State request failed: {e}");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "Game server unavailable").into_response()
        }
    }
}

async fn list_maps(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(json!([state.map.as_ref()]))).into_response()
}
