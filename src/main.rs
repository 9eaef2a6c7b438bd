use axum::{routing::get, Json, Router};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use eras_backend::api::{self, MapInfo};
use eras_backend::config::Config;
use eras_backend::engine::game::Game;
use eras_backend::engine::server::GameServer;
use eras_backend::engine::world::MapDefinition;
use eras_backend::metrics;

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "eras-server" }))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();
    metrics::register_metrics();

    let map = match &config.map_file {
        Some(path) => match MapDefinition::load(path) {
            Ok(map) => map,
            Err(e) => {
                tracing::error!(path = %path.display(), "Failed to load map: {e}");
                std::process::exit(1);
            }
        },
        None => MapDefinition::europe(),
    };

    let rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let map_info = MapInfo::from_definition(&map);
    let game = Game::new(map, config.game_settings(), rng);
    let game_server = GameServer::start(game, config.tick, config.replay_dir.clone());

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(api::router(game_server, map_info))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind to {addr}: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        port = config.port,
        tick_ms = config.tick.as_millis() as u64,
        seeded = config.rng_seed.is_some(),
        "Eras server listening"
    );
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    }
}
