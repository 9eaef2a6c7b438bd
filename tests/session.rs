// Game task and HTTP surface, exercised end to end.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tokio::sync::broadcast;
use tower::ServiceExt;

use eras_backend::api::{self, MapInfo};
use eras_backend::engine::game::{Game, GameSettings};
use eras_backend::engine::phase::Phase;
use eras_backend::engine::server::{GameMessage, GameServer};
use eras_backend::engine::world::MapDefinition;
use eras_backend::metrics;

/// A server that never ticks on its own during a test.
fn idle_server(settings: GameSettings) -> Arc<GameServer> {
    let game = Game::with_seed(MapDefinition::europe(), settings, 3);
    GameServer::start(game, Duration::from_secs(3600), None)
}

async fn next_update(rx: &mut broadcast::Receiver<String>) -> GameMessage {
    let json = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for an update")
        .expect("broadcast closed");
    serde_json::from_str(&json).unwrap()
}

async fn get_json(app: axum::Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn full_lobby_starts_the_match_for_everyone() {
    let server = idle_server(GameSettings {
        max_players: 2,
        ..GameSettings::default()
    });
    let mut rx = server.subscribe();

    let (alice, _) = server.connect().await.unwrap();
    let (bob, _) = server.connect().await.unwrap();
    assert_ne!(alice, bob);

    server
        .submit(&alice, r#"{"type":"join","name":"Alice"}"#.into())
        .unwrap();
    let GameMessage::Update { game_state } = next_update(&mut rx).await else {
        panic!("expected update");
    };
    assert_eq!(game_state.game_phase, Phase::Lobby);

    server
        .submit(&bob, r#"{"type":"join","name":"Bob"}"#.into())
        .unwrap();
    let GameMessage::Update { game_state } = next_update(&mut rx).await else {
        panic!("expected update");
    };
    assert_eq!(game_state.game_phase, Phase::Playing);
    assert_eq!(game_state.players.len(), 2);
    assert_eq!(game_state.ai_factions.len(), 3);

    server
        .submit(&alice, r#"{"type":"selectSpawn","territoryId":2}"#.into())
        .unwrap();
    let GameMessage::Update { game_state } = next_update(&mut rx).await else {
        panic!("expected update");
    };
    assert_eq!(
        game_state.territories[2].owner_id.as_ref().map(|id| id.to_string()),
        Some(alice.clone())
    );
    assert!(game_state.players[&alice].spawn_selected);
}

#[tokio::test]
async fn late_session_sees_current_state_in_init() {
    let server = idle_server(GameSettings::default());
    let (first, _) = server.connect().await.unwrap();
    server
        .submit(&first, r#"{"type":"join","name":"First"}"#.into())
        .unwrap();

    let (second, init) = server.connect().await.unwrap();
    let GameMessage::Init {
        player_id,
        game_state,
    } = serde_json::from_str::<GameMessage>(&init).unwrap()
    else {
        panic!("expected init");
    };
    assert_eq!(player_id, second);
    assert_eq!(game_state.players[&first].name, "First");
}

#[tokio::test]
async fn state_route_serves_snapshot() {
    let server = idle_server(GameSettings::default());
    let app = api::router(server, MapInfo::from_definition(&MapDefinition::europe()));
    let (status, body) = get_json(app, "/api/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["gamePhase"], "lobby");
    assert_eq!(body["mapName"], "Europe");
    assert_eq!(body["territories"].as_array().unwrap().len(), 42);
}

#[tokio::test]
async fn maps_route_describes_current_map() {
    let server = idle_server(GameSettings::default());
    let app = api::router(server, MapInfo::from_definition(&MapDefinition::europe()));
    let (status, body) = get_json(app, "/api/maps").await;
    assert_eq!(status, StatusCode::OK);
    let maps = body.as_array().unwrap();
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0]["name"], "Europe");
    assert_eq!(maps[0]["territoryCount"], 42);
    assert_eq!(maps[0]["landTerritoryCount"], 37);
    assert_eq!(maps[0]["aiFactions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn metrics_route_exposes_registry() {
    metrics::register_metrics();
    metrics::TICKS_TOTAL.inc();
    let server = idle_server(GameSettings::default());
    let app = api::router(server, MapInfo::from_definition(&MapDefinition::europe()));
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("eras_ticks_total"));
}
