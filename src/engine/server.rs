// Game server: owns the running game on a single task and broadcasts state to sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::metrics;
use crate::replay::{write_replay, ReplayRecorder};

use super::command::Command;
use super::config::REPLAY_SAMPLE_INTERVAL;
use super::game::{Game, GameState, PhaseChange, TickReport};
use super::phase::Phase;

/// Messages sent from the game loop to sessions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameMessage {
    /// Sent once, right after a session connects.
    #[serde(rename_all = "camelCase")]
    Init {
        player_id: String,
        game_state: GameState,
    },
    /// Full snapshot, every tick and after every accepted command.
    #[serde(rename_all = "camelCase")]
    Update { game_state: GameState },
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("game server is not running")]
    Stopped,
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Everything that can reach the game task, applied one at a time in arrival order.
#[derive(Debug)]
enum ServerEvent {
    Connect {
        reply: oneshot::Sender<Result<(String, String), ServerError>>,
    },
    Envelope {
        player_id: String,
        raw: String,
    },
    Disconnect {
        player_id: String,
    },
    Snapshot {
        reply: oneshot::Sender<GameState>,
    },
}

/// Handle to the game task. Cheap to share behind an `Arc`.
pub struct GameServer {
    events: mpsc::UnboundedSender<ServerEvent>,
    broadcast_tx: broadcast::Sender<String>,
}

impl GameServer {
    /// Spawn the game task. It runs until the last handle is dropped.
    pub fn start(game: Game, tick: Duration, replay_dir: Option<PathBuf>) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (broadcast_tx, _) = broadcast::channel(256);

        let publisher = Publisher {
            tx: broadcast_tx.clone(),
            recorder: None,
            replay_dir,
        };
        tokio::spawn(run_game(game, events_rx, publisher, tick));

        Arc::new(GameServer {
            events: events_tx,
            broadcast_tx,
        })
    }

    /// Subscribe to game messages. Returns a receiver that yields JSON strings.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.broadcast_tx.subscribe()
    }

    /// Number of live broadcast subscribers.
    pub fn session_count(&self) -> usize {
        self.broadcast_tx.receiver_count()
    }

    /// Register a new session. Returns its player id and the `init` frame to send it.
    pub async fn connect(&self) -> Result<(String, String), ServerError> {
        let (reply, rx) = oneshot::channel();
        self.send(ServerEvent::Connect { reply })?;
        rx.await.map_err(|_| ServerError::Stopped)?
    }

    /// Hand a raw inbound text frame to the game.
    pub fn submit(&self, player_id: &str, raw: String) -> Result<(), ServerError> {
        self.send(ServerEvent::Envelope {
            player_id: player_id.to_string(),
            raw,
        })
    }

    pub fn disconnect(&self, player_id: &str) -> Result<(), ServerError> {
        self.send(ServerEvent::Disconnect {
            player_id: player_id.to_string(),
        })
    }

    /// Current snapshot, as the game task sees it.
    pub async fn state(&self) -> Result<GameState, ServerError> {
        let (reply, rx) = oneshot::channel();
        self.send(ServerEvent::Snapshot { reply })?;
        rx.await.map_err(|_| ServerError::Stopped)
    }

    fn send(&self, event: ServerEvent) -> Result<(), ServerError> {
        self.events.send(event).map_err(|_| ServerError::Stopped)
    }
}

/// Fans snapshots out to sessions and keeps the replay of the current match.
struct Publisher {
    tx: broadcast::Sender<String>,
    recorder: Option<ReplayRecorder>,
    replay_dir: Option<PathBuf>,
}

impl Publisher {
    /// Serialize and send a full update. Returns the JSON for reuse.
    fn broadcast(&self, game: &Game) -> Option<String> {
        let msg = GameMessage::Update {
            game_state: game.snapshot(),
        };
        match serde_json::to_string(&msg) {
            Ok(json) => {
                // No subscribers is not an error
                let _ = self.tx.send(json.clone());
                metrics::BROADCASTS_TOTAL.inc();
                Some(json)
            }
            Err(e) => {
                tracing::error!("Failed to encode update: {e}");
                None
            }
        }
    }

    fn after_tick(&mut self, game: &Game, report: &TickReport) {
        let json = self.broadcast(game);
        if self.replay_dir.is_none() {
            return;
        }

        match (report.phase_change, game.phase()) {
            (Some(PhaseChange::MatchEnded(_)), _) => {
                if let (Some(mut recorder), Some(json)) = (self.recorder.take(), json) {
                    recorder.record_message(&json);
                    self.save(recorder);
                }
            }
            (_, Phase::Playing) => {
                let recorder = self.recorder.get_or_insert_with(ReplayRecorder::new);
                if let Some(json) = json {
                    if game.match_ticks() % REPLAY_SAMPLE_INTERVAL == 0 {
                        recorder.record_message(&json);
                    }
                }
            }
            _ => self.recorder = None,
        }
    }

    fn save(&self, recorder: ReplayRecorder) {
        let Some(dir) = self.replay_dir.clone() else {
            return;
        };
        let frames = recorder.len();
        tokio::task::spawn_blocking(move || {
            match recorder.finish().and_then(|data| write_replay(&dir, &data)) {
                Ok(path) => tracing::info!(path = %path.display(), frames, "Replay saved"),
                Err(e) => tracing::error!("Failed to write replay: {e}"),
            }
        });
    }
}

async fn run_game(
    mut game: Game,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
    mut publisher: Publisher,
    tick: Duration,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    interval.tick().await;
    metrics::GAME_PHASE.set(game.phase().gauge_value());

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let report = game.tick();
                publisher.after_tick(&game, &report);
            }
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                handle_event(&mut game, &publisher, event);
            }
        }
    }
    tracing::info!("Game server stopped");
}

fn handle_event(game: &mut Game, publisher: &Publisher, event: ServerEvent) {
    match event {
        ServerEvent::Connect { reply } => {
            let player_id = uuid::Uuid::new_v4().simple().to_string();
            let msg = GameMessage::Init {
                player_id: player_id.clone(),
                game_state: game.snapshot(),
            };
            let result = serde_json::to_string(&msg)
                .map(|json| (player_id.clone(), json))
                .map_err(ServerError::from);
            tracing::debug!(%player_id, "Session connected");
            let _ = reply.send(result);
        }
        ServerEvent::Envelope { player_id, raw } => {
            let command = match Command::parse(&raw) {
                Ok(command) => command,
                Err(e) => {
                    tracing::warn!(%player_id, "Malformed envelope: {e}");
                    metrics::COMMANDS_TOTAL
                        .with_label_values(&["unknown", "malformed"])
                        .inc();
                    return;
                }
            };
            let label = command.label();
            match game.apply_command(&player_id, command) {
                Ok(()) => {
                    metrics::COMMANDS_TOTAL
                        .with_label_values(&[label, "accepted"])
                        .inc();
                    publisher.broadcast(game);
                }
                Err(rejection) => {
                    tracing::debug!(%player_id, command = label, %rejection, "Command rejected");
                    metrics::COMMANDS_TOTAL
                        .with_label_values(&[label, "rejected"])
                        .inc();
                }
            }
        }
        ServerEvent::Disconnect { player_id } => {
            if game.disconnect(&player_id) {
                publisher.broadcast(game);
            }
        }
        ServerEvent::Snapshot { reply } => {
            let _ = reply.send(game.snapshot());
        }
    }
}
