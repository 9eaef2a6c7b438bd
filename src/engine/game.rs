use std::collections::BTreeMap;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::ai::{run_ai_director, seed_factions};
use super::attack::{resolve_attacks, ActiveAttack, AttackQueue, ResolvedAttack};
use super::economy::update_economy;
use super::faction::{AiFaction, FactionLedger, HumanPlayer};
use super::phase::{match_outcome, MatchOutcome, Phase};
use super::world::{MapDefinition, Territory, World};
use super::zombie::{regenerate_horde, run_zombie_director, seed_horde, ZombieAction};
use crate::metrics;

/// Per-match knobs. Balance constants live in `engine::config`.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSettings {
    /// Humans needed to start a match before the countdown runs out.
    pub max_players: usize,
    /// Lobby countdown, in ticks.
    pub lobby_seconds: u32,
    /// End screen cooldown, in ticks.
    pub ended_seconds: u32,
    /// Chance per tick that each AI faction considers an attack.
    pub ai_action_chance: f64,
    /// Chance per tick that the horde makes a move.
    pub zombie_action_chance: f64,
}

impl Default for GameSettings {
    fn default() -> Self {
        GameSettings {
            max_players: 8,
            lobby_seconds: 60,
            ended_seconds: 10,
            ai_action_chance: 0.15,
            zombie_action_chance: 0.30,
        }
    }
}

/// The full snapshot sent to clients as `gameState`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub players: BTreeMap<String, HumanPlayer>,
    pub territories: Vec<Territory>,
    pub active_attacks: Vec<ActiveAttack>,
    pub game_phase: Phase,
    pub lobby_timer: u32,
    pub ai_factions: BTreeMap<String, AiFaction>,
    pub map_name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseChange {
    MatchStarted,
    MatchEnded(MatchOutcome),
    BackToLobby,
}

/// What happened during one tick.
#[derive(Debug, Default)]
pub struct TickReport {
    pub phase_change: Option<PhaseChange>,
    pub resolved: Vec<ResolvedAttack>,
    pub ai_attacks_launched: usize,
    pub zombie_action: Option<ZombieAction>,
}

/// The single authoritative game world and everything that lives in it.
///
/// All mutation goes through [`Game::apply_command`], [`Game::disconnect`] and
/// [`Game::tick`].
#[derive(Debug)]
pub struct Game {
    pub(super) map: MapDefinition,
    pub(super) settings: GameSettings,
    pub(super) world: World,
    pub(super) factions: FactionLedger,
    pub(super) attacks: AttackQueue,
    pub(super) phase: Phase,
    pub(super) lobby_timer: u32,
    pub(super) match_ticks: u64,
    pub(super) rng: StdRng,
}

impl Game {
    /// A fresh server in the lobby.
    pub fn new(map: MapDefinition, settings: GameSettings, rng: StdRng) -> Self {
        Game {
            world: World::from_definition(&map),
            lobby_timer: settings.lobby_seconds,
            map,
            settings,
            factions: FactionLedger::new(),
            attacks: AttackQueue::new(),
            phase: Phase::Lobby,
            match_ticks: 0,
            rng,
        }
    }

    pub fn with_seed(map: MapDefinition, settings: GameSettings, seed: u64) -> Self {
        Self::new(map, settings, StdRng::seed_from_u64(seed))
    }

    /// Resume from a snapshot. `map` is the definition new matches are built from.
    pub fn from_state(
        state: GameState,
        map: MapDefinition,
        settings: GameSettings,
        rng: StdRng,
    ) -> Self {
        Game {
            world: World::from_territories(state.map_name, state.territories),
            factions: FactionLedger::from_records(state.players, state.ai_factions),
            attacks: AttackQueue::from_attacks(state.active_attacks),
            phase: state.game_phase,
            lobby_timer: state.lobby_timer,
            map,
            settings,
            match_ticks: 0,
            rng,
        }
    }

    pub fn snapshot(&self) -> GameState {
        GameState {
            players: self.factions.players().clone(),
            territories: self.world.territories().to_vec(),
            active_attacks: self.attacks.as_slice().to_vec(),
            game_phase: self.phase,
            lobby_timer: self.lobby_timer,
            ai_factions: self.factions.ai_factions().clone(),
            map_name: self.world.map_name.clone(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn lobby_timer(&self) -> u32 {
        self.lobby_timer
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn factions(&self) -> &FactionLedger {
        &self.factions
    }

    pub fn attacks(&self) -> &AttackQueue {
        &self.attacks
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn map(&self) -> &MapDefinition {
        &self.map
    }

    /// Ticks spent in the current match (0 outside of one).
    pub fn match_ticks(&self) -> u64 {
        self.match_ticks
    }

    /// Forfeit a session: its land goes back to the wilds and its attacks vanish.
    /// Returns `false` if the session never joined.
    pub fn disconnect(&mut self, player_id: &str) -> bool {
        let Some(player) = self.factions.remove_player(player_id) else {
            return false;
        };
        let released = self.world.release_all(&player.id);
        let dropped = self.attacks.drop_attacker(&player.id);
        if self.phase == Phase::Lobby && self.factions.human_count() == 0 {
            self.lobby_timer = self.settings.lobby_seconds;
        }
        tracing::info!(
            player_id,
            name = %player.name,
            released,
            dropped_attacks = dropped,
            "Player left"
        );
        true
    }

    /// Advance the simulation by one step.
    pub fn tick(&mut self) -> TickReport {
        let start = Instant::now();
        let mut report = TickReport::default();

        match self.phase {
            Phase::Lobby => {
                if self.tick_lobby() {
                    report.phase_change = Some(PhaseChange::MatchStarted);
                }
            }
            Phase::Playing => {
                self.match_ticks += 1;
                report.resolved =
                    resolve_attacks(&mut self.world, &mut self.factions, &mut self.attacks);
                update_economy(&mut self.world, &mut self.factions);
                report.ai_attacks_launched = run_ai_director(
                    &self.world,
                    &mut self.factions,
                    &mut self.attacks,
                    &mut self.rng,
                    self.settings.ai_action_chance,
                );
                report.zombie_action = run_zombie_director(
                    &mut self.world,
                    &mut self.factions,
                    &mut self.rng,
                    self.settings.zombie_action_chance,
                );
                regenerate_horde(&mut self.world);

                if let Some(outcome) = match_outcome(&self.world, &self.factions) {
                    self.end_match(outcome);
                    report.phase_change = Some(PhaseChange::MatchEnded(outcome));
                }
            }
            Phase::Ended => {
                self.lobby_timer = self.lobby_timer.saturating_sub(1);
                if self.lobby_timer == 0 {
                    self.return_to_lobby();
                    report.phase_change = Some(PhaseChange::BackToLobby);
                }
            }
        }

        metrics::TICKS_TOTAL.inc();
        metrics::ACTIVE_ATTACKS.set(self.attacks.len() as i64);
        metrics::GAME_PHASE.set(self.phase.gauge_value());
        metrics::TICK_DURATION_MS.observe(start.elapsed().as_secs_f64() * 1000.0);
        report
    }

    /// Run the lobby countdown. Returns whether a match started.
    fn tick_lobby(&mut self) -> bool {
        if self.factions.human_count() == 0 {
            self.lobby_timer = self.settings.lobby_seconds;
            return false;
        }
        if self.lobby_full() {
            self.start_match();
            return true;
        }
        self.lobby_timer = self.lobby_timer.saturating_sub(1);
        if self.lobby_timer == 0 {
            self.start_match();
            return true;
        }
        false
    }

    pub(super) fn lobby_full(&self) -> bool {
        self.factions.human_count() >= self.settings.max_players
    }

    /// LOBBY -> PLAYING: a fresh world with AI factions and the horde in place.
    pub(super) fn start_match(&mut self) {
        self.world = World::from_definition(&self.map);
        self.attacks.clear();
        self.factions.reset_players();
        self.factions.install_ai(&self.map.ai_factions);
        seed_factions(&mut self.world, &mut self.factions, &self.map.ai_factions);
        let horde = seed_horde(&mut self.world);

        self.phase = Phase::Playing;
        self.lobby_timer = 0;
        self.match_ticks = 0;

        metrics::MATCHES_STARTED_TOTAL.inc();
        metrics::GAME_PHASE.set(self.phase.gauge_value());
        tracing::info!(
            players = self.factions.human_count(),
            ai_factions = self.factions.ai_factions().len(),
            horde,
            map = %self.world.map_name,
            "Match started"
        );
    }

    fn end_match(&mut self, outcome: MatchOutcome) {
        self.phase = Phase::Ended;
        self.lobby_timer = self.settings.ended_seconds;
        self.attacks.clear();

        metrics::MATCHES_ENDED_TOTAL
            .with_label_values(&[outcome.as_str()])
            .inc();
        tracing::info!(outcome = outcome.as_str(), ticks = self.match_ticks, "Match ended");
    }

    fn return_to_lobby(&mut self) {
        self.world = World::from_definition(&self.map);
        self.attacks.clear();
        self.factions.clear_ai();
        self.factions.reset_players();
        self.phase = Phase::Lobby;
        self.lobby_timer = self.settings.lobby_seconds;
        self.match_ticks = 0;
        tracing::info!(players = self.factions.human_count(), "Back to lobby");
    }
}
