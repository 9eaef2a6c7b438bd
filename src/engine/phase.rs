use std::fmt;

use serde::{Deserialize, Serialize};

use super::faction::{FactionId, FactionLedger};
use super::world::World;

/// Where the server is in the match lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Lobby,
    Playing,
    Ended,
}

impl Phase {
    /// Numeric form exported on the phase gauge.
    pub fn gauge_value(self) -> i64 {
        match self {
            Phase::Lobby => 0,
            Phase::Playing => 1,
            Phase::Ended => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Lobby => "lobby",
            Phase::Playing => "playing",
            Phase::Ended => "ended",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Every human that spawned has been wiped off the map.
    HordeVictory,
    /// The horde holds nothing.
    SurvivorsVictory,
}

impl MatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchOutcome::HordeVictory => "horde",
            MatchOutcome::SurvivorsVictory => "survivors",
        }
    }
}

/// Decide whether a match in progress is over.
pub fn match_outcome(world: &World, ledger: &FactionLedger) -> Option<MatchOutcome> {
    if world.count_owned(&FactionId::Zombie) == 0 {
        return Some(MatchOutcome::SurvivorsVictory);
    }
    let mut spawned = ledger.players().values().filter(|p| p.spawn_selected).peekable();
    if spawned.peek().is_none() {
        return None;
    }
    if spawned.all(|p| world.count_owned(&p.id) == 0) {
        Some(MatchOutcome::HordeVictory)
    } else {
        None
    }
}
