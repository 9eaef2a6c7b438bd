// Client intents and the rules that gate them.

use serde::{Deserialize, Serialize};

use super::config::*;
use super::faction::{FactionId, JoinError};
use super::game::Game;
use super::phase::Phase;
use super::world::{BuildingKind, Region};

/// An inbound envelope, tagged by `type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    Join {
        #[serde(default)]
        name: String,
    },
    #[serde(rename_all = "camelCase")]
    SelectSpawn { territory_id: u32 },
    SetTroopPercentage { percentage: f64 },
    #[serde(rename_all = "camelCase")]
    BuildDefense { territory_id: u32 },
    #[serde(rename_all = "camelCase")]
    BuildStructure { territory_id: u32, building: String },
    #[serde(rename_all = "camelCase")]
    Attack { territory_id: u32 },
}

impl Command {
    /// Parse a raw text frame.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The wire `type` tag, used as a metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            Command::Join { .. } => "join",
            Command::SelectSpawn { .. } => "selectSpawn",
            Command::SetTroopPercentage { .. } => "setTroopPercentage",
            Command::BuildDefense { .. } => "buildDefense",
            Command::BuildStructure { .. } => "buildStructure",
            Command::Attack { .. } => "attack",
        }
    }
}

/// Why a command was ignored. Never sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("session has not joined")]
    NotJoined,
    #[error("session already joined")]
    AlreadyJoined,
    #[error("player id is reserved")]
    ReservedId,
    #[error("command not allowed during the {0} phase")]
    WrongPhase(Phase),
    #[error("spawn already selected")]
    SpawnAlreadySelected,
    #[error("territory {0} does not exist")]
    UnknownTerritory(u32),
    #[error("territory {0} is water")]
    Water(u32),
    #[error("territory {0} is already owned")]
    AlreadyOwned(u32),
    #[error("territory {0} is outside the spawn region")]
    OutsideSpawnRegion(u32),
    #[error("territory {0} is not yours")]
    NotOwner(u32),
    #[error("need {needed} army, have {available}")]
    InsufficientArmy { needed: u32, available: u32 },
    #[error("territory {0} is at maximum defense")]
    DefenseMaxed(u32),
    #[error("unknown building {0:?}")]
    UnknownBuilding(String),
    #[error("{0} already built here")]
    AlreadyBuilt(BuildingKind),
    #[error("no free building slot on territory {0}")]
    NoBuildingSlot(u32),
    #[error("need {needed} gold, have {available}")]
    InsufficientGold { needed: u32, available: u32 },
    #[error("attacker holds no territory")]
    NoFoothold,
    #[error("territory {0} is already yours")]
    OwnTerritory(u32),
    #[error("territory {0} belongs to another player")]
    HumanTarget(u32),
    #[error("territory {0} does not border your land")]
    NotAdjacent(u32),
    #[error("already attacking territory {0}")]
    AttackInProgress(u32),
    #[error("only {0} troops would be committed")]
    TooFewTroops(u32),
}

impl Game {
    /// Validate and apply one client command on behalf of `player_id`.
    /// `Ok` means the world changed and a broadcast is due.
    pub fn apply_command(&mut self, player_id: &str, command: Command) -> Result<(), Rejection> {
        match command {
            Command::Join { name } => self.join(player_id, &name),
            Command::SelectSpawn { territory_id } => self.select_spawn(player_id, territory_id),
            Command::SetTroopPercentage { percentage } => {
                self.set_troop_percentage(player_id, percentage)
            }
            Command::BuildDefense { territory_id } => self.build_defense(player_id, territory_id),
            Command::BuildStructure {
                territory_id,
                building,
            } => self.build_structure(player_id, territory_id, &building),
            Command::Attack { territory_id } => self.attack(player_id, territory_id),
        }
    }

    fn join(&mut self, player_id: &str, name: &str) -> Result<(), Rejection> {
        let player = self
            .factions
            .join(player_id, name)
            .map_err(|e| match e {
                JoinError::AlreadyJoined => Rejection::AlreadyJoined,
                JoinError::ReservedId(_) => Rejection::ReservedId,
            })?;
        tracing::info!(player_id, name = %player.name, color = %player.color, "Player joined");

        if self.phase == Phase::Lobby && self.lobby_full() {
            self.start_match();
        }
        Ok(())
    }

    fn require_playing(&self) -> Result<(), Rejection> {
        if self.phase == Phase::Playing {
            Ok(())
        } else {
            Err(Rejection::WrongPhase(self.phase))
        }
    }

    fn owned_territory(&self, faction: &FactionId, territory_id: u32) -> Result<(), Rejection> {
        let territory = self
            .world
            .get(territory_id)
            .ok_or(Rejection::UnknownTerritory(territory_id))?;
        if territory.is_owned_by(faction) {
            Ok(())
        } else {
            Err(Rejection::NotOwner(territory_id))
        }
    }

    fn select_spawn(&mut self, player_id: &str, territory_id: u32) -> Result<(), Rejection> {
        let player = self.factions.player(player_id).ok_or(Rejection::NotJoined)?;
        self.require_playing()?;
        if player.spawn_selected {
            return Err(Rejection::SpawnAlreadySelected);
        }
        let faction = player.id.clone();

        let territory = self
            .world
            .get_mut(territory_id)
            .ok_or(Rejection::UnknownTerritory(territory_id))?;
        if territory.owner_id.is_some() {
            return Err(Rejection::AlreadyOwned(territory_id));
        }
        if territory.is_water {
            return Err(Rejection::Water(territory_id));
        }
        if territory.region != Region::West {
            return Err(Rejection::OutsideSpawnRegion(territory_id));
        }
        territory.claim(faction, SPAWN_POPULATION);

        if let Some(player) = self.factions.player_mut(player_id) {
            player.spawn_selected = true;
            player.stats.territory_count += 1;
        }
        tracing::info!(player_id, territory = territory_id, "Spawn selected");
        Ok(())
    }

    fn set_troop_percentage(&mut self, player_id: &str, percentage: f64) -> Result<(), Rejection> {
        let player = self
            .factions
            .player_mut(player_id)
            .ok_or(Rejection::NotJoined)?;
        player.troop_percentage = percentage.clamp(1.0, 100.0) as u32;
        Ok(())
    }

    fn build_defense(&mut self, player_id: &str, territory_id: u32) -> Result<(), Rejection> {
        let player = self.factions.player(player_id).ok_or(Rejection::NotJoined)?;
        self.require_playing()?;
        let faction = player.id.clone();
        let army = player.stats.army;
        self.owned_territory(&faction, territory_id)?;
        if army < DEFENSE_COST_ARMY {
            return Err(Rejection::InsufficientArmy {
                needed: DEFENSE_COST_ARMY,
                available: army,
            });
        }

        let territory = self
            .world
            .get_mut(territory_id)
            .ok_or(Rejection::UnknownTerritory(territory_id))?;
        if territory.defense >= MAX_DEFENSE {
            return Err(Rejection::DefenseMaxed(territory_id));
        }
        territory.defense += 1;
        if let Some(player) = self.factions.player_mut(player_id) {
            player.stats.army -= DEFENSE_COST_ARMY;
        }
        Ok(())
    }

    fn build_structure(
        &mut self,
        player_id: &str,
        territory_id: u32,
        building: &str,
    ) -> Result<(), Rejection> {
        let player = self.factions.player(player_id).ok_or(Rejection::NotJoined)?;
        self.require_playing()?;
        let faction = player.id.clone();
        let gold = player.stats.gold;
        self.owned_territory(&faction, territory_id)?;
        let kind: BuildingKind = building
            .parse()
            .map_err(|_| Rejection::UnknownBuilding(building.to_string()))?;

        let territory = self
            .world
            .get_mut(territory_id)
            .ok_or(Rejection::UnknownTerritory(territory_id))?;
        if territory.has_building(kind) {
            return Err(Rejection::AlreadyBuilt(kind));
        }
        if territory.buildings.len() >= MAX_BUILDINGS {
            return Err(Rejection::NoBuildingSlot(territory_id));
        }
        let cost = kind.effects().gold_cost;
        if gold < cost {
            return Err(Rejection::InsufficientGold {
                needed: cost,
                available: gold,
            });
        }
        territory.buildings.push(kind);
        if let Some(player) = self.factions.player_mut(player_id) {
            player.stats.gold -= cost;
        }
        tracing::debug!(player_id, territory = territory_id, building = %kind, "Structure built");
        Ok(())
    }

    fn attack(&mut self, player_id: &str, territory_id: u32) -> Result<(), Rejection> {
        let player = self.factions.player(player_id).ok_or(Rejection::NotJoined)?;
        self.require_playing()?;
        let faction = player.id.clone();
        let troops = player.committable_troops();

        if self.world.count_owned(&faction) == 0 {
            return Err(Rejection::NoFoothold);
        }
        let target = self
            .world
            .get(territory_id)
            .ok_or(Rejection::UnknownTerritory(territory_id))?;
        if target.is_water {
            return Err(Rejection::Water(territory_id));
        }
        if target.is_owned_by(&faction) {
            return Err(Rejection::OwnTerritory(territory_id));
        }
        if target.is_human_owned() {
            return Err(Rejection::HumanTarget(territory_id));
        }
        if !self.world.borders(&faction, territory_id) {
            return Err(Rejection::NotAdjacent(territory_id));
        }
        if self.attacks.contains(&faction, territory_id) {
            return Err(Rejection::AttackInProgress(territory_id));
        }
        if troops < MIN_ATTACK_TROOPS {
            return Err(Rejection::TooFewTroops(troops));
        }

        let Some(player) = self.factions.player_mut(player_id) else {
            return Err(Rejection::NotJoined);
        };
        self.attacks
            .launch(faction, territory_id, troops, &mut player.stats)
            .ok_or(Rejection::AttackInProgress(territory_id))?;
        tracing::debug!(player_id, territory = territory_id, troops, "Attack launched");
        Ok(())
    }
}
