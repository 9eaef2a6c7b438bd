use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::config::*;
use super::world::AiFactionDef;

/// Identity of anything that can own a territory.
///
/// On the wire this is a plain string: a human's session id, `ai-<n>` for AI
/// factions, or the literal `zombie` tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum FactionId {
    Human(String),
    Ai(u32),
    Zombie,
}

impl FactionId {
    pub fn human(id: impl Into<String>) -> Self {
        FactionId::Human(id.into())
    }

    pub fn is_human(&self) -> bool {
        matches!(self, FactionId::Human(_))
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, FactionId::Ai(_))
    }

    /// Short label used for metrics.
    pub fn kind_label(&self) -> &'static str {
        match self {
            FactionId::Human(_) => "human",
            FactionId::Ai(_) => "ai",
            FactionId::Zombie => "zombie",
        }
    }
}

impl fmt::Display for FactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactionId::Human(id) => write!(f, "{id}"),
            FactionId::Ai(n) => write!(f, "ai-{n}"),
            FactionId::Zombie => write!(f, "{ZOMBIE_TAG}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid faction id {0:?}")]
pub struct InvalidFactionId(pub String);

impl FromStr for FactionId {
    type Err = InvalidFactionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(InvalidFactionId(s.to_string()));
        }
        if s == ZOMBIE_TAG {
            return Ok(FactionId::Zombie);
        }
        if let Some(n) = s.strip_prefix("ai-") {
            return n
                .parse()
                .map(FactionId::Ai)
                .map_err(|_| InvalidFactionId(s.to_string()));
        }
        Ok(FactionId::Human(s.to_string()))
    }
}

impl From<FactionId> for String {
    fn from(id: FactionId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for FactionId {
    type Error = InvalidFactionId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("session already joined")]
    AlreadyJoined,
    #[error("player id {0:?} is reserved")]
    ReservedId(String),
}

/// Economic stats shared by human players and AI factions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactionStats {
    pub territory_count: u32,
    pub population: u32,
    pub army: u32,
    pub gold: u32,
}

impl FactionStats {
    fn human_defaults() -> Self {
        FactionStats {
            territory_count: 0,
            population: START_POPULATION,
            army: START_ARMY,
            gold: START_GOLD,
        }
    }

    fn ai_defaults() -> Self {
        FactionStats {
            territory_count: 0,
            population: AI_START_POPULATION,
            army: AI_START_ARMY,
            gold: START_GOLD,
        }
    }
}

/// A connected human player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HumanPlayer {
    pub id: FactionId,
    pub name: String,
    pub color: String,
    #[serde(flatten)]
    pub stats: FactionStats,
    pub troop_percentage: u32,
    pub spawn_selected: bool,
}

impl HumanPlayer {
    /// Troops an attack would commit right now.
    pub fn committable_troops(&self) -> u32 {
        percent_of(self.stats.army, self.troop_percentage)
    }
}

/// A computer-controlled faction seeded at match start.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiFaction {
    pub id: FactionId,
    pub name: String,
    pub color: String,
    #[serde(flatten)]
    pub stats: FactionStats,
    #[serde(rename = "isAI")]
    pub is_ai: bool,
}

/// All factions with an economy. The zombie horde has none and never appears here.
#[derive(Debug, Default)]
pub struct FactionLedger {
    players: BTreeMap<String, HumanPlayer>,
    ai_factions: BTreeMap<String, AiFaction>,
    next_color: usize,
}

impl FactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from snapshot records.
    pub fn from_records(
        players: BTreeMap<String, HumanPlayer>,
        ai_factions: BTreeMap<String, AiFaction>,
    ) -> Self {
        let next_color = players.len();
        FactionLedger {
            players,
            ai_factions,
            next_color,
        }
    }

    /// Register a new human. Ids that would read back as an AI or horde tag are refused.
    pub fn join(&mut self, player_id: &str, name: &str) -> Result<&HumanPlayer, JoinError> {
        if !matches!(player_id.parse::<FactionId>(), Ok(FactionId::Human(_))) {
            return Err(JoinError::ReservedId(player_id.to_string()));
        }
        if self.players.contains_key(player_id) {
            return Err(JoinError::AlreadyJoined);
        }
        let color = PLAYER_COLORS[self.next_color % PLAYER_COLORS.len()].to_string();
        self.next_color += 1;
        let player = HumanPlayer {
            id: FactionId::human(player_id),
            name: sanitize_name(name),
            color,
            stats: FactionStats::human_defaults(),
            troop_percentage: DEFAULT_TROOP_PERCENTAGE,
            spawn_selected: false,
        };
        Ok(self.players.entry(player_id.to_string()).or_insert(player))
    }

    pub fn remove_player(&mut self, player_id: &str) -> Option<HumanPlayer> {
        self.players.remove(player_id)
    }

    pub fn player(&self, player_id: &str) -> Option<&HumanPlayer> {
        self.players.get(player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut HumanPlayer> {
        self.players.get_mut(player_id)
    }

    pub fn players(&self) -> &BTreeMap<String, HumanPlayer> {
        &self.players
    }

    pub fn ai_factions(&self) -> &BTreeMap<String, AiFaction> {
        &self.ai_factions
    }

    pub fn human_count(&self) -> usize {
        self.players.len()
    }

    pub fn stats(&self, id: &FactionId) -> Option<&FactionStats> {
        match id {
            FactionId::Human(pid) => self.players.get(pid).map(|p| &p.stats),
            FactionId::Ai(_) => self.ai_factions.get(&id.to_string()).map(|a| &a.stats),
            FactionId::Zombie => None,
        }
    }

    pub fn stats_mut(&mut self, id: &FactionId) -> Option<&mut FactionStats> {
        match id {
            FactionId::Human(pid) => self.players.get_mut(pid).map(|p| &mut p.stats),
            FactionId::Ai(_) => self
                .ai_factions
                .get_mut(&id.to_string())
                .map(|a| &mut a.stats),
            FactionId::Zombie => None,
        }
    }

    /// Every faction that takes part in the economy, humans first.
    pub fn economic_factions(&self) -> Vec<FactionId> {
        self.players
            .values()
            .map(|p| p.id.clone())
            .chain(self.ai_factions.values().map(|a| a.id.clone()))
            .collect()
    }

    pub fn ai_ids(&self) -> Vec<FactionId> {
        self.ai_factions.values().map(|a| a.id.clone()).collect()
    }

    /// Replace the AI roster with fresh factions built from the map definition.
    /// Ids are assigned `ai-1`, `ai-2`, ... in definition order.
    pub fn install_ai(&mut self, defs: &[AiFactionDef]) {
        self.ai_factions.clear();
        for (i, def) in defs.iter().enumerate() {
            let id = FactionId::Ai(i as u32 + 1);
            self.ai_factions.insert(
                id.to_string(),
                AiFaction {
                    id,
                    name: def.name.clone(),
                    color: def.color.clone(),
                    stats: FactionStats::ai_defaults(),
                    is_ai: true,
                },
            );
        }
    }

    pub fn clear_ai(&mut self) {
        self.ai_factions.clear();
    }

    /// Restore every human to join-time stats so a new match starts level.
    pub fn reset_players(&mut self) {
        for player in self.players.values_mut() {
            player.stats = FactionStats::human_defaults();
            player.spawn_selected = false;
        }
    }
}

fn sanitize_name(name: &str) -> String {
    let trimmed: String = name.trim().chars().take(20).collect();
    if trimmed.is_empty() {
        "Survivor".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faction_id_wire_form() {
        assert_eq!(FactionId::Zombie.to_string(), "zombie");
        assert_eq!(FactionId::Ai(2).to_string(), "ai-2");
        assert_eq!(FactionId::human("abc").to_string(), "abc");

        assert_eq!("zombie".parse::<FactionId>().unwrap(), FactionId::Zombie);
        assert_eq!("ai-3".parse::<FactionId>().unwrap(), FactionId::Ai(3));
        assert_eq!(
            "f00d".parse::<FactionId>().unwrap(),
            FactionId::human("f00d")
        );
        assert!("".parse::<FactionId>().is_err());
        assert!("ai-x".parse::<FactionId>().is_err());
    }

    #[test]
    fn test_faction_id_serde() {
        let json = serde_json::to_string(&Some(FactionId::Ai(1))).unwrap();
        assert_eq!(json, "\"ai-1\"");
        let back: Option<FactionId> = serde_json::from_str("\"zombie\"").unwrap();
        assert_eq!(back, Some(FactionId::Zombie));
    }

    #[test]
    fn test_join_assigns_defaults_and_colors() {
        let mut ledger = FactionLedger::new();
        let p = ledger.join("p1", "Alice").unwrap().clone();
        assert_eq!(p.name, "Alice");
        assert_eq!(p.color, PLAYER_COLORS[0]);
        assert_eq!(p.stats.population, START_POPULATION);
        assert_eq!(p.stats.army, START_ARMY);
        assert_eq!(p.stats.gold, START_GOLD);
        assert_eq!(p.troop_percentage, DEFAULT_TROOP_PERCENTAGE);
        assert!(!p.spawn_selected);

        let q = ledger.join("p2", "Bob").unwrap();
        assert_eq!(q.color, PLAYER_COLORS[1]);
    }

    #[test]
    fn test_join_twice_is_rejected() {
        let mut ledger = FactionLedger::new();
        assert!(ledger.join("p1", "Alice").is_ok());
        assert_eq!(ledger.join("p1", "Again").unwrap_err(), JoinError::AlreadyJoined);
        assert_eq!(ledger.player("p1").unwrap().name, "Alice");
    }

    #[test]
    fn test_reserved_ids_cannot_join() {
        let mut ledger = FactionLedger::new();
        for id in ["zombie", "ai-1", "ai-x", ""] {
            assert_eq!(
                ledger.join(id, "Impostor").unwrap_err(),
                JoinError::ReservedId(id.to_string())
            );
        }
        assert!(ledger.players().is_empty());
        // Only the exact tag forms are reserved
        assert!(ledger.join("zombies", "Fan").is_ok());
        assert!(ledger.join("aim-1", "Fan").is_ok());
    }

    #[test]
    fn test_colors_wrap_around() {
        let mut ledger = FactionLedger::new();
        for i in 0..PLAYER_COLORS.len() {
            ledger.join(&format!("p{i}"), "x").unwrap();
        }
        let wrapped = ledger.join("late", "x").unwrap();
        assert_eq!(wrapped.color, PLAYER_COLORS[0]);
    }

    #[test]
    fn test_name_sanitizing() {
        assert_eq!(sanitize_name("   "), "Survivor");
        assert_eq!(sanitize_name("  Zed "), "Zed");
        assert_eq!(sanitize_name(&"x".repeat(40)).len(), 20);
    }

    #[test]
    fn test_install_ai_and_stats_lookup() {
        let mut ledger = FactionLedger::new();
        ledger.install_ai(&[
            AiFactionDef {
                name: "North".into(),
                color: "#fff".into(),
                seeds: vec![],
            },
            AiFactionDef {
                name: "South".into(),
                color: "#000".into(),
                seeds: vec![],
            },
        ]);
        assert_eq!(ledger.ai_ids(), vec![FactionId::Ai(1), FactionId::Ai(2)]);
        let stats = ledger.stats(&FactionId::Ai(2)).unwrap();
        assert_eq!(stats.army, AI_START_ARMY);
        assert!(ledger.stats(&FactionId::Zombie).is_none());
        assert!(ledger.ai_factions()["ai-1"].is_ai);
    }

    #[test]
    fn test_committable_troops_floors() {
        let mut ledger = FactionLedger::new();
        ledger.join("p1", "A").unwrap();
        let p = ledger.player_mut("p1").unwrap();
        p.stats.army = 33;
        p.troop_percentage = 50;
        assert_eq!(p.committable_troops(), 16);
    }

    #[test]
    fn test_human_player_json_shape() {
        let mut ledger = FactionLedger::new();
        ledger.join("p1", "A").unwrap();
        let json = serde_json::to_value(ledger.player("p1").unwrap()).unwrap();
        assert_eq!(json["id"], "p1");
        assert_eq!(json["territoryCount"], 0);
        assert_eq!(json["troopPercentage"], 50);
        assert_eq!(json["spawnSelected"], false);
    }
}
