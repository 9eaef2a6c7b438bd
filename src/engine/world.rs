use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::config::*;
use super::faction::FactionId;

/// Map region tags. Humans spawn in the west, AI factions hold the center,
/// the horde rises in the east.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    West,
    Central,
    East,
}

/// Structures a faction can raise on a territory it owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildingKind {
    City,
    Factory,
    Fort,
    Market,
}

/// What a single building contributes to its owner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BuildingEffects {
    pub gold_cost: u32,
    pub defense_bonus: u32,
    pub gold_income: u32,
    pub growth_bonus: u32,
    pub cap_bonus: u32,
    pub army_multiplier: f64,
    pub enables_trade: bool,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 4] = [
        BuildingKind::City,
        BuildingKind::Factory,
        BuildingKind::Fort,
        BuildingKind::Market,
    ];

    pub fn effects(self) -> BuildingEffects {
        let none = BuildingEffects {
            gold_cost: 0,
            defense_bonus: 0,
            gold_income: 0,
            growth_bonus: 0,
            cap_bonus: 0,
            army_multiplier: 1.0,
            enables_trade: false,
        };
        match self {
            BuildingKind::City => BuildingEffects {
                gold_cost: 100,
                gold_income: 20,
                growth_bonus: 2,
                cap_bonus: 50,
                ..none
            },
            BuildingKind::Factory => BuildingEffects {
                gold_cost: 150,
                army_multiplier: 1.1,
                ..none
            },
            BuildingKind::Fort => BuildingEffects {
                gold_cost: 120,
                defense_bonus: 25,
                ..none
            },
            BuildingKind::Market => BuildingEffects {
                gold_cost: 80,
                gold_income: 5,
                enables_trade: true,
                ..none
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BuildingKind::City => "city",
            BuildingKind::Factory => "factory",
            BuildingKind::Fort => "fort",
            BuildingKind::Market => "market",
        }
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildingKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildingKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or(())
    }
}

/// One ownable (or water) region of the map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Territory {
    pub id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub owner_id: Option<FactionId>,
    pub population: u32,
    pub fill_progress: u32,
    pub defense: u32,
    pub buildings: Vec<BuildingKind>,
    pub is_water: bool,
    pub region: Region,
}

impl Territory {
    /// Strength an attacker has to beat to take this territory.
    pub fn defend_power(&self) -> u32 {
        let building_bonus: u32 = self
            .buildings
            .iter()
            .map(|b| b.effects().defense_bonus)
            .sum();
        self.population + self.defense * DEFENSE_POWER_PER_LEVEL + building_bonus
    }

    pub fn is_owned_by(&self, faction: &FactionId) -> bool {
        self.owner_id.as_ref() == Some(faction)
    }

    pub fn is_human_owned(&self) -> bool {
        self.owner_id.as_ref().is_some_and(FactionId::is_human)
    }

    pub fn has_building(&self, kind: BuildingKind) -> bool {
        self.buildings.contains(&kind)
    }

    /// Hand the territory to a new owner at full fill.
    pub fn claim(&mut self, owner: FactionId, population: u32) {
        self.owner_id = Some(owner);
        self.population = population;
        self.fill_progress = 100;
    }

    /// Return the territory to the wilds.
    pub fn release(&mut self) {
        self.owner_id = None;
        self.population = 0;
        self.fill_progress = 0;
    }

    /// Zombie captures leave nothing standing.
    pub fn raze(&mut self) {
        self.defense = 0;
        self.buildings.clear();
    }

    fn distance_to(&self, other: &Territory) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

/// Errors raised while loading or validating a map definition.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("failed to read map file: {0}")]
    Io(#[from] std::io::Error),
    #[error("map JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("map has no territories")]
    Empty,
    #[error("AI faction '{faction}' seeds unknown territory {seed}")]
    SeedOutOfRange { faction: String, seed: u32 },
    #[error("AI faction '{faction}' seeds territory {seed} outside the central region")]
    SeedOutsideAiRegion { faction: String, seed: u32 },
    #[error("AI faction '{faction}' seeds water territory {seed}")]
    SeedIsWater { faction: String, seed: u32 },
    #[error("territory {0} is seeded by more than one AI faction")]
    DuplicateSeed(u32),
    #[error(
        "AI faction '{faction}' has {count} seeds, expected {min} to {max}",
        min = AI_MIN_SEEDS,
        max = AI_MAX_SEEDS
    )]
    SeedCount { faction: String, count: usize },
    #[error("map has no eastern land for the horde")]
    NoHordeNest,
}

/// Static description of a territory in a map definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerritoryDef {
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub region: Region,
    #[serde(default)]
    pub water: bool,
}

/// AI faction roster entry: who it is and which territories it starts with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiFactionDef {
    pub name: String,
    pub color: String,
    pub seeds: Vec<u32>,
}

/// A playable map. Territory ids are their index in `territories`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDefinition {
    pub name: String,
    pub territories: Vec<TerritoryDef>,
    #[serde(default)]
    pub ai_factions: Vec<AiFactionDef>,
}

impl MapDefinition {
    /// Parse and validate a JSON map definition.
    pub fn from_json(json: &str) -> Result<Self, MapError> {
        let map: MapDefinition = serde_json::from_str(json)?;
        map.validate()?;
        Ok(map)
    }

    /// Load a JSON map definition from disk.
    pub fn load(path: &Path) -> Result<Self, MapError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<(), MapError> {
        if self.territories.is_empty() {
            return Err(MapError::Empty);
        }
        if !self
            .territories
            .iter()
            .any(|t| t.region == Region::East && !t.water)
        {
            return Err(MapError::NoHordeNest);
        }
        let mut seen = HashSet::new();
        for faction in &self.ai_factions {
            for &seed in &faction.seeds {
                let def = self.territories.get(seed as usize).ok_or_else(|| {
                    MapError::SeedOutOfRange {
                        faction: faction.name.clone(),
                        seed,
                    }
                })?;
                if def.water {
                    return Err(MapError::SeedIsWater {
                        faction: faction.name.clone(),
                        seed,
                    });
                }
                if def.region != Region::Central {
                    return Err(MapError::SeedOutsideAiRegion {
                        faction: faction.name.clone(),
                        seed,
                    });
                }
                if !seen.insert(seed) {
                    return Err(MapError::DuplicateSeed(seed));
                }
            }
            let count = faction.seeds.len();
            if !(AI_MIN_SEEDS..=AI_MAX_SEEDS).contains(&count) {
                return Err(MapError::SeedCount {
                    faction: faction.name.clone(),
                    count,
                });
            }
        }
        Ok(())
    }

    /// The built-in Europe layout.
    pub fn europe() -> Self {
        use Region::*;
        let land: [(&str, i32, i32, Region); 37] = [
            ("Portugal", 250, 450, West),
            ("Spain", 350, 450, West),
            ("France", 450, 400, West),
            ("UK", 400, 300, West),
            ("Ireland", 350, 280, West),
            ("Belgium", 480, 350, West),
            ("Netherlands", 500, 320, West),
            ("Switzerland", 520, 420, West),
            ("Italy", 600, 480, West),
            ("Germany", 580, 360, West),
            ("Austria", 650, 420, Central),
            ("Czech Rep.", 680, 380, Central),
            ("Poland", 750, 350, Central),
            ("Hungary", 750, 430, Central),
            ("Croatia", 700, 470, Central),
            ("Serbia", 760, 480, Central),
            ("Bosnia", 720, 480, Central),
            ("Norway", 580, 200, West),
            ("Sweden", 680, 220, Central),
            ("Finland", 780, 200, Central),
            ("Denmark", 580, 300, West),
            ("Estonia", 800, 250, Central),
            ("Latvia", 820, 280, Central),
            ("Lithuania", 800, 310, Central),
            ("Belarus", 850, 320, Central),
            ("Ukraine", 900, 380, Central),
            ("Moldova", 880, 430, Central),
            ("Romania", 820, 460, Central),
            ("Bulgaria", 820, 500, Central),
            ("Russia-W", 950, 300, East),
            ("Russia-C", 1050, 280, East),
            ("Russia-E", 1150, 260, East),
            ("Greece", 800, 520, Central),
            ("Albania", 760, 510, Central),
            ("N.Macedonia", 790, 500, Central),
            ("Turkey-W", 880, 530, Central),
            ("Turkey-E", 980, 540, East),
        ];
        let water: [(&str, i32, i32, Region); 5] = [
            ("North Sea", 470, 250, West),
            ("Bay of Biscay", 320, 380, West),
            ("Baltic Sea", 700, 290, Central),
            ("Mediterranean", 560, 550, West),
            ("Black Sea", 940, 460, East),
        ];

        let mut territories: Vec<TerritoryDef> = land
            .iter()
            .map(|&(name, x, y, region)| TerritoryDef {
                name: name.to_string(),
                x,
                y,
                region,
                water: false,
            })
            .collect();
        territories.extend(water.iter().map(|&(name, x, y, region)| TerritoryDef {
            name: name.to_string(),
            x,
            y,
            region,
            water: true,
        }));

        MapDefinition {
            name: "Europe".to_string(),
            territories,
            ai_factions: vec![
                AiFactionDef {
                    name: "Habsburg League".to_string(),
                    color: "#9b59b6".to_string(),
                    seeds: vec![10, 11, 13],
                },
                AiFactionDef {
                    name: "Nordic Union".to_string(),
                    color: "#e67e22".to_string(),
                    seeds: vec![18, 19],
                },
                AiFactionDef {
                    name: "Balkan Pact".to_string(),
                    color: "#16a085".to_string(),
                    seeds: vec![15, 27, 28],
                },
            ],
        }
    }
}

/// The territory graph: every territory plus the derived adjacency lists.
#[derive(Debug, Clone)]
pub struct World {
    pub map_name: String,
    territories: Vec<Territory>,
    adjacency: Vec<Vec<u32>>,
}

impl World {
    /// Fresh, unowned world from a map definition.
    pub fn from_definition(map: &MapDefinition) -> Self {
        let territories = map
            .territories
            .iter()
            .enumerate()
            .map(|(i, def)| Territory {
                id: i as u32,
                name: def.name.clone(),
                x: def.x,
                y: def.y,
                owner_id: None,
                population: 0,
                fill_progress: 0,
                defense: 0,
                buildings: Vec::new(),
                is_water: def.water,
                region: def.region,
            })
            .collect();
        Self::from_territories(map.name.clone(), territories)
    }

    /// Build a world from existing territory records (e.g. a snapshot).
    /// Adjacency is recomputed from positions.
    pub fn from_territories(map_name: String, mut territories: Vec<Territory>) -> Self {
        territories.sort_by_key(|t| t.id);
        let adjacency = territories
            .iter()
            .map(|a| {
                territories
                    .iter()
                    .filter(|b| b.id != a.id && a.distance_to(b) < ADJACENCY_DISTANCE)
                    .map(|b| b.id)
                    .collect()
            })
            .collect();
        World {
            map_name,
            territories,
            adjacency,
        }
    }

    fn index_of(&self, id: u32) -> Option<usize> {
        let idx = id as usize;
        match self.territories.get(idx) {
            Some(t) if t.id == id => Some(idx),
            _ => self.territories.iter().position(|t| t.id == id),
        }
    }

    pub fn territories(&self) -> &[Territory] {
        &self.territories
    }

    pub fn territories_mut(&mut self) -> impl Iterator<Item = &mut Territory> {
        self.territories.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.territories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.territories.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&Territory> {
        self.index_of(id).map(|i| &self.territories[i])
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut Territory> {
        self.index_of(id).map(move |i| &mut self.territories[i])
    }

    /// Ids of the territories within reach of `id`.
    pub fn neighbours(&self, id: u32) -> &[u32] {
        self.index_of(id)
            .map(|i| self.adjacency[i].as_slice())
            .unwrap_or(&[])
    }

    pub fn is_adjacent(&self, a: u32, b: u32) -> bool {
        self.neighbours(a).contains(&b)
    }

    /// Ids of everything `faction` owns, in id order.
    pub fn owned_by(&self, faction: &FactionId) -> Vec<u32> {
        self.territories
            .iter()
            .filter(|t| t.is_owned_by(faction))
            .map(|t| t.id)
            .collect()
    }

    pub fn count_owned(&self, faction: &FactionId) -> u32 {
        self.territories
            .iter()
            .filter(|t| t.is_owned_by(faction))
            .count() as u32
    }

    /// Whether `faction` holds any territory bordering `target`.
    pub fn borders(&self, faction: &FactionId, target: u32) -> bool {
        self.neighbours(target).iter().any(|&n| {
            self.get(n)
                .is_some_and(|t| t.is_owned_by(faction))
        })
    }

    /// Reset everything `faction` still holds to unowned. Returns how many were released.
    pub fn release_all(&mut self, faction: &FactionId) -> usize {
        let mut released = 0;
        for t in self.territories.iter_mut().filter(|t| t.is_owned_by(faction)) {
            t.release();
            released += 1;
        }
        released
    }
}
