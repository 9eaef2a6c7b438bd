// Balance constants for the conquest simulation.

// Territory limits
pub const MAX_DEFENSE: u32 = 5;
pub const MAX_BUILDINGS: usize = 2;
pub const DEFENSE_POWER_PER_LEVEL: u32 = 15;
pub const TERRITORY_POP_CEILING: u32 = 100;

// Adjacency threshold between territory centers (map units)
pub const ADJACENCY_DISTANCE: f64 = 180.0;

// Human defaults
pub const START_POPULATION: u32 = 100;
pub const START_ARMY: u32 = 50;
pub const START_GOLD: u32 = 100;
pub const DEFAULT_TROOP_PERCENTAGE: u32 = 50;
pub const SPAWN_POPULATION: u32 = 60;

// AI defaults
pub const AI_START_POPULATION: u32 = 150;
pub const AI_START_ARMY: u32 = 75;
pub const AI_SEED_POPULATION: u32 = 60;
pub const AI_MIN_SEEDS: usize = 2;
pub const AI_MAX_SEEDS: usize = 3;
pub const AI_MIN_ARMY: u32 = 30;
pub const AI_COMMIT_PERCENT: u32 = 30;

// Combat
pub const MIN_ATTACK_TROOPS: u32 = 10;
pub const CAPTURE_YIELD_PERCENT: u32 = 60;
pub const FAILED_ATTACK_DAMAGE_PERCENT: u32 = 40;
pub const FILL_RATE_MIN: u32 = 10;
pub const FILL_RATE_MAX: u32 = 50;
pub const FILL_RATE_TROOP_DIVISOR: u32 = 20;
pub const DEFENSE_COST_ARMY: u32 = 30;

// Economy
pub const GROWTH_RATE_HUNGRY: u32 = 5;
pub const GROWTH_RATE_FULL: u32 = 3;
pub const POP_CAP_PER_TERRITORY: u32 = 150;
pub const ARMY_RATIO: f64 = 0.6;
pub const GOLD_PER_TERRITORY: u32 = 2;
pub const TRADE_BONUS_PER_EXTRA: u32 = 10;
pub const TERRITORY_REGEN: u32 = 2;

// Zombie horde
pub const ZOMBIE_TAG: &str = "zombie";
pub const ZOMBIE_SEED_COUNT: usize = 6;
pub const ZOMBIE_SEED_POPULATION: u32 = 60;
pub const ZOMBIE_CONVERT_POPULATION: u32 = 50;
pub const ZOMBIE_ROLL_MIN: u32 = 50;
pub const ZOMBIE_ROLL_MAX: u32 = 80;
pub const ZOMBIE_FAILED_DAMAGE_PERCENT: u32 = 30;
pub const ZOMBIE_DEFENSE_FLOOR: u32 = 20;
pub const ZOMBIE_WIN_COST: u32 = 20;
pub const ZOMBIE_LOSS_COST: u32 = 10;
pub const ZOMBIE_REGEN: u32 = 1;
pub const ZOMBIE_MAX_TERRITORIES: usize = 25;

// Player colors, assigned round-robin on join
pub const PLAYER_COLORS: [&str; 9] = [
    "#e63946", "#457b9d", "#2a9d8f", "#e9c46a", "#f4a261", "#d62828", "#003049", "#06aed5",
    "#7209b7",
];

// Replay sampling (every Nth playing tick)
pub const REPLAY_SAMPLE_INTERVAL: u64 = 10;

/// `value * percent / 100`, rounded down.
pub fn percent_of(value: u32, percent: u32) -> u32 {
    (u64::from(value) * u64::from(percent) / 100) as u32
}
