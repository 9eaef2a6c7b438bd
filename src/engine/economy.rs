// Per-tick growth for every human and AI faction.

use super::config::*;
use super::faction::{FactionId, FactionLedger, FactionStats};
use super::world::World;

/// What a faction's holdings contribute this tick.
#[derive(Debug, Clone, PartialEq)]
struct Holdings {
    territories: u32,
    growth_bonus: u32,
    cap_bonus: u32,
    gold_income: u32,
    trade_buildings: u32,
    army_multiplier: f64,
}

fn survey(world: &World, faction: &FactionId) -> Holdings {
    let mut holdings = Holdings {
        territories: 0,
        growth_bonus: 0,
        cap_bonus: 0,
        gold_income: 0,
        trade_buildings: 0,
        army_multiplier: 1.0,
    };
    for t in world.territories().iter().filter(|t| t.is_owned_by(faction)) {
        holdings.territories += 1;
        for effects in t.buildings.iter().map(|b| b.effects()) {
            holdings.growth_bonus += effects.growth_bonus;
            holdings.cap_bonus += effects.cap_bonus;
            holdings.gold_income += effects.gold_income;
            holdings.army_multiplier *= effects.army_multiplier;
            if effects.enables_trade {
                holdings.trade_buildings += 1;
            }
        }
    }
    holdings
}

fn grow(stats: &mut FactionStats, holdings: &Holdings) {
    let growth_rate = if u64::from(stats.army) * 2 < u64::from(stats.population) {
        GROWTH_RATE_HUNGRY
    } else {
        GROWTH_RATE_FULL
    };
    let cap = holdings.territories * POP_CAP_PER_TERRITORY + holdings.cap_bonus;
    let grown = stats.population + holdings.territories * growth_rate + holdings.growth_bonus;
    stats.population = grown.min(cap);
    stats.army =
        (f64::from(stats.population) * ARMY_RATIO * holdings.army_multiplier).floor() as u32;

    let trade_bonus = holdings.trade_buildings.saturating_sub(1) * TRADE_BONUS_PER_EXTRA;
    stats.gold += holdings.territories * GOLD_PER_TERRITORY + holdings.gold_income + trade_bonus;
}

/// Recount territories for every faction and grow the living ones.
pub fn update_economy(world: &mut World, ledger: &mut FactionLedger) {
    for faction in ledger.economic_factions() {
        let holdings = survey(world, &faction);
        let Some(stats) = ledger.stats_mut(&faction) else {
            continue;
        };
        stats.territory_count = holdings.territories;
        if holdings.territories == 0 {
            continue;
        }
        grow(stats, &holdings);

        for t in world.territories_mut().filter(|t| t.is_owned_by(&faction)) {
            if t.population < TERRITORY_POP_CEILING {
                t.population = (t.population + TERRITORY_REGEN).min(TERRITORY_POP_CEILING);
            }
        }
    }
}
