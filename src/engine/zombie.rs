// The zombie horde: spreads west out of its eastern seeds, razing what it takes.

use rand::seq::SliceRandom;
use rand::Rng;

use super::attack::record_loss;
use super::config::*;
use super::faction::{FactionId, FactionLedger};
use super::world::{Region, World};
use crate::metrics;

/// What the horde did this tick, if anything.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ZombieAction {
    Converted {
        territory_id: u32,
    },
    Overran {
        territory_id: u32,
        previous_owner: FactionId,
        eliminated: bool,
    },
    Repelled {
        territory_id: u32,
        damage: u32,
    },
}

/// Give each of the first `ZOMBIE_SEED_COUNT` eastern land territories to the horde.
pub fn seed_horde(world: &mut World) -> usize {
    let mut seeded = 0;
    for t in world
        .territories_mut()
        .filter(|t| t.region == Region::East && !t.is_water && t.owner_id.is_none())
        .take(ZOMBIE_SEED_COUNT)
    {
        t.claim(FactionId::Zombie, ZOMBIE_SEED_POPULATION);
        seeded += 1;
    }
    seeded
}

/// Maybe push the horde one territory further. At most one action per call.
pub fn run_zombie_director<R: Rng + ?Sized>(
    world: &mut World,
    ledger: &mut FactionLedger,
    rng: &mut R,
    action_chance: f64,
) -> Option<ZombieAction> {
    if rng.gen::<f64>() >= action_chance {
        return None;
    }
    let horde = world.owned_by(&FactionId::Zombie);
    if horde.is_empty() || horde.len() >= ZOMBIE_MAX_TERRITORIES {
        return None;
    }
    let source_id = *horde.choose(rng)?;
    let source_x = world.get(source_id)?.x;

    let targets: Vec<u32> = world
        .neighbours(source_id)
        .iter()
        .copied()
        .filter(|&id| {
            world.get(id).is_some_and(|t| {
                !t.is_water && !t.is_owned_by(&FactionId::Zombie) && t.x <= source_x
            })
        })
        .collect();
    let target_id = *targets.choose(rng)?;

    let target = world.get_mut(target_id)?;
    let Some(previous_owner) = target.owner_id.clone() else {
        target.claim(FactionId::Zombie, ZOMBIE_CONVERT_POPULATION);
        metrics::ZOMBIE_CONVERSIONS_TOTAL.inc();
        tracing::debug!(territory = target_id, "Horde spread into empty land");
        return Some(ZombieAction::Converted {
            territory_id: target_id,
        });
    };

    let roll = rng.gen_range(ZOMBIE_ROLL_MIN..ZOMBIE_ROLL_MAX);
    let defend_power = target.defend_power();

    if roll > defend_power {
        target.claim(FactionId::Zombie, roll - defend_power);
        target.raze();
        drain_source(world, source_id, ZOMBIE_WIN_COST);
        let eliminated = record_loss(world, ledger, &previous_owner);
        metrics::ZOMBIE_CONVERSIONS_TOTAL.inc();
        tracing::debug!(territory = target_id, victim = %previous_owner, roll, "Horde overran territory");
        Some(ZombieAction::Overran {
            territory_id: target_id,
            previous_owner,
            eliminated,
        })
    } else {
        let damage = percent_of(roll, ZOMBIE_FAILED_DAMAGE_PERCENT);
        target.population = target.population.saturating_sub(damage);
        if target.population < ZOMBIE_DEFENSE_FLOOR {
            target.defense = target.defense.saturating_sub(1);
        }
        drain_source(world, source_id, ZOMBIE_LOSS_COST);
        Some(ZombieAction::Repelled {
            territory_id: target_id,
            damage,
        })
    }
}

fn drain_source(world: &mut World, source_id: u32, cost: u32) {
    if let Some(source) = world.get_mut(source_id) {
        source.population = source.population.saturating_sub(cost);
    }
}

/// Zombie territories slowly refill toward the ceiling.
pub fn regenerate_horde(world: &mut World) {
    for t in world
        .territories_mut()
        .filter(|t| t.is_owned_by(&FactionId::Zombie))
    {
        if t.population < TERRITORY_POP_CEILING {
            t.population = (t.population + ZOMBIE_REGEN).min(TERRITORY_POP_CEILING);
        }
    }
}
