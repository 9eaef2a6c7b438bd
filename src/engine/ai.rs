// AI factions: occasional opportunistic expansion. They never attack humans.

use rand::seq::SliceRandom;
use rand::Rng;

use super::attack::AttackQueue;
use super::config::*;
use super::faction::{FactionId, FactionLedger};
use super::world::{AiFactionDef, World};

/// Hand every AI faction its designated seed territories. Ids follow `install_ai`.
pub fn seed_factions(world: &mut World, ledger: &mut FactionLedger, defs: &[AiFactionDef]) {
    for (i, def) in defs.iter().enumerate() {
        let faction = FactionId::Ai(i as u32 + 1);
        let mut owned = 0;
        for &seed in &def.seeds {
            if let Some(t) = world.get_mut(seed) {
                t.claim(faction.clone(), AI_SEED_POPULATION);
                owned += 1;
            }
        }
        if let Some(stats) = ledger.stats_mut(&faction) {
            stats.territory_count = owned;
        }
    }
}

/// Candidate targets for `faction` expanding out of `source`.
fn expansion_targets(
    world: &World,
    attacks: &AttackQueue,
    faction: &FactionId,
    source: u32,
) -> Vec<u32> {
    world
        .neighbours(source)
        .iter()
        .copied()
        .filter(|&id| {
            world.get(id).is_some_and(|t| {
                !t.is_water && !t.is_owned_by(faction) && !t.is_human_owned()
            }) && !attacks.contains(faction, id)
        })
        .collect()
}

/// Let every AI faction consider launching one attack. Returns how many were launched.
pub fn run_ai_director<R: Rng + ?Sized>(
    world: &World,
    ledger: &mut FactionLedger,
    attacks: &mut AttackQueue,
    rng: &mut R,
    action_chance: f64,
) -> usize {
    let mut launched = 0;
    for faction in ledger.ai_ids() {
        if rng.gen::<f64>() >= action_chance {
            continue;
        }
        let Some(stats) = ledger.stats_mut(&faction) else {
            continue;
        };
        if stats.army <= AI_MIN_ARMY {
            continue;
        }
        let owned = world.owned_by(&faction);
        let Some(&source) = owned.choose(rng) else {
            continue;
        };
        let targets = expansion_targets(world, attacks, &faction, source);
        let Some(&target) = targets.choose(rng) else {
            continue;
        };
        let troops = percent_of(stats.army, AI_COMMIT_PERCENT);
        if troops < MIN_ATTACK_TROOPS {
            continue;
        }
        if attacks.launch(faction.clone(), target, troops, stats).is_some() {
            tracing::debug!(faction = %faction, source, target, troops, "AI attack launched");
            launched += 1;
        }
    }
    launched
}
