// Progressive ("fill-based") attacks: queued when launched, resolved once the fill completes.

use serde::{Deserialize, Serialize};

use super::config::*;
use super::faction::{FactionId, FactionLedger, FactionStats};
use super::world::World;
use crate::metrics;

/// An attack that is still filling.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveAttack {
    pub id: u64,
    pub attacker_id: FactionId,
    pub territory_id: u32,
    pub troops_committed: u32,
    pub progress: u32,
    pub fill_rate_per_tick: u32,
}

/// Progress per tick for an attack of `troops`. Bigger waves fill faster;
/// AI factions fill at half speed.
pub fn fill_rate(troops: u32, attacker: &FactionId) -> u32 {
    let base = (FILL_RATE_MIN + troops / FILL_RATE_TROOP_DIVISOR).min(FILL_RATE_MAX);
    if attacker.is_ai() {
        (base / 2).max(1)
    } else {
        base
    }
}

/// How a completed attack played out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Captured {
        previous_owner: Option<FactionId>,
        eliminated: bool,
    },
    Repelled {
        damage: u32,
    },
    Reinforced,
    /// The target went to another human while the attack was filling. The troops are lost.
    Forfeited,
    Vanished,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAttack {
    pub attack: ActiveAttack,
    pub resolution: Resolution,
}

/// In-flight attacks, at most one per (attacker, territory) pair.
#[derive(Debug)]
pub struct AttackQueue {
    attacks: Vec<ActiveAttack>,
    next_id: u64,
}

impl AttackQueue {
    pub fn new() -> Self {
        AttackQueue {
            attacks: Vec::new(),
            next_id: 1,
        }
    }

    /// Rebuild a queue from snapshot records. Later duplicates of a pair are dropped.
    pub fn from_attacks(attacks: Vec<ActiveAttack>) -> Self {
        let mut queue = AttackQueue::new();
        for attack in attacks {
            if queue.contains(&attack.attacker_id, attack.territory_id) {
                continue;
            }
            queue.next_id = queue.next_id.max(attack.id + 1);
            queue.attacks.push(attack);
        }
        queue
    }

    pub fn contains(&self, attacker: &FactionId, territory_id: u32) -> bool {
        self.attacks
            .iter()
            .any(|a| &a.attacker_id == attacker && a.territory_id == territory_id)
    }

    /// Queue a new attack, debiting `troops` from the attacker's army in the same step.
    /// Returns the attack id, or `None` if the pair is already filling.
    pub fn launch(
        &mut self,
        attacker: FactionId,
        territory_id: u32,
        troops: u32,
        stats: &mut FactionStats,
    ) -> Option<u64> {
        if self.contains(&attacker, territory_id) {
            return None;
        }
        stats.army = stats.army.saturating_sub(troops);
        let id = self.next_id;
        self.next_id += 1;
        let fill_rate_per_tick = fill_rate(troops, &attacker);
        self.attacks.push(ActiveAttack {
            id,
            attacker_id: attacker,
            territory_id,
            troops_committed: troops,
            progress: 0,
            fill_rate_per_tick,
        });
        Some(id)
    }

    pub fn as_slice(&self) -> &[ActiveAttack] {
        &self.attacks
    }

    pub fn len(&self) -> usize {
        self.attacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attacks.is_empty()
    }

    pub fn clear(&mut self) {
        self.attacks.clear();
    }

    /// Drop every attack launched by `attacker`. Committed troops are lost.
    pub fn drop_attacker(&mut self, attacker: &FactionId) -> usize {
        let before = self.attacks.len();
        self.attacks.retain(|a| &a.attacker_id != attacker);
        before - self.attacks.len()
    }

    /// Advance every fill by one tick and pull out those that completed, in queue order.
    fn advance(&mut self) -> Vec<ActiveAttack> {
        for attack in &mut self.attacks {
            attack.progress = (attack.progress + attack.fill_rate_per_tick).min(100);
        }
        let (done, pending): (Vec<_>, Vec<_>) =
            self.attacks.drain(..).partition(|a| a.progress >= 100);
        self.attacks = pending;
        done
    }
}

/// Bookkeeping for a faction that just lost a territory. If that was its last one,
/// everything it still holds is released. Returns whether the faction was eliminated.
pub(crate) fn record_loss(world: &mut World, ledger: &mut FactionLedger, loser: &FactionId) -> bool {
    let Some(stats) = ledger.stats_mut(loser) else {
        return false;
    };
    stats.territory_count = stats.territory_count.saturating_sub(1);
    if stats.territory_count > 0 {
        return false;
    }
    let released = world.release_all(loser);
    metrics::ELIMINATIONS_TOTAL
        .with_label_values(&[loser.kind_label()])
        .inc();
    tracing::info!(faction = %loser, released, "Faction eliminated");
    true
}

/// Advance all fills and resolve the attacks that completed this tick.
pub fn resolve_attacks(
    world: &mut World,
    ledger: &mut FactionLedger,
    queue: &mut AttackQueue,
) -> Vec<ResolvedAttack> {
    queue
        .advance()
        .into_iter()
        .map(|attack| {
            let resolution = resolve_one(world, ledger, &attack);
            tracing::debug!(
                attack_id = attack.id,
                attacker = %attack.attacker_id,
                territory = attack.territory_id,
                troops = attack.troops_committed,
                ?resolution,
                "Attack resolved"
            );
            ResolvedAttack { attack, resolution }
        })
        .collect()
}

fn resolve_one(world: &mut World, ledger: &mut FactionLedger, attack: &ActiveAttack) -> Resolution {
    let Some(target) = world.get_mut(attack.territory_id) else {
        return Resolution::Vanished;
    };
    let troops = attack.troops_committed;

    if target.is_owned_by(&attack.attacker_id) {
        target.population += troops;
        return Resolution::Reinforced;
    }
    if target.is_human_owned() {
        return Resolution::Forfeited;
    }

    let defend_power = target.defend_power();
    if troops <= defend_power {
        let damage = percent_of(troops, FAILED_ATTACK_DAMAGE_PERCENT);
        target.population = target.population.saturating_sub(damage);
        return Resolution::Repelled { damage };
    }

    let previous_owner = target.owner_id.clone();
    let population = percent_of(troops - defend_power, CAPTURE_YIELD_PERCENT);
    target.claim(attack.attacker_id.clone(), population);

    if let Some(stats) = ledger.stats_mut(&attack.attacker_id) {
        stats.territory_count += 1;
    }
    metrics::CAPTURES_TOTAL
        .with_label_values(&[attack.attacker_id.kind_label()])
        .inc();

    let eliminated = match &previous_owner {
        Some(prev) if *prev != FactionId::Zombie => record_loss(world, ledger, prev),
        _ => false,
    };

    Resolution::Captured {
        previous_owner,
        eliminated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::world::MapDefinition;

    fn setup() -> (World, FactionLedger, AttackQueue) {
        let world = World::from_definition(&MapDefinition::europe());
        let mut ledger = FactionLedger::new();
        ledger.join("p1", "Attacker").unwrap();
        ledger.join("p2", "Defender").unwrap();
        (world, ledger, AttackQueue::new())
    }

    fn launch(queue: &mut AttackQueue, ledger: &mut FactionLedger, who: &str, target: u32, troops: u32) {
        let id = FactionId::human(who);
        let stats = ledger.stats_mut(&id).unwrap();
        queue.launch(id, target, troops, stats).unwrap();
    }

    fn run_to_completion(
        world: &mut World,
        ledger: &mut FactionLedger,
        queue: &mut AttackQueue,
    ) -> Vec<ResolvedAttack> {
        for _ in 0..100 {
            let done = resolve_attacks(world, ledger, queue);
            if !done.is_empty() {
                return done;
            }
        }
        panic!("attack never resolved");
    }

    #[test]
    fn test_fill_rate_bounds_and_ai_handicap() {
        let human = FactionId::human("h");
        assert_eq!(fill_rate(0, &human), FILL_RATE_MIN);
        assert_eq!(fill_rate(100, &human), 15);
        assert_eq!(fill_rate(10_000, &human), FILL_RATE_MAX);
        assert!(fill_rate(100, &FactionId::Ai(1)) < fill_rate(100, &human));
        assert!(fill_rate(0, &FactionId::Ai(1)) > 0);
    }

    #[test]
    fn test_launch_debits_army_and_rejects_duplicates() {
        let (_, mut ledger, mut queue) = setup();
        let id = FactionId::human("p1");
        let stats = ledger.stats_mut(&id).unwrap();
        stats.army = 100;
        assert!(queue.launch(id.clone(), 3, 40, stats).is_some());
        assert_eq!(stats.army, 60);
        assert!(queue.launch(id.clone(), 3, 40, stats).is_none());
        assert_eq!(stats.army, 60);
        assert_eq!(queue.len(), 1);
        // Different territory is fine
        assert!(queue.launch(id, 4, 10, stats).is_some());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_attack_persists_until_filled() {
        let (mut world, mut ledger, mut queue) = setup();
        launch(&mut queue, &mut ledger, "p1", 5, 50);
        let rate = queue.as_slice()[0].fill_rate_per_tick;
        let ticks_needed = 100u32.div_ceil(rate);
        for _ in 0..ticks_needed - 1 {
            assert!(resolve_attacks(&mut world, &mut ledger, &mut queue).is_empty());
        }
        assert_eq!(queue.len(), 1);
        let done = resolve_attacks(&mut world, &mut ledger, &mut queue);
        assert_eq!(done.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capture_unowned() {
        let (mut world, mut ledger, mut queue) = setup();
        launch(&mut queue, &mut ledger, "p1", 5, 50);
        let done = run_to_completion(&mut world, &mut ledger, &mut queue);
        assert_eq!(
            done[0].resolution,
            Resolution::Captured {
                previous_owner: None,
                eliminated: false
            }
        );
        let t = world.get(5).unwrap();
        assert!(t.is_owned_by(&FactionId::human("p1")));
        assert_eq!(t.population, 30);
        assert_eq!(t.fill_progress, 100);
        assert_eq!(ledger.player("p1").unwrap().stats.territory_count, 1);
    }

    #[test]
    fn test_failed_attack_damages_defender() {
        let (mut world, mut ledger, mut queue) = setup();
        world.get_mut(5).unwrap().claim(FactionId::human("p2"), 50);
        launch(&mut queue, &mut ledger, "p1", 5, 10);
        let done = run_to_completion(&mut world, &mut ledger, &mut queue);
        assert_eq!(done[0].resolution, Resolution::Repelled { damage: 4 });
        let t = world.get(5).unwrap();
        assert_eq!(t.population, 46);
        assert!(t.is_owned_by(&FactionId::human("p2")));
    }

    #[test]
    fn test_tie_goes_to_defender() {
        let (mut world, mut ledger, mut queue) = setup();
        world.get_mut(5).unwrap().population = 20;
        launch(&mut queue, &mut ledger, "p1", 5, 20);
        let done = run_to_completion(&mut world, &mut ledger, &mut queue);
        assert_eq!(done[0].resolution, Resolution::Repelled { damage: 8 });
        assert!(world.get(5).unwrap().owner_id.is_none());
    }

    #[test]
    fn test_capture_of_last_territory_cascades() {
        let (mut world, mut ledger, mut queue) = setup();
        let defender = FactionId::Ai(1);
        ledger.install_ai(&MapDefinition::europe().ai_factions);
        world.get_mut(5).unwrap().claim(defender.clone(), 0);
        ledger.stats_mut(&defender).unwrap().territory_count = 1;

        launch(&mut queue, &mut ledger, "p1", 5, 50);
        let done = run_to_completion(&mut world, &mut ledger, &mut queue);
        assert_eq!(
            done[0].resolution,
            Resolution::Captured {
                previous_owner: Some(defender.clone()),
                eliminated: true
            }
        );
        assert_eq!(ledger.stats(&defender).unwrap().territory_count, 0);
        // The record survives elimination
        assert!(ledger.ai_factions().contains_key("ai-1"));
    }

    #[test]
    fn test_cascade_releases_stale_holdings() {
        let (mut world, mut ledger, _) = setup();
        let p2 = FactionId::human("p2");
        world.get_mut(1).unwrap().claim(p2.clone(), 40);
        ledger.stats_mut(&p2).unwrap().territory_count = 1;
        assert!(record_loss(&mut world, &mut ledger, &p2));
        assert_eq!(world.count_owned(&p2), 0);
        assert_eq!(world.get(1).unwrap().population, 0);
    }

    #[test]
    fn test_zombie_loss_has_no_bookkeeping() {
        let (mut world, mut ledger, mut queue) = setup();
        world.get_mut(5).unwrap().claim(FactionId::Zombie, 10);
        launch(&mut queue, &mut ledger, "p1", 5, 50);
        let done = run_to_completion(&mut world, &mut ledger, &mut queue);
        assert_eq!(
            done[0].resolution,
            Resolution::Captured {
                previous_owner: Some(FactionId::Zombie),
                eliminated: false
            }
        );
        assert_eq!(world.get(5).unwrap().population, 24);
    }

    #[test]
    fn test_capture_keeps_defense_and_buildings() {
        let (mut world, mut ledger, mut queue) = setup();
        let t = world.get_mut(5).unwrap();
        t.defense = 1;
        t.buildings.push(crate::engine::world::BuildingKind::City);
        launch(&mut queue, &mut ledger, "p1", 5, 100);
        run_to_completion(&mut world, &mut ledger, &mut queue);
        let t = world.get(5).unwrap();
        assert!(t.is_owned_by(&FactionId::human("p1")));
        assert_eq!(t.defense, 1);
        assert_eq!(t.buildings.len(), 1);
        assert_eq!(t.population, 51);
    }

    #[test]
    fn test_reinforce_own_territory() {
        let (mut world, mut ledger, mut queue) = setup();
        launch(&mut queue, &mut ledger, "p1", 5, 50);
        world.get_mut(5).unwrap().claim(FactionId::human("p1"), 10);
        let done = run_to_completion(&mut world, &mut ledger, &mut queue);
        assert_eq!(done[0].resolution, Resolution::Reinforced);
        assert_eq!(world.get(5).unwrap().population, 60);
    }

    #[test]
    fn test_drop_attacker() {
        let (_, mut ledger, mut queue) = setup();
        launch(&mut queue, &mut ledger, "p1", 5, 10);
        launch(&mut queue, &mut ledger, "p1", 6, 10);
        launch(&mut queue, &mut ledger, "p2", 6, 10);
        assert_eq!(queue.drop_attacker(&FactionId::human("p1")), 2);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_from_attacks_restores_ids() {
        let (_, mut ledger, mut queue) = setup();
        launch(&mut queue, &mut ledger, "p1", 5, 10);
        launch(&mut queue, &mut ledger, "p2", 6, 10);
        let mut restored = AttackQueue::from_attacks(queue.as_slice().to_vec());
        assert_eq!(restored.as_slice(), queue.as_slice());
        let stats = ledger.stats_mut(&FactionId::human("p1")).unwrap();
        let id = restored
            .launch(FactionId::human("p1"), 7, 10, stats)
            .unwrap();
        assert_eq!(id, 3);
    }

    #[test]
    fn test_ai_attack_forfeits_when_human_takes_target() {
        let (mut world, mut ledger, mut queue) = setup();
        ledger.install_ai(&MapDefinition::europe().ai_factions);
        let ai = FactionId::Ai(1);
        let stats = ledger.stats_mut(&ai).unwrap();
        queue.launch(ai.clone(), 7, 60, stats).unwrap();
        resolve_attacks(&mut world, &mut ledger, &mut queue);

        // A human spawns on the target mid-fill
        let p1 = FactionId::human("p1");
        world.get_mut(7).unwrap().claim(p1.clone(), 10);
        ledger.stats_mut(&p1).unwrap().territory_count = 1;

        let done = run_to_completion(&mut world, &mut ledger, &mut queue);
        assert_eq!(done[0].resolution, Resolution::Forfeited);
        let t = world.get(7).unwrap();
        assert!(t.is_owned_by(&p1));
        assert_eq!(t.population, 10);
        assert_eq!(ledger.stats(&p1).unwrap().territory_count, 1);
        assert_eq!(ledger.stats(&ai).unwrap().territory_count, 0);
    }

    #[test]
    fn test_human_attack_forfeits_when_rival_takes_target() {
        let (mut world, mut ledger, mut queue) = setup();
        launch(&mut queue, &mut ledger, "p1", 5, 100);
        let p2 = FactionId::human("p2");
        world.get_mut(5).unwrap().claim(p2.clone(), 5);
        ledger.stats_mut(&p2).unwrap().territory_count = 1;

        let done = run_to_completion(&mut world, &mut ledger, &mut queue);
        assert_eq!(done[0].resolution, Resolution::Forfeited);
        assert!(world.get(5).unwrap().is_owned_by(&p2));
        assert_eq!(ledger.stats(&p2).unwrap().territory_count, 1);
        assert_eq!(ledger.player("p1").unwrap().stats.territory_count, 0);
    }
}
