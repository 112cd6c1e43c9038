//! The world stepper: one tick of simulation in fixed phase order.
//!
//! Phases, in order: path/intent movement, obstacle resolution,
//! actor-actor separation, the effect manager tick (which owns melee
//! resolution and projectile advance), environmental hazards, status
//! progression, NPC AI, and the journal flush. Collision phases iterate
//! actors in ascending id order; everything else follows registry
//! allocation order.

use crate::ai;
use crate::effect::EffectIntent;
use crate::manager::EffectManager;
use crate::obstacle::ObstacleKind;
use crate::status::{self, StatusRegistry, BURNING};
use crate::world::World;
use skarn_core::{ActorId, Aabb, Command, TickId, Vec2};

/// Relaxation passes for pairwise separation.
const SEPARATION_PASSES: usize = 8;

/// Result of one world step.
#[derive(Debug, Default)]
pub struct StepOutcome {
    /// NPC AI commands to apply at the start of the next tick.
    pub ai_commands: Vec<Command>,
}

/// Advance the world by one tick.
pub fn step_world(
    world: &mut World,
    effects: &mut EffectManager,
    registry: &StatusRegistry,
    tick: TickId,
    now_ms: f64,
    dt: f64,
) -> StepOutcome {
    let dt_ms = dt * 1000.0;

    // 1. Intent → movement (path follow emits synthetic intents).
    move_actors(world, dt);

    // 2. Obstacle resolution.
    resolve_obstacles(world);

    // 3. Actor-actor separation.
    separate_actors(world);

    // 4–6. Melee resolution, projectile advance, and the effect
    // lifecycle all run inside the manager tick.
    effects.run_tick(world, registry, tick, now_ms, dt);

    // 7. Environmental hazards.
    let mut deferred: Vec<EffectIntent> = Vec::new();
    apply_hazards(world, registry, &mut deferred, now_ms, dt_ms);

    // 8. Status-effect progression.
    status::step_statuses(world, registry, &mut deferred, tick, now_ms, dt_ms);
    for intent in deferred {
        effects.enqueue_intent(intent);
    }

    // 9. NPC AI; its commands apply next tick.
    let ai_commands = ai::step_npcs(world, tick, now_ms);

    // 10. Journal flush: accumulated patches stay staged for the
    // marshaller; nothing to do here.

    StepOutcome { ai_commands }
}

/// Phase 1: path-derived intents, then movement with bounds clamping.
fn move_actors(world: &mut World, dt: f64) {
    let player_speed = world.config().player_speed;

    let player_ids: Vec<ActorId> = world.players().keys().cloned().collect();
    for id in &player_ids {
        let Some(player) = world.player_mut(id) else {
            continue;
        };
        if let Some(path) = player.path.as_mut() {
            let pos = player.base.pos;
            match path.step(pos) {
                Some(intent) => player.base.intent = intent,
                None => {
                    player.path = None;
                    player.base.intent = Vec2::ZERO;
                }
            }
        }
        let pos = player.base.pos;
        let intent = player.base.intent;
        advance(world, id, pos, intent, player_speed, dt);
    }

    let npc_ids: Vec<ActorId> = world.npcs().keys().cloned().collect();
    for id in &npc_ids {
        let Some(npc) = world.npc_mut(id) else {
            continue;
        };
        let speed = npc.kind.speed();
        if let Some(path) = npc.path.as_mut() {
            let pos = npc.base.pos;
            match path.step(pos) {
                Some(intent) => npc.base.intent = intent,
                None => {
                    npc.path = None;
                    npc.base.intent = Vec2::ZERO;
                }
            }
        }
        let pos = npc.base.pos;
        let intent = npc.base.intent;
        advance(world, id, pos, intent, speed, dt);
    }
}

fn advance(world: &mut World, id: &ActorId, pos: Vec2, intent: Vec2, speed: f64, dt: f64) {
    if intent == Vec2::ZERO {
        return;
    }
    let next = world.clamp_center(pos + intent.scale(speed * dt));
    if next != pos {
        world.set_position(id, next);
    }
}

/// Phase 2: push actors out of blocking obstacles along the axis of
/// least penetration, in ascending actor-id order.
fn resolve_obstacles(world: &mut World) {
    let blocking: Vec<Aabb> = world
        .obstacles()
        .iter()
        .filter(|o| o.kind.blocks())
        .map(|o| o.bounds)
        .collect();
    if blocking.is_empty() {
        return;
    }
    let half = world.config().half_extent;

    for id in world.actor_ids_sorted() {
        let Some(state) = world.actor(&id) else {
            continue;
        };
        let mut pos = state.pos;
        let mut moved = false;
        for bounds in &blocking {
            if let Some(delta) = push_out(Aabb::from_center(pos, half), *bounds) {
                pos = pos + delta;
                moved = true;
            }
        }
        if moved {
            let pos = world.clamp_center(pos);
            world.set_position(&id, pos);
        }
    }
}

/// Minimal translation that removes an overlap, or `None` when the
/// boxes are disjoint.
fn push_out(actor: Aabb, obstacle: Aabb) -> Option<Vec2> {
    if !actor.overlaps(obstacle) {
        return None;
    }
    let left = (actor.x + actor.w) - obstacle.x;
    let right = (obstacle.x + obstacle.w) - actor.x;
    let up = (actor.y + actor.h) - obstacle.y;
    let down = (obstacle.y + obstacle.h) - actor.y;

    let min = left.min(right).min(up).min(down);
    Some(if min == left {
        Vec2::new(-left, 0.0)
    } else if min == right {
        Vec2::new(right, 0.0)
    } else if min == up {
        Vec2::new(0.0, -up)
    } else {
        Vec2::new(0.0, down)
    })
}

/// Phase 3: pairwise separation to at least `2 · half_extent`,
/// relaxation-iterated in ascending id-pair order.
fn separate_actors(world: &mut World) {
    let ids = world.actor_ids_sorted();
    if ids.len() < 2 {
        return;
    }
    let half = world.config().half_extent;
    let min_sep = 2.0 * half;

    let mut positions: Vec<Vec2> = ids
        .iter()
        .filter_map(|id| world.actor(id).map(|a| a.pos))
        .collect();
    if positions.len() != ids.len() {
        return;
    }
    let original = positions.clone();

    for _ in 0..SEPARATION_PASSES {
        let mut any = false;
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let delta = positions[j] - positions[i];
                let dist = delta.len();
                if dist >= min_sep {
                    continue;
                }
                any = true;
                let axis = if dist > 0.0 {
                    delta.scale(1.0 / dist)
                } else {
                    // Coincident centers: the smaller id yields left.
                    Vec2::new(1.0, 0.0)
                };
                let push = (min_sep - dist) / 2.0;
                positions[i] = world.clamp_center(positions[i] - axis.scale(push));
                positions[j] = world.clamp_center(positions[j] + axis.scale(push));
            }
        }
        if !any {
            break;
        }
    }

    for (idx, id) in ids.iter().enumerate() {
        if positions[idx] != original[idx] {
            world.set_position(id, positions[idx]);
        }
    }
}

/// Phase 7: actors whose center overlaps a lava pool receive the
/// burning status, sourced to the obstacle.
fn apply_hazards(
    world: &mut World,
    registry: &StatusRegistry,
    deferred: &mut Vec<EffectIntent>,
    now_ms: f64,
    dt_ms: f64,
) {
    let lava: Vec<(String, Aabb)> = world
        .obstacles()
        .iter()
        .filter(|o| o.kind == ObstacleKind::Lava)
        .map(|o| (o.id.clone(), o.bounds))
        .collect();
    if lava.is_empty() {
        return;
    }

    for id in world.actor_ids_sorted() {
        let Some(pos) = world.actor(&id).map(|a| a.pos) else {
            continue;
        };
        let Some((source, _)) = lava.iter().find(|(_, bounds)| bounds.contains(pos)) else {
            continue;
        };
        status::apply_status(
            world,
            registry,
            &id,
            BURNING,
            ActorId::new(source.clone()),
            deferred,
            now_ms,
            dt_ms,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EffectCatalog, BUILTIN_CATALOG};
    use skarn_core::{Facing, WorldConfig};
    use smallvec::smallvec;

    const DT: f64 = 1.0 / 15.0;

    fn setup() -> (World, EffectManager, StatusRegistry) {
        let world = World::new(WorldConfig::default());
        let registry = StatusRegistry::builtin(world.config());
        let manager = EffectManager::new(EffectCatalog::from_json(BUILTIN_CATALOG).unwrap());
        (world, manager, registry)
    }

    fn run(world: &mut World, effects: &mut EffectManager, registry: &StatusRegistry, tick: u64) {
        let now_ms = tick as f64 * (1000.0 / 15.0);
        step_world(world, effects, registry, TickId(tick), now_ms, DT);
    }

    // ── movement ───────────────────────────────────────────────

    #[test]
    fn intent_moves_actor_speed_times_dt() {
        let (mut w, mut fx, reg) = setup();
        let id = w.add_player_at(Vec2::new(100.0, 100.0), 0.0);
        w.set_move_intent(&id, 1.0, 0.0, None, 0.0);
        run(&mut w, &mut fx, &reg, 1);
        let pos = w.actor(&id).unwrap().pos;
        assert!((pos.x - (100.0 + 140.0 / 15.0)).abs() < 1e-9);
        assert_eq!(pos.y, 100.0);
    }

    #[test]
    fn movement_clamps_to_world_bounds() {
        let (mut w, mut fx, reg) = setup();
        let id = w.add_player_at(Vec2::new(630.0, 100.0), 0.0);
        w.set_move_intent(&id, 1.0, 0.0, None, 0.0);
        for tick in 1..10 {
            run(&mut w, &mut fx, &reg, tick);
        }
        let pos = w.actor(&id).unwrap().pos;
        assert_eq!(pos.x, 640.0 - 20.0);
    }

    #[test]
    fn path_follow_emits_synthetic_intent() {
        let (mut w, mut fx, reg) = setup();
        let id = w.add_player_at(Vec2::new(100.0, 100.0), 0.0);
        w.set_path(&id, smallvec![Vec2::new(200.0, 100.0)], 0.0);
        run(&mut w, &mut fx, &reg, 1);
        let pos = w.actor(&id).unwrap().pos;
        assert!(pos.x > 100.0);
        // Path completion clears the synthetic intent.
        for tick in 2..40 {
            run(&mut w, &mut fx, &reg, tick);
        }
        let player = w.player(&id).unwrap();
        assert!(player.path.is_none());
        assert!((player.base.pos.x - 200.0).abs() <= crate::path::ARRIVAL_RADIUS + 1.0);
    }

    // ── collisions ─────────────────────────────────────────────

    #[test]
    fn stone_blocks_movement() {
        let (mut w, mut fx, reg) = setup();
        let id = w.add_player_at(Vec2::new(100.0, 100.0), 0.0);
        w.add_obstacle(ObstacleKind::Stone, Aabb::new(130.0, 60.0, 40.0, 80.0));
        w.set_move_intent(&id, 1.0, 0.0, None, 0.0);
        for tick in 1..20 {
            run(&mut w, &mut fx, &reg, tick);
        }
        let pos = w.actor(&id).unwrap().pos;
        // Center stays at the wall's left face minus the half extent.
        assert!(pos.x <= 110.0 + 1e-9, "actor pushed through wall: {pos}");
    }

    #[test]
    fn lava_does_not_block() {
        let (mut w, mut fx, reg) = setup();
        let id = w.add_player_at(Vec2::new(100.0, 100.0), 0.0);
        w.add_obstacle(ObstacleKind::Lava, Aabb::new(120.0, 60.0, 80.0, 80.0));
        w.set_move_intent(&id, 1.0, 0.0, None, 0.0);
        for tick in 1..10 {
            run(&mut w, &mut fx, &reg, tick);
        }
        assert!(w.actor(&id).unwrap().pos.x > 120.0);
    }

    #[test]
    fn overlapping_actors_separate_to_min_distance() {
        let (mut w, mut fx, reg) = setup();
        let a = w.add_player_at(Vec2::new(100.0, 100.0), 0.0);
        let b = w.add_player_at(Vec2::new(110.0, 100.0), 0.0);
        run(&mut w, &mut fx, &reg, 1);
        let pa = w.actor(&a).unwrap().pos;
        let pb = w.actor(&b).unwrap().pos;
        assert!(
            pa.distance(pb) >= 2.0 * 20.0 - 1e-9,
            "{pa} vs {pb} too close"
        );
    }

    #[test]
    fn coincident_actors_separate_deterministically() {
        let (mut w, mut fx, reg) = setup();
        let a = w.add_player_at(Vec2::new(100.0, 100.0), 0.0);
        let b = w.add_player_at(Vec2::new(100.0, 100.0), 0.0);
        run(&mut w, &mut fx, &reg, 1);
        let pa = w.actor(&a).unwrap().pos;
        let pb = w.actor(&b).unwrap().pos;
        assert!(pa.x < pb.x, "smaller id yields left: {pa} vs {pb}");
        assert!(pa.distance(pb) >= 40.0 - 1e-9);
    }

    // ── hazards ────────────────────────────────────────────────

    #[test]
    fn lava_applies_burning_with_obstacle_source() {
        let (mut w, mut fx, reg) = setup();
        let lava_id = w.add_obstacle(ObstacleKind::Lava, Aabb::new(80.0, 80.0, 80.0, 80.0));
        let id = w.add_player_at(Vec2::new(120.0, 120.0), 0.0);
        run(&mut w, &mut fx, &reg, 1);
        let statuses = &w.actor(&id).unwrap().statuses;
        let burning = statuses.get(BURNING).expect("burning applied");
        assert_eq!(burning.source, ActorId::new(lava_id));
    }

    #[test]
    fn three_ticks_over_lava_damage_per_tick() {
        let (mut w, mut fx, reg) = setup();
        w.add_obstacle(ObstacleKind::Lava, Aabb::new(80.0, 80.0, 80.0, 80.0));
        let id = w.add_player_at(Vec2::new(120.0, 120.0), 0.0);
        for tick in 1..=3 {
            run(&mut w, &mut fx, &reg, tick);
        }
        let expected = 100.0 - 3.0 * (20.0 / 15.0);
        let health = w.actor(&id).unwrap().health;
        assert!(
            (health - expected).abs() < 1e-9,
            "expected {expected}, got {health}"
        );
        // The burning visual follows the actor.
        assert!(fx
            .live()
            .values()
            .any(|i| i.entry_id == "status-burning" && i.follow.as_ref() == Some(&id)));
    }

    // ── facing derivation through commands ─────────────────────

    #[test]
    fn facing_follows_movement_vector_preference() {
        let (mut w, mut fx, reg) = setup();
        let id = w.add_player_at(Vec2::new(100.0, 100.0), 0.0);
        w.set_move_intent(&id, 0.5, 0.5, None, 0.0);
        run(&mut w, &mut fx, &reg, 1);
        assert_eq!(w.actor(&id).unwrap().facing, Facing::Down);
    }
}
