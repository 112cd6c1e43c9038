//! Combat resolution: melee hitboxes, projectile advance, and the hit
//! dispatcher.
//!
//! [`dispatch_hit`] is the single entry point that turns an
//! effect+target pair into health mutation, telemetry, status
//! application, and defeat handling, so melee, projectiles, status
//! ticks, and environmental damage all produce uniform records.

use crate::effect::{EffectIntent, EffectInstance, EffectStats, EndReason, Motion};
use crate::obstacle::ObstacleKind;
use crate::status::{self, StatusRegistry};
use crate::world::World;
use skarn_core::{ActorId, Aabb, TickId, Vec2};

/// Range slack treated as exhausted.
const RANGE_EPSILON: f64 = 1e-9;

/// One hit to resolve through the dispatcher.
#[derive(Debug)]
pub struct HitRequest<'a> {
    /// The actor being hit.
    pub target: &'a ActorId,
    /// Health delta (negative for damage).
    pub delta: f64,
    /// Ability or effect label for telemetry.
    pub ability: &'a str,
    /// Status id when the damage came from a status tick.
    pub status_cause: Option<&'a str>,
    /// Status to apply/refresh on the target.
    pub apply_status: Option<&'a str>,
    /// The damage source (actor or obstacle id).
    pub source: Option<ActorId>,
}

/// Uniform hit entry point.
///
/// Returns the applied health change, or `None` when the target does
/// not resolve to an actor.
pub fn dispatch_hit(
    world: &mut World,
    registry: &StatusRegistry,
    mut stats: Option<&mut EffectStats>,
    req: HitRequest<'_>,
    deferred: &mut Vec<EffectIntent>,
    tick: TickId,
    now_ms: f64,
    dt_ms: f64,
) -> Option<crate::world::HealthChange> {
    let change = world.apply_health_delta(req.target, req.delta)?;

    if let Some(stats) = stats.as_deref_mut() {
        stats.hits += 1;
        if stats.first_hit_tick.is_none() {
            stats.first_hit_tick = Some(tick);
        }
        if !stats.victims.contains(req.target) {
            stats.victims.push(req.target.clone());
        }
        if change.applied < 0.0 {
            stats.damage += -change.applied;
        }
    }

    if change.applied < 0.0 {
        world.telemetry_mut().damage.push(crate::world::DamageRecord {
            tick,
            ability: req.ability.to_string(),
            target: req.target.clone(),
            amount: -change.applied,
            resulting_health: change.health,
            status_cause: req.status_cause.map(str::to_string),
        });
    }

    if change.defeated {
        resolve_defeat(world, req.target, req.ability, deferred, tick);
    } else if let Some(status) = req.apply_status {
        let source = req.source.clone().unwrap_or_else(|| req.target.clone());
        status::apply_status(world, registry, req.target, status, source, deferred, now_ms, dt_ms);
    }

    Some(change)
}

/// Defeat cleanup: telemetry, inventory drop, equipment clear, and for
/// NPCs a blood decal plus removal.
fn resolve_defeat(
    world: &mut World,
    target: &ActorId,
    ability: &str,
    deferred: &mut Vec<EffectIntent>,
    tick: TickId,
) {
    let Some(state) = world.actor(target) else {
        return;
    };
    let pos = state.pos;
    let stacks: Vec<(String, u64)> = state
        .inventory
        .stacks
        .iter()
        .filter(|(_, &q)| q > 0)
        .map(|(k, &q)| (k.clone(), q))
        .collect();
    let slots: Vec<String> = state.equipment.slots.keys().cloned().collect();
    let is_npc = world.is_npc(target);
    let experience_reward = world.npc(target).map(|n| n.experience_reward).unwrap_or(0);

    world.telemetry_mut().defeats.push(crate::world::DefeatRecord {
        tick,
        target: target.clone(),
        ability: ability.to_string(),
        experience_reward,
    });

    for (key, qty) in stacks {
        world.spawn_ground_item(&key, &key, qty, pos);
        world.add_inventory_qty(target, &key, -(qty as i64));
    }
    for slot in slots {
        world.set_equipment(target, &slot, None);
    }

    if is_npc {
        deferred.push(EffectIntent {
            entry_id: "blood-decal".into(),
            type_id: "decal".into(),
            delivery: crate::effect::Delivery::Visual,
            source: None,
            target: None,
            geometry: crate::effect::Geometry::default(),
            motion: Some(Motion::from_vectors(pos, Vec2::ZERO)),
            duration_ticks: None,
            tick_cadence: None,
            params: indexmap::IndexMap::new(),
            attach_status: None,
        });
        world.remove_actor(target);
    }
}

/// Melee spawn hook: resolve the hitbox against obstacles (mining) and
/// actors (hits) on the spawn tick.
pub fn melee_spawn(
    world: &mut World,
    registry: &StatusRegistry,
    inst: &mut EffectInstance,
    deferred: &mut Vec<EffectIntent>,
    tick: TickId,
    now_ms: f64,
    dt_ms: f64,
) {
    let Some(owner) = inst.owner.clone() else {
        return;
    };
    let Some(owner_pos) = world.actor(&owner).map(|a| a.pos) else {
        return;
    };
    let g = inst.delivery.geometry;
    let hitbox = Aabb::new(
        owner_pos.x + g.offset_x.to_f64(),
        owner_pos.y + g.offset_y.to_f64(),
        g.width.to_f64(),
        g.height.to_f64(),
    );
    inst.delivery.motion = Motion::from_vectors(hitbox.center(), Vec2::ZERO);

    // Mining: each overlapped gold-ore vein yields one ore.
    let mined: Vec<String> = world
        .obstacles()
        .iter()
        .filter(|o| o.kind == ObstacleKind::GoldOre && o.bounds.overlaps(hitbox))
        .map(|o| o.id.clone())
        .collect();
    for _ in &mined {
        world.add_inventory_qty(&owner, "gold-ore", 1);
    }

    let delta = inst.param("healthDelta").unwrap_or(-10.0);
    let status_effect = inst.status_effect.clone();
    for target in world.actor_ids_sorted() {
        if target == owner {
            continue;
        }
        let Some(target_box) = world.actor_aabb(&target) else {
            continue;
        };
        if !hitbox.overlaps(target_box) {
            continue;
        }
        dispatch_hit(
            world,
            registry,
            Some(&mut inst.stats),
            HitRequest {
                target: &target,
                delta,
                ability: &inst.entry_id,
                status_cause: None,
                apply_status: status_effect.as_deref(),
                source: Some(owner.clone()),
            },
            deferred,
            tick,
            now_ms,
            dt_ms,
        );
    }
}

/// Projectile tick hook: advance, then resolve stops in the fixed
/// order world-bounds → obstacles → actors → range. Obstacle contact
/// wins over actor contact within the same tick.
pub fn projectile_tick(
    world: &mut World,
    registry: &StatusRegistry,
    inst: &mut EffectInstance,
    deferred: &mut Vec<EffectIntent>,
    tick: TickId,
    now_ms: f64,
    dt: f64,
) {
    let owner = inst.owner.clone();
    let entry_id = inst.entry_id.clone();
    let status_effect = inst.status_effect.clone();
    let radius = inst.delivery.geometry.radius.to_f64();
    let delta = inst.param("healthDelta").unwrap_or(-10.0);
    let dt_ms = dt * 1000.0;

    let bounds = world.bounds();
    let blocking: Vec<(String, Aabb)> = world
        .obstacles()
        .iter()
        .filter(|o| o.kind.blocks())
        .map(|o| (o.id.clone(), o.bounds))
        .collect();

    let Some(proj) = inst.projectile.as_mut() else {
        return;
    };
    if proj.stopped.is_some() {
        return;
    }

    let step_len = (proj.speed * dt).min(proj.remaining_range);
    proj.pos = proj.pos + proj.vel.normalized().scale(step_len);
    proj.remaining_range -= step_len;

    if !bounds.contains(proj.pos) {
        proj.stopped = Some(EndReason::Expired);
    }

    if proj.stopped.is_none() {
        for (_, obstacle_bounds) in &blocking {
            if obstacle_bounds.overlaps_circle(proj.pos, radius) {
                proj.stopped = Some(EndReason::Impact);
                if let Some(entry) = proj.explode_on_impact.clone() {
                    deferred.push(area_intent(&entry, owner.clone(), proj.pos));
                }
                break;
            }
        }
    }

    if proj.stopped.is_none() {
        let pos = proj.pos;
        let affects_owner = proj.affects_owner;
        let stop_on_hit = proj.stop_on_hit;
        let max_targets = proj.max_targets;
        let mut new_hits: Vec<ActorId> = Vec::new();
        let mut stop = false;
        let already_hit = proj.hit.clone();

        for target in world.actor_ids_sorted() {
            if Some(&target) == owner.as_ref() && !affects_owner {
                continue;
            }
            if already_hit.contains(&target) || new_hits.contains(&target) {
                continue;
            }
            let Some(target_box) = world.actor_aabb(&target) else {
                continue;
            };
            if !target_box.overlaps_circle(pos, radius) {
                continue;
            }
            new_hits.push(target.clone());
            let total_hits = already_hit.len() + new_hits.len();
            if stop_on_hit || (max_targets > 0 && total_hits >= max_targets as usize) {
                stop = true;
                break;
            }
        }

        // Re-borrow dance: hits mutate the world, so resolve them after
        // the scan.
        for target in &new_hits {
            dispatch_hit(
                world,
                registry,
                Some(&mut inst.stats),
                HitRequest {
                    target,
                    delta,
                    ability: &entry_id,
                    status_cause: None,
                    apply_status: status_effect.as_deref(),
                    source: owner.clone(),
                },
                deferred,
                tick,
                now_ms,
                dt_ms,
            );
        }

        let proj = inst
            .projectile
            .as_mut()
            .expect("projectile state checked above");
        proj.hit.extend(new_hits);
        if stop {
            proj.stopped = Some(EndReason::Impact);
        }
    }

    let proj = inst
        .projectile
        .as_mut()
        .expect("projectile state checked above");

    if proj.stopped.is_none() && proj.remaining_range <= RANGE_EPSILON {
        proj.stopped = Some(EndReason::Expired);
        let suppressed = proj.expiry_only_if_no_hits && !proj.hit.is_empty();
        if !suppressed {
            if let Some(entry) = proj.explode_on_expiry.clone() {
                deferred.push(area_intent(&entry, owner.clone(), proj.pos));
            }
        }
    }

    if proj.stopped.is_some() {
        proj.remaining_range = 0.0;
    }
    inst.delivery.motion = Motion::from_vectors(
        inst.projectile.as_ref().map(|p| p.pos).unwrap_or_default(),
        inst.projectile.as_ref().map(|p| p.vel).unwrap_or_default(),
    );
}

fn area_intent(entry: &str, owner: Option<ActorId>, pos: Vec2) -> EffectIntent {
    EffectIntent {
        entry_id: entry.to_string(),
        type_id: "area".into(),
        delivery: crate::effect::Delivery::Area,
        source: owner,
        target: None,
        geometry: crate::effect::Geometry::default(),
        motion: Some(Motion::from_vectors(pos, Vec2::ZERO)),
        duration_ticks: None,
        tick_cadence: None,
        params: indexmap::IndexMap::new(),
        attach_status: None,
    }
}
