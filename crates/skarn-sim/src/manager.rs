//! The effect lifecycle manager.
//!
//! Owns every [`EffectInstance`] from drain to end. Per tick, in order:
//! drain the intent queue and instantiate; run spawn hooks and emit
//! spawn events; run cadence tick hooks and emit updates; evaluate end
//! policies and emit end events. Sequence numbers are per instance,
//! start at 1, and never gap; spawn is always sequence 1 when emitted.
//!
//! Invalid intents (unknown entry, missing target) are dropped with an
//! error log and a telemetry increment; the tick always continues.

use crate::catalog::EffectCatalog;
use crate::combat;
use crate::effect::{
    BehaviorState, DeliveryState, EffectInstance, EffectIntent, EffectStats, EndCondition,
    EndEvent, EndKind, EndReason, Geometry, HookId, LifecycleEvent, ProjectileState, SpawnEvent,
    UpdateEvent,
};
use crate::status::StatusRegistry;
use crate::world::World;
use indexmap::IndexMap;
use skarn_core::{EffectId, LifecycleError, Seq, TickId};
use std::collections::VecDeque;
use tracing::error;

/// The effect lifecycle manager.
#[derive(Debug)]
pub struct EffectManager {
    catalog: EffectCatalog,
    intents: VecDeque<EffectIntent>,
    live: IndexMap<EffectId, EffectInstance>,
    seqs: IndexMap<EffectId, u64>,
    next_instance: u64,
}

impl EffectManager {
    /// Create a manager over a loaded catalog.
    pub fn new(catalog: EffectCatalog) -> Self {
        Self {
            catalog,
            intents: VecDeque::new(),
            live: IndexMap::new(),
            seqs: IndexMap::new(),
            next_instance: 0,
        }
    }

    /// The catalog this manager resolves against.
    pub fn catalog(&self) -> &EffectCatalog {
        &self.catalog
    }

    /// Queue an intent for the next `run_tick`.
    pub fn enqueue_intent(&mut self, intent: EffectIntent) {
        self.intents.push_back(intent);
    }

    /// Number of queued intents.
    pub fn pending_intents(&self) -> usize {
        self.intents.len()
    }

    /// The live instance set, in allocation order.
    pub fn live(&self) -> &IndexMap<EffectId, EffectInstance> {
        &self.live
    }

    /// Run one manager tick.
    pub fn run_tick(
        &mut self,
        world: &mut World,
        registry: &StatusRegistry,
        tick: TickId,
        now_ms: f64,
        dt: f64,
    ) {
        let dt_ms = dt * 1000.0;
        let mut deferred: Vec<EffectIntent> = Vec::new();

        // 0. World-requested extensions and ends from the previous tick.
        let mailbox = world.take_effect_mailbox();
        for (id, ticks) in mailbox.extends {
            if let Some(inst) = self.live.get_mut(&id) {
                // Never shorten recorded duration outside of an end.
                inst.behavior.ticks_remaining = inst.behavior.ticks_remaining.max(ticks);
            }
        }
        let mut forced: IndexMap<EffectId, EndReason> = IndexMap::new();
        for (id, reason) in mailbox.ends {
            forced.entry(id).or_insert(reason);
        }

        // 1. Drain the intent queue and instantiate.
        let drained: Vec<EffectIntent> = self.intents.drain(..).collect();
        let mut new_ids: Vec<EffectId> = Vec::new();
        for intent in drained {
            let entry_id = intent.entry_id.clone();
            match self.instantiate(world, intent, tick) {
                Ok(inst) => {
                    new_ids.push(inst.id.clone());
                    self.live.insert(inst.id.clone(), inst);
                }
                Err(e) => {
                    error!(entry = %entry_id, error = %e, "dropping effect intent");
                    world.telemetry_mut().dropped_intents += 1;
                }
            }
        }

        // 2. Spawn hooks, then spawn events (seq 1).
        for id in &new_ids {
            let Some(inst) = self.live.get_mut(id) else {
                continue;
            };
            match inst.hooks.on_spawn {
                Some(HookId::MeleeSpawn) => {
                    combat::melee_spawn(world, registry, inst, &mut deferred, tick, now_ms, dt_ms);
                }
                Some(HookId::StatusVisual) => {
                    if let (Some(follow), Some(status)) =
                        (inst.follow.clone(), inst.attach_status.clone())
                    {
                        world.attach_status_visual(&follow, &status, inst.id.clone());
                    }
                }
                // Projectile state was created at instantiation; decals
                // and damage hooks have no spawn behaviour.
                Some(HookId::ProjectileLifecycle | HookId::StatusDamage | HookId::BloodDecal)
                | None => {}
            }
            if inst.replication.send_spawn {
                // The entry is present: instantiation resolved it and the
                // catalog never changes after load.
                if let Some(entry) = self.catalog.entry(&inst.entry_id) {
                    let seq = {
                        let n = self.seqs.entry(id.clone()).or_insert(0);
                        *n += 1;
                        Seq(*n)
                    };
                    world
                        .journal_mut()
                        .record_effect_event(LifecycleEvent::Spawn(SpawnEvent {
                            tick,
                            seq,
                            instance: inst.snapshot(&entry.definition),
                        }));
                }
            }
        }

        // 3. Cadence tick: hooks and updates.
        let ids: Vec<EffectId> = self.live.keys().cloned().collect();
        for id in &ids {
            let Some(inst) = self.live.get_mut(id) else {
                continue;
            };
            if inst.behavior.cooldown_ticks == 0 {
                match inst.hooks.on_tick {
                    Some(HookId::ProjectileLifecycle) => {
                        combat::projectile_tick(
                            world,
                            registry,
                            inst,
                            &mut deferred,
                            tick,
                            now_ms,
                            dt,
                        );
                    }
                    Some(HookId::StatusDamage) => {
                        if let Some(target) = inst.follow.clone() {
                            let delta = inst.param("damagePerTick").unwrap_or(0.0);
                            if delta != 0.0 {
                                let entry_id = inst.entry_id.clone();
                                let owner = inst.owner.clone();
                                combat::dispatch_hit(
                                    world,
                                    registry,
                                    Some(&mut inst.stats),
                                    combat::HitRequest {
                                        target: &target,
                                        delta,
                                        ability: &entry_id,
                                        status_cause: None,
                                        apply_status: None,
                                        source: owner,
                                    },
                                    &mut deferred,
                                    tick,
                                    now_ms,
                                    dt_ms,
                                );
                            }
                        }
                    }
                    _ => {}
                }
                if inst.replication.send_updates {
                    let seq = {
                        let n = self.seqs.entry(id.clone()).or_insert(0);
                        *n += 1;
                        Seq(*n)
                    };
                    world
                        .journal_mut()
                        .record_effect_event(LifecycleEvent::Update(UpdateEvent {
                            tick,
                            seq,
                            id: id.clone(),
                            delivery_state: Some(inst.delivery),
                            behavior_state: Some(inst.behavior.clone()),
                        }));
                }
                inst.behavior.cooldown_ticks = inst.behavior.tick_cadence;
            }
            inst.behavior.cooldown_ticks = inst.behavior.cooldown_ticks.saturating_sub(1);
        }

        // 4. End-policy evaluation, in live-set order.
        let mut ending: Vec<(EffectId, EndReason)> = Vec::new();
        for (id, inst) in self.live.iter_mut() {
            if let Some(reason) = forced.get(id) {
                ending.push((id.clone(), *reason));
                continue;
            }
            if let Some(reason) = inst.projectile.as_ref().and_then(|p| p.stopped) {
                // Stopped projectiles clamp their lifetime to the stop tick.
                inst.behavior.ticks_remaining = 0;
                ending.push((id.clone(), reason));
                continue;
            }
            match inst.end.kind {
                EndKind::Instant => {
                    if tick >= inst.start_tick {
                        ending.push((id.clone(), EndReason::Expired));
                    }
                }
                EndKind::Duration => {
                    inst.behavior.ticks_remaining = inst.behavior.ticks_remaining.saturating_sub(1);
                    if inst.behavior.ticks_remaining == 0 {
                        ending.push((id.clone(), EndReason::Expired));
                    }
                }
                EndKind::Condition => {
                    let anchor = inst.follow.as_ref().or(inst.owner.as_ref());
                    let owner_lost = inst.end.conditions.contains(&EndCondition::OwnerLost)
                        && anchor.map(|a| world.actor(a).is_none()).unwrap_or(true);
                    let status_cleared = inst.end.conditions.contains(&EndCondition::StatusCleared)
                        && match (&inst.follow, &inst.attach_status) {
                            (Some(follow), Some(status)) => world
                                .actor(follow)
                                .map(|a| !a.statuses.contains_key(status))
                                .unwrap_or(true),
                            _ => false,
                        };
                    if owner_lost {
                        ending.push((id.clone(), EndReason::OwnerLost));
                    } else if status_cleared {
                        ending.push((id.clone(), EndReason::Stopped));
                    }
                }
            }
        }

        // 5. Emit end events, then drop instances and sequence state.
        for (id, reason) in ending {
            let Some(inst) = self.live.shift_remove(&id) else {
                continue;
            };
            if inst.replication.send_end {
                let seq = {
                    let n = self.seqs.entry(id.clone()).or_insert(0);
                    *n += 1;
                    Seq(*n)
                };
                world
                    .journal_mut()
                    .record_effect_event(LifecycleEvent::End(EndEvent {
                        tick,
                        seq,
                        id: id.clone(),
                        reason,
                    }));
            }
            self.seqs.shift_remove(&id);
            if let (Some(follow), Some(status)) = (&inst.follow, &inst.attach_status) {
                world.clear_status_visual(follow, status, &id);
            }
        }

        // 6. Intents produced during this tick join the queue for the next.
        for intent in deferred {
            self.intents.push_back(intent);
        }
    }

    /// Resolve an intent into an instance.
    fn instantiate(
        &mut self,
        world: &World,
        intent: EffectIntent,
        tick: TickId,
    ) -> Result<EffectInstance, LifecycleError> {
        let entry = self
            .catalog
            .entry(&intent.entry_id)
            .ok_or_else(|| LifecycleError::UnknownEntry {
                entry: intent.entry_id.clone(),
            })?;
        let def = &entry.definition;

        if let Some(target) = &intent.target {
            if world.actor(target).is_none() {
                return Err(LifecycleError::UnknownTarget {
                    actor: target.to_string(),
                });
            }
        }

        self.next_instance += 1;
        let id = EffectId::allocated(self.next_instance);

        let geometry = if intent.geometry == Geometry::default() {
            def.shape
                .map(|s| Geometry {
                    shape: s.kind,
                    width: s.width,
                    height: s.height,
                    radius: s.radius,
                    offset_x: skarn_core::Fx::ZERO,
                    offset_y: skarn_core::Fx::ZERO,
                })
                .unwrap_or_default()
        } else {
            intent.geometry
        };
        let motion = intent.motion.unwrap_or_default();

        let behavior = BehaviorState {
            ticks_remaining: intent.duration_ticks.unwrap_or(def.lifetime_ticks),
            tick_cadence: intent.tick_cadence.unwrap_or(1).max(1),
            cooldown_ticks: 0,
            extra: IndexMap::new(),
            stacks: 1,
        };

        let follow = match intent.delivery {
            crate::effect::Delivery::Target | crate::effect::Delivery::Visual => {
                intent.target.clone()
            }
            crate::effect::Delivery::Area => None,
        };

        let hooks = entry.hook_set();
        let projectile = if hooks.on_spawn == Some(HookId::ProjectileLifecycle)
            || hooks.on_tick == Some(HookId::ProjectileLifecycle)
        {
            let impact = def.impact.clone().unwrap_or_default();
            let vel = motion.vel();
            Some(ProjectileState {
                pos: motion.pos(),
                vel,
                speed: vel.len(),
                remaining_range: intent
                    .params
                    .get("range")
                    .map(|f| f.to_f64())
                    .unwrap_or(400.0),
                hit: Vec::new(),
                stopped: None,
                stop_on_hit: impact.stop_on_hit,
                max_targets: impact.max_targets,
                affects_owner: impact.affects_owner,
                explode_on_impact: impact.explode_on_impact,
                explode_on_expiry: impact.explode_on_expiry,
                expiry_only_if_no_hits: impact.expiry_only_if_no_hits,
            })
        } else {
            None
        };

        Ok(EffectInstance {
            id,
            entry_id: intent.entry_id,
            definition_id: entry.contract_id.clone(),
            start_tick: tick,
            owner: intent.source,
            follow,
            delivery: DeliveryState { geometry, motion },
            behavior,
            params: intent.params.clone(),
            replication: def.client,
            end: def.end.clone(),
            hooks,
            status_effect: def.status_effect.clone(),
            attach_status: intent.attach_status,
            projectile,
            stats: EffectStats {
                spawn_tick: tick,
                ..EffectStats::default()
            },
        })
    }
}
