//! Status effects: application, per-tick accumulation, and expiry.
//!
//! Statuses are data-driven: a [`StatusDef`] names the tick interval,
//! duration, per-tick damage, and the visual catalog entry to attach.
//! The accumulator catches up missed intervals with a while-loop, so a
//! skipped tick still applies every due callback, in order.

use crate::actor::StatusInstance;
use crate::combat::{self, HitRequest};
use crate::effect::{Delivery, EffectIntent, EndReason, Geometry};
use crate::world::World;
use indexmap::IndexMap;
use skarn_core::{ActorId, TickId, WorldConfig};
use tracing::debug;

/// The built-in burning status id.
pub const BURNING: &str = "burning";

/// One status definition.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusDef {
    /// Definition id.
    pub id: String,
    /// Interval between tick callbacks, ms.
    pub interval_ms: f64,
    /// Duration from (re)application to expiry, ms.
    pub duration_ms: f64,
    /// Damage applied per tick callback (0 for passive statuses).
    pub damage_per_tick: f64,
    /// Catalog entry for the follow-actor visual.
    pub visual_entry: Option<String>,
    /// Whether the first callback fires immediately on application.
    pub initial_tick_immediate: bool,
}

/// Registry of known statuses.
#[derive(Clone, Debug, Default)]
pub struct StatusRegistry {
    defs: IndexMap<String, StatusDef>,
}

impl StatusRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in statuses, parameterized from the config: `burning`
    /// ticks every simulation tick for `lava_damage_per_second · dt`.
    pub fn builtin(config: &WorldConfig) -> Self {
        let dt_ms = config.dt() * 1000.0;
        let mut registry = Self::new();
        registry.register(StatusDef {
            id: BURNING.into(),
            interval_ms: dt_ms,
            duration_ms: config.burning_duration_ms,
            damage_per_tick: config.lava_damage_per_second * config.dt(),
            visual_entry: Some("status-burning".into()),
            initial_tick_immediate: true,
        });
        registry
    }

    /// Register (or replace) a definition.
    pub fn register(&mut self, def: StatusDef) {
        self.defs.insert(def.id.clone(), def);
    }

    /// Look up a definition.
    pub fn get(&self, id: &str) -> Option<&StatusDef> {
        self.defs.get(id)
    }
}

/// Apply or refresh a status on an actor.
///
/// A fresh application creates the instance, schedules its first tick,
/// and enqueues the follow-actor visual. A reapplication extends the
/// expiry, updates the source, and extends the visual's duration
/// metadata (never shortening it).
#[allow(clippy::too_many_arguments)]
pub fn apply_status(
    world: &mut World,
    registry: &StatusRegistry,
    actor: &ActorId,
    status: &str,
    source: ActorId,
    deferred: &mut Vec<EffectIntent>,
    now_ms: f64,
    dt_ms: f64,
) {
    let Some(def) = registry.get(status) else {
        debug!(status, "ignoring unknown status application");
        return;
    };
    let expires_at_ms = now_ms + def.duration_ms;

    let existing = world
        .actor(actor)
        .and_then(|a| a.statuses.get(status))
        .map(|inst| inst.visual.clone());

    match existing {
        Some(visual) => {
            world.refresh_status(actor, status, expires_at_ms, source);
            if let Some(visual) = visual {
                let ticks = (def.duration_ms / dt_ms).ceil() as u64;
                world.request_effect_extend(visual, ticks);
            }
        }
        None => {
            let next_tick_ms = if def.initial_tick_immediate {
                now_ms
            } else {
                now_ms + def.interval_ms
            };
            world.insert_status(
                actor,
                StatusInstance {
                    def: status.to_string(),
                    applied_at_ms: now_ms,
                    expires_at_ms,
                    next_tick_ms,
                    interval_ms: def.interval_ms,
                    source,
                    visual: None,
                },
            );
            if let Some(entry) = &def.visual_entry {
                deferred.push(EffectIntent {
                    entry_id: entry.clone(),
                    type_id: "status-visual".into(),
                    delivery: Delivery::Visual,
                    source: None,
                    target: Some(actor.clone()),
                    geometry: Geometry::default(),
                    motion: None,
                    duration_ticks: Some((def.duration_ms / dt_ms).ceil() as u64),
                    tick_cadence: None,
                    params: IndexMap::new(),
                    attach_status: Some(status.to_string()),
                });
            }
        }
    }
}

/// Advance every status on every actor by one tick.
///
/// For each instance, the per-tick callback runs while
/// `now >= next_tick && next_tick <= expires_at`, then expiry removes
/// the instance and stops its visual.
pub fn step_statuses(
    world: &mut World,
    registry: &StatusRegistry,
    deferred: &mut Vec<EffectIntent>,
    tick: TickId,
    now_ms: f64,
    dt_ms: f64,
) {
    for actor in world.actor_ids_in_order() {
        let Some(state) = world.actor(&actor) else {
            continue;
        };
        let status_ids: Vec<String> = state.statuses.keys().cloned().collect();

        for status in status_ids {
            let Some(inst) = world.actor(&actor).and_then(|a| a.statuses.get(&status)) else {
                continue;
            };
            let mut next_tick_ms = inst.next_tick_ms;
            let expires_at_ms = inst.expires_at_ms;
            let interval_ms = inst.interval_ms;
            let source = inst.source.clone();
            let damage_per_tick = registry.get(&status).map(|d| d.damage_per_tick).unwrap_or(0.0);

            let mut due = 0u32;
            while now_ms >= next_tick_ms && next_tick_ms <= expires_at_ms {
                due += 1;
                next_tick_ms += interval_ms;
            }

            for _ in 0..due {
                if damage_per_tick <= 0.0 {
                    continue;
                }
                combat::dispatch_hit(
                    world,
                    registry,
                    None,
                    HitRequest {
                        target: &actor,
                        delta: -damage_per_tick,
                        ability: &status,
                        status_cause: Some(&status),
                        apply_status: None,
                        source: Some(source.clone()),
                    },
                    deferred,
                    tick,
                    now_ms,
                    dt_ms,
                );
                if world.actor(&actor).is_none() {
                    break;
                }
            }

            // The actor may have been defeated and removed mid-loop.
            let Some(inst) = world.status_mut(&actor, &status) else {
                continue;
            };
            inst.next_tick_ms = next_tick_ms;

            if now_ms >= expires_at_ms {
                let visual = world
                    .actor(&actor)
                    .and_then(|a| a.statuses.get(&status))
                    .and_then(|s| s.visual.clone());
                world.remove_status(&actor, &status);
                if let Some(visual) = visual {
                    debug!(%actor, status, "status expired, stopping visual");
                    world.request_effect_end(visual, EndReason::Stopped);
                }
            }
        }
    }
}
