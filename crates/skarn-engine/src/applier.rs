//! Command application.
//!
//! Drained commands apply in FIFO order at the start of the tick.
//! Invalid actions and missing actors are dropped with telemetry;
//! throttled abilities are silent no-ops per the admission contract.

use crate::metrics::DropTable;
use skarn_core::{Command, CommandPayload, DropReason};
use skarn_sim::gate::{intent_for, AbilityGates};
use skarn_sim::manager::EffectManager;
use skarn_sim::world::World;
use tracing::debug;

/// Apply one tick's commands. Returns how many were applied.
pub fn apply_commands(
    world: &mut World,
    effects: &mut EffectManager,
    gates: &AbilityGates,
    drops: &mut DropTable,
    commands: Vec<Command>,
    now_ms: f64,
) -> u64 {
    let mut applied = 0u64;
    for cmd in commands {
        let command_type = cmd.payload.command_type();
        if world.actor(&cmd.actor).is_none() {
            drops.record(DropReason::InvalidTarget, command_type);
            continue;
        }
        match cmd.payload {
            CommandPayload::Move { dx, dy, facing } => {
                world.set_move_intent(&cmd.actor, dx, dy, facing, now_ms);
                applied += 1;
            }
            CommandPayload::Path { waypoints } => {
                world.set_path(&cmd.actor, waypoints, now_ms);
                applied += 1;
            }
            CommandPayload::Action { name } => {
                let Some(ability) = gates.get(&name) else {
                    debug!(actor = %cmd.actor, action = %name, "unknown action");
                    drops.record(DropReason::UnknownAction, command_type);
                    continue;
                };
                // Throttled triggers are no-ops, not errors.
                let Some(owner) = gates.trigger(world, &name, &cmd.actor, now_ms) else {
                    applied += 1;
                    continue;
                };
                match intent_for(
                    ability,
                    &owner,
                    effects.catalog(),
                    world.config().half_extent,
                ) {
                    Some(intent) => {
                        effects.enqueue_intent(intent);
                        applied += 1;
                    }
                    None => {
                        debug!(action = %name, "ability names a missing catalog entry");
                        drops.record(DropReason::UnknownAction, command_type);
                    }
                }
            }
            CommandPayload::Heartbeat { client_sent_ms } => {
                world.record_heartbeat(&cmd.actor, client_sent_ms, now_ms);
                applied += 1;
            }
        }
    }
    applied
}
