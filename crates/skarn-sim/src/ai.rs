//! NPC AI.
//!
//! Each NPC runs a small blackboard state machine once per tick, in
//! allocation order. The AI never mutates the world directly: it emits
//! ordinary commands (move / path / action) that the command applier
//! processes at the start of the **next** tick, exactly like player
//! input. Wander jitter draws from a ChaCha8 stream seeded from the
//! world seed, the NPC index, and the tick, so identical seeds replay
//! identical behaviour.

use crate::world::World;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use skarn_core::{ActorId, Command, CommandPayload, TickId};
use std::fmt;

/// Distance beyond which an NPC abandons a chase and returns home.
pub const LEASH_RANGE: f64 = 220.0;

/// Ticks between wander decisions.
const WANDER_PERIOD: u64 = 30;

/// Behavioural archetypes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NpcKind {
    /// Aggressive melee chaser.
    Goblin,
    /// Skittish wanderer; never attacks.
    Rat,
}

impl NpcKind {
    /// Movement speed, units per second.
    pub fn speed(self) -> f64 {
        match self {
            Self::Goblin => 90.0,
            Self::Rat => 70.0,
        }
    }

    /// Maximum health.
    pub fn max_health(self) -> f64 {
        match self {
            Self::Goblin => 40.0,
            Self::Rat => 15.0,
        }
    }

    /// Aggro radius; 0 means passive.
    pub fn aggro_range(self) -> f64 {
        match self {
            Self::Goblin => 160.0,
            Self::Rat => 0.0,
        }
    }

    /// Melee reach for the attack decision.
    pub fn attack_range(self) -> f64 {
        48.0
    }

    /// Minimum milliseconds between attack decisions.
    pub fn attack_interval_ms(self) -> f64 {
        1200.0
    }

    /// Experience granted to the killer.
    pub fn experience_reward(self) -> u32 {
        match self {
            Self::Goblin => 25,
            Self::Rat => 5,
        }
    }
}

impl fmt::Display for NpcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Goblin => "goblin",
            Self::Rat => "rat",
        };
        f.write_str(s)
    }
}

/// AI state machine states.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AiState {
    /// Doing nothing; will pick up a patrol.
    #[default]
    Idle,
    /// Following patrol waypoints or wandering.
    Patrol,
    /// Closing on a target player.
    Chase,
    /// In reach of the target; swinging.
    Attack,
    /// Walking back to the home anchor.
    Return,
}

/// Per-NPC scratch memory.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Blackboard {
    /// Current chase target.
    pub target: Option<ActorId>,
    /// Tick time of the last attack decision, ms.
    pub last_attack_ms: f64,
}

/// Run one AI tick for every NPC, in allocation order.
///
/// Returns the commands to apply next tick.
pub fn step_npcs(world: &mut World, tick: TickId, now_ms: f64) -> Vec<Command> {
    let npc_ids: Vec<ActorId> = world.npcs().keys().cloned().collect();
    let mut commands = Vec::new();

    for (index, id) in npc_ids.iter().enumerate() {
        let Some(npc) = world.npc(id) else { continue };
        let kind = npc.kind;
        let pos = npc.base.pos;
        let home = npc.home;
        let waypoints = npc.waypoints.clone();
        let has_path = npc.path.as_ref().map(|p| !p.complete()).unwrap_or(false);

        // Nearest live player, strictly-closest wins; allocation order
        // breaks ties.
        let mut nearest: Option<(ActorId, f64)> = None;
        for (pid, player) in world.players() {
            if !player.base.is_alive() {
                continue;
            }
            let dist = pos.distance(player.base.pos);
            if nearest.as_ref().map(|(_, d)| dist < *d).unwrap_or(true) {
                nearest = Some((pid.clone(), dist));
            }
        }

        let aggro = kind.aggro_range();
        let next = match nearest {
            Some((pid, dist)) if aggro > 0.0 && dist <= kind.attack_range() => {
                let Some(npc) = world.npc_mut(id) else { continue };
                npc.blackboard.target = Some(pid.clone());
                let target_pos = world.player(&pid).map(|p| p.base.pos).unwrap_or(pos);
                let dir = target_pos - pos;
                commands.push(command(id, tick, now_ms, CommandPayload::Move {
                    dx: 0.0,
                    dy: 0.0,
                    facing: skarn_core::Facing::from_vector(dir.x, dir.y),
                }));
                let Some(npc) = world.npc_mut(id) else { continue };
                if now_ms - npc.blackboard.last_attack_ms >= kind.attack_interval_ms() {
                    npc.blackboard.last_attack_ms = now_ms;
                    commands.push(command(id, tick, now_ms, CommandPayload::Action {
                        name: "attack".into(),
                    }));
                }
                AiState::Attack
            }
            Some((pid, dist)) if aggro > 0.0 && dist <= aggro => {
                let target_pos = world.player(&pid).map(|p| p.base.pos).unwrap_or(pos);
                let dir = (target_pos - pos).normalized();
                let Some(npc) = world.npc_mut(id) else { continue };
                npc.blackboard.target = Some(pid);
                commands.push(command(id, tick, now_ms, CommandPayload::Move {
                    dx: dir.x,
                    dy: dir.y,
                    facing: None,
                }));
                AiState::Chase
            }
            _ if pos.distance(home) > LEASH_RANGE => {
                let Some(npc) = world.npc_mut(id) else { continue };
                npc.blackboard.target = None;
                commands.push(command(id, tick, now_ms, CommandPayload::Path {
                    waypoints: smallvec::smallvec![home],
                }));
                AiState::Return
            }
            _ => match kind {
                NpcKind::Goblin => {
                    if !has_path && !waypoints.is_empty() {
                        commands.push(command(id, tick, now_ms, CommandPayload::Path {
                            waypoints: waypoints.clone(),
                        }));
                    }
                    AiState::Patrol
                }
                NpcKind::Rat => {
                    if tick.0 % WANDER_PERIOD == 0 {
                        let seed = world.config().seed ^ ((index as u64) << 32) ^ tick.0;
                        let mut rng = ChaCha8Rng::seed_from_u64(seed);
                        let angle = rng.gen_range(0.0..std::f64::consts::TAU);
                        commands.push(command(id, tick, now_ms, CommandPayload::Move {
                            dx: angle.cos(),
                            dy: angle.sin(),
                            facing: None,
                        }));
                    }
                    AiState::Patrol
                }
            },
        };

        if let Some(npc) = world.npc_mut(id) {
            if npc.ai != next {
                npc.ai = next;
            }
            if !matches!(next, AiState::Chase | AiState::Attack) {
                npc.blackboard.target = None;
            }
        }
    }

    commands
}

fn command(id: &ActorId, tick: TickId, now_ms: f64, payload: CommandPayload) -> Command {
    Command {
        actor: id.clone(),
        payload,
        origin_tick: tick,
        issued_at_ms: now_ms,
    }
}
