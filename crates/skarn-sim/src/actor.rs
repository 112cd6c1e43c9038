//! Actor data model: the embedded base shared by players and NPCs.
//!
//! Players and NPCs embed [`ActorState`]; the world owns both in
//! insertion-ordered registries. Mutation happens through `World`
//! write-barriers, never directly, so every change produces a patch.

use crate::ai::{AiState, Blackboard, NpcKind};
use crate::path::PathState;
use indexmap::IndexMap;
use skarn_core::{ActorId, Facing, Vec2};
use smallvec::SmallVec;

/// Slot-free stackable inventory keyed by fungibility key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Inventory {
    /// Fungibility key → quantity. Insertion order is acquisition order.
    pub stacks: IndexMap<String, u64>,
}

impl Inventory {
    /// Quantity held for a key.
    pub fn qty(&self, key: &str) -> u64 {
        self.stacks.get(key).copied().unwrap_or(0)
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.stacks.values().all(|&q| q == 0)
    }
}

/// Equipment slots.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Equipment {
    /// Slot name → equipped item.
    pub slots: IndexMap<String, String>,
}

/// A live status-effect instance on one actor.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusInstance {
    /// Status definition id (e.g. `burning`).
    pub def: String,
    /// When the status was first applied, ms of tick time.
    pub applied_at_ms: f64,
    /// Absolute expiry, ms of tick time. Extended on reapplication.
    pub expires_at_ms: f64,
    /// Next scheduled tick callback, ms of tick time.
    pub next_tick_ms: f64,
    /// Interval between tick callbacks, ms.
    pub interval_ms: f64,
    /// The actor (or obstacle) that caused the status.
    pub source: ActorId,
    /// Attached follow-actor visual effect instance, once spawned.
    pub visual: Option<skarn_core::EffectId>,
}

/// State shared by every actor kind.
#[derive(Clone, Debug, PartialEq)]
pub struct ActorState {
    /// World-unique id.
    pub id: ActorId,
    /// Center position in world units.
    pub pos: Vec2,
    /// Current facing; defaults to down and is never cleared.
    pub facing: Facing,
    /// Current health, clamped to `[0, max_health]`.
    pub health: f64,
    /// Maximum health. May be 0 for environmental actors.
    pub max_health: f64,
    /// Stackable inventory.
    pub inventory: Inventory,
    /// Equipment slots.
    pub equipment: Equipment,
    /// Ability id → last trigger time, ms of tick time.
    pub cooldowns: IndexMap<String, f64>,
    /// Live status effects, keyed by definition id.
    pub statuses: IndexMap<String, StatusInstance>,
    /// Movement intent, clamped to the unit circle.
    pub intent: Vec2,
}

impl ActorState {
    /// A fresh actor at a position with full health.
    pub fn new(id: ActorId, pos: Vec2, max_health: f64) -> Self {
        Self {
            id,
            pos,
            facing: Facing::default(),
            health: max_health,
            max_health,
            inventory: Inventory::default(),
            equipment: Equipment::default(),
            cooldowns: IndexMap::new(),
            statuses: IndexMap::new(),
            intent: Vec2::ZERO,
        }
    }

    /// Whether health is above zero.
    pub fn is_alive(&self) -> bool {
        self.health > 0.0
    }
}

/// A connected player's actor.
#[derive(Clone, Debug, PartialEq)]
pub struct Player {
    /// Shared actor state.
    pub base: ActorState,
    /// Tick time of the last applied input command, ms.
    pub last_input_ms: f64,
    /// Tick time of the last heartbeat, ms.
    pub last_heartbeat_ms: f64,
    /// Most recent round-trip estimate, ms.
    pub last_rtt_ms: Option<f64>,
    /// Active path-follow state, if any.
    pub path: Option<PathState>,
}

impl Player {
    /// A fresh player at a position.
    pub fn new(id: ActorId, pos: Vec2, max_health: f64, now_ms: f64) -> Self {
        Self {
            base: ActorState::new(id, pos, max_health),
            last_input_ms: now_ms,
            last_heartbeat_ms: now_ms,
            last_rtt_ms: None,
            path: None,
        }
    }
}

/// A server-controlled NPC.
#[derive(Clone, Debug, PartialEq)]
pub struct Npc {
    /// Shared actor state.
    pub base: ActorState,
    /// Behavioural archetype.
    pub kind: NpcKind,
    /// Current AI state.
    pub ai: AiState,
    /// Per-NPC scratch memory for the AI.
    pub blackboard: Blackboard,
    /// Patrol waypoints around `home`.
    pub waypoints: SmallVec<[Vec2; 8]>,
    /// Anchor position the NPC returns to.
    pub home: Vec2,
    /// Experience granted to the killer.
    pub experience_reward: u32,
    /// Active path-follow state, if any.
    pub path: Option<PathState>,
}

impl Npc {
    /// A fresh NPC of a kind at its home position.
    pub fn new(id: ActorId, kind: NpcKind, home: Vec2) -> Self {
        Self {
            base: ActorState::new(id, home, kind.max_health()),
            kind,
            ai: AiState::Idle,
            blackboard: Blackboard::default(),
            waypoints: SmallVec::new(),
            home,
            experience_reward: kind.experience_reward(),
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_actor_faces_down_with_full_health() {
        let actor = ActorState::new(ActorId::new("player-1"), Vec2::new(10.0, 20.0), 100.0);
        assert_eq!(actor.facing, Facing::Down);
        assert_eq!(actor.health, 100.0);
        assert!(actor.is_alive());
    }

    #[test]
    fn zero_max_health_actor_is_not_alive() {
        let actor = ActorState::new(ActorId::new("lava-1"), Vec2::ZERO, 0.0);
        assert!(!actor.is_alive());
    }

    #[test]
    fn inventory_qty_defaults_to_zero() {
        let inv = Inventory::default();
        assert_eq!(inv.qty("gold-ore"), 0);
        assert!(inv.is_empty());
    }
}
