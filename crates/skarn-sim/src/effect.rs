//! Effect intents, instances, and lifecycle events.
//!
//! An [`EffectIntent`] is a request to instantiate an effect this tick;
//! the manager drains intents, resolves them against the catalog, and
//! owns the resulting [`EffectInstance`]s through their
//! `Queued → Spawned → Ticking* → Ended` lifecycle. Every emitted
//! lifecycle event carries the tick and a per-instance sequence number
//! that starts at 1 and never gaps.

use crate::catalog::EffectDefinition;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use skarn_core::{ActorId, EffectId, Fx, Seq, TickId, Vec2};

/// Geometry shape discriminant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Axis-aligned rectangle (`width` × `height` at `offset`).
    #[default]
    Rect,
    /// Circle (`radius` around `offset`).
    Circle,
}

/// Delivery mode of an effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Affects whatever overlaps its geometry.
    Area,
    /// Attached to a specific target actor.
    Target,
    /// Client-side visual only; no gameplay overlap.
    Visual,
}

/// Quantized effect geometry, shared by intents and delivery state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    /// Shape discriminant.
    pub shape: ShapeKind,
    /// Rect width.
    pub width: Fx,
    /// Rect height.
    pub height: Fx,
    /// Circle radius.
    pub radius: Fx,
    /// X offset from the owner center.
    pub offset_x: Fx,
    /// Y offset from the owner center.
    pub offset_y: Fx,
}

/// Quantized motion state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Motion {
    /// Position x.
    pub x: Fx,
    /// Position y.
    pub y: Fx,
    /// Velocity x, units per second.
    pub vx: Fx,
    /// Velocity y, units per second.
    pub vy: Fx,
}

impl Motion {
    /// Quantize a position/velocity pair.
    pub fn from_vectors(pos: Vec2, vel: Vec2) -> Self {
        Self {
            x: Fx::from_f64(pos.x),
            y: Fx::from_f64(pos.y),
            vx: Fx::from_f64(vel.x),
            vy: Fx::from_f64(vel.y),
        }
    }

    /// Dequantized position.
    pub fn pos(self) -> Vec2 {
        Vec2::new(self.x.to_f64(), self.y.to_f64())
    }

    /// Dequantized velocity.
    pub fn vel(self) -> Vec2 {
        Vec2::new(self.vx.to_f64(), self.vy.to_f64())
    }
}

/// Replication flags controlling which lifecycle events reach clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replication {
    /// Emit the spawn event.
    pub send_spawn: bool,
    /// Emit update events on cadence ticks.
    pub send_updates: bool,
    /// Emit the end event.
    pub send_end: bool,
    /// The client owns presentation after spawn.
    pub managed_by_client: bool,
}

/// End-policy discriminant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndKind {
    /// Ends on its spawn tick.
    Instant,
    /// Ends when `ticks_remaining` reaches 0.
    Duration,
    /// Ends when a configured condition fires.
    Condition,
}

/// A condition that can end a `Condition`-policy instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndCondition {
    /// The owner (or followed actor) left the world.
    OwnerLost,
    /// The status this visual is attached to was cleared.
    StatusCleared,
}

/// End policy of an instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndPolicy {
    /// Discriminant.
    pub kind: EndKind,
    /// Conditions checked when `kind` is `Condition`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<EndCondition>,
}

/// Why an instance ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    /// Lifetime or range ran out.
    Expired,
    /// Stopped by hitting an obstacle or actor.
    Impact,
    /// The owner or followed actor left the world.
    OwnerLost,
    /// Explicitly stopped by the simulation.
    Stopped,
}

/// Per-instance hook identifiers, resolved from catalog hook names.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookId {
    /// Resolve the melee hitbox against obstacles and actors at spawn.
    MeleeSpawn,
    /// Create a world projectile on spawn; advance it per tick.
    ProjectileLifecycle,
    /// Attach a follow-actor visual to the target's status.
    StatusVisual,
    /// Apply damage to the followed actor per cadence tick.
    StatusDamage,
    /// Ground decal; no behaviour beyond its duration.
    BloodDecal,
}

impl HookId {
    /// Parse a catalog hook name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "melee-spawn" => Some(Self::MeleeSpawn),
            "projectile-lifecycle" => Some(Self::ProjectileLifecycle),
            "status-visual" => Some(Self::StatusVisual),
            "status-damage" => Some(Self::StatusDamage),
            "blood-decal" => Some(Self::BloodDecal),
            _ => None,
        }
    }
}

/// Resolved spawn/tick hooks for an instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HookSet {
    /// Invoked once after instantiation.
    pub on_spawn: Option<HookId>,
    /// Invoked on cadence ticks.
    pub on_tick: Option<HookId>,
}

/// Delivery state of a live instance: geometry plus motion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryState {
    /// Effect geometry, owner-relative offsets included.
    pub geometry: Geometry,
    /// Current quantized motion.
    pub motion: Motion,
}

/// Behaviour state of a live instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorState {
    /// Ticks left before a duration end.
    pub ticks_remaining: u64,
    /// Cadence in ticks between tick-hook invocations; always `>= 1`.
    pub tick_cadence: u32,
    /// Ticks until the next cadence match; 0 means this tick fires.
    pub cooldown_ticks: u32,
    /// Extra per-instance parameters.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra: IndexMap<String, Fx>,
    /// Stack count for stacking effects.
    pub stacks: u32,
}

/// Request to instantiate an effect this tick.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectIntent {
    /// Catalog entry id.
    pub entry_id: String,
    /// Effect type id (informational; copied from the definition).
    pub type_id: String,
    /// Delivery mode.
    pub delivery: Delivery,
    /// Acting actor, if any.
    pub source: Option<ActorId>,
    /// Target actor for `Target`/follow deliveries.
    pub target: Option<ActorId>,
    /// Quantized geometry.
    pub geometry: Geometry,
    /// Initial motion for moving effects.
    pub motion: Option<Motion>,
    /// Lifetime override; falls back to the definition lifetime.
    pub duration_ticks: Option<u64>,
    /// Cadence override; normalized to `>= 1` at instantiation.
    pub tick_cadence: Option<u32>,
    /// Integer fixed-point parameters.
    pub params: IndexMap<String, Fx>,
    /// Status id a spawned visual should attach itself to.
    pub attach_status: Option<String>,
}

/// In-flight projectile physics owned by an instance's tick hook.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectileState {
    /// Unquantized position.
    pub pos: Vec2,
    /// Unquantized velocity, units per second.
    pub vel: Vec2,
    /// Speed, units per second.
    pub speed: f64,
    /// Travel budget left, world units.
    pub remaining_range: f64,
    /// Actors already hit; each target is hit at most once.
    pub hit: Vec<ActorId>,
    /// Set when the projectile stops; forces the instance to end.
    pub stopped: Option<EndReason>,
    /// Stop at the first actor hit.
    pub stop_on_hit: bool,
    /// Stop after this many distinct targets.
    pub max_targets: u32,
    /// Whether the owner can be hit.
    pub affects_owner: bool,
    /// Catalog entry spawned as an area effect on impact.
    pub explode_on_impact: Option<String>,
    /// Catalog entry spawned as an area effect on range expiry.
    pub explode_on_expiry: Option<String>,
    /// Suppress the expiry explosion when anything was hit.
    pub expiry_only_if_no_hits: bool,
}

/// Per-effect combat telemetry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectStats {
    /// Tick the instance spawned.
    pub spawn_tick: TickId,
    /// Tick of the first landed hit.
    pub first_hit_tick: Option<TickId>,
    /// Total hits landed.
    pub hits: u64,
    /// Distinct victims, in first-hit order.
    pub victims: Vec<ActorId>,
    /// Total damage dealt (positive number).
    pub damage: f64,
}

/// Authoritative server-owned lifecycle record for one effect.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectInstance {
    /// Monotonically allocated id (`contract-effect-{n}`).
    pub id: EffectId,
    /// Catalog entry key.
    pub entry_id: String,
    /// Contract id from the catalog entry.
    pub definition_id: String,
    /// Tick the instance was created.
    pub start_tick: TickId,
    /// Owning actor, if any.
    pub owner: Option<ActorId>,
    /// Actor this instance follows, if any.
    pub follow: Option<ActorId>,
    /// Geometry and motion.
    pub delivery: DeliveryState,
    /// Lifetime and cadence state.
    pub behavior: BehaviorState,
    /// Defensive copy of the intent parameters.
    pub params: IndexMap<String, Fx>,
    /// Replication flags derived from the definition.
    pub replication: Replication,
    /// End policy derived from the definition.
    pub end: EndPolicy,
    /// Resolved hooks.
    pub hooks: HookSet,
    /// Status applied to victims of this effect's hits.
    pub status_effect: Option<String>,
    /// Status id a visual instance is attached to.
    pub attach_status: Option<String>,
    /// Projectile physics for projectile-hook instances.
    pub projectile: Option<ProjectileState>,
    /// Combat telemetry.
    pub stats: EffectStats,
}

impl EffectInstance {
    /// Numeric parameter lookup, dequantized.
    pub fn param(&self, key: &str) -> Option<f64> {
        self.params.get(key).map(|fx| fx.to_f64())
    }

    /// Build the wire snapshot emitted with the spawn event.
    pub fn snapshot(&self, definition: &EffectDefinition) -> EffectSnapshot {
        EffectSnapshot {
            id: self.id.clone(),
            entry_id: self.entry_id.clone(),
            definition_id: self.definition_id.clone(),
            definition: definition.clone(),
            start_tick: self.start_tick,
            delivery_state: self.delivery,
            behavior_state: self.behavior.clone(),
            params: self.params.clone(),
            replication: self.replication,
            end: self.end.clone(),
            owner_actor_id: self.owner.clone(),
            follow_actor_id: self.follow.clone(),
        }
    }
}

/// Wire copy of an instance, carried by spawn events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSnapshot {
    /// Instance id.
    pub id: EffectId,
    /// Catalog entry key.
    pub entry_id: String,
    /// Contract id.
    pub definition_id: String,
    /// Embedded catalog definition.
    pub definition: EffectDefinition,
    /// Spawn tick.
    pub start_tick: TickId,
    /// Geometry and motion at spawn.
    pub delivery_state: DeliveryState,
    /// Behaviour state at spawn.
    pub behavior_state: BehaviorState,
    /// Fixed-point parameters.
    pub params: IndexMap<String, Fx>,
    /// Replication flags.
    pub replication: Replication,
    /// End policy.
    pub end: EndPolicy,
    /// Owner, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_actor_id: Option<ActorId>,
    /// Followed actor, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_actor_id: Option<ActorId>,
}

/// Spawn lifecycle event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnEvent {
    /// Emission tick.
    pub tick: TickId,
    /// Per-instance sequence; always 1 for a spawn.
    pub seq: Seq,
    /// Instance snapshot.
    pub instance: EffectSnapshot,
}

/// Update lifecycle event, carrying defensive copies of mutable state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    /// Emission tick.
    pub tick: TickId,
    /// Per-instance sequence.
    pub seq: Seq,
    /// Instance id.
    pub id: EffectId,
    /// Current delivery state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_state: Option<DeliveryState>,
    /// Current behaviour state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior_state: Option<BehaviorState>,
}

/// End lifecycle event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndEvent {
    /// Emission tick.
    pub tick: TickId,
    /// Per-instance sequence.
    pub seq: Seq,
    /// Instance id.
    pub id: EffectId,
    /// Why it ended.
    pub reason: EndReason,
}

/// A staged lifecycle event in the journal.
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleEvent {
    /// Instance spawned.
    Spawn(SpawnEvent),
    /// Instance updated.
    Update(UpdateEvent),
    /// Instance ended.
    End(EndEvent),
}

impl LifecycleEvent {
    /// Emission tick.
    pub fn tick(&self) -> TickId {
        match self {
            Self::Spawn(e) => e.tick,
            Self::Update(e) => e.tick,
            Self::End(e) => e.tick,
        }
    }

    /// Per-instance sequence.
    pub fn seq(&self) -> Seq {
        match self {
            Self::Spawn(e) => e.seq,
            Self::Update(e) => e.seq,
            Self::End(e) => e.seq,
        }
    }

    /// Instance id.
    pub fn id(&self) -> &EffectId {
        match self {
            Self::Spawn(e) => &e.instance.id,
            Self::Update(e) => &e.id,
            Self::End(e) => &e.id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_names_parse() {
        assert_eq!(HookId::parse("melee-spawn"), Some(HookId::MeleeSpawn));
        assert_eq!(
            HookId::parse("projectile-lifecycle"),
            Some(HookId::ProjectileLifecycle)
        );
        assert_eq!(HookId::parse("no-such-hook"), None);
    }

    #[test]
    fn end_reason_wire_form_is_kebab() {
        assert_eq!(
            serde_json::to_string(&EndReason::OwnerLost).unwrap(),
            "\"owner-lost\""
        );
        assert_eq!(
            serde_json::to_string(&EndReason::Expired).unwrap(),
            "\"expired\""
        );
    }

    #[test]
    fn motion_round_trips_through_fx() {
        let m = Motion::from_vectors(Vec2::new(12.34, -5.0), Vec2::new(320.0, 0.0));
        assert_eq!(m.pos(), Vec2::new(12.34, -5.0));
        assert_eq!(m.vel(), Vec2::new(320.0, 0.0));
    }

    #[test]
    fn behavior_state_skips_empty_extra() {
        let b = BehaviorState {
            ticks_remaining: 3,
            tick_cadence: 1,
            cooldown_ticks: 0,
            extra: IndexMap::new(),
            stacks: 1,
        };
        let json = serde_json::to_string(&b).unwrap();
        assert!(!json.contains("extra"), "{json}");
        assert!(json.contains("\"ticksRemaining\":3"), "{json}");
    }
}
