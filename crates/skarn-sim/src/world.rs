//! The single owning world.
//!
//! One type owns every actor, obstacle, and ground item; there are no
//! parallel or adapter world views. All mutation goes through
//! write-barrier methods that append the corresponding [`Patch`] to the
//! journal, so the diff stream is complete by construction. Read access
//! is free; mutable access from outside this crate exists only through
//! the barriers.

use crate::actor::{Npc, Player, StatusInstance};
use crate::ai::NpcKind;
use crate::effect::EndReason;
use crate::item::{tile_of, GroundItem};
use crate::journal::Journal;
use crate::obstacle::{Obstacle, ObstacleKind};
use crate::patch::Patch;
use crate::path::PathState;
use crate::snapshot::{ActorSnapshot, WorldSnapshot};
use indexmap::IndexMap;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use skarn_core::{ActorId, Aabb, EffectId, Facing, TickId, Vec2, WorldConfig};
use smallvec::SmallVec;

/// Health deltas smaller than this round to zero and short-circuit.
pub const HEALTH_EPSILON: f64 = 1e-6;

/// Result of a health write-barrier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HealthChange {
    /// The delta actually applied after clamping.
    pub applied: f64,
    /// Resulting health.
    pub health: f64,
    /// Whether the actor was alive before the change.
    pub was_alive: bool,
    /// Whether this change brought a live actor to zero.
    pub defeated: bool,
}

/// One damage telemetry record.
#[derive(Clone, Debug, PartialEq)]
pub struct DamageRecord {
    /// Tick of the hit.
    pub tick: TickId,
    /// Ability or effect label that caused it.
    pub ability: String,
    /// Victim.
    pub target: ActorId,
    /// Damage amount (positive).
    pub amount: f64,
    /// Victim health after the hit.
    pub resulting_health: f64,
    /// Status id when the damage came from a status tick.
    pub status_cause: Option<String>,
}

/// One defeat telemetry record.
#[derive(Clone, Debug, PartialEq)]
pub struct DefeatRecord {
    /// Tick of the defeat.
    pub tick: TickId,
    /// Defeated actor.
    pub target: ActorId,
    /// Ability that landed the final hit.
    pub ability: String,
    /// Experience granted (0 for players).
    pub experience_reward: u32,
}

/// Combat telemetry accumulated during ticks, drained by the engine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorldTelemetry {
    /// Damage records in emission order.
    pub damage: Vec<DamageRecord>,
    /// Defeat records in emission order.
    pub defeats: Vec<DefeatRecord>,
    /// Effect intents dropped for lifecycle violations.
    pub dropped_intents: u64,
}

/// Deferred requests from the world to the effect manager, processed at
/// the start of the manager's next tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectMailbox {
    /// Instances to end with a reason.
    pub ends: Vec<(EffectId, EndReason)>,
    /// Duration extensions: `ticks_remaining = max(current, requested)`.
    pub extends: Vec<(EffectId, u64)>,
}

impl EffectMailbox {
    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty() && self.extends.is_empty()
    }
}

/// The authoritative world.
#[derive(Debug)]
pub struct World {
    config: WorldConfig,
    players: IndexMap<ActorId, Player>,
    npcs: IndexMap<ActorId, Npc>,
    obstacles: Vec<Obstacle>,
    ground_items: IndexMap<String, GroundItem>,
    journal: Journal,
    telemetry: WorldTelemetry,
    mailbox: EffectMailbox,
    next_player: u64,
    next_npc: u64,
    next_item: u64,
    next_obstacle: IndexMap<ObstacleKind, u64>,
    rng: ChaCha8Rng,
}

/// Default player maximum health.
pub const PLAYER_MAX_HEALTH: f64 = 100.0;

impl World {
    /// Create a world and populate it from the config counts.
    pub fn new(config: WorldConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut world = Self {
            journal: Journal::new(config.keyframe_ring),
            config,
            players: IndexMap::new(),
            npcs: IndexMap::new(),
            obstacles: Vec::new(),
            ground_items: IndexMap::new(),
            telemetry: WorldTelemetry::default(),
            mailbox: EffectMailbox::default(),
            next_player: 0,
            next_npc: 0,
            next_item: 0,
            next_obstacle: IndexMap::new(),
            rng,
        };
        world.populate();
        world
    }

    /// Seeded world population: obstacles first, then NPCs.
    fn populate(&mut self) {
        for _ in 0..self.config.stone_count {
            let size = self.rng.gen_range(40.0..80.0);
            let (x, y) = self.random_spot();
            self.add_obstacle(ObstacleKind::Stone, Aabb::new(x, y, size, size));
        }
        for _ in 0..self.config.gold_ore_count {
            let (x, y) = self.random_spot();
            self.add_obstacle(ObstacleKind::GoldOre, Aabb::new(x, y, 40.0, 40.0));
        }
        for _ in 0..self.config.lava_count {
            let (x, y) = self.random_spot();
            self.add_obstacle(ObstacleKind::Lava, Aabb::new(x, y, 80.0, 80.0));
        }
        for i in 0..self.config.npc_count {
            let kind = if i % 2 == 0 {
                NpcKind::Goblin
            } else {
                NpcKind::Rat
            };
            let (x, y) = self.random_spot();
            let home = self.clamp_center(Vec2::new(x, y));
            self.add_npc(kind, home);
        }
    }

    fn random_spot(&mut self) -> (f64, f64) {
        (
            self.rng.gen_range(0.0..self.config.world_width),
            self.rng.gen_range(0.0..self.config.world_height),
        )
    }

    // ── accessors ───────────────────────────────────────────────

    /// The construction config.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// World bounds rectangle.
    pub fn bounds(&self) -> Aabb {
        Aabb::new(0.0, 0.0, self.config.world_width, self.config.world_height)
    }

    /// Clamp an actor center into `[half, dim - half]` on each axis.
    pub fn clamp_center(&self, pos: Vec2) -> Vec2 {
        let half = self.config.half_extent;
        Vec2::new(
            pos.x.clamp(half, self.config.world_width - half),
            pos.y.clamp(half, self.config.world_height - half),
        )
    }

    /// The journal.
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Mutable journal access for the marshaller.
    pub fn journal_mut(&mut self) -> &mut Journal {
        &mut self.journal
    }

    /// Players in allocation order.
    pub fn players(&self) -> &IndexMap<ActorId, Player> {
        &self.players
    }

    /// NPCs in allocation order.
    pub fn npcs(&self) -> &IndexMap<ActorId, Npc> {
        &self.npcs
    }

    /// Obstacles in allocation order.
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Ground items in allocation order.
    pub fn ground_items(&self) -> &IndexMap<String, GroundItem> {
        &self.ground_items
    }

    /// A player by id.
    pub fn player(&self, id: &ActorId) -> Option<&Player> {
        self.players.get(id)
    }

    /// An NPC by id.
    pub fn npc(&self, id: &ActorId) -> Option<&Npc> {
        self.npcs.get(id)
    }

    /// The shared actor state for a player or NPC.
    pub fn actor(&self, id: &ActorId) -> Option<&crate::actor::ActorState> {
        self.players
            .get(id)
            .map(|p| &p.base)
            .or_else(|| self.npcs.get(id).map(|n| &n.base))
    }

    pub(crate) fn actor_mut(&mut self, id: &ActorId) -> Option<&mut crate::actor::ActorState> {
        if let Some(p) = self.players.get_mut(id) {
            return Some(&mut p.base);
        }
        self.npcs.get_mut(id).map(|n| &mut n.base)
    }

    pub(crate) fn player_mut(&mut self, id: &ActorId) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    pub(crate) fn status_mut(
        &mut self,
        id: &ActorId,
        status: &str,
    ) -> Option<&mut StatusInstance> {
        self.actor_mut(id)?.statuses.get_mut(status)
    }

    pub(crate) fn npc_mut(&mut self, id: &ActorId) -> Option<&mut Npc> {
        self.npcs.get_mut(id)
    }

    /// Whether the id names a live player.
    pub fn is_player(&self, id: &ActorId) -> bool {
        self.players.contains_key(id)
    }

    /// Whether the id names a live NPC.
    pub fn is_npc(&self, id: &ActorId) -> bool {
        self.npcs.contains_key(id)
    }

    /// Collision square for an actor.
    pub fn actor_aabb(&self, id: &ActorId) -> Option<Aabb> {
        self.actor(id)
            .map(|a| Aabb::from_center(a.pos, self.config.half_extent))
    }

    /// All actor ids in lexicographic ascending order (collision phases).
    pub fn actor_ids_sorted(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self
            .players
            .keys()
            .chain(self.npcs.keys())
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// All actor ids in allocation order: players, then NPCs.
    pub fn actor_ids_in_order(&self) -> Vec<ActorId> {
        self.players
            .keys()
            .chain(self.npcs.keys())
            .cloned()
            .collect()
    }

    /// Combat telemetry accumulated so far.
    pub fn telemetry(&self) -> &WorldTelemetry {
        &self.telemetry
    }

    pub(crate) fn telemetry_mut(&mut self) -> &mut WorldTelemetry {
        &mut self.telemetry
    }

    /// Drain accumulated combat telemetry.
    pub fn drain_telemetry(&mut self) -> WorldTelemetry {
        std::mem::take(&mut self.telemetry)
    }

    // ── actor lifecycle ─────────────────────────────────────────

    /// Add a player at the world center.
    pub fn add_player(&mut self, now_ms: f64) -> ActorId {
        let center = Vec2::new(self.config.world_width / 2.0, self.config.world_height / 2.0);
        self.add_player_at(center, now_ms)
    }

    /// Add a player at a position (clamped into bounds).
    pub fn add_player_at(&mut self, pos: Vec2, now_ms: f64) -> ActorId {
        self.next_player += 1;
        let id = ActorId::new(format!("player-{}", self.next_player));
        let pos = self.clamp_center(pos);
        let player = Player::new(id.clone(), pos, PLAYER_MAX_HEALTH, now_ms);
        self.journal.record_patch(Patch::PlayerJoined {
            id: id.clone(),
            x: pos.x,
            y: pos.y,
            facing: player.base.facing,
            health: player.base.health,
            max_health: player.base.max_health,
        });
        self.players.insert(id.clone(), player);
        id
    }

    /// Add an NPC at its home position with a default square patrol.
    pub fn add_npc(&mut self, kind: NpcKind, home: Vec2) -> ActorId {
        self.next_npc += 1;
        let id = ActorId::new(format!("npc-{}", self.next_npc));
        let home = self.clamp_center(home);
        let mut npc = Npc::new(id.clone(), kind, home);
        let reach = 64.0;
        npc.waypoints = SmallVec::from_vec(vec![
            self.clamp_center(home + Vec2::new(reach, 0.0)),
            self.clamp_center(home + Vec2::new(reach, reach)),
            self.clamp_center(home + Vec2::new(0.0, reach)),
            home,
        ]);
        self.npcs.insert(id.clone(), npc);
        id
    }

    /// Remove a player or NPC, emitting the terminal patch.
    pub fn remove_actor(&mut self, id: &ActorId) -> bool {
        let existed = self.players.shift_remove(id).is_some() || self.npcs.shift_remove(id).is_some();
        if existed {
            self.journal
                .record_patch(Patch::ActorRemoved { id: id.clone() });
        }
        existed
    }

    /// Place an obstacle, clipped to world bounds. Returns its id.
    pub fn add_obstacle(&mut self, kind: ObstacleKind, bounds: Aabb) -> String {
        let n = self.next_obstacle.entry(kind).or_insert(0);
        *n += 1;
        let id = format!("{}-{}", kind.id_prefix(), n);
        self.obstacles.push(Obstacle {
            id: id.clone(),
            kind,
            bounds: bounds.clipped_to(self.bounds()),
        });
        id
    }

    // ── write-barriers ──────────────────────────────────────────

    /// Position setter; emits the kind-appropriate position patch.
    pub fn set_position(&mut self, id: &ActorId, pos: Vec2) {
        let is_player = self.is_player(id);
        if let Some(actor) = self.actor_mut(id) {
            actor.pos = pos;
            let facing = actor.facing;
            let patch = if is_player {
                Patch::PlayerPosition {
                    id: id.clone(),
                    x: pos.x,
                    y: pos.y,
                    facing,
                }
            } else {
                Patch::NpcPosition {
                    id: id.clone(),
                    x: pos.x,
                    y: pos.y,
                    facing,
                }
            };
            self.journal.record_patch(patch);
        }
    }

    /// Facing setter; re-emits the position patch when it changes.
    pub fn set_facing(&mut self, id: &ActorId, facing: Facing) {
        let Some(actor) = self.actor_mut(id) else {
            return;
        };
        if actor.facing == facing {
            return;
        }
        actor.facing = facing;
        let pos = actor.pos;
        self.set_position(id, pos);
    }

    /// Health setter: clamps to `[0, max_health]`, short-circuits when
    /// the delta rounds to zero, and emits the health patch.
    pub fn apply_health_delta(&mut self, id: &ActorId, delta: f64) -> Option<HealthChange> {
        let is_player = self.is_player(id);
        let actor = self.actor_mut(id)?;
        let before = actor.health;
        let after = (before + delta).clamp(0.0, actor.max_health);
        let applied = after - before;
        if applied.abs() < HEALTH_EPSILON {
            return Some(HealthChange {
                applied: 0.0,
                health: before,
                was_alive: before > 0.0,
                defeated: false,
            });
        }
        actor.health = after;
        let max_health = actor.max_health;
        let patch = if is_player {
            Patch::PlayerHealth {
                id: id.clone(),
                health: after,
                max_health,
            }
        } else {
            Patch::NpcHealth {
                id: id.clone(),
                health: after,
                max_health,
            }
        };
        self.journal.record_patch(patch);
        Some(HealthChange {
            applied,
            health: after,
            was_alive: before > 0.0,
            defeated: before > 0.0 && after == 0.0,
        })
    }

    /// Inventory quantity barrier: adjusts one fungibility key and emits
    /// the absolute quantity.
    pub fn add_inventory_qty(&mut self, id: &ActorId, key: &str, delta: i64) -> u64 {
        let Some(actor) = self.actor_mut(id) else {
            return 0;
        };
        let slot = actor.inventory.stacks.entry(key.to_string()).or_insert(0);
        let qty = slot.saturating_add_signed(delta);
        *slot = qty;
        self.journal.record_patch(Patch::InventoryQty {
            id: id.clone(),
            item: key.to_string(),
            qty,
        });
        qty
    }

    /// Equipment slot barrier.
    pub fn set_equipment(&mut self, id: &ActorId, slot: &str, item: Option<String>) {
        let Some(actor) = self.actor_mut(id) else {
            return;
        };
        match &item {
            Some(v) => {
                actor.equipment.slots.insert(slot.to_string(), v.clone());
            }
            None => {
                actor.equipment.slots.shift_remove(slot);
            }
        }
        self.journal.record_patch(Patch::Equipment {
            id: id.clone(),
            slot: slot.to_string(),
            item,
        });
    }

    /// Insert a new status instance.
    pub fn insert_status(&mut self, id: &ActorId, status: StatusInstance) {
        let Some(actor) = self.actor_mut(id) else {
            return;
        };
        let patch = Patch::StatusEffectAdded {
            id: id.clone(),
            status: status.def.clone(),
            expires_at_ms: status.expires_at_ms,
        };
        actor.statuses.insert(status.def.clone(), status);
        self.journal.record_patch(patch);
    }

    /// Refresh an existing status: extend expiry and update the source.
    pub fn refresh_status(
        &mut self,
        id: &ActorId,
        status: &str,
        expires_at_ms: f64,
        source: ActorId,
    ) {
        let Some(actor) = self.actor_mut(id) else {
            return;
        };
        let Some(inst) = actor.statuses.get_mut(status) else {
            return;
        };
        inst.expires_at_ms = expires_at_ms;
        inst.source = source;
        self.journal.record_patch(Patch::StatusEffectAdded {
            id: id.clone(),
            status: status.to_string(),
            expires_at_ms,
        });
    }

    /// Remove a status, emitting the removal patch.
    pub fn remove_status(&mut self, id: &ActorId, status: &str) -> Option<StatusInstance> {
        let actor = self.actor_mut(id)?;
        let inst = actor.statuses.shift_remove(status)?;
        self.journal.record_patch(Patch::StatusEffectRemoved {
            id: id.clone(),
            status: status.to_string(),
        });
        Some(inst)
    }

    /// Record the visual instance attached to a status.
    pub fn attach_status_visual(&mut self, id: &ActorId, status: &str, effect: EffectId) {
        if let Some(actor) = self.actor_mut(id) {
            if let Some(inst) = actor.statuses.get_mut(status) {
                inst.visual = Some(effect);
            }
        }
    }

    /// Forget a status's visual pointer if it still names this effect.
    pub fn clear_status_visual(&mut self, id: &ActorId, status: &str, effect: &EffectId) {
        if let Some(inst) = self.status_mut(id, status) {
            if inst.visual.as_ref() == Some(effect) {
                inst.visual = None;
            }
        }
    }

    /// Drop a stack on the ground, merging per `(tile, fungibility_key)`.
    pub fn spawn_ground_item(
        &mut self,
        item_type: &str,
        fungibility_key: &str,
        qty: u64,
        pos: Vec2,
    ) -> String {
        let tile = tile_of(pos);
        if let Some(existing) = self
            .ground_items
            .values()
            .find(|g| g.tile == tile && g.fungibility_key == fungibility_key)
        {
            let id = existing.id.clone();
            let new_qty = existing.qty + qty;
            self.set_ground_item_qty(&id, new_qty);
            return id;
        }
        self.next_item += 1;
        let id = format!("ground-item-{}", self.next_item);
        let item = GroundItem {
            id: id.clone(),
            item_type: item_type.to_string(),
            fungibility_key: fungibility_key.to_string(),
            qty,
            x: pos.x,
            y: pos.y,
            tile,
        };
        self.journal.record_patch(Patch::GroundItemAdded {
            id: id.clone(),
            item_type: item.item_type.clone(),
            fungibility_key: item.fungibility_key.clone(),
            qty,
            x: pos.x,
            y: pos.y,
        });
        self.ground_items.insert(id.clone(), item);
        id
    }

    /// Ground item quantity barrier; quantity 0 removes the stack and is
    /// itself the terminal patch.
    pub fn set_ground_item_qty(&mut self, id: &str, qty: u64) {
        let Some(item) = self.ground_items.get_mut(id) else {
            return;
        };
        item.qty = qty;
        self.journal.record_patch(Patch::GroundItemQty {
            id: id.to_string(),
            qty,
        });
        if qty == 0 {
            self.ground_items.shift_remove(id);
        }
    }

    // ── applier support (not replicated, no patches) ────────────

    /// Store a movement intent, deriving facing from the vector.
    pub fn set_move_intent(
        &mut self,
        id: &ActorId,
        dx: f64,
        dy: f64,
        fallback: Option<Facing>,
        now_ms: f64,
    ) {
        let intent = Vec2::new(dx, dy).clamp_len(1.0);
        let derived = Facing::from_vector(intent.x, intent.y).or(fallback);
        if let Some(player) = self.players.get_mut(id) {
            player.base.intent = intent;
            player.last_input_ms = now_ms;
            player.path = None;
            if let Some(f) = derived {
                let pos = player.base.pos;
                if player.base.facing != f {
                    player.base.facing = f;
                    self.set_position(id, pos);
                }
            }
        } else if let Some(npc) = self.npcs.get_mut(id) {
            npc.base.intent = intent;
            npc.path = None;
            if let Some(f) = derived {
                let pos = npc.base.pos;
                if npc.base.facing != f {
                    npc.base.facing = f;
                    self.set_position(id, pos);
                }
            }
        }
    }

    /// Replace the actor's path-follow state.
    pub fn set_path(&mut self, id: &ActorId, waypoints: SmallVec<[Vec2; 8]>, now_ms: f64) {
        let state = PathState::new(waypoints);
        if let Some(player) = self.players.get_mut(id) {
            player.path = state;
            player.base.intent = Vec2::ZERO;
            player.last_input_ms = now_ms;
        } else if let Some(npc) = self.npcs.get_mut(id) {
            npc.path = state;
            npc.base.intent = Vec2::ZERO;
        }
    }

    /// Record a heartbeat and return the RTT estimate.
    pub fn record_heartbeat(
        &mut self,
        id: &ActorId,
        client_sent_ms: f64,
        now_ms: f64,
    ) -> Option<f64> {
        let player = self.players.get_mut(id)?;
        player.last_heartbeat_ms = now_ms;
        let rtt = (now_ms - client_sent_ms).max(0.0);
        player.last_rtt_ms = Some(rtt);
        Some(rtt)
    }

    // ── effect mailbox ──────────────────────────────────────────

    /// Ask the effect manager to end an instance next tick.
    pub fn request_effect_end(&mut self, effect: EffectId, reason: EndReason) {
        self.mailbox.ends.push((effect, reason));
    }

    /// Ask the effect manager to extend an instance's duration metadata.
    /// Extensions never shorten: the manager takes the max.
    pub fn request_effect_extend(&mut self, effect: EffectId, ticks_remaining: u64) {
        self.mailbox.extends.push((effect, ticks_remaining));
    }

    /// Take the pending mailbox (called by the manager each tick).
    pub fn take_effect_mailbox(&mut self) -> EffectMailbox {
        std::mem::take(&mut self.mailbox)
    }

    // ── snapshots ───────────────────────────────────────────────

    /// Build the full-state snapshot for a tick.
    pub fn snapshot(&self, tick: TickId) -> WorldSnapshot {
        let actor_snapshot = |base: &crate::actor::ActorState, kind: Option<String>| ActorSnapshot {
            id: base.id.clone(),
            x: base.pos.x,
            y: base.pos.y,
            facing: base.facing,
            health: base.health,
            max_health: base.max_health,
            inventory: base
                .inventory
                .stacks
                .iter()
                .filter(|(_, &q)| q > 0)
                .map(|(k, &q)| (k.clone(), q))
                .collect(),
            equipment: base.equipment.slots.clone(),
            statuses: base
                .statuses
                .iter()
                .map(|(k, s)| (k.clone(), s.expires_at_ms))
                .collect(),
            kind,
        };
        WorldSnapshot {
            t: tick,
            players: self
                .players
                .values()
                .map(|p| actor_snapshot(&p.base, None))
                .collect(),
            npcs: self
                .npcs
                .values()
                .map(|n| actor_snapshot(&n.base, Some(n.kind.to_string())))
                .collect(),
            obstacles: self.obstacles.clone(),
            ground_items: self.ground_items.values().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new(WorldConfig::default())
    }

    // ── lifecycle tests ────────────────────────────────────────

    #[test]
    fn add_player_allocates_sequential_ids_and_patches() {
        let mut w = world();
        let a = w.add_player(0.0);
        let b = w.add_player(0.0);
        assert_eq!(a.as_str(), "player-1");
        assert_eq!(b.as_str(), "player-2");
        let patches = w.journal_mut().drain_patches();
        assert!(matches!(patches[0], Patch::PlayerJoined { .. }));
        assert_eq!(patches.len(), 2);
    }

    #[test]
    fn remove_actor_emits_terminal_patch() {
        let mut w = world();
        let id = w.add_player(0.0);
        w.journal_mut().drain_patches();
        assert!(w.remove_actor(&id));
        let patches = w.journal_mut().drain_patches();
        assert_eq!(
            patches,
            vec![Patch::ActorRemoved { id: id.clone() }]
        );
        assert!(!w.remove_actor(&id));
    }

    #[test]
    fn population_is_seed_deterministic() {
        let config = WorldConfig {
            seed: 7,
            stone_count: 3,
            gold_ore_count: 2,
            lava_count: 1,
            npc_count: 4,
            ..WorldConfig::default()
        };
        let a = World::new(config.clone());
        let b = World::new(config);
        assert_eq!(a.obstacles(), b.obstacles());
        assert_eq!(
            a.npcs().values().map(|n| n.home).collect::<Vec<_>>(),
            b.npcs().values().map(|n| n.home).collect::<Vec<_>>()
        );
    }

    // ── health barrier tests ───────────────────────────────────

    #[test]
    fn health_clamps_at_zero_and_max() {
        let mut w = world();
        let id = w.add_player(0.0);
        let change = w.apply_health_delta(&id, -250.0).unwrap();
        assert_eq!(change.health, 0.0);
        assert_eq!(change.applied, -100.0);
        assert!(change.defeated);

        let change = w.apply_health_delta(&id, 500.0).unwrap();
        assert_eq!(change.health, 100.0);
        assert!(!change.defeated);
    }

    #[test]
    fn tiny_delta_short_circuits_without_patch() {
        let mut w = world();
        let id = w.add_player(0.0);
        w.journal_mut().drain_patches();
        let change = w.apply_health_delta(&id, 1e-9).unwrap();
        assert_eq!(change.applied, 0.0);
        assert_eq!(w.journal().pending_patches(), 0);
    }

    #[test]
    fn defeated_only_on_live_to_zero_transition() {
        let mut w = world();
        let id = w.add_player(0.0);
        assert!(w.apply_health_delta(&id, -100.0).unwrap().defeated);
        // Already at zero: no second defeat.
        assert!(!w.apply_health_delta(&id, -10.0).unwrap().defeated);
    }

    // ── intent and facing tests ────────────────────────────────

    #[test]
    fn move_intent_is_clamped_and_derives_facing() {
        let mut w = world();
        let id = w.add_player(0.0);
        w.set_move_intent(&id, 3.0, 4.0, None, 10.0);
        let actor = w.actor(&id).unwrap();
        assert!((actor.intent.len() - 1.0).abs() < 1e-9);
        assert_eq!(actor.facing, Facing::Down);
    }

    #[test]
    fn zero_intent_falls_back_to_supplied_facing() {
        let mut w = world();
        let id = w.add_player(0.0);
        w.set_move_intent(&id, 0.0, 0.0, Some(Facing::Left), 10.0);
        assert_eq!(w.actor(&id).unwrap().facing, Facing::Left);
    }

    #[test]
    fn zero_intent_without_facing_keeps_previous() {
        let mut w = world();
        let id = w.add_player(0.0);
        w.set_move_intent(&id, 1.0, 0.0, None, 10.0);
        assert_eq!(w.actor(&id).unwrap().facing, Facing::Right);
        w.set_move_intent(&id, 0.0, 0.0, None, 11.0);
        assert_eq!(w.actor(&id).unwrap().facing, Facing::Right);
    }

    // ── ground item tests ──────────────────────────────────────

    #[test]
    fn ground_items_merge_per_tile_and_key() {
        let mut w = world();
        let a = w.spawn_ground_item("gold-ore", "gold-ore", 2, Vec2::new(50.0, 50.0));
        let b = w.spawn_ground_item("gold-ore", "gold-ore", 3, Vec2::new(55.0, 45.0));
        assert_eq!(a, b);
        assert_eq!(w.ground_items()[&a].qty, 5);

        // Different key on the same tile is a separate stack.
        let c = w.spawn_ground_item("bone", "bone", 1, Vec2::new(50.0, 50.0));
        assert_ne!(a, c);
    }

    #[test]
    fn ground_item_qty_zero_is_terminal() {
        let mut w = world();
        let id = w.spawn_ground_item("gold-ore", "gold-ore", 2, Vec2::new(50.0, 50.0));
        w.journal_mut().drain_patches();
        w.set_ground_item_qty(&id, 0);
        assert!(w.ground_items().get(&id).is_none());
        let patches = w.journal_mut().drain_patches();
        assert_eq!(patches, vec![Patch::GroundItemQty { id, qty: 0 }]);
    }

    // ── status barrier tests ───────────────────────────────────

    #[test]
    fn status_insert_refresh_remove_patch_flow() {
        let mut w = world();
        let id = w.add_player(0.0);
        w.journal_mut().drain_patches();
        w.insert_status(
            &id,
            StatusInstance {
                def: "burning".into(),
                applied_at_ms: 0.0,
                expires_at_ms: 3000.0,
                next_tick_ms: 0.0,
                interval_ms: 66.0,
                source: ActorId::new("lava-1"),
                visual: None,
            },
        );
        w.refresh_status(&id, "burning", 4000.0, ActorId::new("lava-2"));
        w.remove_status(&id, "burning");
        let patches = w.journal_mut().drain_patches();
        assert!(matches!(
            patches[0],
            Patch::StatusEffectAdded { expires_at_ms, .. } if expires_at_ms == 3000.0
        ));
        assert!(matches!(
            patches[1],
            Patch::StatusEffectAdded { expires_at_ms, .. } if expires_at_ms == 4000.0
        ));
        assert!(matches!(patches[2], Patch::StatusEffectRemoved { .. }));
        let actor = w.actor(&id).unwrap();
        assert!(actor.statuses.is_empty());
    }

    // ── snapshot tests ─────────────────────────────────────────

    #[test]
    fn snapshot_reflects_registry_order() {
        let mut w = world();
        let a = w.add_player_at(Vec2::new(100.0, 100.0), 0.0);
        let b = w.add_player_at(Vec2::new(200.0, 100.0), 0.0);
        let snap = w.snapshot(TickId(5));
        assert_eq!(snap.t, TickId(5));
        assert_eq!(snap.players[0].id, a);
        assert_eq!(snap.players[1].id, b);
    }
}
