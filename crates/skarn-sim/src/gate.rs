//! Ability gates: the cooldown registry in front of every ability.
//!
//! An `action` command reaches its ability only through
//! [`AbilityGates::trigger`], which centralizes cooldown accounting: a
//! throttled trigger mutates nothing and the command becomes a no-op.
//! A successful trigger stamps the cooldown and returns a snapshot of
//! the owner, from which the ability's effect intent is built.

use crate::catalog::EffectCatalog;
use crate::effect::{EffectIntent, Geometry, Motion, ShapeKind};
use crate::world::World;
use indexmap::IndexMap;
use skarn_core::{ActorId, Facing, Fx, Vec2};

/// One registered ability.
#[derive(Clone, Debug, PartialEq)]
pub struct Ability {
    /// Ability name as used by `action` commands.
    pub name: String,
    /// Cooldown between successful triggers, seconds of tick time.
    pub cooldown_s: f64,
    /// Catalog entry instantiated on trigger.
    pub entry: String,
}

/// Snapshot of the owner at trigger time.
#[derive(Clone, Debug, PartialEq)]
pub struct OwnerSnapshot {
    /// Owner id.
    pub id: ActorId,
    /// Owner center position.
    pub pos: Vec2,
    /// Owner facing.
    pub facing: Facing,
}

/// The ability registry.
#[derive(Clone, Debug, Default)]
pub struct AbilityGates {
    abilities: IndexMap<String, Ability>,
}

impl AbilityGates {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in abilities: `attack` (melee) and `fireball`.
    pub fn builtin() -> Self {
        let mut gates = Self::new();
        gates.register(Ability {
            name: "attack".into(),
            cooldown_s: 0.4,
            entry: "attack".into(),
        });
        gates.register(Ability {
            name: "fireball".into(),
            cooldown_s: 1.0,
            entry: "fireball".into(),
        });
        gates
    }

    /// Register (or replace) an ability.
    pub fn register(&mut self, ability: Ability) {
        self.abilities.insert(ability.name.clone(), ability);
    }

    /// Look up an ability by name.
    pub fn get(&self, name: &str) -> Option<&Ability> {
        self.abilities.get(name)
    }

    /// Gate a trigger attempt.
    ///
    /// Returns the owner snapshot when the cooldown allows it, stamping
    /// the new last-trigger time. A throttled or unknown-owner trigger
    /// returns `None` without mutating anything.
    pub fn trigger(
        &self,
        world: &mut World,
        name: &str,
        actor: &ActorId,
        now_ms: f64,
    ) -> Option<OwnerSnapshot> {
        let ability = self.abilities.get(name)?;
        let state = world.actor(actor)?;
        if let Some(&last) = state.cooldowns.get(name) {
            if now_ms - last < ability.cooldown_s * 1000.0 {
                return None;
            }
        }
        let snapshot = OwnerSnapshot {
            id: state.id.clone(),
            pos: state.pos,
            facing: state.facing,
        };
        world
            .actor_mut(actor)
            .expect("actor resolved above")
            .cooldowns
            .insert(name.to_string(), now_ms);
        Some(snapshot)
    }
}

/// Build the effect intent for a successful trigger.
///
/// Returns `None` when the catalog has no such entry; the caller drops
/// the action with telemetry.
pub fn intent_for(
    ability: &Ability,
    owner: &OwnerSnapshot,
    catalog: &EffectCatalog,
    half_extent: f64,
) -> Option<EffectIntent> {
    let entry = catalog.entry(&ability.entry)?;
    let def = &entry.definition;
    let params = entry.blocks.parameters.clone();

    let (geometry, motion) = match def.type_id.as_str() {
        "projectile" => {
            let radius = params
                .get("spawnRadius")
                .copied()
                .or(def.shape.map(|s| s.radius))
                .unwrap_or(Fx::from_int(8));
            let speed = params.get("speed").map(|f| f.to_f64()).unwrap_or(240.0);
            let vel = owner.facing.unit().scale(speed);
            (
                Geometry {
                    shape: ShapeKind::Circle,
                    radius,
                    ..Geometry::default()
                },
                Some(Motion::from_vectors(owner.pos, vel)),
            )
        }
        _ => {
            let depth = params
                .get("width")
                .copied()
                .or(def.shape.map(|s| s.width))
                .unwrap_or(Fx::from_int(40))
                .to_f64();
            let span = params
                .get("height")
                .copied()
                .or(def.shape.map(|s| s.height))
                .unwrap_or(Fx::from_int(56))
                .to_f64();
            (melee_geometry(owner.facing, half_extent, depth, span), None)
        }
    };

    Some(EffectIntent {
        entry_id: ability.entry.clone(),
        type_id: def.type_id.clone(),
        delivery: def.delivery,
        source: Some(owner.id.clone()),
        target: None,
        geometry,
        motion,
        duration_ticks: Some(def.lifetime_ticks),
        tick_cadence: None,
        params,
        attach_status: None,
    })
}

/// Orient a melee hitbox around the owner.
///
/// `depth` extends along the facing from the owner's edge; `span` is
/// the perpendicular coverage, centered. Offsets address the hitbox's
/// top-left corner relative to the owner center.
pub fn melee_geometry(facing: Facing, half_extent: f64, depth: f64, span: f64) -> Geometry {
    let (w, h, ox, oy) = match facing {
        Facing::Right => (depth, span, half_extent, -span / 2.0),
        Facing::Left => (depth, span, -half_extent - depth, -span / 2.0),
        Facing::Down => (span, depth, -span / 2.0, half_extent),
        Facing::Up => (span, depth, -span / 2.0, -half_extent - depth),
    };
    Geometry {
        shape: ShapeKind::Rect,
        width: Fx::from_f64(w),
        height: Fx::from_f64(h),
        radius: Fx::ZERO,
        offset_x: Fx::from_f64(ox),
        offset_y: Fx::from_f64(oy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BUILTIN_CATALOG;
    use skarn_core::WorldConfig;

    fn setup() -> (World, AbilityGates, EffectCatalog) {
        (
            World::new(WorldConfig::default()),
            AbilityGates::builtin(),
            EffectCatalog::from_json(BUILTIN_CATALOG).unwrap(),
        )
    }

    // ── trigger tests ──────────────────────────────────────────

    #[test]
    fn trigger_returns_owner_snapshot() {
        let (mut world, gates, _) = setup();
        let id = world.add_player_at(Vec2::new(208.0, 320.0), 0.0);
        world.set_move_intent(&id, 1.0, 0.0, None, 0.0);
        let snap = gates.trigger(&mut world, "attack", &id, 1000.0).unwrap();
        assert_eq!(snap.id, id);
        assert_eq!(snap.pos, Vec2::new(208.0, 320.0));
        assert_eq!(snap.facing, Facing::Right);
    }

    #[test]
    fn trigger_within_cooldown_is_refused_without_mutation() {
        let (mut world, gates, _) = setup();
        let id = world.add_player(0.0);
        assert!(gates.trigger(&mut world, "attack", &id, 1000.0).is_some());
        assert!(gates.trigger(&mut world, "attack", &id, 1100.0).is_none());
        // The refused trigger must not have reset the stamp.
        assert_eq!(world.actor(&id).unwrap().cooldowns["attack"], 1000.0);
        // After the 400ms cooldown it fires again.
        assert!(gates.trigger(&mut world, "attack", &id, 1400.0).is_some());
    }

    #[test]
    fn unknown_ability_is_none() {
        let (mut world, gates, _) = setup();
        let id = world.add_player(0.0);
        assert!(gates.trigger(&mut world, "summon", &id, 0.0).is_none());
    }

    #[test]
    fn cooldowns_are_per_actor() {
        let (mut world, gates, _) = setup();
        let a = world.add_player(0.0);
        let b = world.add_player(0.0);
        assert!(gates.trigger(&mut world, "attack", &a, 1000.0).is_some());
        assert!(gates.trigger(&mut world, "attack", &b, 1000.0).is_some());
    }

    // ── intent building tests ──────────────────────────────────

    #[test]
    fn melee_geometry_matches_facing_right() {
        let g = melee_geometry(Facing::Right, 20.0, 40.0, 56.0);
        assert_eq!(g.width, Fx::from_int(40));
        assert_eq!(g.height, Fx::from_int(56));
        assert_eq!(g.offset_x, Fx::from_int(20));
        assert_eq!(g.offset_y, Fx::from_int(-28));
    }

    #[test]
    fn melee_geometry_rotates_for_vertical_facings() {
        let g = melee_geometry(Facing::Up, 20.0, 40.0, 56.0);
        assert_eq!(g.width, Fx::from_int(56));
        assert_eq!(g.height, Fx::from_int(40));
        assert_eq!(g.offset_x, Fx::from_int(-28));
        assert_eq!(g.offset_y, Fx::from_int(-60));
    }

    #[test]
    fn fireball_intent_carries_motion_along_facing() {
        let (_, gates, catalog) = setup();
        let owner = OwnerSnapshot {
            id: ActorId::new("player-1"),
            pos: Vec2::new(256.0, 320.0),
            facing: Facing::Right,
        };
        let ability = gates.get("fireball").unwrap();
        let intent = intent_for(ability, &owner, &catalog, 20.0).unwrap();
        assert_eq!(intent.geometry.shape, ShapeKind::Circle);
        assert_eq!(intent.geometry.radius, Fx::from_int(10));
        let motion = intent.motion.unwrap();
        assert_eq!(motion.pos(), Vec2::new(256.0, 320.0));
        assert_eq!(motion.vel(), Vec2::new(320.0, 0.0));
        assert_eq!(intent.duration_ticks, Some(23));
    }

    #[test]
    fn unknown_entry_yields_no_intent() {
        let (_, _, catalog) = setup();
        let owner = OwnerSnapshot {
            id: ActorId::new("player-1"),
            pos: Vec2::ZERO,
            facing: Facing::Down,
        };
        let ability = Ability {
            name: "void".into(),
            cooldown_s: 1.0,
            entry: "void".into(),
        };
        assert!(intent_for(&ability, &owner, &catalog, 20.0).is_none());
    }
}
