//! Client-side patch application.
//!
//! Replays a diff stream onto a full snapshot. Patches carry absolute
//! values, so application is last-writer-wins and idempotent: applying
//! the same batch twice changes nothing further. The server's own
//! tests use this to prove `apply(snapshot(n), patches(n→n+1)) ==
//! snapshot(n+1)`.

use skarn_sim::item::{tile_of, GroundItem};
use skarn_sim::patch::Patch;
use skarn_sim::snapshot::{ActorSnapshot, WorldSnapshot};
use skarn_core::Vec2;

/// Apply an ordered patch batch to a snapshot, in place.
pub fn apply_patches(snapshot: &mut WorldSnapshot, patches: &[Patch]) {
    for patch in patches {
        apply_one(snapshot, patch);
    }
}

fn apply_one(snapshot: &mut WorldSnapshot, patch: &Patch) {
    match patch {
        Patch::PlayerJoined {
            id,
            x,
            y,
            facing,
            health,
            max_health,
        } => {
            if find_actor(&mut snapshot.players, id.as_str()).is_none() {
                snapshot.players.push(ActorSnapshot {
                    id: id.clone(),
                    x: *x,
                    y: *y,
                    facing: *facing,
                    health: *health,
                    max_health: *max_health,
                    inventory: Default::default(),
                    equipment: Default::default(),
                    statuses: Default::default(),
                    kind: None,
                });
            }
        }
        Patch::PlayerPosition { id, x, y, facing } => {
            if let Some(actor) = find_actor(&mut snapshot.players, id.as_str()) {
                actor.x = *x;
                actor.y = *y;
                actor.facing = *facing;
            }
        }
        Patch::NpcPosition { id, x, y, facing } => {
            if let Some(actor) = find_actor(&mut snapshot.npcs, id.as_str()) {
                actor.x = *x;
                actor.y = *y;
                actor.facing = *facing;
            }
        }
        Patch::PlayerHealth {
            id,
            health,
            max_health,
        } => {
            if let Some(actor) = find_actor(&mut snapshot.players, id.as_str()) {
                actor.health = *health;
                actor.max_health = *max_health;
            }
        }
        Patch::NpcHealth {
            id,
            health,
            max_health,
        } => {
            if let Some(actor) = find_actor(&mut snapshot.npcs, id.as_str()) {
                actor.health = *health;
                actor.max_health = *max_health;
            }
        }
        Patch::ActorRemoved { id } => {
            snapshot.players.retain(|a| a.id != *id);
            snapshot.npcs.retain(|a| a.id != *id);
        }
        Patch::InventoryQty { id, item, qty } => {
            if let Some(actor) = find_any(snapshot, id.as_str()) {
                if *qty == 0 {
                    actor.inventory.shift_remove(item);
                } else {
                    actor.inventory.insert(item.clone(), *qty);
                }
            }
        }
        Patch::Equipment { id, slot, item } => {
            if let Some(actor) = find_any(snapshot, id.as_str()) {
                match item {
                    Some(v) => {
                        actor.equipment.insert(slot.clone(), v.clone());
                    }
                    None => {
                        actor.equipment.shift_remove(slot);
                    }
                }
            }
        }
        Patch::StatusEffectAdded {
            id,
            status,
            expires_at_ms,
        } => {
            if let Some(actor) = find_any(snapshot, id.as_str()) {
                actor.statuses.insert(status.clone(), *expires_at_ms);
            }
        }
        Patch::StatusEffectRemoved { id, status } => {
            if let Some(actor) = find_any(snapshot, id.as_str()) {
                actor.statuses.shift_remove(status);
            }
        }
        Patch::GroundItemAdded {
            id,
            item_type,
            fungibility_key,
            qty,
            x,
            y,
        } => {
            if !snapshot.ground_items.iter().any(|g| g.id == *id) {
                snapshot.ground_items.push(GroundItem {
                    id: id.clone(),
                    item_type: item_type.clone(),
                    fungibility_key: fungibility_key.clone(),
                    qty: *qty,
                    x: *x,
                    y: *y,
                    tile: tile_of(Vec2::new(*x, *y)),
                });
            }
        }
        Patch::GroundItemQty { id, qty } => {
            if *qty == 0 {
                snapshot.ground_items.retain(|g| g.id != *id);
            } else if let Some(item) = snapshot.ground_items.iter_mut().find(|g| g.id == *id) {
                item.qty = *qty;
            }
        }
    }
}

fn find_actor<'a>(actors: &'a mut [ActorSnapshot], id: &str) -> Option<&'a mut ActorSnapshot> {
    actors.iter_mut().find(|a| a.id.as_str() == id)
}

fn find_any<'a>(snapshot: &'a mut WorldSnapshot, id: &str) -> Option<&'a mut ActorSnapshot> {
    if snapshot.players.iter().any(|a| a.id.as_str() == id) {
        return find_actor(&mut snapshot.players, id);
    }
    find_actor(&mut snapshot.npcs, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use skarn_core::{ActorId, Facing, TickId};

    fn empty_snapshot() -> WorldSnapshot {
        WorldSnapshot {
            t: TickId(0),
            players: Vec::new(),
            npcs: Vec::new(),
            obstacles: Vec::new(),
            ground_items: Vec::new(),
        }
    }

    fn joined(id: &str, x: f64, y: f64) -> Patch {
        Patch::PlayerJoined {
            id: ActorId::new(id),
            x,
            y,
            facing: Facing::Down,
            health: 100.0,
            max_health: 100.0,
        }
    }

    #[test]
    fn join_then_move_then_remove() {
        let mut snap = empty_snapshot();
        apply_patches(
            &mut snap,
            &[
                joined("player-1", 10.0, 10.0),
                Patch::PlayerPosition {
                    id: ActorId::new("player-1"),
                    x: 20.0,
                    y: 30.0,
                    facing: Facing::Right,
                },
            ],
        );
        assert_eq!(snap.players.len(), 1);
        assert_eq!(snap.players[0].x, 20.0);
        assert_eq!(snap.players[0].facing, Facing::Right);

        apply_patches(
            &mut snap,
            &[Patch::ActorRemoved {
                id: ActorId::new("player-1"),
            }],
        );
        assert!(snap.players.is_empty());
    }

    #[test]
    fn applying_same_batch_twice_is_idempotent() {
        let mut snap = empty_snapshot();
        let batch = vec![
            joined("player-1", 10.0, 10.0),
            Patch::PlayerHealth {
                id: ActorId::new("player-1"),
                health: 55.0,
                max_health: 100.0,
            },
            Patch::InventoryQty {
                id: ActorId::new("player-1"),
                item: "gold-ore".into(),
                qty: 4,
            },
            Patch::GroundItemAdded {
                id: "ground-item-1".into(),
                item_type: "gold-ore".into(),
                fungibility_key: "gold-ore".into(),
                qty: 2,
                x: 50.0,
                y: 50.0,
            },
        ];
        apply_patches(&mut snap, &batch);
        let once = snap.clone();
        apply_patches(&mut snap, &batch);
        assert_eq!(snap, once, "absolute patches must be idempotent");
    }

    #[test]
    fn inventory_zero_clears_the_slot() {
        let mut snap = empty_snapshot();
        apply_patches(
            &mut snap,
            &[
                joined("player-1", 0.0, 0.0),
                Patch::InventoryQty {
                    id: ActorId::new("player-1"),
                    item: "gold-ore".into(),
                    qty: 2,
                },
                Patch::InventoryQty {
                    id: ActorId::new("player-1"),
                    item: "gold-ore".into(),
                    qty: 0,
                },
            ],
        );
        assert!(snap.players[0].inventory.is_empty());
    }

    #[test]
    fn ground_item_qty_zero_removes_stack() {
        let mut snap = empty_snapshot();
        apply_patches(
            &mut snap,
            &[
                Patch::GroundItemAdded {
                    id: "ground-item-1".into(),
                    item_type: "gold-ore".into(),
                    fungibility_key: "gold-ore".into(),
                    qty: 2,
                    x: 50.0,
                    y: 50.0,
                },
                Patch::GroundItemQty {
                    id: "ground-item-1".into(),
                    qty: 0,
                },
            ],
        );
        assert!(snap.ground_items.is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn health_patches_are_idempotent(
                health in 0.0f64..100.0,
                max_health in 0.0f64..100.0,
            ) {
                let mut snap = empty_snapshot();
                let batch = vec![
                    joined("player-1", 0.0, 0.0),
                    Patch::PlayerHealth {
                        id: ActorId::new("player-1"),
                        health,
                        max_health,
                    },
                ];
                apply_patches(&mut snap, &batch);
                let once = snap.clone();
                apply_patches(&mut snap, &batch);
                prop_assert_eq!(snap, once);
            }
        }
    }

    #[test]
    fn status_patches_round_trip() {
        let mut snap = empty_snapshot();
        apply_patches(
            &mut snap,
            &[
                joined("player-1", 0.0, 0.0),
                Patch::StatusEffectAdded {
                    id: ActorId::new("player-1"),
                    status: "burning".into(),
                    expires_at_ms: 3000.0,
                },
            ],
        );
        assert_eq!(snap.players[0].statuses["burning"], 3000.0);
        apply_patches(
            &mut snap,
            &[Patch::StatusEffectRemoved {
                id: ActorId::new("player-1"),
                status: "burning".into(),
            }],
        );
        assert!(snap.players[0].statuses.is_empty());
    }
}
