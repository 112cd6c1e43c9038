//! Typed diff patches.
//!
//! Every world mutation flows through a write-barrier that appends one
//! of these to the journal. Patches carry **absolute** target values,
//! never deltas, so applying the same batch twice changes state only
//! once and client replay is last-writer-wins. Entity removals emit a
//! terminal patch (`actor-removed`, or `ground-item-qty` with qty 0)
//! so diff streams stay consistent between keyframes.

use serde::{Deserialize, Serialize};
use skarn_core::{ActorId, Facing};

/// A single typed mutation, tagged by `kind` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Patch {
    /// A player joined the world.
    PlayerJoined {
        /// Player id.
        id: ActorId,
        /// Spawn x.
        x: f64,
        /// Spawn y.
        y: f64,
        /// Initial facing.
        facing: Facing,
        /// Initial health.
        health: f64,
        /// Maximum health.
        max_health: f64,
    },
    /// Absolute player position and facing.
    PlayerPosition {
        /// Player id.
        id: ActorId,
        /// Center x.
        x: f64,
        /// Center y.
        y: f64,
        /// Current facing.
        facing: Facing,
    },
    /// Absolute NPC position and facing.
    NpcPosition {
        /// NPC id.
        id: ActorId,
        /// Center x.
        x: f64,
        /// Center y.
        y: f64,
        /// Current facing.
        facing: Facing,
    },
    /// Absolute player health.
    PlayerHealth {
        /// Player id.
        id: ActorId,
        /// Current health.
        health: f64,
        /// Maximum health.
        max_health: f64,
    },
    /// Absolute NPC health.
    NpcHealth {
        /// NPC id.
        id: ActorId,
        /// Current health.
        health: f64,
        /// Maximum health.
        max_health: f64,
    },
    /// Terminal: the actor no longer exists.
    ActorRemoved {
        /// Removed actor id.
        id: ActorId,
    },
    /// Absolute inventory quantity for one fungibility key.
    InventoryQty {
        /// Owning actor id.
        id: ActorId,
        /// Fungibility key (item type for stackables).
        item: String,
        /// Absolute quantity; 0 clears the slot.
        qty: u64,
    },
    /// Absolute equipment slot content.
    Equipment {
        /// Owning actor id.
        id: ActorId,
        /// Slot name.
        slot: String,
        /// Equipped item, or `None` when the slot was cleared.
        item: Option<String>,
    },
    /// A status effect was applied or refreshed.
    StatusEffectAdded {
        /// Affected actor id.
        id: ActorId,
        /// Status definition id.
        status: String,
        /// Absolute expiry, milliseconds of tick time.
        expires_at_ms: f64,
    },
    /// A status effect ended.
    StatusEffectRemoved {
        /// Affected actor id.
        id: ActorId,
        /// Status definition id.
        status: String,
    },
    /// A new ground item stack appeared.
    GroundItemAdded {
        /// Ground item id.
        id: String,
        /// Item type.
        item_type: String,
        /// Fungibility key used for tile merging.
        fungibility_key: String,
        /// Stack quantity.
        qty: u64,
        /// Position x.
        x: f64,
        /// Position y.
        y: f64,
    },
    /// Absolute ground item quantity; 0 is the terminal removal patch.
    GroundItemQty {
        /// Ground item id.
        id: String,
        /// Absolute quantity.
        qty: u64,
    },
}

impl Patch {
    /// The id of the entity this patch names.
    pub fn entity_id(&self) -> &str {
        match self {
            Self::PlayerJoined { id, .. }
            | Self::PlayerPosition { id, .. }
            | Self::NpcPosition { id, .. }
            | Self::PlayerHealth { id, .. }
            | Self::NpcHealth { id, .. }
            | Self::ActorRemoved { id }
            | Self::InventoryQty { id, .. }
            | Self::Equipment { id, .. }
            | Self::StatusEffectAdded { id, .. }
            | Self::StatusEffectRemoved { id, .. } => id.as_str(),
            Self::GroundItemAdded { id, .. } | Self::GroundItemQty { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_is_kebab_case() {
        let patch = Patch::GroundItemQty {
            id: "ground-item-1".into(),
            qty: 0,
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert!(json.contains("\"kind\":\"ground-item-qty\""), "{json}");
    }

    #[test]
    fn fields_are_camel_case() {
        let patch = Patch::PlayerHealth {
            id: ActorId::new("player-1"),
            health: 80.0,
            max_health: 100.0,
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert!(json.contains("\"maxHealth\":100.0"), "{json}");
    }

    #[test]
    fn round_trips_through_json() {
        let patch = Patch::StatusEffectAdded {
            id: ActorId::new("npc-2"),
            status: "burning".into(),
            expires_at_ms: 4200.0,
        };
        let json = serde_json::to_string(&patch).unwrap();
        let back: Patch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, patch);
    }

    #[test]
    fn entity_id_covers_all_variants() {
        let patch = Patch::ActorRemoved {
            id: ActorId::new("player-9"),
        };
        assert_eq!(patch.entity_id(), "player-9");
    }
}
