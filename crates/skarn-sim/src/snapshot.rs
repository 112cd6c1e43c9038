//! Full-state snapshots.
//!
//! A [`WorldSnapshot`] is the full-state view sent in join responses
//! and keyframes, and the recovery point held in the keyframe ring.
//! Array order is registry insertion order, which is allocation order,
//! so identical runs serialize byte-identically.

use crate::item::GroundItem;
use crate::obstacle::Obstacle;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use skarn_core::{ActorId, Facing, TickId};

/// Full wire view of one actor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorSnapshot {
    /// Actor id.
    pub id: ActorId,
    /// Center x.
    pub x: f64,
    /// Center y.
    pub y: f64,
    /// Current facing.
    pub facing: Facing,
    /// Current health.
    pub health: f64,
    /// Maximum health.
    pub max_health: f64,
    /// Inventory stacks.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub inventory: IndexMap<String, u64>,
    /// Equipment slots.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub equipment: IndexMap<String, String>,
    /// Status effects: definition id → absolute expiry ms.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub statuses: IndexMap<String, f64>,
    /// NPC type, absent for players.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Full world state at one tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSnapshot {
    /// Snapshot tick.
    pub t: TickId,
    /// Players in allocation order.
    pub players: Vec<ActorSnapshot>,
    /// NPCs in allocation order.
    pub npcs: Vec<ActorSnapshot>,
    /// Static obstacles.
    pub obstacles: Vec<Obstacle>,
    /// Ground item stacks in allocation order.
    pub ground_items: Vec<GroundItem>,
}
