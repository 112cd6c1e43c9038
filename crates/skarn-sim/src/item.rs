//! Ground item stacks.
//!
//! Dropped inventory and mined ore land on the ground as stacks. At
//! most one stack exists per `(tile, fungibility_key)`; drops onto an
//! occupied tile merge into the existing stack.

use serde::{Deserialize, Serialize};
use skarn_core::Vec2;

/// Side length of the tile grid used for ground-item merging.
pub const TILE_SIZE: f64 = 40.0;

/// Tile index for a world position.
pub fn tile_of(pos: Vec2) -> (i32, i32) {
    (
        (pos.x / TILE_SIZE).floor() as i32,
        (pos.y / TILE_SIZE).floor() as i32,
    )
}

/// A stack of items on the ground.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundItem {
    /// World-unique id (`ground-item-{n}`).
    pub id: String,
    /// Item type.
    #[serde(rename = "type")]
    pub item_type: String,
    /// Merge key; equal keys on the same tile share one stack.
    pub fungibility_key: String,
    /// Stack quantity; stacks at 0 are removed.
    pub qty: u64,
    /// Position x.
    pub x: f64,
    /// Position y.
    pub y: f64,
    /// Owning tile index, derived from position at creation.
    #[serde(skip)]
    pub tile: (i32, i32),
}
