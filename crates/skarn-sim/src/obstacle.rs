//! Static world obstacles.

use serde::{Deserialize, Serialize};
use skarn_core::Aabb;
use std::fmt;

/// Obstacle material, which decides blocking and hazard behaviour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObstacleKind {
    /// Blocks movement.
    Stone,
    /// Blocks movement; mineable with a melee swing.
    GoldOre,
    /// Does not block; applies the burning status on contact.
    Lava,
}

impl ObstacleKind {
    /// Whether this obstacle blocks movement.
    pub fn blocks(self) -> bool {
        !matches!(self, Self::Lava)
    }

    /// Wire id prefix for obstacles of this kind.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Stone => "stone",
            Self::GoldOre => "gold-ore",
            Self::Lava => "lava",
        }
    }
}

impl fmt::Display for ObstacleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id_prefix())
    }
}

/// An axis-aligned static obstacle, clipped to world bounds at placement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Obstacle {
    /// World-unique obstacle id (`stone-3`, `gold-ore-1`, `lava-2`).
    pub id: String,
    /// Material.
    #[serde(rename = "type")]
    pub kind: ObstacleKind,
    /// Placement rectangle.
    #[serde(flatten)]
    pub bounds: Aabb,
}
