//! 2D geometry: vectors, axis-aligned rectangles, and facing directions.
//!
//! World coordinates are `f64` with positive y pointing **down** (screen
//! convention, inherited by the wire protocol). All overlap tests are
//! inclusive-exclusive on the far edge so adjacent rectangles do not
//! count as overlapping.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 2D vector in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    /// Horizontal component; positive is right.
    pub x: f64,
    /// Vertical component; positive is down.
    pub y: f64,
}

impl Vec2 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Construct from components.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    pub fn len(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Distance to another point.
    pub fn distance(self, other: Self) -> f64 {
        (other - self).len()
    }

    /// Scale both components.
    pub fn scale(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k)
    }

    /// Clamp the vector to at most `max_len`, preserving direction.
    ///
    /// Zero and sub-threshold vectors pass through unchanged.
    pub fn clamp_len(self, max_len: f64) -> Self {
        let len = self.len();
        if len > max_len && len > 0.0 {
            self.scale(max_len / len)
        } else {
            self
        }
    }

    /// Unit vector in the same direction, or zero for the zero vector.
    pub fn normalized(self) -> Self {
        let len = self.len();
        if len > 0.0 {
            self.scale(1.0 / len)
        } else {
            Self::ZERO
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// An axis-aligned rectangle, addressed by its top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width; non-negative.
    pub w: f64,
    /// Height; non-negative.
    pub h: f64,
}

impl Aabb {
    /// Construct from the top-left corner and extent.
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Construct a square from a center point and half extent.
    pub fn from_center(center: Vec2, half: f64) -> Self {
        Self::new(center.x - half, center.y - half, half * 2.0, half * 2.0)
    }

    /// The center point.
    pub fn center(self) -> Vec2 {
        Vec2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// Whether this rectangle overlaps another (exclusive far edges).
    pub fn overlaps(self, other: Self) -> bool {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }

    /// Whether a point lies inside (inclusive near edges, exclusive far).
    pub fn contains(self, p: Vec2) -> bool {
        p.x >= self.x && p.x < self.x + self.w && p.y >= self.y && p.y < self.y + self.h
    }

    /// Whether a circle overlaps this rectangle.
    pub fn overlaps_circle(self, center: Vec2, radius: f64) -> bool {
        let nearest_x = center.x.clamp(self.x, self.x + self.w);
        let nearest_y = center.y.clamp(self.y, self.y + self.h);
        Vec2::new(nearest_x, nearest_y).distance(center) < radius
    }

    /// Clip this rectangle to stay inside `bounds`, preserving extent
    /// where possible (extent itself is clamped to the bounds size).
    pub fn clipped_to(self, bounds: Self) -> Self {
        let w = self.w.min(bounds.w);
        let h = self.h.min(bounds.h);
        let x = self.x.clamp(bounds.x, bounds.x + bounds.w - w);
        let y = self.y.clamp(bounds.y, bounds.y + bounds.h - h);
        Self::new(x, y, w, h)
    }
}

/// The four cardinal facing directions.
///
/// Serialized as lowercase strings on the wire. Never empty after an
/// actor's first command; the default is [`Facing::Down`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Negative y.
    Up,
    /// Positive y.
    #[default]
    Down,
    /// Negative x.
    Left,
    /// Positive x.
    Right,
}

impl Facing {
    /// Derive a facing from a movement vector.
    ///
    /// Vertical wins ties (`|dy| >= |dx|`), and positive y means down.
    /// Returns `None` for the zero vector so callers can fall back to a
    /// caller-supplied facing.
    pub fn from_vector(dx: f64, dy: f64) -> Option<Self> {
        if dx == 0.0 && dy == 0.0 {
            return None;
        }
        Some(if dy.abs() >= dx.abs() {
            if dy > 0.0 {
                Self::Down
            } else {
                Self::Up
            }
        } else if dx > 0.0 {
            Self::Right
        } else {
            Self::Left
        })
    }

    /// Parse a wire string, rejecting anything but the four directions.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// Unit vector pointing along this facing.
    pub fn unit(self) -> Vec2 {
        match self {
            Self::Up => Vec2::new(0.0, -1.0),
            Self::Down => Vec2::new(0.0, 1.0),
            Self::Left => Vec2::new(-1.0, 0.0),
            Self::Right => Vec2::new(1.0, 0.0),
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        };
        f.write_str(s)
    }
}
