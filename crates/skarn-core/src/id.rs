//! Strongly-typed identifiers.
//!
//! Tick counters and sequence numbers are `Copy` newtypes over `u64`.
//! Actor and effect identifiers are string newtypes because the wire
//! protocol addresses entities by string id (`player-3`, `npc-7`,
//! `contract-effect-12`); they sort lexicographically, which for ids
//! allocated by this process is also allocation order within a kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monotonically increasing tick counter.
///
/// Incremented each time the simulation advances one step. Never wraps
/// in practice (64-bit at 15 Hz outlives the hardware).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickId(pub u64);

impl TickId {
    /// The tick after this one.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TickId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Per-effect-instance lifecycle sequence number.
///
/// Starts at 1 on the first emitted event for an instance and increases
/// by exactly 1 per event, with no gaps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seq(pub u64);

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Seq {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Per-subscriber global outbound message counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageSeq(pub u64);

impl MessageSeq {
    /// Advance and return the next message sequence.
    pub fn bump(&mut self) -> Self {
        self.0 += 1;
        *self
    }
}

impl fmt::Display for MessageSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Keyframe sequence number.
///
/// Incremented each time a full-state keyframe is recorded; clients nack
/// against the last value they saw.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyframeSeq(pub u64);

impl fmt::Display for KeyframeSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for KeyframeSeq {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// World-unique actor identifier (players, NPCs, and environmental
/// actors such as obstacles acting as damage sources).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    /// Wrap a wire id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The wire representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

/// Effect-instance identifier, allocated monotonically by the effect
/// manager as `contract-effect-{n}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(String);

impl EffectId {
    /// Wrap a wire id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the canonical id for allocation number `n`.
    pub fn allocated(n: u64) -> Self {
        Self(format!("contract-effect-{n}"))
    }

    /// The wire representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
