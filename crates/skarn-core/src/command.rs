//! Command and admission types for the intake pipeline.
//!
//! A [`Command`] is the normalized form of an inbound client message (or
//! an NPC AI decision), queued in the intake buffer and applied in FIFO
//! order at the start of the tick it was drained into. Admission is
//! best-effort: a rejected command produces an [`Admission`] with a
//! reason code and a telemetry increment, never a client-visible error.

use crate::error::DropReason;
use crate::geom::{Facing, Vec2};
use crate::id::{ActorId, TickId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// The four command kinds accepted by the intake buffer.
///
/// Used as a telemetry key (`commandDrops[reason][type]`), so the
/// `Display` form is the wire-stable lowercase name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    /// Continuous movement intent.
    Move,
    /// Waypoint path replacement.
    Path,
    /// Named ability activation.
    Action,
    /// Liveness + RTT probe.
    Heartbeat,
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Move => "move",
            Self::Path => "path",
            Self::Action => "action",
            Self::Heartbeat => "heartbeat",
        };
        f.write_str(s)
    }
}

/// Payload of a [`Command`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum CommandPayload {
    /// Set the actor's movement intent. The vector is clamped to the
    /// unit circle at application time; `facing` is the caller-supplied
    /// fallback used when the vector is zero.
    Move {
        /// Desired x velocity fraction.
        dx: f64,
        /// Desired y velocity fraction.
        dy: f64,
        /// Fallback facing, already validated against the wire alphabet.
        facing: Option<Facing>,
    },
    /// Replace the actor's path-following state with these waypoints.
    Path {
        /// Waypoints in visit order.
        waypoints: SmallVec<[Vec2; 8]>,
    },
    /// Trigger the named ability through its gate.
    Action {
        /// Ability name (e.g. `attack`, `fireball`).
        name: String,
    },
    /// Record liveness and compute RTT against the synthetic tick time.
    Heartbeat {
        /// Client wall-clock milliseconds at send time.
        client_sent_ms: f64,
    },
}

impl CommandPayload {
    /// The telemetry/admission type of this payload.
    pub fn command_type(&self) -> CommandType {
        match self {
            Self::Move { .. } => CommandType::Move,
            Self::Path { .. } => CommandType::Path,
            Self::Action { .. } => CommandType::Action,
            Self::Heartbeat { .. } => CommandType::Heartbeat,
        }
    }
}

/// A command admitted to (or rejected by) the intake buffer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// The actor this command acts on.
    pub actor: ActorId,
    /// The operation.
    pub payload: CommandPayload,
    /// Tick observed when the command was admitted.
    pub origin_tick: TickId,
    /// Wall-clock milliseconds when the command was admitted.
    pub issued_at_ms: f64,
}

/// Result of an `enqueue` call on the intake buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Admission {
    /// Whether the command was admitted.
    pub accepted: bool,
    /// Why it was dropped, when it was.
    pub reason: Option<DropReason>,
}

impl Admission {
    /// An accepted command.
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    /// A dropped command with its reason.
    pub fn dropped(reason: DropReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
        }
    }
}
