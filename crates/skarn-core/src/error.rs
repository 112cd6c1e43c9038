//! Error taxonomy for the simulation core.
//!
//! Organized by subsystem: admission (intake + applier), scheduler,
//! marshalling, and effect lifecycle. Admission errors are telemetry,
//! not failures — commands are best-effort and rejected ones are
//! dropped silently from the client's point of view. Only
//! [`SchedulerFault`] is fatal.

use std::error::Error;
use std::fmt;

/// Why a command was dropped instead of applied.
///
/// The `Display` form is the wire-stable snake_case reason used as a
/// telemetry key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// The actor already has the per-actor command limit queued.
    LimitExceeded,
    /// The global intake buffer is at capacity (backpressure).
    Capacity,
    /// An `action` command named an unregistered ability.
    UnknownAction,
    /// A command referenced an actor that does not exist.
    InvalidTarget,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LimitExceeded => "limit_exceeded",
            Self::Capacity => "capacity",
            Self::UnknownAction => "unknown_action",
            Self::InvalidTarget => "invalid_target",
        };
        f.write_str(s)
    }
}

impl Error for DropReason {}

/// Fatal faults from the tick scheduler.
///
/// The scheduler halts on any of these; there is no recovery path.
#[derive(Clone, Debug, PartialEq)]
pub enum SchedulerFault {
    /// The monotonic clock moved backwards.
    ClockRegression {
        /// Last pulse time observed, in milliseconds.
        last_ms: f64,
        /// The regressed pulse time, in milliseconds.
        now_ms: f64,
    },
}

impl fmt::Display for SchedulerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClockRegression { last_ms, now_ms } => {
                write!(f, "clock regression: {now_ms}ms after {last_ms}ms")
            }
        }
    }
}

impl Error for SchedulerFault {}

/// Errors from snapshot marshalling.
///
/// On any of these the drained journal buffers are restored so the next
/// tick retries, and subscribers receive a keyframe nack.
#[derive(Clone, Debug, PartialEq)]
pub enum MarshalError {
    /// JSON encoding failed (e.g. a non-finite float reached the wire).
    Encode {
        /// Encoder description of the failure.
        reason: String,
    },
}

impl fmt::Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode { reason } => write!(f, "encode failed: {reason}"),
        }
    }
}

impl Error for MarshalError {}

/// Effect-lifecycle invariant violations.
///
/// Logged at error level; the offending intent is dropped and the tick
/// continues.
#[derive(Clone, Debug, PartialEq)]
pub enum LifecycleError {
    /// The intent named a catalog entry that does not exist.
    UnknownEntry {
        /// The missing entry id.
        entry: String,
    },
    /// The intent targeted an actor that does not exist.
    UnknownTarget {
        /// The missing actor id (wire form).
        actor: String,
    },
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEntry { entry } => write!(f, "unknown catalog entry '{entry}'"),
            Self::UnknownTarget { actor } => write!(f, "unknown target actor '{actor}'"),
        }
    }
}

impl Error for LifecycleError {}

/// Errors detected during [`WorldConfig::validate()`](crate::config::WorldConfig::validate).
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// `tick_rate_hz` is NaN, infinite, zero, or negative.
    InvalidTickRate {
        /// The invalid value.
        value: f64,
    },
    /// World width or height is not a positive finite number.
    InvalidWorldSize {
        /// The invalid dimension value.
        value: f64,
    },
    /// The intake buffer capacity is zero.
    IntakeCapacityZero,
    /// The per-actor command limit is zero.
    PerActorLimitZero,
    /// The outbound queue length is zero.
    OutboundQueueZero,
    /// The keyframe interval is zero.
    KeyframeIntervalZero,
    /// A millisecond interval is not a positive finite number.
    InvalidIntervalMs {
        /// Name of the offending field.
        field: &'static str,
        /// The invalid value.
        value: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTickRate { value } => write!(f, "invalid tick rate {value}"),
            Self::InvalidWorldSize { value } => write!(f, "invalid world dimension {value}"),
            Self::IntakeCapacityZero => f.write_str("intake capacity must be at least 1"),
            Self::PerActorLimitZero => f.write_str("per-actor command limit must be at least 1"),
            Self::OutboundQueueZero => f.write_str("outbound queue length must be at least 1"),
            Self::KeyframeIntervalZero => f.write_str("keyframe interval must be at least 1"),
            Self::InvalidIntervalMs { field, value } => {
                write!(f, "invalid {field}: {value}ms")
            }
        }
    }
}

impl Error for ConfigError {}
