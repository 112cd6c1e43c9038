//! Core types for the Skarn game-server simulation.
//!
//! This is the leaf crate with zero internal Skarn dependencies. It defines
//! the fundamental vocabulary used throughout the workspace: strongly-typed
//! identifiers, 2D geometry, the fixed-point wire numeric, command types,
//! the error taxonomy, and the world configuration.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod command;
pub mod config;
pub mod error;
pub mod fixed;
pub mod geom;
pub mod id;

// Re-export core types at crate root for convenience.
pub use command::{Admission, Command, CommandPayload, CommandType};
pub use config::WorldConfig;
pub use error::{ConfigError, DropReason, LifecycleError, MarshalError, SchedulerFault};
pub use fixed::Fx;
pub use geom::{Aabb, Facing, Vec2};
pub use id::{ActorId, EffectId, KeyframeSeq, MessageSeq, Seq, TickId};
