//! Skarn: the deterministic simulation core of a multiplayer
//! action-game server.
//!
//! This is the top-level facade crate re-exporting the public API from
//! the Skarn sub-crates. For most users, adding `skarn` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use skarn::prelude::*;
//! use std::time::Duration;
//!
//! // A sink that discards frames; a transport would write them out.
//! struct NullSink;
//! impl SubscriberSink for NullSink {
//!     fn write(&mut self, _payload: &[u8], _deadline: Duration) -> Result<(), SinkError> {
//!         Ok(())
//!     }
//! }
//!
//! // A small seeded world with two NPCs and some terrain.
//! let config = WorldConfig {
//!     seed: 42,
//!     npc_count: 2,
//!     stone_count: 4,
//!     gold_ore_count: 2,
//!     lava_count: 1,
//!     ..WorldConfig::default()
//! };
//! let catalog = EffectCatalog::from_json(skarn::sim::catalog::BUILTIN_CATALOG).unwrap();
//! let mut server = LockstepServer::new(config, catalog).unwrap();
//!
//! // Join a player and swing at the air.
//! let (_subscriber, player) = server.join(Box::new(NullSink));
//! server.enqueue(Command {
//!     actor: player,
//!     payload: CommandPayload::Action { name: "attack".into() },
//!     origin_tick: server.tick(),
//!     issued_at_ms: 0.0,
//! });
//! let tick = server.step();
//! assert_eq!(tick, TickId(1));
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `skarn-core` | Ids, geometry, commands, config, errors |
//! | [`sim`] | `skarn-sim` | World, journal, effects, combat, status, AI |
//! | [`proto`] | `skarn-proto` | Wire messages and patch application |
//! | [`engine`] | `skarn-engine` | Intake, scheduler, tick engine, servers |
//! | [`replay`] | `skarn-replay` | Scripts and golden checksums |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types (`skarn-core`).
pub mod types {
    pub use skarn_core::*;
}

/// Simulation kernel (`skarn-sim`).
pub mod sim {
    pub use skarn_sim::*;
}

/// Wire protocol (`skarn-proto`).
pub mod proto {
    pub use skarn_proto::*;
}

/// Server engine (`skarn-engine`).
pub mod engine {
    pub use skarn_engine::*;
}

/// Deterministic replay (`skarn-replay`).
pub mod replay {
    pub use skarn_replay::*;
}

/// The commonly-used surface in one import.
pub mod prelude {
    pub use skarn_core::{
        ActorId, Admission, Command, CommandPayload, EffectId, Facing, Fx, KeyframeSeq,
        MessageSeq, Seq, TickId, Vec2, WorldConfig,
    };
    pub use skarn_engine::{
        LockstepServer, RealtimeServer, SinkError, SubscriberId, SubscriberSink, TickEngine,
    };
    pub use skarn_proto::messages::{ClientMessage, JoinResponse, StateMessage};
    pub use skarn_sim::catalog::EffectCatalog;
    pub use skarn_sim::world::World;
}
