//! The Skarn simulation kernel.
//!
//! Owns all authoritative world state and the deterministic tick step:
//! actors, obstacles, and ground items; the journal of patches and
//! effect lifecycle events; the effect catalog and lifecycle manager;
//! the combat resolver; the status-effect accumulator; ability gates;
//! path following; and NPC AI.
//!
//! # Determinism
//!
//! Everything here is single-threaded and runs inside one tick. All
//! iteration orders that reach the wire are fixed: `IndexMap` insertion
//! order for registries (which equals allocation order), and explicit
//! ascending-id sorts for collision and overlap phases. Randomness is
//! confined to seeded `ChaCha8Rng` streams derived from the world seed.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod actor;
pub mod ai;
pub mod catalog;
pub mod combat;
pub mod effect;
pub mod gate;
pub mod item;
pub mod journal;
pub mod manager;
pub mod obstacle;
pub mod patch;
pub mod path;
pub mod snapshot;
pub mod status;
pub mod step;
pub mod world;

pub use actor::{ActorState, Equipment, Inventory, Npc, Player, StatusInstance};
pub use catalog::{CatalogEntry, EffectCatalog, EffectDefinition};
pub use effect::{
    BehaviorState, DeliveryState, EffectInstance, EffectIntent, EndEvent, EndReason,
    LifecycleEvent, Motion, ShapeKind, SpawnEvent, UpdateEvent,
};
pub use gate::{Ability, AbilityGates, OwnerSnapshot};
pub use item::GroundItem;
pub use journal::Journal;
pub use manager::EffectManager;
pub use obstacle::{Obstacle, ObstacleKind};
pub use patch::Patch;
pub use snapshot::{ActorSnapshot, WorldSnapshot};
pub use status::StatusRegistry;
pub use step::{step_world, StepOutcome};
pub use world::World;
