//! The Skarn server engine.
//!
//! Orchestrates the simulation kernel into a running server: bounded
//! command intake, fixed-rate scheduling with a catch-up cap, the tick
//! pipeline (commands → sweeps → world step → marshal), per-subscriber
//! outbound queues, and two drive modes — [`LockstepServer`] for tests
//! and replay, [`RealtimeServer`] for a live tick thread.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod applier;
pub mod engine;
pub mod intake;
pub mod lockstep;
pub mod marshal;
pub mod metrics;
pub mod realtime;
pub mod scheduler;
pub mod subscriber;

pub use engine::TickEngine;
pub use intake::IntakeBuffer;
pub use lockstep::LockstepServer;
pub use marshal::Marshaller;
pub use metrics::{DropTable, TickMetrics};
pub use realtime::{RealtimeServer, SubmitError};
pub use scheduler::{DueTicks, Scheduler};
pub use subscriber::{
    SinkError, Subscriber, SubscriberId, SubscriberRegistry, SubscriberSink, SubscriberState,
};
