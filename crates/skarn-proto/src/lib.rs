//! The Skarn wire protocol.
//!
//! JSON messages exchanged over the duplex channel between server and
//! clients: the join response, per-tick state frames (full or diff),
//! keyframes, keyframe nacks, and the inbound client message alphabet.
//! Also provides the client-side patch applier, which the server's own
//! tests use to prove diff streams reconstruct full snapshots.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod apply;
pub mod messages;

pub use apply::apply_patches;
pub use messages::{
    ClientMessage, ConfigSummary, JoinResponse, KeyframeMessage, KeyframeNack, StateMessage,
    PROTOCOL_VERSION,
};
