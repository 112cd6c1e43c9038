//! Deterministic replay for Skarn simulations.
//!
//! A [`Script`] pins a configuration, a tick count, and a per-tick
//! command list. [`record`](record::record) drives a lockstep server
//! through the script and folds every marshaled diff into SHA-256
//! digests; identical scripts must produce identical digests on every
//! run, on every machine. [`compare`] reports the first diverging tick
//! when they do not.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod checksum;
pub mod compare;
pub mod error;
pub mod record;
pub mod script;

pub use checksum::DigestBuilder;
pub use compare::first_divergence;
pub use error::ReplayError;
pub use record::{record, RunReport};
pub use script::{Script, ScriptCommand};
