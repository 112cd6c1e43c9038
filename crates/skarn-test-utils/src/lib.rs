//! Test fixtures and builders for Skarn development.
//!
//! Provides a collecting [`SubscriberSink`], command constructors, and
//! seeded server builders so scenario tests read as scripts instead of
//! setup boilerplate.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use skarn_core::{ActorId, Command, CommandPayload, TickId, Vec2, WorldConfig};
use skarn_engine::{LockstepServer, SinkError, SubscriberSink};
use skarn_sim::catalog::{EffectCatalog, BUILTIN_CATALOG};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared log of frames a [`CollectingSink`] received.
pub type FrameLog = Arc<Mutex<Vec<Vec<u8>>>>;

/// Sink that records every payload, optionally failing after N writes.
pub struct CollectingSink {
    log: FrameLog,
    fail_after: Option<usize>,
}

impl CollectingSink {
    /// A sink that never fails, plus its frame log.
    pub fn new() -> (Self, FrameLog) {
        let log: FrameLog = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                log: Arc::clone(&log),
                fail_after: None,
            },
            log,
        )
    }

    /// A sink that fails every write after the first `n` succeed.
    pub fn failing_after(n: usize) -> (Self, FrameLog) {
        let (mut sink, log) = Self::new();
        sink.fail_after = Some(n);
        (sink, log)
    }
}

impl SubscriberSink for CollectingSink {
    fn write(&mut self, payload: &[u8], _deadline: Duration) -> Result<(), SinkError> {
        let mut log = self.log.lock().unwrap();
        if let Some(n) = self.fail_after {
            if log.len() >= n {
                return Err(SinkError::Io {
                    reason: "test sink closed".into(),
                });
            }
        }
        log.push(payload.to_vec());
        Ok(())
    }
}

/// Decode every logged frame as JSON.
pub fn frames_as_json(log: &FrameLog) -> Vec<serde_json::Value> {
    log.lock()
        .unwrap()
        .iter()
        .map(|bytes| serde_json::from_slice(bytes).expect("frame is valid JSON"))
        .collect()
}

/// The built-in catalog fixture.
pub fn test_catalog() -> EffectCatalog {
    EffectCatalog::from_json(BUILTIN_CATALOG).expect("builtin catalog parses")
}

/// A small, unpopulated, seeded test config.
pub fn test_config() -> WorldConfig {
    WorldConfig {
        seed: 42,
        ..WorldConfig::default()
    }
}

/// A lockstep server over [`test_config`] and [`test_catalog`].
pub fn lockstep_server() -> LockstepServer {
    LockstepServer::new(test_config(), test_catalog()).expect("test config validates")
}

/// A lockstep server over a custom config.
pub fn lockstep_server_with(config: WorldConfig) -> LockstepServer {
    LockstepServer::new(config, test_catalog()).expect("config validates")
}

// ── command constructors ────────────────────────────────────────

pub fn mk_move(actor: &ActorId, dx: f64, dy: f64, tick: TickId) -> Command {
    Command {
        actor: actor.clone(),
        payload: CommandPayload::Move {
            dx,
            dy,
            facing: None,
        },
        origin_tick: tick,
        issued_at_ms: tick.0 as f64 * 1000.0 / 15.0,
    }
}

pub fn mk_action(actor: &ActorId, name: &str, tick: TickId) -> Command {
    Command {
        actor: actor.clone(),
        payload: CommandPayload::Action {
            name: name.to_string(),
        },
        origin_tick: tick,
        issued_at_ms: tick.0 as f64 * 1000.0 / 15.0,
    }
}

pub fn mk_heartbeat(actor: &ActorId, client_sent_ms: f64, tick: TickId) -> Command {
    Command {
        actor: actor.clone(),
        payload: CommandPayload::Heartbeat { client_sent_ms },
        origin_tick: tick,
        issued_at_ms: tick.0 as f64 * 1000.0 / 15.0,
    }
}

pub fn mk_path(actor: &ActorId, waypoints: &[Vec2], tick: TickId) -> Command {
    Command {
        actor: actor.clone(),
        payload: CommandPayload::Path {
            waypoints: SmallVec::from_slice(waypoints),
        },
        origin_tick: tick,
        issued_at_ms: tick.0 as f64 * 1000.0 / 15.0,
    }
}
