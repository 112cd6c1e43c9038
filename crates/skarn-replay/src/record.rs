//! Script execution and digest recording.
//!
//! Drives a lockstep server through a script with one recorder
//! subscriber attached, then folds the `patches` and effect lifecycle
//! arrays of every marshaled state frame into SHA-256 digests. The
//! recorder's player is part of the simulation (it joins like any
//! client), which is exactly what makes the digest end-to-end: wire
//! bytes, not internal state.

use crate::checksum::DigestBuilder;
use crate::error::ReplayError;
use crate::script::Script;
use skarn_engine::{LockstepServer, SinkError, SubscriberSink};
use skarn_proto::messages::StateMessage;
use skarn_sim::catalog::{EffectCatalog, BUILTIN_CATALOG};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Digest report for one recorded run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Ticks executed.
    pub ticks: u64,
    /// Per-frame digest of the folded diff content, in frame order.
    pub frame_digests: Vec<String>,
    /// SHA-256 over the concatenation of all folded bytes.
    pub final_digest: String,
}

/// Frame-collecting sink for the recorder subscriber.
struct RecorderSink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SubscriberSink for RecorderSink {
    fn write(&mut self, payload: &[u8], _deadline: Duration) -> Result<(), SinkError> {
        self.frames.lock().unwrap().push(payload.to_vec());
        Ok(())
    }
}

/// Execute a script and report its digests.
///
/// # Errors
///
/// Configuration or catalog failures, or a frame that cannot be
/// re-encoded for hashing.
pub fn record(script: &Script) -> Result<RunReport, ReplayError> {
    let catalog = EffectCatalog::from_json(BUILTIN_CATALOG)?;
    let mut server = LockstepServer::new(script.config.clone(), catalog)?;

    let frames: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = RecorderSink {
        frames: Arc::clone(&frames),
    };
    let (_sub, _player) = server.join(Box::new(sink));

    for _ in 0..script.ticks {
        let tick = server.tick();
        for command in script.commands_at(tick.0) {
            let _ = server.enqueue(command.clone());
        }
        server.step();
    }

    let mut total = DigestBuilder::new();
    let mut frame_digests = Vec::new();
    let frames = frames.lock().unwrap();
    for bytes in frames.iter() {
        let Ok(message) = serde_json::from_slice::<StateMessage>(bytes) else {
            continue; // join response
        };
        if message.kind != "state" {
            continue;
        }
        let mut frame_digest = DigestBuilder::new();
        for chunk in fold_chunks(&message)? {
            frame_digest.fold(&chunk);
            total.fold(&chunk);
        }
        frame_digests.push(frame_digest.finish_hex());
    }

    Ok(RunReport {
        ticks: script.ticks,
        frame_digests,
        final_digest: total.finish_hex(),
    })
}

/// The hashed portions of a frame: its patch batch and the three
/// lifecycle arrays, serialized exactly as they appear on the wire.
fn fold_chunks(message: &StateMessage) -> Result<Vec<Vec<u8>>, ReplayError> {
    fn enc<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ReplayError> {
        serde_json::to_vec(value).map_err(|e| ReplayError::Encode {
            reason: e.to_string(),
        })
    }
    let mut chunks = Vec::new();
    if let Some(patches) = &message.patches {
        chunks.push(enc(patches)?);
    }
    if !message.effect_spawned.is_empty() {
        chunks.push(enc(&message.effect_spawned)?);
    }
    if !message.effect_update.is_empty() {
        chunks.push(enc(&message.effect_update)?);
    }
    if !message.effect_ended.is_empty() {
        chunks.push(enc(&message.effect_ended)?);
    }
    Ok(chunks)
}
