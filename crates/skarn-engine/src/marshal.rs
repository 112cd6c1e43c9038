//! The snapshot marshaller.
//!
//! Builds one payload per subscriber per tick: a full-state frame on
//! scheduled keyframe ticks and for resyncing subscribers, otherwise a
//! diff frame carrying the drained patches and effect lifecycle
//! arrays. A failed encode restores the drained journal buffers so the
//! next tick retries, and nacks every streaming subscriber; patches
//! are absolute, so the retry duplicating an already-delivered frame
//! is harmless.

use crate::metrics::TickMetrics;
use crate::subscriber::{SubscriberRegistry, SubscriberState};
use indexmap::IndexMap;
use serde::Serialize;
use skarn_core::{EffectId, KeyframeSeq, MarshalError, TickId, WorldConfig};
use skarn_proto::messages::{
    ConfigSummary, KeyframeMessage, KeyframeNack, StateMessage, PROTOCOL_VERSION,
};
use skarn_sim::effect::LifecycleEvent;
use skarn_sim::world::World;
use tracing::warn;

/// Encode a wire value.
fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, MarshalError> {
    serde_json::to_vec(value).map_err(|e| MarshalError::Encode {
        reason: e.to_string(),
    })
}

/// Per-server marshalling state.
#[derive(Debug, Default)]
pub struct Marshaller {
    keyframe_seq: KeyframeSeq,
}

impl Marshaller {
    /// A fresh marshaller.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current keyframe sequence.
    pub fn keyframe_seq(&self) -> KeyframeSeq {
        self.keyframe_seq
    }

    /// Marshal one tick's output to every subscriber.
    ///
    /// # Errors
    ///
    /// [`MarshalError`] when encoding fails; the journal buffers are
    /// restored and nacks are staged before returning.
    pub fn marshal_tick(
        &mut self,
        world: &mut World,
        subscribers: &mut SubscriberRegistry,
        config: &WorldConfig,
        tick: TickId,
        server_time_ms: f64,
        metrics: &mut TickMetrics,
    ) -> Result<(), MarshalError> {
        let scheduled_keyframe = tick.0 > 0 && tick.0 % config.keyframe_interval == 0;
        if scheduled_keyframe {
            self.keyframe_seq.0 += 1;
            let frame = world.snapshot(tick);
            world.journal_mut().record_keyframe(self.keyframe_seq, frame);
        }

        let patches = world.journal_mut().drain_patches();
        let events = world.journal_mut().drain_effect_events();
        metrics.patches_emitted += patches.len() as u64;
        metrics.effect_events_emitted += events.len() as u64;

        let mut effect_spawned = Vec::new();
        let mut effect_update = Vec::new();
        let mut effect_ended = Vec::new();
        let mut effect_seq_cursors: IndexMap<EffectId, u64> = IndexMap::new();
        for event in &events {
            effect_seq_cursors.insert(event.id().clone(), event.seq().0);
            match event {
                LifecycleEvent::Spawn(e) => effect_spawned.push(e.clone()),
                LifecycleEvent::Update(e) => effect_update.push(e.clone()),
                LifecycleEvent::End(e) => effect_ended.push(e.clone()),
            }
        }

        let server_time = server_time_ms.round() as u64;
        let summary = ConfigSummary::from_config(config);
        let needs_full = scheduled_keyframe
            || subscribers
                .iter_mut()
                .any(|s| !s.is_disconnected() && s.needs_resync);
        let snapshot = needs_full.then(|| world.snapshot(tick));

        for id in subscribers.ids() {
            let Some(sub) = subscribers.get_mut(id) else {
                continue;
            };
            if sub.is_disconnected() {
                continue;
            }
            let full = scheduled_keyframe || sub.needs_resync;
            let resync = sub.needs_resync;
            let sequence = sub.next_seq();

            let message = if full {
                let snap = snapshot.as_ref().expect("snapshot built for full frames");
                StateMessage {
                    ver: PROTOCOL_VERSION,
                    kind: "state".into(),
                    players: Some(snap.players.clone()),
                    npcs: Some(snap.npcs.clone()),
                    obstacles: Some(snap.obstacles.clone()),
                    ground_items: Some(snap.ground_items.clone()),
                    patches: None,
                    effect_spawned: effect_spawned.clone(),
                    effect_update: effect_update.clone(),
                    effect_ended: effect_ended.clone(),
                    effect_seq_cursors: effect_seq_cursors.clone(),
                    t: tick,
                    sequence,
                    keyframe_seq: self.keyframe_seq,
                    server_time,
                    config: Some(summary.clone()),
                    resync: resync.then_some(true),
                    keyframe_interval: Some(config.keyframe_interval),
                }
            } else {
                StateMessage {
                    ver: PROTOCOL_VERSION,
                    kind: "state".into(),
                    players: None,
                    npcs: None,
                    obstacles: None,
                    ground_items: None,
                    patches: Some(patches.clone()),
                    effect_spawned: effect_spawned.clone(),
                    effect_update: effect_update.clone(),
                    effect_ended: effect_ended.clone(),
                    effect_seq_cursors: effect_seq_cursors.clone(),
                    t: tick,
                    sequence,
                    keyframe_seq: self.keyframe_seq,
                    server_time,
                    config: None,
                    resync: None,
                    keyframe_interval: None,
                }
            };

            let payload = match encode(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "marshal failed; restoring journal and nacking");
                    metrics.marshal_failures += 1;
                    world.journal_mut().restore(patches, events);
                    self.nack_all(subscribers, config, "marshal");
                    return Err(e);
                }
            };

            if sub_enqueue(sub, payload, metrics) && full {
                sub.state = SubscriberState::Streaming;
                sub.needs_resync = false;
                sub.last_keyframe_seq = self.keyframe_seq;
            }
        }

        Ok(())
    }

    /// Serve a client keyframe request from the ring, or nack it.
    pub fn serve_keyframe_request(
        &mut self,
        world: &World,
        subscribers: &mut SubscriberRegistry,
        config: &WorldConfig,
        subscriber: crate::subscriber::SubscriberId,
        requested: KeyframeSeq,
        metrics: &mut TickMetrics,
    ) {
        let frame = world.journal().keyframe(requested).cloned();
        let Some(sub) = subscribers.get_mut(subscriber) else {
            return;
        };
        match frame {
            Some(frame) => {
                let message = KeyframeMessage {
                    ver: PROTOCOL_VERSION,
                    kind: "keyframe".into(),
                    sequence: requested,
                    t: frame.t,
                    players: frame.players,
                    npcs: frame.npcs,
                    obstacles: frame.obstacles,
                    ground_items: frame.ground_items,
                    config: ConfigSummary::from_config(config),
                };
                if let Ok(payload) = encode(&message) {
                    if sub_enqueue(sub, payload, metrics) {
                        sub.last_keyframe_seq = requested;
                    }
                }
            }
            None => {
                // Evicted from the ring: the client must fully resync.
                sub.needs_resync = true;
                let nack = KeyframeNack {
                    ver: PROTOCOL_VERSION,
                    kind: "keyframeNack".into(),
                    sequence: requested,
                    reason: "evicted".into(),
                    resync: Some(true),
                    config: Some(ConfigSummary::from_config(config)),
                };
                if let Ok(payload) = encode(&nack) {
                    sub_enqueue(sub, payload, metrics);
                }
            }
        }
    }

    /// Stage a nack to every connected subscriber (marshal failure).
    fn nack_all(&self, subscribers: &mut SubscriberRegistry, config: &WorldConfig, reason: &str) {
        let nack = KeyframeNack {
            ver: PROTOCOL_VERSION,
            kind: "keyframeNack".into(),
            sequence: self.keyframe_seq,
            reason: reason.to_string(),
            resync: Some(true),
            config: Some(ConfigSummary::from_config(config)),
        };
        let Ok(payload) = encode(&nack) else {
            return;
        };
        for sub in subscribers.iter_mut() {
            if !sub.is_disconnected() {
                sub.needs_resync = true;
                let _ = sub.enqueue_payload(payload.clone());
            }
        }
    }
}

fn sub_enqueue(
    sub: &mut crate::subscriber::Subscriber,
    payload: Vec<u8>,
    metrics: &mut TickMetrics,
) -> bool {
    if sub.enqueue_payload(payload) {
        true
    } else {
        metrics.payloads_dropped += 1;
        false
    }
}
