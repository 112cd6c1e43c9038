//! Subscribers: per-client outbound queues, IO writers, and deadlines.
//!
//! The tick loop is the single producer; one IO writer per subscriber
//! is the consumer. Queues are bounded and non-blocking: a full queue
//! drops the incoming payload with telemetry and flags the subscriber
//! for keyframe resync. In lockstep mode there are no threads; the
//! caller pumps each queue synchronously after the tick.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use skarn_core::{ActorId, KeyframeSeq, MessageSeq};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Subscriber identifier, unique per server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscriber lifecycle states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscriberState {
    /// Joined; no frame sent yet.
    Joined,
    /// Catching up via a full frame.
    Subscribing,
    /// Receiving diff frames.
    Streaming,
    /// Gone; pending removal from the world.
    Disconnected,
}

/// Errors surfaced by a sink write.
#[derive(Clone, Debug, PartialEq)]
pub enum SinkError {
    /// The write missed its deadline.
    DeadlineExceeded,
    /// The underlying channel failed.
    Io {
        /// Transport description of the failure.
        reason: String,
    },
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadlineExceeded => f.write_str("write deadline exceeded"),
            Self::Io { reason } => write!(f, "io failure: {reason}"),
        }
    }
}

impl Error for SinkError {}

/// Where a subscriber's payloads go. The transport implements this;
/// tests use collecting sinks.
pub trait SubscriberSink: Send {
    /// Write one payload within the deadline.
    ///
    /// # Errors
    ///
    /// Any error disconnects the subscriber.
    fn write(&mut self, payload: &[u8], deadline: Duration) -> Result<(), SinkError>;
}

/// One connected subscriber.
pub struct Subscriber {
    /// Subscriber id.
    pub id: SubscriberId,
    /// The player this subscriber controls.
    pub player: ActorId,
    /// Lifecycle state.
    pub state: SubscriberState,
    /// Set when the next frame must be a full snapshot.
    pub needs_resync: bool,
    /// Last keyframe sequence acknowledged via request handling.
    pub last_keyframe_seq: KeyframeSeq,
    msg_seq: MessageSeq,
    out_tx: Sender<Vec<u8>>,
    // Present until a writer thread takes them (realtime mode).
    out_rx: Option<Receiver<Vec<u8>>>,
    sink: Option<Box<dyn SubscriberSink>>,
    write_wait: Duration,
    disconnected: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
}

impl fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("player", &self.player)
            .field("state", &self.state)
            .field("needs_resync", &self.needs_resync)
            .finish_non_exhaustive()
    }
}

impl Subscriber {
    /// Create a subscriber with a bounded outbound queue.
    pub fn new(
        id: SubscriberId,
        player: ActorId,
        sink: Box<dyn SubscriberSink>,
        queue_len: usize,
        write_wait: Duration,
    ) -> Self {
        let (out_tx, out_rx) = bounded(queue_len.max(1));
        Self {
            id,
            player,
            state: SubscriberState::Joined,
            needs_resync: true,
            last_keyframe_seq: KeyframeSeq(0),
            msg_seq: MessageSeq::default(),
            out_tx,
            out_rx: Some(out_rx),
            sink: Some(sink),
            write_wait,
            disconnected: Arc::new(AtomicBool::new(false)),
            writer: None,
        }
    }

    /// Next per-subscriber message sequence.
    pub fn next_seq(&mut self) -> MessageSeq {
        self.msg_seq.bump()
    }

    /// Non-blocking enqueue. Returns `false` when the queue was full
    /// and the payload was dropped (the caller records telemetry and
    /// flags resync).
    pub fn enqueue_payload(&mut self, payload: Vec<u8>) -> bool {
        match self.out_tx.try_send(payload) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.needs_resync = true;
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.disconnected.store(true, Ordering::Release);
                false
            }
        }
    }

    /// Whether the IO side declared this subscriber dead.
    pub fn is_disconnected(&self) -> bool {
        self.state == SubscriberState::Disconnected || self.disconnected.load(Ordering::Acquire)
    }

    /// Synchronously drain the queue into the sink (lockstep mode).
    ///
    /// Each write gets a fresh deadline of `write_wait`. The first
    /// failure marks the subscriber disconnected and abandons the rest.
    pub fn pump(&mut self) {
        let Some(rx) = self.out_rx.as_ref() else {
            return;
        };
        let mut failed = false;
        let payloads: Vec<Vec<u8>> = rx.try_iter().collect();
        if let Some(sink) = self.sink.as_mut() {
            for payload in payloads {
                if failed {
                    break;
                }
                if sink.write(&payload, self.write_wait).is_err() {
                    failed = true;
                }
            }
        }
        if failed {
            self.disconnected.store(true, Ordering::Release);
        }
    }

    /// Move the queue and sink onto a dedicated writer thread
    /// (realtime mode). Runs until the sender closes or a write fails.
    pub fn spawn_writer(&mut self) {
        let (Some(rx), Some(mut sink)) = (self.out_rx.take(), self.sink.take()) else {
            return;
        };
        let write_wait = self.write_wait;
        let disconnected = Arc::clone(&self.disconnected);
        let name = format!("skarn-sub-{}", self.id);
        let handle = std::thread::Builder::new()
            .name(name)
            .spawn(move || {
                while let Ok(payload) = rx.recv() {
                    if sink.write(&payload, write_wait).is_err() {
                        disconnected.store(true, Ordering::Release);
                        // Drain whatever is left so the producer's
                        // try_send keeps succeeding until teardown.
                        for _ in rx.try_iter() {}
                        break;
                    }
                }
            })
            .expect("failed to spawn subscriber writer thread");
        self.writer = Some(handle);
    }

    /// Close the queue and join the writer, if any.
    pub fn shutdown(&mut self) {
        self.state = SubscriberState::Disconnected;
        // Dropping the last sender closes the channel; replace ours
        // with a dangling one.
        let (tx, _) = bounded(1);
        self.out_tx = tx;
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
        self.out_rx = None;
        self.sink = None;
    }
}

/// The subscriber registry, keyed by id in join order.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subs: indexmap::IndexMap<SubscriberId, Subscriber>,
    next: u64,
}

impl SubscriberRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber for a player and return its id.
    pub fn add(
        &mut self,
        player: ActorId,
        sink: Box<dyn SubscriberSink>,
        queue_len: usize,
        write_wait: Duration,
    ) -> SubscriberId {
        self.next += 1;
        let id = SubscriberId(self.next);
        self.subs
            .insert(id, Subscriber::new(id, player, sink, queue_len, write_wait));
        id
    }

    /// Look up a subscriber.
    pub fn get(&self, id: SubscriberId) -> Option<&Subscriber> {
        self.subs.get(&id)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: SubscriberId) -> Option<&mut Subscriber> {
        self.subs.get_mut(&id)
    }

    /// Remove and shut down a subscriber, returning its player id.
    pub fn remove(&mut self, id: SubscriberId) -> Option<ActorId> {
        let mut sub = self.subs.shift_remove(&id)?;
        sub.shutdown();
        Some(sub.player.clone())
    }

    /// Ids in join order.
    pub fn ids(&self) -> Vec<SubscriberId> {
        self.subs.keys().copied().collect()
    }

    /// Iterate subscribers mutably, in join order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Subscriber> {
        self.subs.values_mut()
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Pump every subscriber queue synchronously (lockstep mode).
    pub fn pump_all(&mut self) {
        for sub in self.subs.values_mut() {
            sub.pump();
        }
    }
}
