//! Realtime server: the tick thread and its control channel.
//!
//! The [`TickEngine`] is moved onto a dedicated thread; user threads
//! talk to it only through a bounded control channel (command batches
//! with reply channels, joins, client messages) and receive state
//! through per-subscriber writer threads. No locks anywhere on the
//! tick path.

use crate::engine::TickEngine;
use crate::scheduler::Scheduler;
use crate::subscriber::{SubscriberId, SubscriberSink};
use crossbeam_channel::{bounded, Receiver, Sender};
use skarn_core::{ActorId, Admission, Command, ConfigError, WorldConfig};
use skarn_proto::messages::ClientMessage;
use skarn_sim::catalog::EffectCatalog;
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::error;

/// Error submitting work to the tick thread.
#[derive(Debug, PartialEq, Eq)]
pub enum SubmitError {
    /// The tick thread has shut down.
    Shutdown,
    /// The control channel is full (back-pressure).
    ChannelFull,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => f.write_str("tick thread has shut down"),
            Self::ChannelFull => f.write_str("control channel full"),
        }
    }
}

impl Error for SubmitError {}

/// Control messages consumed by the tick thread between ticks.
enum Control {
    Submit {
        commands: Vec<Command>,
        reply: Sender<Vec<Admission>>,
    },
    Join {
        sink: Box<dyn SubscriberSink>,
        reply: Sender<(SubscriberId, ActorId)>,
    },
    Client {
        subscriber: SubscriberId,
        message: ClientMessage,
    },
    Leave {
        subscriber: SubscriberId,
    },
}

/// Realtime server handle.
///
/// Dropping the handle shuts the tick thread down and joins it.
pub struct RealtimeServer {
    ctl_tx: Option<Sender<Control>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<TickEngine>>,
}

impl RealtimeServer {
    /// Spawn the tick thread over a config and catalog.
    ///
    /// # Errors
    ///
    /// Configuration validation failures (checked before spawning).
    pub fn spawn(config: WorldConfig, catalog: EffectCatalog) -> Result<Self, ConfigError> {
        let engine = TickEngine::new(config.clone(), catalog)?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let (ctl_tx, ctl_rx) = bounded::<Control>(64);

        let flag = Arc::clone(&shutdown);
        let thread = std::thread::Builder::new()
            .name("skarn-tick".into())
            .spawn(move || tick_loop(engine, &config, &ctl_rx, &flag))
            .expect("failed to spawn tick thread");

        Ok(Self {
            ctl_tx: Some(ctl_tx),
            shutdown,
            thread: Some(thread),
        })
    }

    fn send(&self, control: Control) -> Result<(), SubmitError> {
        let tx = self.ctl_tx.as_ref().ok_or(SubmitError::Shutdown)?;
        tx.try_send(control).map_err(|e| match e {
            crossbeam_channel::TrySendError::Full(_) => SubmitError::ChannelFull,
            crossbeam_channel::TrySendError::Disconnected(_) => SubmitError::Shutdown,
        })
    }

    /// Submit a command batch; blocks only for the admission reply.
    ///
    /// # Errors
    ///
    /// [`SubmitError`] when the thread is gone or back-pressured.
    pub fn submit_commands(&self, commands: Vec<Command>) -> Result<Vec<Admission>, SubmitError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(Control::Submit {
            commands,
            reply: reply_tx,
        })?;
        reply_rx.recv().map_err(|_| SubmitError::Shutdown)
    }

    /// Join a player; blocks for the assigned ids.
    ///
    /// # Errors
    ///
    /// [`SubmitError`] when the thread is gone or back-pressured.
    pub fn join(
        &self,
        sink: Box<dyn SubscriberSink>,
    ) -> Result<(SubscriberId, ActorId), SubmitError> {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(Control::Join {
            sink,
            reply: reply_tx,
        })?;
        reply_rx.recv().map_err(|_| SubmitError::Shutdown)
    }

    /// Forward an inbound client message.
    ///
    /// # Errors
    ///
    /// [`SubmitError`] when the thread is gone or back-pressured.
    pub fn client_message(
        &self,
        subscriber: SubscriberId,
        message: ClientMessage,
    ) -> Result<(), SubmitError> {
        self.send(Control::Client {
            subscriber,
            message,
        })
    }

    /// Disconnect a subscriber.
    ///
    /// # Errors
    ///
    /// [`SubmitError`] when the thread is gone or back-pressured.
    pub fn leave(&self, subscriber: SubscriberId) -> Result<(), SubmitError> {
        self.send(Control::Leave { subscriber })
    }

    /// Stop the tick thread and recover the engine.
    pub fn shutdown(mut self) -> Option<TickEngine> {
        self.shutdown.store(true, Ordering::Release);
        self.ctl_tx = None;
        self.thread.take().and_then(|t| t.join().ok())
    }
}

impl Drop for RealtimeServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        self.ctl_tx = None;
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// The tick thread body. Returns the engine for post-shutdown access.
fn tick_loop(
    mut engine: TickEngine,
    config: &WorldConfig,
    ctl_rx: &Receiver<Control>,
    shutdown: &AtomicBool,
) -> TickEngine {
    let epoch = Instant::now();
    let mut scheduler = Scheduler::new(config.tick_rate_hz, config.max_catch_up_ticks, 0.0);
    let poll = Duration::from_secs_f64(1.0 / config.tick_rate_hz / 4.0);

    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        // Drain control between ticks; the channel is the only way in.
        while let Ok(control) = ctl_rx.try_recv() {
            match control {
                Control::Submit { commands, reply } => {
                    let admissions = commands
                        .into_iter()
                        .map(|cmd| engine.enqueue(cmd))
                        .collect();
                    // Best-effort: the caller may have given up waiting.
                    let _ = reply.send(admissions);
                }
                Control::Join { sink, reply } => {
                    let ids = engine.join(sink);
                    if let Some(sub) = engine.subscribers_mut().get_mut(ids.0) {
                        sub.spawn_writer();
                    }
                    let _ = reply.send(ids);
                }
                Control::Client {
                    subscriber,
                    message,
                } => {
                    let _ = engine.handle_client_message(subscriber, message);
                }
                Control::Leave { subscriber } => engine.leave(subscriber),
            }
        }

        let now_ms = epoch.elapsed().as_secs_f64() * 1000.0;
        match scheduler.advance(now_ms) {
            Ok(due) => {
                // Roll the cumulative skip count up on every pulse, not
                // only when ticks actually ran, so a zero-tick pulse
                // after a catch-up never reports stale telemetry.
                engine.set_skipped_total(scheduler.skipped_total());
                for _ in 0..due.count {
                    engine.execute_tick();
                }
            }
            Err(fault) => {
                // Clock regression is fatal; halt the loop.
                error!(%fault, "scheduler fault; halting tick thread");
                break;
            }
        }

        std::thread::sleep(poll);
    }

    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::{SinkError, SubscriberSink};
    use skarn_sim::catalog::{EffectCatalog, BUILTIN_CATALOG};
    use std::sync::Mutex;

    struct NullSink {
        frames: Arc<Mutex<usize>>,
    }

    impl SubscriberSink for NullSink {
        fn write(&mut self, _payload: &[u8], _deadline: Duration) -> Result<(), SinkError> {
            *self.frames.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn config() -> WorldConfig {
        WorldConfig {
            tick_rate_hz: 120.0,
            ..WorldConfig::default()
        }
    }

    #[test]
    fn spawn_join_tick_shutdown() {
        let server = RealtimeServer::spawn(
            config(),
            EffectCatalog::from_json(BUILTIN_CATALOG).unwrap(),
        )
        .unwrap();
        let frames = Arc::new(Mutex::new(0));
        let sink = NullSink {
            frames: Arc::clone(&frames),
        };
        let (_sub, player) = server.join(Box::new(sink)).unwrap();
        assert_eq!(player.as_str(), "player-1");

        // Let the loop run a few periods.
        std::thread::sleep(Duration::from_millis(100));
        let engine = server.shutdown().expect("engine returned on shutdown");
        assert!(engine.tick().0 > 0, "ticks advanced in realtime");
        // The writer thread drains asynchronously; give it a moment.
        std::thread::sleep(Duration::from_millis(50));
        assert!(*frames.lock().unwrap() > 0, "subscriber received frames");
    }

    #[test]
    fn shutdown_recovers_the_engine() {
        let server = RealtimeServer::spawn(
            config(),
            EffectCatalog::from_json(BUILTIN_CATALOG).unwrap(),
        )
        .unwrap();
        let engine = server.shutdown();
        assert!(engine.is_some());
    }
}
