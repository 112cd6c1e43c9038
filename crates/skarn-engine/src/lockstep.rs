//! Lockstep (synchronous) server.
//!
//! [`LockstepServer`] drives the same [`TickEngine`] as the realtime
//! loop, but synchronously: each [`step()`](LockstepServer::step)
//! executes exactly one tick at its synthetic time and then pumps every
//! subscriber queue. This is the vehicle for tests, scenarios, and
//! deterministic replay; no threads, no wall clock.

use crate::engine::TickEngine;
use crate::scheduler::Scheduler;
use crate::subscriber::{SubscriberId, SubscriberSink};
use skarn_core::{
    ActorId, Admission, Command, ConfigError, KeyframeSeq, SchedulerFault, TickId, WorldConfig,
};
use skarn_proto::messages::ClientMessage;
use skarn_sim::catalog::EffectCatalog;
use skarn_sim::world::World;

/// Synchronous server for tests and replay.
#[derive(Debug)]
pub struct LockstepServer {
    engine: TickEngine,
    scheduler: Scheduler,
}

impl LockstepServer {
    /// Build a server over a config and catalog. The scheduler epoch
    /// is 0, so tick times are a pure function of the tick number.
    ///
    /// # Errors
    ///
    /// Configuration validation failures.
    pub fn new(config: WorldConfig, catalog: EffectCatalog) -> Result<Self, ConfigError> {
        let scheduler = Scheduler::new(config.tick_rate_hz, config.max_catch_up_ticks, 0.0);
        Ok(Self {
            engine: TickEngine::new(config, catalog)?,
            scheduler,
        })
    }

    /// Execute exactly one tick, then pump subscriber queues.
    pub fn step(&mut self) -> TickId {
        let tick = self.engine.execute_tick();
        self.engine.subscribers_mut().pump_all();
        tick
    }

    /// Execute ticks until the counter reaches `target` (inclusive).
    pub fn run_until(&mut self, target: TickId) {
        while self.engine.tick() < target {
            self.step();
        }
    }

    /// Drive ticks from a wall-clock pulse through the scheduler.
    ///
    /// # Errors
    ///
    /// Propagates clock regression; the server must not be pulsed again.
    pub fn advance_clock(&mut self, now_ms: f64) -> Result<u32, SchedulerFault> {
        let due = self.scheduler.advance(now_ms)?;
        // Rolled up on every pulse, even when no ticks are due.
        self.engine.set_skipped_total(self.scheduler.skipped_total());
        for _ in 0..due.count {
            self.step();
        }
        Ok(due.count)
    }

    /// Admit a command.
    pub fn enqueue(&mut self, cmd: Command) -> Admission {
        self.engine.enqueue(cmd)
    }

    /// Join a player with a sink.
    pub fn join(&mut self, sink: Box<dyn SubscriberSink>) -> (SubscriberId, ActorId) {
        self.engine.join(sink)
    }

    /// Feed an inbound client message.
    pub fn handle_client_message(&mut self, id: SubscriberId, msg: ClientMessage) -> Admission {
        self.engine.handle_client_message(id, msg)
    }

    /// Request a keyframe for a subscriber.
    pub fn request_keyframe(&mut self, id: SubscriberId, seq: KeyframeSeq) {
        self.engine.serve_keyframe(id, seq);
        self.engine.subscribers_mut().pump_all();
    }

    /// The engine, read-only.
    pub fn engine(&self) -> &TickEngine {
        &self.engine
    }

    /// The engine, mutable (scenario setup).
    pub fn engine_mut(&mut self) -> &mut TickEngine {
        &mut self.engine
    }

    /// The world, read-only.
    pub fn world(&self) -> &World {
        self.engine.world()
    }

    /// The world, mutable (scenario setup).
    pub fn world_mut(&mut self) -> &mut World {
        self.engine.world_mut()
    }

    /// Current tick.
    pub fn tick(&self) -> TickId {
        self.engine.tick()
    }
}
