//! The tick engine: single owner of all simulation state.
//!
//! One `execute_tick` call runs the complete pipeline: apply AI and
//! player commands in FIFO order, sweep heartbeat timeouts and dead
//! subscribers, step the world through its fixed phases, and marshal
//! per-subscriber payloads. All mutation happens here, on one thread;
//! IO reaches the engine only through the intake buffer and the
//! bounded outbound queues.

use crate::applier;
use crate::intake::IntakeBuffer;
use crate::marshal::Marshaller;
use crate::metrics::{DropTable, TickMetrics};
use crate::subscriber::{SubscriberId, SubscriberRegistry, SubscriberSink, SubscriberState};
use skarn_core::{
    ActorId, Admission, Command, CommandPayload, ConfigError, KeyframeSeq, TickId, WorldConfig,
};
use skarn_proto::messages::{ClientMessage, ConfigSummary, JoinResponse, PROTOCOL_VERSION};
use skarn_sim::catalog::EffectCatalog;
use skarn_sim::gate::AbilityGates;
use skarn_sim::manager::EffectManager;
use skarn_sim::status::StatusRegistry;
use skarn_sim::step::step_world;
use skarn_sim::world::World;
use smallvec::SmallVec;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// The authoritative server engine.
#[derive(Debug)]
pub struct TickEngine {
    config: WorldConfig,
    world: World,
    effects: EffectManager,
    statuses: StatusRegistry,
    gates: AbilityGates,
    intake: IntakeBuffer,
    subscribers: SubscriberRegistry,
    marshaller: Marshaller,
    drops: DropTable,
    pending_ai: Vec<Command>,
    tick: TickId,
    metrics: TickMetrics,
}

impl TickEngine {
    /// Construct an engine from a validated config and loaded catalog.
    ///
    /// # Errors
    ///
    /// Configuration validation failures.
    pub fn new(config: WorldConfig, catalog: EffectCatalog) -> Result<Self, ConfigError> {
        config.validate()?;
        let world = World::new(config.clone());
        let statuses = StatusRegistry::builtin(&config);
        Ok(Self {
            intake: IntakeBuffer::new(config.intake_capacity, config.per_actor_command_limit),
            world,
            effects: EffectManager::new(catalog),
            statuses,
            gates: AbilityGates::builtin(),
            subscribers: SubscriberRegistry::new(),
            marshaller: Marshaller::new(),
            drops: DropTable::default(),
            pending_ai: Vec::new(),
            tick: TickId(0),
            metrics: TickMetrics::default(),
            config,
        })
    }

    // ── intake ──────────────────────────────────────────────────

    /// Admit one command, recording drop telemetry.
    pub fn enqueue(&mut self, cmd: Command) -> Admission {
        let command_type = cmd.payload.command_type();
        let actor = cmd.actor.clone();
        let admission = self.intake.enqueue(cmd);
        if let Some(reason) = admission.reason {
            debug!(actor = %actor, reason = %reason, command_type = %command_type, "admission drop");
            self.drops.record(reason, command_type);
        }
        admission
    }

    /// Pending intake commands.
    pub fn pending(&self) -> usize {
        self.intake.pending()
    }

    // ── subscribers ─────────────────────────────────────────────

    /// Join a new player: spawns the actor, registers the subscriber,
    /// and stages the join response on its queue.
    pub fn join(&mut self, sink: Box<dyn SubscriberSink>) -> (SubscriberId, ActorId) {
        let now_ms = self.tick_time_ms(self.tick);
        let player = self.world.add_player(now_ms);
        let id = self.subscribers.add(
            player.clone(),
            sink,
            self.config.outbound_queue_len,
            Duration::from_millis(self.config.write_wait_ms as u64),
        );
        let snapshot = self.world.snapshot(self.tick);
        let response = JoinResponse {
            ver: PROTOCOL_VERSION,
            id: player.clone(),
            players: snapshot.players,
            npcs: snapshot.npcs,
            obstacles: snapshot.obstacles,
            ground_items: snapshot.ground_items,
            config: ConfigSummary::from_config(&self.config),
            resync: false,
            keyframe_interval: self.config.keyframe_interval,
            effect_catalog_hash: self.effects.catalog().hash().to_string(),
        };
        if let Ok(payload) = serde_json::to_vec(&response) {
            if let Some(sub) = self.subscribers.get_mut(id) {
                let _ = sub.enqueue_payload(payload);
                sub.state = SubscriberState::Subscribing;
            }
        }
        info!(subscriber = %id, player = %player, "subscriber joined");
        (id, player)
    }

    /// Disconnect a subscriber; its player despawns on the next tick.
    pub fn leave(&mut self, id: SubscriberId) {
        if let Some(sub) = self.subscribers.get_mut(id) {
            sub.state = SubscriberState::Disconnected;
        }
    }

    /// Translate and admit an inbound client message for a subscriber.
    pub fn handle_client_message(&mut self, id: SubscriberId, message: ClientMessage) -> Admission {
        let Some(sub) = self.subscribers.get(id) else {
            return Admission::dropped(skarn_core::DropReason::InvalidTarget);
        };
        let actor = sub.player.clone();
        let origin_tick = self.tick;
        let issued_at_ms = self.tick_time_ms(self.tick);

        let payload = match message {
            ClientMessage::Move { dx, dy, facing } => CommandPayload::Move {
                dx,
                dy,
                facing: facing.as_deref().and_then(skarn_core::Facing::parse),
            },
            ClientMessage::Action { name } => CommandPayload::Action { name },
            ClientMessage::Path { waypoints } => CommandPayload::Path {
                waypoints: SmallVec::from_vec(waypoints),
            },
            ClientMessage::Heartbeat { client_sent } => CommandPayload::Heartbeat {
                client_sent_ms: client_sent,
            },
            ClientMessage::KeyframeRequest { keyframe_seq } => {
                self.serve_keyframe(id, keyframe_seq);
                return Admission::accepted();
            }
        };

        self.enqueue(Command {
            actor,
            payload,
            origin_tick,
            issued_at_ms,
        })
    }

    /// Serve or nack a keyframe recovery request.
    pub fn serve_keyframe(&mut self, id: SubscriberId, requested: KeyframeSeq) {
        self.marshaller.serve_keyframe_request(
            &self.world,
            &mut self.subscribers,
            &self.config,
            id,
            requested,
            &mut self.metrics,
        );
    }

    // ── tick pipeline ───────────────────────────────────────────

    /// Synthetic tick time in milliseconds (epoch 0).
    pub fn tick_time_ms(&self, tick: TickId) -> f64 {
        tick.0 as f64 * 1000.0 / self.config.tick_rate_hz
    }

    /// Execute the next tick at its synthetic time.
    pub fn execute_tick(&mut self) -> TickId {
        let tick_start = Instant::now();
        let tick = self.tick.next();
        self.tick = tick;
        let now_ms = self.tick_time_ms(tick);
        let dt = self.config.dt();

        self.metrics.tick = tick.0;
        self.metrics.drained_commands = 0;
        self.metrics.applied_commands = 0;
        self.metrics.patches_emitted = 0;
        self.metrics.effect_events_emitted = 0;

        // 1. Commands: AI decisions from the previous tick lead (system
        //    class), then the intake drain in FIFO admission order.
        let cmd_start = Instant::now();
        let mut commands = std::mem::take(&mut self.pending_ai);
        commands.extend(self.intake.drain());
        self.metrics.drained_commands = commands.len() as u64;
        self.metrics.applied_commands = applier::apply_commands(
            &mut self.world,
            &mut self.effects,
            &self.gates,
            &mut self.drops,
            commands,
            now_ms,
        );
        self.metrics.command_processing_us = cmd_start.elapsed().as_micros() as u64;

        // 2. Lifecycle sweeps: dead subscribers, then heartbeat timeouts.
        self.sweep_disconnected();
        self.sweep_heartbeats(now_ms);

        // 3. World step.
        let step_start = Instant::now();
        let outcome = step_world(
            &mut self.world,
            &mut self.effects,
            &self.statuses,
            tick,
            now_ms,
            dt,
        );
        self.pending_ai = outcome.ai_commands;
        self.metrics.step_us = step_start.elapsed().as_micros() as u64;

        // 4. Marshal. Failure restores the journal; the next tick
        //    retries with the buffers intact.
        let marshal_start = Instant::now();
        let _ = self.marshaller.marshal_tick(
            &mut self.world,
            &mut self.subscribers,
            &self.config,
            tick,
            now_ms,
            &mut self.metrics,
        );
        self.metrics.marshal_us = marshal_start.elapsed().as_micros() as u64;

        // 5. Telemetry rollup.
        let telemetry = self.world.drain_telemetry();
        self.metrics.damage_records = telemetry.damage.len() as u64;
        self.metrics.defeat_records = telemetry.defeats.len() as u64;
        self.metrics.dropped_intents += telemetry.dropped_intents;
        self.metrics.total_us = tick_start.elapsed().as_micros() as u64;

        tick
    }

    /// Remove players whose subscribers disconnected; terminal patches
    /// land in this tick's diff.
    fn sweep_disconnected(&mut self) {
        let dead: Vec<SubscriberId> = self
            .subscribers
            .ids()
            .into_iter()
            .filter(|id| {
                self.subscribers
                    .get(*id)
                    .map(|s| s.is_disconnected())
                    .unwrap_or(false)
            })
            .collect();
        for id in dead {
            if let Some(player) = self.subscribers.remove(id) {
                self.world.remove_actor(&player);
                self.metrics.subscribers_disconnected += 1;
                info!(subscriber = %id, player = %player, "subscriber disconnected");
            }
        }
    }

    /// Despawn players silent for `3 · heartbeat_interval`.
    fn sweep_heartbeats(&mut self, now_ms: f64) {
        let timeout = self.config.heartbeat_timeout_ms();
        let timed_out: Vec<ActorId> = self
            .world
            .players()
            .iter()
            .filter(|(_, p)| now_ms - p.last_heartbeat_ms > timeout)
            .map(|(id, _)| id.clone())
            .collect();
        for player in timed_out {
            info!(%player, "heartbeat timeout; despawning");
            self.world.remove_actor(&player);
            for id in self.subscribers.ids() {
                let matches = self
                    .subscribers
                    .get(id)
                    .map(|s| s.player == player)
                    .unwrap_or(false);
                if matches {
                    self.subscribers.remove(id);
                    self.metrics.subscribers_disconnected += 1;
                }
            }
        }
    }

    // ── accessors ───────────────────────────────────────────────

    /// The current tick.
    pub fn tick(&self) -> TickId {
        self.tick
    }

    /// Engine configuration.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// The world, read-only.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable world access for tests and scenario setup.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The effect manager.
    pub fn effects(&self) -> &EffectManager {
        &self.effects
    }

    /// The ability gates.
    pub fn gates(&self) -> &AbilityGates {
        &self.gates
    }

    /// The subscriber registry.
    pub fn subscribers_mut(&mut self) -> &mut SubscriberRegistry {
        &mut self.subscribers
    }

    /// Current keyframe sequence.
    pub fn keyframe_seq(&self) -> KeyframeSeq {
        self.marshaller.keyframe_seq()
    }

    /// Metrics from the most recent tick.
    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    /// Record the scheduler's cumulative skipped-backlog count.
    pub fn set_skipped_total(&mut self, skipped: u64) {
        self.metrics.skipped_ticks = skipped;
    }

    /// Command drop telemetry.
    pub fn command_drops(&self) -> &DropTable {
        &self.drops
    }
}
