//! World configuration.
//!
//! All tunables are injected at construction and validated up front;
//! nothing is read from the environment by the simulation itself. The
//! struct is serde-able so replay scripts can embed the exact
//! configuration of a recorded run.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Construction-time configuration for a world and its server loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorldConfig {
    /// Simulation rate in Hz. Every tick advances `1/tick_rate_hz` seconds.
    pub tick_rate_hz: f64,
    /// World width in units.
    pub world_width: f64,
    /// World height in units.
    pub world_height: f64,
    /// Seed for world population and NPC jitter.
    pub seed: u64,
    /// Half extent of player and NPC collision squares.
    pub half_extent: f64,
    /// Player movement speed in units per second.
    pub player_speed: f64,
    /// Expected client heartbeat interval, milliseconds.
    pub heartbeat_interval_ms: f64,
    /// Per-write IO deadline, milliseconds.
    pub write_wait_ms: f64,
    /// Full keyframe every this many ticks.
    pub keyframe_interval: u64,
    /// Keyframe ring capacity for nack recovery.
    pub keyframe_ring: usize,
    /// Maximum ticks advanced per scheduler pulse; excess backlog is
    /// skipped with telemetry.
    pub max_catch_up_ticks: u32,
    /// Global intake buffer capacity.
    pub intake_capacity: usize,
    /// Per-actor pending command limit.
    pub per_actor_command_limit: usize,
    /// Per-subscriber outbound queue length.
    pub outbound_queue_len: usize,
    /// NPCs to spawn at world population.
    pub npc_count: usize,
    /// Stone obstacles to place at world population.
    pub stone_count: usize,
    /// Gold-ore obstacles to place at world population.
    pub gold_ore_count: usize,
    /// Lava pools to place at world population.
    pub lava_count: usize,
    /// Damage per second while burning.
    pub lava_damage_per_second: f64,
    /// How long the burning status lingers, milliseconds.
    pub burning_duration_ms: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 15.0,
            world_width: 640.0,
            world_height: 640.0,
            seed: 0,
            half_extent: 20.0,
            player_speed: 140.0,
            heartbeat_interval_ms: 2000.0,
            write_wait_ms: 2000.0,
            keyframe_interval: 30,
            keyframe_ring: 8,
            max_catch_up_ticks: 4,
            intake_capacity: 1024,
            per_actor_command_limit: 64,
            outbound_queue_len: 32,
            npc_count: 0,
            stone_count: 0,
            gold_ore_count: 0,
            lava_count: 0,
            lava_damage_per_second: 20.0,
            burning_duration_ms: 3000.0,
        }
    }
}

impl WorldConfig {
    /// Seconds per tick.
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate_hz
    }

    /// Heartbeat timeout: a player that has been silent this long is
    /// despawned.
    pub fn heartbeat_timeout_ms(&self) -> f64 {
        3.0 * self.heartbeat_interval_ms
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant; the config is unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.tick_rate_hz.is_finite() || self.tick_rate_hz <= 0.0 {
            return Err(ConfigError::InvalidTickRate {
                value: self.tick_rate_hz,
            });
        }
        for dim in [self.world_width, self.world_height] {
            if !dim.is_finite() || dim <= 0.0 {
                return Err(ConfigError::InvalidWorldSize { value: dim });
            }
        }
        if self.intake_capacity == 0 {
            return Err(ConfigError::IntakeCapacityZero);
        }
        if self.per_actor_command_limit == 0 {
            return Err(ConfigError::PerActorLimitZero);
        }
        if self.outbound_queue_len == 0 {
            return Err(ConfigError::OutboundQueueZero);
        }
        if self.keyframe_interval == 0 {
            return Err(ConfigError::KeyframeIntervalZero);
        }
        for (field, value) in [
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("write_wait_ms", self.write_wait_ms),
            ("burning_duration_ms", self.burning_duration_ms),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidIntervalMs { field, value });
            }
        }
        Ok(())
    }
}
