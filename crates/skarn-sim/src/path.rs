//! Waypoint path following.
//!
//! A `path` command replaces the actor's [`PathState`]; each tick the
//! stepper asks it for a synthetic movement intent. Arrival uses a
//! radius rather than exact equality, and a stall counter skips the
//! current waypoint after repeated no-progress ticks so actors pinned
//! against an obstacle re-target instead of grinding forever.

use skarn_core::Vec2;
use smallvec::SmallVec;

/// Distance at which a waypoint counts as reached.
pub const ARRIVAL_RADIUS: f64 = 6.0;

/// Minimum per-tick distance decrease that counts as progress.
pub const PROGRESS_EPSILON: f64 = 0.1;

/// Consecutive no-progress ticks before the current waypoint is skipped.
pub const STALL_TICKS: u32 = 10;

/// Path-follow state for one actor.
#[derive(Clone, Debug, PartialEq)]
pub struct PathState {
    /// Remaining waypoints in visit order.
    pub waypoints: SmallVec<[Vec2; 8]>,
    /// Index of the waypoint currently steered toward.
    pub index: usize,
    /// Consecutive ticks without progress toward the current waypoint.
    pub stall_ticks: u32,
    /// Best distance achieved toward the current waypoint.
    pub best_dist: f64,
}

impl PathState {
    /// Build a path state; empty waypoint lists produce `None`.
    pub fn new(waypoints: SmallVec<[Vec2; 8]>) -> Option<Self> {
        if waypoints.is_empty() {
            return None;
        }
        Some(Self {
            waypoints,
            index: 0,
            stall_ticks: 0,
            best_dist: f64::INFINITY,
        })
    }

    /// Produce this tick's intent vector toward the current waypoint.
    ///
    /// Returns `None` when the path is complete. The vector is unit
    /// length (or shorter on the final approach) so the stepper can
    /// scale it by speed like any other intent.
    pub fn step(&mut self, pos: Vec2) -> Option<Vec2> {
        loop {
            let target = *self.waypoints.get(self.index)?;
            let dist = pos.distance(target);

            if dist <= ARRIVAL_RADIUS {
                self.advance();
                continue;
            }

            if dist < self.best_dist - PROGRESS_EPSILON {
                self.best_dist = dist;
                self.stall_ticks = 0;
            } else {
                self.stall_ticks += 1;
                if self.stall_ticks >= STALL_TICKS {
                    // Stuck against something. Skip the waypoint and
                    // re-target the next one.
                    self.advance();
                    continue;
                }
            }

            return Some((target - pos).normalized());
        }
    }

    fn advance(&mut self) {
        self.index += 1;
        self.stall_ticks = 0;
        self.best_dist = f64::INFINITY;
    }

    /// Whether every waypoint has been consumed.
    pub fn complete(&self) -> bool {
        self.index >= self.waypoints.len()
    }
}
