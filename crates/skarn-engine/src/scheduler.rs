//! Fixed-rate tick scheduling with a catch-up cap.
//!
//! The scheduler turns wall-clock pulses into a number of due ticks:
//! `floor((now - cursor) / period)`, clamped so a stall cannot spiral
//! into an unbounded catch-up burst. Skipped backlog is consumed (the
//! cursor advances past it) and counted. Inside a tick, the only clock
//! is the synthetic [`tick_time_ms`](Scheduler::tick_time_ms); the
//! caller's `now` never leaks into the simulation.

use skarn_core::{SchedulerFault, TickId};

/// Ticks due after a pulse.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DueTicks {
    /// Ticks to execute now.
    pub count: u32,
    /// Backlog ticks skipped by the catch-up cap.
    pub skipped: u32,
}

/// Wall-clock → tick translation.
#[derive(Clone, Debug)]
pub struct Scheduler {
    period_ms: f64,
    t0_ms: f64,
    cursor_ms: f64,
    last_now_ms: f64,
    max_catch_up: u32,
    skipped_total: u64,
}

impl Scheduler {
    /// Create a scheduler starting its epoch at `t0_ms`.
    pub fn new(rate_hz: f64, max_catch_up: u32, t0_ms: f64) -> Self {
        Self {
            period_ms: 1000.0 / rate_hz,
            t0_ms,
            cursor_ms: t0_ms,
            last_now_ms: t0_ms,
            max_catch_up: max_catch_up.max(1),
            skipped_total: 0,
        }
    }

    /// Advance against a wall-clock pulse.
    ///
    /// # Errors
    ///
    /// [`SchedulerFault::ClockRegression`] when `now_ms` moves
    /// backwards. This is fatal; the scheduler must not be pulsed again.
    pub fn advance(&mut self, now_ms: f64) -> Result<DueTicks, SchedulerFault> {
        if now_ms < self.last_now_ms {
            return Err(SchedulerFault::ClockRegression {
                last_ms: self.last_now_ms,
                now_ms,
            });
        }
        self.last_now_ms = now_ms;

        let due = ((now_ms - self.cursor_ms) / self.period_ms).floor() as u64;
        let count = due.min(u64::from(self.max_catch_up)) as u32;
        let skipped = (due - u64::from(count)) as u32;

        // Skipped backlog consumes simulated time rather than starving
        // IO on the next pulse.
        self.cursor_ms += due as f64 * self.period_ms;
        self.skipped_total += u64::from(skipped);

        Ok(DueTicks { count, skipped })
    }

    /// The synthetic time of a tick, milliseconds since the epoch base.
    pub fn tick_time_ms(&self, tick: TickId) -> f64 {
        self.t0_ms + tick.0 as f64 * self.period_ms
    }

    /// Milliseconds per tick.
    pub fn period_ms(&self) -> f64 {
        self.period_ms
    }

    /// Cumulative skipped backlog.
    pub fn skipped_total(&self) -> u64 {
        self.skipped_total
    }
}
