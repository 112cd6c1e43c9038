//! Per-tick telemetry.
//!
//! [`TickMetrics`] is the flat counter snapshot refreshed each tick;
//! cumulative counters (drops, skips, marshal failures) carry across
//! ticks. [`DropTable`] keys command drops by `(reason, type)`, which
//! is the shape operators actually query.

use indexmap::IndexMap;
use skarn_core::{CommandType, DropReason};

/// Command drop counters keyed by `(reason, command type)`.
#[derive(Clone, Debug, Default)]
pub struct DropTable {
    counts: IndexMap<(DropReason, CommandType), u64>,
}

impl DropTable {
    /// Record one drop.
    pub fn record(&mut self, reason: DropReason, command_type: CommandType) {
        *self.counts.entry((reason, command_type)).or_insert(0) += 1;
    }

    /// Count for one `(reason, type)` cell.
    pub fn count(&self, reason: DropReason, command_type: CommandType) -> u64 {
        self.counts
            .get(&(reason, command_type))
            .copied()
            .unwrap_or(0)
    }

    /// Total drops across all cells.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Iterate the non-zero cells in first-recorded order.
    pub fn iter(&self) -> impl Iterator<Item = (&(DropReason, CommandType), &u64)> {
        self.counts.iter()
    }
}

/// Timing and volume metrics for one tick, plus cumulative counters.
#[derive(Clone, Debug, Default)]
pub struct TickMetrics {
    /// The tick these per-tick numbers describe.
    pub tick: u64,
    /// Commands drained from intake this tick (AI commands included).
    pub drained_commands: u64,
    /// Commands applied (drained minus applier drops).
    pub applied_commands: u64,
    /// Patches staged by this tick's write-barriers.
    pub patches_emitted: u64,
    /// Lifecycle events staged by this tick.
    pub effect_events_emitted: u64,
    /// Damage telemetry records from this tick.
    pub damage_records: u64,
    /// Defeat telemetry records from this tick.
    pub defeat_records: u64,
    /// Command application time, microseconds.
    pub command_processing_us: u64,
    /// World step time, microseconds.
    pub step_us: u64,
    /// Marshalling time, microseconds.
    pub marshal_us: u64,
    /// Whole-tick time, microseconds.
    pub total_us: u64,
    /// Cumulative ticks skipped by the scheduler catch-up cap.
    pub skipped_ticks: u64,
    /// Cumulative marshal failures (journal restored each time).
    pub marshal_failures: u64,
    /// Cumulative outbound payloads dropped on full queues.
    pub payloads_dropped: u64,
    /// Cumulative subscribers disconnected.
    pub subscribers_disconnected: u64,
    /// Cumulative effect intents dropped for lifecycle violations.
    pub dropped_intents: u64,
}
