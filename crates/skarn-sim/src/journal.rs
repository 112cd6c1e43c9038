//! The journal: patch accumulator, lifecycle-event staging, and the
//! keyframe ring.
//!
//! Write-barriers on the world append here during the tick; the
//! snapshot marshaller drains at the end of it. A failed marshal must
//! not lose drained data, so the journal supports restoring a drained
//! batch to the front of the buffer for a retry on the next tick.
//!
//! Everything here lives on the tick thread; unlike a cross-thread
//! snapshot ring there is no locking, only a fixed-capacity ring that
//! overwrites the oldest keyframe.

use crate::effect::LifecycleEvent;
use crate::patch::Patch;
use crate::snapshot::WorldSnapshot;
use skarn_core::KeyframeSeq;

/// Fixed-capacity keyframe ring for nack recovery.
///
/// Slots are tagged with their [`KeyframeSeq`] so lookups can tell a
/// live keyframe from an overwritten slot.
#[derive(Clone, Debug)]
pub struct KeyframeRing {
    slots: Vec<Option<(KeyframeSeq, WorldSnapshot)>>,
    write_pos: u64,
}

impl KeyframeRing {
    /// Create a ring with the given capacity (at least 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            write_pos: 0,
        }
    }

    /// Push a keyframe, overwriting the oldest slot when full.
    pub fn push(&mut self, seq: KeyframeSeq, frame: WorldSnapshot) {
        let idx = (self.write_pos as usize) % self.slots.len();
        self.slots[idx] = Some((seq, frame));
        self.write_pos += 1;
    }

    /// Look up a retained keyframe by sequence.
    pub fn get(&self, seq: KeyframeSeq) -> Option<&WorldSnapshot> {
        self.slots
            .iter()
            .flatten()
            .find(|(tag, _)| *tag == seq)
            .map(|(_, frame)| frame)
    }

    /// The most recently pushed keyframe.
    pub fn latest(&self) -> Option<(KeyframeSeq, &WorldSnapshot)> {
        if self.write_pos == 0 {
            return None;
        }
        let idx = ((self.write_pos - 1) as usize) % self.slots.len();
        self.slots[idx].as_ref().map(|(seq, frame)| (*seq, frame))
    }
}

/// The per-tick mutation ledger.
#[derive(Debug)]
pub struct Journal {
    patches: Vec<Patch>,
    effect_events: Vec<LifecycleEvent>,
    keyframes: KeyframeRing,
}

impl Journal {
    /// Create a journal with the given keyframe ring capacity.
    pub fn new(keyframe_ring: usize) -> Self {
        Self {
            patches: Vec::new(),
            effect_events: Vec::new(),
            keyframes: KeyframeRing::new(keyframe_ring),
        }
    }

    /// Append a patch. Called by every world write-barrier.
    pub fn record_patch(&mut self, patch: Patch) {
        self.patches.push(patch);
    }

    /// Append a lifecycle event. Called by the effect manager.
    pub fn record_effect_event(&mut self, event: LifecycleEvent) {
        self.effect_events.push(event);
    }

    /// Return and clear the accumulated patches.
    pub fn drain_patches(&mut self) -> Vec<Patch> {
        std::mem::take(&mut self.patches)
    }

    /// Staged lifecycle events, without clearing.
    pub fn snapshot_effect_events(&self) -> &[LifecycleEvent] {
        &self.effect_events
    }

    /// Return and clear the staged lifecycle events.
    pub fn drain_effect_events(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.effect_events)
    }

    /// Put a drained batch back at the front after a failed marshal, so
    /// the next tick retries with ordering preserved.
    pub fn restore(&mut self, patches: Vec<Patch>, events: Vec<LifecycleEvent>) {
        let newer = std::mem::replace(&mut self.patches, patches);
        self.patches.extend(newer);
        let newer = std::mem::replace(&mut self.effect_events, events);
        self.effect_events.extend(newer);
    }

    /// Number of pending patches.
    pub fn pending_patches(&self) -> usize {
        self.patches.len()
    }

    /// Record a keyframe into the ring.
    pub fn record_keyframe(&mut self, seq: KeyframeSeq, frame: WorldSnapshot) {
        self.keyframes.push(seq, frame);
    }

    /// Look up a retained keyframe for nack recovery.
    pub fn keyframe(&self, seq: KeyframeSeq) -> Option<&WorldSnapshot> {
        self.keyframes.get(seq)
    }

    /// The most recent keyframe.
    pub fn latest_keyframe(&self) -> Option<(KeyframeSeq, &WorldSnapshot)> {
        self.keyframes.latest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skarn_core::{ActorId, TickId};

    fn frame(tick: u64) -> WorldSnapshot {
        WorldSnapshot {
            t: TickId(tick),
            players: Vec::new(),
            npcs: Vec::new(),
            obstacles: Vec::new(),
            ground_items: Vec::new(),
        }
    }

    fn removed(id: &str) -> Patch {
        Patch::ActorRemoved {
            id: ActorId::new(id),
        }
    }

    // ── patch buffer tests ─────────────────────────────────────

    #[test]
    fn drain_returns_and_clears_in_order() {
        let mut journal = Journal::new(8);
        journal.record_patch(removed("a"));
        journal.record_patch(removed("b"));
        let drained = journal.drain_patches();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].entity_id(), "a");
        assert_eq!(drained[1].entity_id(), "b");
        assert_eq!(journal.pending_patches(), 0);
    }

    #[test]
    fn restore_prepends_before_newer_writes() {
        let mut journal = Journal::new(8);
        journal.record_patch(removed("a"));
        let drained = journal.drain_patches();

        // A write lands between the failed marshal and the restore.
        journal.record_patch(removed("b"));
        journal.restore(drained, Vec::new());

        let next = journal.drain_patches();
        assert_eq!(next[0].entity_id(), "a");
        assert_eq!(next[1].entity_id(), "b");
    }

    // ── keyframe ring tests ────────────────────────────────────

    #[test]
    fn ring_retains_capacity_most_recent() {
        let mut ring = KeyframeRing::new(3);
        for n in 0..5u64 {
            ring.push(KeyframeSeq(n), frame(n));
        }
        // 0 and 1 were overwritten.
        assert!(ring.get(KeyframeSeq(0)).is_none());
        assert!(ring.get(KeyframeSeq(1)).is_none());
        assert!(ring.get(KeyframeSeq(2)).is_some());
        assert!(ring.get(KeyframeSeq(4)).is_some());
    }

    #[test]
    fn ring_latest_tracks_last_push() {
        let mut ring = KeyframeRing::new(2);
        assert!(ring.latest().is_none());
        ring.push(KeyframeSeq(1), frame(10));
        ring.push(KeyframeSeq(2), frame(20));
        let (seq, snap) = ring.latest().unwrap();
        assert_eq!(seq, KeyframeSeq(2));
        assert_eq!(snap.t, TickId(20));
    }

    #[test]
    fn journal_keyframe_lookup() {
        let mut journal = Journal::new(2);
        journal.record_keyframe(KeyframeSeq(7), frame(70));
        assert!(journal.keyframe(KeyframeSeq(7)).is_some());
        assert!(journal.keyframe(KeyframeSeq(6)).is_none());
    }
}
