//! Bounded command intake with admission control.
//!
//! Producers (IO workers in realtime mode, the caller in lockstep)
//! enqueue; the tick loop drains exactly once per tick, in FIFO
//! admission order. Admission enforces a per-actor pending limit first,
//! then global capacity; both rejections are best-effort drops, never
//! client-visible errors.

use skarn_core::{ActorId, Admission, Command, DropReason};
use std::collections::{HashMap, VecDeque};

/// Bounded FIFO of pending commands.
#[derive(Debug)]
pub struct IntakeBuffer {
    queue: VecDeque<Command>,
    per_actor: HashMap<ActorId, usize>,
    capacity: usize,
    per_actor_limit: usize,
}

impl IntakeBuffer {
    /// Create a buffer with a global capacity and a per-actor limit.
    pub fn new(capacity: usize, per_actor_limit: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity.min(4096)),
            per_actor: HashMap::new(),
            capacity,
            per_actor_limit,
        }
    }

    /// Attempt to admit one command.
    pub fn enqueue(&mut self, cmd: Command) -> Admission {
        let pending_for_actor = self.per_actor.get(&cmd.actor).copied().unwrap_or(0);
        if pending_for_actor >= self.per_actor_limit {
            return Admission::dropped(DropReason::LimitExceeded);
        }
        if self.queue.len() >= self.capacity {
            return Admission::dropped(DropReason::Capacity);
        }
        *self.per_actor.entry(cmd.actor.clone()).or_insert(0) += 1;
        self.queue.push_back(cmd);
        Admission::accepted()
    }

    /// Number of pending commands.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drain all admitted commands in FIFO order. Called exactly once
    /// per tick.
    pub fn drain(&mut self) -> Vec<Command> {
        self.per_actor.clear();
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skarn_core::{CommandPayload, TickId};

    fn move_cmd(actor: &str) -> Command {
        Command {
            actor: ActorId::new(actor),
            payload: CommandPayload::Move {
                dx: 1.0,
                dy: 0.0,
                facing: None,
            },
            origin_tick: TickId(0),
            issued_at_ms: 0.0,
        }
    }

    // ── admission tests ────────────────────────────────────────

    #[test]
    fn admits_until_per_actor_limit() {
        let mut buffer = IntakeBuffer::new(1024, 3);
        for _ in 0..3 {
            assert!(buffer.enqueue(move_cmd("player-1")).accepted);
        }
        let admission = buffer.enqueue(move_cmd("player-1"));
        assert!(!admission.accepted);
        assert_eq!(admission.reason, Some(DropReason::LimitExceeded));
        assert_eq!(buffer.pending(), 3);
    }

    #[test]
    fn per_actor_limit_is_per_actor() {
        let mut buffer = IntakeBuffer::new(1024, 1);
        assert!(buffer.enqueue(move_cmd("player-1")).accepted);
        assert!(buffer.enqueue(move_cmd("player-2")).accepted);
        assert!(!buffer.enqueue(move_cmd("player-1")).accepted);
    }

    #[test]
    fn global_capacity_backpressure() {
        let mut buffer = IntakeBuffer::new(2, 64);
        assert!(buffer.enqueue(move_cmd("player-1")).accepted);
        assert!(buffer.enqueue(move_cmd("player-2")).accepted);
        let admission = buffer.enqueue(move_cmd("player-3"));
        assert_eq!(admission.reason, Some(DropReason::Capacity));
    }

    // ── drain tests ────────────────────────────────────────────

    #[test]
    fn drain_preserves_fifo_order_and_clears() {
        let mut buffer = IntakeBuffer::new(1024, 64);
        buffer.enqueue(move_cmd("player-2"));
        buffer.enqueue(move_cmd("player-1"));
        buffer.enqueue(move_cmd("player-3"));
        let drained = buffer.drain();
        let order: Vec<&str> = drained.iter().map(|c| c.actor.as_str()).collect();
        assert_eq!(order, vec!["player-2", "player-1", "player-3"]);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn drain_resets_per_actor_counters() {
        let mut buffer = IntakeBuffer::new(1024, 1);
        buffer.enqueue(move_cmd("player-1"));
        buffer.drain();
        assert!(buffer.enqueue(move_cmd("player-1")).accepted);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn pending_never_exceeds_capacity(
                capacity in 1usize..64,
                limit in 1usize..32,
                actors in prop::collection::vec(0u8..8, 0..256),
            ) {
                let mut buffer = IntakeBuffer::new(capacity, limit);
                for a in actors {
                    let _ = buffer.enqueue(move_cmd(&format!("player-{a}")));
                    prop_assert!(buffer.pending() <= capacity);
                }
            }
        }
    }
}
