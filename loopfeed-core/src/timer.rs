use std::time::{Duration, Instant};

use crate::{playback::Occupancy, util::Sequence};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// What a timer is for.  The feed routes expiries by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Image display time ran out.
    Dwell { occupancy: Occupancy },
    /// Video never reported its end within the stall timeout.
    Stall { occupancy: Occupancy },
    /// Delayed retry of a failed transition.
    Retry { index: usize },
    /// Programmatic transition was never confirmed by an observation.
    Settle { target: usize },
}

struct Pending {
    id: TimerId,
    deadline: Instant,
    kind: TimerKind,
}

/// One-shot, cancellable timers over a caller-supplied clock.
pub struct Timers {
    ids: Sequence<u64>,
    pending: Vec<Pending>,
}

impl Timers {
    pub fn new() -> Self {
        Self {
            ids: Sequence::new(0),
            pending: Vec::new(),
        }
    }

    pub fn schedule(&mut self, now: Instant, delay: Duration, kind: TimerKind) -> TimerId {
        let id = TimerId(self.ids.advance());
        self.pending.push(Pending {
            id,
            deadline: now + delay,
            kind,
        });
        id
    }

    /// Returns `false` if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|pending| pending.id != id);
        self.pending.len() != before
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|pending| pending.deadline).min()
    }

    /// Remove and return every timer due at `now`, earliest first.  Timers
    /// sharing a deadline come out in scheduling order.
    pub fn expire(&mut self, now: Instant) -> Vec<TimerKind> {
        let (mut due, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|pending| pending.deadline <= now);
        self.pending = waiting;
        due.sort_by_key(|pending| (pending.deadline, pending.id.0));
        due.into_iter().map(|pending| pending.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
