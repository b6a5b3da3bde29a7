//! Single-threaded cooperative event scheduler.
//!
//! One logical executor runs queued events to completion in FIFO order.
//! Time-delayed events go through a planner and join the same FIFO once
//! their deadline elapses. The clock is virtual: it only moves when
//! [advance](Scheduler::advance) is called, which keeps simulations and
//! tests deterministic.

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Handle to a planned (time-delayed) event, used to cancel it.
pub struct ActionId {
    deadline: Instant,
    seq: u64,
}

#[derive(Debug)]
/// FIFO of ready events plus a deadline-ordered planner.
pub struct Scheduler<E> {
    now: Instant,
    seq: u64,
    queue: VecDeque<E>,
    planned: BTreeMap<(Instant, u64), E>,
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Scheduler {
            now: Instant::now(),
            seq: 0,
            queue: VecDeque::new(),
            planned: BTreeMap::new(),
        }
    }

    // === Getters ===

    /// The scheduler's (virtual) current time.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Returns `true` when no event is ready and none is planned.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.planned.is_empty()
    }

    /// Time until the earliest planned event is due, if any.
    pub fn time_to_next_planned(&self) -> Option<Duration> {
        self.planned
            .keys()
            .next()
            .map(|(deadline, _)| deadline.saturating_duration_since(self.now))
    }

    // === Public Methods ===

    /// Append an event to the ready FIFO.
    pub fn enqueue(&mut self, event: E) {
        self.queue.push_back(event);
    }

    /// Plan an event to become ready `delay` from now.
    pub fn schedule_in(&mut self, delay: Duration, event: E) -> ActionId {
        let deadline = self.now + delay;
        let seq = self.seq;
        self.seq += 1;

        self.planned.insert((deadline, seq), event);

        ActionId { deadline, seq }
    }

    /// Drop a planned event. Returns `false` if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, action: ActionId) -> bool {
        self.planned.remove(&(action.deadline, action.seq)).is_some()
    }

    /// Pop the next ready event, FIFO.
    pub fn next_ready(&mut self) -> Option<E> {
        self.queue.pop_front()
    }

    /// Move the clock forward. Planned events whose deadline is reached
    /// join the ready FIFO in deadline-then-insertion order.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;

        while let Some(entry) = self.planned.first_entry() {
            if entry.key().0 > self.now {
                break;
            }
            let (_, event) = entry.remove_entry();
            self.queue.push_back(event);
        }
    }
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ready_events_pop_in_fifo_order() {
        let mut scheduler = Scheduler::new();

        scheduler.enqueue(1);
        scheduler.enqueue(2);
        scheduler.enqueue(3);

        assert_eq!(scheduler.next_ready(), Some(1));
        assert_eq!(scheduler.next_ready(), Some(2));
        assert_eq!(scheduler.next_ready(), Some(3));
        assert_eq!(scheduler.next_ready(), None);
    }

    #[test]
    fn planned_events_fire_in_deadline_order() {
        let mut scheduler = Scheduler::new();

        scheduler.schedule_in(Duration::from_secs(3), "late");
        scheduler.schedule_in(Duration::from_secs(1), "early");
        scheduler.enqueue("now");

        assert_eq!(scheduler.next_ready(), Some("now"));
        assert_eq!(scheduler.next_ready(), None);

        scheduler.advance(Duration::from_secs(2));
        assert_eq!(scheduler.next_ready(), Some("early"));
        assert_eq!(scheduler.next_ready(), None);

        scheduler.advance(Duration::from_secs(2));
        assert_eq!(scheduler.next_ready(), Some("late"));
        assert!(scheduler.is_idle());
    }

    #[test]
    fn same_deadline_preserves_insertion_order() {
        let mut scheduler = Scheduler::new();

        scheduler.schedule_in(Duration::from_secs(1), "first");
        scheduler.schedule_in(Duration::from_secs(1), "second");

        scheduler.advance(Duration::from_secs(1));

        assert_eq!(scheduler.next_ready(), Some("first"));
        assert_eq!(scheduler.next_ready(), Some("second"));
    }

    #[test]
    fn cancelled_actions_never_fire() {
        let mut scheduler = Scheduler::new();

        scheduler.schedule_in(Duration::from_secs(1), "keep");
        let cancelled = scheduler.schedule_in(Duration::from_secs(1), "cancelled");

        assert!(scheduler.cancel(cancelled));
        assert!(!scheduler.cancel(cancelled));

        scheduler.advance(Duration::from_secs(5));

        assert_eq!(scheduler.next_ready(), Some("keep"));
        assert_eq!(scheduler.next_ready(), None);
    }

    #[test]
    fn time_to_next_planned_tracks_earliest() {
        let mut scheduler = Scheduler::new();

        assert_eq!(scheduler.time_to_next_planned(), None);

        scheduler.schedule_in(Duration::from_secs(5), ());
        scheduler.schedule_in(Duration::from_secs(2), ());

        assert_eq!(
            scheduler.time_to_next_planned(),
            Some(Duration::from_secs(2))
        );
    }
}
