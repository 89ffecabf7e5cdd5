use crate::entities::entity::CounterKind;
use crate::entities::kinds::EntityKind;
use crate::world::map::MapKey;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// Work a timer performs when it fires. Tasks carry ids and keys, never
/// direct references; the world re-resolves the target at fire time so a
/// timer outliving its target is a no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerTask {
    /// Periodic re-assertion of a forced hour (eternal day/night).
    AssertHour { hour: f64, interval_ms: u64 },
    /// Put a collected pickup back where it was.
    RespawnCollectible {
        map: MapKey,
        kind: EntityKind,
        x: f32,
        y: f32,
        counter: CounterKind,
        respawn_ms: u64,
    },
}

#[derive(Debug, Clone)]
struct TimerEntry {
    id: TimerId,
    due_ms: u64,
    task: TimerTask,
}

/// Min-heap by due time; ties broken by id for a stable firing order.
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_ms
            .cmp(&self.due_ms)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.due_ms == other.due_ms
    }
}

impl Eq for TimerEntry {}

/// Cancellable one-shot timers over simulated elapsed milliseconds.
/// Cancellation removes the id from the index; the matching heap entry
/// becomes stale and is skipped when it surfaces.
#[derive(Debug, Default)]
pub struct TimerSystem {
    heap: BinaryHeap<TimerEntry>,
    index: HashMap<TimerId, u64>,
    next_id: u64,
}

impl TimerSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, task: TimerTask, delay_ms: u64, now_ms: u64) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let due_ms = now_ms.saturating_add(delay_ms);
        self.index.insert(id, due_ms);
        self.heap.push(TimerEntry { id, due_ms, task });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.index.remove(&id).is_some()
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.index.contains_key(&id)
    }

    /// Pop the next fired timer at or before `now_ms`, skipping stale
    /// (cancelled) entries.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(TimerId, TimerTask)> {
        loop {
            let entry = self.heap.peek()?;
            match self.index.get(&entry.id) {
                Some(due) if *due == entry.due_ms => {
                    if entry.due_ms > now_ms {
                        return None;
                    }
                    let entry = self.heap.pop()?;
                    self.index.remove(&entry.id);
                    return Some((entry.id, entry.task));
                }
                _ => {
                    self.heap.pop();
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_task(hour: f64) -> TimerTask {
        TimerTask::AssertHour {
            hour,
            interval_ms: 2500,
        }
    }

    #[test]
    fn timers_fire_in_due_order() {
        let mut timers = TimerSystem::new();
        let late = timers.schedule(assert_task(1.0), 100, 0);
        let early = timers.schedule(assert_task(2.0), 50, 0);

        assert_eq!(timers.pop_due(49), None);
        assert_eq!(timers.pop_due(100).map(|(id, _)| id), Some(early));
        assert_eq!(timers.pop_due(100).map(|(id, _)| id), Some(late));
        assert!(timers.is_empty());
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut timers = TimerSystem::new();
        let id = timers.schedule(assert_task(0.0), 10, 0);
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert_eq!(timers.pop_due(1000), None);
        assert!(timers.is_empty());
    }

    #[test]
    fn cancel_leaves_other_timers_alone() {
        let mut timers = TimerSystem::new();
        let a = timers.schedule(assert_task(1.0), 10, 0);
        let b = timers.schedule(assert_task(2.0), 10, 0);
        timers.cancel(a);
        assert!(timers.is_active(b));
        assert_eq!(timers.pop_due(10).map(|(id, _)| id), Some(b));
    }

    #[test]
    fn ids_are_never_reused() {
        let mut timers = TimerSystem::new();
        let a = timers.schedule(assert_task(1.0), 1, 0);
        timers.pop_due(1);
        let b = timers.schedule(assert_task(1.0), 1, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn simultaneous_timers_all_fire() {
        let mut timers = TimerSystem::new();
        for _ in 0..3 {
            timers.schedule(assert_task(0.0), 5, 0);
        }
        let mut fired = 0;
        while timers.pop_due(5).is_some() {
            fired += 1;
        }
        assert_eq!(fired, 3);
    }
}
