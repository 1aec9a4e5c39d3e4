//! Deferred task scheduler
//!
//! Every "wait N ms, then do X" in the engine goes through here: typewriter
//! ticks, auto-advance, narrator line actions, the puzzle countdown, puzzle
//! aftermath delays and video chaining. Scheduling returns a [`TaskHandle`]
//! so whichever component leaves a state can revoke the timers it owns.
//!
//! Tasks are kept in a reversed binary heap keyed by `(due, slot)`, so tasks due
//! at the same instant come out in the order they were scheduled.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::puzzle::PuzzleOutcome;
use crate::script::LineAction;

/// Milliseconds on the session clock.
pub type Millis = u64;

#[cfg(test)]
const PLACEHOLDER_THRESHOLD: usize = 4;
#[cfg(not(test))]
const PLACEHOLDER_THRESHOLD: usize = 64;

/// Revocable reference to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(u64);

/// Work the session performs when a task comes due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Deferred {
    /// Reveal one more character of the current line.
    TypeNextChar,
    /// Advance dialogue automatically (auto mode).
    AutoAdvance,
    /// Run a narrator line's legacy action.
    LineAction(LineAction),
    /// One second of puzzle countdown.
    PuzzleCountdown,
    /// Resolve a finished puzzle into the next story beat.
    PuzzleAftermath(PuzzleOutcome),
    /// Move on to the next clip of a video chain.
    VideoChainAdvance,
    /// Close the player after the last clip of a chain.
    VideoSequenceEnd,
}

/// A task waiting in the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub due: Millis,
    pub handle: TaskHandle,
    pub task: Deferred,
    pub note: Option<String>,
}

/// The deferred task queue.
///
/// Cancelled and consumed tasks leave an empty slot behind so heap indices stay
/// valid; slots are compacted once enough of them pile up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<(Millis, usize)>>, /* (due, slot) */
    slots: Vec<Option<ScheduledTask>>,
    next_handle: u64,
}

impl Scheduler {
    /// Schedule a task `delay` milliseconds after `now`.
    pub fn schedule_in(&mut self, now: Millis, delay: Millis, task: Deferred, note: Option<&str>) -> TaskHandle {
        self.schedule_at(now.saturating_add(delay), task, note)
    }

    /// Schedule a task at an absolute clock time.
    pub fn schedule_at(&mut self, due: Millis, task: Deferred, note: Option<&str>) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        let slot = self.slots.len();
        // typewriter and countdown ticks are too frequent for the info log
        if matches!(task, Deferred::TypeNextChar | Deferred::PuzzleCountdown) {
            debug!("scheduling {task:?} at {due}ms");
        } else {
            info!(
                "scheduling {:?} at {due}ms: \"{}\"",
                task,
                note.unwrap_or("<no note provided>")
            );
        }
        self.heap.push(Reverse((due, slot)));
        self.slots.push(Some(ScheduledTask {
            due,
            handle,
            task,
            note: note.map(str::to_string),
        }));
        handle
    }

    /// Revoke a pending task. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let found = self
            .slots
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|t| t.handle == handle));
        match found {
            Some(slot) => {
                if let Some(task) = slot.take() {
                    debug!("cancelled {:?} due at {}ms", task.task, task.due);
                }
                true
            },
            None => false,
        }
    }

    /// Cancel an optional handle in place, leaving `None` behind.
    pub fn cancel_opt(&mut self, handle: &mut Option<TaskHandle>) {
        if let Some(h) = handle.take() {
            self.cancel(h);
        }
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.slots.iter().flatten().any(|t| t.handle == handle)
    }

    /// Number of live (not cancelled, not fired) tasks.
    pub fn pending(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Due time of the earliest live task.
    pub fn next_due(&mut self) -> Option<Millis> {
        self.discard_dead_heads();
        self.heap.peek().map(|Reverse((due, _))| *due)
    }

    /// Pop the next due task, if any.
    ///
    /// Returns `None` when the earliest live task is still in the future.
    pub fn pop_due(&mut self, now: Millis) -> Option<ScheduledTask> {
        self.discard_dead_heads();
        if let Some(Reverse((due, slot))) = self.heap.peek().copied()
            && now >= due
        {
            self.heap.pop();
            let task = self.slots[slot].take();
            self.compact_if_needed();
            return task;
        }
        None
    }

    /// Drop every pending task.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.slots.clear();
    }

    /// Pop heap entries whose slot was cancelled.
    fn discard_dead_heads(&mut self) {
        while let Some(Reverse((_, slot))) = self.heap.peek().copied() {
            if self.slots[slot].is_some() {
                break;
            }
            self.heap.pop();
        }
    }

    /// Rebuild the slot storage when too many empty slots accumulate.
    fn compact_if_needed(&mut self) {
        let empty = self.slots.iter().filter(|s| s.is_none()).count();
        if empty <= PLACEHOLDER_THRESHOLD {
            return;
        }
        let old_slots = std::mem::take(&mut self.slots);
        let mut index_map = vec![None; old_slots.len()];
        for (old_idx, slot) in old_slots.into_iter().enumerate() {
            if let Some(task) = slot {
                index_map[old_idx] = Some(self.slots.len());
                self.slots.push(Some(task));
            }
        }
        let mut new_heap = BinaryHeap::with_capacity(self.slots.len());
        while let Some(Reverse((due, old_idx))) = self.heap.pop() {
            if let Some(new_idx) = index_map[old_idx] {
                new_heap.push(Reverse((due, new_idx)));
            }
        }
        self.heap = new_heap;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_new_is_empty() {
        let mut scheduler = Scheduler::default();
        assert_eq!(scheduler.pending(), 0);
        assert!(scheduler.next_due().is_none());
    }

    #[test]
    fn pop_due_returns_none_when_nothing_due() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_in(100, 50, Deferred::AutoAdvance, None);
        assert!(scheduler.pop_due(149).is_none());
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn pop_due_returns_task_when_due_or_overdue() {
        let mut scheduler = Scheduler::default();
        let handle = scheduler.schedule_in(100, 50, Deferred::AutoAdvance, Some("auto"));
        let task = scheduler.pop_due(500).expect("task should be due");
        assert_eq!(task.due, 150);
        assert_eq!(task.handle, handle);
        assert_eq!(task.note.as_deref(), Some("auto"));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn tasks_fire_in_due_order_then_fifo() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_at(30, Deferred::VideoSequenceEnd, Some("third"));
        scheduler.schedule_at(10, Deferred::AutoAdvance, Some("first"));
        scheduler.schedule_at(20, Deferred::PuzzleCountdown, Some("second-a"));
        scheduler.schedule_at(20, Deferred::VideoChainAdvance, Some("second-b"));

        let order: Vec<_> = std::iter::from_fn(|| scheduler.pop_due(100))
            .map(|t| t.note.unwrap())
            .collect();
        assert_eq!(order, ["first", "second-a", "second-b", "third"]);
    }

    #[test]
    fn cancelled_task_never_fires() {
        let mut scheduler = Scheduler::default();
        let doomed = scheduler.schedule_at(10, Deferred::AutoAdvance, None);
        scheduler.schedule_at(20, Deferred::PuzzleCountdown, None);

        assert!(scheduler.cancel(doomed));
        assert!(!scheduler.cancel(doomed));
        assert!(!scheduler.is_pending(doomed));
        assert_eq!(scheduler.next_due(), Some(20));

        let task = scheduler.pop_due(100).unwrap();
        assert_eq!(task.task, Deferred::PuzzleCountdown);
        assert!(scheduler.pop_due(100).is_none());
    }

    #[test]
    fn cancel_after_fire_reports_false() {
        let mut scheduler = Scheduler::default();
        let handle = scheduler.schedule_at(0, Deferred::TypeNextChar, None);
        scheduler.pop_due(0).unwrap();
        assert!(!scheduler.cancel(handle));
    }

    #[test]
    fn cancel_opt_clears_the_handle() {
        let mut scheduler = Scheduler::default();
        let mut handle = Some(scheduler.schedule_at(5, Deferred::AutoAdvance, None));
        scheduler.cancel_opt(&mut handle);
        assert!(handle.is_none());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn compaction_keeps_remaining_tasks_reachable() {
        let mut scheduler = Scheduler::default();
        let handles: Vec<_> = (1..=8)
            .map(|i| scheduler.schedule_at(i, Deferred::PuzzleCountdown, None))
            .collect();
        for handle in &handles[..3] {
            scheduler.cancel(*handle);
        }
        for now in 4..=6 {
            assert_eq!(scheduler.pop_due(now).unwrap().due, now);
        }
        assert!(scheduler.slots.len() < 8);
        assert!(scheduler.is_pending(handles[6]));
        assert!(scheduler.cancel(handles[6]));
        assert_eq!(scheduler.pop_due(100).unwrap().due, 8);
        assert!(scheduler.pop_due(100).is_none());
    }

    #[test]
    fn clear_drops_everything() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_at(1, Deferred::AutoAdvance, None);
        scheduler.schedule_at(2, Deferred::AutoAdvance, None);
        scheduler.clear();
        assert!(scheduler.pop_due(10).is_none());
    }
}
