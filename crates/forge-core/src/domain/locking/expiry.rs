//! Deadline bookkeeping for lock expiry
//!
//! One deadline per holding task, kept in a min-heap. Cancelling a deadline
//! only bumps the task's generation; the stale heap entry is discarded when
//! it surfaces.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Deadline {
    at: Instant,
    generation: u64,
    task_id: String,
}

#[derive(Debug, Default)]
pub struct ExpiryQueue {
    heap: BinaryHeap<Reverse<Deadline>>,
    armed: HashMap<String, u64>,
    next_generation: u64,
}

impl ExpiryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the deadline for a task
    pub fn arm(&mut self, task_id: &str, at: Instant) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.armed.insert(task_id.to_string(), generation);
        self.heap.push(Reverse(Deadline {
            at,
            generation,
            task_id: task_id.to_string(),
        }));
    }

    /// Cancel a task's deadline. Returns whether one was armed.
    pub fn cancel(&mut self, task_id: &str) -> bool {
        self.armed.remove(task_id).is_some()
    }

    pub fn is_armed(&self, task_id: &str) -> bool {
        self.armed.contains_key(task_id)
    }

    /// Earliest live deadline
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.discard_stale();
        self.heap.peek().map(|Reverse(d)| d.at)
    }

    /// Pop every task whose deadline is at or before `now`
    pub fn pop_due(&mut self, now: Instant) -> Vec<String> {
        let mut due = Vec::new();
        loop {
            self.discard_stale();
            match self.heap.peek() {
                Some(Reverse(d)) if d.at <= now => {}
                _ => break,
            }
            if let Some(Reverse(deadline)) = self.heap.pop() {
                self.armed.remove(&deadline.task_id);
                due.push(deadline.task_id);
            }
        }
        due
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.armed.get(&top.task_id) == Some(&top.generation) {
                break;
            }
            self.heap.pop();
        }
    }
}
