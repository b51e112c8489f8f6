//! Per-resource queues of blocked tasks
//!
//! Entries are kept in arrival order. Draining hands back every waiter at
//! once; which of them gets the resource next is decided by whoever
//! re-acquires first, not by queue position.

use std::collections::{HashMap, VecDeque};

use super::types::ResourceId;

#[derive(Debug, Default)]
pub struct WaitQueue {
    queues: HashMap<ResourceId, VecDeque<String>>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a task behind a resource. A task already queued keeps its place.
    pub fn enqueue(&mut self, resource: &ResourceId, task_id: &str) {
        let queue = self.queues.entry(resource.clone()).or_default();
        if !queue.iter().any(|t| t == task_id) {
            queue.push_back(task_id.to_string());
        }
    }

    /// Remove and return every task waiting on a resource, in arrival order
    pub fn drain(&mut self, resource: &ResourceId) -> Vec<String> {
        self.queues
            .remove(resource)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Forget a task everywhere (it acquired its locks or gave up)
    pub fn remove_task(&mut self, task_id: &str) {
        self.queues.retain(|_, queue| {
            queue.retain(|t| t != task_id);
            !queue.is_empty()
        });
    }

    pub fn waiters(&self, resource: &ResourceId) -> Vec<String> {
        self.queues
            .get(resource)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
