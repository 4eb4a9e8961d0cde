// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Dispatch queue
//
// FIFO backlog of pending task ids. An id is queued at most once.

use crate::task::TaskId;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct DispatchQueue {
    order: VecDeque<TaskId>,
    members: HashSet<TaskId>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` unless it is already queued. Returns true if appended.
    pub fn enqueue_if_absent(&mut self, id: TaskId) -> bool {
        if !self.members.insert(id) {
            return false;
        }
        self.order.push_back(id);
        true
    }

    /// Pop the oldest queued id
    pub fn dequeue_next(&mut self) -> Option<TaskId> {
        let id = self.order.pop_front()?;
        self.members.remove(&id);
        Some(id)
    }

    /// Drop `id` from the queue. Returns true if it was queued.
    pub fn remove(&mut self, id: TaskId) -> bool {
        if !self.members.remove(&id) {
            return false;
        }
        self.order.retain(|queued| *queued != id);
        true
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Queued ids, oldest first
    pub fn ids(&self) -> Vec<TaskId> {
        self.order.iter().copied().collect()
    }
}
