// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Concurrency gate
//
// The gate is the only issuer of upload slots. A Slot is move-only and
// can only be handed back through `release`, so a task cannot hold two
// slots and the gate cannot hand out more than its limit.

use crate::task::TaskId;
use std::collections::HashSet;

/// Proof that a task holds one of the gate's slots
#[derive(Debug)]
#[must_use = "a reserved slot must be stored on the task and released on exit"]
pub struct Slot {
    id: TaskId,
}

impl Slot {
    pub fn task_id(&self) -> TaskId {
        self.id
    }
}

/// Tracks in-flight task ids and enforces the concurrency limit
#[derive(Debug)]
pub struct ConcurrencyGate {
    limit: usize,
    active: HashSet<TaskId>,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `limit` tasks (minimum 1)
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            active: HashSet::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn has_free_slot(&self) -> bool {
        self.active.len() < self.limit
    }

    /// Reserve a slot for `id`.
    ///
    /// Returns `None` when the gate is full or `id` already holds a slot.
    pub fn reserve(&mut self, id: TaskId) -> Option<Slot> {
        if !self.has_free_slot() || !self.active.insert(id) {
            return None;
        }
        Some(Slot { id })
    }

    /// Give a slot back to the gate
    pub fn release(&mut self, slot: Slot) {
        let removed = self.active.remove(&slot.id);
        debug_assert!(removed, "released a slot the gate did not issue");
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, id: TaskId) -> bool {
        self.active.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_respects_limit() {
        let mut gate = ConcurrencyGate::new(2);
        let a = gate.reserve(TaskId::new()).unwrap();
        let _b = gate.reserve(TaskId::new()).unwrap();
        assert!(!gate.has_free_slot());
        assert!(gate.reserve(TaskId::new()).is_none());

        gate.release(a);
        assert!(gate.has_free_slot());
        assert_eq!(gate.active_count(), 1);
    }

    #[test]
    fn test_same_id_cannot_reserve_twice() {
        let mut gate = ConcurrencyGate::new(3);
        let id = TaskId::new();
        let slot = gate.reserve(id).unwrap();
        assert!(gate.reserve(id).is_none());
        assert_eq!(gate.active_count(), 1);
        assert_eq!(slot.task_id(), id);

        gate.release(slot);
        assert!(!gate.is_active(id));
        assert!(gate.reserve(id).is_some());
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let gate = ConcurrencyGate::new(0);
        assert_eq!(gate.limit(), 1);
    }
}
