// SPDX-License-Identifier: AGPL-3.0
// Docdrop Core - Task registry
//
// Authoritative id -> record map. Records keep admission order and are
// only deleted through an explicit remove.

use crate::task::{TaskId, TaskRecord};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct TaskRegistry {
    records: HashMap<TaskId, TaskRecord>,
    order: Vec<TaskId>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: TaskRecord) {
        let id = record.id;
        if self.records.insert(id, record).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: TaskId) -> Option<&mut TaskRecord> {
        self.records.get_mut(&id)
    }

    pub fn remove(&mut self, id: TaskId) -> Option<TaskRecord> {
        let record = self.records.remove(&id)?;
        self.order.retain(|known| *known != id);
        Some(record)
    }

    /// Drop every record matching `predicate`, returning how many were dropped
    pub fn remove_where(&mut self, mut predicate: impl FnMut(&TaskRecord) -> bool) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !predicate(record));
        let records = &self.records;
        self.order.retain(|id| records.contains_key(id));
        before - self.records.len()
    }

    /// Ids in admission order
    pub fn ids(&self) -> Vec<TaskId> {
        self.order.clone()
    }

    /// Records in admission order
    pub fn iter(&self) -> impl Iterator<Item = &TaskRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }
}
