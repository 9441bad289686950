//! Queue of released registry ids.

use super::EntityId;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Min-heap of ids released by `remove`, serialized as an ascending list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<EntityId>", into = "Vec<EntityId>")]
pub struct FreeIds {
    heap: BinaryHeap<Reverse<EntityId>>,
}

impl FreeIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `id` for reuse. Duplicates are ignored.
    pub fn release(&mut self, id: EntityId) {
        if !self.contains(id) {
            self.heap.push(Reverse(id));
        }
    }

    /// Takes the smallest released id.
    pub fn take_smallest(&mut self) -> Option<EntityId> {
        self.heap.pop().map(|Reverse(id)| id)
    }

    pub fn peek_smallest(&self) -> Option<EntityId> {
        self.heap.peek().map(|Reverse(id)| *id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.heap.iter().any(|Reverse(queued)| *queued == id)
    }

    /// Drops every queued id for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(EntityId) -> bool) {
        self.heap.retain(|Reverse(id)| keep(*id));
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Queued ids in ascending order.
    pub fn to_vec(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.heap.iter().map(|Reverse(id)| *id).collect();
        ids.sort_unstable();
        ids
    }
}

impl PartialEq for FreeIds {
    fn eq(&self, other: &Self) -> bool {
        self.to_vec() == other.to_vec()
    }
}

impl From<Vec<EntityId>> for FreeIds {
    fn from(ids: Vec<EntityId>) -> Self {
        let mut queue = FreeIds::new();
        for id in ids {
            queue.release(id);
        }
        queue
    }
}

impl From<FreeIds> for Vec<EntityId> {
    fn from(queue: FreeIds) -> Self {
        queue.to_vec()
    }
}
