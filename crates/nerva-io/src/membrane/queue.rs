// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::item::{ItemId, MembraneItem};
use std::collections::{HashSet, VecDeque};

/// Bounded FIFO for one priority tier. Full queues evict their oldest item.
#[derive(Debug)]
pub(crate) struct TierQueue {
    items: VecDeque<MembraneItem>,
    capacity: usize,
}

impl TierQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Appends `item`, returning the item evicted to make room, if any.
    pub(crate) fn push(&mut self, item: MembraneItem) -> Option<MembraneItem> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub(crate) fn contains(&self, id: &ItemId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }

    pub(crate) fn front(&self) -> Option<&MembraneItem> {
        self.items.front()
    }

    /// Removes the oldest item if it is still `id`.
    pub(crate) fn pop_front_if(&mut self, id: &ItemId) -> bool {
        if self.items.front().is_some_and(|item| &item.id == id) {
            self.items.pop_front();
            true
        } else {
            false
        }
    }

    /// Records a failed attempt on `id`, if it is still queued.
    pub(crate) fn mark_retry(&mut self, id: &ItemId) {
        if let Some(item) = self.items.iter_mut().find(|item| &item.id == id) {
            item.retry_count += 1;
        }
    }

    /// Removes every item whose id is in `ids`. Returns how many were removed.
    pub(crate) fn remove_ids(&mut self, ids: &HashSet<ItemId>) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !ids.contains(&item.id));
        before - self.items.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &MembraneItem> {
        self.items.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}
