// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Max-priority queue keyed by `f64` priorities.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A binary-heap backed max-priority queue.
///
/// Priorities are compared with IEEE total ordering, so the queue stays
/// consistent even if a NaN slips in. Ties pop in no particular order.
pub struct PriorityQueue<T> {
    heap: BinaryHeap<HeapEntry<T>>,
}

struct HeapEntry<T> {
    priority: f64,
    item: T,
}

impl<T> Ord for HeapEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.total_cmp(&other.priority)
    }
}

impl<T> PartialOrd for HeapEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> PartialEq for HeapEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority.total_cmp(&other.priority) == Ordering::Equal
    }
}

impl<T> Eq for HeapEntry<T> {}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, item: T, priority: f64) {
        self.heap.push(HeapEntry { priority, item });
    }

    /// Highest-priority entry without removing it.
    pub fn peek(&self) -> Option<(&T, f64)> {
        self.heap.peek().map(|entry| (&entry.item, entry.priority))
    }

    /// Priority of the current maximum.
    pub fn peek_priority(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.priority)
    }

    pub fn pop(&mut self) -> Option<(T, f64)> {
        self.heap.pop().map(|entry| (entry.item, entry.priority))
    }

    /// Remove every entry, in heap array order (not sorted).
    pub fn drain(&mut self) -> Vec<(T, f64)> {
        self.heap
            .drain()
            .map(|entry| (entry.item, entry.priority))
            .collect()
    }

    /// Move all entries of `other` into this queue, leaving `other` empty.
    pub fn append(&mut self, other: &mut Self) {
        self.heap.append(&mut other.heap);
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<T> Extend<(T, f64)> for PriorityQueue<T> {
    fn extend<I: IntoIterator<Item = (T, f64)>>(&mut self, iter: I) {
        self.heap.extend(
            iter.into_iter()
                .map(|(item, priority)| HeapEntry { priority, item }),
        );
    }
}

impl<T> FromIterator<(T, f64)> for PriorityQueue<T> {
    fn from_iter<I: IntoIterator<Item = (T, f64)>>(iter: I) -> Self {
        let mut queue = Self::new();
        queue.extend(iter);
        queue
    }
}
