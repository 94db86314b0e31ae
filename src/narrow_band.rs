// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::geometry::Real;
use crate::mesh::NodeId;

/// One pending entry of the narrow band.
#[derive(Debug, Clone, Copy)]
pub struct BandEntry<T: Real> {
    /// Candidate time when the entry was pushed.
    pub time: T,
    /// The node the candidate belongs to.
    pub node: NodeId,
    /// True for a source node that was frozen during initialization and still
    /// has to be expanded.
    pub seed: bool,
}

impl<T: Real> PartialEq for BandEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Real> Eq for BandEntry<T> {}

impl<T: Real> PartialOrd for BandEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Real> Ord for BandEntry<T> {
    // Secondary key NodeId ensures deterministic tie-breaking.
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .partial_cmp(&other.time)
            .unwrap_or(Ordering::Equal)
            .then(self.node.cmp(&other.node))
            .then(other.seed.cmp(&self.seed))
    }
}

/// Min-priority queue of candidate arrival times.
///
/// Decrease-key is done by pushing a fresh entry; the superseded one stays in
/// the heap and is recognized as stale by the driver when it is popped.
#[derive(Debug, Default)]
pub struct NarrowBand<T: Real> {
    heap: BinaryHeap<Reverse<BandEntry<T>>>,
    pushes: usize,
}

impl<T: Real> NarrowBand<T> {
    /// Create an empty band.
    pub fn new() -> Self {
        NarrowBand {
            heap: BinaryHeap::new(),
            pushes: 0,
        }
    }

    /// Create an empty band with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        NarrowBand {
            heap: BinaryHeap::with_capacity(capacity),
            pushes: 0,
        }
    }

    /// Queue a provisional candidate for `node`.
    pub fn push(&mut self, node: NodeId, time: T) {
        self.pushes += 1;
        self.heap.push(Reverse(BandEntry {
            time,
            node,
            seed: false,
        }));
    }

    /// Queue an already-frozen source node for expansion.
    pub fn push_seed(&mut self, node: NodeId, time: T) {
        self.pushes += 1;
        self.heap.push(Reverse(BandEntry {
            time,
            node,
            seed: true,
        }));
    }

    /// Remove and return the entry with the smallest time.
    pub fn pop(&mut self) -> Option<BandEntry<T>> {
        self.heap.pop().map(|Reverse(e)| e)
    }

    /// Smallest time currently queued.
    pub fn peek_time(&self) -> Option<T> {
        self.heap.peek().map(|Reverse(e)| e.time)
    }

    /// Number of queued entries, stale ones included.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True if no entries are queued.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Total number of pushes since creation or the last `clear`.
    pub fn pushes(&self) -> usize {
        self.pushes
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.pushes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_in_ascending_time() {
        let mut band = NarrowBand::<f64>::new();
        band.push(0, 3.0);
        band.push(1, 1.0);
        band.push(2, 2.0);
        band.push_seed(3, 0.5);
        let order: Vec<NodeId> = std::iter::from_fn(|| band.pop().map(|e| e.node)).collect();
        assert_eq!(order, vec![3, 1, 2, 0]);
    }

    #[test]
    fn duplicate_entries_are_kept() {
        let mut band = NarrowBand::<f64>::new();
        band.push(4, 5.0);
        band.push(4, 2.0);
        assert_eq!(band.len(), 2);
        assert_eq!(band.peek_time(), Some(2.0));
        let first = band.pop().unwrap();
        assert_eq!((first.node, first.time), (4, 2.0));
        let stale = band.pop().unwrap();
        assert_eq!((stale.node, stale.time), (4, 5.0));
        assert!(band.is_empty());
        assert_eq!(band.pushes(), 2);
    }

    #[test]
    fn ties_break_on_node_id() {
        let mut band = NarrowBand::<f64>::new();
        band.push(9, 1.0);
        band.push(2, 1.0);
        band.push(5, 1.0);
        assert_eq!(band.pop().unwrap().node, 2);
        assert_eq!(band.pop().unwrap().node, 5);
        assert_eq!(band.pop().unwrap().node, 9);
    }

    #[test]
    fn seed_pops_before_plain_entry_at_same_time() {
        let mut band = NarrowBand::<f64>::new();
        band.push(1, 0.0);
        band.push_seed(1, 0.0);
        assert!(band.pop().unwrap().seed);
        assert!(!band.pop().unwrap().seed);
    }
}
