// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_queue::SegQueue;

use crate::geometry::Real;
use crate::node_state::SlotState;

/// Lock-free free list of slot states shared by concurrent raytrace calls.
///
/// A checked-out slot is owned by exactly one caller until it is checked back
/// in, so two propagations never touch the same travel-time arrays.
pub struct SlotPool<T: Real> {
    free: SegQueue<SlotState<T>>,
    next_slot: AtomicUsize,
}

impl<T: Real> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Real> SlotPool<T> {
    /// An empty pool.
    pub fn new() -> Self {
        SlotPool {
            free: SegQueue::new(),
            next_slot: AtomicUsize::new(0),
        }
    }

    /// Take an idle slot, or allocate a new one, reset for `num_nodes` nodes.
    pub fn checkout(&self, num_nodes: usize) -> SlotState<T> {
        match self.free.pop() {
            Some(mut state) => {
                state.reinit(num_nodes);
                state
            }
            None => {
                let slot = self.next_slot.fetch_add(1, Ordering::AcqRel);
                tracing::trace!(slot, "allocated slot");
                SlotState::new(num_nodes, slot)
            }
        }
    }

    /// Return a slot for reuse.
    pub fn checkin(&self, state: SlotState<T>) {
        self.free.push(state);
    }

    /// Slots currently waiting in the pool.
    pub fn idle(&self) -> usize {
        self.free.len()
    }

    /// Slots allocated over the pool's lifetime.
    pub fn allocated(&self) -> usize {
        self.next_slot.load(Ordering::Acquire)
    }
}
