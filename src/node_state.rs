// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::geometry::Real;
use crate::mesh::NodeId;

/// Propagation state of one node within a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Not reached yet; travel time is infinite.
    Far,
    /// Holds a provisional candidate that may still decrease.
    Narrow,
    /// Final; never revisited in this propagation.
    Frozen,
}

/// Per-call travel-time state for every node of a mesh.
///
/// One `SlotState` backs one propagation at a time. Concurrent raytrace calls
/// on a shared mesh each use their own slot, so no mutable state is aliased.
#[derive(Debug, Clone)]
pub struct SlotState<T: Real> {
    slot: usize,
    times: Vec<T>,
    states: Vec<NodeState>,
    freeze_log: Vec<(NodeId, T)>,
}

impl<T: Real> SlotState<T> {
    /// Allocate a slot for a mesh with `num_nodes` nodes, all Far.
    pub fn new(num_nodes: usize, slot: usize) -> Self {
        SlotState {
            slot,
            times: vec![T::infinity(); num_nodes],
            states: vec![NodeState::Far; num_nodes],
            freeze_log: Vec::new(),
        }
    }

    /// The slot identifier this state was created with.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Number of nodes this state covers.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// True if the state covers no nodes.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Reset every node to Far with infinite travel time.
    ///
    /// The backing storage is resized if the mesh size changed.
    pub fn reinit(&mut self, num_nodes: usize) {
        self.times.clear();
        self.times.resize(num_nodes, T::infinity());
        self.states.clear();
        self.states.resize(num_nodes, NodeState::Far);
        self.freeze_log.clear();
    }

    /// Current travel time of a node.
    #[inline]
    pub fn time(&self, node: NodeId) -> T {
        self.times[node]
    }

    /// Current state of a node.
    #[inline]
    pub fn state(&self, node: NodeId) -> NodeState {
        self.states[node]
    }

    /// True if the node is Frozen.
    #[inline]
    pub fn is_frozen(&self, node: NodeId) -> bool {
        self.states[node] == NodeState::Frozen
    }

    /// Lower the travel time of an unfrozen node and mark it Narrow.
    ///
    /// Returns true if `time` was strictly smaller than the current value.
    /// Frozen nodes are never modified.
    pub fn lower(&mut self, node: NodeId, time: T) -> bool {
        if self.states[node] == NodeState::Frozen || time.is_nan() || time >= self.times[node] {
            return false;
        }
        self.times[node] = time;
        self.states[node] = NodeState::Narrow;
        true
    }

    /// Set a node's time and freeze it immediately (used for source seeds).
    ///
    /// Returns false, leaving the node untouched, if it already holds a time no
    /// greater than `time`.
    pub fn freeze_at(&mut self, node: NodeId, time: T) -> bool {
        if time.is_nan() || time >= self.times[node] {
            return false;
        }
        self.times[node] = time;
        self.states[node] = NodeState::Frozen;
        true
    }

    /// Freeze a node at its current time.
    pub fn freeze(&mut self, node: NodeId) {
        self.states[node] = NodeState::Frozen;
    }

    /// Record that a node was finalized and expanded by the driver.
    pub(crate) fn log_freeze(&mut self, node: NodeId) {
        self.freeze_log.push((node, self.times[node]));
    }

    /// Travel times of every node, indexed by node id.
    pub fn times(&self) -> &[T] {
        &self.times
    }

    /// Nodes in the order they were finalized, with their final times.
    pub fn freeze_log(&self) -> &[(NodeId, T)] {
        &self.freeze_log
    }

    /// Number of Frozen nodes.
    pub fn frozen_count(&self) -> usize {
        self.states
            .iter()
            .filter(|&&s| s == NodeState::Frozen)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_far_and_infinite() {
        let state = SlotState::<f64>::new(3, 7);
        assert_eq!(state.slot(), 7);
        assert_eq!(state.len(), 3);
        for n in 0..3 {
            assert_eq!(state.state(n), NodeState::Far);
            assert!(state.time(n).is_infinite());
        }
    }

    #[test]
    fn lower_monotonicity() {
        let mut state = SlotState::<f64>::new(4, 0);

        assert!(state.lower(1, 10.0));
        assert_eq!(state.time(1), 10.0);
        assert_eq!(state.state(1), NodeState::Narrow);

        assert!(state.lower(1, 5.0));
        assert_eq!(state.time(1), 5.0);

        // Larger or equal candidates are rejected
        assert!(!state.lower(1, 7.0));
        assert!(!state.lower(1, 5.0));
        assert_eq!(state.time(1), 5.0);

        // NaN never replaces a value
        assert!(!state.lower(1, f64::NAN));
        assert_eq!(state.time(1), 5.0);
    }

    #[test]
    fn frozen_is_immutable() {
        let mut state = SlotState::<f64>::new(2, 0);
        state.lower(0, 3.0);
        state.freeze(0);
        assert!(!state.lower(0, 1.0));
        assert_eq!(state.time(0), 3.0);
        assert!(state.is_frozen(0));
    }

    #[test]
    fn freeze_at_keeps_smaller_seed() {
        let mut state = SlotState::<f64>::new(2, 0);
        assert!(state.freeze_at(0, 2.0));
        assert!(!state.freeze_at(0, 3.0));
        assert_eq!(state.time(0), 2.0);
        assert!(state.freeze_at(0, 1.0));
        assert_eq!(state.time(0), 1.0);
    }

    #[test]
    fn reinit_resets_everything() {
        let mut state = SlotState::<f64>::new(2, 0);
        state.freeze_at(0, 0.0);
        state.log_freeze(0);
        state.lower(1, 1.0);
        state.reinit(5);
        assert_eq!(state.len(), 5);
        assert_eq!(state.frozen_count(), 0);
        assert!(state.freeze_log().is_empty());
        assert!(state.times().iter().all(|t| t.is_infinite()));
    }
}
