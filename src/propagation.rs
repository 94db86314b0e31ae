// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::geometry::Real;
use crate::mesh::Mesh;
use crate::narrow_band::NarrowBand;
use crate::node_state::SlotState;
use crate::update_kernels::update_in_cell;

/// Counters from one propagation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropagationStats {
    /// Nodes finalized and expanded, seeds included.
    pub frozen: usize,
    /// Popped entries that were superseded or already frozen.
    pub stale: usize,
    /// Candidate entries pushed during propagation.
    pub pushes: usize,
    /// Mesh nodes still at infinite time when the band ran dry.
    pub unreached: usize,
}

/// Drain the narrow band, freezing nodes in ascending time order.
///
/// Each extracted node is frozen, then every unfrozen corner of each of its
/// owner cells is re-evaluated from that cell's frozen corners; strictly
/// better candidates are pushed back. Stale entries are discarded on pop.
pub fn propagate<T: Real, M: Mesh<T> + ?Sized>(
    mesh: &M,
    state: &mut SlotState<T>,
    band: &mut NarrowBand<T>,
) -> PropagationStats {
    let mut stats = PropagationStats::default();
    let initial_pushes = band.pushes();

    while let Some(entry) = band.pop() {
        let node = entry.node;
        if entry.time > state.time(node) {
            stats.stale += 1;
            continue;
        }
        if !entry.seed {
            if state.is_frozen(node) {
                stats.stale += 1;
                continue;
            }
            state.freeze(node);
        }
        state.log_freeze(node);
        stats.frozen += 1;

        for &cell in mesh.owner_cells(node) {
            for neighbor in mesh.nodes_of(cell) {
                if neighbor == node || state.is_frozen(neighbor) {
                    continue;
                }
                let candidate = update_in_cell(mesh, state, neighbor, cell);
                if state.lower(neighbor, candidate) {
                    band.push(neighbor, candidate);
                }
            }
        }
    }

    stats.pushes = band.pushes() - initial_pushes;
    stats.unreached = (0..mesh.num_nodes())
        .filter(|&n| !mesh.owner_cells(n).is_empty() && !state.time(n).is_finite())
        .count();

    if stats.unreached > 0 {
        tracing::warn!(
            slot = state.slot(),
            unreached = stats.unreached,
            "propagation finished with unreached nodes"
        );
    }
    tracing::debug!(
        slot = state.slot(),
        frozen = stats.frozen,
        stale = stats.stale,
        pushes = stats.pushes,
        "propagation finished"
    );

    stats
}
