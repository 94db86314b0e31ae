// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::sync::Arc;

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use rustc_hash::FxHashMap;

use crate::error::{RaytraceError, Result};
use crate::geometry::{self, Point3, Real};

/// Index of a node in the mesh arena.
pub type NodeId = usize;

/// Index of a tetrahedral cell in the mesh arena.
pub type CellId = usize;

/// Read-only access to an unstructured tetrahedral mesh.
///
/// This is everything the solver needs from a mesh backend: geometry,
/// connectivity, per-cell slowness and point location.
pub trait Mesh<T: Real> {
    /// Total number of nodes.
    fn num_nodes(&self) -> usize;

    /// Total number of cells.
    fn num_cells(&self) -> usize;

    /// Position of a node.
    fn node(&self, node: NodeId) -> Point3<T>;

    /// The four corner nodes of a cell.
    fn nodes_of(&self, cell: CellId) -> [NodeId; 4];

    /// Cells sharing a face with `cell`.
    fn neighbor_cells(&self, cell: CellId) -> &[CellId];

    /// Cells incident to `node`.
    fn owner_cells(&self, node: NodeId) -> &[CellId];

    /// Slowness (inverse velocity) of a cell.
    fn slowness(&self, cell: CellId) -> T;

    /// The cell containing `point`, or `None` if it lies outside the mesh.
    fn cell_containing(&self, point: Point3<T>) -> Option<CellId>;

    /// Euclidean distance from a node to a point.
    fn distance(&self, node: NodeId, point: Point3<T>) -> T {
        geometry::distance(self.node(node), point)
    }

    /// Corner positions of a cell, in the order of [`Mesh::nodes_of`].
    fn corners(&self, cell: CellId) -> [Point3<T>; 4] {
        let n = self.nodes_of(cell);
        [self.node(n[0]), self.node(n[1]), self.node(n[2]), self.node(n[3])]
    }

    /// Mean edge length of a cell.
    fn cell_size(&self, cell: CellId) -> T {
        let c = self.corners(cell);
        let mut sum = T::lit(0.0);
        for i in 0..4 {
            for j in (i + 1)..4 {
                sum = sum + geometry::distance(c[i], c[j]);
            }
        }
        sum / T::lit(6.0)
    }
}

impl<T: Real, M: Mesh<T> + ?Sized> Mesh<T> for &M {
    fn num_nodes(&self) -> usize {
        (**self).num_nodes()
    }
    fn num_cells(&self) -> usize {
        (**self).num_cells()
    }
    fn node(&self, node: NodeId) -> Point3<T> {
        (**self).node(node)
    }
    fn nodes_of(&self, cell: CellId) -> [NodeId; 4] {
        (**self).nodes_of(cell)
    }
    fn neighbor_cells(&self, cell: CellId) -> &[CellId] {
        (**self).neighbor_cells(cell)
    }
    fn owner_cells(&self, node: NodeId) -> &[CellId] {
        (**self).owner_cells(node)
    }
    fn slowness(&self, cell: CellId) -> T {
        (**self).slowness(cell)
    }
    fn cell_containing(&self, point: Point3<T>) -> Option<CellId> {
        (**self).cell_containing(point)
    }
}

impl<T: Real, M: Mesh<T> + ?Sized> Mesh<T> for Arc<M> {
    fn num_nodes(&self) -> usize {
        (**self).num_nodes()
    }
    fn num_cells(&self) -> usize {
        (**self).num_cells()
    }
    fn node(&self, node: NodeId) -> Point3<T> {
        (**self).node(node)
    }
    fn nodes_of(&self, cell: CellId) -> [NodeId; 4] {
        (**self).nodes_of(cell)
    }
    fn neighbor_cells(&self, cell: CellId) -> &[CellId] {
        (**self).neighbor_cells(cell)
    }
    fn owner_cells(&self, node: NodeId) -> &[CellId] {
        (**self).owner_cells(node)
    }
    fn slowness(&self, cell: CellId) -> T {
        (**self).slowness(cell)
    }
    fn cell_containing(&self, point: Point3<T>) -> Option<CellId> {
        (**self).cell_containing(point)
    }
}

// Bounding box of one cell, stored in the point-location index.
struct CellEntry {
    lower: [f64; 3],
    upper: [f64; 3],
    cell: CellId,
}

impl RTreeObject for CellEntry {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.lower, self.upper)
    }
}

impl PointDistance for CellEntry {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let mut d2 = 0.0;
        for d in 0..3 {
            let gap = if point[d] < self.lower[d] {
                self.lower[d] - point[d]
            } else if point[d] > self.upper[d] {
                point[d] - self.upper[d]
            } else {
                0.0
            };
            d2 += gap * gap;
        }
        d2
    }
}

/// An arena-backed tetrahedral mesh.
///
/// Nodes and cells are addressed by stable integer indices; owner lists and
/// face adjacency are derived once at construction. Face `i` of a cell is the
/// face opposite its corner `i`.
pub struct TetMesh<T: Real> {
    nodes: Vec<Point3<T>>,
    cells: Vec<[NodeId; 4]>,
    slowness: Vec<T>,
    owners: Vec<Vec<CellId>>,
    neighbors: Vec<Vec<CellId>>,
    index: RTree<CellEntry>,
    tolerance: T,
}

impl<T: Real> TetMesh<T> {
    /// Build a mesh from node positions, cell connectivity and per-cell slowness.
    ///
    /// # Errors
    /// Returns an error if the mesh is empty, a coordinate is not finite, a cell
    /// references a missing or repeated node, a cell is degenerate, or a
    /// slowness value is not positive and finite.
    pub fn new(nodes: Vec<Point3<T>>, cells: Vec<[NodeId; 4]>, slowness: Vec<T>) -> Result<Self> {
        if nodes.is_empty() || cells.is_empty() {
            return Err(RaytraceError::EmptyMesh {
                nodes: nodes.len(),
                cells: cells.len(),
            });
        }

        for (node, p) in nodes.iter().enumerate() {
            if p.iter().any(|c| !c.is_finite()) {
                return Err(RaytraceError::InvalidCoordinate {
                    node,
                    coord: geometry::to_f64(*p),
                });
            }
        }

        let num_nodes = nodes.len();
        for (cell, c) in cells.iter().enumerate() {
            for (i, &node) in c.iter().enumerate() {
                if node >= num_nodes || c[..i].contains(&node) {
                    return Err(RaytraceError::InvalidNodeIndex {
                        cell,
                        node,
                        num_nodes,
                    });
                }
            }
            let corners = [nodes[c[0]], nodes[c[1]], nodes[c[2]], nodes[c[3]]];
            let volume = geometry::signed_volume(&corners);
            let mut longest = T::lit(0.0);
            for i in 0..4 {
                for j in (i + 1)..4 {
                    longest = longest.max(geometry::distance(corners[i], corners[j]));
                }
            }
            if volume.abs() <= T::epsilon() * longest * longest * longest {
                return Err(RaytraceError::DegenerateCell {
                    cell,
                    volume: volume.as_f64(),
                });
            }
        }

        validate_slowness(&slowness, cells.len())?;

        let mut owners = vec![Vec::new(); num_nodes];
        for (cell, c) in cells.iter().enumerate() {
            for &node in c {
                owners[node].push(cell);
            }
        }

        let neighbors = build_face_adjacency(&cells)
            .iter()
            .map(|faces| faces.iter().flatten().copied().collect())
            .collect();

        let entries = cells
            .iter()
            .enumerate()
            .map(|(cell, c)| {
                let mut lower = [f64::INFINITY; 3];
                let mut upper = [f64::NEG_INFINITY; 3];
                for &node in c {
                    let p = geometry::to_f64(nodes[node]);
                    for d in 0..3 {
                        lower[d] = lower[d].min(p[d]);
                        upper[d] = upper[d].max(p[d]);
                    }
                }
                // Pad so points on a shared face hit every incident cell.
                for d in 0..3 {
                    let pad = 1e-9 * (upper[d] - lower[d]).max(1.0);
                    lower[d] -= pad;
                    upper[d] += pad;
                }
                CellEntry { lower, upper, cell }
            })
            .collect();
        let index = RTree::bulk_load(entries);

        tracing::debug!(
            nodes = num_nodes,
            cells = cells.len(),
            "built tetrahedral mesh"
        );

        Ok(TetMesh {
            nodes,
            cells,
            slowness,
            owners,
            neighbors,
            index,
            tolerance: T::epsilon().sqrt(),
        })
    }

    /// Replace the per-cell slowness field, keeping the topology.
    ///
    /// # Errors
    /// Returns an error if the length does not match the cell count or a value
    /// is not positive and finite.
    pub fn set_slowness(&mut self, slowness: Vec<T>) -> Result<()> {
        validate_slowness(&slowness, self.cells.len())?;
        self.slowness = slowness;
        Ok(())
    }

    /// All node positions.
    pub fn nodes(&self) -> &[Point3<T>] {
        &self.nodes
    }

    /// All cells.
    pub fn cells(&self) -> &[[NodeId; 4]] {
        &self.cells
    }
}

fn validate_slowness<T: Real>(slowness: &[T], num_cells: usize) -> Result<()> {
    if slowness.len() != num_cells {
        return Err(RaytraceError::LengthMismatch {
            what: "slowness",
            expected: num_cells,
            got: slowness.len(),
        });
    }
    for (cell, &value) in slowness.iter().enumerate() {
        if !value.is_finite() || value <= T::lit(0.0) {
            return Err(RaytraceError::InvalidSlowness {
                cell,
                value: value.as_f64(),
            });
        }
    }
    Ok(())
}

fn build_face_adjacency(cells: &[[NodeId; 4]]) -> Vec<[Option<CellId>; 4]> {
    let mut adjacency = vec![[None; 4]; cells.len()];
    let mut open: FxHashMap<[NodeId; 3], (CellId, usize)> = FxHashMap::default();
    for (cell, c) in cells.iter().enumerate() {
        for face in 0..4 {
            let mut key = [0usize; 3];
            let mut k = 0;
            for (i, &node) in c.iter().enumerate() {
                if i != face {
                    key[k] = node;
                    k += 1;
                }
            }
            key.sort_unstable();
            match open.remove(&key) {
                Some((other, other_face)) => {
                    adjacency[cell][face] = Some(other);
                    adjacency[other][other_face] = Some(cell);
                }
                None => {
                    open.insert(key, (cell, face));
                }
            }
        }
    }
    adjacency
}

impl<T: Real> Mesh<T> for TetMesh<T> {
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn num_cells(&self) -> usize {
        self.cells.len()
    }

    fn node(&self, node: NodeId) -> Point3<T> {
        self.nodes[node]
    }

    fn nodes_of(&self, cell: CellId) -> [NodeId; 4] {
        self.cells[cell]
    }

    fn neighbor_cells(&self, cell: CellId) -> &[CellId] {
        &self.neighbors[cell]
    }

    fn owner_cells(&self, node: NodeId) -> &[CellId] {
        &self.owners[node]
    }

    fn slowness(&self, cell: CellId) -> T {
        self.slowness[cell]
    }

    fn cell_containing(&self, point: Point3<T>) -> Option<CellId> {
        let query = geometry::to_f64(point);
        let mut best: Option<(CellId, T)> = None;
        for entry in self.index.locate_all_at_point(&query) {
            let Some(l) = geometry::barycentric(&self.corners(entry.cell), point) else {
                continue;
            };
            let min_l = l.iter().fold(T::infinity(), |m, &v| m.min(v));
            if min_l < -self.tolerance {
                continue;
            }
            // Prefer the lowest cell index on ties so lookups are deterministic.
            let better = match best {
                None => true,
                Some((cell, score)) => min_l > score || (min_l == score && entry.cell < cell),
            };
            if better {
                best = Some((entry.cell, min_l));
            }
        }
        best.map(|(cell, _)| cell)
    }
}
