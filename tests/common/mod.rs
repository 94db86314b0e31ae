// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

#![allow(dead_code)]

use eikonal_fmm::{NodeId, Real, TetMesh};

/// Index of lattice node (i, j, k) in a box with `n` cubes per side.
pub fn node_index(n: usize, i: usize, j: usize, k: usize) -> NodeId {
    i + (n + 1) * (j + (n + 1) * k)
}

/// Nodes and cells of a cube of side `size` split into `n^3` sub-cubes, each
/// cut into six tetrahedra sharing the sub-cube's main diagonal.
///
/// Neighbouring sub-cubes cut their shared faces the same way, so the result
/// is a conforming mesh.
pub fn kuhn_lattice<T: Real>(n: usize, size: f64) -> (Vec<[T; 3]>, Vec<[NodeId; 4]>) {
    let h = size / n as f64;
    let mut nodes = Vec::with_capacity((n + 1).pow(3));
    for k in 0..=n {
        for j in 0..=n {
            for i in 0..=n {
                nodes.push([
                    T::lit(i as f64 * h),
                    T::lit(j as f64 * h),
                    T::lit(k as f64 * h),
                ]);
            }
        }
    }

    const PERMUTATIONS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    let mut cells = Vec::with_capacity(6 * n * n * n);
    for k in 0..n {
        for j in 0..n {
            for i in 0..n {
                for perm in PERMUTATIONS {
                    let mut corner = [i, j, k];
                    let mut tet = [node_index(n, i, j, k); 4];
                    for (step, &axis) in perm.iter().enumerate() {
                        corner[axis] += 1;
                        tet[step + 1] = node_index(n, corner[0], corner[1], corner[2]);
                    }
                    cells.push(tet);
                }
            }
        }
    }
    (nodes, cells)
}

/// Kuhn lattice over the unit cube with uniform slowness.
pub fn unit_cube<T: Real>(n: usize, slowness: f64) -> TetMesh<T> {
    let (nodes, cells) = kuhn_lattice::<T>(n, 1.0);
    let s = vec![T::lit(slowness); cells.len()];
    TetMesh::new(nodes, cells, s).unwrap()
}
