// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Shared fixtures for unit tests.

use crate::mesh::TetMesh;

/// Unit cube split into five tetrahedra around the central one (cell 4),
/// with unit slowness.
pub(crate) fn five_tet_cube() -> TetMesh<f64> {
    five_tet_cube_with(vec![1.0; 5])
}

/// The five-tetrahedron unit cube with the given per-cell slowness.
pub(crate) fn five_tet_cube_with(slowness: Vec<f64>) -> TetMesh<f64> {
    let nodes = vec![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [1.0, 1.0, 0.0],
        [0.0, 0.0, 1.0],
        [1.0, 0.0, 1.0],
        [0.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
    ];
    let cells = vec![
        [0, 1, 2, 4],
        [1, 3, 2, 7],
        [1, 4, 5, 7],
        [2, 4, 7, 6],
        [1, 2, 4, 7],
    ];
    TetMesh::new(nodes, cells, slowness).unwrap()
}
