// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayD};

use crate::error::{RaytraceError, Result};
use crate::geometry::Point3;
use crate::mesh::NodeId;
use crate::query::Raypath;

fn read_f64(path: &Path) -> Result<ArrayD<f64>> {
    // Try f64 first
    match ndarray_npy::read_npy::<_, ArrayD<f64>>(path) {
        Ok(a) => Ok(a),
        Err(_) => {
            // Try f32 and promote
            let arr32: ArrayD<f32> = ndarray_npy::read_npy(path)
                .map_err(|e| RaytraceError::Npy(format!("{}: {}", path.display(), e)))?;
            Ok(arr32.mapv(|v| v as f64))
        }
    }
}

fn read_i64(path: &Path) -> Result<ArrayD<i64>> {
    match ndarray_npy::read_npy::<_, ArrayD<i64>>(path) {
        Ok(a) => Ok(a),
        Err(_) => {
            let arr32: ArrayD<i32> = ndarray_npy::read_npy(path)
                .map_err(|e| RaytraceError::Npy(format!("{}: {}", path.display(), e)))?;
            Ok(arr32.mapv(|v| v as i64))
        }
    }
}

fn check_columns(shape: &[usize], cols: usize) -> Result<usize> {
    match shape {
        [rows, c] if *c == cols => Ok(*rows),
        _ => Err(RaytraceError::ShapeMismatch {
            expected: vec![0, cols],
            got: shape.to_vec(),
        }),
    }
}

/// Load an `N x 3` array of points (node coordinates or receivers).
pub fn load_points(path: &Path) -> Result<Vec<Point3<f64>>> {
    let arr = read_f64(path)?;
    check_columns(arr.shape(), 3)?;
    // Logical (row-major) iteration order, whatever the on-disk layout.
    let flat: Vec<f64> = arr.iter().copied().collect();
    Ok(flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
}

/// Load an `M x 4` integer array of cell connectivity.
pub fn load_cells(path: &Path) -> Result<Vec<[NodeId; 4]>> {
    let arr = read_i64(path)?;
    check_columns(arr.shape(), 4)?;
    let flat: Vec<i64> = arr.iter().copied().collect();
    let mut cells = Vec::with_capacity(flat.len() / 4);
    for (cell, c) in flat.chunks_exact(4).enumerate() {
        let mut ids = [0usize; 4];
        for (slot, &v) in ids.iter_mut().zip(c) {
            *slot = usize::try_from(v).map_err(|_| {
                RaytraceError::Npy(format!("cell {} has negative node index {}", cell, v))
            })?;
        }
        cells.push(ids);
    }
    Ok(cells)
}

/// Load a per-cell slowness vector of length `expected_len`.
pub fn load_slowness(path: &Path, expected_len: usize) -> Result<Vec<f64>> {
    let arr = read_f64(path)?;
    if arr.shape() != [expected_len] {
        return Err(RaytraceError::ShapeMismatch {
            expected: vec![expected_len],
            got: arr.shape().to_vec(),
        });
    }
    Ok(arr.iter().copied().collect())
}

/// Save a vector of travel times to a .npy file.
pub fn save_times(path: &Path, times: &[f64]) -> Result<()> {
    let arr = Array1::from(times.to_vec());
    ndarray_npy::write_npy(path, &arr)
        .map_err(|e| RaytraceError::Npy(format!("npy write error: {}", e)))
}

/// Save raypaths as one `K x 4` array of `[path_index, x, y, z]` rows,
/// each path listed from source to receiver.
pub fn save_raypaths(path: &Path, paths: &[Raypath<f64>]) -> Result<()> {
    let rows: usize = paths.iter().map(|p| p.points.len()).sum();
    let mut data = Vec::with_capacity(rows * 4);
    for (i, p) in paths.iter().enumerate() {
        for pt in &p.points {
            data.extend_from_slice(&[i as f64, pt[0], pt[1], pt[2]]);
        }
    }
    let arr = Array2::from_shape_vec((rows, 4), data)
        .map_err(|e| RaytraceError::Other(format!("shape error: {}", e)))?;
    ndarray_npy::write_npy(path, &arr)
        .map_err(|e| RaytraceError::Npy(format!("npy write error: {}", e)))
}
