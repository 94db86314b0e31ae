// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

//! Travel times and raypaths on unstructured tetrahedral meshes using the
//! Fast Marching Method (FMM).
//!
//! The solver computes first-arrival times by solving the eikonal equation
//! |∇t| = s on a mesh with per-cell slowness s. Nodes are finalized in
//! ascending time order from a lazy-deletion min-heap; each finalized node
//! updates its unfrozen neighbours through a local edge, face, or
//! tetrahedron kernel. Receiver times are interpolated inside their
//! containing cell, and raypaths are backtraced by steepest descent.
//!
//! The mesh is shared read-only; every call runs on its own
//! [`SlotState`], so independent source groups can be traced in parallel.

#![warn(missing_docs)]

/// Error types for the library.
pub mod error;
/// Numeric precision trait and small 3-D vector helpers.
pub mod geometry;
/// `.npy` array I/O for meshes, travel times, and raypaths.
pub mod io;
/// Mesh accessor trait and the tetrahedral mesh backend.
pub mod mesh;
/// Lazy-deletion priority queue of candidate times.
pub mod narrow_band;
/// Per-call node travel-time state.
pub mod node_state;
/// Pool of reusable slot states.
pub mod pool;
/// Narrow-band propagation driver.
pub mod propagation;
/// Receiver interpolation and raypath backtracing.
pub mod query;
/// Public raytracing front end.
pub mod raytracer;
/// Source description and initialization.
pub mod source;
/// Local eikonal update kernels for tetrahedral cells.
pub mod update_kernels;

#[cfg(test)]
pub(crate) mod test_util;

pub use crate::error::{PointRole, RaytraceError, Result};
pub use crate::geometry::{Point3, Real};
pub use crate::mesh::{CellId, Mesh, NodeId, TetMesh};
pub use crate::node_state::{NodeState, SlotState};
pub use crate::propagation::PropagationStats;
pub use crate::query::{Raypath, RaypathOptions};
pub use crate::raytracer::{Batch, BatchOutput, Raytracer};
pub use crate::source::{sources_from, Source};
