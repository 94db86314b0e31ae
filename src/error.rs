// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;

use thiserror::Error;

/// What a located point stands for, used to label out-of-domain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointRole {
    /// A wave source.
    Source,
    /// A receiver queried after propagation.
    Receiver,
    /// A point visited while backtracing a raypath.
    Raypath,
}

impl fmt::Display for PointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointRole::Source => write!(f, "source"),
            PointRole::Receiver => write!(f, "receiver"),
            PointRole::Raypath => write!(f, "raypath point"),
        }
    }
}

/// Errors that can occur during mesh setup, raytracing, or I/O.
#[derive(Debug, Error)]
pub enum RaytraceError {
    /// The mesh has no nodes or no cells.
    #[error("mesh is empty: {nodes} nodes, {cells} cells")]
    EmptyMesh {
        /// Number of nodes supplied.
        nodes: usize,
        /// Number of cells supplied.
        cells: usize,
    },
    /// A node coordinate is NaN or infinite.
    #[error("invalid coordinate at node {node}: {coord:?}")]
    InvalidCoordinate {
        /// The node index.
        node: usize,
        /// The offending coordinates.
        coord: [f64; 3],
    },
    /// A cell references a node that does not exist, or repeats a node.
    #[error("invalid connectivity in cell {cell}: node {node} (mesh has {num_nodes} nodes)")]
    InvalidNodeIndex {
        /// The cell index.
        cell: usize,
        /// The referenced node.
        node: usize,
        /// Number of nodes in the mesh.
        num_nodes: usize,
    },
    /// A cell has (near) zero volume.
    #[error("degenerate cell {cell}: volume {volume}")]
    DegenerateCell {
        /// The cell index.
        cell: usize,
        /// The signed volume.
        volume: f64,
    },
    /// Slowness value is not positive and finite.
    #[error("invalid slowness in cell {cell}: {value} (must be positive and finite)")]
    InvalidSlowness {
        /// The cell index.
        cell: usize,
        /// The invalid value.
        value: f64,
    },
    /// Two parallel input lists differ in length.
    #[error("length mismatch for {what}: expected {expected}, got {got}")]
    LengthMismatch {
        /// Which input is mismatched.
        what: &'static str,
        /// The expected length.
        expected: usize,
        /// The actual length.
        got: usize,
    },
    /// A raytrace call was made without any source.
    #[error("at least one source is required")]
    NoSources,
    /// A point could not be located in any cell of the mesh.
    #[error("{role} at {point:?} lies outside the mesh")]
    OutsideMesh {
        /// The offending point.
        point: [f64; 3],
        /// What the point stands for.
        role: PointRole,
    },
    /// A source capture radius is negative or not finite.
    #[error("invalid capture radius {radius} for source at {point:?}")]
    InvalidRadius {
        /// The source position.
        point: [f64; 3],
        /// The radius provided.
        radius: f64,
    },
    /// A source capture radius contains no mesh node.
    #[error("no node found within radius {radius} of source at {point:?}")]
    EmptySourceRadius {
        /// The source position.
        point: [f64; 3],
        /// The radius provided.
        radius: f64,
    },
    /// A query point sits in a cell whose corner was never reached.
    #[error("travel time at {point:?} is undefined: node {node} was never reached")]
    IncompletePropagation {
        /// The query point.
        point: [f64; 3],
        /// The unreached corner node.
        node: usize,
    },
    /// Raypath backtracing did not reach a source.
    #[error("raypath from receiver at {receiver:?} did not reach a source after {steps} steps")]
    RaypathNotConverged {
        /// The receiver the walk started from.
        receiver: [f64; 3],
        /// Number of steps taken.
        steps: usize,
    },
    /// A solver option is out of range.
    #[error("invalid option {name}: {value}")]
    InvalidOption {
        /// The option name.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// Array shape does not match expected shape.
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape encountered.
        got: Vec<usize>,
    },
    /// Reading or writing a .npy file failed.
    #[error("npy error: {0}")]
    Npy(String),
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Other error with a descriptive message.
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results with RaytraceError.
pub type Result<T> = std::result::Result<T, RaytraceError>;
