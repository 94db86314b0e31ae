// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{PointRole, RaytraceError, Result};
use crate::geometry::{self, Point3, Real};
use crate::mesh::{Mesh, NodeId};
use crate::narrow_band::NarrowBand;
use crate::node_state::SlotState;

/// A wave source: a point, its start time, and an optional capture radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Source<T: Real> {
    /// Position in mesh coordinates.
    pub position: Point3<T>,
    /// Time at which the source fires.
    pub start_time: T,
    /// Freeze every node within this distance of the source.
    pub radius: Option<T>,
}

impl<T: Real> Source<T> {
    /// A point source firing at `start_time`.
    pub fn new(position: Point3<T>, start_time: T) -> Self {
        Source {
            position,
            start_time,
            radius: None,
        }
    }

    /// Set a capture radius (builder method).
    pub fn with_radius(mut self, radius: T) -> Self {
        self.radius = Some(radius);
        self
    }
}

/// Pair source points with their start times.
///
/// # Errors
/// Returns an error if the two lists differ in length.
pub fn sources_from<T: Real>(points: &[Point3<T>], start_times: &[T]) -> Result<Vec<Source<T>>> {
    if points.len() != start_times.len() {
        return Err(RaytraceError::LengthMismatch {
            what: "start times",
            expected: points.len(),
            got: start_times.len(),
        });
    }
    Ok(points
        .iter()
        .zip(start_times)
        .map(|(&p, &t0)| Source::new(p, t0))
        .collect())
}

/// Counts reported by [`init_sources`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    /// Nodes frozen during initialization.
    pub frozen: usize,
    /// Nodes given a provisional time during initialization.
    pub narrow: usize,
}

/// Seed `state` and `band` from a set of sources.
///
/// A source on a node gives that node its start time; if it is the only
/// source and has no radius, its one-ring gets direct edge estimates when
/// `one_ring` is set. A source with a positive radius freezes every node within
/// that radius. Any other source seeds the four corners of its containing cell.
/// Point-source nodes stay Narrow until the driver pops them, and a node is
/// only ever written with a strictly smaller time.
///
/// # Errors
/// Returns an error if there are no sources, a source lies outside the mesh,
/// a radius is negative or not finite, or a radius contains no node.
pub fn init_sources<T: Real, M: Mesh<T> + ?Sized>(
    mesh: &M,
    sources: &[Source<T>],
    state: &mut SlotState<T>,
    band: &mut NarrowBand<T>,
    one_ring: bool,
) -> Result<SeedSummary> {
    if sources.is_empty() {
        return Err(RaytraceError::NoSources);
    }
    let single = sources.len() == 1;
    let mut summary = SeedSummary::default();

    for src in sources {
        let cell = mesh
            .cell_containing(src.position)
            .ok_or(RaytraceError::OutsideMesh {
                point: geometry::to_f64(src.position),
                role: PointRole::Source,
            })?;

        match src.radius {
            Some(r) if !r.is_finite() || r < T::lit(0.0) => {
                return Err(RaytraceError::InvalidRadius {
                    point: geometry::to_f64(src.position),
                    radius: r.as_f64(),
                });
            }
            Some(r) if r > T::lit(0.0) => {
                seed_radius(mesh, src, r, state, band, &mut summary)?;
                continue;
            }
            _ => {}
        }

        let on_node = mesh
            .nodes_of(cell)
            .into_iter()
            .find(|&n| mesh.node(n) == src.position);

        match on_node {
            Some(node) => {
                // Left Narrow so an earlier front from another source can still
                // overtake it; the driver freezes it on pop.
                if state.lower(node, src.start_time) {
                    band.push(node, src.start_time);
                    summary.narrow += 1;
                }
                if single && one_ring {
                    seed_one_ring(mesh, node, src.start_time, state, band, &mut summary);
                }
            }
            None => {
                let s = mesh.slowness(cell);
                for node in mesh.nodes_of(cell) {
                    let t = src.start_time + mesh.distance(node, src.position) * s;
                    if state.lower(node, t) {
                        band.push(node, t);
                        summary.narrow += 1;
                    }
                }
            }
        }
    }

    Ok(summary)
}

fn seed_one_ring<T: Real, M: Mesh<T> + ?Sized>(
    mesh: &M,
    seed: NodeId,
    start_time: T,
    state: &mut SlotState<T>,
    band: &mut NarrowBand<T>,
    summary: &mut SeedSummary,
) {
    let origin = mesh.node(seed);
    for &cell in mesh.owner_cells(seed) {
        let s = mesh.slowness(cell);
        for node in mesh.nodes_of(cell) {
            if node == seed {
                continue;
            }
            let t = start_time + mesh.distance(node, origin) * s;
            if state.lower(node, t) {
                band.push(node, t);
                summary.narrow += 1;
            }
        }
    }
}

fn seed_radius<T: Real, M: Mesh<T> + ?Sized>(
    mesh: &M,
    src: &Source<T>,
    radius: T,
    state: &mut SlotState<T>,
    band: &mut NarrowBand<T>,
    summary: &mut SeedSummary,
) -> Result<()> {
    let mut found = 0usize;
    for node in 0..mesh.num_nodes() {
        let d = mesh.distance(node, src.position);
        if d > radius {
            continue;
        }
        let owners = mesh.owner_cells(node);
        if owners.is_empty() {
            continue;
        }
        let total = owners
            .iter()
            .fold(T::lit(0.0), |acc, &cell| acc + mesh.slowness(cell));
        let avg = total / T::lit(owners.len() as f64);
        found += 1;

        let t = src.start_time + d * avg;
        if state.freeze_at(node, t) {
            band.push_seed(node, t);
            summary.frozen += 1;
        }
    }

    if found == 0 {
        return Err(RaytraceError::EmptySourceRadius {
            point: geometry::to_f64(src.position),
            radius: radius.as_f64(),
        });
    }
    tracing::debug!(nodes = found, radius = radius.as_f64(), "seeded source radius");
    Ok(())
}
