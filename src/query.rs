// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{PointRole, RaytraceError, Result};
use crate::geometry::{self, add, norm, scale, Point3, Real};
use crate::mesh::{CellId, Mesh};
use crate::node_state::SlotState;
use crate::source::Source;

/// A backtraced raypath.
#[derive(Debug, Clone, PartialEq)]
pub struct Raypath<T: Real> {
    /// Points ordered from the source to the receiver.
    pub points: Vec<Point3<T>>,
    /// Start time of the source reached plus the sum of segment length times
    /// cell slowness along the path.
    pub travel_time: T,
}

impl<T: Real> Raypath<T> {
    /// Geometric length of the path.
    pub fn length(&self) -> T {
        self.points
            .windows(2)
            .fold(T::lit(0.0), |acc, w| acc + geometry::distance(w[0], w[1]))
    }
}

/// Tuning for raypath backtracing.
#[derive(Debug, Clone, Copy)]
pub struct RaypathOptions<T: Real> {
    /// Step length as a fraction of the local cell size.
    pub step_fraction: T,
    /// Upper bound on the number of steps per path.
    pub max_steps: usize,
    /// Gradient magnitude below which the walk is considered stuck.
    pub min_gradient: T,
}

impl<T: Real> Default for RaypathOptions<T> {
    fn default() -> Self {
        RaypathOptions {
            step_fraction: T::lit(0.1),
            max_steps: 100_000,
            min_gradient: T::lit(1e-12),
        }
    }
}

const MAX_HALVINGS: usize = 8;

/// Interpolated travel time at an arbitrary point.
///
/// # Errors
/// Returns an error if the point lies outside the mesh or a corner of its
/// containing cell was never reached.
pub fn travel_time_at<T: Real, M: Mesh<T> + ?Sized>(
    mesh: &M,
    state: &SlotState<T>,
    point: Point3<T>,
) -> Result<T> {
    let cell = mesh
        .cell_containing(point)
        .ok_or(RaytraceError::OutsideMesh {
            point: geometry::to_f64(point),
            role: PointRole::Receiver,
        })?;
    interpolate_in_cell(mesh, state, cell, point)
}

/// Barycentric interpolation of the nodal travel times of `cell` at `point`.
///
/// # Errors
/// Returns an error if a corner time is infinite or the cell is degenerate.
pub fn interpolate_in_cell<T: Real, M: Mesh<T> + ?Sized>(
    mesh: &M,
    state: &SlotState<T>,
    cell: CellId,
    point: Point3<T>,
) -> Result<T> {
    let times = corner_times(mesh, state, cell, point)?;
    let l = geometry::barycentric(&mesh.corners(cell), point).ok_or(RaytraceError::DegenerateCell {
        cell,
        volume: 0.0,
    })?;
    Ok(l[0] * times[0] + l[1] * times[1] + l[2] * times[2] + l[3] * times[3])
}

fn corner_times<T: Real, M: Mesh<T> + ?Sized>(
    mesh: &M,
    state: &SlotState<T>,
    cell: CellId,
    point: Point3<T>,
) -> Result<[T; 4]> {
    let nodes = mesh.nodes_of(cell);
    let mut times = [T::lit(0.0); 4];
    for (i, &node) in nodes.iter().enumerate() {
        let t = state.time(node);
        if !t.is_finite() {
            return Err(RaytraceError::IncompletePropagation {
                point: geometry::to_f64(point),
                node,
            });
        }
        times[i] = t;
    }
    Ok(times)
}

// Cells in which the walk is close enough to snap onto a source.
struct SourceZone<T: Real> {
    position: Point3<T>,
    start_time: T,
    cells: Vec<CellId>,
}

impl<T: Real> SourceZone<T> {
    // Arrival time at the source plus straight travel to `p` at slowness `s`.
    fn arrival(&self, p: Point3<T>, s: T) -> T {
        self.start_time + geometry::distance(self.position, p) * s
    }
}

// Zones of the sources that still own their seed nodes after propagation.
// A source whose seeds were all overtaken by an earlier front is skipped.
fn source_zones<T: Real, M: Mesh<T> + ?Sized>(
    mesh: &M,
    state: &SlotState<T>,
    sources: &[Source<T>],
) -> Result<Vec<SourceZone<T>>> {
    let mut zones = Vec::with_capacity(sources.len());
    for src in sources {
        let cell = mesh
            .cell_containing(src.position)
            .ok_or(RaytraceError::OutsideMesh {
                point: geometry::to_f64(src.position),
                role: PointRole::Source,
            })?;
        let on_node = mesh
            .nodes_of(cell)
            .into_iter()
            .find(|&n| mesh.node(n) == src.position);
        let has_radius = src.radius.is_some_and(|r| r > T::lit(0.0));
        let (cells, active) = match on_node {
            Some(node) => (
                mesh.owner_cells(node).to_vec(),
                has_radius || state.time(node) >= src.start_time,
            ),
            None => {
                let s = mesh.slowness(cell);
                let seeded = mesh.nodes_of(cell).into_iter().any(|n| {
                    state.time(n) >= src.start_time + mesh.distance(n, src.position) * s
                });
                (vec![cell], has_radius || seeded)
            }
        };
        if active {
            zones.push(SourceZone {
                position: src.position,
                start_time: src.start_time,
                cells,
            });
        }
    }
    Ok(zones)
}

fn earliest<'a, T: Real>(
    zones: impl Iterator<Item = &'a SourceZone<T>>,
    p: Point3<T>,
    s: T,
) -> Option<&'a SourceZone<T>> {
    zones.min_by(|a, b| {
        a.arrival(p, s)
            .partial_cmp(&b.arrival(p, s))
            .unwrap_or(std::cmp::Ordering::Equal)
    })
}

fn finish<T: Real>(
    mut points: Vec<Point3<T>>,
    travel_time: T,
    zone: &SourceZone<T>,
    p: Point3<T>,
    s: T,
) -> Raypath<T> {
    if zone.position != p {
        points.push(zone.position);
    }
    points.reverse();
    Raypath {
        points,
        travel_time: travel_time + zone.arrival(p, s),
    }
}

fn inside<T: Real>(l: &[T; 4]) -> bool {
    let tol = T::epsilon().sqrt();
    l.iter().all(|&v| v >= -tol)
}

// Pull a point back onto the closest part of `cell` along barycentric axes.
fn clamp_to_cell<T: Real>(corners: &[Point3<T>; 4], p: Point3<T>) -> Option<Point3<T>> {
    let l = geometry::barycentric(corners, p)?;
    let zero = T::lit(0.0);
    let clamped = l.map(|v| v.max(zero));
    let total = clamped.iter().fold(zero, |acc, &v| acc + v);
    if total <= zero {
        return None;
    }
    let q = corners
        .iter()
        .zip(clamped)
        .fold([zero; 3], |q, (&c, w)| add(q, scale(c, w / total)));
    Some(q)
}

/// Backtrace the raypath from `receiver` to the source it was reached from,
/// by steepest descent of the interpolated travel-time field.
///
/// Sources overtaken by another front before they fired are ignored.
///
/// # Errors
/// Returns an error if the receiver is outside the mesh or in an unreached
/// cell, or if the walk does not reach a source within `max_steps`.
pub fn trace_raypath<T: Real, M: Mesh<T> + ?Sized>(
    mesh: &M,
    state: &SlotState<T>,
    sources: &[Source<T>],
    receiver: Point3<T>,
    opts: &RaypathOptions<T>,
) -> Result<Raypath<T>> {
    let zones = source_zones(mesh, state, sources)?;
    let mut cell = mesh
        .cell_containing(receiver)
        .ok_or(RaytraceError::OutsideMesh {
            point: geometry::to_f64(receiver),
            role: PointRole::Receiver,
        })?;

    let mut p = receiver;
    let mut points = vec![receiver];
    let mut travel_time = T::lit(0.0);

    for _ in 0..opts.max_steps {
        let s = mesh.slowness(cell);

        // Finish straight to a source once we are in its zone.
        if let Some(zone) = earliest(zones.iter().filter(|z| z.cells.contains(&cell)), p, s) {
            return Ok(finish(points, travel_time, zone, p, s));
        }

        let corners = mesh.corners(cell);
        let times = corner_times(mesh, state, cell, p)?;
        let g = geometry::gradient(&corners, times).ok_or(RaytraceError::DegenerateCell {
            cell,
            volume: 0.0,
        })?;
        let gn = norm(g);
        if gn < opts.min_gradient {
            break;
        }
        let dir = scale(g, -T::lit(1.0) / gn);
        let mut step = opts.step_fraction * mesh.cell_size(cell);

        // A source closer than one step ends the walk.
        if let Some(zone) = earliest(
            zones
                .iter()
                .filter(|z| geometry::distance(z.position, p) <= step),
            p,
            s,
        ) {
            return Ok(finish(points, travel_time, zone, p, s));
        }

        let mut next = add(p, scale(dir, step));
        let mut next_cell = locate_step(mesh, cell, &corners, next);
        let mut halvings = 0;
        while next_cell.is_none() && halvings < MAX_HALVINGS {
            step = step / T::lit(2.0);
            next = add(p, scale(dir, step));
            next_cell = locate_step(mesh, cell, &corners, next);
            halvings += 1;
        }
        let next_cell = match next_cell {
            Some(c) => c,
            None => {
                tracing::warn!(cell, "raypath step clamped to mesh boundary");
                next = clamp_to_cell(&corners, next).ok_or(RaytraceError::OutsideMesh {
                    point: geometry::to_f64(next),
                    role: PointRole::Raypath,
                })?;
                cell
            }
        };
        if halvings > 0 {
            tracing::debug!(halvings, "raypath step shortened near mesh boundary");
        }

        let seg = geometry::distance(p, next);
        let s_seg = (s + mesh.slowness(next_cell)) / T::lit(2.0);
        travel_time = travel_time + seg * s_seg;
        p = next;
        cell = next_cell;
        points.push(p);
    }

    Err(RaytraceError::RaypathNotConverged {
        receiver: geometry::to_f64(receiver),
        steps: points.len() - 1,
    })
}

fn locate_step<T: Real, M: Mesh<T> + ?Sized>(
    mesh: &M,
    cell: CellId,
    corners: &[Point3<T>; 4],
    next: Point3<T>,
) -> Option<CellId> {
    if matches!(geometry::barycentric(corners, next), Some(l) if inside(&l)) {
        return Some(cell);
    }
    // Short steps usually cross a single face.
    mesh.neighbor_cells(cell)
        .iter()
        .copied()
        .find(|&n| matches!(geometry::barycentric(&mesh.corners(n), next), Some(l) if inside(&l)))
        .or_else(|| mesh.cell_containing(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TetMesh;
    use crate::narrow_band::NarrowBand;
    use crate::propagation::propagate;
    use crate::source::init_sources;
    use crate::test_util::five_tet_cube;

    fn solved(mesh: &TetMesh<f64>, sources: &[Source<f64>]) -> SlotState<f64> {
        let mut state = SlotState::new(mesh.num_nodes(), 0);
        let mut band = NarrowBand::new();
        init_sources(mesh, sources, &mut state, &mut band, true).unwrap();
        propagate(mesh, &mut state, &mut band);
        state
    }

    #[test]
    fn interpolation_matches_nodes() {
        let mesh = five_tet_cube();
        let state = solved(&mesh, &[Source::new([0.0, 0.0, 0.0], 0.0)]);
        for n in 0..8 {
            let t = travel_time_at(&mesh, &state, mesh.node(n)).unwrap();
            assert!((t - state.time(n)).abs() < 1e-9);
        }
    }

    #[test]
    fn interpolation_is_linear_in_cell() {
        let mesh = five_tet_cube();
        let state = solved(&mesh, &[Source::new([0.0, 0.0, 0.0], 0.0)]);
        // Centroid of the corner cell averages its four corners.
        let t = travel_time_at(&mesh, &state, [0.25, 0.25, 0.25]).unwrap();
        let expected = (state.time(0) + state.time(1) + state.time(2) + state.time(4)) / 4.0;
        assert!((t - expected).abs() < 1e-12);
    }

    #[test]
    fn receiver_outside_mesh() {
        let mesh = five_tet_cube();
        let state = solved(&mesh, &[Source::new([0.0, 0.0, 0.0], 0.0)]);
        let result = travel_time_at(&mesh, &state, [0.5, 0.5, 2.0]);
        assert!(matches!(
            result,
            Err(RaytraceError::OutsideMesh {
                role: PointRole::Receiver,
                ..
            })
        ));
    }

    #[test]
    fn unreached_corner_is_reported() {
        let mesh = five_tet_cube();
        let state = SlotState::new(8, 0);
        let result = travel_time_at(&mesh, &state, [0.25, 0.25, 0.25]);
        assert!(matches!(
            result,
            Err(RaytraceError::IncompletePropagation { .. })
        ));
    }

    #[test]
    fn raypath_in_source_cell_is_straight() {
        let mesh = five_tet_cube();
        let sources = [Source::new([0.0, 0.0, 0.0], 0.0)];
        let state = solved(&mesh, &sources);
        let receiver = [0.2, 0.1, 0.1];
        let path = trace_raypath(&mesh, &state, &sources, receiver, &RaypathOptions::default()).unwrap();
        assert_eq!(path.points, vec![[0.0, 0.0, 0.0], receiver]);
        let d = geometry::distance([0.0, 0.0, 0.0], receiver);
        assert!((path.travel_time - d).abs() < 1e-12);
        assert!((path.length() - d).abs() < 1e-12);
    }

    #[test]
    fn raypath_time_starts_at_source_time() {
        let mesh = five_tet_cube();
        let sources = [Source::new([0.0, 0.0, 0.0], 1.0)];
        let state = solved(&mesh, &sources);
        let receiver = [0.2, 0.1, 0.1];
        let path = trace_raypath(&mesh, &state, &sources, receiver, &RaypathOptions::default()).unwrap();
        let d = geometry::distance([0.0, 0.0, 0.0], receiver);
        assert!((path.travel_time - (1.0 + d)).abs() < 1e-12);
        assert!((path.length() - d).abs() < 1e-12);
    }

    #[test]
    fn overtaken_source_is_skipped() {
        let mesh = five_tet_cube();
        // Node 7 is reached from node 0 at √3 long before its own start.
        let sources = [
            Source::new([0.0, 0.0, 0.0], 0.0),
            Source::new([1.0, 1.0, 1.0], 5.0),
        ];
        let state = solved(&mesh, &sources);
        let zones = source_zones(&mesh, &state, &sources).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn raypath_runs_from_source_to_receiver() {
        let mesh = five_tet_cube();
        let sources = [Source::new([0.0, 0.0, 0.0], 0.0)];
        let state = solved(&mesh, &sources);
        let receiver = [0.9, 0.9, 0.8];
        let path = trace_raypath(&mesh, &state, &sources, receiver, &RaypathOptions::default()).unwrap();
        assert_eq!(path.points.first(), Some(&[0.0, 0.0, 0.0]));
        assert_eq!(path.points.last(), Some(&receiver));
        // Unit slowness: path time equals path length.
        let straight = geometry::distance([0.0, 0.0, 0.0], receiver);
        assert!((path.travel_time - path.length()).abs() < 1e-9);
        assert!(path.travel_time >= straight - 1e-9);
        assert!(path.travel_time < 2.0 * straight, "path {}", path.travel_time);
    }

    #[test]
    fn raypath_step_limit() {
        let mesh = five_tet_cube();
        let sources = [Source::new([0.0, 0.0, 0.0], 0.0)];
        let state = solved(&mesh, &sources);
        let opts = RaypathOptions {
            max_steps: 1,
            step_fraction: 1e-3,
            ..RaypathOptions::default()
        };
        let result = trace_raypath(&mesh, &state, &sources, [0.9, 0.9, 0.8], &opts);
        assert!(matches!(
            result,
            Err(RaytraceError::RaypathNotConverged { .. })
        ));
    }
}
