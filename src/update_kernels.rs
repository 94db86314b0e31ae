// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use crate::geometry::{self, add, cross, dot, norm, scale, sub, Point3, Real};
use crate::mesh::{CellId, Mesh, NodeId};
use crate::node_state::SlotState;

/// 1-D update: arrival at `x` straight along the edge from `a`.
#[inline]
pub fn solve_edge<T: Real>(x: Point3<T>, a: Point3<T>, t_a: T, s: T) -> T {
    t_a + geometry::distance(a, x) * s
}

/// 2-D update from the frozen edge `(a, b)` to `x` with slowness `s`.
///
/// Minimizes the linearly interpolated time on the edge plus the straight
/// travel time to `x`. Returns `None` when the minimizer lies outside the edge
/// (the 1-D updates then apply) or when the result would be smaller than the
/// latest of the two times used.
pub fn solve_face<T: Real>(x: Point3<T>, a: Point3<T>, t_a: T, b: Point3<T>, t_b: T, s: T) -> Option<T> {
    if !t_a.is_finite() || !t_b.is_finite() {
        return None;
    }
    let zero = T::lit(0.0);
    let one = T::lit(1.0);

    let e = sub(b, a);
    let len = norm(e);
    if len <= zero {
        return None;
    }
    let e0 = sub(x, a);
    // Along-edge coordinate of x and its distance to the edge line.
    let q = dot(e0, e) / len;
    let h = (dot(e0, e0) - q * q).max(zero).sqrt();
    if h <= zero {
        return None;
    }

    let delta = t_b - t_a;
    let r = delta / (s * len);
    if r.abs() >= one {
        return None;
    }
    let c = (one - r * r).sqrt();
    let mu = q - r * h / c;
    let tol = T::epsilon() * len;
    if mu < -tol || mu > len + tol {
        return None;
    }
    let mu = mu.max(zero).min(len);

    let t = t_a + mu * delta / len + s * h / c;
    if t < t_a.max(t_b) {
        return None;
    }
    Some(t)
}

/// 3-D update from the frozen triangle `(a, b, c)` to `x` with slowness `s`.
///
/// Same construction as [`solve_face`] over the opposite face of the
/// tetrahedron. Returns `None` when the minimizer leaves the triangle, the
/// upwind gradient is steeper than `s`, or the result would be smaller than
/// the latest of the three times used.
pub fn solve_tet<T: Real>(x: Point3<T>, corners: [Point3<T>; 3], times: [T; 3], s: T) -> Option<T> {
    if times.iter().any(|t| !t.is_finite()) {
        return None;
    }
    let zero = T::lit(0.0);
    let one = T::lit(1.0);
    let [a, b, c] = corners;
    let [t_a, t_b, t_c] = times;

    let e1 = sub(b, a);
    let e2 = sub(c, a);
    let g11 = dot(e1, e1);
    let g12 = dot(e1, e2);
    let g22 = dot(e2, e2);
    let det = g11 * g22 - g12 * g12;
    if det <= T::epsilon() * g11 * g22 {
        return None;
    }

    // In-plane gradient of the linear time field on the triangle.
    let d1 = t_b - t_a;
    let d2 = t_c - t_a;
    let alpha = (d1 * g22 - d2 * g12) / det;
    let beta = (d2 * g11 - d1 * g12) / det;
    let g = add(scale(e1, alpha), scale(e2, beta));
    let g2 = dot(g, g);
    let s2 = s * s;
    if g2 >= s2 {
        return None;
    }

    let n = cross(e1, e2);
    let n2 = dot(n, n);
    let offset = dot(sub(x, a), n) / n2;
    let h = offset.abs() * n2.sqrt();
    if h <= zero {
        return None;
    }
    let foot = sub(x, scale(n, offset));
    let p = sub(foot, scale(g, h / (s2 - g2).sqrt()));

    let r = sub(p, a);
    let r1 = dot(r, e1);
    let r2 = dot(r, e2);
    let l1 = (r1 * g22 - r2 * g12) / det;
    let l2 = (r2 * g11 - r1 * g12) / det;
    let tol = T::lit(16.0) * T::epsilon();
    if l1 < -tol || l2 < -tol || l1 + l2 > one + tol {
        return None;
    }

    let t = t_a + l1 * d1 + l2 * d2 + s * geometry::distance(x, p);
    if t < t_a.max(t_b).max(t_c) {
        return None;
    }
    Some(t)
}

/// Best arrival time at `x` from up to three known corners of one cell.
///
/// Tries the edge update from every known corner, the face update from every
/// pair, and the cell update when all three are known, and returns the
/// minimum. Adding a known corner can therefore never raise the result.
pub fn solve_known<T: Real>(x: Point3<T>, s: T, known: &[(Point3<T>, T)]) -> T {
    let mut best = T::infinity();
    for &(p, t) in known {
        if t.is_finite() {
            best = best.min(solve_edge(x, p, t, s));
        }
    }
    for i in 0..known.len() {
        for j in (i + 1)..known.len() {
            if let Some(t) = solve_face(x, known[i].0, known[i].1, known[j].0, known[j].1, s) {
                best = best.min(t);
            }
        }
    }
    if known.len() == 3 {
        let corners = [known[0].0, known[1].0, known[2].0];
        let times = [known[0].1, known[1].1, known[2].1];
        if let Some(t) = solve_tet(x, corners, times, s) {
            best = best.min(t);
        }
    }
    best
}

/// Candidate time for `node` using the Frozen corners of `cell`.
pub fn update_in_cell<T: Real, M: Mesh<T> + ?Sized>(
    mesh: &M,
    state: &SlotState<T>,
    node: NodeId,
    cell: CellId,
) -> T {
    let x = mesh.node(node);
    let mut known = [([T::lit(0.0); 3], T::infinity()); 3];
    let mut count = 0;
    for other in mesh.nodes_of(cell) {
        if other != node && state.is_frozen(other) && count < 3 {
            known[count] = (mesh.node(other), state.time(other));
            count += 1;
        }
    }
    solve_known(x, mesh.slowness(cell), &known[..count])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::TetMesh;
    use proptest::prelude::*;

    #[test]
    fn solve_edge_known_case() {
        let t: f64 = solve_edge([3.0, 4.0, 0.0], [0.0, 0.0, 0.0], 1.0, 2.0);
        assert!((t - 11.0).abs() < 1e-12);
    }

    #[test]
    fn solve_face_perpendicular_plane_wave() {
        // Both edge ends at 0, x one unit away from the edge midpoint.
        let t: f64 = solve_face([0.5, 1.0, 0.0], [0.0; 3], 0.0, [1.0, 0.0, 0.0], 0.0, 1.0).unwrap();
        assert!((t - 1.0).abs() < 1e-12);
    }

    #[test]
    fn solve_face_oblique_plane_wave_is_exact() {
        // Plane wave t(p) = k.p with k = (1/2, sqrt(3)/2, 0).
        let k: [f64; 3] = [0.5, 3f64.sqrt() / 2.0, 0.0];
        let x = [0.8, 1.0, 0.0];
        let t = solve_face(x, [0.0; 3], 0.0, [1.0, 0.0, 0.0], 0.5, 1.0).unwrap();
        assert!((t - dot(k, x)).abs() < 1e-12);
    }

    #[test]
    fn solve_face_minimizer_off_edge() {
        // Same wave, but the foot of the ray falls before the edge start.
        let r = solve_face([0.5, 1.0, 0.0], [0.0; 3], 0.0, [1.0, 0.0, 0.0], 0.5, 1.0);
        assert!(r.is_none());
    }

    #[test]
    fn solve_face_too_steep() {
        // |tB - tA| exceeds s * |AB|: no causal 2-D solution.
        let r = solve_face([0.5, 1.0, 0.0], [0.0; 3], 0.0, [1.0, 0.0, 0.0], 2.0, 1.0);
        assert!(r.is_none());
    }

    #[test]
    fn solve_face_infinite_neighbor() {
        let r = solve_face([0.5, 1.0, 0.0], [0.0; 3], f64::INFINITY, [1.0, 0.0, 0.0], 0.0, 1.0);
        assert!(r.is_none());
    }

    #[test]
    fn solve_tet_vertical_plane_wave() {
        let corners = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let t: f64 = solve_tet([0.2, 0.2, 1.0], corners, [0.0; 3], 1.0).unwrap();
        assert!((t - 1.0).abs() < 1e-12);
    }

    #[test]
    fn solve_tet_oblique_plane_wave_is_exact() {
        // t(p) = k.p with k = (0.6, 0, 0.8)
        let k: [f64; 3] = [0.6, 0.0, 0.8];
        let corners = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let times = corners.map(|p| dot(k, p));
        let x = [0.9, 0.1, 1.0];
        let t = solve_tet(x, corners, times, 1.0).unwrap();
        assert!((t - dot(k, x)).abs() < 1e-12);
    }

    #[test]
    fn solve_tet_minimizer_outside_triangle() {
        let k = [0.6, 0.0, 0.8];
        let corners = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let times = corners.map(|p| dot(k, p));
        assert!(solve_tet([0.3, 0.3, 1.0], corners, times, 1.0).is_none());
    }

    #[test]
    fn solve_known_falls_back_to_face() {
        // The tet update is rejected, so the best face or edge wins.
        let k = [0.6, 0.0, 0.8];
        let corners = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let known: Vec<_> = corners.iter().map(|&p| (p, dot(k, p))).collect();
        let x = [0.3, 0.3, 1.0];
        let t: f64 = solve_known(x, 1.0, &known);
        assert!(t.is_finite());
        assert!(t >= dot(k, x) - 1e-12);
        assert!(t <= solve_edge(x, corners[0], 0.0, 1.0));
    }

    #[test]
    fn solve_known_empty_is_infinite() {
        assert!(solve_known::<f64>([0.0; 3], 1.0, &[]).is_infinite());
    }

    #[test]
    fn update_in_cell_uses_frozen_corners_only() {
        let nodes: Vec<[f64; 3]> = vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let mesh = TetMesh::new(nodes, vec![[0, 1, 2, 3]], vec![2.0]).unwrap();
        let mut state = SlotState::new(4, 0);

        assert!(update_in_cell(&mesh, &state, 1, 0).is_infinite());

        state.freeze_at(0, 0.0);
        let t = update_in_cell(&mesh, &state, 1, 0);
        assert!((t - 2.0).abs() < 1e-12);

        // A Narrow corner is not used.
        state.lower(2, 0.0);
        assert!((update_in_cell(&mesh, &state, 1, 0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn no_nan_produced() {
        let cases = [
            ([0.5, 1.0, 0.0], 0.0f64, 0.0, 1.0),
            ([0.5, 0.0, 0.0], 0.0, 0.0, 1.0),
            ([2.0, 0.0, 0.0], 0.0, 1.0, 1.0),
            ([0.5, 1e-9, 0.0], 0.0, 1.0, 1e-3),
            ([0.5, 1.0, 0.0], 0.0, 1.0, 1e3),
        ];
        for (x, ta, tb, s) in cases {
            if let Some(t) = solve_face(x, [0.0; 3], ta, [1.0, 0.0, 0.0], tb, s) {
                assert!(!t.is_nan(), "NaN for solve_face at {:?}", x);
            }
        }
        let corners = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let t: f64 = solve_known([0.2, 0.2, 0.0], 1.0, &corners.map(|p| (p, 0.0)));
        assert!(!t.is_nan());
    }

    fn coord() -> impl Strategy<Value = f64> {
        -2.0..2.0f64
    }

    fn point() -> impl Strategy<Value = Point3<f64>> {
        [coord(), coord(), coord()]
    }

    proptest! {
        #[test]
        fn face_update_is_causal(
            x in point(), a in point(), b in point(),
            ta in 0.0..3.0f64, tb in 0.0..3.0f64, s in 0.1..4.0f64,
        ) {
            if let Some(t) = solve_face(x, a, ta, b, tb, s) {
                prop_assert!(t >= ta.max(tb));
                prop_assert!(t <= solve_edge(x, a, ta, s) + 1e-9);
                prop_assert!(t <= solve_edge(x, b, tb, s) + 1e-9);
            }
        }

        #[test]
        fn tet_update_is_causal(
            x in point(), a in point(), b in point(), c in point(),
            ta in 0.0..3.0f64, tb in 0.0..3.0f64, tc in 0.0..3.0f64, s in 0.1..4.0f64,
        ) {
            if let Some(t) = solve_tet(x, [a, b, c], [ta, tb, tc], s) {
                prop_assert!(t >= ta.max(tb).max(tc));
            }
        }

        #[test]
        fn more_known_corners_never_increase_time(
            x in point(), a in point(), b in point(), c in point(),
            ta in 0.0..3.0f64, tb in 0.0..3.0f64, tc in 0.0..3.0f64, s in 0.1..4.0f64,
        ) {
            let one = solve_known(x, s, &[(a, ta)]);
            let two = solve_known(x, s, &[(a, ta), (b, tb)]);
            let three = solve_known(x, s, &[(a, ta), (b, tb), (c, tc)]);
            prop_assert!(two <= one);
            prop_assert!(three <= two);
        }
    }
}
