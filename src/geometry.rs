// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt::{Debug, Display};

use num_traits::Float;

/// Floating-point precision the solver runs in (`f32` or `f64`).
pub trait Real: Float + Debug + Display + Default + Send + Sync + 'static {
    /// Convert an `f64` literal into this precision.
    fn lit(v: f64) -> Self;

    /// Widen to `f64` (used for errors, the spatial index and I/O).
    fn as_f64(self) -> f64;
}

impl Real for f64 {
    #[inline]
    fn lit(v: f64) -> Self {
        v
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

impl Real for f32 {
    #[inline]
    fn lit(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

/// A point or vector in 3-D space.
pub type Point3<T> = [T; 3];

/// Component-wise `a - b`.
#[inline]
pub fn sub<T: Real>(a: Point3<T>, b: Point3<T>) -> Point3<T> {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Component-wise `a + b`.
#[inline]
pub fn add<T: Real>(a: Point3<T>, b: Point3<T>) -> Point3<T> {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// Scale a vector by `s`.
#[inline]
pub fn scale<T: Real>(a: Point3<T>, s: T) -> Point3<T> {
    [a[0] * s, a[1] * s, a[2] * s]
}

/// Dot product.
#[inline]
pub fn dot<T: Real>(a: Point3<T>, b: Point3<T>) -> T {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Cross product `a × b`.
#[inline]
pub fn cross<T: Real>(a: Point3<T>, b: Point3<T>) -> Point3<T> {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Euclidean length.
#[inline]
pub fn norm<T: Real>(a: Point3<T>) -> T {
    dot(a, a).sqrt()
}

/// Euclidean distance between two points.
#[inline]
pub fn distance<T: Real>(a: Point3<T>, b: Point3<T>) -> T {
    norm(sub(a, b))
}

/// Scalar triple product `a . (b x c)`.
#[inline]
pub fn det3<T: Real>(a: Point3<T>, b: Point3<T>, c: Point3<T>) -> T {
    dot(a, cross(b, c))
}

/// Widen a point to `f64` coordinates.
#[inline]
pub fn to_f64<T: Real>(p: Point3<T>) -> [f64; 3] {
    [p[0].as_f64(), p[1].as_f64(), p[2].as_f64()]
}

/// Signed volume of a tetrahedron.
pub fn signed_volume<T: Real>(corners: &[Point3<T>; 4]) -> T {
    let [a, b, c, d] = *corners;
    det3(sub(b, a), sub(c, a), sub(d, a)) / T::lit(6.0)
}

/// Barycentric coordinates of `p` with respect to a tetrahedron.
///
/// The coordinates sum to one and are all non-negative when `p` lies inside.
/// Returns `None` for a degenerate tetrahedron.
pub fn barycentric<T: Real>(corners: &[Point3<T>; 4], p: Point3<T>) -> Option<[T; 4]> {
    let [a, b, c, d] = *corners;
    let e1 = sub(b, a);
    let e2 = sub(c, a);
    let e3 = sub(d, a);
    let det = det3(e1, e2, e3);
    if det == T::lit(0.0) || !det.is_finite() {
        return None;
    }
    let r = sub(p, a);
    let l1 = det3(r, e2, e3) / det;
    let l2 = det3(e1, r, e3) / det;
    let l3 = det3(e1, e2, r) / det;
    Some([T::lit(1.0) - l1 - l2 - l3, l1, l2, l3])
}

/// Gradient of the linear field taking `values[i]` at `corners[i]`.
///
/// Returns `None` for a degenerate tetrahedron.
pub fn gradient<T: Real>(corners: &[Point3<T>; 4], values: [T; 4]) -> Option<Point3<T>> {
    let [a, b, c, d] = *corners;
    let e1 = sub(b, a);
    let e2 = sub(c, a);
    let e3 = sub(d, a);
    let det = det3(e1, e2, e3);
    if det == T::lit(0.0) || !det.is_finite() {
        return None;
    }
    let d1 = values[1] - values[0];
    let d2 = values[2] - values[0];
    let d3 = values[3] - values[0];
    let g = add(
        add(scale(cross(e2, e3), d1), scale(cross(e3, e1), d2)),
        scale(cross(e1, e2), d3),
    );
    Some(scale(g, T::lit(1.0) / det))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_tet() -> [Point3<f64>; 4] {
        [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ]
    }

    #[test]
    fn unit_tet_volume() {
        assert!((signed_volume(&unit_tet()) - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn barycentric_of_corners_and_centroid() {
        let tet = unit_tet();
        let l = barycentric(&tet, [1.0, 0.0, 0.0]).unwrap();
        assert!((l[1] - 1.0).abs() < 1e-12);
        assert!(l[0].abs() < 1e-12 && l[2].abs() < 1e-12 && l[3].abs() < 1e-12);

        let l = barycentric(&tet, [0.25, 0.25, 0.25]).unwrap();
        for li in l {
            assert!((li - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn barycentric_outside_has_negative_coordinate() {
        let l = barycentric(&unit_tet(), [1.0, 1.0, 1.0]).unwrap();
        assert!(l[0] < 0.0);
    }

    #[test]
    fn degenerate_tet_has_no_coordinates() {
        let flat = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [1.0, 1.0, 0.0],
        ];
        assert!(barycentric(&flat, [0.1, 0.1, 0.0]).is_none());
        assert!(gradient(&flat, [0.0, 1.0, 1.0, 2.0]).is_none());
    }

    #[test]
    fn gradient_of_linear_field() {
        // f(x, y, z) = 2x - y + 3z + 1
        let tet = [
            [0.1, 0.2, 0.0],
            [1.3, 0.0, 0.2],
            [0.0, 1.1, 0.4],
            [0.3, 0.2, 0.9],
        ];
        let f = |p: Point3<f64>| 2.0 * p[0] - p[1] + 3.0 * p[2] + 1.0;
        let values = [f(tet[0]), f(tet[1]), f(tet[2]), f(tet[3])];
        let g = gradient(&tet, values).unwrap();
        assert!((g[0] - 2.0).abs() < 1e-10);
        assert!((g[1] + 1.0).abs() < 1e-10);
        assert!((g[2] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn f32_precision_works() {
        let tet: [Point3<f32>; 4] = [
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let l = barycentric(&tet, [0.25, 0.25, 0.25]).unwrap();
        assert!((l[0] - 0.25).abs() < 1e-6);
        assert!((distance([0.0f32, 0.0, 0.0], [3.0, 4.0, 0.0]) - 5.0).abs() < 1e-6);
    }
}
