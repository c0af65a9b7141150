// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Unit-sphere vector helpers
//!
//! Directed edges follow one convention everywhere in the crate: the inner
//! side of the edge `a -> b` is the half-space `(a x b) . p >= 0`, so contours
//! are counter-clockwise when seen from outside the sphere.

use nalgebra::Vector3;

/// Maximum deviation from unit length accepted for sphere vertices
pub const UNIT_TOLERANCE: f64 = 1e-6;

/// Slack on half-space side tests
const SIDE_EPSILON: f64 = 1e-17;

/// Cross products shorter than this are treated as parallel vectors
const PARALLEL_EPSILON: f64 = 1e-7;

/// Convert longitude/latitude in radians to a unit vector
#[inline]
pub fn sphe_to_rect(lng: f64, lat: f64) -> Vector3<f64> {
    let cos_lat = lat.cos();
    Vector3::new(lng.cos() * cos_lat, lng.sin() * cos_lat, lat.sin())
}

/// Convert a vector to longitude/latitude in radians
#[inline]
pub fn rect_to_sphe(v: &Vector3<f64>) -> (f64, f64) {
    let norm = v.norm();
    let lat = if norm > 0.0 { (v.z / norm).clamp(-1.0, 1.0).asin() } else { 0.0 };
    (v.y.atan2(v.x), lat)
}

/// Convert right ascension/declination in degrees to a unit vector
#[inline]
pub fn ra_dec_to_unit(ra_deg: f64, dec_deg: f64) -> Vector3<f64> {
    sphe_to_rect(ra_deg.to_radians(), dec_deg.to_radians())
}

/// Convert a vector to right ascension/declination in degrees
#[inline]
pub fn unit_to_ra_dec(v: &Vector3<f64>) -> (f64, f64) {
    let (lng, lat) = rect_to_sphe(v);
    (lng.to_degrees(), lat.to_degrees())
}

/// Whether `p` lies on the inner side of the great circle through `a -> b`
#[inline]
pub fn side_half_space_contains(a: &Vector3<f64>, b: &Vector3<f64>, p: &Vector3<f64>) -> bool {
    a.cross(b).dot(p) >= -SIDE_EPSILON
}

/// Whether `p` lies inside the spherical triangle `(v0, v1, v2)`
#[inline]
pub fn triangle_contains(
    v0: &Vector3<f64>,
    v1: &Vector3<f64>,
    v2: &Vector3<f64>,
    p: &Vector3<f64>,
) -> bool {
    side_half_space_contains(v0, v1, p)
        && side_half_space_contains(v1, v2, p)
        && side_half_space_contains(v2, v0, p)
}

/// Signed volume `v0 . (v1 x v2)`, non-negative for well oriented triangles
#[inline]
pub fn orientation(v0: &Vector3<f64>, v1: &Vector3<f64>, v2: &Vector3<f64>) -> f64 {
    v0.dot(&v1.cross(v2))
}

/// Whether some edge of the convex contour `contour` has every point of
/// `points` strictly on its outer side
pub fn are_all_points_outside_one_side(contour: &[Vector3<f64>], points: &[Vector3<f64>]) -> bool {
    let n = contour.len();
    (0..n).any(|i| {
        let a = &contour[i];
        let b = &contour[(i + 1) % n];
        points.iter().all(|p| !side_half_space_contains(a, b, p))
    })
}

/// Intersection of the great-circle arc `p1 -> p2` with the plane through the
/// origin of normal `n2`
///
/// Returns the intersection point closest to the arc, or `None` when the arc
/// is degenerate or its great circle coincides with the plane.
pub fn great_circle_intersection(
    p1: &Vector3<f64>,
    p2: &Vector3<f64>,
    n2: &Vector3<f64>,
) -> Option<Vector3<f64>> {
    let n1 = p1.cross(p2);
    if n1.norm() < f64::EPSILON {
        return None;
    }
    let u = n1.normalize().cross(n2);
    let len = u.norm();
    if len < PARALLEL_EPSILON {
        return None;
    }
    let u = u / len;
    let mid = p1 + p2;
    if mid.dot(&u) >= 0.0 {
        Some(u)
    } else {
        Some(-u)
    }
}

/// Whether a vector has unit length within [`UNIT_TOLERANCE`]
#[inline]
pub fn is_unit(v: &Vector3<f64>) -> bool {
    (v.norm() - 1.0).abs() <= UNIT_TOLERANCE
}
