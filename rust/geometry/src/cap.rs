// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spherical caps and single points
//!
//! A cap `(n, d)` is the half-space `{p : p . n >= d}` intersected with the
//! unit sphere. `d = -1` covers the whole sphere, `d = 0` a hemisphere and
//! `d = 1` the single point `n`.

use std::f64::consts::PI;

use nalgebra::{Rotation3, Unit, Vector3};

use crate::error::{Error, Result};
use crate::convex::SphericalConvexPolygon;
use crate::mesh::VertexArray;
use crate::polygon::{SphericalPolygon, SphericalPolygonBase};

/// Number of boundary vertices used when a cap is turned into a polygon
pub const CAP_POLYGON_STEPS: usize = 40;

/// Threshold value of a cap that contains no point at all
pub const EMPTY_CAP_D: f64 = 2.0;

/// Rounding slack on point containment
const CONTAINS_EPSILON: f64 = 1e-15;

/// Half-space `{p : p . n >= d}` on the unit sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalCap {
    /// Unit axis
    pub n: Vector3<f64>,
    /// Cosine of the angular radius
    pub d: f64,
}

impl SphericalCap {
    /// New cap around `n` (normalized if needed)
    pub fn new(n: Vector3<f64>, d: f64) -> Self {
        let len = n.norm();
        let n = if len > 0.0 { n / len } else { Vector3::new(1.0, 0.0, 0.0) };
        Self { n, d }
    }

    /// Cap of angular radius `radius` (radians) around `center`
    pub fn from_radius(center: Vector3<f64>, radius: f64) -> Self {
        Self::new(center, radius.cos())
    }

    /// Cap covering the whole sphere
    pub fn whole_sphere() -> Self {
        Self::new(Vector3::new(1.0, 0.0, 0.0), -1.0)
    }

    /// Cap containing no point, used as the bounding cap of empty regions
    pub fn empty() -> Self {
        Self::new(Vector3::new(1.0, 0.0, 0.0), EMPTY_CAP_D)
    }

    /// Angular radius in radians
    #[inline]
    pub fn radius(&self) -> f64 {
        self.d.clamp(-1.0, 1.0).acos()
    }

    /// Whether the cap covers the whole sphere
    #[inline]
    pub fn is_whole_sphere(&self) -> bool {
        self.d <= -1.0
    }

    /// Whether the cap contains no point
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.d > 1.0
    }

    /// Whether the unit vector `p` lies inside the cap, boundary included
    #[inline]
    pub fn contains_point(&self, p: &Vector3<f64>) -> bool {
        p.dot(&self.n) >= self.d - CONTAINS_EPSILON
    }

    /// Whether `h` lies entirely inside this cap
    pub fn contains_cap(&self, h: &SphericalCap) -> bool {
        if h.is_empty() {
            return true;
        }
        if self.is_empty() {
            return false;
        }
        let a = self.n.dot(&h.n) - self.d * h.d;
        self.d <= h.d && (a >= 1.0 || (a >= 0.0 && a * a >= (1.0 - self.d * self.d) * (1.0 - h.d * h.d)))
    }

    /// Whether the angle between the axes is at most the sum of both radii
    pub fn intersects_cap(&self, h: &SphericalCap) -> bool {
        if self.is_empty() || h.is_empty() {
            return false;
        }
        let a = self.d * h.d - self.n.dot(&h.n);
        self.d + h.d <= 0.0 || a <= 0.0 || (a <= 1.0 && a * a <= (1.0 - self.d * self.d) * (1.0 - h.d * h.d))
    }

    /// Whether every vertex of `contour` lies in the cap
    ///
    /// Exact for convex contours only.
    pub fn contains_convex_contour(&self, contour: &[Vector3<f64>]) -> bool {
        contour.iter().all(|v| self.contains_point(v))
    }

    /// Approximate intersection test against a convex contour
    ///
    /// A vertex inside means intersection. Otherwise a cap of at least a
    /// hemisphere is declared disjoint, and a smaller cap intersects when the
    /// inner half-space of every edge reaches it. The last step can report an
    /// intersection for a cap lying beyond a corner of the contour.
    pub fn intersects_convex_contour(&self, contour: &[Vector3<f64>]) -> bool {
        if contour.iter().any(|v| self.contains_point(v)) {
            return true;
        }
        if self.d <= 0.0 {
            return false;
        }
        let n = contour.len();
        (0..n).all(|i| side_half_space_intersects(&contour[i], &contour[(i + 1) % n], self))
    }

    /// Cap / polygon containment; only convex polygons are supported
    pub fn contains_polygon(&self, poly: &dyn SphericalPolygonBase) -> Result<bool> {
        match poly.as_convex() {
            Some(convex) => Ok(self.contains_convex_contour(convex.contour())),
            None => Err(Error::Unsupported("cap containment of a non-convex polygon")),
        }
    }

    /// Cap / polygon intersection, triangle by triangle for general polygons
    pub fn intersects_polygon(&self, poly: &dyn SphericalPolygonBase) -> bool {
        if let Some(convex) = poly.as_convex() {
            return self.intersects_convex_contour(convex.contour());
        }
        self.intersects_mesh(&poly.vertex_array())
    }

    pub(crate) fn intersects_mesh(&self, mesh: &VertexArray) -> bool {
        mesh.triangles().any(|tri| self.intersects_convex_contour(&tri))
    }

    /// Points where the boundaries of two caps cross
    ///
    /// Returns `None` for parallel axes or boundaries that do not meet. A
    /// tangent pair returns the same point twice.
    pub fn boundary_intersection(&self, h: &SphericalCap) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let c = self.n.dot(&h.n);
        let u = self.n.cross(&h.n);
        let u2 = u.norm_squared();
        if u2 < 1e-14 {
            return None;
        }
        let a = (self.d - h.d * c) / u2;
        let b = (h.d - self.d * c) / u2;
        let base = self.n * a + h.n * b;
        let t2 = (1.0 - base.norm_squared()) / u2;
        if t2 < 0.0 {
            return None;
        }
        let t = t2.sqrt();
        Some((base - u * t, base + u * t))
    }

    /// Counter-clockwise boundary polygon with `steps` vertices
    pub fn boundary_contour(&self, steps: usize) -> Vec<Vector3<f64>> {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let mut axis = self.n.cross(&x);
        if axis.norm_squared() < 0.1 {
            axis = self.n.cross(&Vector3::new(0.0, 1.0, 0.0));
        }
        let start = Rotation3::from_axis_angle(&Unit::new_normalize(axis), self.radius()) * self.n;
        let about_n = Unit::new_normalize(self.n);
        (0..steps)
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / steps as f64;
                Rotation3::from_axis_angle(&about_n, angle) * start
            })
            .collect()
    }

    /// Regular 40-gon inscribed in the boundary circle
    ///
    /// Only caps no wider than a hemisphere have a convex boundary polygon.
    pub fn to_convex_polygon(&self) -> Result<SphericalConvexPolygon> {
        if self.is_empty() || self.d < 0.0 {
            return Err(Error::InvalidCap(format!(
                "cap with d = {} has no convex boundary polygon",
                self.d
            )));
        }
        SphericalConvexPolygon::new(self.boundary_contour(CAP_POLYGON_STEPS))
    }

    /// Polygonal approximation of the cap
    ///
    /// Triangles fan out from the axis to the 40-vertex boundary, so caps
    /// wider than a hemisphere are approximated as well.
    pub fn to_spherical_polygon(&self) -> SphericalPolygon {
        if self.is_empty() {
            return SphericalPolygon::new();
        }
        if self.is_whole_sphere() {
            return SphericalPolygon::all_sky();
        }
        let boundary = self.boundary_contour(CAP_POLYGON_STEPS);
        let n = boundary.len();
        let mut mesh = VertexArray::with_capacity(n);
        for i in 0..n {
            mesh.push_triangle([self.n, boundary[i], boundary[(i + 1) % n]], [false, true, false]);
        }
        SphericalPolygon::from_vertex_array(mesh)
    }
}

/// Whether the inner half-space of the great circle `a -> b` reaches `h`
#[inline]
pub fn side_half_space_intersects(a: &Vector3<f64>, b: &Vector3<f64>, h: &SphericalCap) -> bool {
    h.intersects_cap(&SphericalCap::new(a.cross(b), 0.0))
}

/// Whether the inner half-space of the great circle `a -> b` contains `h`
#[inline]
pub fn side_half_space_contains_cap(a: &Vector3<f64>, b: &Vector3<f64>, h: &SphericalCap) -> bool {
    SphericalCap::new(a.cross(b), 0.0).contains_cap(h)
}

/// A single point of the sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalPoint {
    pub n: Vector3<f64>,
}

/// Squared distance under which two unit vectors are the same point
const POINT_EPSILON_SQ: f64 = 1e-24;

impl SphericalPoint {
    pub fn new(n: Vector3<f64>) -> Self {
        let len = n.norm();
        Self {
            n: if len > 0.0 { n / len } else { n },
        }
    }

    #[inline]
    pub fn contains_point(&self, p: &Vector3<f64>) -> bool {
        (self.n - p).norm_squared() <= POINT_EPSILON_SQ
    }

    pub fn bounding_cap(&self) -> SphericalCap {
        SphericalCap::new(self.n, 1.0)
    }
}
