// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! General spherical polygons
//!
//! A polygon is stored as a triangle mesh. Boolean operations feed the
//! contours of both operands to the tessellator with the winding rule that
//! implements the operation:
//!
//! - union: raw contours of both, `Positive`
//! - subtraction: raw contours of self plus reversed contours of other, `Positive`
//! - intersection: boundary loops of each operand as two shapes, `AbsGeqTwo`

use std::borrow::Cow;
use std::f64::consts::PI;

use nalgebra::{Vector2, Vector3};

use crate::cap::SphericalCap;
use crate::convex::SphericalConvexPolygon;
use crate::error::{Error, Result};
use crate::mesh::{report_invariant_violation, SubContour, TessVertex, VertexArray};
use crate::sphere::triangle_contains;
use crate::triangulation::{boundary_on_sphere, triangulate_on_sphere, WindingRule};

/// An uncovered area below this (steradians) counts as contained
pub const CONTAINMENT_AREA_EPSILON: f64 = 1e-10;

/// Angle between two vectors, accurate near 0 and pi
#[inline]
fn angle_between(u: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    u.cross(v).norm().atan2(u.dot(v))
}

/// Spherical excess of one triangle (Girard)
pub fn triangle_area(v1: &Vector3<f64>, v2: &Vector3<f64>, v3: &Vector3<f64>) -> f64 {
    let n12 = v1.cross(v2);
    let n23 = v2.cross(v3);
    let n31 = v3.cross(v1);
    if n12.norm() < 1e-15 || n23.norm() < 1e-15 || n31.norm() < 1e-15 {
        return 0.0;
    }
    let excess = 2.0 * PI - angle_between(&n12, &n23) - angle_between(&n23, &n31) - angle_between(&n31, &n12);
    excess.max(0.0)
}

fn tess_contours(contours: &[SubContour]) -> Vec<Vec<TessVertex>> {
    contours.iter().map(SubContour::to_tess_vertices).collect()
}

/// Operations shared by every polygon flavour
///
/// Implementors provide a triangle mesh; everything else has a default built
/// on top of it.
pub trait SphericalPolygonBase {
    /// Triangles with edge flags, covering the polygon
    fn vertex_array(&self) -> Cow<'_, VertexArray>;

    /// The convex flavour, for exact convex-only algorithms
    fn as_convex(&self) -> Option<&SphericalConvexPolygon> {
        None
    }

    /// Raw, possibly overlapping contours describing the polygon
    fn contours(&self) -> Vec<SubContour> {
        self.vertex_array().triangle_contours()
    }

    /// Minimal set of boundary loops, holes clockwise
    fn simplified_contours(&self) -> Result<Vec<SubContour>> {
        let mesh = self.vertex_array();
        if mesh.is_empty() {
            return Ok(Vec::new());
        }
        boundary_on_sphere(&[mesh.triangle_tess_contours()], WindingRule::Positive)
    }

    fn is_empty(&self) -> bool {
        self.vertex_array().is_empty()
    }

    fn contains_point(&self, p: &Vector3<f64>) -> bool {
        self.vertex_array()
            .triangles()
            .any(|[a, b, c]| triangle_contains(&a, &b, &c, p))
    }

    /// Area in steradians
    fn area(&self) -> f64 {
        self.vertex_array()
            .triangles()
            .map(|[a, b, c]| triangle_area(&a, &b, &c))
            .sum()
    }

    /// Cap enclosing every vertex, built on the two most distant vertices
    fn bounding_cap(&self) -> SphericalCap {
        bounding_cap_of(&self.vertex_array().vertices)
    }

    /// A point inside the polygon
    fn point_inside(&self) -> Option<Vector3<f64>> {
        self.vertex_array()
            .triangles()
            .next()
            .map(|[a, b, c]| (a + b + c).normalize())
    }

    fn intersection(&self, other: &dyn SphericalPolygonBase) -> Result<SphericalPolygon> {
        if self.is_empty() || other.is_empty() {
            return Ok(SphericalPolygon::new());
        }
        if !self.bounding_cap().intersects_cap(&other.bounding_cap()) {
            return Ok(SphericalPolygon::new());
        }
        let shapes = [
            tess_contours(&self.simplified_contours()?),
            tess_contours(&other.simplified_contours()?),
        ];
        let mesh = triangulate_on_sphere(&shapes, WindingRule::AbsGeqTwo, false)?;
        Ok(SphericalPolygon::from_vertex_array(mesh))
    }

    fn union(&self, other: &dyn SphericalPolygonBase) -> Result<SphericalPolygon> {
        let mut contours = tess_contours(&self.contours());
        contours.extend(tess_contours(&other.contours()));
        let mesh = triangulate_on_sphere(&[contours], WindingRule::Positive, false)?;
        Ok(SphericalPolygon::from_vertex_array(mesh))
    }

    fn subtraction(&self, other: &dyn SphericalPolygonBase) -> Result<SphericalPolygon> {
        if self.is_empty() {
            return Ok(SphericalPolygon::new());
        }
        let mut contours = tess_contours(&self.contours());
        contours.extend(other.contours().iter().map(|c| c.reversed().to_tess_vertices()));
        let mesh = triangulate_on_sphere(&[contours], WindingRule::Positive, false)?;
        Ok(SphericalPolygon::from_vertex_array(mesh))
    }

    /// Bounding cap rejection, then a non-empty intersection
    fn intersects_polygon(&self, other: &dyn SphericalPolygonBase) -> Result<bool> {
        if !self.bounding_cap().intersects_cap(&other.bounding_cap()) {
            return Ok(false);
        }
        Ok(!self.intersection(other)?.is_empty())
    }

    /// Whether the part of `other` outside this polygon has no area
    fn contains_polygon(&self, other: &dyn SphericalPolygonBase) -> Result<bool> {
        if other.is_empty() {
            return Ok(true);
        }
        let cap = self.bounding_cap();
        if !other.vertex_array().vertices.iter().all(|v| cap.contains_point(v)) {
            return Ok(false);
        }
        let covered = self.intersection(other)?.area();
        Ok(other.area() - covered < CONTAINMENT_AREA_EPSILON)
    }
}

/// Bounding cap of a vertex set
///
/// The axis bisects the most distant pair of vertices. The threshold is then
/// lowered until every vertex is inside; a cap wider than a hemisphere is
/// widened to the whole sphere, which keeps it a safe rejection test.
pub fn bounding_cap_of(vertices: &[Vector3<f64>]) -> SphericalCap {
    let Some(first) = vertices.first() else {
        return SphericalCap::empty();
    };
    let (mut p1, mut p2) = (*first, *first);
    let mut min_dot = f64::MAX;
    for (i, a) in vertices.iter().enumerate() {
        for b in &vertices[i + 1..] {
            let d = a.dot(b);
            if d < min_dot {
                min_dot = d;
                p1 = *a;
                p2 = *b;
            }
        }
    }
    let axis = p1 + p2;
    if axis.norm() < 1e-9 {
        return SphericalCap::whole_sphere();
    }
    let axis = axis.normalize();
    let d = vertices
        .iter()
        .map(|v| v.dot(&axis))
        .fold(axis.dot(&p1), f64::min)
        .min(1.0);
    if d < 0.0 {
        return SphericalCap::whole_sphere();
    }
    SphericalCap::new(axis, d)
}

/// Polygon of arbitrary shape, stored as a triangle mesh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SphericalPolygon {
    mesh: VertexArray,
}

impl SphericalPolygon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing mesh, which must satisfy the mesh invariants
    pub fn from_vertex_array(mesh: VertexArray) -> Self {
        if let Err(detail) = mesh.check_invariants(true) {
            report_invariant_violation("polygon mesh", &detail);
            return Self::new();
        }
        Self { mesh }
    }

    /// Polygon enclosed by one counter-clockwise contour
    pub fn from_contour(contour: &[Vector3<f64>]) -> Result<Self> {
        Self::from_contours(std::slice::from_ref(&contour.to_vec()))
    }

    /// Polygon with the `Positive` fill of several contours
    pub fn from_contours(contours: &[Vec<Vector3<f64>>]) -> Result<Self> {
        let contours: Vec<SubContour> = contours.iter().map(|c| SubContour::from_vertices(c)).collect();
        let mut poly = Self::new();
        poly.set_contours(&contours, WindingRule::Positive)?;
        Ok(poly)
    }

    /// Replace the mesh by the tessellation of `contours`
    pub fn set_contours(&mut self, contours: &[SubContour], rule: WindingRule) -> Result<()> {
        self.set_contour_groups(&[contours.to_vec()], rule)
    }

    /// Replace the mesh by the tessellation of several contributing shapes
    pub fn set_contour_groups(&mut self, groups: &[Vec<SubContour>], rule: WindingRule) -> Result<()> {
        for contour in groups.iter().flatten() {
            if contour.len() < 3 {
                return Err(Error::InvalidContour(format!(
                    "a contour needs at least 3 vertices, got {}",
                    contour.len()
                )));
            }
        }
        let shapes: Vec<Vec<Vec<TessVertex>>> = groups.iter().map(|g| tess_contours(g)).collect();
        self.mesh = triangulate_on_sphere(&shapes, rule, false)?;
        Ok(())
    }

    /// The whole sphere as the eight octant triangles
    pub fn all_sky() -> Self {
        let axes = [
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(-1.0, 0.0, 0.0),
            Vector3::new(0.0, -1.0, 0.0),
        ];
        let north = Vector3::new(0.0, 0.0, 1.0);
        let south = Vector3::new(0.0, 0.0, -1.0);
        let mut mesh = VertexArray::with_capacity(8);
        for i in 0..4 {
            let (a, b) = (axes[i], axes[(i + 1) % 4]);
            mesh.push_triangle([a, b, north], [false; 3]);
            mesh.push_triangle([b, a, south], [false; 3]);
        }
        Self { mesh }
    }

    #[inline]
    pub fn mesh(&self) -> &VertexArray {
        &self.mesh
    }
}

impl SphericalPolygonBase for SphericalPolygon {
    fn vertex_array(&self) -> Cow<'_, VertexArray> {
        Cow::Borrowed(&self.mesh)
    }
}

/// Polygon whose mesh carries one texture coordinate per vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SphericalTexturedPolygon {
    mesh: VertexArray,
}

impl SphericalTexturedPolygon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tessellate textured contours with the `Positive` rule
    ///
    /// Texture coordinates of vertices created by the tessellation are
    /// interpolated from the input vertices they derive from.
    pub fn from_contours(contours: &[Vec<(Vector3<f64>, Vector2<f64>)>]) -> Result<Self> {
        let mut shape = Vec::with_capacity(contours.len());
        for contour in contours {
            if contour.len() < 3 {
                return Err(Error::InvalidContour(format!(
                    "a contour needs at least 3 vertices, got {}",
                    contour.len()
                )));
            }
            shape.push(
                contour
                    .iter()
                    .map(|(v, t)| TessVertex::new(*v, *t, true))
                    .collect::<Vec<_>>(),
            );
        }
        let mesh = triangulate_on_sphere(&[shape], WindingRule::Positive, true)?;
        Ok(Self { mesh })
    }

    #[inline]
    pub fn mesh(&self) -> &VertexArray {
        &self.mesh
    }
}

impl SphericalPolygonBase for SphericalTexturedPolygon {
    fn vertex_array(&self) -> Cow<'_, VertexArray> {
        Cow::Borrowed(&self.mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sphere::ra_dec_to_unit;
    use approx::assert_relative_eq;

    fn poly(coords: &[(f64, f64)]) -> SphericalPolygon {
        let v: Vec<Vector3<f64>> = coords.iter().map(|&(ra, dec)| ra_dec_to_unit(ra, dec)).collect();
        SphericalPolygon::from_contour(&v).unwrap()
    }

    fn square(ra: f64, dec: f64, half: f64) -> SphericalPolygon {
        poly(&[
            (ra - half, dec - half),
            (ra + half, dec - half),
            (ra + half, dec + half),
            (ra - half, dec + half),
        ])
    }

    #[test]
    fn test_octant_area() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 1.0, 0.0);
        let z = Vector3::new(0.0, 0.0, 1.0);
        assert_relative_eq!(triangle_area(&x, &y, &z), PI / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_sky_area() {
        let sky = SphericalPolygon::all_sky();
        assert_relative_eq!(sky.area(), 4.0 * PI, epsilon = 1e-12);
        assert!(sky.contains_point(&ra_dec_to_unit(123.0, -45.0)));
        assert!(sky.bounding_cap().is_whole_sphere());
    }

    #[test]
    fn test_square_contains_center_not_outside() {
        let sq = square(0.0, 0.0, 5.0);
        assert!(sq.contains_point(&ra_dec_to_unit(0.0, 0.0)));
        assert!(!sq.contains_point(&ra_dec_to_unit(20.0, 20.0)));
        assert!(sq.point_inside().map_or(false, |p| sq.contains_point(&p)));
    }

    fn small_triangle() -> [Vector3<f64>; 3] {
        [ra_dec_to_unit(0.0, 0.0), ra_dec_to_unit(10.0, 0.0), ra_dec_to_unit(5.0, 8.0)]
    }

    #[cfg(not(feature = "debug_geometry"))]
    #[test]
    fn test_invalid_mesh_is_discarded() {
        let [a, b, c] = small_triangle();
        let mut valid = VertexArray::new();
        valid.push_triangle([a, b, c], [true; 3]);
        assert!(!SphericalPolygon::from_vertex_array(valid).is_empty());

        let mut inverted = VertexArray::new();
        inverted.push_triangle([a, c, b], [true; 3]);
        assert!(SphericalPolygon::from_vertex_array(inverted).is_empty());

        let mut off_sphere = VertexArray::new();
        off_sphere.push_triangle([a * 2.0, b, c], [true; 3]);
        assert!(SphericalPolygon::from_vertex_array(off_sphere).is_empty());
    }

    #[cfg(feature = "debug_geometry")]
    #[test]
    #[should_panic(expected = "polygon mesh")]
    fn test_invalid_mesh_panics_with_debug_geometry() {
        let [a, b, c] = small_triangle();
        let mut inverted = VertexArray::new();
        inverted.push_triangle([a, c, b], [true; 3]);
        let _ = SphericalPolygon::from_vertex_array(inverted);
    }

    #[test]
    fn test_too_short_contour_is_rejected() {
        let v = vec![ra_dec_to_unit(0.0, 0.0), ra_dec_to_unit(1.0, 0.0)];
        assert!(matches!(SphericalPolygon::from_contour(&v), Err(Error::InvalidContour(_))));
    }

    #[test]
    fn test_bounding_cap_encloses_vertices() {
        let tri = poly(&[(0.0, 0.0), (10.0, 0.0), (5.0, 8.0)]);
        let cap = tri.bounding_cap();
        for v in &tri.mesh().vertices {
            assert!(cap.contains_point(v));
        }
        assert!(cap.radius() < 10f64.to_radians());
        assert!(SphericalPolygon::new().bounding_cap().is_empty());
    }

    #[test]
    fn test_inclusion_exclusion() {
        let a = square(0.0, 0.0, 5.0);
        let b = square(4.0, 3.0, 5.0);
        let union = a.union(&b).unwrap();
        let inter = a.intersection(&b).unwrap();
        assert!(!inter.is_empty());
        assert_relative_eq!(union.area() + inter.area(), a.area() + b.area(), epsilon = 1e-9);
    }

    #[test]
    fn test_self_subtraction_is_empty() {
        let a = square(10.0, 10.0, 5.0);
        assert!(a.subtraction(&a).unwrap().is_empty());
    }

    #[test]
    fn test_subtraction_leaves_hole() {
        let outer = square(0.0, 0.0, 10.0);
        let inner = square(0.0, 0.0, 2.0);
        let ring = outer.subtraction(&inner).unwrap();
        assert_relative_eq!(ring.area(), outer.area() - inner.area(), epsilon = 1e-9);
        assert!(!ring.contains_point(&ra_dec_to_unit(0.0, 0.0)));
        assert!(ring.contains_point(&ra_dec_to_unit(6.0, 0.0)));
        // outer boundary plus the hole
        assert_eq!(ring.simplified_contours().unwrap().len(), 2);
    }

    #[test]
    fn test_disjoint_polygons() {
        let a = square(0.0, 0.0, 5.0);
        let b = square(60.0, 0.0, 5.0);
        assert!(a.intersection(&b).unwrap().is_empty());
        assert!(!a.intersects_polygon(&b).unwrap());
        assert_relative_eq!(a.union(&b).unwrap().area(), a.area() + b.area(), epsilon = 1e-9);
    }

    #[test]
    fn test_contains_polygon() {
        let outer = square(0.0, 0.0, 10.0);
        let inner = square(1.0, 1.0, 2.0);
        assert!(outer.contains_polygon(&inner).unwrap());
        assert!(!inner.contains_polygon(&outer).unwrap());
    }

    #[test]
    fn test_polygon_around_pole() {
        let ring: Vec<Vector3<f64>> = (0..36)
            .map(|i| ra_dec_to_unit(10.0 * i as f64 + 0.5, 70.0))
            .collect();
        let cap = SphericalPolygon::from_contour(&ring).unwrap();
        assert!(cap.contains_point(&Vector3::new(0.0, 0.0, 1.0)));
        assert!(!cap.contains_point(&ra_dec_to_unit(0.0, 60.0)));
        let exact = 2.0 * PI * (1.0 - 20f64.to_radians().cos());
        assert!((cap.area() - exact).abs() / exact < 0.01);
    }

    #[test]
    fn test_textured_polygon_interpolates() {
        let corners = [(-5.0, -5.0), (5.0, -5.0), (5.0, 5.0), (-5.0, 5.0)];
        let uv = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        let contour: Vec<(Vector3<f64>, Vector2<f64>)> = corners
            .iter()
            .zip(uv.iter())
            .map(|(&(ra, dec), &(u, v))| (ra_dec_to_unit(ra, dec), Vector2::new(u, v)))
            .collect();
        let textured = SphericalTexturedPolygon::from_contours(&[contour]).unwrap();
        assert_eq!(textured.mesh().tex_coords.len(), textured.mesh().vertices.len());
        assert!(textured.contains_point(&ra_dec_to_unit(0.0, 0.0)));
    }
}
