// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Convex spherical polygons
//!
//! A convex polygon is the intersection of the inner half-spaces of its
//! edges, which allows exact containment and intersection tests without
//! tessellation.

use std::borrow::Cow;

use nalgebra::{Vector2, Vector3};

use crate::cap::{side_half_space_contains_cap, SphericalCap};
use crate::error::{Error, Result};
use crate::mesh::{SubContour, VertexArray};
use crate::polygon::{bounding_cap_of, SphericalPolygon, SphericalPolygonBase};
use crate::sphere::{are_all_points_outside_one_side, side_half_space_contains};

/// Counter-clockwise convex contour
#[derive(Debug, Clone, PartialEq)]
pub struct SphericalConvexPolygon {
    contour: Vec<Vector3<f64>>,
}

impl SphericalConvexPolygon {
    /// Validate and wrap a contour
    pub fn new(contour: Vec<Vector3<f64>>) -> Result<Self> {
        if !Self::check_valid_contour(&contour) {
            return Err(Error::InvalidConvexContour(format!(
                "{} vertices do not form a counter-clockwise convex contour",
                contour.len()
            )));
        }
        Ok(Self { contour })
    }

    pub fn from_triangle(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> Result<Self> {
        Self::new(vec![a, b, c])
    }

    /// At least 3 vertices, and every vertex on the inner side of every edge
    /// it does not belong to
    pub fn check_valid_contour(contour: &[Vector3<f64>]) -> bool {
        let n = contour.len();
        if n < 3 {
            return false;
        }
        (0..n).all(|i| {
            let j = (i + 1) % n;
            contour
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != i && k != j)
                .all(|(_, v)| side_half_space_contains(&contour[i], &contour[j], v))
        })
    }

    #[inline]
    pub fn contour(&self) -> &[Vector3<f64>] {
        &self.contour
    }

    /// One hemisphere per edge; their intersection is the polygon
    pub fn bounding_spherical_caps(&self) -> Vec<SphericalCap> {
        let n = self.contour.len();
        (0..n)
            .map(|i| SphericalCap::new(self.contour[i].cross(&self.contour[(i + 1) % n]), 0.0))
            .collect()
    }

    pub fn contains_cap(&self, cap: &SphericalCap) -> bool {
        let n = self.contour.len();
        (0..n).all(|i| side_half_space_contains_cap(&self.contour[i], &self.contour[(i + 1) % n], cap))
    }

    /// Separating edge test on both contours
    pub fn intersects_convex_contour(&self, other: &[Vector3<f64>]) -> bool {
        !are_all_points_outside_one_side(&self.contour, other)
            && !are_all_points_outside_one_side(other, &self.contour)
    }

    pub fn to_spherical_polygon(&self) -> SphericalPolygon {
        SphericalPolygon::from_vertex_array(fan(&self.contour, None))
    }
}

/// Triangle fan from the first vertex, flagging only the contour edges
fn fan(contour: &[Vector3<f64>], tex_coords: Option<&[Vector2<f64>]>) -> VertexArray {
    let n = contour.len();
    let mut mesh = VertexArray::with_capacity(n.saturating_sub(2));
    for k in 1..n.saturating_sub(1) {
        let vertices = [contour[0], contour[k], contour[k + 1]];
        let flags = [k == 1, true, k + 1 == n - 1];
        match tex_coords {
            Some(tex) => mesh.push_textured_triangle(vertices, flags, [tex[0], tex[k], tex[k + 1]]),
            None => mesh.push_triangle(vertices, flags),
        }
    }
    mesh
}

impl SphericalPolygonBase for SphericalConvexPolygon {
    fn vertex_array(&self) -> Cow<'_, VertexArray> {
        Cow::Owned(fan(&self.contour, None))
    }

    fn as_convex(&self) -> Option<&SphericalConvexPolygon> {
        Some(self)
    }

    fn contours(&self) -> Vec<SubContour> {
        vec![SubContour::from_vertices(&self.contour)]
    }

    fn simplified_contours(&self) -> Result<Vec<SubContour>> {
        Ok(self.contours())
    }

    fn is_empty(&self) -> bool {
        self.contour.len() < 3
    }

    fn contains_point(&self, p: &Vector3<f64>) -> bool {
        let n = self.contour.len();
        (0..n).all(|i| side_half_space_contains(&self.contour[i], &self.contour[(i + 1) % n], p))
    }

    fn bounding_cap(&self) -> SphericalCap {
        bounding_cap_of(&self.contour)
    }

    fn intersects_polygon(&self, other: &dyn SphericalPolygonBase) -> Result<bool> {
        if let Some(convex) = other.as_convex() {
            return Ok(self.intersects_convex_contour(convex.contour()));
        }
        Ok(other
            .vertex_array()
            .triangles()
            .any(|tri| self.intersects_convex_contour(&tri)))
    }

    fn contains_polygon(&self, other: &dyn SphericalPolygonBase) -> Result<bool> {
        if let Some(convex) = other.as_convex() {
            return Ok(convex.contour().iter().all(|v| self.contains_point(v)));
        }
        Ok(other.vertex_array().vertices.iter().all(|v| self.contains_point(v)))
    }
}

/// Convex polygon with one texture coordinate per contour vertex
#[derive(Debug, Clone, PartialEq)]
pub struct SphericalTexturedConvexPolygon {
    polygon: SphericalConvexPolygon,
    tex_coords: Vec<Vector2<f64>>,
}

impl SphericalTexturedConvexPolygon {
    pub fn new(contour: Vec<Vector3<f64>>, tex_coords: Vec<Vector2<f64>>) -> Result<Self> {
        if contour.len() != tex_coords.len() {
            return Err(Error::InvalidTexCoords(format!(
                "{} texture coordinates for {} vertices",
                tex_coords.len(),
                contour.len()
            )));
        }
        Ok(Self {
            polygon: SphericalConvexPolygon::new(contour)?,
            tex_coords,
        })
    }

    #[inline]
    pub fn polygon(&self) -> &SphericalConvexPolygon {
        &self.polygon
    }

    #[inline]
    pub fn tex_coords(&self) -> &[Vector2<f64>] {
        &self.tex_coords
    }
}

impl SphericalPolygonBase for SphericalTexturedConvexPolygon {
    fn vertex_array(&self) -> Cow<'_, VertexArray> {
        Cow::Owned(fan(self.polygon.contour(), Some(&self.tex_coords)))
    }

    fn as_convex(&self) -> Option<&SphericalConvexPolygon> {
        Some(&self.polygon)
    }

    fn contours(&self) -> Vec<SubContour> {
        self.polygon.contours()
    }

    fn simplified_contours(&self) -> Result<Vec<SubContour>> {
        Ok(self.polygon.contours())
    }

    fn contains_point(&self, p: &Vector3<f64>) -> bool {
        self.polygon.contains_point(p)
    }

    fn bounding_cap(&self) -> SphericalCap {
        self.polygon.bounding_cap()
    }

    fn intersects_polygon(&self, other: &dyn SphericalPolygonBase) -> Result<bool> {
        self.polygon.intersects_polygon(other)
    }

    fn contains_polygon(&self, other: &dyn SphericalPolygonBase) -> Result<bool> {
        self.polygon.contains_polygon(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sphere::ra_dec_to_unit;
    use approx::assert_relative_eq;

    fn square(ra: f64, dec: f64, half: f64) -> SphericalConvexPolygon {
        SphericalConvexPolygon::new(vec![
            ra_dec_to_unit(ra - half, dec - half),
            ra_dec_to_unit(ra + half, dec - half),
            ra_dec_to_unit(ra + half, dec + half),
            ra_dec_to_unit(ra - half, dec + half),
        ])
        .unwrap()
    }

    #[test]
    fn test_square_contains_center_only() {
        let sq = square(0.0, 0.0, 5.0);
        assert!(sq.contains_point(&ra_dec_to_unit(0.0, 0.0)));
        assert!(!sq.contains_point(&ra_dec_to_unit(20.0, 20.0)));
        for v in sq.contour() {
            assert!(sq.contains_point(v));
        }
    }

    #[test]
    fn test_clockwise_contour_is_invalid() {
        let mut contour = square(0.0, 0.0, 5.0).contour().to_vec();
        contour.reverse();
        assert!(!SphericalConvexPolygon::check_valid_contour(&contour));
        assert!(matches!(
            SphericalConvexPolygon::new(contour),
            Err(Error::InvalidConvexContour(_))
        ));
    }

    #[test]
    fn test_non_convex_contour_is_invalid() {
        let dart = vec![
            ra_dec_to_unit(0.0, 0.0),
            ra_dec_to_unit(10.0, 0.0),
            ra_dec_to_unit(5.0, 2.0),
            ra_dec_to_unit(5.0, 10.0),
        ];
        assert!(!SphericalConvexPolygon::check_valid_contour(&dart));
        assert!(!SphericalConvexPolygon::check_valid_contour(&dart[..2]));
    }

    #[test]
    fn test_fan_flags_only_contour_edges() {
        let sq = square(0.0, 0.0, 5.0);
        let mesh = sq.vertex_array();
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.edge_flags, vec![true, true, false, false, true, true]);
        assert!(mesh.check_invariants(true).is_ok());

        let tri = SphericalConvexPolygon::from_triangle(
            ra_dec_to_unit(0.0, 0.0),
            ra_dec_to_unit(10.0, 0.0),
            ra_dec_to_unit(5.0, 8.0),
        )
        .unwrap();
        assert_eq!(tri.vertex_array().edge_flags, vec![true, true, true]);
    }

    #[test]
    fn test_bounding_caps_contain_polygon() {
        let sq = square(30.0, 20.0, 5.0);
        for cap in sq.bounding_spherical_caps() {
            for v in sq.contour() {
                assert!(cap.contains_point(v));
            }
            assert!(cap.contains_point(&ra_dec_to_unit(30.0, 20.0)));
        }
    }

    #[test]
    fn test_contains_cap() {
        let sq = square(0.0, 0.0, 5.0);
        let small = SphericalCap::from_radius(ra_dec_to_unit(0.0, 0.0), 2f64.to_radians());
        let large = SphericalCap::from_radius(ra_dec_to_unit(0.0, 0.0), 8f64.to_radians());
        assert!(sq.contains_cap(&small));
        assert!(!sq.contains_cap(&large));
    }

    #[test]
    fn test_convex_intersection_tests() {
        let a = square(0.0, 0.0, 5.0);
        assert!(a.intersects_polygon(&square(8.0, 0.0, 5.0)).unwrap());
        assert!(!a.intersects_polygon(&square(20.0, 0.0, 5.0)).unwrap());
        assert!(a.contains_polygon(&square(1.0, 1.0, 2.0)).unwrap());
        assert!(!a.contains_polygon(&square(4.0, 0.0, 2.0)).unwrap());
    }

    #[test]
    fn test_area_matches_general_polygon() {
        let sq = square(10.0, 40.0, 5.0);
        let general = sq.to_spherical_polygon();
        assert_relative_eq!(sq.area(), general.area(), epsilon = 1e-12);
        // a 10 x 10 degree square at the equator is a little over 0.03 sr
        let eq = square(0.0, 0.0, 5.0);
        assert!(eq.area() > 0.030 && eq.area() < 0.031);
    }

    #[test]
    fn test_textured_tex_count_must_match() {
        let contour = square(0.0, 0.0, 5.0).contour().to_vec();
        let result = SphericalTexturedConvexPolygon::new(contour.clone(), vec![Vector2::zeros(); 3]);
        assert!(matches!(result, Err(Error::InvalidTexCoords(_))));

        let tex = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
        ];
        let textured = SphericalTexturedConvexPolygon::new(contour, tex).unwrap();
        assert_eq!(textured.vertex_array().tex_coords.len(), 6);
        assert!(textured.as_convex().is_some());
    }
}
