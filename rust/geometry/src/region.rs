// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed set of region kinds and the operations between any two of them
//!
//! Binary predicates dispatch on both operands. Caps and points keep their
//! exact algorithms; any other pair falls back to general polygons.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::cap::{SphericalCap, SphericalPoint};
use crate::convex::{SphericalConvexPolygon, SphericalTexturedConvexPolygon};
use crate::error::Result;
use crate::polygon::{SphericalPolygon, SphericalPolygonBase, SphericalTexturedPolygon};

/// Type tag of a region, as written in the map representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RegionType {
    Empty,
    Point,
    Cap,
    Polygon,
    #[serde(rename = "CVXPOLYGON")]
    ConvexPolygon,
    #[serde(rename = "ALLSKY")]
    AllSky,
}

impl RegionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionType::Empty => "EMPTY",
            RegionType::Point => "POINT",
            RegionType::Cap => "CAP",
            RegionType::Polygon => "POLYGON",
            RegionType::ConvexPolygon => "CVXPOLYGON",
            RegionType::AllSky => "ALLSKY",
        }
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A region of the unit sphere
#[derive(Debug, Clone, PartialEq)]
pub enum SphericalRegion {
    Empty,
    Point(SphericalPoint),
    Cap(SphericalCap),
    Polygon(SphericalPolygon),
    TexturedPolygon(SphericalTexturedPolygon),
    ConvexPolygon(SphericalConvexPolygon),
    TexturedConvexPolygon(SphericalTexturedConvexPolygon),
    AllSky,
}

impl SphericalRegion {
    /// Cap of angular `radius` (radians) around `center`
    pub fn cap_from_radius(center: Vector3<f64>, radius: f64) -> Self {
        if radius >= PI {
            return SphericalRegion::AllSky;
        }
        SphericalRegion::Cap(SphericalCap::from_radius(center, radius.max(0.0)))
    }

    /// Wrap a polygon, mapping an empty mesh to [`SphericalRegion::Empty`]
    pub fn from_polygon(polygon: SphericalPolygon) -> Self {
        if polygon.is_empty() {
            SphericalRegion::Empty
        } else {
            SphericalRegion::Polygon(polygon)
        }
    }

    /// Kind of the region, textured flavours reported as their plain kind
    pub fn region_type(&self) -> RegionType {
        match self {
            SphericalRegion::Empty => RegionType::Empty,
            SphericalRegion::Point(_) => RegionType::Point,
            SphericalRegion::Cap(_) => RegionType::Cap,
            SphericalRegion::Polygon(_) | SphericalRegion::TexturedPolygon(_) => RegionType::Polygon,
            SphericalRegion::ConvexPolygon(_) | SphericalRegion::TexturedConvexPolygon(_) => {
                RegionType::ConvexPolygon
            }
            SphericalRegion::AllSky => RegionType::AllSky,
        }
    }

    /// The polygon flavours, seen through the shared polygon interface
    pub fn as_polygon_base(&self) -> Option<&dyn SphericalPolygonBase> {
        match self {
            SphericalRegion::Polygon(p) => Some(p),
            SphericalRegion::TexturedPolygon(p) => Some(p),
            SphericalRegion::ConvexPolygon(p) => Some(p),
            SphericalRegion::TexturedConvexPolygon(p) => Some(p),
            _ => None,
        }
    }

    /// Whether the region contains no point
    pub fn is_empty(&self) -> bool {
        match self {
            SphericalRegion::Empty => true,
            SphericalRegion::Cap(c) => c.is_empty(),
            other => other.as_polygon_base().is_some_and(|p| p.is_empty()),
        }
    }

    /// Whether the unit vector `p` lies inside the region
    pub fn contains_point(&self, p: &Vector3<f64>) -> bool {
        match self {
            SphericalRegion::Empty => false,
            SphericalRegion::Point(point) => point.contains_point(p),
            SphericalRegion::Cap(cap) => cap.contains_point(p),
            SphericalRegion::AllSky => true,
            other => other.as_polygon_base().is_some_and(|poly| poly.contains_point(p)),
        }
    }

    /// Whether `other` lies entirely inside this region
    ///
    /// Nothing contains the empty region. A cap cannot test containment of a
    /// non-convex polygon and returns [`Error::Unsupported`](crate::Error).
    pub fn contains(&self, other: &SphericalRegion) -> Result<bool> {
        if other.is_empty() || self.is_empty() {
            return Ok(false);
        }
        match (self, other) {
            (SphericalRegion::AllSky, _) => Ok(true),
            (_, SphericalRegion::Point(p)) => Ok(self.contains_point(&p.n)),
            (SphericalRegion::Point(p), SphericalRegion::Cap(c)) => Ok(c.d >= 1.0 && p.contains_point(&c.n)),
            (SphericalRegion::Point(_), _) => Ok(false),
            (SphericalRegion::Cap(c), SphericalRegion::AllSky) => Ok(c.is_whole_sphere()),
            (SphericalRegion::Cap(c), SphericalRegion::Cap(h)) => Ok(c.contains_cap(h)),
            (SphericalRegion::Cap(c), _) => match other.as_polygon_base() {
                Some(poly) => c.contains_polygon(poly),
                None => Ok(false),
            },
            (_, SphericalRegion::AllSky) => match self.as_polygon_base() {
                Some(poly) => poly.contains_polygon(&SphericalPolygon::all_sky()),
                None => Ok(false),
            },
            (_, SphericalRegion::Cap(h)) => match self.as_polygon_base() {
                Some(poly) => match poly.as_convex() {
                    Some(convex) => Ok(convex.contains_cap(h)),
                    None => poly.contains_polygon(&h.to_spherical_polygon()),
                },
                None => Ok(false),
            },
            _ => match (self.as_polygon_base(), other.as_polygon_base()) {
                (Some(a), Some(b)) => a.contains_polygon(b),
                _ => Ok(false),
            },
        }
    }

    /// Whether the two regions share at least one point
    pub fn intersects(&self, other: &SphericalRegion) -> Result<bool> {
        if self.is_empty() || other.is_empty() {
            return Ok(false);
        }
        match (self, other) {
            (SphericalRegion::AllSky, _) | (_, SphericalRegion::AllSky) => Ok(true),
            (SphericalRegion::Point(p), region) | (region, SphericalRegion::Point(p)) => {
                Ok(region.contains_point(&p.n))
            }
            (SphericalRegion::Cap(a), SphericalRegion::Cap(b)) => Ok(a.intersects_cap(b)),
            (SphericalRegion::Cap(cap), region) | (region, SphericalRegion::Cap(cap)) => {
                Ok(region.as_polygon_base().is_some_and(|poly| cap.intersects_polygon(poly)))
            }
            _ => match (self.as_polygon_base(), other.as_polygon_base()) {
                (Some(a), Some(b)) => a.intersects_polygon(b),
                _ => Ok(false),
            },
        }
    }

    /// Cap enclosing the region, empty for the empty region
    pub fn bounding_cap(&self) -> SphericalCap {
        match self {
            SphericalRegion::Empty => SphericalCap::empty(),
            SphericalRegion::Point(p) => p.bounding_cap(),
            SphericalRegion::Cap(c) => *c,
            SphericalRegion::AllSky => SphericalCap::whole_sphere(),
            other => match other.as_polygon_base() {
                Some(poly) => poly.bounding_cap(),
                None => SphericalCap::empty(),
            },
        }
    }

    /// Area in steradians
    pub fn area(&self) -> f64 {
        match self {
            SphericalRegion::Empty | SphericalRegion::Point(_) => 0.0,
            SphericalRegion::Cap(c) if c.is_empty() => 0.0,
            SphericalRegion::Cap(c) => 2.0 * PI * (1.0 - c.d.max(-1.0)),
            SphericalRegion::AllSky => 4.0 * PI,
            other => other.as_polygon_base().map_or(0.0, |p| p.area()),
        }
    }

    /// A point of the region, `None` for the empty region
    pub fn point_inside(&self) -> Option<Vector3<f64>> {
        match self {
            SphericalRegion::Empty => None,
            SphericalRegion::Point(p) => Some(p.n),
            SphericalRegion::Cap(c) if c.is_empty() => None,
            SphericalRegion::Cap(c) => Some(c.n),
            SphericalRegion::AllSky => Some(Vector3::new(1.0, 0.0, 0.0)),
            other => other.as_polygon_base().and_then(|p| p.point_inside()),
        }
    }

    /// General polygon covering the region; a point has no area and converts
    /// to the empty polygon
    pub fn to_spherical_polygon(&self) -> SphericalPolygon {
        match self {
            SphericalRegion::Empty | SphericalRegion::Point(_) => SphericalPolygon::new(),
            SphericalRegion::Cap(c) => c.to_spherical_polygon(),
            SphericalRegion::Polygon(p) => p.clone(),
            SphericalRegion::TexturedPolygon(p) => {
                let mut mesh = p.mesh().clone();
                mesh.tex_coords.clear();
                SphericalPolygon::from_vertex_array(mesh)
            }
            SphericalRegion::ConvexPolygon(p) => p.to_spherical_polygon(),
            SphericalRegion::TexturedConvexPolygon(p) => p.polygon().to_spherical_polygon(),
            SphericalRegion::AllSky => SphericalPolygon::all_sky(),
        }
    }

    /// Bounding cap widened by `margin` radians
    pub fn enlarged(&self, margin: f64) -> SphericalRegion {
        let cap = self.bounding_cap();
        if cap.is_empty() {
            return SphericalRegion::Empty;
        }
        if cap.is_whole_sphere() || margin >= PI {
            return SphericalRegion::AllSky;
        }
        SphericalRegion::cap_from_radius(cap.n, cap.radius() + margin)
    }

    /// Points inside both `a` and `b`
    pub fn intersection(a: &SphericalRegion, b: &SphericalRegion) -> Result<SphericalRegion> {
        match (a, b) {
            (SphericalRegion::Empty, _) | (_, SphericalRegion::Empty) => Ok(SphericalRegion::Empty),
            (SphericalRegion::AllSky, SphericalRegion::AllSky) => Ok(SphericalRegion::AllSky),
            (SphericalRegion::AllSky, other) | (other, SphericalRegion::AllSky) => Ok(other.clone()),
            _ => combine(a, b, |x, y| x.intersection(y)),
        }
    }

    /// Points inside `a` or `b`
    pub fn union(a: &SphericalRegion, b: &SphericalRegion) -> Result<SphericalRegion> {
        match (a, b) {
            (SphericalRegion::AllSky, _) | (_, SphericalRegion::AllSky) => Ok(SphericalRegion::AllSky),
            (SphericalRegion::Empty, other) | (other, SphericalRegion::Empty) => Ok(other.clone()),
            _ => combine(a, b, |x, y| x.union(y)),
        }
    }

    /// Points inside `a` and outside `b`
    pub fn subtraction(a: &SphericalRegion, b: &SphericalRegion) -> Result<SphericalRegion> {
        match (a, b) {
            (SphericalRegion::Empty, _) | (_, SphericalRegion::AllSky) => Ok(SphericalRegion::Empty),
            (_, SphericalRegion::Empty) => Ok(a.clone()),
            _ => combine(a, b, |x, y| x.subtraction(y)),
        }
    }
}

/// Run a polygon operation on two regions, converting non-polygon operands
fn combine<F>(a: &SphericalRegion, b: &SphericalRegion, op: F) -> Result<SphericalRegion>
where
    F: Fn(&dyn SphericalPolygonBase, &dyn SphericalPolygonBase) -> Result<SphericalPolygon>,
{
    let converted_a;
    let lhs: &dyn SphericalPolygonBase = match a.as_polygon_base() {
        Some(p) => p,
        None => {
            converted_a = a.to_spherical_polygon();
            &converted_a
        }
    };
    let converted_b;
    let rhs: &dyn SphericalPolygonBase = match b.as_polygon_base() {
        Some(p) => p,
        None => {
            converted_b = b.to_spherical_polygon();
            &converted_b
        }
    };
    Ok(SphericalRegion::from_polygon(op(lhs, rhs)?))
}

impl From<SphericalPoint> for SphericalRegion {
    fn from(point: SphericalPoint) -> Self {
        SphericalRegion::Point(point)
    }
}

impl From<SphericalCap> for SphericalRegion {
    fn from(cap: SphericalCap) -> Self {
        if cap.is_empty() {
            SphericalRegion::Empty
        } else if cap.is_whole_sphere() {
            SphericalRegion::AllSky
        } else {
            SphericalRegion::Cap(cap)
        }
    }
}

impl From<SphericalConvexPolygon> for SphericalRegion {
    fn from(polygon: SphericalConvexPolygon) -> Self {
        SphericalRegion::ConvexPolygon(polygon)
    }
}

impl From<SphericalTexturedConvexPolygon> for SphericalRegion {
    fn from(polygon: SphericalTexturedConvexPolygon) -> Self {
        SphericalRegion::TexturedConvexPolygon(polygon)
    }
}

impl From<SphericalPolygon> for SphericalRegion {
    fn from(polygon: SphericalPolygon) -> Self {
        SphericalRegion::from_polygon(polygon)
    }
}

impl From<SphericalTexturedPolygon> for SphericalRegion {
    fn from(polygon: SphericalTexturedPolygon) -> Self {
        if polygon.is_empty() {
            SphericalRegion::Empty
        } else {
            SphericalRegion::TexturedPolygon(polygon)
        }
    }
}
