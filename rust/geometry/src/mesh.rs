// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contour and triangle mesh data structures

use std::fmt;

use nalgebra::{Vector2, Vector3};

use crate::sphere::{is_unit, orientation};

/// Triangles with a signed volume below this are considered inverted
pub const ORIENTATION_TOLERANCE: f64 = 1e-12;

/// A contour vertex and whether the edge leaving it is a real boundary edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeVertex {
    pub vertex: Vector3<f64>,
    /// False when the edge to the next vertex is an artificial seam
    pub edge_flag: bool,
}

impl EdgeVertex {
    #[inline]
    pub fn new(vertex: Vector3<f64>, edge_flag: bool) -> Self {
        Self { vertex, edge_flag }
    }
}

/// A closed loop of [`EdgeVertex`], implicitly joined from last to first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubContour {
    points: Vec<EdgeVertex>,
}

impl SubContour {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Closed contour where every edge is a true boundary edge
    pub fn from_vertices(vertices: &[Vector3<f64>]) -> Self {
        Self {
            points: vertices.iter().map(|v| EdgeVertex::new(*v, true)).collect(),
        }
    }

    pub fn from_edge_vertices(points: Vec<EdgeVertex>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn push(&mut self, point: EdgeVertex) {
        self.points.push(point);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[EdgeVertex] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [EdgeVertex] {
        &mut self.points
    }

    pub fn iter(&self) -> impl Iterator<Item = &EdgeVertex> {
        self.points.iter()
    }

    pub fn vertices(&self) -> Vec<Vector3<f64>> {
        self.points.iter().map(|p| p.vertex).collect()
    }

    /// The same loop walked backwards
    ///
    /// Each flag stays attached to the edge it describes: the reversed edge
    /// `v[i+1] -> v[i]` carries the flag of `v[i] -> v[i+1]`.
    pub fn reversed(&self) -> Self {
        let n = self.points.len();
        let points = (0..n)
            .map(|i| {
                let src = n - 1 - i;
                let edge = (src + n - 1) % n;
                EdgeVertex::new(self.points[src].vertex, self.points[edge].edge_flag)
            })
            .collect();
        Self { points }
    }

    pub(crate) fn to_tess_vertices(&self) -> Vec<TessVertex> {
        self.points
            .iter()
            .map(|p| TessVertex::new(p.vertex, Vector2::zeros(), p.edge_flag))
            .collect()
    }
}

impl fmt::Display for SubContour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, p) in self.points.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "[{:.6}, {:.6}, {:.6}, {}]",
                p.vertex.x, p.vertex.y, p.vertex.z, p.edge_flag
            )?;
        }
        write!(f, "]")
    }
}

/// Vertex handed to and returned by the tessellation adapter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TessVertex {
    pub position: Vector3<f64>,
    /// Auxiliary interpolated data, zero when unused
    pub tex_coord: Vector2<f64>,
    pub edge_flag: bool,
}

impl TessVertex {
    #[inline]
    pub fn new(position: Vector3<f64>, tex_coord: Vector2<f64>, edge_flag: bool) -> Self {
        Self {
            position,
            tex_coord,
            edge_flag,
        }
    }
}

/// Flat triangle list with per-vertex edge flags and optional texture
/// coordinates
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexArray {
    /// Three consecutive vertices per triangle
    pub vertices: Vec<Vector3<f64>>,
    /// Flag `k` describes the edge from vertex `k` to the next vertex of the
    /// same triangle
    pub edge_flags: Vec<bool>,
    /// Either empty or parallel to `vertices`
    pub tex_coords: Vec<Vector2<f64>>,
}

impl VertexArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(triangle_count * 3),
            edge_flags: Vec::with_capacity(triangle_count * 3),
            tex_coords: Vec::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    #[inline]
    pub fn has_tex_coords(&self) -> bool {
        !self.tex_coords.is_empty()
    }

    pub fn push_triangle(&mut self, vertices: [Vector3<f64>; 3], flags: [bool; 3]) {
        self.vertices.extend_from_slice(&vertices);
        self.edge_flags.extend_from_slice(&flags);
    }

    pub fn push_textured_triangle(
        &mut self,
        vertices: [Vector3<f64>; 3],
        flags: [bool; 3],
        tex_coords: [Vector2<f64>; 3],
    ) {
        self.push_triangle(vertices, flags);
        self.tex_coords.extend_from_slice(&tex_coords);
    }

    /// Iterate over triangles as vertex triples
    pub fn triangles(&self) -> impl Iterator<Item = [Vector3<f64>; 3]> + '_ {
        self.vertices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }

    /// One closed contour per triangle, flags included
    pub fn triangle_contours(&self) -> Vec<SubContour> {
        self.vertices
            .chunks_exact(3)
            .zip(self.edge_flags.chunks_exact(3))
            .map(|(v, f)| {
                SubContour::from_edge_vertices(
                    (0..3).map(|k| EdgeVertex::new(v[k], f[k])).collect(),
                )
            })
            .collect()
    }

    /// Triangles as adapter vertices, texture coordinates included
    pub(crate) fn triangle_tess_contours(&self) -> Vec<Vec<TessVertex>> {
        (0..self.triangle_count())
            .map(|t| {
                (0..3)
                    .map(|k| {
                        let i = t * 3 + k;
                        let tex = self.tex_coords.get(i).copied().unwrap_or_else(Vector2::zeros);
                        TessVertex::new(self.vertices[i], tex, self.edge_flags[i])
                    })
                    .collect()
            })
            .collect()
    }

    /// Append another mesh (texture coordinates are kept only if both have them)
    pub fn merge(&mut self, other: &VertexArray) {
        let keep_tex = (self.is_empty() || self.has_tex_coords()) && other.has_tex_coords();
        if !keep_tex {
            self.tex_coords.clear();
        }
        self.vertices.extend_from_slice(&other.vertices);
        self.edge_flags.extend_from_slice(&other.edge_flags);
        if keep_tex {
            self.tex_coords.extend_from_slice(&other.tex_coords);
        }
    }

    /// Project every vertex back onto the unit sphere
    pub fn normalize_vertices(&mut self) {
        for v in &mut self.vertices {
            let n = v.norm();
            if n > 0.0 {
                *v /= n;
            }
        }
    }

    /// Check the mesh invariants, describing the first violation found
    pub fn check_invariants(&self, on_sphere: bool) -> std::result::Result<(), String> {
        if self.vertices.len() % 3 != 0 {
            return Err(format!(
                "vertex count {} is not a multiple of 3",
                self.vertices.len()
            ));
        }
        if self.edge_flags.len() != self.vertices.len() {
            return Err(format!(
                "{} edge flags for {} vertices",
                self.edge_flags.len(),
                self.vertices.len()
            ));
        }
        if !self.tex_coords.is_empty() && self.tex_coords.len() != self.vertices.len() {
            return Err(format!(
                "{} texture coordinates for {} vertices",
                self.tex_coords.len(),
                self.vertices.len()
            ));
        }
        for (i, [a, b, c]) in self.triangles().enumerate() {
            if on_sphere && !(is_unit(&a) && is_unit(&b) && is_unit(&c)) {
                return Err(format!("triangle {} has a vertex off the unit sphere", i));
            }
            let det = orientation(&a, &b, &c);
            if det < -ORIENTATION_TOLERANCE {
                return Err(format!("triangle {} is inverted (det = {:e})", i, det));
            }
        }
        Ok(())
    }
}

/// Report a broken geometric invariant
///
/// Panics when the `debug_geometry` feature is enabled, otherwise logs a
/// warning and lets the caller discard the offending result.
pub(crate) fn report_invariant_violation(context: &str, detail: &str) {
    if cfg!(feature = "debug_geometry") {
        panic!("{}: {}", context, detail);
    }
    tracing::warn!(context, detail, "geometric invariant violated, result discarded");
}
