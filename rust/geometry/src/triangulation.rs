// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contour tessellation
//!
//! Contours on the sphere are projected through a [`Chart`] onto a plane,
//! resolved with a winding rule (i_overlay) and triangulated with earcutr.
//! Every call runs in its own [`TessSession`], which owns the scratch buffers
//! used to map planar output back to input vertices.

use nalgebra::{Vector2, Vector3};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::bool2d::{compute_signed_area, resolve_abs_geq_two, resolve_positive, Path, Shape};
use crate::error::{Error, Result};
use crate::mesh::{report_invariant_violation, EdgeVertex, SubContour, TessVertex, VertexArray};
use crate::octahedron::OctahedronContour;
use crate::sphere::is_unit;

/// Output points closer than this fraction of the chart extent to an input
/// vertex are that vertex
const MATCH_RELATIVE_TOLERANCE: f64 = 1e-7;

/// Triangles with a smaller planar area (relative to extent squared) are dropped
const DEGENERATE_RELATIVE_AREA: f64 = 1e-18;

/// Which planar areas are kept when contours overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindingRule {
    /// Winding number summed over all contours is positive
    Positive,
    /// Covered by at least two of the contributing shapes
    AbsGeqTwo,
}

/// Planar chart used to tessellate contours
pub trait Chart {
    /// 2D chart coordinates of a vertex
    fn project(&self, v: &Vector3<f64>) -> [f64; 2];

    /// Vertex moved onto the chart plane, where straight lines are edges
    fn lift(&self, v: &Vector3<f64>) -> Vector3<f64>;

    /// Bring a point of the chart plane back onto the chart's surface
    fn settle(&self, planar: Vector3<f64>) -> Vector3<f64>;

    /// Point of the chart plane with the given chart coordinates
    fn unproject(&self, q: [f64; 2]) -> Vector3<f64>;

    /// Whether settled vertices lie on the unit sphere
    fn on_sphere(&self) -> bool;
}

/// Tangent-plane (gnomonic) chart around a center direction
///
/// Great circles map to straight lines and counter-clockwise contours seen
/// from outside the sphere stay counter-clockwise in the chart.
#[derive(Debug, Clone, Copy)]
pub struct GnomonicChart {
    center: Vector3<f64>,
    e1: Vector3<f64>,
    e2: Vector3<f64>,
}

impl GnomonicChart {
    /// Smallest cosine between a vertex and the center the chart accepts
    pub const MIN_COSINE: f64 = 0.2;

    pub fn new(center: Vector3<f64>) -> Self {
        let center = center.normalize();
        let helper = if center.x.abs() < 0.9 {
            Vector3::new(1.0, 0.0, 0.0)
        } else {
            Vector3::new(0.0, 1.0, 0.0)
        };
        let e1 = center.cross(&helper).normalize();
        let e2 = center.cross(&e1);
        Self { center, e1, e2 }
    }

    /// Chart centered on the mean direction of `vertices`, if all of them are
    /// comfortably on its side of the sphere
    pub fn fitting<'a>(vertices: impl Iterator<Item = &'a Vector3<f64>> + Clone) -> Option<Self> {
        let sum: Vector3<f64> = vertices.clone().sum();
        let len = sum.norm();
        if len < 1e-9 {
            return None;
        }
        let center = sum / len;
        if vertices.into_iter().all(|v| v.dot(&center) >= Self::MIN_COSINE * v.norm()) {
            Some(Self::new(center))
        } else {
            None
        }
    }

    pub fn center(&self) -> Vector3<f64> {
        self.center
    }
}

impl Chart for GnomonicChart {
    #[inline]
    fn project(&self, v: &Vector3<f64>) -> [f64; 2] {
        let q = self.lift(v);
        [q.dot(&self.e1), q.dot(&self.e2)]
    }

    #[inline]
    fn lift(&self, v: &Vector3<f64>) -> Vector3<f64> {
        v / v.dot(&self.center)
    }

    #[inline]
    fn settle(&self, planar: Vector3<f64>) -> Vector3<f64> {
        planar.normalize()
    }

    #[inline]
    fn unproject(&self, q: [f64; 2]) -> Vector3<f64> {
        self.center + self.e1 * q[0] + self.e2 * q[1]
    }

    fn on_sphere(&self) -> bool {
        true
    }
}

/// Input edge from vertex `start` to vertex `end`
#[derive(Debug, Clone, Copy)]
struct InputSegment {
    start: usize,
    end: usize,
    flag: bool,
}

/// One planar ring of resolved output, vertices and outgoing edge flags
struct Ring {
    points: Vec<[f64; 2]>,
    vertices: Vec<TessVertex>,
}

/// Single tessellation call
///
/// Contours are added shape by shape, then the session is consumed by
/// [`triangulate`](Self::triangulate) or [`boundary`](Self::boundary).
pub struct TessSession<'c, C: Chart + ?Sized> {
    chart: &'c C,
    rule: WindingRule,
    textured: bool,
    inputs: Vec<TessVertex>,
    points: Vec<[f64; 2]>,
    segments: Vec<InputSegment>,
    groups: Vec<Vec<Path>>,
    lookup: FxHashMap<(i64, i64), SmallVec<[usize; 2]>>,
    combined: Vec<TessVertex>,
    tolerance: f64,
    extent: f64,
}

impl<'c, C: Chart + ?Sized> TessSession<'c, C> {
    pub fn new(chart: &'c C, rule: WindingRule) -> Self {
        Self {
            chart,
            rule,
            textured: false,
            inputs: Vec::new(),
            points: Vec::new(),
            segments: Vec::new(),
            groups: Vec::new(),
            lookup: FxHashMap::default(),
            combined: Vec::new(),
            tolerance: 0.0,
            extent: 0.0,
        }
    }

    /// Interpolate texture coordinates into the output mesh
    pub fn with_tex_coords(mut self) -> Self {
        self.textured = true;
        self
    }

    /// Start a new contributing shape (only meaningful for `AbsGeqTwo`)
    pub fn begin_shape(&mut self) {
        self.groups.push(Vec::new());
    }

    /// Add one closed contour to the current shape
    pub fn add_contour(&mut self, contour: &[TessVertex]) {
        if contour.len() < 3 {
            return;
        }
        if self.groups.is_empty() {
            self.begin_shape();
        }
        let base = self.inputs.len();
        let n = contour.len();
        let mut path = Vec::with_capacity(n);
        for (i, v) in contour.iter().enumerate() {
            let q = self.chart.project(&v.position);
            self.inputs.push(*v);
            self.points.push(q);
            self.segments.push(InputSegment {
                start: base + i,
                end: base + (i + 1) % n,
                flag: v.edge_flag,
            });
            path.push(q);
        }
        if let Some(group) = self.groups.last_mut() {
            group.push(path);
        }
    }

    /// Full mode: triangles with edge flags
    pub fn triangulate(mut self) -> Result<VertexArray> {
        let shapes = self.resolve();
        let mut mesh = VertexArray::new();

        for shape in &shapes {
            let rings: Vec<Ring> = shape.iter().map(|path| self.ring(path)).collect();
            self.triangulate_shape(&rings, &mut mesh)?;
        }

        tracing::debug!(
            triangles = mesh.triangle_count(),
            synthesized = self.combined.len(),
            "tessellated contours"
        );

        if let Err(detail) = mesh.check_invariants(self.chart.on_sphere()) {
            report_invariant_violation("tessellation", &detail);
            return Ok(VertexArray::new());
        }
        Ok(mesh)
    }

    /// Boundary mode: minimal loops, outer boundaries counter-clockwise and
    /// holes clockwise
    pub fn boundary(mut self) -> Result<Vec<SubContour>> {
        let shapes = self.resolve();
        let mut contours = Vec::new();
        for path in shapes.iter().flatten() {
            let ring = self.ring(path);
            contours.push(SubContour::from_edge_vertices(
                ring.vertices
                    .iter()
                    .map(|v| EdgeVertex::new(v.position, v.edge_flag))
                    .collect(),
            ));
        }

        if self.chart.on_sphere() {
            let off_sphere = contours
                .iter()
                .flat_map(|c| c.iter())
                .any(|p| !is_unit(&p.vertex));
            if off_sphere {
                report_invariant_violation("boundary extraction", "vertex off the unit sphere");
                return Ok(Vec::new());
            }
        }
        Ok(contours)
    }

    fn resolve(&mut self) -> Vec<Shape> {
        if self.points.is_empty() {
            return Vec::new();
        }
        let (mut min, mut max) = ([f64::MAX; 2], [f64::MIN; 2]);
        for p in &self.points {
            for k in 0..2 {
                min[k] = min[k].min(p[k]);
                max[k] = max[k].max(p[k]);
            }
        }
        self.extent = (max[0] - min[0]).max(max[1] - min[1]).max(f64::MIN_POSITIVE);
        self.tolerance = self.extent * MATCH_RELATIVE_TOLERANCE;

        self.lookup.clear();
        for (i, p) in self.points.iter().enumerate() {
            let key = self.cell(p);
            self.lookup.entry(key).or_default().push(i);
        }

        match self.rule {
            WindingRule::Positive => {
                let paths: Vec<Path> = self.groups.iter().flatten().cloned().collect();
                resolve_positive(&paths)
            }
            WindingRule::AbsGeqTwo => resolve_abs_geq_two(&self.groups),
        }
    }

    #[inline]
    fn cell(&self, p: &[f64; 2]) -> (i64, i64) {
        (
            (p[0] / self.tolerance).floor() as i64,
            (p[1] / self.tolerance).floor() as i64,
        )
    }

    /// Nearest input vertex within tolerance
    fn find_input(&self, q: &[f64; 2]) -> Option<usize> {
        let (cx, cy) = self.cell(q);
        let mut best: Option<(usize, f64)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = self.lookup.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &i in bucket {
                    let d = dist2(&self.points[i], q);
                    if d <= self.tolerance * self.tolerance && best.map_or(true, |(_, bd)| d < bd) {
                        best = Some((i, d));
                    }
                }
            }
        }
        best.map(|(i, _)| i)
    }

    /// Parameter along `seg` and distance of `q` to it
    fn segment_hit(&self, seg: &InputSegment, q: &[f64; 2]) -> Option<(f64, f64)> {
        let a = &self.points[seg.start];
        let b = &self.points[seg.end];
        let ab = [b[0] - a[0], b[1] - a[1]];
        let len2 = ab[0] * ab[0] + ab[1] * ab[1];
        if len2 <= 0.0 {
            return None;
        }
        let t = ((q[0] - a[0]) * ab[0] + (q[1] - a[1]) * ab[1]) / len2;
        let slack = self.tolerance / len2.sqrt();
        if t < -slack || t > 1.0 + slack {
            return None;
        }
        let t = t.clamp(0.0, 1.0);
        let foot = [a[0] + ab[0] * t, a[1] + ab[1] * t];
        let d = dist2(&foot, q).sqrt();
        (d <= self.tolerance).then_some((t, d))
    }

    /// Output vertex at chart position `q`
    fn resolve_vertex(&mut self, q: &[f64; 2]) -> TessVertex {
        if let Some(i) = self.find_input(q) {
            return self.inputs[i];
        }

        let mut hits: SmallVec<[(usize, f64, f64); 4]> = SmallVec::new();
        for (s, seg) in self.segments.iter().enumerate() {
            if let Some((t, d)) = self.segment_hit(seg, q) {
                hits.push((s, t, d));
            }
        }
        hits.sort_by(|a, b| a.2.total_cmp(&b.2));
        hits.truncate(2);

        let vertex = if hits.is_empty() {
            TessVertex::new(
                self.chart.settle(self.chart.unproject(*q)),
                Vector2::zeros(),
                true,
            )
        } else {
            // blend of up to four contributing vertices
            let share = 1.0 / hits.len() as f64;
            let mut planar = Vector3::zeros();
            let mut tex = Vector2::zeros();
            for &(s, t, _) in &hits {
                let seg = self.segments[s];
                let a = &self.inputs[seg.start];
                let b = &self.inputs[seg.end];
                let (wa, wb) = (share * (1.0 - t), share * t);
                planar += self.chart.lift(&a.position) * wa + self.chart.lift(&b.position) * wb;
                tex += a.tex_coord * wa + b.tex_coord * wb;
            }
            TessVertex::new(self.chart.settle(planar), tex, true)
        };
        self.combined.push(vertex);
        vertex
    }

    /// Whether the output edge `a -> b` lies on a flagged input edge
    fn edge_flag(&self, a: &[f64; 2], b: &[f64; 2]) -> bool {
        let mid = [(a[0] + b[0]) * 0.5, (a[1] + b[1]) * 0.5];
        self.segments
            .iter()
            .any(|seg| seg.flag && self.segment_hit(seg, &mid).is_some())
    }

    fn ring(&mut self, path: &Path) -> Ring {
        let n = path.len();
        let mut vertices = Vec::with_capacity(n);
        for i in 0..n {
            let mut v = self.resolve_vertex(&path[i]);
            v.edge_flag = self.edge_flag(&path[i], &path[(i + 1) % n]);
            vertices.push(v);
        }
        Ring {
            points: path.clone(),
            vertices,
        }
    }

    fn triangulate_shape(&self, rings: &[Ring], mesh: &mut VertexArray) -> Result<()> {
        let total: usize = rings.iter().map(|r| r.points.len()).sum();
        let mut coords = Vec::with_capacity(total * 2);
        let mut hole_indices = Vec::with_capacity(rings.len().saturating_sub(1));
        let mut points = Vec::with_capacity(total);
        let mut vertices = Vec::with_capacity(total);
        let mut next = Vec::with_capacity(total);

        for (r, ring) in rings.iter().enumerate() {
            let start = points.len();
            if r > 0 {
                hole_indices.push(start);
            }
            let n = ring.points.len();
            for i in 0..n {
                coords.push(ring.points[i][0]);
                coords.push(ring.points[i][1]);
                points.push(ring.points[i]);
                vertices.push(ring.vertices[i]);
                next.push(start + (i + 1) % n);
            }
        }

        let indices = earcutr::earcut(&coords, &hole_indices, 2)
            .map_err(|e| Error::TriangulationError(format!("{:?}", e)))?;

        let min_area = self.extent * self.extent * DEGENERATE_RELATIVE_AREA;
        for tri in indices.chunks_exact(3) {
            let (i, mut j, mut k) = (tri[0], tri[1], tri[2]);
            let area = compute_signed_area(&[points[i], points[j], points[k]]);
            if area.abs() <= min_area {
                continue;
            }
            if area < 0.0 {
                std::mem::swap(&mut j, &mut k);
            }
            let flag = |a: usize, b: usize| {
                if next[a] == b {
                    vertices[a].edge_flag
                } else if next[b] == a {
                    vertices[b].edge_flag
                } else {
                    false
                }
            };
            let tri_vertices = [vertices[i].position, vertices[j].position, vertices[k].position];
            let flags = [flag(i, j), flag(j, k), flag(k, i)];
            if self.textured {
                let tex = [vertices[i].tex_coord, vertices[j].tex_coord, vertices[k].tex_coord];
                mesh.push_textured_triangle(tri_vertices, flags, tex);
            } else {
                mesh.push_triangle(tri_vertices, flags);
            }
        }
        Ok(())
    }
}

#[inline]
fn dist2(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Tessellate shapes of contours lying on the unit sphere
///
/// Uses a single gnomonic chart when every vertex fits in one, otherwise the
/// contours are split on the octahedron and tessellated face by face.
pub fn triangulate_on_sphere(
    shapes: &[Vec<Vec<TessVertex>>],
    rule: WindingRule,
    textured: bool,
) -> Result<VertexArray> {
    let all = shapes.iter().flatten().flatten().map(|v| &v.position);
    if let Some(chart) = GnomonicChart::fitting(all) {
        let mut session = TessSession::new(&chart, rule);
        if textured {
            session = session.with_tex_coords();
        }
        feed(&mut session, shapes);
        return session.triangulate();
    }
    if textured {
        return Err(Error::Unsupported(
            "texture coordinates on contours spanning more than one chart",
        ));
    }
    let mut oct = octahedron_from_shapes(shapes);
    oct.tessellate(rule)?;
    oct.tesselated_triangles()
}

/// Boundary loops of shapes of contours lying on the unit sphere
pub fn boundary_on_sphere(shapes: &[Vec<Vec<TessVertex>>], rule: WindingRule) -> Result<Vec<SubContour>> {
    let all = shapes.iter().flatten().flatten().map(|v| &v.position);
    if let Some(chart) = GnomonicChart::fitting(all) {
        let mut session = TessSession::new(&chart, rule);
        feed(&mut session, shapes);
        return session.boundary();
    }
    octahedron_from_shapes(shapes).boundary_contours(rule)
}

fn feed<C: Chart + ?Sized>(session: &mut TessSession<'_, C>, shapes: &[Vec<Vec<TessVertex>>]) {
    for shape in shapes {
        session.begin_shape();
        for contour in shape {
            session.add_contour(contour);
        }
    }
}

fn octahedron_from_shapes(shapes: &[Vec<Vec<TessVertex>>]) -> OctahedronContour {
    let mut oct = OctahedronContour::empty();
    for shape in shapes {
        let contours: Vec<SubContour> = shape
            .iter()
            .map(|c| {
                SubContour::from_edge_vertices(
                    c.iter().map(|v| EdgeVertex::new(v.position, v.edge_flag)).collect(),
                )
            })
            .collect();
        oct.append(&OctahedronContour::from_contours(&contours));
    }
    oct
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sphere::{orientation, ra_dec_to_unit};

    fn contour(coords: &[(f64, f64)]) -> Vec<TessVertex> {
        coords
            .iter()
            .map(|&(ra, dec)| TessVertex::new(ra_dec_to_unit(ra, dec), Vector2::zeros(), true))
            .collect()
    }

    fn square(ra: f64, dec: f64, half: f64) -> Vec<TessVertex> {
        contour(&[
            (ra - half, dec - half),
            (ra + half, dec - half),
            (ra + half, dec + half),
            (ra - half, dec + half),
        ])
    }

    #[test]
    fn test_gnomonic_chart_keeps_orientation() {
        let chart = GnomonicChart::new(Vector3::new(1.0, 0.0, 0.0));
        let pts: Vec<[f64; 2]> = square(0.0, 0.0, 5.0).iter().map(|v| chart.project(&v.position)).collect();
        assert!(compute_signed_area(&pts) > 0.0);
    }

    #[test]
    fn test_gnomonic_chart_rejects_wide_contours() {
        let wide = contour(&[(0.0, 0.0), (120.0, 0.0), (240.0, 0.0)]);
        assert!(GnomonicChart::fitting(wide.iter().map(|v| &v.position)).is_none());
        let small = square(10.0, 10.0, 5.0);
        assert!(GnomonicChart::fitting(small.iter().map(|v| &v.position)).is_some());
    }

    #[test]
    fn test_triangulate_square() {
        let mesh = triangulate_on_sphere(&[vec![square(0.0, 0.0, 5.0)]], WindingRule::Positive, false).unwrap();
        assert_eq!(mesh.triangle_count(), 2);
        for [a, b, c] in mesh.triangles() {
            assert!(orientation(&a, &b, &c) > 0.0);
        }
        // the diagonal is the only interior edge
        assert_eq!(mesh.edge_flags.iter().filter(|f| **f).count(), 4);
    }

    #[test]
    fn test_reversed_contour_is_dropped_by_positive() {
        let mut rev = square(0.0, 0.0, 5.0);
        rev.reverse();
        let mesh = triangulate_on_sphere(&[vec![rev]], WindingRule::Positive, false).unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_intersection_synthesizes_unit_vertices() {
        let shapes = vec![vec![square(0.0, 0.0, 5.0)], vec![square(5.0, 5.0, 5.0)]];
        let mesh = triangulate_on_sphere(&shapes, WindingRule::AbsGeqTwo, false).unwrap();
        assert!(!mesh.is_empty());
        assert!(mesh.check_invariants(true).is_ok());
        // the overlap has an input corner of each square
        assert!(mesh.vertices.iter().any(|v| (v - ra_dec_to_unit(0.0, 0.0)).norm() < 1e-6));
        assert!(mesh.vertices.iter().any(|v| (v - ra_dec_to_unit(5.0, 5.0)).norm() < 1e-6));
    }

    #[test]
    fn test_boundary_of_two_triangles_is_one_loop() {
        let a = contour(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let b = contour(&[(0.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let loops = boundary_on_sphere(&[vec![a, b]], WindingRule::Positive).unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].len(), 4);
        assert!(loops[0].iter().all(|p| p.edge_flag));
    }

    #[test]
    fn test_seam_flags_survive() {
        let mut tri = contour(&[(0.0, 0.0), (10.0, 0.0), (5.0, 8.0)]);
        tri[1].edge_flag = false;
        let loops = boundary_on_sphere(&[vec![tri]], WindingRule::Positive).unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].iter().filter(|p| !p.edge_flag).count(), 1);
    }

    #[test]
    fn test_tex_coords_are_carried() {
        let mut quad = square(0.0, 0.0, 5.0);
        let uv = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        for (v, (u, w)) in quad.iter_mut().zip(uv) {
            v.tex_coord = Vector2::new(u, w);
        }
        let mesh = triangulate_on_sphere(&[vec![quad]], WindingRule::Positive, true).unwrap();
        assert_eq!(mesh.tex_coords.len(), mesh.vertices.len());
        assert!(mesh.tex_coords.iter().any(|t| (t - Vector2::new(1.0, 1.0)).norm() < 1e-12));
    }
}
