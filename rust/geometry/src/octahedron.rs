// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Octahedron representation of spherical contours
//!
//! Contours are cut along the three coordinate planes into the eight octants
//! of the sphere. Each octant piece is projected onto the matching face of
//! the octahedron `|x| + |y| + |z| = 1`, where it can be tessellated with a
//! planar chart without running into poles or the antimeridian.
//!
//! Face `i` has center `FACE_CENTERS[i]`, indexed as
//! `4 * [y <= 0] + 2 * [x <= 0] + [z <= 0]`.

use std::borrow::Cow;

use nalgebra::Vector3;

use crate::error::Result;
use crate::mesh::{report_invariant_violation, EdgeVertex, SubContour, VertexArray};
use crate::sphere::great_circle_intersection;
use crate::triangulation::{Chart, TessSession, WindingRule};

/// Face centers (unnormalized face normals) in face index order
pub const FACE_CENTERS: [[f64; 3]; 8] = [
    [1.0, 1.0, 1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [-1.0, 1.0, -1.0],
    [1.0, -1.0, 1.0],
    [1.0, -1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [-1.0, -1.0, -1.0],
];

/// Coordinates closer than this to a splitting plane lie on it
const PLANE_EPSILON: f64 = 1e-9;

/// Squared distance under which consecutive contour vertices are merged
const DUPLICATE_EPSILON2: f64 = 1e-24;

/// Seams whose ends are closer to antipodal than this need a midpoint
const ANTIPODAL_EPSILON: f64 = 1e-9;

/// Minimum |z| of `first x last` for an open piece to be closed through a pole
const POLE_EPSILON: f64 = 1e-7;

const X: usize = 0;
const Y: usize = 1;
const Z: usize = 2;

fn face_center(face: usize) -> Vector3<f64> {
    let c = FACE_CENTERS[face];
    Vector3::new(c[0], c[1], c[2])
}

/// Planar chart of one octahedron face
///
/// Points live on the face plane `f . p = 1`; chart coordinates are `(x, y)`,
/// with `y` mirrored on the southern faces so orientation is preserved.
#[derive(Debug, Clone, Copy)]
pub struct FaceChart {
    f: Vector3<f64>,
}

impl FaceChart {
    pub fn new(face: usize) -> Self {
        Self {
            f: face_center(face),
        }
    }
}

impl Chart for FaceChart {
    #[inline]
    fn project(&self, v: &Vector3<f64>) -> [f64; 2] {
        let q = self.lift(v);
        if self.f.z > 0.0 {
            [q.x, q.y]
        } else {
            [q.x, -q.y]
        }
    }

    #[inline]
    fn lift(&self, v: &Vector3<f64>) -> Vector3<f64> {
        v / self.f.dot(v)
    }

    #[inline]
    fn settle(&self, planar: Vector3<f64>) -> Vector3<f64> {
        self.lift(&planar)
    }

    fn unproject(&self, q: [f64; 2]) -> Vector3<f64> {
        let x = q[0];
        let y = if self.f.z > 0.0 { q[1] } else { -q[1] };
        let z = (1.0 - self.f.x * x - self.f.y * y) / self.f.z;
        Vector3::new(x, y, z)
    }

    fn on_sphere(&self) -> bool {
        false
    }
}

/// Contour piece produced while splitting, `open` once it has been cut
#[derive(Debug, Clone)]
struct Piece {
    contour: SubContour,
    open: bool,
}

/// Point where the edge `a -> b` crosses the coordinate plane `axis = 0`
fn plane_crossing(a: &Vector3<f64>, b: &Vector3<f64>, axis: usize) -> Vector3<f64> {
    let mut normal = Vector3::zeros();
    normal[axis] = 1.0;
    let mut p = great_circle_intersection(a, b, &normal).unwrap_or_else(|| {
        let t = a[axis] / (a[axis] - b[axis]);
        (a + (b - a) * t).normalize()
    });
    p[axis] = 0.0;
    p
}

/// Side of a vertex relative to the plane `axis = 0`: 1, -1, or 0 on it
#[inline]
fn plane_sign(v: &Vector3<f64>, axis: usize) -> i8 {
    if v[axis] > PLANE_EPSILON {
        1
    } else if v[axis] < -PLANE_EPSILON {
        -1
    } else {
        0
    }
}

#[inline]
fn side_index(sign: i8) -> usize {
    if sign > 0 {
        0
    } else {
        1
    }
}

/// Merge runs of repeated vertices, wrap-around included
///
/// The kept vertex takes the flag of the last edge of its run, the only one
/// with a length.
fn dedup_vertices(points: &[EdgeVertex]) -> Vec<EdgeVertex> {
    let same = |a: &EdgeVertex, b: &EdgeVertex| (a.vertex - b.vertex).norm_squared() <= DUPLICATE_EPSILON2;
    let mut out: Vec<EdgeVertex> = Vec::with_capacity(points.len());
    for p in points {
        match out.last_mut() {
            Some(last) if same(last, p) => last.edge_flag = p.edge_flag,
            _ => out.push(*p),
        }
    }
    while out.len() > 1 && same(&out[0], &out[out.len() - 1]) {
        out.pop();
    }
    out
}

/// Point on the plane `axis = 0`, a quarter turn from `last`, through which
/// the seam from `last` back to an antipodal start is routed
///
/// Without a `toward` hint the seam turns left of the incoming edge
/// `prev -> last`, so the closed piece keeps the orientation of its contour.
fn seam_midpoint(
    prev: &Vector3<f64>,
    last: &Vector3<f64>,
    axis: usize,
    toward: Option<Vector3<f64>>,
) -> Vector3<f64> {
    let mut m = toward.unwrap_or_else(|| prev.cross(last));
    m[axis] = 0.0;
    m -= last * m.dot(last);
    if m.norm() < f64::EPSILON {
        let mut normal = Vector3::zeros();
        normal[axis] = 1.0;
        m = normal.cross(last);
    }
    m.normalize()
}

/// Whether a contour made of vertices lying on the plane `axis = 0` winds
/// around the positive side
fn flat_contour_side(points: &[EdgeVertex], axis: usize) -> usize {
    let n = points.len();
    let normal: Vector3<f64> = (0..n)
        .map(|i| points[i].vertex.cross(&points[(i + 1) % n].vertex))
        .sum();
    if normal[axis] >= 0.0 {
        0
    } else {
        1
    }
}

/// Cut a contour along the plane `axis = 0`
///
/// Returns the pieces with `axis > 0` and the pieces with `axis < 0`. Vertices
/// within [`PLANE_EPSILON`] of the plane are snapped onto it and belong to the
/// pieces on both sides of them; crossings are only computed between vertices
/// strictly on opposite sides. A piece starts and ends on the plane and is
/// closed by a seam along it: its last vertex carries a false flag, its first
/// vertex the flag of the edge it starts. `toward` is where seams between
/// antipodal ends must pass, when earlier cuts constrain it.
fn split_by_plane(piece: &Piece, axis: usize, toward: Option<Vector3<f64>>) -> [Vec<Piece>; 2] {
    let mut out: [Vec<Piece>; 2] = [Vec::new(), Vec::new()];

    let mut snapped: Vec<EdgeVertex> = piece.contour.points().to_vec();
    for p in snapped.iter_mut() {
        if plane_sign(&p.vertex, axis) == 0 {
            p.vertex[axis] = 0.0;
        }
    }
    let points = dedup_vertices(&snapped);
    if points.len() < 3 {
        return out;
    }

    let signs: Vec<i8> = points.iter().map(|p| plane_sign(&p.vertex, axis)).collect();
    let has_pos = signs.iter().any(|&s| s > 0);
    let has_neg = signs.iter().any(|&s| s < 0);
    if !(has_pos && has_neg) {
        let side = match (has_pos, has_neg) {
            (true, _) => 0,
            (_, true) => 1,
            _ => flat_contour_side(&points, axis),
        };
        out[side].push(Piece {
            contour: SubContour::from_edge_vertices(points),
            open: piece.open,
        });
        return out;
    }

    let n = points.len();
    let mut ring: Vec<(EdgeVertex, i8)> = Vec::with_capacity(n + 4);
    for i in 0..n {
        let j = (i + 1) % n;
        ring.push((points[i], signs[i]));
        if signs[i] * signs[j] < 0 {
            let crossing = plane_crossing(&points[i].vertex, &points[j].vertex, axis);
            ring.push((EdgeVertex::new(crossing, points[i].edge_flag), 0));
        }
    }

    // side of the nearest off-plane vertex behind and ahead of every vertex
    let m = ring.len();
    let anchor = (0..m).find(|&i| ring[i].1 != 0).unwrap_or(0);
    let mut behind = vec![0i8; m];
    let mut ahead = vec![0i8; m];
    let mut last = ring[anchor].1;
    for step in 0..m {
        let i = (anchor + step) % m;
        if ring[i].1 != 0 {
            last = ring[i].1;
        }
        behind[i] = last;
    }
    let mut next = ring[anchor].1;
    for step in 0..m {
        let i = (anchor + m - step) % m;
        if ring[i].1 != 0 {
            next = ring[i].1;
        }
        ahead[i] = next;
    }

    // a run of on-plane vertices between the two sides is cut at its last vertex
    let is_cut = |i: usize| ring[i].1 == 0 && behind[i] != ahead[i] && ring[(i + 1) % m].1 != 0;
    let Some(first_cut) = (0..m).find(|&i| is_cut(i)) else {
        return out;
    };

    let mut current = vec![ring[first_cut].0];
    let mut current_side = side_index(ahead[first_cut]);
    for step in 1..=m {
        let i = (first_cut + step) % m;
        let p = ring[i].0;
        if !is_cut(i) {
            current.push(p);
            continue;
        }
        current.push(EdgeVertex::new(p.vertex, false));
        let done = std::mem::replace(&mut current, vec![p]);
        let mut part = dedup_vertices(&done);
        if part.len() >= 3 {
            let (start, end) = (part[0].vertex, part[part.len() - 1].vertex);
            if start.dot(&end) < -1.0 + ANTIPODAL_EPSILON {
                let prev = part[part.len() - 2].vertex;
                part.push(EdgeVertex::new(seam_midpoint(&prev, &end, axis, toward), false));
            }
            out[current_side].push(Piece {
                contour: SubContour::from_edge_vertices(part),
                open: true,
            });
        }
        current_side = side_index(ahead[i]);
    }
    out
}

/// Close an open piece whose ends lie on different meridian planes through
/// the pole it encloses
fn close_through_pole(piece: &mut Piece) {
    if !piece.open || piece.contour.len() < 2 {
        return;
    }
    let points = piece.contour.points();
    let first = points[0].vertex;
    let last = points[points.len() - 1].vertex;
    let z = first.cross(&last).z;
    let pole = if z > POLE_EPSILON {
        Vector3::new(0.0, 0.0, 1.0)
    } else if z < -POLE_EPSILON {
        Vector3::new(0.0, 0.0, -1.0)
    } else {
        return;
    };
    piece.contour.push(EdgeVertex::new(pole, false));
}

/// Eight-face bucket representation of a spherical region
///
/// Every face holds a list of layers, one per contribution appended to it.
/// Tessellation collapses the layers of each face into a single layer of
/// triangles.
#[derive(Debug, Clone, Default)]
pub struct OctahedronContour {
    sides: [Vec<Vec<SubContour>>; 8],
    tesselated: bool,
}

impl OctahedronContour {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Split a single contour onto the octahedron
    pub fn new(contour: &SubContour) -> Self {
        Self::from_contours(std::slice::from_ref(contour))
    }

    /// Split several contours forming one contribution
    pub fn from_contours(contours: &[SubContour]) -> Self {
        let mut oct = Self::empty();
        let mut layers: [Vec<SubContour>; 8] = Default::default();
        for contour in contours.iter().filter(|c| c.len() >= 3) {
            for (face, piece) in split_onto_faces(contour) {
                layers[face].push(piece);
            }
        }
        for (face, layer) in layers.into_iter().enumerate() {
            if !layer.is_empty() {
                oct.sides[face].push(layer);
            }
        }
        oct
    }

    #[inline]
    pub fn is_tesselated(&self) -> bool {
        self.tesselated
    }

    pub fn is_empty(&self) -> bool {
        self.sides.iter().all(|layers| layers.iter().all(|l| l.is_empty()))
    }

    /// Contours currently stored on a face, in face-plane coordinates
    pub fn face_contours(&self, face: usize) -> impl Iterator<Item = &SubContour> {
        self.sides[face].iter().flatten()
    }

    /// Add the contributions of `other` as new layers
    pub fn append(&mut self, other: &OctahedronContour) {
        for (mine, theirs) in self.sides.iter_mut().zip(other.sides.iter()) {
            mine.extend(theirs.iter().filter(|l| !l.is_empty()).cloned());
        }
        self.tesselated = false;
    }

    /// Add the contributions of `other` with every contour reversed
    pub fn append_reversed(&mut self, other: &OctahedronContour) {
        for (mine, theirs) in self.sides.iter_mut().zip(other.sides.iter()) {
            for layer in theirs.iter().filter(|l| !l.is_empty()) {
                mine.push(layer.iter().map(SubContour::reversed).collect());
            }
        }
        self.tesselated = false;
    }

    pub fn inplace_union(&mut self, other: &OctahedronContour) {
        self.append(other);
    }

    pub fn inplace_subtraction(&mut self, other: &OctahedronContour) -> Result<()> {
        if !self.tesselated {
            self.tessellate(WindingRule::Positive)?;
        }
        let mut other = Cow::Borrowed(other);
        if !other.tesselated {
            other.to_mut().tessellate(WindingRule::Positive)?;
        }
        self.append_reversed(&other);
        self.tessellate(WindingRule::Positive)
    }

    pub fn inplace_intersection(&mut self, other: &OctahedronContour) -> Result<()> {
        if !self.tesselated {
            self.tessellate(WindingRule::Positive)?;
        }
        let mut other = Cow::Borrowed(other);
        if !other.tesselated {
            other.to_mut().tessellate(WindingRule::Positive)?;
        }
        self.append(&other);
        self.tessellate(WindingRule::AbsGeqTwo)
    }

    /// Tessellate every face with `rule`, each layer being one contribution
    pub fn tessellate(&mut self, rule: WindingRule) -> Result<()> {
        for (face, layers) in self.sides.iter_mut().enumerate() {
            if layers.is_empty() {
                continue;
            }
            let chart = FaceChart::new(face);
            let mut session = TessSession::new(&chart, rule);
            for layer in layers.iter() {
                session.begin_shape();
                for contour in layer {
                    session.add_contour(&contour.to_tess_vertices());
                }
            }
            let mesh = session.triangulate()?;
            layers.clear();
            if !mesh.is_empty() {
                layers.push(mesh.triangle_contours());
            }
        }
        self.tesselated = true;
        Ok(())
    }

    /// Triangles of the tessellated region, vertices back on the sphere
    pub fn tesselated_triangles(&mut self) -> Result<VertexArray> {
        if !self.tesselated {
            self.tessellate(WindingRule::Positive)?;
        }
        let mut mesh = VertexArray::new();
        for contour in self.sides.iter().flatten().flatten() {
            let points = contour.points();
            if points.len() != 3 {
                continue;
            }
            mesh.push_triangle(
                [points[0].vertex, points[1].vertex, points[2].vertex],
                [points[0].edge_flag, points[1].edge_flag, points[2].edge_flag],
            );
        }
        mesh.normalize_vertices();
        if let Err(detail) = mesh.check_invariants(true) {
            report_invariant_violation("octahedron triangles", &detail);
            return Ok(VertexArray::new());
        }
        Ok(mesh)
    }

    /// Boundary loops of the region resolved with `rule`, face by face
    pub fn boundary_contours(&self, rule: WindingRule) -> Result<Vec<SubContour>> {
        let mut result = Vec::new();
        for (face, layers) in self.sides.iter().enumerate() {
            if layers.is_empty() {
                continue;
            }
            let chart = FaceChart::new(face);
            let mut session = TessSession::new(&chart, rule);
            for layer in layers {
                session.begin_shape();
                for contour in layer {
                    session.add_contour(&contour.to_tess_vertices());
                }
            }
            for mut contour in session.boundary()? {
                for p in contour.points_mut() {
                    p.vertex = p.vertex.normalize();
                }
                result.push(contour);
            }
        }
        Ok(result)
    }
}

/// Split a contour into octant pieces projected on their faces
fn split_onto_faces(contour: &SubContour) -> Vec<(usize, SubContour)> {
    let whole = Piece {
        contour: contour.clone(),
        open: false,
    };
    let mut faces = Vec::new();
    let [north_y, south_y] = split_by_plane(&whole, Y, None);
    for (y_side, halves) in [north_y, south_y].into_iter().enumerate() {
        let y_hint = Vector3::new(0.0, if y_side == 0 { 1.0 } else { -1.0 }, 0.0);
        for half in halves {
            let [pos_x, neg_x] = split_by_plane(&half, X, Some(y_hint));
            for (x_side, quarters) in [pos_x, neg_x].into_iter().enumerate() {
                for mut quarter in quarters {
                    close_through_pole(&mut quarter);
                    let [pos_z, neg_z] = split_by_plane(&quarter, Z, None);
                    for (z_side, octants) in [pos_z, neg_z].into_iter().enumerate() {
                        let face = 4 * y_side + 2 * x_side + z_side;
                        let f = face_center(face);
                        for octant in octants {
                            let mut projected = octant.contour;
                            for p in projected.points_mut() {
                                p.vertex /= f.dot(&p.vertex);
                            }
                            faces.push((face, projected));
                        }
                    }
                }
            }
        }
    }
    faces
}
