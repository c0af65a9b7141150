// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Skyreg Spherical Geometry
//!
//! Boolean algebra on regions of the unit sphere: caps, points, convex and
//! general polygons, the empty region and the whole sky. General polygons are
//! triangle meshes produced by tessellating contours in a gnomonic chart, or
//! face by face on an octahedron when the contours do not fit in one chart.
//! Planar winding rules are resolved with i_overlay and loops are triangulated
//! with earcutr.
//!
//! Sky coordinates are right ascension / declination in degrees; vertices are
//! unit vectors. Contours are counter-clockwise seen from outside the sphere.

pub mod bool2d;
pub mod cap;
pub mod convex;
pub mod error;
pub mod mesh;
pub mod octahedron;
pub mod polygon;
pub mod region;
pub mod serialization;
pub mod sphere;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Vector2, Vector3};

pub use cap::{SphericalCap, SphericalPoint};
pub use convex::{SphericalConvexPolygon, SphericalTexturedConvexPolygon};
pub use error::{Error, Result};
pub use mesh::{EdgeVertex, SubContour, VertexArray};
pub use octahedron::OctahedronContour;
pub use polygon::{SphericalPolygon, SphericalPolygonBase, SphericalTexturedPolygon};
pub use region::{RegionType, SphericalRegion};
pub use sphere::{ra_dec_to_unit, unit_to_ra_dec};
pub use triangulation::{Chart, GnomonicChart, WindingRule};
