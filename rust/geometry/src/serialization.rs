// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Map representation of regions.
//!
//! Regions are written as JSON objects with right ascension / declination
//! pairs in degrees:
//!
//! ```json
//! {"type": "CAP", "center": [10.0, 20.0], "radius": 5.0}
//! {"type": "CVXPOLYGON", "worldCoords": [[0, 0], [10, 0], [5, 8]]}
//! {"worldCoords": [[[0, 0], [10, 0], [5, 8]], ["CAP", [40, 0], 2.5]]}
//! ```
//!
//! A map without `type` is a general polygon. The binary form is the JSON
//! text prefixed with its length as a little-endian `u32`.

use std::io::{Read, Write};

use nalgebra::{Vector2, Vector3};
use serde_json::{json, Map, Value};

use crate::cap::{SphericalCap, SphericalPoint, CAP_POLYGON_STEPS};
use crate::convex::{SphericalConvexPolygon, SphericalTexturedConvexPolygon};
use crate::error::{Error, Result};
use crate::polygon::{SphericalPolygon, SphericalPolygonBase, SphericalTexturedPolygon};
use crate::region::{RegionType, SphericalRegion};
use crate::sphere::{ra_dec_to_unit, unit_to_ra_dec};

const WORLD_COORDS: &str = "worldCoords";
const SKY_CONVEX_POLYGONS: &str = "skyConvexPolygons";
const TEXTURE_COORDS: &str = "textureCoords";

impl SphericalRegion {
    /// Serialize to the map representation
    pub fn to_value(&self) -> Result<Value> {
        let value = match self {
            SphericalRegion::Empty => json!({ "type": RegionType::Empty }),
            SphericalRegion::AllSky => json!({ "type": RegionType::AllSky }),
            SphericalRegion::Point(p) => json!({ "type": RegionType::Point, "pos": ra_dec_value(&p.n) }),
            SphericalRegion::Cap(c) => json!({
                "type": RegionType::Cap,
                "center": ra_dec_value(&c.n),
                "radius": c.radius().to_degrees(),
            }),
            SphericalRegion::ConvexPolygon(p) => convex_value(p),
            SphericalRegion::TexturedConvexPolygon(p) => {
                let mut value = convex_value(p.polygon());
                let tex: Vec<Value> = p.tex_coords().iter().map(|t| json!([t.x, t.y])).collect();
                value[TEXTURE_COORDS] = Value::Array(tex);
                value
            }
            SphericalRegion::Polygon(p) => {
                let contours: Vec<Value> = p
                    .simplified_contours()?
                    .iter()
                    .map(|c| Value::Array(c.iter().map(|v| ra_dec_value(&v.vertex)).collect()))
                    .collect();
                json!({ WORLD_COORDS: contours })
            }
            SphericalRegion::TexturedPolygon(_) => {
                return Err(Error::Unsupported("serialization of a textured polygon"));
            }
        };
        Ok(value)
    }

    /// Load a region from its map representation
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| Error::InvalidRegion(format!("expected a map, got {value}")))?;

        let region_type = match map.get("type") {
            None => RegionType::Polygon,
            Some(tag) => serde_json::from_value::<RegionType>(tag.clone())
                .map_err(|_| Error::InvalidRegion(format!("unknown region type {tag}")))?,
        };

        match region_type {
            RegionType::Empty => Ok(SphericalRegion::Empty),
            RegionType::AllSky => Ok(SphericalRegion::AllSky),
            RegionType::Point => {
                let pos = required(map, "pos")?;
                Ok(SphericalRegion::Point(SphericalPoint::new(parse_ra_dec(pos)?)))
            }
            RegionType::Cap => {
                let center = parse_ra_dec(required(map, "center")?)?;
                let radius = parse_degrees(required(map, "radius")?, "radius")?;
                Ok(SphericalRegion::cap_from_radius(center, radius.to_radians()))
            }
            RegionType::ConvexPolygon => parse_convex(map),
            RegionType::Polygon => parse_polygon(map),
        }
    }

    /// Map representation as JSON text
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_value()?).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Load a region from JSON text holding its map representation
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Write the length-prefixed map representation to `writer`
    pub fn write_binary<W: Write>(&self, writer: &mut W) -> Result<()> {
        let bytes = serde_json::to_vec(&self.to_value()?).map_err(|e| Error::Serialization(e.to_string()))?;
        let len = u32::try_from(bytes.len())
            .map_err(|_| Error::Serialization(format!("region of {} bytes is too large", bytes.len())))?;
        writer.write_all(&len.to_le_bytes())?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Read a region written by [`SphericalRegion::write_binary`]
    pub fn read_binary<R: Read>(reader: &mut R) -> Result<Self> {
        let mut len = [0u8; 4];
        reader.read_exact(&mut len)?;
        let mut bytes = vec![0u8; u32::from_le_bytes(len) as usize];
        reader.read_exact(&mut bytes)?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| Error::Serialization(e.to_string()))?;
        Self::from_value(&value)
    }
}

fn ra_dec_value(v: &Vector3<f64>) -> Value {
    let (ra, dec) = unit_to_ra_dec(v);
    json!([ra, dec])
}

fn convex_value(polygon: &SphericalConvexPolygon) -> Value {
    let coords: Vec<Value> = polygon.contour().iter().map(ra_dec_value).collect();
    json!({ "type": RegionType::ConvexPolygon, WORLD_COORDS: coords })
}

fn required<'a>(map: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    map.get(key)
        .ok_or_else(|| Error::InvalidRegion(format!("missing \"{key}\" key")))
}

fn parse_degrees(value: &Value, what: &str) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| Error::InvalidRegion(format!("invalid {what}: {value} (expect a number in degrees)")))
}

fn parse_pair(value: &Value) -> Option<(f64, f64)> {
    match value.as_array()?.as_slice() {
        [a, b] => Some((a.as_f64()?, b.as_f64()?)),
        _ => None,
    }
}

fn parse_ra_dec(value: &Value) -> Result<Vector3<f64>> {
    let (ra, dec) = parse_pair(value).ok_or_else(|| {
        Error::InvalidRaDec(format!("\"{value}\" (expect 2 double values in degree)"))
    })?;
    Ok(ra_dec_to_unit(ra, dec))
}

fn parse_tex_coord(value: &Value) -> Result<Vector2<f64>> {
    let (u, v) = parse_pair(value)
        .ok_or_else(|| Error::InvalidTexCoords(format!("invalid texture coordinate pair {value}")))?;
    Ok(Vector2::new(u, v))
}

fn as_list<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::InvalidContour(format!("{what} must be a list, got {value}")))
}

fn parse_convex(map: &Map<String, Value>) -> Result<SphericalRegion> {
    let coords = as_list(required(map, WORLD_COORDS)?, WORLD_COORDS)?;
    let contour = coords.iter().map(parse_ra_dec).collect::<Result<Vec<_>>>()?;
    match map.get(TEXTURE_COORDS) {
        Some(tex) => {
            let tex = as_list(tex, TEXTURE_COORDS)?
                .iter()
                .map(parse_tex_coord)
                .collect::<Result<Vec<_>>>()?;
            Ok(SphericalTexturedConvexPolygon::new(contour, tex)?.into())
        }
        None => Ok(SphericalConvexPolygon::new(contour)?.into()),
    }
}

/// One contour: a list of `[ra, dec]` pairs or a `["CAP", [ra, dec], aperture]` token
fn parse_contour(value: &Value) -> Result<Vec<Vector3<f64>>> {
    let items = as_list(value, "contour")?;
    if items.first().and_then(Value::as_str) == Some("CAP") {
        let [_, center, aperture] = items.as_slice() else {
            return Err(Error::InvalidCap(format!("{value} (expect \"CAP\",[ra, dec],aperture)")));
        };
        let center = parse_ra_dec(center)?;
        let aperture = aperture.as_f64().ok_or_else(|| {
            Error::InvalidCap(format!("invalid aperture angle: {aperture} (expect a value in degrees)"))
        })?;
        let cap = SphericalCap::from_radius(center, aperture.to_radians());
        return Ok(cap.boundary_contour(CAP_POLYGON_STEPS));
    }
    if items.len() < 3 {
        return Err(Error::InvalidContour(format!(
            "a polygon contour must have at least 3 vertices, got {}",
            items.len()
        )));
    }
    items.iter().map(parse_ra_dec).collect()
}

fn parse_polygon(map: &Map<String, Value>) -> Result<SphericalRegion> {
    let contours = match map.get(SKY_CONVEX_POLYGONS) {
        Some(legacy) if legacy.as_array().is_some_and(|l| !l.is_empty()) => {
            tracing::warn!("{SKY_CONVEX_POLYGONS} in region descriptions is deprecated, use {WORLD_COORDS}");
            legacy
        }
        _ => map.get(WORLD_COORDS).ok_or(Error::MissingContours)?,
    };
    let contours = as_list(contours, WORLD_COORDS)?;
    if contours.is_empty() {
        return Err(Error::MissingContours);
    }
    let contours = contours.iter().map(parse_contour).collect::<Result<Vec<_>>>()?;

    let Some(tex) = map.get(TEXTURE_COORDS) else {
        return Ok(SphericalPolygon::from_contours(&contours)?.into());
    };
    let tex = as_list(tex, TEXTURE_COORDS)?;
    if tex.len() != contours.len() {
        return Err(Error::InvalidTexCoords(format!(
            "the number of sky contours ({}) does not match the number of texture space contours ({})",
            contours.len(),
            tex.len()
        )));
    }
    let textured = contours
        .into_iter()
        .zip(tex)
        .map(|(contour, tex_contour)| {
            let tex_contour = as_list(tex_contour, TEXTURE_COORDS)?;
            if tex_contour.len() != contour.len() {
                return Err(Error::InvalidTexCoords(format!(
                    "{} texture coordinates for a contour of {} vertices",
                    tex_contour.len(),
                    contour.len()
                )));
            }
            contour
                .into_iter()
                .zip(tex_contour)
                .map(|(v, t)| parse_tex_coord(t).map(|tex| (v, tex)))
                .collect::<Result<Vec<_>>>()
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SphericalTexturedPolygon::from_contours(&textured)?.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_points() -> Vec<Vector3<f64>> {
        let mut points = Vec::new();
        for ra in (0..360).step_by(15) {
            for dec in (-80..=80).step_by(10) {
                points.push(ra_dec_to_unit(ra as f64 + 0.5, dec as f64 + 0.5));
            }
        }
        points
    }

    fn assert_same_membership(a: &SphericalRegion, b: &SphericalRegion) {
        assert_eq!(a.region_type(), b.region_type());
        for p in sample_points() {
            assert_eq!(a.contains_point(&p), b.contains_point(&p), "point {p:?}");
        }
    }

    #[test]
    fn roundtrip_cap() {
        let cap = SphericalRegion::cap_from_radius(ra_dec_to_unit(30.0, -20.0), 12f64.to_radians());
        let loaded = SphericalRegion::from_json(&cap.to_json().unwrap()).unwrap();
        assert_same_membership(&cap, &loaded);
        match (cap, loaded) {
            (SphericalRegion::Cap(a), SphericalRegion::Cap(b)) => {
                assert!((a.n - b.n).norm() < 1e-6);
                assert_relative_eq!(a.radius(), b.radius(), epsilon = 1e-6);
            }
            other => panic!("unexpected regions {other:?}"),
        }
    }

    #[test]
    fn roundtrip_convex_polygon() {
        let poly: SphericalRegion = SphericalConvexPolygon::new(vec![
            ra_dec_to_unit(0.0, 0.0),
            ra_dec_to_unit(10.0, 0.0),
            ra_dec_to_unit(10.0, 10.0),
            ra_dec_to_unit(0.0, 10.0),
        ])
        .unwrap()
        .into();
        let value = poly.to_value().unwrap();
        assert_eq!(value["type"], "CVXPOLYGON");
        let loaded = SphericalRegion::from_value(&value).unwrap();
        assert_same_membership(&poly, &loaded);
    }

    #[test]
    fn roundtrip_textured_convex_polygon() {
        let poly: SphericalRegion = SphericalTexturedConvexPolygon::new(
            vec![ra_dec_to_unit(0.0, 0.0), ra_dec_to_unit(10.0, 0.0), ra_dec_to_unit(5.0, 8.0)],
            vec![Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0), Vector2::new(0.5, 1.0)],
        )
        .unwrap()
        .into();
        let loaded = SphericalRegion::from_value(&poly.to_value().unwrap()).unwrap();
        match loaded {
            SphericalRegion::TexturedConvexPolygon(p) => assert_eq!(p.tex_coords()[2], Vector2::new(0.5, 1.0)),
            other => panic!("unexpected region {other:?}"),
        }
    }

    #[test]
    fn roundtrip_general_polygon() {
        let value = json!({ "worldCoords": [[[0, 0], [20, 0], [20, 20], [10, 5], [0, 20]]] });
        let region = SphericalRegion::from_value(&value).unwrap();
        assert_eq!(region.region_type(), RegionType::Polygon);
        assert!(!region.contains_point(&ra_dec_to_unit(10.0, 15.0)));
        assert!(region.contains_point(&ra_dec_to_unit(3.0, 10.0)));
        let loaded = SphericalRegion::from_value(&region.to_value().unwrap()).unwrap();
        assert_same_membership(&region, &loaded);
    }

    #[test]
    fn roundtrip_tags_and_binary() {
        for region in [
            SphericalRegion::Empty,
            SphericalRegion::AllSky,
            SphericalRegion::Point(SphericalPoint::new(ra_dec_to_unit(45.0, 45.0))),
        ] {
            let mut buf = Vec::new();
            region.write_binary(&mut buf).unwrap();
            assert_eq!(u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize, buf.len() - 4);
            let loaded = SphericalRegion::read_binary(&mut buf.as_slice()).unwrap();
            assert_eq!(loaded.region_type(), region.region_type());
        }
    }

    #[test]
    fn cap_radius_degrades_to_all_sky() {
        let value = json!({ "type": "CAP", "center": [0, 0], "radius": 180 });
        assert_eq!(SphericalRegion::from_value(&value).unwrap(), SphericalRegion::AllSky);
    }

    #[test]
    fn cap_token_contour() {
        let value = json!({ "worldCoords": [["CAP", [40, 0], 5]] });
        let region = SphericalRegion::from_value(&value).unwrap();
        assert!(region.contains_point(&ra_dec_to_unit(40.0, 0.0)));
        assert!(region.contains_point(&ra_dec_to_unit(43.0, 0.0)));
        assert!(!region.contains_point(&ra_dec_to_unit(46.0, 0.0)));
    }

    #[test]
    fn deprecated_key_is_accepted() {
        let value = json!({ "skyConvexPolygons": [[[0, 0], [10, 0], [5, 8]]] });
        let region = SphericalRegion::from_value(&value).unwrap();
        assert!(region.contains_point(&ra_dec_to_unit(5.0, 3.0)));
    }

    #[test]
    fn parse_errors() {
        let cases = [
            json!({}),
            json!({ "worldCoords": [] }),
            json!({ "worldCoords": [[[0, 0], [10, 0]]] }),
            json!({ "worldCoords": [[[0, 0], [10, 0], [5]]] }),
            json!({ "worldCoords": [[[0, 0], [10, 0], ["a", 1]]] }),
            json!({ "worldCoords": [["CAP", [40, 0]]] }),
            json!({ "worldCoords": [["CAP", [40, 0], "wide"]] }),
            json!({ "worldCoords": [[[0, 0], [10, 0], [5, 8]]], "textureCoords": [] }),
            json!({ "worldCoords": [[[0, 0], [10, 0], [5, 8]]], "textureCoords": [[[0, 0], [1, 0]]] }),
            json!({ "type": "CAP", "center": [0, 0], "radius": "big" }),
            json!({ "type": "HEXAGON" }),
            json!({ "type": "CVXPOLYGON", "worldCoords": [[0, 0], [5, 8], [10, 0]] }),
        ];
        for case in &cases {
            assert!(SphericalRegion::from_value(case).is_err(), "accepted {case}");
        }
        assert!(matches!(
            SphericalRegion::from_value(&json!({ "worldCoords": [["CAP", [40, 0]]] })),
            Err(Error::InvalidCap(_))
        ));
        assert!(matches!(SphericalRegion::from_value(&json!({})), Err(Error::MissingContours)));
    }

    #[test]
    fn textured_polygon_is_not_serializable() {
        let value = json!({
            "worldCoords": [[[0, 0], [10, 0], [5, 8]]],
            "textureCoords": [[[0, 0], [1, 0], [0.5, 1]]],
        });
        let region = SphericalRegion::from_value(&value).unwrap();
        assert!(matches!(region, SphericalRegion::TexturedPolygon(_)));
        assert!(matches!(region.to_value(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn truncated_binary_is_an_io_error() {
        let mut buf = Vec::new();
        SphericalRegion::AllSky.write_binary(&mut buf).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(matches!(SphericalRegion::read_binary(&mut buf.as_slice()), Err(Error::Io(_))));
    }
}
