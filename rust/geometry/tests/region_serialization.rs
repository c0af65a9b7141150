// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use skyreg_geometry::{ra_dec_to_unit, Error, RegionType, SphericalRegion, Vector3};

fn sample_points() -> Vec<Vector3<f64>> {
    let mut points = Vec::new();
    for i in 0..48 {
        let ra = i as f64 * 7.5 + 0.3;
        for dec in [-75.3, -40.3, -10.3, 0.3, 5.3, 12.3, 33.3, 70.3] {
            points.push(ra_dec_to_unit(ra, dec));
        }
    }
    points
}

fn assert_equivalent(a: &SphericalRegion, b: &SphericalRegion) {
    assert_eq!(a.region_type(), b.region_type());
    for p in sample_points() {
        assert_eq!(a.contains_point(&p), b.contains_point(&p));
    }
}

#[test]
fn json_text_roundtrip() {
    let sources = [
        r#"{"type": "CAP", "center": [83.6, 22.0], "radius": 7.5}"#,
        r#"{"type": "CAP", "center": [10.0, -5.0], "radius": 0}"#,
        r#"{"type": "CVXPOLYGON", "worldCoords": [[0, 0], [15, 0], [15, 12], [0, 12]]}"#,
        r#"{"type": "POINT", "pos": [250.0, -60.0]}"#,
        r#"{"type": "ALLSKY"}"#,
        r#"{"worldCoords": [[[0, -10], [30, -10], [30, 20], [0, 20]], [[5, -5], [5, 15], [25, 15], [25, -5]]]}"#,
    ];
    for source in sources {
        let region = SphericalRegion::from_json(source).unwrap();
        let reloaded = SphericalRegion::from_json(&region.to_json().unwrap()).unwrap();
        assert_equivalent(&region, &reloaded);
    }
}

#[test]
fn hole_survives_roundtrip() {
    let region = SphericalRegion::from_json(
        r#"{"worldCoords": [[[0, -10], [30, -10], [30, 20], [0, 20]], [[5, -5], [5, 15], [25, 15], [25, -5]]]}"#,
    )
    .unwrap();
    assert_eq!(region.region_type(), RegionType::Polygon);
    assert!(region.contains_point(&ra_dec_to_unit(2.0, 0.0)));
    assert!(!region.contains_point(&ra_dec_to_unit(15.0, 5.0)));

    let value = region.to_value().unwrap();
    assert_eq!(value["worldCoords"].as_array().map(Vec::len), Some(2));
}

#[test]
fn binary_stream_of_regions() {
    let regions = [
        SphericalRegion::from_json(r#"{"type": "CAP", "center": [0, 90], "radius": 20}"#).unwrap(),
        SphericalRegion::from_json(r#"{"type": "CVXPOLYGON", "worldCoords": [[0, 0], [10, 0], [5, 8]]}"#).unwrap(),
        SphericalRegion::Empty,
    ];
    let mut stream = Vec::new();
    for region in &regions {
        region.write_binary(&mut stream).unwrap();
    }
    let mut reader = stream.as_slice();
    for region in &regions {
        let loaded = SphericalRegion::read_binary(&mut reader).unwrap();
        assert_equivalent(region, &loaded);
    }
    assert!(matches!(SphericalRegion::read_binary(&mut reader), Err(Error::Io(_))));
}

#[test]
fn malformed_json_is_reported() {
    assert!(matches!(SphericalRegion::from_json("{\"type\": "), Err(Error::Serialization(_))));
    assert!(matches!(
        SphericalRegion::from_json(r#"{"type": "POINT", "pos": [1, 2, 3]}"#),
        Err(Error::InvalidRaDec(_))
    ));
}
