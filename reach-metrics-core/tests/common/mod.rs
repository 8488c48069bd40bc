#![allow(dead_code)]

use std::path::{Path, PathBuf};

use reach_metrics_core::geometry::CoordinateSpace;
use reach_metrics_core::loading::{LAYERS_DIR, LoadOptions};
use serde_json::{Value, json};
use tempfile::TempDir;

pub const BLOCK: f64 = 50.0;
pub const SIDEWALK_OFFSET: f64 = 5.0;
pub const STREET_SPACING: f64 = 100.0;

/// Directory with `pedestrian/` and `street/` networks laid out on parallel
/// east-west streets
pub struct City {
    pub dir: TempDir,
}

impl City {
    pub fn pedestrian(&self) -> PathBuf {
        self.dir.path().join("pedestrian")
    }

    pub fn street(&self) -> PathBuf {
        self.dir.path().join("street")
    }
}

pub fn projected() -> LoadOptions {
    LoadOptions {
        space: CoordinateSpace::Projected,
        ..Default::default()
    }
}

fn feature(coords: [(f64, f64); 2], properties: Value) -> Value {
    json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": [[coords[0].0, coords[0].1], [coords[1].0, coords[1].1]],
        },
        "properties": properties,
    })
}

fn write_layer(network: &Path, name: &str, features: Vec<Value>) {
    let layers = network.join(LAYERS_DIR);
    std::fs::create_dir_all(&layers).unwrap();
    let collection = json!({"type": "FeatureCollection", "features": features});
    std::fs::write(
        layers.join(format!("{name}.geojson")),
        serde_json::to_string(&collection).unwrap(),
    )
    .unwrap();
}

pub fn write_profile(network: &Path, profile: Value) {
    let id = profile["id"].as_str().unwrap().to_string();
    std::fs::write(
        network.join(format!("profile-{id}.json")),
        serde_json::to_string_pretty(&profile).unwrap(),
    )
    .unwrap();
}

/// `streets` rows of `blocks` street segments each. Every street segment has
/// a sidewalk on both sides, and crossings join the sidewalks at every
/// junction. Crossings at odd junctions lack curb ramps and sidewalks of the
/// first row climb steeply.
pub fn grid_city(streets: usize, blocks: usize) -> City {
    let city = City {
        dir: tempfile::tempdir().unwrap(),
    };

    let mut street_features = Vec::new();
    let mut sidewalks = Vec::new();
    let mut crossings = Vec::new();

    for row in 0..streets {
        let y = row as f64 * STREET_SPACING;
        for block in 0..blocks {
            let x0 = block as f64 * BLOCK;
            let x1 = x0 + BLOCK;
            let segment = (row * blocks + block) as i64;
            let left = 1000 + 2 * segment;
            let right = left + 1;

            street_features.push(feature(
                [(x0, y), (x1, y)],
                json!({
                    "pkey": segment,
                    "name": format!("Street {row}"),
                    "sw_left": 1,
                    "pkey_left": left,
                    "sw_right": 1,
                    "pkey_right": right,
                }),
            ));

            let incline = if row == 0 { 0.12 } else { 0.01 };
            sidewalks.push(feature(
                [(x0, y + SIDEWALK_OFFSET), (x1, y + SIDEWALK_OFFSET)],
                json!({"pkey": left, "incline": incline, "width": 2.0}),
            ));
            sidewalks.push(feature(
                [(x0, y - SIDEWALK_OFFSET), (x1, y - SIDEWALK_OFFSET)],
                json!({"pkey": right, "incline": incline, "width": 2.0}),
            ));
        }

        for junction in 0..=blocks {
            let x = junction as f64 * BLOCK;
            crossings.push(feature(
                [(x, y - SIDEWALK_OFFSET), (x, y + SIDEWALK_OFFSET)],
                json!({
                    "pkey": 5000 + (row * (blocks + 1) + junction) as i64,
                    "curbramps": junction % 2 == 0,
                }),
            ));
        }
    }

    let street = city.street();
    write_layer(&street, "streets", street_features);
    write_profile(&street, json!({"id": "distance", "cost": {"distance": {}}}));

    let pedestrian = city.pedestrian();
    write_layer(&pedestrian, "sidewalks", sidewalks);
    write_layer(&pedestrian, "crossings", crossings);
    write_profile(
        &pedestrian,
        json!({"id": "wheelchair", "precalculate": true,
               "cost": {"pedestrian": {"uphill": 0.0833, "downhill": 0.0833, "avoid_curbs": true}}}),
    );
    write_profile(
        &pedestrian,
        json!({"id": "walking", "cost": {"pedestrian": {"uphill": 0.15, "downhill": 0.15, "avoid_curbs": false}}}),
    );
    write_profile(
        &pedestrian,
        json!({"id": "dynamic", "skip_scoring": true, "cost": {"pedestrian": {}}}),
    );

    city
}

/// Metres per degree of latitude on the Haversine sphere
pub const METRES_PER_DEGREE: f64 = 111_195.08;

/// One lon/lat street along the equator, roughly 55 m long, with a single
/// parallel sidewalk `sidewalk_offset` metres to its north
pub fn geographic_street(sidewalk_offset: f64) -> City {
    let city = City {
        dir: tempfile::tempdir().unwrap(),
    };
    let lat = sidewalk_offset / METRES_PER_DEGREE;

    let street = city.street();
    write_layer(
        &street,
        "streets",
        vec![feature(
            [(0.0, 0.0), (0.0005, 0.0)],
            json!({"pkey": 1, "sw_left": 1, "pkey_left": 100}),
        )],
    );
    write_profile(&street, json!({"id": "distance", "cost": {"distance": {}}}));

    let pedestrian = city.pedestrian();
    write_layer(
        &pedestrian,
        "sidewalks",
        vec![feature(
            [(0.0, lat), (0.0005, lat)],
            json!({"pkey": 100, "incline": 0.0, "width": 2.0}),
        )],
    );
    write_profile(
        &pedestrian,
        json!({"id": "walking", "cost": {"pedestrian": {}}}),
    );

    city
}
