use geo::{Coord, LineString};
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use serde_json::{Value, json};

use crate::geometry::CoordinateSpace;
use crate::loading::{LoadOptions, build_graph};
use crate::model::{EdgeAttributes, Extent, Layer};
use crate::network::{NetworkContainer, RoutingContext};
use crate::{NetworkGraph, Profile};

pub(crate) fn line(coords: &[(f64, f64)]) -> LineString<f64> {
    coords.iter().map(|&(x, y)| Coord { x, y }).collect()
}

/// Bidirectional projected graph, one layer per feature, in feature order
pub(crate) fn projected_graph(features: &[(&str, LineString<f64>, Value)]) -> NetworkGraph {
    let layers: Vec<(String, FeatureCollection)> = features
        .iter()
        .map(|(layer, geometry, properties)| {
            let feature = Feature {
                bbox: None,
                geometry: Some(Geometry::new(GeoJsonValue::from(geometry))),
                id: None,
                properties: properties.as_object().cloned(),
                foreign_members: None,
            };
            (
                (*layer).to_string(),
                FeatureCollection {
                    bbox: None,
                    features: vec![feature],
                    foreign_members: None,
                },
            )
        })
        .collect();

    let options = LoadOptions {
        space: CoordinateSpace::Projected,
        ..Default::default()
    };
    build_graph(&layers, &options).unwrap()
}

/// Forward edge along the x axis with only `properties` set
pub(crate) fn edge_with(layer: &str, length: f64, properties: Value) -> EdgeAttributes {
    EdgeAttributes {
        layer: Layer::from(layer),
        length,
        width: None,
        incline: None,
        curbramps: None,
        pkey: 1,
        reversed: false,
        geometry: line(&[(0.0, 0.0), (length, 0.0)]),
        extent: Extent::full(length, false),
        properties: properties.as_object().cloned().unwrap_or_default(),
    }
}

pub(crate) fn profile(id: &str, cost: Value) -> Profile {
    serde_json::from_value(json!({"id": id, "cost": cost})).unwrap()
}

/// A 10 unit street along the x axis with a sidewalk on each side, 5 units
/// away
pub(crate) fn street_with_sidewalks(pedestrian_profiles: Vec<Profile>) -> NetworkContainer {
    let pedestrian = projected_graph(&[
        (
            "sidewalks",
            line(&[(0.0, 5.0), (10.0, 5.0)]),
            json!({"pkey": 100}),
        ),
        (
            "sidewalks",
            line(&[(0.0, -5.0), (10.0, -5.0)]),
            json!({"pkey": 101}),
        ),
    ]);
    let street = projected_graph(&[(
        "streets",
        line(&[(0.0, 0.0), (10.0, 0.0)]),
        json!({"pkey": 1, "sw_left": 1, "pkey_left": 100, "sw_right": 1, "pkey_right": 101}),
    )]);

    NetworkContainer::new(
        RoutingContext::new(pedestrian, pedestrian_profiles),
        RoutingContext::new(street, vec![profile("distance", json!({"distance": {}}))]),
    )
    .unwrap()
}
