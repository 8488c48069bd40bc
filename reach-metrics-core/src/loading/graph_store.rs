//! Network graphs on disk.
//!
//! A network directory holds either a materialized `graph.geojson`, where
//! every feature is one directed edge, or a `layers/` directory with one
//! GeoJSON file per edge layer, where every feature is one physical segment
//! loaded in both directions.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use geo::{Coord, LineString, Point};
use geojson::{Feature, FeatureCollection, Geometry, Value as GeoJsonValue};
use hashbrown::HashMap;
use log::{debug, info, warn};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::geometry::{self, CoordinateSpace};
use crate::model::{EdgeAttributes, Extent, Layer, NetworkNode, as_pkey};
use crate::{Error, NetworkGraph};

pub const GRAPH_FILE: &str = "graph.geojson";
pub const LAYERS_DIR: &str = "layers";

const LAYER_KEY: &str = "_layer";
const REVERSED_KEY: &str = "_reversed";
const TYPED_KEYS: [&str; 7] = [
    LAYER_KEY,
    REVERSED_KEY,
    "length",
    "width",
    "incline",
    "curbramps",
    "pkey",
];

/// Node coordinates are merged at this resolution
const NODE_PRECISION: f64 = 1e7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub space: CoordinateSpace,
    /// Attributes negated on the reverse direction of a segment
    pub changes_sign: Vec<String>,
    /// Load every layer segment in both directions
    pub bidirectional: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            space: CoordinateSpace::default(),
            changes_sign: vec!["incline".to_string()],
            bidirectional: true,
        }
    }
}

/// Feature read from disk, before the graph is assembled
struct SegmentRecord {
    layer: String,
    geometry: LineString<f64>,
    length: Option<f64>,
    width: Option<f64>,
    incline: Option<f64>,
    curbramps: Option<bool>,
    pkey: Option<i64>,
    reversed: bool,
    properties: Map<String, Value>,
}

/// Loads the network stored in `directory`
pub fn load_network(directory: &Path, options: &LoadOptions) -> Result<NetworkGraph, Error> {
    let graph_file = directory.join(GRAPH_FILE);
    if graph_file.is_file() {
        info!("Loading materialized graph from {}", graph_file.display());
        let collection = read_feature_collection(&graph_file)?;
        let records = records_from_features(None, &collection)?;
        return assemble(records, options, false);
    }

    load_layers(directory, options)
}

/// Builds a network from `directory/layers/*.geojson`, ignoring any
/// materialized graph
pub fn load_layers(directory: &Path, options: &LoadOptions) -> Result<NetworkGraph, Error> {
    let layers_dir = directory.join(LAYERS_DIR);
    if !layers_dir.is_dir() {
        return Err(Error::InvalidData(format!(
            "No {LAYERS_DIR}/ directory in {}",
            directory.display()
        )));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(&layers_dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "geojson"))
        .collect();
    paths.sort();

    let mut layers = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        info!("Loading layer '{name}' from {}", path.display());
        layers.push((name.to_string(), read_feature_collection(&path)?));
    }

    build_graph(&layers, options)
}

/// Builds a graph from named layers of segment features
pub fn build_graph(
    layers: &[(String, FeatureCollection)],
    options: &LoadOptions,
) -> Result<NetworkGraph, Error> {
    let mut records = Vec::new();
    for (name, collection) in layers {
        records.extend(records_from_features(Some(name.as_str()), collection)?);
    }
    assemble(records, options, options.bidirectional)
}

pub fn read_feature_collection(path: &Path) -> Result<FeatureCollection, Error> {
    let file = File::open(path).map_err(|e| {
        std::io::Error::new(e.kind(), format!("Failed to open '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::GeoJsonError(format!("{}: {e}", path.display())))
}

/// Writes every directed edge of `graph` to `directory/graph.geojson`
pub fn save_network(graph: &NetworkGraph, directory: &Path) -> Result<PathBuf, Error> {
    std::fs::create_dir_all(directory)?;
    let path = directory.join(GRAPH_FILE);

    let features = graph
        .edges()
        .map(|(_, _, _, edge)| edge_feature(edge))
        .collect();
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush()?;

    info!(
        "Saved {} edges to {}",
        graph.edge_count(),
        path.display()
    );
    Ok(path)
}

fn edge_feature(edge: &EdgeAttributes) -> Feature {
    let mut properties = edge.properties.clone();
    properties.insert(LAYER_KEY.into(), json!(edge.layer.as_str()));
    properties.insert(REVERSED_KEY.into(), json!(edge.is_reversed()));
    properties.insert("length".into(), json!(edge.length));
    properties.insert("pkey".into(), json!(edge.pkey));
    if let Some(width) = edge.width {
        properties.insert("width".into(), json!(width));
    }
    if let Some(incline) = edge.incline {
        properties.insert("incline".into(), json!(incline));
    }
    if let Some(curbramps) = edge.curbramps {
        properties.insert("curbramps".into(), json!(curbramps));
    }

    Feature {
        bbox: None,
        geometry: Some(Geometry::new(GeoJsonValue::from(&edge.geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn records_from_features(
    layer: Option<&str>,
    collection: &FeatureCollection,
) -> Result<Vec<SegmentRecord>, Error> {
    let mut records = Vec::with_capacity(collection.features.len());
    for (n, feature) in collection.features.iter().enumerate() {
        let Some(geometry) = line_geometry(feature)? else {
            warn!("Skipping feature {n} without a LineString geometry");
            continue;
        };
        let mut properties = feature.properties.clone().unwrap_or_default();

        let layer = match (layer, properties.get(LAYER_KEY).and_then(Value::as_str)) {
            (Some(name), _) | (None, Some(name)) => name.to_string(),
            (None, None) => {
                return Err(Error::InvalidData(format!(
                    "Feature {n} has no '{LAYER_KEY}' attribute"
                )));
            }
        };

        let length = properties.get("length").and_then(Value::as_f64);
        if let Some(length) = length
            && length < 0.0
        {
            return Err(Error::InvalidData(format!(
                "Feature {n} has negative length {length}"
            )));
        }

        let record = SegmentRecord {
            layer,
            geometry,
            length,
            width: properties.get("width").and_then(Value::as_f64),
            incline: properties.get("incline").and_then(Value::as_f64),
            curbramps: properties.get("curbramps").and_then(as_flag),
            pkey: properties.get("pkey").and_then(as_pkey),
            reversed: properties
                .get(REVERSED_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(false),
            properties: {
                for key in TYPED_KEYS {
                    properties.remove(key);
                }
                properties
            },
        };
        records.push(record);
    }
    Ok(records)
}

fn line_geometry(feature: &Feature) -> Result<Option<LineString<f64>>, Error> {
    let Some(geometry) = &feature.geometry else {
        return Ok(None);
    };
    if !matches!(geometry.value, GeoJsonValue::LineString { .. }) {
        return Ok(None);
    }
    let line = LineString::<f64>::try_from(geometry.value.clone())
        .map_err(|e| Error::GeoJsonError(e.to_string()))?;
    Ok((line.0.len() >= 2).then_some(line))
}

/// Booleans may be stored as 0/1
fn as_flag(value: &Value) -> Option<bool> {
    value
        .as_bool()
        .or_else(|| value.as_f64().map(|v| v != 0.0))
}

struct GraphBuilder {
    graph: DiGraph<NetworkNode, EdgeAttributes>,
    nodes: HashMap<(i64, i64), NodeIndex>,
}

impl GraphBuilder {
    fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            nodes: HashMap::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn node(&mut self, coord: Coord<f64>) -> NodeIndex {
        let key = (
            (coord.x * NODE_PRECISION).round() as i64,
            (coord.y * NODE_PRECISION).round() as i64,
        );
        *self.nodes.entry(key).or_insert_with(|| {
            self.graph.add_node(NetworkNode {
                geometry: Point::from(coord),
            })
        })
    }

    fn add_edge(&mut self, edge: EdgeAttributes) {
        let (Some(first), Some(last)) = (edge.geometry.0.first(), edge.geometry.0.last()) else {
            return;
        };
        let (first, last) = (*first, *last);
        let u = self.node(first);
        let v = self.node(last);
        self.graph.add_edge(u, v, edge);
    }
}

fn assemble(
    records: Vec<SegmentRecord>,
    options: &LoadOptions,
    bidirectional: bool,
) -> Result<NetworkGraph, Error> {
    let mut next_pkey = records
        .iter()
        .filter_map(|r| r.pkey)
        .max()
        .map_or(0, |max| max + 1);
    let negate_incline = options.changes_sign.iter().any(|key| key == "incline");

    let mut builder = GraphBuilder::new();
    for record in records {
        let pkey = record.pkey.unwrap_or_else(|| {
            let assigned = next_pkey;
            next_pkey += 1;
            assigned
        });
        let length = record
            .length
            .unwrap_or_else(|| options.space.length(&record.geometry));

        let edge = EdgeAttributes {
            layer: Layer::from(record.layer.as_str()),
            length,
            width: record.width,
            incline: record.incline,
            curbramps: record.curbramps,
            pkey,
            reversed: record.reversed,
            geometry: record.geometry,
            extent: Extent::full(length, record.reversed),
            properties: record.properties,
        };

        if bidirectional {
            let reverse = reverse_edge(&edge, &options.changes_sign, negate_incline);
            builder.add_edge(edge);
            builder.add_edge(reverse);
        } else {
            builder.add_edge(edge);
        }
    }

    debug!(
        "Assembled graph with {} nodes and {} edges",
        builder.graph.node_count(),
        builder.graph.edge_count()
    );
    Ok(NetworkGraph::new(builder.graph, options.space))
}

fn reverse_edge(edge: &EdgeAttributes, changes_sign: &[String], negate_incline: bool) -> EdgeAttributes {
    let mut properties = edge.properties.clone();
    for key in changes_sign {
        if let Some(value) = properties.get_mut(key)
            && let Some(number) = value.as_f64()
        {
            *value = json!(-number);
        }
    }

    EdgeAttributes {
        incline: if negate_incline {
            edge.incline.map(|i| -i)
        } else {
            edge.incline
        },
        reversed: !edge.reversed,
        geometry: geometry::reversed(&edge.geometry),
        extent: Extent::new(edge.extent.end, edge.extent.start),
        properties,
        ..edge.clone()
    }
}

#[cfg(test)]
mod tests {
    use geojson::GeoJson;

    use super::*;

    fn layer(text: &str) -> FeatureCollection {
        FeatureCollection::try_from(text.parse::<GeoJson>().unwrap()).unwrap()
    }

    fn projected() -> LoadOptions {
        LoadOptions {
            space: CoordinateSpace::Projected,
            ..Default::default()
        }
    }

    const SIDEWALKS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature",
             "geometry": {"type": "LineString", "coordinates": [[0, 0], [10, 0]]},
             "properties": {"pkey": 4, "incline": 0.05, "width": 2.0, "surface": "asphalt"}},
            {"type": "Feature",
             "geometry": {"type": "LineString", "coordinates": [[10, 0], [10, 5]]},
             "properties": {}},
            {"type": "Feature",
             "geometry": {"type": "Point", "coordinates": [3, 3]},
             "properties": {}}
        ]
    }"#;

    #[test]
    fn layers_load_in_both_directions() {
        let graph = build_graph(&[("sidewalks".into(), layer(SIDEWALKS))], &projected()).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 4);

        let edges: Vec<&EdgeAttributes> = graph.edges().map(|(_, _, _, e)| e).collect();
        assert_eq!(edges[0].pkey, 4);
        assert_eq!(edges[1].pkey, 4);
        assert_eq!(edges[0].incline, Some(0.05));
        assert_eq!(edges[1].incline, Some(-0.05));
        assert!(edges[1].is_reversed());
        assert_eq!(edges[0].layer, Layer::Sidewalks);
        assert_eq!(edges[0].property("surface"), Some(&json!("asphalt")));
        assert!(edges[0].property("pkey").is_none());

        // assigned after the largest existing key, length derived from geometry
        assert_eq!(edges[2].pkey, 5);
        assert!((edges[2].length - 5.0).abs() < 1e-9);
    }

    #[test]
    fn negative_length_is_rejected() {
        let collection = layer(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature",
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 0]]},
                 "properties": {"length": -1}}]}"#,
        );
        let result = build_graph(&[("sidewalks".into(), collection)], &projected());
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn saved_graph_loads_back_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let graph = build_graph(&[("crossings".into(), layer(SIDEWALKS))], &projected()).unwrap();
        save_network(&graph, dir.path()).unwrap();

        let loaded = load_network(dir.path(), &projected()).unwrap();
        assert_eq!(loaded.edge_count(), graph.edge_count());
        assert_eq!(loaded.node_count(), graph.node_count());
        for ((_, _, _, a), (_, _, _, b)) in graph.edges().zip(loaded.edges()) {
            assert_eq!(a.pkey, b.pkey);
            assert_eq!(a.layer, b.layer);
            assert_eq!(a.extent, b.extent);
            assert_eq!(a.incline, b.incline);
            assert_eq!(a.properties, b.properties);
        }
        assert!(loaded.reverse_edge(petgraph::graph::EdgeIndex::new(0)).is_some());
    }

    #[test]
    fn direction_of_zero_length_segments_survives_a_save() {
        let dir = tempfile::tempdir().unwrap();
        let collection = layer(
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature",
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [10, 0]]},
                 "properties": {"length": 0}}]}"#,
        );
        let graph = build_graph(&[("sidewalks".into(), collection)], &projected()).unwrap();
        save_network(&graph, dir.path()).unwrap();

        let loaded = load_network(dir.path(), &projected()).unwrap();
        let directions: Vec<bool> = loaded.edges().map(|(_, _, _, e)| e.is_reversed()).collect();
        assert_eq!(directions, [false, true]);
        assert_eq!(loaded.edges_dwithin(Point::new(5.0, 0.0), 1.0).len(), 1);
    }

    #[test]
    fn layer_directory_is_read_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let layers = dir.path().join(LAYERS_DIR);
        std::fs::create_dir_all(&layers).unwrap();
        std::fs::write(layers.join("sidewalks.geojson"), SIDEWALKS).unwrap();

        let graph = load_network(dir.path(), &projected()).unwrap();
        assert_eq!(graph.edge_count(), 4);
        assert!(graph.edges().all(|(_, _, _, e)| e.layer == Layer::Sidewalks));
    }

    #[test]
    fn missing_directory_contents_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_network(dir.path(), &projected()),
            Err(Error::InvalidData(_))
        ));
    }
}
