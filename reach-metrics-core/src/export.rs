//! Writing scored street networks as GeoJSON features

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use geojson::{Feature, Geometry, Value as GeoJsonValue, feature::Id};
use serde_json::{Map, Value, json};

use crate::network::NetworkContainer;
use crate::{EdgeAttributes, Error, NetworkGraph, WEIGHT_PREFIX, score_key};

/// Destination of exported street features
pub trait FeatureSink {
    fn write_batch(&mut self, features: Vec<Feature>) -> Result<(), Error>;

    /// Called once after the last batch
    fn finish(&mut self) -> Result<(), Error>;
}

/// Property columns written for every street feature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSchema {
    columns: Vec<String>,
}

impl ExportSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Every weight column on the street graph, then one score column per
    /// scored pedestrian profile
    pub fn for_networks(networks: &NetworkContainer) -> Self {
        let mut columns = networks.street.graph.columns_with_prefix(WEIGHT_PREFIX);
        columns.extend(networks.scored_profiles().map(|p| score_key(&p.id)));
        Self::new(columns)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Street edge as a feature carrying only schema columns, missing ones
    /// as null
    pub fn feature(&self, edge: &EdgeAttributes) -> Feature {
        let properties: Map<String, Value> = self
            .columns
            .iter()
            .map(|column| {
                let value = edge.property(column).cloned().unwrap_or(Value::Null);
                (column.clone(), value)
            })
            .collect();

        Feature {
            bbox: None,
            geometry: Some(Geometry::new(GeoJsonValue::from(&edge.geometry))),
            id: Some(Id::Number(edge.pkey.into())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Streams street features of `graph` to `sink` in batches of `batch_size`
pub fn export_features(
    graph: &NetworkGraph,
    schema: &ExportSchema,
    sink: &mut dyn FeatureSink,
    batch_size: usize,
) -> Result<usize, Error> {
    if batch_size == 0 {
        return Err(Error::InvalidConfig(
            "export batch size must be at least 1".to_string(),
        ));
    }

    let mut batch = Vec::with_capacity(batch_size.min(graph.edge_count()));
    let mut written = 0;
    for (_, _, _, edge) in graph.edges() {
        batch.push(schema.feature(edge));
        if batch.len() == batch_size {
            written += batch.len();
            sink.write_batch(std::mem::take(&mut batch))?;
        }
    }
    if !batch.is_empty() {
        written += batch.len();
        sink.write_batch(batch)?;
    }
    sink.finish()?;

    log::info!("Exported {written} street features");
    Ok(written)
}

/// Writes a GeoJSON FeatureCollection, one feature at a time, tagged with
/// the legacy `crs` member for EPSG:4326
pub struct GeoJsonSink<W: Write> {
    writer: W,
    started: bool,
    written: usize,
}

impl GeoJsonSink<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self, Error> {
        let file = File::create(path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to create '{}': {e}", path.display()),
            )
        })?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> GeoJsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            started: false,
            written: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn start(&mut self) -> Result<(), Error> {
        if !self.started {
            let crs = json!({
                "type": "name",
                "properties": {"name": "urn:ogc:def:crs:EPSG::4326"},
            });
            write!(
                self.writer,
                r#"{{"type":"FeatureCollection","crs":{crs},"features":["#
            )?;
            self.started = true;
        }
        Ok(())
    }
}

impl<W: Write> FeatureSink for GeoJsonSink<W> {
    fn write_batch(&mut self, features: Vec<Feature>) -> Result<(), Error> {
        self.start()?;
        for feature in &features {
            if self.written > 0 {
                self.writer.write_all(b",")?;
            }
            serde_json::to_writer(&mut self.writer, feature)?;
            self.written += 1;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.start()?;
        self.writer.write_all(b"]}")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps exported features in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub features: Vec<Feature>,
    pub batches: usize,
    pub finished: bool,
}

impl FeatureSink for MemorySink {
    fn write_batch(&mut self, features: Vec<Feature>) -> Result<(), Error> {
        self.features.extend(features);
        self.batches += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), Error> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use geojson::{FeatureCollection, GeoJson};
    use serde_json::json;

    use super::*;
    use crate::test_support::{line, projected_graph};

    fn scored_graph() -> NetworkGraph {
        projected_graph(&[
            (
                "streets",
                line(&[(0.0, 0.0), (10.0, 0.0)]),
                json!({"pkey": 7, "name": "Main St", "nsr_walking": 0.5, "_weight_walking": 10.0}),
            ),
            (
                "streets",
                line(&[(10.0, 0.0), (20.0, 0.0)]),
                json!({"pkey": 8, "name": "Side St"}),
            ),
        ])
    }

    #[test]
    fn features_carry_only_schema_columns() {
        let graph = scored_graph();
        let schema = ExportSchema::new(vec!["_weight_walking".into(), "nsr_walking".into()]);
        let mut sink = MemorySink::default();

        let written = export_features(&graph, &schema, &mut sink, 3).unwrap();
        assert_eq!(written, 4);
        assert_eq!(sink.batches, 2);
        assert!(sink.finished);

        let first = &sink.features[0];
        assert_eq!(first.id, Some(Id::Number(7.into())));
        let properties = first.properties.as_ref().unwrap();
        assert_eq!(properties.len(), 2);
        assert_eq!(properties["nsr_walking"], json!(0.5));
        assert!(!properties.contains_key("name"));

        let missing = sink.features[2].properties.as_ref().unwrap();
        assert_eq!(missing["nsr_walking"], Value::Null);
    }

    #[test]
    fn geojson_sink_writes_a_feature_collection() {
        let graph = scored_graph();
        let schema = ExportSchema::new(vec!["nsr_walking".into()]);
        let mut sink = GeoJsonSink::new(Vec::new());
        export_features(&graph, &schema, &mut sink, 1000).unwrap();
        assert_eq!(sink.written(), 4);

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let raw: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            raw["crs"]["properties"]["name"],
            json!("urn:ogc:def:crs:EPSG::4326")
        );

        let collection = FeatureCollection::try_from(text.parse::<GeoJson>().unwrap()).unwrap();
        assert_eq!(collection.features.len(), 4);
    }

    #[test]
    fn empty_export_is_still_valid() {
        let graph = projected_graph(&[]);
        let mut sink = GeoJsonSink::new(Vec::new());
        export_features(&graph, &ExportSchema::new(vec![]), &mut sink, 10).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.parse::<GeoJson>().is_ok());
    }
}
