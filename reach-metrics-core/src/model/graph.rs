//! Directed network graph with an R-tree over its physical segments

use std::collections::BTreeSet;

use geo::{BoundingRect, Point};
use itertools::Itertools;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use rstar::RTree;
use rstar::primitives::{GeomWithData, Rectangle};
use serde_json::{Map, Value};

use super::edge::{EdgeAttributes, NetworkNode};
use crate::Error;
use crate::geometry::{self, CoordinateSpace, LinePosition};

// Data is the index of the forward edge of a physical segment
type EdgeRtreeItem = GeomWithData<Rectangle<[f64; 2]>, EdgeIndex>;

/// Edge found near a query point
#[derive(Debug, Clone, Copy)]
pub struct NearEdge {
    pub edge: EdgeIndex,
    /// Distance from the query point to the edge geometry
    pub distance: f64,
    /// Closest position on the edge geometry
    pub position: LinePosition,
}

/// Partial attribute update for one edge
#[derive(Debug, Clone)]
pub struct EdgeUpdate {
    pub edge: EdgeIndex,
    pub properties: Map<String, Value>,
}

/// Pedestrian or street network
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    pub graph: DiGraph<NetworkNode, EdgeAttributes>,
    space: CoordinateSpace,
    rtree: RTree<EdgeRtreeItem>,
}

impl NetworkGraph {
    pub fn new(graph: DiGraph<NetworkNode, EdgeAttributes>, space: CoordinateSpace) -> Self {
        let mut network = Self {
            graph,
            space,
            rtree: RTree::new(),
        };
        network.rebuild_index();
        network
    }

    pub fn space(&self) -> CoordinateSpace {
        self.space
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn edge(&self, edge: EdgeIndex) -> Option<&EdgeAttributes> {
        self.graph.edge_weight(edge)
    }

    pub fn endpoints(&self, edge: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(edge)
    }

    /// All edges as `(u, v, index, attributes)` in index order
    pub fn edges(
        &self,
    ) -> impl Iterator<Item = (NodeIndex, NodeIndex, EdgeIndex, &EdgeAttributes)> {
        self.graph
            .edge_references()
            .map(|e| (e.source(), e.target(), e.id(), e.weight()))
    }

    /// The opposite direction over the same physical segment, if present
    pub fn reverse_edge(&self, edge: EdgeIndex) -> Option<EdgeIndex> {
        let (u, v) = self.endpoints(edge)?;
        let pkey = self.edge(edge)?.pkey;
        self.graph
            .edges_connecting(v, u)
            .find(|e| e.weight().pkey == pkey && e.id() != edge)
            .map(|e| e.id())
    }

    /// Rebuilds the spatial index, one entry per physical segment.
    ///
    /// Segments are indexed through their forward edge; a segment that only
    /// exists as a reversed edge is indexed through that edge instead.
    pub fn rebuild_index(&mut self) {
        let has_forward: BTreeSet<i64> = self
            .graph
            .edge_weights()
            .filter(|e| !e.is_reversed())
            .map(|e| e.pkey)
            .collect();

        let items: Vec<EdgeRtreeItem> = self
            .graph
            .edge_references()
            .filter(|e| !e.weight().is_reversed() || !has_forward.contains(&e.weight().pkey))
            .filter_map(|e| {
                let rect = e.weight().geometry.bounding_rect()?;
                let envelope = Rectangle::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                );
                Some(GeomWithData::new(envelope, e.id()))
            })
            .collect();

        log::debug!(
            "Spatial index rebuilt with {} segments out of {} edges",
            items.len(),
            self.graph.edge_count()
        );
        self.rtree = RTree::bulk_load(items);
    }

    /// Indexed edges within `radius` of `point`, nearest first.
    ///
    /// Ties are ordered by edge index.
    pub fn edges_dwithin(&self, point: Point<f64>, radius: f64) -> Vec<NearEdge> {
        let envelope = self.space.envelope(point, radius);
        self.rtree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|item| {
                let edge = item.data;
                let position = geometry::locate(&self.graph[edge].geometry, point)?;
                let distance = self.space.distance(point, position.point);
                (distance <= radius).then_some(NearEdge {
                    edge,
                    distance,
                    position,
                })
            })
            .sorted_by(|a, b| {
                a.distance
                    .total_cmp(&b.distance)
                    .then_with(|| a.edge.cmp(&b.edge))
            })
            .collect()
    }

    /// Merges property updates into edges.
    ///
    /// The batch is validated before anything is written, so a bad index
    /// leaves the graph untouched.
    pub fn update_edges(&mut self, batch: Vec<EdgeUpdate>) -> Result<(), Error> {
        if let Some(bad) = batch
            .iter()
            .find(|update| update.edge.index() >= self.graph.edge_count())
        {
            return Err(Error::InvalidEdgeIndex(bad.edge.index()));
        }

        for EdgeUpdate { edge, properties } in batch {
            self.graph[edge].properties.extend(properties);
        }
        Ok(())
    }

    /// True when every edge carries a value under `key`
    pub fn has_column(&self, key: &str) -> bool {
        self.graph.edge_count() > 0
            && self
                .graph
                .edge_weights()
                .all(|e| e.properties.contains_key(key))
    }

    /// Sorted names of every property starting with `prefix`
    pub fn columns_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.graph
            .edge_weights()
            .flat_map(|e| e.properties.keys())
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use geo::Point;
    use serde_json::json;

    use super::*;
    use crate::test_support::{line, projected_graph};

    #[test]
    fn indexes_each_segment_once() {
        let graph = projected_graph(&[("sidewalks", line(&[(0.0, 0.0), (10.0, 0.0)]), json!({}))]);
        assert_eq!(graph.edge_count(), 2);

        let near = graph.edges_dwithin(Point::new(5.0, 1.0), 30.0);
        assert_eq!(near.len(), 1);
        assert!(!graph.graph[near[0].edge].is_reversed());
        assert!((near[0].distance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn zero_length_segments_are_indexed_once() {
        let graph = projected_graph(&[(
            "sidewalks",
            line(&[(0.0, 0.0), (10.0, 0.0)]),
            json!({"length": 0.0}),
        )]);
        let near = graph.edges_dwithin(Point::new(5.0, 1.0), 30.0);
        assert_eq!(near.len(), 1);
        assert!(!graph.graph[near[0].edge].is_reversed());
    }

    #[test]
    fn dwithin_sorts_by_distance_and_respects_radius() {
        let graph = projected_graph(&[
            ("sidewalks", line(&[(0.0, 5.0), (10.0, 5.0)]), json!({})),
            ("sidewalks", line(&[(0.0, 1.0), (10.0, 1.0)]), json!({})),
            ("sidewalks", line(&[(0.0, 50.0), (10.0, 50.0)]), json!({})),
        ]);
        let near = graph.edges_dwithin(Point::new(5.0, 0.0), 30.0);
        let distances: Vec<f64> = near.iter().map(|n| n.distance).collect();
        assert_eq!(distances.len(), 2);
        assert!((distances[0] - 1.0).abs() < 1e-9);
        assert!((distances[1] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn reverse_edge_shares_pkey() {
        let graph = projected_graph(&[("sidewalks", line(&[(0.0, 0.0), (10.0, 0.0)]), json!({}))]);
        let forward = EdgeIndex::new(0);
        let reverse = graph.reverse_edge(forward).unwrap();
        assert_ne!(forward, reverse);
        assert_eq!(graph.graph[forward].pkey, graph.graph[reverse].pkey);
        assert_eq!(graph.reverse_edge(reverse), Some(forward));
    }

    #[test]
    fn rejected_update_batch_writes_nothing() {
        let mut graph =
            projected_graph(&[("sidewalks", line(&[(0.0, 0.0), (10.0, 0.0)]), json!({}))]);
        let mut properties = Map::new();
        properties.insert("_weight_p".into(), json!(1.0));

        let batch = vec![
            EdgeUpdate {
                edge: EdgeIndex::new(0),
                properties: properties.clone(),
            },
            EdgeUpdate {
                edge: EdgeIndex::new(99),
                properties,
            },
        ];
        assert!(matches!(
            graph.update_edges(batch),
            Err(Error::InvalidEdgeIndex(99))
        ));
        assert!(graph.columns_with_prefix("_weight_").is_empty());
        assert!(!graph.has_column("_weight_p"));
    }
}
