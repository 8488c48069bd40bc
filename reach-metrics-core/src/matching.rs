//! Snapping points onto a network.
//!
//! A candidate is either an existing node, when the closest position on a
//! segment is one of its ends, or a pseudo-node on the segment bracketed by
//! the two directed edges that lead away from it (origins) or towards it
//! (destinations).

use geo::Point;
use petgraph::Direction;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::Error;
use crate::cost::{CostFunction, weight_value};
use crate::geometry;
use crate::model::{EdgeAttributes, NearEdge, NetworkGraph};

/// Fractions this close to a segment end snap onto the end node
const NODE_SNAP_EPSILON: f64 = 1e-9;

/// One half of a split segment
#[derive(Debug, Clone)]
pub struct CandidateEdge {
    /// Graph node at the other end of the half edge
    pub node: NodeIndex,
    pub attributes: EdgeAttributes,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    /// Snapped location on the network
    pub point: Point<f64>,
    /// Distance from the query point to `point`
    pub distance: f64,
    /// Indexed edge the candidate was found on
    pub source: EdgeIndex,
    pub is_destination: bool,
    /// Set when the candidate is an existing node
    pub node: Option<NodeIndex>,
    /// Half along the source edge direction
    pub edge1: Option<CandidateEdge>,
    /// Half along the reverse edge, if the segment has one
    pub edge2: Option<CandidateEdge>,
}

impl Candidate {
    pub fn edges(&self) -> impl Iterator<Item = &CandidateEdge> {
        self.edge1.iter().chain(self.edge2.iter())
    }

    /// A copy whose half edges carry `cost` under `key` (null when
    /// untraversable)
    pub fn with_weight(&self, key: &str, cost: &dyn CostFunction) -> Result<Candidate, Error> {
        let mut annotated = self.clone();
        for edge in annotated.edge1.iter_mut().chain(annotated.edge2.iter_mut()) {
            let weight = cost.cost(&edge.attributes)?;
            edge.attributes
                .properties
                .insert(key.to_string(), weight_value(weight));
        }
        Ok(annotated)
    }

    /// A candidate needs at least one traversable edge leaving it (origins)
    /// or entering it (destinations): a half edge for split candidates, a
    /// graph edge for node candidates
    fn is_usable(&self, graph: &NetworkGraph, cost: &dyn CostFunction) -> Result<bool, Error> {
        if let Some(node) = self.node {
            let direction = if self.is_destination {
                Direction::Incoming
            } else {
                Direction::Outgoing
            };
            for edge in graph.graph.edges_directed(node, direction) {
                if cost.cost(edge.weight())?.is_some() {
                    return Ok(true);
                }
            }
            return Ok(false);
        }
        for edge in self.edges() {
            if cost.cost(&edge.attributes)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Up to `k` candidates within `radius` of `point`, nearest first.
///
/// Candidates at equal distance keep the order of their source edge index.
pub fn match_candidates(
    graph: &NetworkGraph,
    point: Point<f64>,
    k: usize,
    is_destination: bool,
    radius: f64,
) -> Vec<Candidate> {
    graph
        .edges_dwithin(point, radius)
        .into_iter()
        .take(k)
        .filter_map(|near| candidate_on_edge(graph, &near, is_destination))
        .collect()
}

/// First candidate, in rank order, that the cost function can use
pub fn choose<'a>(
    graph: &NetworkGraph,
    candidates: &'a [Candidate],
    cost: &dyn CostFunction,
) -> Result<Option<&'a Candidate>, Error> {
    for candidate in candidates {
        if candidate.is_usable(graph, cost)? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

fn candidate_on_edge(
    graph: &NetworkGraph,
    near: &NearEdge,
    is_destination: bool,
) -> Option<Candidate> {
    let (u, v) = graph.endpoints(near.edge)?;
    let edge = graph.edge(near.edge)?;
    let t = near.position.fraction;

    let mut candidate = Candidate {
        point: near.position.point,
        distance: near.distance,
        source: near.edge,
        is_destination,
        node: None,
        edge1: None,
        edge2: None,
    };

    if t <= NODE_SNAP_EPSILON {
        candidate.node = Some(u);
        return Some(candidate);
    }
    if t >= 1.0 - NODE_SNAP_EPSILON {
        candidate.node = Some(v);
        return Some(candidate);
    }

    let reverse = graph
        .reverse_edge(near.edge)
        .and_then(|r| graph.edge(r))
        .map(|attributes| (attributes, 1.0 - t));

    if is_destination {
        // u -> pseudo along the edge, v -> pseudo along its reverse
        candidate.edge1 = Some(CandidateEdge {
            node: u,
            attributes: head_part(edge, t),
        });
        candidate.edge2 = reverse.map(|(attributes, rt)| CandidateEdge {
            node: v,
            attributes: head_part(attributes, rt),
        });
    } else {
        // pseudo -> v along the edge, pseudo -> u along its reverse
        candidate.edge1 = Some(CandidateEdge {
            node: v,
            attributes: tail_part(edge, t),
        });
        candidate.edge2 = reverse.map(|(attributes, rt)| CandidateEdge {
            node: u,
            attributes: tail_part(attributes, rt),
        });
    }

    Some(candidate)
}

fn head_part(edge: &EdgeAttributes, fraction: f64) -> EdgeAttributes {
    let (head, _) = geometry::split(&edge.geometry, fraction);
    EdgeAttributes {
        length: edge.length * fraction,
        geometry: head,
        extent: edge.extent.head(fraction),
        ..edge.clone()
    }
}

fn tail_part(edge: &EdgeAttributes, fraction: f64) -> EdgeAttributes {
    let (_, tail) = geometry::split(&edge.geometry, fraction);
    EdgeAttributes {
        length: edge.length * (1.0 - fraction),
        geometry: tail,
        extent: edge.extent.tail(fraction),
        ..edge.clone()
    }
}
