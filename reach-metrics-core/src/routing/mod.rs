//! Reachable-set search over a network graph

mod dijkstra;
mod state;

pub use dijkstra::DijkstraOracle;

use std::collections::BTreeMap;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::Error;
use crate::cost::CostFunction;
use crate::matching::Candidate;
use crate::model::{Extent, NetworkGraph};

/// Computes the part of a network within a cost budget of a candidate
pub trait ReachabilityOracle: Send + Sync {
    fn reachable(
        &self,
        graph: &NetworkGraph,
        start: &Candidate,
        cost: &dyn CostFunction,
        max_cost: f64,
    ) -> Result<Reachable, Error>;
}

/// Where a reached edge comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeSource {
    Graph(EdgeIndex),
    /// One of the start candidate's half edges
    Candidate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReachedEdge {
    pub source: EdgeSource,
    pub pkey: i64,
    /// Reached length; shorter than the edge when `partial`
    pub length: f64,
    pub extent: Extent,
    pub partial: bool,
}

/// Nodes and edges reached within the budget
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reachable {
    /// Reached nodes and their cost, ordered by node index
    pub nodes: Vec<(NodeIndex, f64)>,
    pub edges: Vec<ReachedEdge>,
}

impl Reachable {
    /// Sum of reached edge lengths
    pub fn total_length(&self) -> f64 {
        self.edges.iter().map(|e| e.length).sum()
    }

    /// Reached length counting each physical segment at most once.
    ///
    /// Extents of edges sharing a `pkey` are merged, so both directions of a
    /// segment count once while the two halves of a split segment add up.
    pub fn segment_length(&self) -> f64 {
        let mut segments: BTreeMap<i64, Vec<(f64, f64)>> = BTreeMap::new();
        for edge in &self.edges {
            segments
                .entry(edge.pkey)
                .or_default()
                .push((edge.extent.low(), edge.extent.high()));
        }

        segments
            .into_values()
            .map(|mut spans| {
                spans.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
                let mut covered = 0.0;
                let mut current: Option<(f64, f64)> = None;
                for (low, high) in spans {
                    match current {
                        Some((c_low, c_high)) if low <= c_high => {
                            current = Some((c_low, c_high.max(high)));
                        }
                        Some((c_low, c_high)) => {
                            covered += c_high - c_low;
                            current = Some((low, high));
                        }
                        None => current = Some((low, high)),
                    }
                }
                covered + current.map_or(0.0, |(low, high)| high - low)
            })
            .sum()
    }
}
