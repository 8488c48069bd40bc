use std::collections::BinaryHeap;

use fixedbitset::FixedBitSet;
use hashbrown::HashMap;
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

use super::state::State;
use super::{EdgeSource, Reachable, ReachabilityOracle, ReachedEdge};
use crate::Error;
use crate::cost::CostFunction;
use crate::matching::Candidate;
use crate::model::{EdgeAttributes, NetworkGraph};

/// Dijkstra search bounded by a cost budget.
///
/// Reached edges are the shortest-path tree edges. With `include_fringe`,
/// edges leading from a reached node to a node beyond the budget are added
/// as partial edges, cut where the remaining budget runs out.
#[derive(Debug, Clone, Copy)]
pub struct DijkstraOracle {
    pub include_fringe: bool,
}

impl Default for DijkstraOracle {
    fn default() -> Self {
        Self {
            include_fringe: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Graph(EdgeIndex),
    /// Index into the start candidate's half edges
    Candidate(usize),
}

struct FringeEdge {
    from_cost: f64,
    step: Step,
    edge_cost: f64,
    target: NodeIndex,
}

#[derive(Default)]
struct Search {
    distances: HashMap<NodeIndex, f64>,
    steps: HashMap<NodeIndex, Step>,
    heap: BinaryHeap<State>,
    fringe: Vec<FringeEdge>,
}

impl Search {
    fn relax(&mut self, node: NodeIndex, cost: f64, step: Step) {
        let improved = self
            .distances
            .get(&node)
            .is_none_or(|&best| cost < best);
        if improved {
            self.distances.insert(node, cost);
            self.steps.insert(node, step);
            self.heap.push(State { cost, node });
        }
    }

    fn visit(
        &mut self,
        from_cost: f64,
        step: Step,
        edge_cost: f64,
        target: NodeIndex,
        max_cost: f64,
    ) {
        let next_cost = from_cost + edge_cost;
        if next_cost <= max_cost {
            self.relax(target, next_cost, step);
        } else {
            self.fringe.push(FringeEdge {
                from_cost,
                step,
                edge_cost,
                target,
            });
        }
    }
}

fn attributes_of<'a>(
    graph: &'a NetworkGraph,
    halves: &[&'a EdgeAttributes],
    step: Step,
) -> Option<(EdgeSource, &'a EdgeAttributes)> {
    match step {
        Step::Graph(edge) => graph.edge(edge).map(|a| (EdgeSource::Graph(edge), a)),
        Step::Candidate(slot) => halves.get(slot).map(|a| (EdgeSource::Candidate, *a)),
    }
}

impl ReachabilityOracle for DijkstraOracle {
    fn reachable(
        &self,
        graph: &NetworkGraph,
        start: &Candidate,
        cost: &dyn CostFunction,
        max_cost: f64,
    ) -> Result<Reachable, Error> {
        if start.is_destination {
            return Err(Error::InvalidData(
                "reachable sets must start from an origin candidate".to_string(),
            ));
        }
        if max_cost.is_nan() || max_cost < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "cost budget must be non-negative, got {max_cost}"
            )));
        }

        let halves: Vec<&EdgeAttributes> = start.edges().map(|e| &e.attributes).collect();
        let mut search = Search::default();
        let mut settled = FixedBitSet::with_capacity(graph.node_count());

        if let Some(node) = start.node {
            search.distances.insert(node, 0.0);
            search.heap.push(State { cost: 0.0, node });
        } else {
            for (slot, half) in start.edges().enumerate() {
                if let Some(edge_cost) = cost.cost(&half.attributes)? {
                    search.visit(0.0, Step::Candidate(slot), edge_cost, half.node, max_cost);
                }
            }
        }

        while let Some(State { cost: node_cost, node }) = search.heap.pop() {
            if settled.put(node.index()) {
                continue;
            }

            for edge in graph.graph.edges(node) {
                let Some(edge_cost) = cost.cost(edge.weight())? else {
                    continue;
                };
                search.visit(
                    node_cost,
                    Step::Graph(edge.id()),
                    edge_cost,
                    edge.target(),
                    max_cost,
                );
            }
        }

        let mut steps: Vec<(NodeIndex, Step)> =
            search.steps.iter().map(|(n, s)| (*n, *s)).collect();
        steps.sort_by_key(|(node, _)| *node);

        let mut edges: Vec<ReachedEdge> = steps
            .into_iter()
            .filter_map(|(_, step)| attributes_of(graph, &halves, step))
            .map(|(source, attributes)| ReachedEdge {
                source,
                pkey: attributes.pkey,
                length: attributes.length,
                extent: attributes.extent,
                partial: false,
            })
            .collect();

        if self.include_fringe {
            for fringe in &search.fringe {
                if search.distances.contains_key(&fringe.target) {
                    continue;
                }
                let remaining = max_cost - fringe.from_cost;
                if remaining <= 0.0 || fringe.edge_cost <= 0.0 {
                    continue;
                }
                let Some((source, attributes)) = attributes_of(graph, &halves, fringe.step) else {
                    continue;
                };
                let fraction = (remaining / fringe.edge_cost).clamp(0.0, 1.0);
                edges.push(ReachedEdge {
                    source,
                    pkey: attributes.pkey,
                    length: attributes.length * fraction,
                    extent: attributes.extent.head(fraction),
                    partial: true,
                });
            }
        }

        let mut nodes: Vec<(NodeIndex, f64)> = search.distances.into_iter().collect();
        nodes.sort_by_key(|(node, _)| *node);

        log::trace!(
            "Reached {} nodes and {} edges within {max_cost}",
            nodes.len(),
            edges.len()
        );

        Ok(Reachable { nodes, edges })
    }
}
