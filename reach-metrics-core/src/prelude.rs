pub use crate::{MAX_COST, SEARCH_DISTANCE};
pub use petgraph::graph::EdgeIndex;

// Re-export key components
pub use crate::batch::{
    BatchConfig, BatchRunner, BatchSummary, FailurePolicy, precalculate_weights,
};
pub use crate::export::{ExportSchema, FeatureSink, GeoJsonSink, MemorySink};
pub use crate::loading::{LoadOptions, load_network, parse_profiles, save_network};
pub use crate::network::{NetworkContainer, RoutingContext};
pub use crate::reach::{ReachMetricResult, ReachScorer, ScoringConfig};
pub use crate::routing::{DijkstraOracle, ReachabilityOracle, Reachable};

// Graph and cost model
pub use crate::cost::{CostFunction, CostParameters, DynamicCost, StaticWeightCost};
pub use crate::geometry::CoordinateSpace;
pub use crate::matching::{Candidate, choose, match_candidates};
pub use crate::{EdgeAttributes, Error, Layer, NetworkGraph, Profile};
