//! Scoring whole street networks.
//!
//! Street edges are scored in index order, one chunk at a time. Each chunk is
//! scored in parallel against the immutable networks and then committed to
//! the street graph in edge order by the calling thread, so a chunk is
//! either written completely or not at all.

use log::{debug, info, warn};
use petgraph::graph::EdgeIndex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, json};

use crate::cost::{CostFunction, weight_value};
use crate::export::{ExportSchema, FeatureSink, export_features};
use crate::model::EdgeUpdate;
use crate::network::NetworkContainer;
use crate::reach::{ReachMetricResult, ReachScorer, ScoringConfig};
use crate::routing::{DijkstraOracle, ReachabilityOracle};
use crate::{BATCH_SIZE, EXPORT_BATCH_SIZE, Error, NetworkGraph, Profile, score_key};

/// What to do with a street edge that fails to score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop the run and return the error
    #[default]
    Abort,
    /// Log the edge and continue without a score
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub export_batch_size: usize,
    pub failure_policy: FailurePolicy,
    pub scoring: ScoringConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: BATCH_SIZE,
            export_batch_size: EXPORT_BATCH_SIZE,
            failure_policy: FailurePolicy::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.batch_size == 0 || self.export_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "batch sizes must be at least 1".to_string(),
            ));
        }
        self.scoring.validate()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Street edges that received scores
    pub scored: usize,
    /// Street edges left unscored under [`FailurePolicy::Skip`]
    pub skipped: usize,
    /// Features handed to the sink
    pub exported: usize,
}

pub struct BatchRunner<O = DijkstraOracle> {
    config: BatchConfig,
    oracle: O,
}

impl BatchRunner {
    pub fn new(config: BatchConfig) -> Self {
        Self::with_oracle(config, DijkstraOracle::default())
    }
}

impl<O: ReachabilityOracle + Clone> BatchRunner<O> {
    pub fn with_oracle(config: BatchConfig, oracle: O) -> Self {
        Self { config, oracle }
    }

    /// Scores every street edge, then exports the street network to `sink`
    pub fn run(
        &self,
        networks: &mut NetworkContainer,
        sink: &mut dyn FeatureSink,
        progress: &mut dyn FnMut(usize),
    ) -> Result<BatchSummary, Error> {
        let mut summary = self.score_all(networks, progress)?;
        summary.exported = self.export(networks, sink)?;
        Ok(summary)
    }

    /// Scores every street edge and writes `nsr_<profile>` columns onto the
    /// street graph. `progress` receives the number of processed edges.
    pub fn score_all(
        &self,
        networks: &mut NetworkContainer,
        progress: &mut dyn FnMut(usize),
    ) -> Result<BatchSummary, Error> {
        self.config.validate()?;

        let edge_count = networks.street.graph.edge_count();
        info!(
            "Scoring {edge_count} street edges in batches of {}",
            self.config.batch_size
        );

        let mut summary = BatchSummary::default();
        let mut processed = 0;
        for start in (0..edge_count).step_by(self.config.batch_size) {
            let end = (start + self.config.batch_size).min(edge_count);
            let results = self.score_chunk(networks, start..end)?;

            let mut updates = Vec::with_capacity(results.len());
            for (edge, result) in results {
                match result {
                    Ok(scores) => {
                        updates.push(score_update(edge, &scores));
                        summary.scored += 1;
                    }
                    Err(err) => match self.config.failure_policy {
                        FailurePolicy::Abort => return Err(err),
                        FailurePolicy::Skip => {
                            let pkey = networks.street.graph.edge(edge).map(|e| e.pkey);
                            warn!(
                                "Skipping street edge {} (pkey {pkey:?}): {err}",
                                edge.index()
                            );
                            summary.skipped += 1;
                        }
                    },
                }
                processed += 1;
                progress(processed);
            }

            networks.street.graph.update_edges(updates)?;
            debug!("Committed street edges {start}..{end}");
        }

        info!(
            "Scored {} street edges, skipped {}",
            summary.scored, summary.skipped
        );
        Ok(summary)
    }

    fn score_chunk(
        &self,
        networks: &NetworkContainer,
        edges: std::ops::Range<usize>,
    ) -> Result<Vec<(EdgeIndex, Result<ReachMetricResult, Error>)>, Error> {
        let scorer = ReachScorer::new(
            networks,
            self.config.scoring.clone(),
            self.oracle.clone(),
        )?;
        Ok(edges
            .into_par_iter()
            .map(|i| {
                let edge = EdgeIndex::new(i);
                (edge, scorer.score(edge))
            })
            .collect())
    }

    /// Streams the street network to `sink` with the columns of
    /// [`ExportSchema::for_networks`]
    pub fn export(
        &self,
        networks: &NetworkContainer,
        sink: &mut dyn FeatureSink,
    ) -> Result<usize, Error> {
        let schema = ExportSchema::for_networks(networks);
        debug!("Export columns: {:?}", schema.columns());
        export_features(
            &networks.street.graph,
            &schema,
            sink,
            self.config.export_batch_size,
        )
    }
}

fn score_update(edge: EdgeIndex, scores: &ReachMetricResult) -> EdgeUpdate {
    let properties: Map<_, _> = scores
        .iter()
        .map(|(id, ratio)| (score_key(id), json!(ratio)))
        .collect();
    EdgeUpdate { edge, properties }
}

/// Stores `_weight_<id>` on every edge of `graph` for each profile flagged
/// `precalculate`. Returns the number of weights written; `progress`
/// receives the running count.
pub fn precalculate_weights(
    graph: &mut NetworkGraph,
    profiles: &[Profile],
    batch_size: usize,
    progress: &mut dyn FnMut(usize),
) -> Result<usize, Error> {
    if batch_size == 0 {
        return Err(Error::InvalidConfig(
            "batch size must be at least 1".to_string(),
        ));
    }

    let edge_count = graph.edge_count();
    let mut written = 0;
    for profile in profiles.iter().filter(|p| p.precalculate) {
        let cost = profile.dynamic_cost();
        let key = profile.weight_key();
        info!("Computing '{key}' for {edge_count} edges");

        for start in (0..edge_count).step_by(batch_size) {
            let end = (start + batch_size).min(edge_count);
            let updates = weight_updates(graph, &cost, &key, start..end)?;
            written += updates.len();
            graph.update_edges(updates)?;
            progress(written);
        }
    }
    Ok(written)
}

fn weight_updates(
    graph: &NetworkGraph,
    cost: &dyn CostFunction,
    key: &str,
    edges: std::ops::Range<usize>,
) -> Result<Vec<EdgeUpdate>, Error> {
    edges
        .into_par_iter()
        .map(|i| {
            let edge = EdgeIndex::new(i);
            let attributes = graph.edge(edge).ok_or(Error::InvalidEdgeIndex(i))?;
            let mut properties = Map::new();
            properties.insert(key.to_string(), weight_value(cost.cost(attributes)?));
            Ok(EdgeUpdate { edge, properties })
        })
        .collect()
}
