//! Per-street reach scoring.
//!
//! A street is scored at a point along its geometry. From that point the
//! engine measures how much of the pedestrian network is reachable from the
//! street's sidewalks under each pedestrian profile, and how much of the
//! street network is reachable along the street itself. The score is the
//! mean sidewalk reach over the street reach.

use std::collections::{BTreeMap, BTreeSet};

use geo::Point;
use petgraph::graph::EdgeIndex;
use serde::{Deserialize, Serialize};

use crate::cost::{CostFunction, DynamicCost};
use crate::geometry;
use crate::matching::{Candidate, choose, match_candidates};
use crate::model::Layer;
use crate::network::NetworkContainer;
use crate::routing::{DijkstraOracle, ReachabilityOracle};
use crate::{EdgeAttributes, Error, MAX_COST, NetworkGraph, Profile, SEARCH_DISTANCE};

/// Number of sidewalks a street is compared against
const SIDES: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Fraction along the street where it is scored
    pub interpolate: f64,
    /// Cost budget of every reachable-set query
    pub max_cost: f64,
    /// Snapping radius
    pub search_distance: f64,
    pub street_candidates: usize,
    pub sidewalk_candidates: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            interpolate: 0.5,
            max_cost: MAX_COST,
            search_distance: SEARCH_DISTANCE,
            street_candidates: 4,
            sidewalk_candidates: 1,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.interpolate) {
            return Err(Error::InvalidConfig(format!(
                "interpolate must lie in [0, 1], got {}",
                self.interpolate
            )));
        }
        if !self.max_cost.is_finite() || self.max_cost < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "max_cost must be a non-negative number, got {}",
                self.max_cost
            )));
        }
        if !self.search_distance.is_finite() || self.search_distance <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "search_distance must be positive, got {}",
                self.search_distance
            )));
        }
        if self.street_candidates == 0 || self.sidewalk_candidates == 0 {
            return Err(Error::InvalidConfig(
                "candidate counts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reach ratio of one street per pedestrian profile, ordered by profile id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReachMetricResult(BTreeMap<String, f64>);

impl ReachMetricResult {
    pub fn get(&self, profile_id: &str) -> Option<f64> {
        self.0.get(profile_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(id, ratio)| (id.as_str(), *ratio))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for ReachMetricResult {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<ReachMetricResult> for BTreeMap<String, f64> {
    fn from(value: ReachMetricResult) -> Self {
        value.0
    }
}

/// Cost functions of one profile over one graph
struct ProfileCosts<'a> {
    profile: &'a Profile,
    weight_key: String,
    dynamic: DynamicCost,
    traversal: Box<dyn CostFunction>,
}

impl<'a> ProfileCosts<'a> {
    fn new(profile: &'a Profile, graph: &NetworkGraph) -> Self {
        Self {
            profile,
            weight_key: profile.weight_key(),
            dynamic: profile.dynamic_cost(),
            traversal: profile.cost_function(graph),
        }
    }

    /// Copies of `candidates` whose half edges carry their own weight, so a
    /// precomputed-weight traversal never sees the weight of the whole edge
    fn annotate(&self, candidates: &[Candidate]) -> Result<Vec<Candidate>, Error> {
        candidates
            .iter()
            .map(|candidate| candidate.with_weight(&self.weight_key, &self.dynamic))
            .collect()
    }
}

/// Scores street edges of a [`NetworkContainer`].
///
/// The scorer only borrows the networks, so one instance can be shared
/// across threads.
pub struct ReachScorer<'a, O = DijkstraOracle> {
    networks: &'a NetworkContainer,
    config: ScoringConfig,
    oracle: O,
    street: ProfileCosts<'a>,
    profiles: Vec<ProfileCosts<'a>>,
}

impl<'a> ReachScorer<'a> {
    pub fn with_defaults(networks: &'a NetworkContainer) -> Result<Self, Error> {
        Self::new(networks, ScoringConfig::default(), DijkstraOracle::default())
    }
}

impl<'a, O: ReachabilityOracle> ReachScorer<'a, O> {
    pub fn new(
        networks: &'a NetworkContainer,
        config: ScoringConfig,
        oracle: O,
    ) -> Result<Self, Error> {
        config.validate()?;

        let street = ProfileCosts::new(networks.street_profile()?, &networks.street.graph);
        let profiles = networks
            .scored_profiles()
            .map(|profile| ProfileCosts::new(profile, &networks.pedestrian.graph))
            .collect();

        Ok(Self {
            networks,
            config,
            oracle,
            street,
            profiles,
        })
    }

    /// Ids of the profiles every result carries
    pub fn profile_ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.profile.id.as_str())
    }

    /// Scores the street edge at `edge`
    pub fn score(&self, edge: EdgeIndex) -> Result<ReachMetricResult, Error> {
        let street = self
            .networks
            .street
            .graph
            .edge(edge)
            .ok_or(Error::InvalidEdgeIndex(edge.index()))?;
        self.score_edge(edge, street)
    }

    fn score_edge(
        &self,
        edge: EdgeIndex,
        street: &EdgeAttributes,
    ) -> Result<ReachMetricResult, Error> {
        let point = geometry::interpolate(&street.geometry, self.config.interpolate).ok_or_else(
            || Error::InvalidData(format!("Street edge {} has no geometry", edge.index())),
        )?;

        let sidewalk_ids = street.sidewalk_ids();
        if sidewalk_ids.is_empty() {
            log::trace!("Street edge {} has no sidewalks", edge.index());
            return Ok(self.zeros());
        }

        let street_graph = &self.networks.street.graph;
        let street_candidates = self.street.annotate(&match_candidates(
            street_graph,
            point,
            self.config.street_candidates,
            false,
            self.config.search_distance,
        ))?;
        let street_candidate = choose(
            street_graph,
            &street_candidates,
            self.street.traversal.as_ref(),
        )?
        .ok_or(Error::NoStreetCandidate {
            edge: edge.index(),
            pkey: street.pkey,
        })?;

        let sidewalks = self.sidewalk_candidates(point, &sidewalk_ids);
        let mut totals = Vec::with_capacity(self.profiles.len());
        for costs in &self.profiles {
            let mut total = 0.0;
            for candidates in &sidewalks {
                total += self.sidewalk_reach(costs, candidates)?;
            }
            totals.push((costs.profile.id.clone(), total));
        }

        let street_total = self
            .oracle
            .reachable(
                street_graph,
                street_candidate,
                self.street.traversal.as_ref(),
                self.config.max_cost,
            )?
            .total_length();

        Ok(totals
            .into_iter()
            .map(|(id, total)| (id, reach_ratio(total, street_total)))
            .collect())
    }

    /// Pedestrian candidates per requested sidewalk, found by projecting
    /// `point` onto each sidewalk near it
    fn sidewalk_candidates(&self, point: Point<f64>, ids: &[i64]) -> Vec<Vec<Candidate>> {
        let graph = &self.networks.pedestrian.graph;
        let mut wanted: BTreeSet<i64> = ids.iter().copied().collect();

        let mut sidewalks = Vec::with_capacity(wanted.len());
        for near in graph.edges_dwithin(point, self.config.search_distance) {
            if wanted.is_empty() {
                break;
            }
            let Some(edge) = graph.edge(near.edge) else {
                continue;
            };
            if edge.layer != Layer::Sidewalks || !wanted.remove(&edge.pkey) {
                continue;
            }
            sidewalks.push(match_candidates(
                graph,
                near.position.point,
                self.config.sidewalk_candidates,
                false,
                self.config.search_distance,
            ));
        }
        sidewalks
    }

    /// Deduplicated reachable length from one sidewalk under one profile
    fn sidewalk_reach(&self, costs: &ProfileCosts, candidates: &[Candidate]) -> Result<f64, Error> {
        let graph = &self.networks.pedestrian.graph;
        let annotated = costs.annotate(candidates)?;
        let Some(start) = choose(graph, &annotated, costs.traversal.as_ref())? else {
            return Ok(0.0);
        };

        let reachable = self.oracle.reachable(
            graph,
            start,
            costs.traversal.as_ref(),
            self.config.max_cost,
        )?;
        Ok(reachable.segment_length())
    }

    fn zeros(&self) -> ReachMetricResult {
        self.profile_ids().map(|id| (id.to_string(), 0.0)).collect()
    }
}

/// Mean sidewalk reach over street reach, 0 when the street reaches nothing
pub fn reach_ratio(sidewalk_total: f64, street_total: f64) -> f64 {
    if street_total > 0.0 {
        sidewalk_total / SIDES / street_total
    } else {
        0.0
    }
}
