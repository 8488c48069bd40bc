use serde::{Deserialize, Serialize};

use super::graph::NetworkGraph;
use crate::cost::{CostFunction, CostParameters, DynamicCost, StaticWeightCost};

/// Named walking-cost profile of one network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Profile {
    pub id: String,
    /// Persist `_weight_<id>` columns during weight precomputation
    #[serde(default)]
    pub precalculate: bool,
    /// Leave this profile out of reach scoring (it is still precomputed)
    #[serde(default)]
    pub skip_scoring: bool,
    pub cost: CostParameters,
}

impl Profile {
    pub fn new(id: impl Into<String>, cost: CostParameters) -> Self {
        Self {
            id: id.into(),
            precalculate: false,
            skip_scoring: false,
            cost,
        }
    }

    pub fn weight_key(&self) -> String {
        crate::weight_key(&self.id)
    }

    pub fn dynamic_cost(&self) -> DynamicCost {
        DynamicCost::new(&self.cost)
    }

    pub fn static_cost(&self) -> StaticWeightCost {
        StaticWeightCost::new(&self.id)
    }

    /// Cost function to traverse `graph` with.
    ///
    /// Uses the precomputed weight column when the profile is precalculated
    /// and every edge already carries it, otherwise evaluates the parameters.
    pub fn cost_function(&self, graph: &NetworkGraph) -> Box<dyn CostFunction> {
        if self.precalculate && graph.has_column(&self.weight_key()) {
            log::debug!("Profile '{}' uses precomputed weights", self.id);
            Box::new(self.static_cost())
        } else {
            Box::new(self.dynamic_cost())
        }
    }
}
