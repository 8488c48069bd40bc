//! Walking-cost functions.
//!
//! A cost function maps an edge to `Ok(Some(cost))`, to `Ok(None)` when the
//! edge cannot be traversed, or to an error when the edge data does not fit
//! the function at all (an unknown layer, a malformed stored weight).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{EdgeAttributes, Layer};
use crate::{Error, weight_key};

/// Minimum sidewalk length for which the incline limits apply
const INCLINE_MIN_LENGTH: f64 = 3.0;

pub trait CostFunction: Send + Sync {
    fn cost(&self, edge: &EdgeAttributes) -> Result<Option<f64>, Error>;
}

/// Parameters of a profile's cost function, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostParameters {
    Pedestrian(PedestrianCostParameters),
    Distance(DistanceCostParameters),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PedestrianCostParameters {
    /// Steepest tolerated downhill incline, as a positive fraction
    pub downhill: f64,
    /// Steepest tolerated uphill incline
    pub uphill: f64,
    pub avoid_curbs: bool,
    pub elevators: bool,
    pub min_width: f64,
    /// Walking speed. Costs stay length-based; kept so profiles that set it
    /// still parse.
    pub base_speed: f64,
}

impl Default for PedestrianCostParameters {
    fn default() -> Self {
        Self {
            downhill: 0.1,
            uphill: 0.085,
            avoid_curbs: true,
            elevators: false,
            min_width: 1.0,
            base_speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistanceCostParameters {
    pub min_width: Option<f64>,
}

/// Cost function evaluated from profile parameters
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicCost {
    Pedestrian(PedestrianCostParameters),
    Distance(DistanceCostParameters),
}

impl DynamicCost {
    pub fn new(parameters: &CostParameters) -> Self {
        match parameters {
            CostParameters::Pedestrian(p) => DynamicCost::Pedestrian(p.clone()),
            CostParameters::Distance(p) => DynamicCost::Distance(p.clone()),
        }
    }
}

impl CostFunction for DynamicCost {
    fn cost(&self, edge: &EdgeAttributes) -> Result<Option<f64>, Error> {
        match self {
            DynamicCost::Pedestrian(p) => pedestrian_cost(p, edge),
            DynamicCost::Distance(p) => {
                if let (Some(width), Some(min_width)) = (edge.width, p.min_width)
                    && width < min_width
                {
                    return Ok(None);
                }
                Ok(Some(edge.length))
            }
        }
    }
}

fn pedestrian_cost(
    p: &PedestrianCostParameters,
    edge: &EdgeAttributes,
) -> Result<Option<f64>, Error> {
    if let Some(width) = edge.width
        && width < p.min_width
    {
        return Ok(None);
    }

    let traversable = match &edge.layer {
        Layer::Sidewalks => {
            // Missing inclines are treated as flat
            let incline = edge.incline.unwrap_or(0.0);
            edge.length <= INCLINE_MIN_LENGTH || (incline <= p.uphill && incline >= -p.downhill)
        }
        Layer::Crossings => !p.avoid_curbs || edge.curbramps.unwrap_or(false),
        Layer::ElevatorPaths => p.elevators,
        Layer::Other(name) => return Err(Error::UnknownLayer(name.clone())),
    };

    Ok(traversable.then_some(edge.length))
}

/// Reads a precomputed `_weight_<profile>` column; null or missing means
/// untraversable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticWeightCost {
    key: String,
}

impl StaticWeightCost {
    pub fn new(profile_id: &str) -> Self {
        Self {
            key: weight_key(profile_id),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl CostFunction for StaticWeightCost {
    fn cost(&self, edge: &EdgeAttributes) -> Result<Option<f64>, Error> {
        match edge.properties.get(&self.key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => match value.as_f64() {
                Some(weight) if weight >= 0.0 => Ok(Some(weight)),
                _ => Err(Error::InvalidWeight {
                    key: self.key.clone(),
                    value: value.to_string(),
                }),
            },
        }
    }
}

/// The value stored in a weight column for a computed cost
pub fn weight_value(cost: Option<f64>) -> Value {
    cost.map_or(Value::Null, Value::from)
}
