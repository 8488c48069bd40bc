//! Pedestrian reach metrics for street networks.
//!
//! For every street segment the engine compares how far a pedestrian can
//! travel from the adjacent sidewalks, under a set of walking-cost profiles,
//! against how far travel is possible along the street itself. The resulting
//! per-profile ratio is the "network stress ratio" written to the `nsr_*`
//! output columns.

pub mod batch;
pub mod cost;
pub mod error;
pub mod export;
pub mod geometry;
pub mod loading;
pub mod matching;
pub mod model;
pub mod network;
pub mod prelude;
pub mod reach;
pub mod routing;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::Error;
pub use model::{EdgeAttributes, Extent, Layer, NetworkGraph, Profile};

/// Search radius used when snapping points onto a network and when looking up
/// sidewalks near a street, in metres (or CRS units for projected data)
pub const SEARCH_DISTANCE: f64 = 30.0;

/// Cost budget of every reachable-set query
pub const MAX_COST: f64 = 400.0;

/// Number of edges committed per write batch
pub const BATCH_SIZE: usize = 1000;

/// Number of features handed to an output sink per write
pub const EXPORT_BATCH_SIZE: usize = 1000;

/// Prefix of the score columns written to street edges
pub const SCORE_PREFIX: &str = "nsr_";

/// Prefix of precomputed static weight columns
pub const WEIGHT_PREFIX: &str = "_weight_";

/// Name of the static weight column for a profile
pub fn weight_key(profile_id: &str) -> String {
    format!("{WEIGHT_PREFIX}{profile_id}")
}

/// Name of the score column for a profile
pub fn score_key(profile_id: &str) -> String {
    format!("{SCORE_PREFIX}{profile_id}")
}
