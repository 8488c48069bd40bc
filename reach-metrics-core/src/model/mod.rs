//! Data model for pedestrian and street networks
//!
//! Contains the directed network graph, its edge attributes and the
//! walking-cost profiles that are evaluated against it.

pub mod edge;
pub mod graph;
pub mod profile;

pub use edge::{EdgeAttributes, Extent, Layer, NetworkNode, as_pkey};
pub use graph::{EdgeUpdate, NearEdge, NetworkGraph};
pub use profile::Profile;
