//! This module is responsible for loading networks and their profiles from
//! disk and for persisting networks back.

pub mod graph_store;
mod profiles;

pub use graph_store::{
    GRAPH_FILE, LAYERS_DIR, LoadOptions, build_graph, load_layers, load_network,
    read_feature_collection, save_network,
};
pub use profiles::{parse_profile, parse_profiles, validate_profiles};
