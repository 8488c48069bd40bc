//! The pedestrian and street networks scored together

use std::path::Path;

use log::info;

use crate::loading::{LoadOptions, load_network, parse_profiles};
use crate::{Error, NetworkGraph, Profile};

/// A graph and the profiles it is traversed with
#[derive(Debug, Clone)]
pub struct RoutingContext {
    pub graph: NetworkGraph,
    pub profiles: Vec<Profile>,
}

impl RoutingContext {
    pub fn new(graph: NetworkGraph, profiles: Vec<Profile>) -> Self {
        Self { graph, profiles }
    }

    /// Loads the graph and `profile-*.json` files of a network directory
    pub fn from_directory(directory: &Path, options: &LoadOptions) -> Result<Self, Error> {
        let graph = load_network(directory, options)?;
        let profiles = parse_profiles(directory)?;
        Ok(Self::new(graph, profiles))
    }
}

#[derive(Debug, Clone)]
pub struct NetworkContainer {
    pub pedestrian: RoutingContext,
    pub street: RoutingContext,
}

impl NetworkContainer {
    /// The street network needs at least one profile
    pub fn new(pedestrian: RoutingContext, street: RoutingContext) -> Result<Self, Error> {
        if street.profiles.is_empty() {
            return Err(Error::MissingProfiles("street"));
        }
        Ok(Self { pedestrian, street })
    }

    pub fn from_directories(
        pedestrian_dir: &Path,
        street_dir: &Path,
        options: &LoadOptions,
    ) -> Result<Self, Error> {
        let pedestrian = RoutingContext::from_directory(pedestrian_dir, options)?;
        let street = RoutingContext::from_directory(street_dir, options)?;
        info!(
            "Loaded pedestrian network ({} edges, {} profiles) and street network ({} edges, {} profiles)",
            pedestrian.graph.edge_count(),
            pedestrian.profiles.len(),
            street.graph.edge_count(),
            street.profiles.len()
        );
        Self::new(pedestrian, street)
    }

    /// First street profile, which measures travel along streets
    pub fn street_profile(&self) -> Result<&Profile, Error> {
        self.street
            .profiles
            .first()
            .ok_or(Error::MissingProfiles("street"))
    }

    /// Pedestrian profiles that receive a score column
    pub fn scored_profiles(&self) -> impl Iterator<Item = &Profile> {
        self.pedestrian.profiles.iter().filter(|p| !p.skip_scoring)
    }
}
