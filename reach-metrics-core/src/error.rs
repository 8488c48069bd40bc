use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown edge layer '{0}'")]
    UnknownLayer(String),
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),
    #[error("Duplicate profile id '{0}'")]
    DuplicateProfile(String),
    #[error("No profiles defined for the {0} network")]
    MissingProfiles(&'static str),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("No street candidate found for edge {edge} (pkey {pkey})")]
    NoStreetCandidate { edge: usize, pkey: i64 },
    #[error("Invalid weight in '{key}': {value}")]
    InvalidWeight { key: String, value: String },
    #[error("Invalid edge index {0}")]
    InvalidEdgeIndex(usize),
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
