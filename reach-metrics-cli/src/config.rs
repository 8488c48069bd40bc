use std::path::Path;

use reach_metrics_core::Error;
use reach_metrics_core::batch::BatchConfig;
use reach_metrics_core::loading::LoadOptions;
use serde::{Deserialize, Serialize};

/// Run configuration read from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Worker threads, all cores when unset
    pub threads: Option<usize>,
    pub load: LoadOptions,
    pub batch: BatchConfig,
}

impl RunConfig {
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            std::io::Error::new(e.kind(), format!("Failed to read '{}': {e}", path.display()))
        })?;
        Self::from_toml(&text).map_err(|e| match e {
            Error::InvalidConfig(msg) => {
                Error::InvalidConfig(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.batch.validate()?;
        if config.threads == Some(0) {
            return Err(Error::InvalidConfig("threads must be at least 1".to_string()));
        }
        Ok(config)
    }
}
