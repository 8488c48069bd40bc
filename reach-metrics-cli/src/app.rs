use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use reach_metrics_core::Error;
use reach_metrics_core::batch::{BatchRunner, FailurePolicy, precalculate_weights};
use reach_metrics_core::export::GeoJsonSink;
use reach_metrics_core::geometry::CoordinateSpace;
use reach_metrics_core::loading::{load_layers, save_network};
use reach_metrics_core::network::{NetworkContainer, RoutingContext};
use tracing::info;

use crate::config::RunConfig;
use crate::progress::ProgressLog;

const NETWORKS: [&str; 2] = ["street", "pedestrian"];

/// Pedestrian reach metrics for street networks.
///
/// DIRECTORY holds a `street/` and a `pedestrian/` network, each with
/// `layers/*.geojson` (or a built `graph.geojson`) and `profile-*.json` files.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct ReachApp {
    /// TOML run configuration
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// worker threads used for scoring, all cores when not set
    #[arg(short, long, global = true)]
    pub threads: Option<usize>,

    /// attributes negated on the reverse direction of each segment
    #[arg(long, global = true)]
    pub changes_sign: Vec<String>,

    /// coordinates are projected rather than longitude/latitude
    #[arg(long, global = true)]
    pub projected: bool,

    #[command(subcommand)]
    pub op: ReachOperation,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ReachOperation {
    /// build `graph.geojson` for both networks from their layers
    Build { directory: PathBuf },

    /// store `_weight_<profile>` columns for every profile flagged
    /// `precalculate`
    Weight { directory: PathBuf },

    /// score every street edge and write the scored streets as GeoJSON
    Score {
        directory: PathBuf,

        /// output file, relative paths are resolved against DIRECTORY
        #[arg(short, long, default_value = "reach_metrics.geojson")]
        output: PathBuf,

        /// log and skip street edges that cannot be scored
        #[arg(long)]
        skip_failures: bool,
    },
}

impl ReachApp {
    pub fn run(&self) -> Result<(), Error> {
        let config = self.resolve_config()?;
        if let Some(threads) = config.threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        }

        match &self.op {
            ReachOperation::Build { directory } => build(directory, &config),
            ReachOperation::Weight { directory } => weight(directory, &config),
            ReachOperation::Score {
                directory,
                output,
                skip_failures,
            } => {
                let mut config = config;
                if *skip_failures {
                    config.batch.failure_policy = FailurePolicy::Skip;
                }
                score(directory, &directory.join(output), &config)
            }
        }
    }

    /// The configuration file, if any, with command line flags applied
    pub fn resolve_config(&self) -> Result<RunConfig, Error> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_file(path)?,
            None => RunConfig::default(),
        };
        if self.threads.is_some() {
            config.threads = self.threads;
        }
        if !self.changes_sign.is_empty() {
            config.load.changes_sign.clone_from(&self.changes_sign);
        }
        if self.projected {
            config.load.space = CoordinateSpace::Projected;
        }
        Ok(config)
    }
}

fn build(directory: &Path, config: &RunConfig) -> Result<(), Error> {
    for network in NETWORKS {
        info!("Building {network} network");
        let network_dir = directory.join(network);
        let graph = load_layers(&network_dir, &config.load)?;
        save_network(&graph, &network_dir)?;
    }
    info!("Done");
    Ok(())
}

fn weight(directory: &Path, config: &RunConfig) -> Result<(), Error> {
    for network in NETWORKS {
        let network_dir = directory.join(network);
        let mut context = RoutingContext::from_directory(&network_dir, &config.load)?;

        let flagged = context.profiles.iter().filter(|p| p.precalculate).count();
        if flagged == 0 {
            info!("No precalculated profiles for the {network} network");
            continue;
        }

        info!("Calculating static {network} network weights");
        let mut progress = ProgressLog::new("Computing weights", context.graph.edge_count() * flagged);
        precalculate_weights(
            &mut context.graph,
            &context.profiles,
            config.batch.batch_size,
            &mut |done| {
                progress.update(done);
            },
        )?;
        save_network(&context.graph, &network_dir)?;
    }
    info!("Done");
    Ok(())
}

fn score(directory: &Path, output: &Path, config: &RunConfig) -> Result<(), Error> {
    let mut networks = NetworkContainer::from_directories(
        &directory.join("pedestrian"),
        &directory.join("street"),
        &config.load,
    )?;

    let mut progress = ProgressLog::new("Computing metrics", networks.street.graph.edge_count());
    let mut sink = GeoJsonSink::create(output)?;
    let summary = BatchRunner::new(config.batch.clone()).run(
        &mut networks,
        &mut sink,
        &mut |done| {
            progress.update(done);
        },
    )?;

    info!(
        scored = summary.scored,
        skipped = summary.skipped,
        exported = summary.exported,
        "Wrote {}",
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_definition_is_valid() {
        ReachApp::command().debug_assert();
    }

    #[test]
    fn flags_override_the_configuration_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, "threads = 2\n[load]\nchanges_sign = []\n").unwrap();

        let app = ReachApp::parse_from([
            "reach-metrics",
            "score",
            "data",
            "--config",
            path.to_str().unwrap(),
            "--threads",
            "8",
            "--changes-sign",
            "incline",
            "--projected",
        ]);
        let config = app.resolve_config().unwrap();
        assert_eq!(config.threads, Some(8));
        assert_eq!(config.load.changes_sign, vec!["incline"]);
        assert_eq!(config.load.space, CoordinateSpace::Projected);

        let ReachOperation::Score { output, skip_failures, .. } = app.op else {
            panic!("expected the score command");
        };
        assert_eq!(output, PathBuf::from("reach_metrics.geojson"));
        assert!(!skip_failures);
    }

    #[test]
    fn weight_and_score_run_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let config = RunConfig {
            load: reach_metrics_core::loading::LoadOptions {
                space: CoordinateSpace::Projected,
                ..Default::default()
            },
            ..Default::default()
        };

        build(dir.path(), &config).unwrap();
        weight(dir.path(), &config).unwrap();
        let output = dir.path().join("out.geojson");
        score(dir.path(), &output, &config).unwrap();

        let text = std::fs::read_to_string(&output).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let features = value["features"].as_array().unwrap();
        assert_eq!(features.len(), 2);
        for feature in features {
            let ratio = feature["properties"]["nsr_walking"].as_f64().unwrap();
            assert!((ratio - 0.5).abs() < 1e-9);
            assert_eq!(feature["properties"]["_weight_distance"], serde_json::json!(10.0));
        }
    }

    fn write_fixture(root: &Path) {
        let line = |y: f64, properties: serde_json::Value| {
            serde_json::json!({
                "type": "FeatureCollection",
                "features": [{
                    "type": "Feature",
                    "geometry": {"type": "LineString", "coordinates": [[0.0, y], [10.0, y]]},
                    "properties": properties,
                }],
            })
            .to_string()
        };

        let street = root.join("street");
        std::fs::create_dir_all(street.join("layers")).unwrap();
        std::fs::write(
            street.join("layers/streets.geojson"),
            line(0.0, serde_json::json!({"sw_left": 1, "pkey_left": 100})),
        )
        .unwrap();
        std::fs::write(
            street.join("profile-distance.json"),
            r#"{"id": "distance", "precalculate": true, "cost": {"distance": {}}}"#,
        )
        .unwrap();

        let pedestrian = root.join("pedestrian");
        std::fs::create_dir_all(pedestrian.join("layers")).unwrap();
        std::fs::write(
            pedestrian.join("layers/sidewalks.geojson"),
            line(5.0, serde_json::json!({"pkey": 100})),
        )
        .unwrap();
        std::fs::write(
            pedestrian.join("profile-walking.json"),
            r#"{"id": "walking", "cost": {"pedestrian": {}}}"#,
        )
        .unwrap();
    }
}
