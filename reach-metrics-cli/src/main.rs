mod app;
mod config;
mod progress;

use clap::Parser;
use reach_metrics_core::Error;
use tracing_subscriber::EnvFilter;

use crate::app::ReachApp;

fn main() -> Result<(), Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let app = ReachApp::parse();
    app.run()
}
