//! Keiba-AI index analysis
//!
//! Batch report on which race indices predict a horse's next-race finish.

mod classifier;
mod cli;
mod config;
mod data;
mod features;
mod forest;
mod metrics;
mod pattern;
mod stats;
mod threshold;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;
use crate::config::EXPORT_COMMAND;
use crate::data::DataError;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_filter = if cli.verbose {
        "keiba_analyze=debug"
    } else {
        "keiba_analyze=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = cli::run_analysis(cli.input, cli.config) {
        if let Some(DataError::MissingInput { path }) = err.downcast_ref::<DataError>() {
            println!("Error: {} not found", path.display());
            println!("Run `{}` first", EXPORT_COMMAND);
            std::process::exit(1);
        }
        return Err(err);
    }

    Ok(())
}
