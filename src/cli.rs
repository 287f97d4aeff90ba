//! CLI for keiba-analyze.
//!
//! One batch run: load learning data, rank feature importance with a random
//! forest, then print threshold, compound-pattern and top-quintile tables.

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

use crate::classifier::{analyze_importance, render_ranking};
use crate::config::{AppConfig, MAKIKAESHI_BOUNDARIES, POTENTIAL_BOUNDARIES};
use crate::data::{clean, load_learning_data, RaceEntry};
use crate::features::{ensure_columns, Feature, MODEL_FEATURES};
use crate::pattern::{
    analyze_pattern, analyze_top_quintiles, render_pattern, render_quintiles, BEST_PATTERN,
    QUINTILE_INDICES,
};
use crate::stats::thousands;
use crate::threshold::{analyze_threshold, render_threshold_table, ThresholdSpec};

#[derive(Parser, Debug)]
#[command(name = "keiba-analyze")]
#[command(version, about = "Keiba-AI: which indices predict the next race", long_about = None)]
pub struct Cli {
    /// Learning data JSON (overrides data.input_path)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Config file (defaults to ./analysis.{toml,json,yaml} when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Threshold tables printed by a run, in order.
pub fn threshold_specs() -> Vec<ThresholdSpec> {
    vec![
        ThresholdSpec::new(Feature::Potential, &POTENTIAL_BOUNDARIES, true),
        ThresholdSpec::new(Feature::Makikaeshi, &MAKIKAESHI_BOUNDARIES, true),
    ]
}

/// Run the full analysis and print the report to stdout.
pub fn run_analysis(input: Option<PathBuf>, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = AppConfig::load(config_path.as_deref())?;
    if let Some(path) = input {
        config.data.input_path = path.to_string_lossy().to_string();
    }
    tracing::info!("Configuration loaded");
    tracing::debug!("{:?}", config);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    writeln!(out, "=== Feature importance analysis ===")?;
    writeln!(out)?;
    writeln!(out, "Loading data...")?;

    let data = load_learning_data(&config.data.input_path)?;
    writeln!(out, "Loaded {} records", thousands(data.len()))?;

    let valid = clean(&data);
    let with_payout = data.has_column("next_payout");
    tracing::info!("{} of {} records are valid", valid.len(), data.len());
    writeln!(out, "Valid records: {}", thousands(valid.len()))?;
    writeln!(out)?;
    if !with_payout {
        tracing::warn!("No next_payout column; ROI is reported as 0");
    }

    // Random forest
    ensure_columns(&data, &MODEL_FEATURES)?;
    writeln!(out, "=== Random forest ===")?;
    writeln!(out)?;
    match analyze_importance(&valid, &MODEL_FEATURES, &config.forest)? {
        Some(analysis) => {
            writeln!(out, "[Feature importance ranking]")?;
            write!(out, "{}", render_ranking(&analysis.ranking))?;
            writeln!(out)?;
            writeln!(
                out,
                "Train/test rows: {} / {}",
                thousands(analysis.n_train),
                thousands(analysis.n_test)
            )?;
            writeln!(out, "Accuracy: {:.1}%", analysis.accuracy * 100.0)?;
            writeln!(out)?;
            writeln!(out, "[Classification report]")?;
            writeln!(out, "{}", analysis.report)?;
        }
        None => {
            writeln!(out, "Not enough valid records to train the classifier")?;
            writeln!(out)?;
        }
    }

    write_pattern_sections(&mut out, &valid, with_payout, &config)?;

    writeln!(out)?;
    writeln!(out, "=== Analysis complete ===")?;
    Ok(())
}

/// Threshold tables, the compound pattern and the quintile summary.
pub fn write_pattern_sections<W: Write>(
    out: &mut W,
    valid: &[&RaceEntry],
    with_payout: bool,
    config: &AppConfig,
) -> anyhow::Result<()> {
    writeln!(out)?;
    writeln!(out, "=== Threshold analysis ===")?;
    writeln!(out)?;
    for spec in threshold_specs() {
        let table = analyze_threshold(valid, &spec, with_payout, &config.analysis);
        writeln!(out, "{}", render_threshold_table(&table))?;
    }

    writeln!(out, "=== Compound patterns ===")?;
    writeln!(out)?;
    if let Some(result) = analyze_pattern(valid, &BEST_PATTERN, with_payout, &config.analysis) {
        write!(out, "{}", render_pattern(&result))?;
    }

    writeln!(out)?;
    writeln!(out, "=== Index top 20% ===")?;
    writeln!(out)?;
    let rows = analyze_top_quintiles(valid, &QUINTILE_INDICES, with_payout, &config.analysis);
    write!(out, "{}", render_quintiles(&rows))?;
    Ok(())
}
