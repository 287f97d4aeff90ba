//! Threshold analysis: bucket records by one feature and compare outcomes.

use std::fmt::Write;

use crate::config::AnalysisConfig;
use crate::data::RaceEntry;
use crate::features::Feature;
use crate::stats::{thousands, OutcomeStats, RoiMark};

/// Buckets for one feature.
#[derive(Debug, Clone)]
pub struct ThresholdSpec {
    pub feature: Feature,
    /// N+1 ascending boundaries for N half-open buckets `[b[i], b[i+1])`
    pub boundaries: Vec<f64>,
    /// Informational only; bucket order and selection do not depend on it
    pub higher_is_better: bool,
}

impl ThresholdSpec {
    pub fn new(feature: Feature, boundaries: &[f64], higher_is_better: bool) -> Self {
        Self {
            feature,
            boundaries: boundaries.to_vec(),
            higher_is_better,
        }
    }
}

/// A reported bucket.
#[derive(Debug, Clone)]
pub struct BucketRow {
    pub low: f64,
    pub high: f64,
    pub stats: OutcomeStats,
    pub mark: RoiMark,
}

impl BucketRow {
    pub fn label(&self) -> String {
        format!("{}-{}", self.low, self.high)
    }
}

/// Result of a threshold analysis; buckets under the size floor are absent.
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    pub feature: Feature,
    pub rows: Vec<BucketRow>,
}

/// Partition `entries` by `spec` and compute per-bucket outcomes.
pub fn analyze_threshold(
    entries: &[&RaceEntry],
    spec: &ThresholdSpec,
    with_payout: bool,
    config: &AnalysisConfig,
) -> ThresholdTable {
    tracing::debug!(
        "Threshold analysis on {} (higher_is_better={})",
        spec.feature.name(),
        spec.higher_is_better
    );

    let mut rows = Vec::new();

    for window in spec.boundaries.windows(2) {
        let (low, high) = (window[0], window[1]);
        let bucket: Vec<&RaceEntry> = entries
            .iter()
            .copied()
            .filter(|e| matches!(spec.feature.value(e), Some(v) if v >= low && v < high))
            .collect();

        if bucket.len() < config.min_bucket_size {
            tracing::debug!(
                "Skipping {} bucket {}-{}: {} records",
                spec.feature.name(),
                low,
                high,
                bucket.len()
            );
            continue;
        }

        let stats = OutcomeStats::compute(bucket.iter().copied(), with_payout, config.stake_unit);
        let mark = stats.mark(config);
        rows.push(BucketRow {
            low,
            high,
            stats,
            mark,
        });
    }

    ThresholdTable {
        feature: spec.feature,
        rows,
    }
}

/// Render the table: header lines always, one line per reported bucket.
pub fn render_threshold_table(table: &ThresholdTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[{}]", table.feature.name());
    let _ = writeln!(
        out,
        "{:10} | {:>8} | {:>8} | {:>6} | {:>8}",
        "Range", "Count", "Top-3", "Win", "ROI"
    );
    let _ = writeln!(out, "{}", "-".repeat(55));

    for row in &table.rows {
        let line = format!(
            "{:10} | {:>8} | {:>7.1}% | {:>5.1}% | {:>7.1}% {}",
            row.label(),
            thousands(row.stats.count),
            row.stats.top3_rate(),
            row.stats.win_rate(),
            row.stats.roi,
            row.mark.symbol()
        );
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}
