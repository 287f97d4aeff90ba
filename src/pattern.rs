//! Compound-condition patterns and per-index top-quintile summaries.

use std::cmp::Ordering;
use std::fmt::Write;

use crate::config::AnalysisConfig;
use crate::data::RaceEntry;
use crate::features::Feature;
use crate::stats::{thousands, OutcomeStats};

/// A named conjunctive filter over race entries.
#[derive(Clone, Copy)]
pub struct CompoundPattern {
    pub name: &'static str,
    pub condition: &'static str,
    pub predicate: fn(&RaceEntry) -> bool,
}

impl std::fmt::Debug for CompoundPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompoundPattern")
            .field("name", &self.name)
            .field("condition", &self.condition)
            .finish()
    }
}

impl CompoundPattern {
    pub fn matches(&self, entry: &RaceEntry) -> bool {
        (self.predicate)(entry)
    }
}

fn high_potential_mid_comeback(entry: &RaceEntry) -> bool {
    matches!(
        (entry.potential, entry.makikaeshi),
        (Some(p), Some(m)) if p >= 5.0 && (2.0..=4.0).contains(&m)
    )
}

/// High potential with a comeback index in its best zone.
pub const BEST_PATTERN: CompoundPattern = CompoundPattern {
    name: "Best pattern",
    condition: "potential>=5 & makikaeshi 2-4",
    predicate: high_potential_mid_comeback,
};

/// Statistics over the records matching a pattern.
#[derive(Debug, Clone)]
pub struct PatternResult {
    pub pattern: CompoundPattern,
    pub stats: OutcomeStats,
}

/// Evaluate `pattern`; `None` when nothing matches.
pub fn analyze_pattern(
    entries: &[&RaceEntry],
    pattern: &CompoundPattern,
    with_payout: bool,
    config: &AnalysisConfig,
) -> Option<PatternResult> {
    let matched: Vec<&RaceEntry> = entries
        .iter()
        .copied()
        .filter(|e| pattern.matches(e))
        .collect();

    if matched.is_empty() {
        return None;
    }

    Some(PatternResult {
        pattern: *pattern,
        stats: OutcomeStats::compute(matched, with_payout, config.stake_unit),
    })
}

pub fn render_pattern(result: &PatternResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[{}] {}", result.pattern.name, result.pattern.condition);
    let _ = writeln!(out, "  Count: {}", thousands(result.stats.count));
    let _ = writeln!(out, "  Top-3 rate: {:.1}%", result.stats.top3_rate());
    let _ = writeln!(out, "  Win rate: {:.1}%", result.stats.win_rate());
    let _ = writeln!(out, "  ROI: {:.1}%", result.stats.roi);
    out
}

/// Indices summarised by their best quintile.
pub const QUINTILE_INDICES: [Feature; 4] = [
    Feature::Makikaeshi,
    Feature::Potential,
    Feature::L4f,
    Feature::T2f,
];

/// Outcome of the best slice of one index.
#[derive(Debug, Clone)]
pub struct QuintileRow {
    pub feature: Feature,
    /// Records with a value for this index
    pub population: usize,
    pub stats: OutcomeStats,
}

/// For each index, take the best `quintile_fraction` of records in the
/// index's preferred direction. Indices with fewer than `min_bucket_size`
/// values are left out.
pub fn analyze_top_quintiles(
    entries: &[&RaceEntry],
    features: &[Feature],
    with_payout: bool,
    config: &AnalysisConfig,
) -> Vec<QuintileRow> {
    let mut rows = Vec::new();

    for &feature in features {
        let mut ranked: Vec<(f64, &RaceEntry)> = entries
            .iter()
            .filter_map(|e| feature.value(e).map(|v| (v, *e)))
            .collect();

        if ranked.len() < config.min_bucket_size {
            tracing::debug!(
                "Skipping quintile of {}: {} values",
                feature.name(),
                ranked.len()
            );
            continue;
        }

        let population = ranked.len();
        if feature.higher_is_better() {
            ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        } else {
            ranked.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        }

        let take = (population as f64 * config.quintile_fraction).floor() as usize;
        let stats = OutcomeStats::compute(
            ranked.iter().take(take).map(|(_, e)| *e),
            with_payout,
            config.stake_unit,
        );

        rows.push(QuintileRow {
            feature,
            population,
            stats,
        });
    }

    rows
}

pub fn render_quintiles(rows: &[QuintileRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:16} | {:>8} | {:>8} | {:>8} | {:>8}",
        "Index", "Values", "Top 20%", "Top-3", "ROI"
    );
    let _ = writeln!(out, "{}", "-".repeat(60));

    for row in rows {
        let _ = writeln!(
            out,
            "{:16} | {:>8} | {:>8} | {:>7.1}% | {:>7.1}%",
            format!(
                "{} ({})",
                row.feature.name(),
                if row.feature.higher_is_better() { "hi" } else { "lo" }
            ),
            thousands(row.population),
            thousands(row.stats.count),
            row.stats.top3_rate(),
            row.stats.roi
        );
    }
    out
}
