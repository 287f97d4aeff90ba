//! Feature importance analysis with a random forest on the top-3 target.

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;
use std::fmt::Write;

use crate::config::ForestConfig;
use crate::data::RaceEntry;
use crate::features::{build_labels, build_matrix, Feature};
use crate::forest::RandomForest;
use crate::metrics::{accuracy, ClassificationReport};

/// Class names for labels 0 and 1.
pub const CLASS_NAMES: [&str; 2] = ["4th-or-worse", "top-3"];

/// Row indices of a shuffled train/test split.
#[derive(Debug, Clone)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded random split; the test set gets `ceil(n * test_ratio)` rows.
pub fn train_test_split(n: usize, test_ratio: f64, seed: u64) -> SplitIndices {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut rng);

    let test_size = ((n as f64 * test_ratio).ceil() as usize).min(n);
    let train = indices.split_off(test_size);

    SplitIndices {
        train,
        test: indices,
    }
}

/// Everything the importance section prints.
#[derive(Debug, Clone)]
pub struct ImportanceAnalysis {
    /// (feature, importance) sorted by importance, descending
    pub ranking: Vec<(Feature, f64)>,
    pub accuracy: f64,
    pub report: ClassificationReport,
    pub n_train: usize,
    pub n_test: usize,
}

/// Split, fit and evaluate. `None` when the valid set cannot provide both a
/// training and a test row.
pub fn analyze_importance(
    entries: &[&RaceEntry],
    features: &[Feature],
    config: &ForestConfig,
) -> anyhow::Result<Option<ImportanceAnalysis>> {
    let split = train_test_split(entries.len(), config.test_ratio, config.seed);
    if split.train.is_empty() || split.test.is_empty() {
        tracing::warn!(
            "Not enough valid records for a train/test split ({} records)",
            entries.len()
        );
        return Ok(None);
    }

    let x = build_matrix(entries, features);
    let y = build_labels(entries);

    let x_train: Array2<f64> = x.select(Axis(0), &split.train);
    let y_train: Array1<u8> = y.select(Axis(0), &split.train);
    let x_test: Array2<f64> = x.select(Axis(0), &split.test);
    let y_test: Array1<u8> = y.select(Axis(0), &split.test);

    tracing::info!(
        "Training random forest: {} trees, max depth {}, {} train / {} test rows",
        config.n_trees,
        config.max_depth,
        split.train.len(),
        split.test.len()
    );

    let mut forest = RandomForest::new(config.clone());
    forest.fit(&x_train, &y_train)?;

    let mut ranking: Vec<(Feature, f64)> = features
        .iter()
        .copied()
        .zip(forest.feature_importances().iter().copied())
        .collect();
    ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    let y_pred = forest.predict(&x_test);

    Ok(Some(ImportanceAnalysis {
        ranking,
        accuracy: accuracy(&y_test, &y_pred),
        report: ClassificationReport::binary(&y_test, &y_pred, CLASS_NAMES),
        n_train: split.train.len(),
        n_test: split.test.len(),
    }))
}

/// Bar of `█` proportional to importance (50 glyphs = 1.0).
pub fn importance_bar(importance: f64) -> String {
    "█".repeat((importance * 50.0).floor().max(0.0) as usize)
}

pub fn render_ranking(ranking: &[(Feature, f64)]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "-".repeat(40));
    for (feature, importance) in ranking {
        let line = format!(
            "{:15} {:.3} {}",
            feature.name(),
            importance,
            importance_bar(*importance)
        );
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}
