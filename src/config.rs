//! Configuration for the analysis run.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Input data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_input_path")]
    pub input_path: String,
}

fn default_input_path() -> String {
    "data/learning-data/learning-data-full.json".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
        }
    }
}

/// Random forest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,
    #[serde(default = "default_min_samples_leaf")]
    pub min_samples_leaf: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Fraction of valid records held out for evaluation
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
}

fn default_n_trees() -> usize {
    100
}

fn default_max_depth() -> usize {
    10
}

fn default_min_samples_split() -> usize {
    2
}

fn default_min_samples_leaf() -> usize {
    1
}

fn default_seed() -> u64 {
    42
}

fn default_test_ratio() -> f64 {
    0.2
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: default_n_trees(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            min_samples_leaf: default_min_samples_leaf(),
            seed: default_seed(),
            test_ratio: default_test_ratio(),
        }
    }
}

/// Threshold / pattern analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Buckets with fewer records than this are not reported
    #[serde(default = "default_min_bucket_size")]
    pub min_bucket_size: usize,
    /// Stake per bet in yen; payouts are quoted against this unit
    #[serde(default = "default_stake_unit")]
    pub stake_unit: f64,
    /// ROI (%) at or above which a row gets the strong marker
    #[serde(default = "default_strong_roi")]
    pub strong_roi: f64,
    /// ROI (%) at or above which a row gets the fair marker
    #[serde(default = "default_fair_roi")]
    pub fair_roi: f64,
    #[serde(default = "default_quintile_fraction")]
    pub quintile_fraction: f64,
}

fn default_min_bucket_size() -> usize {
    100
}

fn default_stake_unit() -> f64 {
    100.0
}

fn default_strong_roi() -> f64 {
    100.0
}

fn default_fair_roi() -> f64 {
    80.0
}

fn default_quintile_fraction() -> f64 {
    0.2
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            min_bucket_size: default_min_bucket_size(),
            stake_unit: default_stake_unit(),
            strong_roi: default_strong_roi(),
            fair_roi: default_fair_roi(),
            quintile_fraction: default_quintile_fraction(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub forest: ForestConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl AppConfig {
    /// Load configuration from defaults, an optional config file and environment.
    ///
    /// Without an explicit `path`, `analysis.{toml,json,yaml}` in the working
    /// directory is picked up when present.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file_source = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name("analysis").required(false),
        };

        let config = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(file_source)
            // KEIBA_FOREST__N_TREES, KEIBA_DATA__INPUT_PATH, ...
            .add_source(
                config::Environment::with_prefix("KEIBA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// Bucket boundaries for the potential index
pub const POTENTIAL_BOUNDARIES: [f64; 8] = [0.0, 2.0, 4.0, 5.0, 6.0, 7.0, 8.0, 10.0];

/// Bucket boundaries for the comeback (makikaeshi) index
pub const MAKIKAESHI_BOUNDARIES: [f64; 9] = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 8.0, 10.0];

/// Producer of the learning data file, named in the missing-input message
pub const EXPORT_COMMAND: &str = "node scripts/export-learning-data.js";

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_analysis_constants() {
        let config = AppConfig::default();
        assert_eq!(config.data.input_path, "data/learning-data/learning-data-full.json");
        assert_eq!(config.forest.n_trees, 100);
        assert_eq!(config.forest.max_depth, 10);
        assert_eq!(config.forest.seed, 42);
        assert!((config.forest.test_ratio - 0.2).abs() < 1e-12);
        assert_eq!(config.analysis.min_bucket_size, 100);
        assert!((config.analysis.stake_unit - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[forest]\nn_trees = 7\n\n[analysis]\nmin_bucket_size = 5").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.forest.n_trees, 7);
        assert_eq!(config.forest.max_depth, 10);
        assert_eq!(config.analysis.min_bucket_size, 5);
    }

    #[test]
    fn test_boundaries_are_ordered() {
        assert!(POTENTIAL_BOUNDARIES.windows(2).all(|w| w[0] < w[1]));
        assert!(MAKIKAESHI_BOUNDARIES.windows(2).all(|w| w[0] < w[1]));
    }
}
