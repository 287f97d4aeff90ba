//! Random forest classifier for the binary top-3 target.
//!
//! Gini-impurity CART trees grown on bootstrap samples, a random subset of
//! `sqrt(n_features)` candidate features per split, and mean-decrease-in-impurity
//! feature importances. Trees are fitted in parallel; every tree owns an RNG
//! seeded from `seed + tree_index`, so a fit is reproducible.

use anyhow::bail;
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::ForestConfig;

/// Minimum impurity decrease for a split to be kept.
const MIN_DECREASE: f64 = 1e-12;

/// Per-tree growth limits
#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Non-constant features examined per split
    pub max_features: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        /// Fraction of class 1 among the node's samples
        proba: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// n * gini(parent) - n_l * gini(left) - n_r * gini(right)
    decrease: f64,
}

/// Gini impurity of a binary node with `pos` positives out of `n`.
fn gini(pos: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = pos as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

/// A single classification tree stored as a node arena (root at index 0).
#[derive(Debug, Clone)]
pub struct DecisionTree {
    config: TreeConfig,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl DecisionTree {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            importances: Vec::new(),
        }
    }

    /// Grow the tree on the rows listed in `samples` (duplicates allowed).
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<u8>, samples: Vec<usize>, rng: &mut ChaCha8Rng) {
        self.nodes.clear();
        self.importances = vec![0.0; x.ncols()];

        if samples.is_empty() {
            self.nodes.push(Node::Leaf { proba: 0.0 });
            return;
        }

        self.build(x, y, samples, 0, rng);

        let total: f64 = self.importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.importances {
                *imp /= total;
            }
        }
    }

    fn build(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<u8>,
        samples: Vec<usize>,
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let n = samples.len();
        let pos = samples.iter().filter(|&&i| y[i] == 1).count();
        let proba = pos as f64 / n as f64;
        let impurity = gini(pos, n);

        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf { proba });

        if depth >= self.config.max_depth
            || n < self.config.min_samples_split
            || n < 2 * self.config.min_samples_leaf
            || impurity <= 0.0
        {
            return node_id;
        }

        let split = match self.best_split(x, y, &samples, pos, impurity, rng) {
            Some(s) => s,
            None => return node_id,
        };

        self.importances[split.feature] += split.decrease;

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| x[[i, split.feature]] <= split.threshold);

        let left = self.build(x, y, left_samples, depth + 1, rng);
        let right = self.build(x, y, right_samples, depth + 1, rng);

        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    /// Best split over up to `max_features` non-constant features, visited in
    /// random order. Each feature is scanned once in sorted order.
    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<u8>,
        samples: &[usize],
        total_pos: usize,
        impurity: f64,
        rng: &mut ChaCha8Rng,
    ) -> Option<SplitCandidate> {
        let n = samples.len();
        let min_leaf = self.config.min_samples_leaf.max(1);
        let parent = n as f64 * impurity;

        let mut features: Vec<usize> = (0..x.ncols()).collect();
        features.shuffle(rng);

        let mut column: Vec<(f64, u8)> = Vec::with_capacity(n);
        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;

        for feature in features {
            if visited >= self.config.max_features {
                break;
            }

            column.clear();
            column.extend(samples.iter().map(|&i| (x[[i, feature]], y[i])));
            column.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

            if column[0].0 >= column[n - 1].0 {
                continue;
            }
            visited += 1;

            let mut left_pos = 0;
            for i in 0..n - 1 {
                left_pos += column[i].1 as usize;
                if column[i].0 >= column[i + 1].0 {
                    continue;
                }

                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let decrease = parent
                    - n_left as f64 * gini(left_pos, n_left)
                    - n_right as f64 * gini(total_pos - left_pos, n_right);

                if best.map_or(true, |b| decrease > b.decrease) {
                    let (lo, hi) = (column[i].0, column[i + 1].0);
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        decrease,
                    });
                }
            }
        }

        best.filter(|b| b.decrease > MIN_DECREASE)
    }

    /// Probability of class 1 for one row.
    pub fn predict_proba_one(&self, row: ArrayView1<f64>) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(Node::Leaf { proba }) => return *proba,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    /// Normalized importances; all zero when the tree never split.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match nodes.get(id) {
                Some(Node::Split { left, right, .. }) => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Bagged ensemble of [`DecisionTree`]s.
#[derive(Debug, Clone)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    /// Fit on `x` (n_samples x n_features) and binary labels `y`.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<u8>) -> anyhow::Result<()> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            bail!("Cannot fit a forest on an empty matrix ({}x{})", n_samples, n_features);
        }
        if y.len() != n_samples {
            bail!("Label count {} does not match sample count {}", y.len(), n_samples);
        }
        if self.config.n_trees == 0 {
            bail!("Forest needs at least one tree");
        }

        let tree_config = TreeConfig {
            max_depth: self.config.max_depth,
            min_samples_split: self.config.min_samples_split,
            min_samples_leaf: self.config.min_samples_leaf,
            max_features: ((n_features as f64).sqrt() as usize).max(1),
        };
        let seed = self.config.seed;

        self.trees = (0..self.config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(i as u64));
                let bootstrap: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

                let mut tree = DecisionTree::new(tree_config.clone());
                tree.fit(x, y, bootstrap, &mut rng);
                tree
            })
            .collect();

        // Average over trees that split at least once, then renormalize
        let mut importances = vec![0.0; n_features];
        let mut contributing = 0;
        for tree in self.trees.iter().filter(|t| t.n_nodes() > 1) {
            contributing += 1;
            for (acc, imp) in importances.iter_mut().zip(tree.feature_importances()) {
                *acc += imp;
            }
        }
        if contributing > 0 {
            let total: f64 = importances.iter().sum();
            if total > 0.0 {
                for imp in &mut importances {
                    *imp /= total;
                }
            }
        }
        self.feature_importances = importances;

        tracing::debug!(
            "Forest fitted: {} trees, {} contributing, deepest {}",
            self.n_trees(),
            contributing,
            self.trees.iter().map(|t| t.depth()).max().unwrap_or(0)
        );
        Ok(())
    }

    /// Mean class-1 probability across trees, per row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        let n_trees = self.trees.len().max(1) as f64;
        let probs: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                self.trees.iter().map(|t| t.predict_proba_one(row)).sum::<f64>() / n_trees
            })
            .collect();
        Array1::from_vec(probs)
    }

    /// Predicted class per row (1 when the mean probability exceeds 0.5).
    pub fn predict(&self, x: &Array2<f64>) -> Array1<u8> {
        self.predict_proba(x).mapv(|p| u8::from(p > 0.5))
    }

    /// Importances summing to 1 (all zero if no tree ever split).
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(n_trees: usize) -> ForestConfig {
        ForestConfig {
            n_trees,
            max_depth: 5,
            ..Default::default()
        }
    }

    /// Column 0 decides the label, column 1 is noise, column 2 is constant.
    fn threshold_dataset(n: usize) -> (Array2<f64>, Array1<u8>) {
        let x = Array2::from_shape_fn((n, 3), |(i, j)| match j {
            0 => i as f64 / n as f64 * 10.0,
            1 => ((i * 7919) % 13) as f64,
            _ => 1.0,
        });
        let y = (0..n).map(|i| u8::from(i as f64 / n as f64 * 10.0 > 6.0)).collect();
        (x, y)
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(0, 10), 0.0);
        assert_eq!(gini(10, 10), 0.0);
        assert!((gini(5, 10) - 0.5).abs() < 1e-12);
        assert_eq!(gini(0, 0), 0.0);
    }

    #[test]
    fn test_tree_learns_threshold() {
        let (x, y) = threshold_dataset(200);
        let mut tree = DecisionTree::new(TreeConfig {
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 3,
        });
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        tree.fit(&x, &y, (0..200).collect(), &mut rng);

        for i in 0..200 {
            let p = tree.predict_proba_one(x.row(i));
            assert_eq!(u8::from(p > 0.5), y[i], "row {i}");
        }
        assert_eq!(tree.depth(), 1);
        assert!((tree.feature_importances()[0] - 1.0).abs() < 1e-12);
        assert_eq!(tree.feature_importances()[2], 0.0);
    }

    #[test]
    fn test_tree_respects_max_depth() {
        let n = 256;
        let x = Array2::from_shape_fn((n, 1), |(i, _)| i as f64);
        // Alternating labels need many splits
        let y: Array1<u8> = (0..n).map(|i| (i % 2) as u8).collect();
        let mut tree = DecisionTree::new(TreeConfig {
            max_depth: 4,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: 1,
        });
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        tree.fit(&x, &y, (0..n).collect(), &mut rng);
        assert!(tree.depth() <= 4);
    }

    #[test]
    fn test_forest_importances_sum_to_one() {
        let (x, y) = threshold_dataset(300);
        let mut forest = RandomForest::new(small_config(20));
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.n_trees(), 20);
        let importances = forest.feature_importances();
        assert_eq!(importances.len(), 3);
        assert!(importances.iter().all(|&v| v >= 0.0));
        approx::assert_abs_diff_eq!(importances.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert!(importances[0] > importances[1]);
        assert_eq!(importances[2], 0.0);
    }

    #[test]
    fn test_forest_accuracy_on_separable_data() {
        let (x, y) = threshold_dataset(300);
        let mut forest = RandomForest::new(ForestConfig {
            n_trees: 25,
            ..Default::default()
        });
        forest.fit(&x, &y).unwrap();

        let pred = forest.predict(&x);
        let correct = pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / 300.0 > 0.9);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (x, y) = threshold_dataset(150);
        let mut a = RandomForest::new(small_config(10));
        let mut b = RandomForest::new(small_config(10));
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.feature_importances(), b.feature_importances());
        assert_eq!(a.predict_proba(&x), b.predict_proba(&x));
    }

    #[test]
    fn test_single_class_predicts_that_class() {
        let x = Array2::from_shape_fn((50, 2), |(i, j)| (i + j) as f64);
        let y = Array1::<u8>::zeros(50);
        let mut forest = RandomForest::new(small_config(5));
        forest.fit(&x, &y).unwrap();

        assert!(forest.predict(&x).iter().all(|&p| p == 0));
        assert!(forest.feature_importances().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_fit_rejects_empty_input() {
        let x = Array2::<f64>::zeros((0, 3));
        let y = Array1::<u8>::zeros(0);
        let mut forest = RandomForest::new(small_config(5));
        assert!(forest.fit(&x, &y).is_err());
    }

    #[test]
    fn test_fit_rejects_label_mismatch() {
        let x = Array2::<f64>::zeros((4, 2));
        let y = Array1::<u8>::zeros(3);
        let mut forest = RandomForest::new(small_config(5));
        assert!(forest.fit(&x, &y).is_err());
    }
}
