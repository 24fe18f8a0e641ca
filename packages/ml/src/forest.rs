//! Multi-output regression forest.
//!
//! Each tree is grown on a bootstrap sample. Splits minimize the squared
//! error summed over every target, so one tree predicts all targets
//! jointly. Predictions average the leaf values of all trees.

use rand::{Rng as _, SeedableRng as _};
use rand_chacha::ChaCha8Rng;

use crate::ModelError;

/// Minimum gap between neighbouring feature values for a split between
/// them to be considered.
const FEATURE_EPSILON: f64 = 1e-7;

/// Hyperparameters of a [`RegressionForest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForestParams {
    /// Number of trees.
    pub n_trees: usize,
    /// Maximum depth of each tree (root is depth 0).
    pub max_depth: usize,
    /// Minimum number of samples a node needs before it may split.
    pub min_samples_split: usize,
    /// Seed of the bootstrap RNG.
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    fn predict(&self, row: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    features: &'a [Vec<f64>],
    targets: &'a [Vec<f64>],
    n_outputs: usize,
    params: &'a ForestParams,
    nodes: Vec<Node>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
}

impl TreeBuilder<'_> {
    fn build(&mut self, indices: &[usize], depth: usize) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: self.mean(indices),
        });

        if depth >= self.params.max_depth || indices.len() < self.params.min_samples_split {
            return node_id;
        }
        let Some(split) = self.best_split(indices) else {
            return node_id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.features[i][split.feature] <= split.threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return node_id;
        }

        let left = self.build(&left_idx, depth + 1);
        let right = self.build(&right_idx, depth + 1);
        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(&self, indices: &[usize]) -> Vec<f64> {
        let mut sums = vec![0.0; self.n_outputs];
        for &i in indices {
            for (sum, value) in sums.iter_mut().zip(&self.targets[i]) {
                *sum += value;
            }
        }
        let n = indices.len().max(1) as f64;
        sums.into_iter().map(|s| s / n).collect()
    }

    /// Finds the split maximizing `Σ_o (L_o²/n_L + R_o²/n_R)`, which is
    /// equivalent to minimizing the summed squared error of both children.
    #[allow(clippy::cast_precision_loss)]
    fn best_split(&self, indices: &[usize]) -> Option<BestSplit> {
        let n = indices.len();
        let mut total = vec![0.0; self.n_outputs];
        for &i in indices {
            for (t, value) in total.iter_mut().zip(&self.targets[i]) {
                *t += value;
            }
        }
        let parent_proxy: f64 = total.iter().map(|t| t * t).sum::<f64>() / n as f64;

        let mut best: Option<(f64, BestSplit)> = None;
        let mut sorted = indices.to_vec();
        let mut left = vec![0.0; self.n_outputs];

        for feature in 0..self.features[indices[0]].len() {
            sorted.sort_by(|&a, &b| {
                self.features[a][feature].total_cmp(&self.features[b][feature])
            });
            left.iter_mut().for_each(|v| *v = 0.0);

            for pos in 0..n - 1 {
                for (l, value) in left.iter_mut().zip(&self.targets[sorted[pos]]) {
                    *l += value;
                }

                let here = self.features[sorted[pos]][feature];
                let next = self.features[sorted[pos + 1]][feature];
                if next <= here + FEATURE_EPSILON {
                    continue;
                }

                let n_left = (pos + 1) as f64;
                let n_right = (n - pos - 1) as f64;
                let proxy: f64 = left
                    .iter()
                    .zip(&total)
                    .map(|(l, t)| {
                        let r = t - l;
                        l * l / n_left + r * r / n_right
                    })
                    .sum();

                if best.as_ref().is_none_or(|(score, _)| proxy > *score) {
                    let mut threshold = here / 2.0 + next / 2.0;
                    if threshold >= next {
                        threshold = here;
                    }
                    best = Some((proxy, BestSplit { feature, threshold }));
                }
            }
        }

        best.filter(|(proxy, _)| *proxy - parent_proxy > FEATURE_EPSILON * parent_proxy.max(1.0))
            .map(|(_, split)| split)
    }
}

/// Bagged ensemble of regression trees predicting several targets jointly.
#[derive(Debug, Clone)]
pub struct RegressionForest {
    trees: Vec<RegressionTree>,
    n_features: usize,
    n_outputs: usize,
}

impl RegressionForest {
    /// Fits the forest on aligned feature and target rows.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the table is empty, rows are ragged, the
    /// row counts differ, or a value is not finite.
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[Vec<f64>],
        params: &ForestParams,
    ) -> Result<Self, ModelError> {
        if features.is_empty() || params.n_trees == 0 {
            return Err(ModelError::EmptyData);
        }
        if features.len() != targets.len() {
            return Err(ModelError::RowCountMismatch {
                features: features.len(),
                targets: targets.len(),
            });
        }
        let n_features = validate_matrix(features)?;
        let n_outputs = validate_matrix(targets)?;

        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let n = features.len();
        let mut trees = Vec::with_capacity(params.n_trees);

        for _ in 0..params.n_trees {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let mut builder = TreeBuilder {
                features,
                targets,
                n_outputs,
                params,
                nodes: Vec::new(),
            };
            builder.build(&sample, 0);
            trees.push(RegressionTree {
                nodes: builder.nodes,
            });
        }

        log::debug!(
            "Fitted regression forest: {} trees, {n} rows, {n_features} features, {n_outputs} targets",
            trees.len()
        );

        Ok(Self {
            trees,
            n_features,
            n_outputs,
        })
    }

    /// Predicts every target for one feature row.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the row has the wrong width or a
    /// non-finite value.
    #[allow(clippy::cast_precision_loss)]
    pub fn predict(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        if row.len() != self.n_features {
            return Err(ModelError::FeatureCount {
                expected: self.n_features,
                actual: row.len(),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }

        let mut sums = vec![0.0; self.n_outputs];
        for tree in &self.trees {
            for (sum, value) in sums.iter_mut().zip(tree.predict(row)) {
                *sum += value;
            }
        }
        let n = self.trees.len() as f64;
        Ok(sums.into_iter().map(|s| s / n).collect())
    }

    /// Averages the predictions of several rows target by target.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if `rows` is empty or any row is invalid.
    #[allow(clippy::cast_precision_loss)]
    pub fn predict_mean(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if rows.is_empty() {
            return Err(ModelError::EmptyData);
        }
        let mut sums = vec![0.0; self.n_outputs];
        for row in rows {
            for (sum, value) in sums.iter_mut().zip(self.predict(row)?) {
                *sum += value;
            }
        }
        let n = rows.len() as f64;
        Ok(sums.into_iter().map(|s| s / n).collect())
    }

    /// Number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Checks that every row has the same non-zero width and finite values,
/// returning the width.
pub(crate) fn validate_matrix(rows: &[Vec<f64>]) -> Result<usize, ModelError> {
    let width = rows.first().map_or(0, Vec::len);
    if width == 0 {
        return Err(ModelError::EmptyData);
    }
    for row in rows {
        if row.len() != width {
            return Err(ModelError::FeatureCount {
                expected: width,
                actual: row.len(),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite);
        }
    }
    Ok(width)
}
