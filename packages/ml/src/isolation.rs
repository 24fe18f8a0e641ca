//! Isolation forest anomaly model.
//!
//! Trees isolate points by recursive random partitioning of a sub-sample.
//! Points that are isolated after few splits are anomalous. Scores follow
//! the usual `score_samples` convention: `-2^(-E[h(x)] / c(ψ))`, in
//! `[-1, 0)`, more negative meaning more anomalous.

use rand::seq::SliceRandom as _;
use rand::{Rng as _, SeedableRng as _};
use rand_chacha::ChaCha8Rng;

use crate::ModelError;
use crate::forest::validate_matrix;

/// Euler–Mascheroni constant.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Hyperparameters of an [`IsolationForest`].
#[derive(Debug, Clone, PartialEq)]
pub struct IsolationParams {
    /// Number of isolation trees.
    pub n_trees: usize,
    /// Upper bound on the sub-sample each tree is grown on.
    pub max_samples: usize,
    /// Expected fraction of outliers in the training data.
    pub contamination: f64,
    /// Seed of the sub-sampling and partitioning RNG.
    pub seed: u64,
}

impl Default for IsolationParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_samples: 256,
            contamination: 0.1,
            seed: 42,
        }
    }
}

/// Outcome of scoring one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    /// Whether the row falls below the learned outlier threshold.
    pub is_outlier: bool,
    /// Continuous anomaly score (more negative = more anomalous).
    pub score: f64,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(
        rows: &[Vec<f64>],
        sample: &[usize],
        max_depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(rows, sample, 0, max_depth, rng);
        tree
    }

    fn build(
        &mut self,
        rows: &[Vec<f64>],
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: indices.len(),
        });
        if depth >= max_depth || indices.len() <= 1 {
            return node_id;
        }

        let mut features: Vec<usize> = (0..rows[indices[0]].len()).collect();
        features.shuffle(rng);

        for feature in features {
            let (min, max) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &i| {
                let v = rows[i][feature];
                (acc.0.min(v), acc.1.max(v))
            });
            if max <= min {
                continue;
            }

            let threshold = rng.gen_range(min..max);
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| rows[i][feature] <= threshold);

            let left = self.build(rows, &left_idx, depth + 1, max_depth, rng);
            let right = self.build(rows, &right_idx, depth + 1, max_depth, rng);
            self.nodes[node_id] = Node::Split {
                feature,
                threshold,
                left,
                right,
            };
            break;
        }

        node_id
    }

    /// Edges from the root to the row's leaf, plus the expected remaining
    /// depth of the leaf's unresolved samples.
    #[allow(clippy::cast_precision_loss)]
    fn path_length(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        let mut depth = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { size } => return depth as f64 + average_path_length(*size),
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
                    depth += 1;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful binary search tree lookup over
/// `n` points, `c(n)`.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile of `values` (`q` in `[0, 100]`).
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - pos.floor();
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Ensemble of isolation trees with a contamination-derived threshold.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    n_features: usize,
    sample_size: usize,
    contamination: f64,
    offset: f64,
}

impl IsolationForest {
    /// Fits the forest and learns the outlier threshold as the
    /// `contamination` quantile of the training scores.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if `rows` is empty, ragged, contains a
    /// non-finite value, or `contamination` is outside `(0, 0.5]`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn fit(rows: &[Vec<f64>], params: &IsolationParams) -> Result<Self, ModelError> {
        if rows.is_empty() || params.n_trees == 0 || params.max_samples == 0 {
            return Err(ModelError::EmptyData);
        }
        if !(params.contamination > 0.0 && params.contamination <= 0.5) {
            return Err(ModelError::InvalidParameter {
                name: "contamination",
                value: params.contamination,
            });
        }
        let n_features = validate_matrix(rows)?;

        let n = rows.len();
        let sample_size = params.max_samples.min(n);
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);

        let trees: Vec<IsolationTree> = (0..params.n_trees)
            .map(|_| {
                let sample = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::grow(rows, &sample, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            n_features,
            sample_size,
            contamination: params.contamination,
            offset: 0.0,
        };

        let training_scores = rows
            .iter()
            .map(|row| forest.score_row(row))
            .collect::<Vec<_>>();
        forest.offset = percentile(&training_scores, 100.0 * params.contamination);

        log::debug!(
            "Fitted isolation forest: {} trees, {n} rows, sub-sample {sample_size}, offset {:.4}",
            forest.trees.len(),
            forest.offset
        );

        Ok(forest)
    }

    #[allow(clippy::cast_precision_loss)]
    fn score_row(&self, row: &[f64]) -> f64 {
        let mean_depth = self
            .trees
            .iter()
            .map(|tree| tree.path_length(row))
            .sum::<f64>()
            / self.trees.len() as f64;
        let normalizer = average_path_length(self.sample_size).max(f64::EPSILON);
        -(2f64.powf(-mean_depth / normalizer))
    }

    /// Scores rows and labels each as inlier or outlier.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if a row has the wrong width or a non-finite
    /// value.
    pub fn score(&self, rows: &[Vec<f64>]) -> Result<Vec<Verdict>, ModelError> {
        rows.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(ModelError::FeatureCount {
                        expected: self.n_features,
                        actual: row.len(),
                    });
                }
                if row.iter().any(|v| !v.is_finite()) {
                    return Err(ModelError::NonFinite);
                }
                let score = self.score_row(row);
                Ok(Verdict {
                    is_outlier: score < self.offset,
                    score,
                })
            })
            .collect()
    }

    /// Configured contamination fraction.
    #[must_use]
    pub const fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Score threshold below which rows are outliers.
    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster_with_outliers() -> Vec<Vec<f64>> {
        let mut rows: Vec<Vec<f64>> = (0..200_u32)
            .map(|i| {
                let w = f64::from(i % 10) / 10.0;
                vec![5.0 + w, 8.0 + w, 30.0 + 2.0 * w, 60.0 - w]
            })
            .collect();
        rows.push(vec![95.0, 140.0, 180.0, 5.0]);
        rows.push(vec![0.1, 0.2, 1.0, 190.0]);
        rows
    }

    #[test]
    fn average_path_length_matches_closed_form() {
        assert!(average_path_length(1).abs() < f64::EPSILON);
        assert!((average_path_length(2) - 1.0).abs() < f64::EPSILON);
        assert!((average_path_length(256) - 10.244_770_920_116_851).abs() < 1e-9);
    }

    #[test]
    fn percentile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0, 5.0];
        assert!((percentile(&values, 0.0) - 1.0).abs() < 1e-12);
        assert!((percentile(&values, 50.0) - 3.0).abs() < 1e-12);
        assert!((percentile(&values, 10.0) - 1.4).abs() < 1e-12);
    }

    #[test]
    fn outliers_score_lower_than_cluster() {
        let rows = cluster_with_outliers();
        let forest = IsolationForest::fit(&rows, &IsolationParams::default()).unwrap();

        let verdicts = forest.score(&rows).unwrap();
        let outlier_a = verdicts[200];
        let outlier_b = verdicts[201];
        let typical = verdicts[3];

        assert!(outlier_a.is_outlier);
        assert!(outlier_b.is_outlier);
        assert!(outlier_a.score < typical.score);
        assert!(verdicts.iter().all(|v| (-1.0..0.0).contains(&v.score)));
    }

    #[test]
    fn flags_roughly_the_contamination_fraction() {
        let rows = cluster_with_outliers();
        let forest = IsolationForest::fit(&rows, &IsolationParams::default()).unwrap();

        let flagged = forest
            .score(&rows)
            .unwrap()
            .iter()
            .filter(|v| v.is_outlier)
            .count();

        assert!(flagged <= rows.len() / 10 + 1, "flagged {flagged}");
    }

    #[test]
    fn fixed_seed_is_reproducible() {
        let rows = cluster_with_outliers();
        let a = IsolationForest::fit(&rows, &IsolationParams::default()).unwrap();
        let b = IsolationForest::fit(&rows, &IsolationParams::default()).unwrap();

        assert_eq!(a.score(&rows).unwrap(), b.score(&rows).unwrap());
        assert!((a.offset() - b.offset()).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_bad_input() {
        let params = IsolationParams::default();
        assert!(matches!(
            IsolationForest::fit(&[], &params),
            Err(ModelError::EmptyData)
        ));

        let forest = IsolationForest::fit(&cluster_with_outliers(), &params).unwrap();
        assert!(matches!(
            forest.score(&[vec![1.0, 2.0]]),
            Err(ModelError::FeatureCount { .. })
        ));

        let bad = IsolationParams {
            contamination: 0.9,
            ..IsolationParams::default()
        };
        assert!(matches!(
            IsolationForest::fit(&cluster_with_outliers(), &bad),
            Err(ModelError::InvalidParameter { .. })
        ));
    }
}
