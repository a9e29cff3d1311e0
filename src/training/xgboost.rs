//! XGBoost-style gradient boosting with second-order approximation
//!
//! Key differences from standard gradient boosting:
//! - Uses both gradient (first derivative) and hessian (second derivative) of loss
//! - Regularized leaf weights: w* = -G / (H + lambda)
//! - Gain-based split scoring: Gain = 0.5 * [GL²/(HL+λ) + GR²/(HR+λ) - (GL+GR)²/(HL+HR+λ)] - γ
//! - Built-in L1 (alpha) and L2 (lambda) regularization
//! - Minimum child weight constraint
//! - Early stopping on the validation logloss; prediction uses trees up to the
//!   best round only

use crate::error::{Result, TrainerError};
use crate::metrics::log_loss;
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::checkpoint::CheckpointSlot;
use super::early_stopping::{EarlyStopping, StopDecision};
use super::models::{FitReport, FoldData, Model};

/// XGBoost configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// L1 regularization on leaf weights
    pub reg_alpha: f64,
    /// Minimum loss reduction to make a split (gamma)
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    /// Rounds without validation improvement before stopping; `None` runs every round
    pub early_stopping_rounds: Option<usize>,
    pub random_state: Option<u64>,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 2000,
            learning_rate: 0.05,
            max_depth: 8,
            min_child_weight: 4.0,
            reg_lambda: 1.0,
            reg_alpha: 0.0,
            gamma: 0.2,
            subsample: 0.8,
            colsample_bytree: 0.8,
            early_stopping_rounds: Some(50),
            random_state: Some(0),
        }
    }
}

/// A single node in the XGBoost tree
#[derive(Debug, Clone, Serialize, Deserialize)]
enum XGBNode {
    Leaf { weight: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<XGBNode>,
        right: Box<XGBNode>,
    },
}

impl XGBNode {
    fn predict(&self, sample: ArrayView1<f64>) -> f64 {
        match self {
            XGBNode::Leaf { weight } => *weight,
            XGBNode::Split { feature, threshold, left, right } => {
                if sample[*feature] <= *threshold {
                    left.predict(sample)
                } else {
                    right.predict(sample)
                }
            }
        }
    }

    fn count_splits(&self, counts: &mut [f64]) {
        if let XGBNode::Split { feature, left, right, .. } = self {
            if *feature < counts.len() {
                counts[*feature] += 1.0;
            }
            left.count_splits(counts);
            right.count_splits(counts);
        }
    }
}

/// Build an XGBoost tree using exact greedy split finding
fn build_xgb_tree(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature_indices: &[usize],
    depth: usize,
    config: &XGBoostConfig,
) -> XGBNode {
    let n = indices.len();

    // Compute leaf weight with L1/L2 regularization
    let g_sum: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h_sum: f64 = indices.iter().map(|&i| hess[i]).sum();

    let leaf_weight = compute_leaf_weight(g_sum, h_sum, config.reg_lambda, config.reg_alpha);

    // Stopping conditions
    if depth >= config.max_depth || n < 2 || h_sum < config.min_child_weight {
        return XGBNode::Leaf { weight: leaf_weight };
    }

    // Find best split across features (parallelized)
    let best_split = feature_indices.par_iter().filter_map(|&f| {
        find_best_split_for_feature(x, grad, hess, indices, f, config)
    }).max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));

    match best_split {
        Some((feature, threshold, gain)) if gain > config.gamma => {
            let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
                indices.iter().partition(|&&i| x[[i, feature]] <= threshold);

            if left_idx.is_empty() || right_idx.is_empty() {
                return XGBNode::Leaf { weight: leaf_weight };
            }

            let left = build_xgb_tree(x, grad, hess, &left_idx, feature_indices, depth + 1, config);
            let right = build_xgb_tree(x, grad, hess, &right_idx, feature_indices, depth + 1, config);

            XGBNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        _ => XGBNode::Leaf { weight: leaf_weight },
    }
}

/// Optimal leaf weight with L1 (alpha) and L2 (lambda) regularization
fn compute_leaf_weight(g_sum: f64, h_sum: f64, lambda: f64, alpha: f64) -> f64 {
    if alpha > 0.0 {
        // Soft-threshold for L1
        let g_adj = if g_sum > alpha {
            g_sum - alpha
        } else if g_sum < -alpha {
            g_sum + alpha
        } else {
            return 0.0;
        };
        -g_adj / (h_sum + lambda)
    } else {
        -g_sum / (h_sum + lambda)
    }
}

/// Best (feature, threshold, gain) for a single feature using exact greedy search
fn find_best_split_for_feature(
    x: &Array2<f64>,
    grad: &Array1<f64>,
    hess: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    config: &XGBoostConfig,
) -> Option<(usize, f64, f64)> {
    let mut sorted_indices: Vec<usize> = indices.to_vec();
    sorted_indices.sort_by(|&a, &b| {
        x[[a, feature]].partial_cmp(&x[[b, feature]]).unwrap_or(std::cmp::Ordering::Equal)
    });

    let g_total: f64 = sorted_indices.iter().map(|&i| grad[i]).sum();
    let h_total: f64 = sorted_indices.iter().map(|&i| hess[i]).sum();

    let mut g_left = 0.0;
    let mut h_left = 0.0;
    let mut best_gain = f64::NEG_INFINITY;
    let mut best_threshold = 0.0;

    let lambda = config.reg_lambda;

    // The last position would leave the right child empty
    for pos in 0..sorted_indices.len().saturating_sub(1) {
        let idx = sorted_indices[pos];
        let next_idx = sorted_indices[pos + 1];
        g_left += grad[idx];
        h_left += hess[idx];

        // Skip if next sample has same feature value (avoid identical split)
        if (x[[idx, feature]] - x[[next_idx, feature]]).abs() < 1e-12 {
            continue;
        }

        let g_right = g_total - g_left;
        let h_right = h_total - h_left;

        if h_left < config.min_child_weight || h_right < config.min_child_weight {
            continue;
        }

        let gain = 0.5 * (
            (g_left * g_left) / (h_left + lambda)
            + (g_right * g_right) / (h_right + lambda)
            - (g_total * g_total) / (h_total + lambda)
        );

        if gain > best_gain {
            best_gain = gain;
            best_threshold = (x[[idx, feature]] + x[[next_idx, feature]]) / 2.0;
        }
    }

    if best_gain > f64::NEG_INFINITY {
        Some((feature, best_threshold, best_gain))
    } else {
        None
    }
}

/// Split-count importances normalized to sum to one
fn xgb_tree_importances(trees: &[XGBNode], n_features: usize) -> Array1<f64> {
    let mut counts = vec![0.0f64; n_features];
    for tree in trees {
        tree.count_splits(&mut counts);
    }
    let total: f64 = counts.iter().sum();
    if total > 0.0 {
        for c in counts.iter_mut() { *c /= total; }
    }
    Array1::from_vec(counts)
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// XGBoost Classifier (logistic loss with second-order approximation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    trees: Vec<XGBNode>,
    base_score: f64,
    n_features: usize,
    best_iteration: Option<usize>,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            base_score: 0.0,
            n_features: 0,
            best_iteration: None,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn best_iteration(&self) -> Option<usize> {
        self.best_iteration
    }

    fn tree_output(&self, tree: &XGBNode, x: &Array2<f64>) -> Array1<f64> {
        let lr = self.config.learning_rate;
        let out: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| lr * tree.predict(x.row(i)))
            .collect();
        Array1::from_vec(out)
    }

    /// Boost on `(x, y)`, monitoring logloss on `(x_val, y_val)`
    pub fn fit_with_eval(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        x_val: &Array2<f64>,
        y_val: &Array1<f64>,
    ) -> Result<FitReport> {
        let n_samples = x.nrows();
        let n_features = x.ncols();
        if n_samples != y.len() || x_val.nrows() != y_val.len() {
            return Err(TrainerError::ShapeError {
                expected: format!("{} and {} labels", n_samples, x_val.nrows()),
                actual: format!("{} and {} labels", y.len(), y_val.len()),
            });
        }
        if n_samples == 0 {
            return Err(TrainerError::TrainingError("No training rows".to_string()));
        }
        if x_val.nrows() > 0 && x_val.ncols() != n_features {
            return Err(TrainerError::ShapeError {
                expected: format!("{} features", n_features),
                actual: format!("{} features", x_val.ncols()),
            });
        }
        self.n_features = n_features;

        // Base score in log-odds space
        let p = y.mean().unwrap_or(0.5).clamp(1e-7, 1.0 - 1e-7);
        self.base_score = (p / (1.0 - p)).ln();
        let mut raw_preds = Array1::from_elem(n_samples, self.base_score);
        let mut val_raw = Array1::from_elem(x_val.nrows(), self.base_score);

        let mut rng = match self.config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let monitor = self.config.early_stopping_rounds.filter(|_| x_val.nrows() > 0);
        let mut stopper = monitor.map(EarlyStopping::new);
        let mut stopped_early = false;

        self.trees.clear();
        self.best_iteration = None;

        for round in 0..self.config.n_estimators {
            // Logistic loss: grad = p - y, hess = p * (1 - p)
            let probs: Array1<f64> = raw_preds.mapv(sigmoid);
            let grad: Array1<f64> = &probs - y;
            let hess: Array1<f64> = probs.mapv(|p| (p * (1.0 - p)).max(1e-7));

            let row_indices = subsample(&mut rng, n_samples, self.config.subsample);
            let col_indices = subsample(&mut rng, n_features, self.config.colsample_bytree);

            let tree = build_xgb_tree(x, &grad, &hess, &row_indices, &col_indices, 0, &self.config);

            // Every row moves, including those left out of this round's sample
            raw_preds += &self.tree_output(&tree, x);
            self.trees.push(tree);

            if let Some(stopper) = stopper.as_mut() {
                if let Some(last) = self.trees.last() {
                    val_raw += &self.tree_output(last, x_val);
                }
                let val_loss = log_loss(y_val, &val_raw.mapv(sigmoid));
                debug!(round, val_loss, "Boosting round");

                if stopper.observe(round, val_loss) == StopDecision::Stop {
                    stopped_early = true;
                    info!(round, best_round = ?stopper.best_epoch(), "Early stopping");
                    break;
                }
            }
        }

        let iterations = self.trees.len();
        let (best_iteration, best_val_loss) = match &stopper {
            Some(s) => (s.best_epoch(), s.best_loss()),
            None => (iterations.checked_sub(1), None),
        };
        if let Some(best) = best_iteration {
            self.trees.truncate(best + 1);
        }
        self.best_iteration = best_iteration;

        Ok(FitReport {
            iterations,
            best_iteration,
            best_val_loss,
            stopped_early,
        })
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<FitReport> {
        let empty_x = Array2::zeros((0, x.ncols()));
        let empty_y = Array1::zeros(0);
        self.fit_with_eval(x, y, &empty_x, &empty_y)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.n_features == 0 {
            return Err(TrainerError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(TrainerError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let lr = self.config.learning_rate;
        let probs: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let row = x.row(i);
                let raw = self.base_score
                    + self.trees.iter().map(|t| lr * t.predict(row)).sum::<f64>();
                sigmoid(raw)
            })
            .collect();
        Ok(Array1::from_vec(probs))
    }

    /// Compute feature importances by counting splits across all trees
    pub fn feature_importances(&self) -> Option<Array1<f64>> {
        if self.n_features == 0 { return None; }
        Some(xgb_tree_importances(&self.trees, self.n_features))
    }
}

impl Model for XGBoostClassifier {
    fn tag(&self) -> &'static str {
        "xgb"
    }

    fn fit(&mut self, train: &FoldData, val: &FoldData, _checkpoint: Option<&CheckpointSlot>) -> Result<FitReport> {
        self.fit_with_eval(&train.x, &train.y, &val.x, &val.y)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        XGBoostClassifier::predict_proba(self, x)
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        XGBoostClassifier::feature_importances(self)
    }
}

fn subsample(rng: &mut Xoshiro256PlusPlus, n: usize, ratio: f64) -> Vec<usize> {
    if ratio >= 1.0 {
        return (0..n).collect();
    }
    let k = (((n as f64) * ratio).ceil() as usize).max(1).min(n);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(k);
    indices.sort();
    indices
}
